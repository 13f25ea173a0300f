//! Ticket export - PNG encoding and delivery
//!
//! The delivery target is injected once at startup and never re-selected
//! per call: hosts with filesystem access write the file directly, browser
//! hosts receive the encoded bytes over a channel and raise their own save
//! dialog. Failures (encode error, no writable target, dismissed prompt)
//! are reported, never swallowed.

use image::RgbaImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("png encoding failed: {0}")]
    Encode(String),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("download prompt dismissed or unavailable")]
    PromptClosed,
}

/// An encoded ticket handed to the hosting shell for a user-facing save
/// dialog
#[derive(Debug)]
pub struct DownloadRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Where exported tickets go. Selected once from config at startup.
pub enum ExportTarget {
    /// Write directly to a directory (desktop / server hosts)
    FileSystem { dir: PathBuf },
    /// Hand the encoded file to the host shell's download prompt
    DownloadPrompt { tx: mpsc::Sender<DownloadRequest> },
}

/// Proof of a completed export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportReceipt {
    Written(PathBuf),
    Prompted(String),
}

pub struct TicketExporter {
    target: ExportTarget,
}

impl TicketExporter {
    pub fn new(target: ExportTarget) -> Self {
        Self { target }
    }

    /// Convenience constructor for the filesystem target
    pub fn to_directory<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(ExportTarget::FileSystem { dir: dir.as_ref().to_path_buf() })
    }

    /// Encode the rendered ticket as PNG and deliver it under `filename`
    pub async fn export(
        &self,
        image: &RgbaImage,
        filename: &str,
    ) -> Result<ExportReceipt, ExportError> {
        let bytes = encode_png(image)?;
        debug!(filename = %filename, bytes = %bytes.len(), "ticket_encoded");

        match &self.target {
            ExportTarget::FileSystem { dir } => {
                if !dir.exists() {
                    std::fs::create_dir_all(dir)?;
                }
                let path = dir.join(filename);
                std::fs::write(&path, &bytes)?;
                info!(path = %path.display(), bytes = %bytes.len(), "ticket_exported");
                Ok(ExportReceipt::Written(path))
            }
            ExportTarget::DownloadPrompt { tx } => {
                let request =
                    DownloadRequest { filename: filename.to_string(), bytes };
                tx.send(request).await.map_err(|_| ExportError::PromptClosed)?;
                info!(filename = %filename, "ticket_download_prompted");
                Ok(ExportReceipt::Prompted(filename.to_string()))
            }
        }
    }
}

/// Encode an RGBA raster as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(bytes)
}
