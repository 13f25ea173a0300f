//! IO modules - external system interfaces
//!
//! - `api` - HTTP client for the remote visitor registration service
//! - `export` - Ticket PNG export to filesystem or host download prompt

pub mod api;
pub mod export;

// Re-export commonly used types
pub use api::{NetworkError, RegistrationApi, RegistrationClient};
pub use export::{DownloadRequest, ExportError, ExportReceipt, ExportTarget, TicketExporter};
