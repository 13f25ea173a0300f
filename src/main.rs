//! Ticket kiosk - visitor registration and ticket issuance
//!
//! Drives the shared ticket issuance workflow from the command line:
//! - `register` submits a new visitor and downloads their entry ticket
//! - `ticket` looks up an existing visitor by phone and re-issues theirs
//!
//! Module structure:
//! - `domain/` - Core types (VisitorInput, VisitorId, Ticket) and validation
//! - `io/` - External interfaces (registration API, ticket export)
//! - `services/` - Business logic (renderer, issuance workflow)
//! - `infra/` - Infrastructure (Config)

use clap::{Parser, Subcommand};
use ticket_kiosk::domain::{ValidationReport, VisitorInput};
use ticket_kiosk::infra::{Config, ExportMode};
use ticket_kiosk::io::export::{DownloadRequest, ExportTarget, TicketExporter};
use ticket_kiosk::io::RegistrationClient;
use ticket_kiosk::services::{TicketRenderer, TicketWorkflow, WorkflowOutcome};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Ticket kiosk - visitor registration and ticket issuance
#[derive(Parser, Debug)]
#[command(name = "ticket-kiosk", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new visitor and issue their entry ticket
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// 10-digit mobile number
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        city: String,
        /// 6-digit pincode (leading zeros preserved)
        #[arg(long)]
        pincode: String,
    },
    /// Issue the ticket for an already-registered visitor
    Ticket {
        /// 10-digit mobile number used at registration
        #[arg(long)]
        phone: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        api_base_url = %config.api_base_url(),
        timeout_ms = %config.api_timeout().as_millis(),
        export_dir = %config.export_dir(),
        ticket_size = %format!("{}x{}@{}x", config.ticket_width(), config.ticket_height(), config.ticket_scale()),
        "config_loaded"
    );

    let client = RegistrationClient::new(config.api_base_url(), config.api_timeout())?;
    let renderer = TicketRenderer::from_config(&config);

    // The export target is selected once here, never re-checked per call
    let mut download_host = None;
    let exporter = match config.export_mode() {
        ExportMode::Filesystem => TicketExporter::to_directory(config.export_dir()),
        ExportMode::Download => {
            let (tx, rx) = mpsc::channel(4);
            download_host = Some(spawn_download_host(rx, config.export_dir().to_string()));
            TicketExporter::new(ExportTarget::DownloadPrompt { tx })
        }
    };

    let workflow = TicketWorkflow::new(client, renderer, exporter);

    let outcome = match args.command {
        Command::Register { name, email, mobile, city, pincode } => {
            let input =
                VisitorInput { name, email, mobile_phone: mobile, city, pincode };
            workflow.submit(input).await
        }
        Command::Ticket { phone } => workflow.issue_for_phone(&phone).await,
    };

    // Dropping the workflow closes the prompt channel; let the host drain
    // any pending download before reporting
    drop(workflow);
    if let Some(host) = download_host {
        let _ = host.await;
    }

    match outcome {
        WorkflowOutcome::Issued { visitor_id, receipt } => {
            info!(visitor_id = %visitor_id, receipt = ?receipt, "done");
            Ok(())
        }
        WorkflowOutcome::Invalid(report) => {
            for (field, reason) in &report.field_errors {
                warn!(field = %field, "{}", ValidationReport::message(*field, *reason));
            }
            Err("validation failed".into())
        }
        WorkflowOutcome::Rejected { message } => {
            error!(message = %message, "request_rejected");
            Err(message.into())
        }
        WorkflowOutcome::Failed(e) => {
            error!(error = %e, "workflow_failed");
            Err(e.into())
        }
        WorkflowOutcome::Ignored => {
            // Unreachable from a single CLI invocation
            Ok(())
        }
    }
}

/// Stand-in for the hosting shell's save dialog: receives prompted
/// downloads and writes them into the export directory
fn spawn_download_host(
    mut rx: mpsc::Receiver<DownloadRequest>,
    dir: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let path = std::path::Path::new(&dir).join(&request.filename);
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        error!(error = %e, "download_dir_create_failed");
                        continue;
                    }
                }
            }
            match std::fs::write(&path, &request.bytes) {
                Ok(()) => info!(path = %path.display(), "download_saved"),
                Err(e) => error!(path = %path.display(), error = %e, "download_save_failed"),
            }
        }
    })
}
