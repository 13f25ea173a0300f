//! Ticket issuance workflow - one pipeline for both entry points
//!
//! Sequences validation -> API call -> render -> export. The registration
//! screen and the "already registered" lookup both funnel into the same
//! render/export tail; only the first step differs.
//!
//! State machine: `Idle -> Validating -> Submitting -> Rendering ->
//! Exporting -> Idle`, with every failure transitioning back to `Idle`
//! carrying an error. Export follows render and render follows a
//! successful response by construction - there is no settle delay. At most
//! one run is in flight: a re-entrant trigger is discarded (never queued),
//! so a double-tap cannot register the same visitor twice.

use crate::domain::{validate, Ticket, ValidationReport, VisitorId, VisitorInput};
use crate::io::api::{NetworkError, RegistrationApi};
use crate::io::export::{ExportError, ExportReceipt, TicketExporter};
use crate::services::renderer::{RenderError, TicketRenderer};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkflowState {
    Idle = 0,
    Validating = 1,
    Submitting = 2,
    Rendering = 3,
    Exporting = 4,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Validating => "validating",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Rendering => "rendering",
            WorkflowState::Exporting => "exporting",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkflowState::Validating,
            2 => WorkflowState::Submitting,
            3 => WorkflowState::Rendering,
            4 => WorkflowState::Exporting,
            _ => WorkflowState::Idle,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Result of one workflow run, surfaced to the caller as a single outcome
#[derive(Debug)]
pub enum WorkflowOutcome {
    /// Full success: ticket rendered and delivered
    Issued { visitor_id: VisitorId, receipt: ExportReceipt },
    /// Field validation failed; errors surfaced per field
    Invalid(ValidationReport),
    /// The server answered "no" (not transient; retrying won't help as-is)
    Rejected { message: String },
    /// A step failed; the run returned to idle and may be retried
    Failed(WorkflowError),
    /// A run was already in flight; this trigger was discarded
    Ignored,
}

/// Per-session mutable state, owned exclusively by the workflow
#[derive(Default)]
struct Session {
    input: VisitorInput,
    last_visitor_id: Option<VisitorId>,
}

/// Orchestrates one visitor session. All mutation goes through `&self`;
/// the atomic in-flight flag is the double-submit guard.
pub struct TicketWorkflow<A: RegistrationApi> {
    api: A,
    renderer: TicketRenderer,
    exporter: TicketExporter,
    in_flight: AtomicBool,
    state: AtomicU8,
    session: Mutex<Session>,
}

/// Releases the in-flight flag and restores `Idle` on every exit path
struct RunGuard<'a> {
    in_flight: &'a AtomicBool,
    state: &'a AtomicU8,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.store(WorkflowState::Idle as u8, Ordering::Release);
        self.in_flight.store(false, Ordering::Release);
    }
}

impl<A: RegistrationApi> TicketWorkflow<A> {
    pub fn new(api: A, renderer: TicketRenderer, exporter: TicketExporter) -> Self {
        Self {
            api,
            renderer,
            exporter,
            in_flight: AtomicBool::new(false),
            state: AtomicU8::new(WorkflowState::Idle as u8),
            session: Mutex::new(Session::default()),
        }
    }

    pub fn state(&self) -> WorkflowState {
        WorkflowState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The injected registration API (useful to callers owning a test
    /// double or wanting to reuse the client)
    pub fn api_ref(&self) -> &A {
        &self.api
    }

    /// Form contents as of the last trigger; preserved across failures so
    /// the user can resubmit without retyping
    pub async fn pending_input(&self) -> VisitorInput {
        self.session.lock().await.input.clone()
    }

    /// Identifier from the last successful register/lookup, kept even when
    /// a later render/export step failed
    pub async fn last_visitor_id(&self) -> Option<VisitorId> {
        self.session.lock().await.last_visitor_id.clone()
    }

    fn enter(&self, state: WorkflowState) {
        self.state.store(state as u8, Ordering::Release);
        debug!(state = state.as_str(), "workflow_state");
    }

    /// Try to claim the single in-flight slot
    fn begin(&self) -> Option<RunGuard<'_>> {
        match self.in_flight.compare_exchange(
            false,
            true,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Some(RunGuard { in_flight: &self.in_flight, state: &self.state }),
            Err(_) => None,
        }
    }

    /// Registration entry point: validate, register, then issue the ticket
    pub async fn submit(&self, input: VisitorInput) -> WorkflowOutcome {
        let Some(_guard) = self.begin() else {
            info!("submit_ignored_in_flight");
            return WorkflowOutcome::Ignored;
        };

        self.session.lock().await.input = input.clone();

        self.enter(WorkflowState::Validating);
        let report = validate(&input);
        if !report.is_valid() {
            warn!(errors = %report.field_errors.len(), "submit_validation_failed");
            return WorkflowOutcome::Invalid(report);
        }

        self.enter(WorkflowState::Submitting);
        let result = match self.api.register(&input).await {
            Ok(result) => result,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "register_network_error");
                return WorkflowOutcome::Failed(e.into());
            }
        };

        let visitor_id = if result.success { result.visitor_id } else { None };
        let Some(visitor_id) = visitor_id else {
            let message = result
                .error_message
                .unwrap_or_else(|| "Failed to register. Try again.".to_string());
            return WorkflowOutcome::Rejected { message };
        };

        self.issue(visitor_id, true).await
    }

    /// Lookup entry point: fetch the identifier by phone, then issue the
    /// ticket through the same tail as registration
    pub async fn issue_for_phone(&self, phone: &str) -> WorkflowOutcome {
        let Some(_guard) = self.begin() else {
            info!("lookup_ignored_in_flight");
            return WorkflowOutcome::Ignored;
        };

        self.enter(WorkflowState::Submitting);
        let result = match self.api.lookup_by_phone(phone).await {
            Ok(result) => result,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "lookup_network_error");
                return WorkflowOutcome::Failed(e.into());
            }
        };

        let visitor_id = if result.success { result.visitor_id } else { None };
        let Some(visitor_id) = visitor_id else {
            let message = result
                .error_message
                .unwrap_or_else(|| "User not registered.".to_string());
            return WorkflowOutcome::Rejected { message };
        };

        self.issue(visitor_id, false).await
    }

    /// Re-run render/export for the identifier obtained by the last
    /// successful register or lookup. Does not re-register.
    pub async fn retry_export(&self) -> WorkflowOutcome {
        let Some(visitor_id) = self.last_visitor_id().await else {
            return WorkflowOutcome::Rejected {
                message: "No visitor id available. Register or look up first.".to_string(),
            };
        };

        let Some(_guard) = self.begin() else {
            info!("retry_ignored_in_flight");
            return WorkflowOutcome::Ignored;
        };

        self.issue(visitor_id, false).await
    }

    /// Shared render/export tail. The caller must hold the run guard.
    /// `clear_form` resets the stored input, which only happens after a
    /// fully successful registration run.
    async fn issue(&self, visitor_id: VisitorId, clear_form: bool) -> WorkflowOutcome {
        // The identifier survives render/export failures so the user can
        // retry export without re-registering
        self.session.lock().await.last_visitor_id = Some(visitor_id.clone());

        let ticket = Ticket::new(visitor_id.clone());

        self.enter(WorkflowState::Rendering);
        let image = match self.renderer.render(&ticket) {
            Ok(image) => image,
            Err(e) => {
                warn!(visitor_id = %visitor_id, error = %e, "ticket_render_failed");
                return WorkflowOutcome::Failed(e.into());
            }
        };

        self.enter(WorkflowState::Exporting);
        let receipt = match self.exporter.export(&image, &ticket.filename()).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(visitor_id = %visitor_id, error = %e, "ticket_export_failed");
                return WorkflowOutcome::Failed(e.into());
            }
        };

        if clear_form {
            self.session.lock().await.input = VisitorInput::default();
        }

        info!(visitor_id = %visitor_id, "ticket_issued");
        WorkflowOutcome::Issued { visitor_id, receipt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RegistrationResult;
    use crate::io::export::ExportTarget;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    /// Scripted API double that counts calls and can hold the workflow in
    /// `Submitting` for a while
    struct MockApi {
        calls: AtomicUsize,
        delay: Duration,
        response: Result<RegistrationResult, NetworkError>,
    }

    impl MockApi {
        fn returning(response: Result<RegistrationResult, NetworkError>) -> Self {
            Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, response }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn clone_response(&self) -> Result<RegistrationResult, NetworkError> {
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(NetworkError::Timeout) => Err(NetworkError::Timeout),
                Err(NetworkError::Unreachable(m)) => {
                    Err(NetworkError::Unreachable(m.clone()))
                }
                Err(NetworkError::InvalidInput(m)) => {
                    Err(NetworkError::InvalidInput(m.clone()))
                }
                Err(NetworkError::ServerRejected(m)) => {
                    Err(NetworkError::ServerRejected(m.clone()))
                }
            }
        }
    }

    #[async_trait]
    impl RegistrationApi for MockApi {
        async fn register(
            &self,
            _input: &VisitorInput,
        ) -> Result<RegistrationResult, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.clone_response()
        }

        async fn lookup_by_phone(
            &self,
            _phone: &str,
        ) -> Result<RegistrationResult, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.clone_response()
        }
    }

    fn valid_input() -> VisitorInput {
        VisitorInput {
            name: "Asha Rao".to_string(),
            email: "a@b.com".to_string(),
            mobile_phone: "9876543210".to_string(),
            city: "Pune".to_string(),
            pincode: "411045".to_string(),
        }
    }

    fn workflow_with(
        api: MockApi,
        dir: &std::path::Path,
    ) -> TicketWorkflow<MockApi> {
        TicketWorkflow::new(
            api,
            TicketRenderer::new(250, 175, 2),
            TicketExporter::to_directory(dir),
        )
    }

    #[tokio::test]
    async fn test_successful_submit_issues_ticket_and_clears_form() {
        let dir = tempdir().unwrap();
        let api = MockApi::returning(Ok(RegistrationResult::accepted(VisitorId::from("123"))));
        let workflow = workflow_with(api, dir.path());

        let outcome = workflow.submit(valid_input()).await;
        match outcome {
            WorkflowOutcome::Issued { visitor_id, receipt } => {
                assert_eq!(visitor_id, VisitorId::from("123"));
                assert_eq!(
                    receipt,
                    ExportReceipt::Written(dir.path().join("Visitor_Ticket_123.png"))
                );
            }
            other => panic!("expected Issued, got {other:?}"),
        }

        assert!(dir.path().join("Visitor_Ticket_123.png").exists());
        assert_eq!(workflow.state(), WorkflowState::Idle);
        // Form resets only after a fully successful run
        assert_eq!(workflow.pending_input().await, VisitorInput::default());
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_the_network() {
        let dir = tempdir().unwrap();
        let api = MockApi::returning(Ok(RegistrationResult::accepted(VisitorId::from("1"))));
        let workflow = workflow_with(api, dir.path());

        let outcome = workflow.submit(VisitorInput::default()).await;
        assert!(matches!(outcome, WorkflowOutcome::Invalid(_)));
        assert_eq!(workflow.api.call_count(), 0);
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn test_double_submit_makes_exactly_one_call() {
        let dir = tempdir().unwrap();
        let api = MockApi::returning(Ok(RegistrationResult::accepted(VisitorId::from("9"))))
            .with_delay(Duration::from_millis(100));
        let workflow = Arc::new(workflow_with(api, dir.path()));

        let first = {
            let w = workflow.clone();
            tokio::spawn(async move { w.submit(valid_input()).await })
        };
        // Give the first submit time to claim the in-flight slot
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = workflow.submit(valid_input()).await;

        assert!(matches!(second, WorkflowOutcome::Ignored));
        assert!(matches!(first.await.unwrap(), WorkflowOutcome::Issued { .. }));
        assert_eq!(workflow.api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_preserves_input_and_returns_to_idle() {
        let dir = tempdir().unwrap();
        let api = MockApi::returning(Err(NetworkError::Timeout));
        let workflow = workflow_with(api, dir.path());

        let input = valid_input();
        let outcome = workflow.submit(input.clone()).await;

        assert!(matches!(
            outcome,
            WorkflowOutcome::Failed(WorkflowError::Network(NetworkError::Timeout))
        ));
        assert_eq!(workflow.state(), WorkflowState::Idle);
        // The user can resubmit without retyping
        assert_eq!(workflow.pending_input().await, input);
    }

    #[tokio::test]
    async fn test_server_rejection_is_not_a_transport_failure() {
        let dir = tempdir().unwrap();
        let api = MockApi::returning(Ok(RegistrationResult::rejected("Phone already exists")));
        let workflow = workflow_with(api, dir.path());

        let outcome = workflow.submit(valid_input()).await;
        match outcome {
            WorkflowOutcome::Rejected { message } => {
                assert_eq!(message, "Phone already exists")
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_shares_the_issuance_tail() {
        let dir = tempdir().unwrap();
        let api =
            MockApi::returning(Ok(RegistrationResult::accepted(VisitorId::from("00042"))));
        let workflow = workflow_with(api, dir.path());

        let outcome = workflow.issue_for_phone("9876543210").await;
        assert!(matches!(outcome, WorkflowOutcome::Issued { .. }));
        // Leading zeros intact in the exported filename
        assert!(dir.path().join("Visitor_Ticket_00042.png").exists());
    }

    #[tokio::test]
    async fn test_export_failure_keeps_visitor_id_for_retry() {
        let dir = tempdir().unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx); // download prompt unavailable
        let api = MockApi::returning(Ok(RegistrationResult::accepted(VisitorId::from("55"))));
        let workflow = TicketWorkflow::new(
            api,
            TicketRenderer::new(250, 175, 2),
            TicketExporter::new(ExportTarget::DownloadPrompt { tx }),
        );

        let input = valid_input();
        let outcome = workflow.submit(input.clone()).await;
        assert!(matches!(
            outcome,
            WorkflowOutcome::Failed(WorkflowError::Export(ExportError::PromptClosed))
        ));

        // Registration succeeded, so the id must survive for a manual
        // export retry, and the form must not reset
        assert_eq!(workflow.last_visitor_id().await, Some(VisitorId::from("55")));
        assert_eq!(workflow.pending_input().await, input);
        assert_eq!(workflow.state(), WorkflowState::Idle);
        let _ = dir;
    }

    #[tokio::test]
    async fn test_retry_export_reuses_last_visitor_id() {
        let dir = tempdir().unwrap();
        let api = MockApi::returning(Ok(RegistrationResult::accepted(VisitorId::from("77"))));
        let workflow = workflow_with(api, dir.path());

        assert!(matches!(
            workflow.submit(valid_input()).await,
            WorkflowOutcome::Issued { .. }
        ));
        std::fs::remove_file(dir.path().join("Visitor_Ticket_77.png")).unwrap();

        // Re-export without another registration call
        let outcome = workflow.retry_export().await;
        assert!(matches!(outcome, WorkflowOutcome::Issued { .. }));
        assert!(dir.path().join("Visitor_Ticket_77.png").exists());
        assert_eq!(workflow.api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_export_without_prior_id() {
        let dir = tempdir().unwrap();
        let api = MockApi::returning(Ok(RegistrationResult::accepted(VisitorId::from("1"))));
        let workflow = workflow_with(api, dir.path());

        let outcome = workflow.retry_export().await;
        assert!(matches!(outcome, WorkflowOutcome::Rejected { .. }));
        assert_eq!(workflow.api.call_count(), 0);
    }
}
