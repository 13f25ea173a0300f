//! Business logic - ticket rendering and the issuance workflow
//!
//! - `font` - embedded 5x7 bitmap glyphs for the ticket caption
//! - `renderer` - composites background, QR symbol and caption
//! - `workflow` - orchestrates validate -> submit -> render -> export

pub mod font;
pub mod renderer;
pub mod workflow;

pub use renderer::{RenderError, TicketRenderer};
pub use workflow::{TicketWorkflow, WorkflowError, WorkflowOutcome, WorkflowState};
