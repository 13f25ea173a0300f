//! Domain types and rules for visitor registration
//!
//! - `types` - Core data model (VisitorInput, VisitorId, RegistrationResult, Ticket)
//! - `validate` - Pure field validation for the registration form

pub mod types;
pub mod validate;

pub use types::{RegistrationResult, Ticket, VisitorId, VisitorInput};
pub use validate::{validate, Field, FieldReason, ValidationReport};
