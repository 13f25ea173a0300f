//! Shared types for the ticket kiosk

use serde::{Deserialize, Serialize};

/// Newtype wrapper for server-assigned visitor identifiers.
///
/// Identifiers are kept as strings end-to-end: the server may hand out
/// zero-padded values (e.g. "00042") and the QR payload and ticket caption
/// must reproduce them byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VisitorId(pub String);

impl VisitorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VisitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VisitorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One visitor's registration form.
///
/// `mobile_phone` and `pincode` are fixed-width digit strings, not numbers:
/// a pincode of "087123" must survive validation and submission unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorInput {
    pub name: String,
    pub email: String,
    pub mobile_phone: String,
    pub city: String,
    pub pincode: String,
}

impl VisitorInput {
    /// Copy with all fields trimmed, as submitted on the wire
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            mobile_phone: self.mobile_phone.trim().to_string(),
            city: self.city.trim().to_string(),
            pincode: self.pincode.trim().to_string(),
        }
    }
}

/// Outcome of a register or lookup call that produced a response.
///
/// A `visitor_id` is present iff the server accepted the request. Transport
/// failures never reach this type; they surface as `io::api::NetworkError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    pub success: bool,
    pub visitor_id: Option<VisitorId>,
    pub error_message: Option<String>,
}

impl RegistrationResult {
    pub fn accepted(visitor_id: VisitorId) -> Self {
        Self { success: true, visitor_id: Some(visitor_id), error_message: None }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, visitor_id: None, error_message: Some(message.into()) }
    }
}

/// A ticket awaiting render and export.
///
/// Created once a visitor identifier is obtained (from registration or
/// lookup); discarded after export. An empty `qr_payload` is the
/// "identifier not yet available" state and renders as background only.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub visitor_id: VisitorId,
    pub qr_payload: String,
}

impl Ticket {
    pub fn new(visitor_id: VisitorId) -> Self {
        let qr_payload = visitor_id.0.clone();
        Self { visitor_id, qr_payload }
    }

    /// Placeholder ticket with no identifier (background-only render)
    pub fn blank() -> Self {
        Self { visitor_id: VisitorId(String::new()), qr_payload: String::new() }
    }

    /// Download filename convention: `Visitor_Ticket_<visitorId>.png`
    pub fn filename(&self) -> String {
        format!("Visitor_Ticket_{}.png", self.visitor_id)
    }
}
