//! HTTP client for the remote visitor registration service
//!
//! Wire protocol (HTTP+JSON):
//! - `POST /register/` with `{name, email, phone, address, pincode}`
//! - `GET /getUserId?phone=<10-digit>`
//!
//! Both respond 2xx with a body containing `user_id` on success, and a
//! non-2xx status and/or `message` on rejection. Transport failures (no
//! response at all) surface as `NetworkError`; an answered "no" surfaces as
//! `RegistrationResult { success: false, .. }`. Callers must not treat
//! these the same: only transport failures are transient.

use crate::domain::{RegistrationResult, VisitorId, VisitorInput};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Default request timeout; expiry surfaces as `NetworkError::Timeout`
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("server rejected request: {0}")]
    ServerRejected(String),
}

impl NetworkError {
    pub fn kind(&self) -> &'static str {
        match self {
            NetworkError::Timeout => "timeout",
            NetworkError::Unreachable(_) => "unreachable",
            NetworkError::InvalidInput(_) => "invalid_input",
            NetworkError::ServerRejected(_) => "server_rejected",
        }
    }
}

/// Registration service operations, behind a trait so the workflow can be
/// exercised without a live server. Neither operation retries; both are
/// safe for the caller to retry.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    async fn register(&self, input: &VisitorInput)
        -> Result<RegistrationResult, NetworkError>;
    async fn lookup_by_phone(&self, phone: &str)
        -> Result<RegistrationResult, NetworkError>;
}

/// Registration request body.
///
/// `pincode` is sent as a string, not a number: the service validates it as
/// a fixed six-digit code and numeric coercion would drop leading zeros.
#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    address: &'a str,
    pincode: &'a str,
}

impl<'a> RegisterRequest<'a> {
    fn from_input(input: &'a VisitorInput) -> Self {
        Self {
            name: &input.name,
            email: &input.email,
            phone: &input.mobile_phone,
            address: &input.city,
            pincode: &input.pincode,
        }
    }
}

/// Response body shared by both endpoints
#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    /// Identifier - can be a JSON string or an integer
    #[serde(default, deserialize_with = "deserialize_user_id")]
    user_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Accept `user_id` as string or number, preserving string values exactly
/// (a quoted "00042" must not lose its leading zeros)
fn deserialize_user_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct UserIdVisitor;

    impl<'de> Visitor<'de> for UserIdVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer user id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(UserIdVisitor)
}

/// Map an answered request to a `RegistrationResult`.
///
/// `parsed` is `None` when the body was not valid JSON. Pure, so the status
/// and body mapping is testable without a server.
fn interpret_response(
    status_ok: bool,
    parsed: Option<WireResponse>,
    fallback: &str,
) -> RegistrationResult {
    match parsed {
        Some(body) if status_ok => match body.user_id {
            Some(id) => RegistrationResult::accepted(VisitorId(id)),
            None => RegistrationResult::rejected(
                body.message.unwrap_or_else(|| fallback.to_string()),
            ),
        },
        Some(body) => RegistrationResult::rejected(
            body.message.unwrap_or_else(|| fallback.to_string()),
        ),
        None if status_ok => {
            RegistrationResult::rejected("Invalid server response. Please try again.")
        }
        None => RegistrationResult::rejected(fallback),
    }
}

fn map_transport(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout
    } else if e.is_connect() {
        NetworkError::Unreachable(e.to_string())
    } else {
        NetworkError::ServerRejected(e.to_string())
    }
}

/// Read and parse the response body. A body that is not valid JSON is an
/// answered-but-unintelligible response (`Ok(None)`); a connection that
/// dies mid-body never answered and stays a transport error.
async fn read_body(response: reqwest::Response) -> Result<Option<WireResponse>, NetworkError> {
    match response.json::<WireResponse>().await {
        Ok(body) => Ok(Some(body)),
        Err(e) if e.is_decode() => Ok(None),
        Err(e) => Err(map_transport(e)),
    }
}

/// HTTP client for the registration service. The inner `reqwest::Client`
/// is built once with the configured timeout (connection pooling).
pub struct RegistrationClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistrationClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).http1_only().build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RegistrationApi for RegistrationClient {
    async fn register(
        &self,
        input: &VisitorInput,
    ) -> Result<RegistrationResult, NetworkError> {
        let trimmed = input.trimmed();
        let body = RegisterRequest::from_input(&trimmed);

        let response = self
            .client
            .post(self.endpoint("/register/"))
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let parsed = read_body(response).await?;
        let result = interpret_response(
            status.is_success(),
            parsed,
            "Failed to register. Try again.",
        );

        if result.success {
            info!(
                status = %status.as_u16(),
                visitor_id = %result.visitor_id.as_ref().map(|id| id.as_str()).unwrap_or(""),
                "register_accepted"
            );
        } else {
            warn!(
                status = %status.as_u16(),
                message = %result.error_message.as_deref().unwrap_or(""),
                "register_rejected"
            );
        }

        Ok(result)
    }

    async fn lookup_by_phone(
        &self,
        phone: &str,
    ) -> Result<RegistrationResult, NetworkError> {
        // Rejected locally before any request is issued
        if phone.len() != 10 || !phone.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NetworkError::InvalidInput(
                "Please enter a valid 10-digit mobile number.".to_string(),
            ));
        }

        let response = self
            .client
            .get(self.endpoint("/getUserId"))
            .query(&[("phone", phone)])
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let parsed = read_body(response).await?;
        let result =
            interpret_response(status.is_success(), parsed, "User not registered.");

        if result.success {
            info!(
                status = %status.as_u16(),
                visitor_id = %result.visitor_id.as_ref().map(|id| id.as_str()).unwrap_or(""),
                "lookup_found"
            );
        } else {
            warn!(status = %status.as_u16(), "lookup_not_found");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_wire_shape() {
        let input = VisitorInput {
            name: "Asha Rao".to_string(),
            email: "a@b.com".to_string(),
            mobile_phone: "9876543210".to_string(),
            city: "Pune".to_string(),
            pincode: "411045".to_string(),
        };

        let value = serde_json::to_value(RegisterRequest::from_input(&input)).unwrap();
        assert_eq!(value["name"], "Asha Rao");
        assert_eq!(value["email"], "a@b.com");
        assert_eq!(value["phone"], "9876543210");
        assert_eq!(value["address"], "Pune");
        assert_eq!(value["pincode"], "411045");
    }

    #[test]
    fn test_pincode_leading_zero_survives_serialization() {
        let input = VisitorInput {
            pincode: "087123".to_string(),
            mobile_phone: "0987654321".to_string(),
            ..Default::default()
        };

        let value = serde_json::to_value(RegisterRequest::from_input(&input)).unwrap();
        // Must stay a string: numeric coercion would drop the zeros
        assert_eq!(value["pincode"], serde_json::json!("087123"));
        assert_eq!(value["phone"], serde_json::json!("0987654321"));
    }

    #[test]
    fn test_user_id_as_string_preserved_exactly() {
        let body: WireResponse = serde_json::from_str(r#"{"user_id":"00042"}"#).unwrap();
        assert_eq!(body.user_id.as_deref(), Some("00042"));
    }

    #[test]
    fn test_user_id_as_number() {
        let body: WireResponse = serde_json::from_str(r#"{"user_id":123}"#).unwrap();
        assert_eq!(body.user_id.as_deref(), Some("123"));
    }

    #[test]
    fn test_user_id_null_or_missing() {
        let body: WireResponse = serde_json::from_str(r#"{"user_id":null}"#).unwrap();
        assert!(body.user_id.is_none());

        let body: WireResponse = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert!(body.user_id.is_none());
        assert_eq!(body.message.as_deref(), Some("nope"));
    }

    #[test]
    fn test_interpret_success() {
        let body = WireResponse { user_id: Some("123".to_string()), message: None };
        let result = interpret_response(true, Some(body), "fallback");
        assert!(result.success);
        assert_eq!(result.visitor_id, Some(VisitorId::from("123")));
    }

    #[test]
    fn test_interpret_success_status_without_user_id() {
        let body = WireResponse { user_id: None, message: None };
        let result = interpret_response(true, Some(body), "User not registered.");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("User not registered."));
    }

    #[test]
    fn test_interpret_rejection_uses_server_message() {
        let body =
            WireResponse { user_id: None, message: Some("Phone already exists".to_string()) };
        let result = interpret_response(false, Some(body), "fallback");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Phone already exists"));
    }

    #[test]
    fn test_interpret_malformed_body_on_success_status() {
        let result = interpret_response(true, None, "fallback");
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Invalid server response. Please try again.")
        );
    }

    #[tokio::test]
    async fn test_lookup_rejects_short_phone_without_request() {
        // Unroutable base URL: if validation failed to short-circuit, the
        // call would fail differently (or hang on a real resolver)
        let client =
            RegistrationClient::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();

        let err = client.lookup_by_phone("12345").await.unwrap_err();
        assert!(matches!(err, NetworkError::InvalidInput(_)));

        let err = client.lookup_by_phone("98765x4321").await.unwrap_err();
        assert!(matches!(err, NetworkError::InvalidInput(_)));
    }

    /// Serve exactly one connection with a canned HTTP response, then
    /// drop the socket
    async fn one_shot_server(response: &'static [u8]) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_body_abort_mid_response_is_transport_error() {
        // content-length promises more than the socket ever delivers
        let addr = one_shot_server(
            b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\n{\"user_id\"",
        )
        .await;
        let client =
            RegistrationClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();

        let err = client.lookup_by_phone("9876543210").await.unwrap_err();
        assert!(
            matches!(err, NetworkError::ServerRejected(_)),
            "expected transport error, got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_garbage_body_on_success_status_is_rejection_not_error() {
        let addr = one_shot_server(
            b"HTTP/1.1 200 OK\r\ncontent-length: 9\r\n\r\nnot json!",
        )
        .await;
        let client =
            RegistrationClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();

        let result = client.lookup_by_phone("9876543210").await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Invalid server response. Please try again.")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client =
            RegistrationClient::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();

        let err = client.lookup_by_phone("9876543210").await.unwrap_err();
        assert!(
            matches!(err, NetworkError::Unreachable(_) | NetworkError::Timeout),
            "expected transport error, got {err:?}"
        );
    }
}
