use reqwest::StatusCode;
use serde_json::Value;
use std::error::Error;

/// Whatever went wrong while talking to the transport itself.
pub type TransportError = Box<dyn Error + Send + Sync + 'static>;

/// The message every caller sees when the backend rejects our credentials.
pub const AUTHENTICATION_REQUIRED: &str =
    "Authentication required. Please login again.";

/// Keys the backend may put an error message under, in order of preference.
const MESSAGE_KEYS: &[&str] = &["detail", "message", "error"];

/// The normalized error returned by every API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server couldn't be reached at all.
    #[error(
        "Unable to reach the clinic backend at {}. Make sure the server is running.",
        base_url
    )]
    Network {
        base_url: String,
        #[source]
        inner: TransportError,
    },
    /// The server didn't accept our bearer token (or we didn't have one).
    #[error("{}", AUTHENTICATION_REQUIRED)]
    Auth,
    /// Any other non-success response.
    #[error("{}", message)]
    Http { status: StatusCode, message: String },
    /// The server said the request succeeded, but we couldn't read the body.
    #[error("Unable to parse the response")]
    Parse(#[from] serde_json::Error),
    /// The request body couldn't be serialized, so nothing was sent.
    #[error("Unable to encode the request body")]
    Encode(#[source] serde_json::Error),
}

impl ApiError {
    /// The HTTP status this error came from, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Auth => Some(StatusCode::UNAUTHORIZED),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Network { .. }
            | ApiError::Parse(_)
            | ApiError::Encode(_) => None,
        }
    }

    pub fn is_auth(&self) -> bool { matches!(self, ApiError::Auth) }

    /// Turn a non-success response into an error.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> ApiError {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Auth;
        }

        let message = extract_message(body)
            .unwrap_or_else(|| synthesize_message(status));

        ApiError::Http { status, message }
    }
}

/// Try to find a human-readable message in an error payload.
fn extract_message(body: &[u8]) -> Option<String> {
    let payload: Value = serde_json::from_slice(body).ok()?;
    let object = payload.as_object()?;

    MESSAGE_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(message_from)
}

fn message_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        // FastAPI reports validation failures as a list of
        // {"loc": [...], "msg": "...", "type": "..."}
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();

            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        },
        _ => None,
    }
}

fn synthesize_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {}: {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}
