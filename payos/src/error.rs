//! Error types for the payOS SDK.
//!
//! [`Error`] is the single error type returned by every fallible operation in
//! the SDK. Failures that come back from the API (or never reach it) are
//! carried by [`ApiError`], whose [`ApiErrorKind`] is derived from the HTTP
//! status by [`ApiError::from_status`].

use std::fmt;

use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Convenience alias used throughout the SDK.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Base error type for payOS operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client configuration is missing or malformed (e.g. absent credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied argument was rejected before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The API call failed at the transport, HTTP or application level.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A request signature could not be produced, or a response signature
    /// did not match the data it covers.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A webhook payload was malformed or forged, or webhook confirmation
    /// failed.
    #[error("webhook error: {0}")]
    Webhook(String),

    /// A success payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_retryable())
    }

    /// Returns the underlying [`ApiError`], if this is an API failure.
    #[must_use]
    pub const fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The connection failed before a response arrived.
    Connection,
    /// The per-request timeout elapsed before a response arrived.
    ConnectionTimeout,
    /// The caller cancelled the request.
    UserAbort,
    /// HTTP succeeded but the envelope reported a failure code.
    Application,
    /// HTTP 400.
    BadRequest,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    InternalServer,
    /// Any other non-success status.
    Status,
}

impl ApiErrorKind {
    /// Returns `true` for failures that never produced an HTTP response.
    #[must_use]
    pub const fn is_transport(self) -> bool {
        matches!(
            self,
            Self::Connection | Self::ConnectionTimeout | Self::UserAbort
        )
    }

    fn for_status(status: StatusCode) -> Self {
        match status.as_u16() {
            200..=299 => Self::Application,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::InternalServer,
            _ => Self::Status,
        }
    }
}

/// Application-level error details parsed from a response body.
///
/// `code` and `desc` are the payOS status token and description, distinct
/// from the HTTP status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorPayload {
    /// payOS error code (e.g. `"01"`).
    pub code: Option<String>,
    /// Human-readable description supplied by payOS.
    pub desc: Option<String>,
    /// A free-form `message` field, when the body carries one.
    pub message: Option<Value>,
    /// The object the fields above were read from.
    pub raw: Value,
}

impl ErrorPayload {
    /// Extracts error details from a parsed response body.
    ///
    /// A nested `error` object takes precedence over the top-level fields.
    /// Returns `None` for non-object bodies.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let source = match value.get("error") {
            Some(inner @ Value::Object(_)) => inner,
            _ => value,
        };
        let object = source.as_object()?;
        Some(Self {
            code: object.get("code").and_then(scalar_to_string),
            desc: object.get("desc").and_then(scalar_to_string),
            message: object.get("message").filter(|m| !m.is_null()).cloned(),
            raw: source.clone(),
        })
    }

    /// Builds the human-readable part of an error message.
    fn summary(&self) -> Option<String> {
        if let (Some(code), Some(desc)) = (&self.code, &self.desc) {
            return Some(format!("{desc} (code: {code})"));
        }
        match &self.message {
            Some(Value::String(message)) => return Some(message.clone()),
            Some(other) => return Some(other.to_string()),
            None => {}
        }
        match &self.raw {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A failed payOS API call.
///
/// Transport failures ([`ApiErrorKind::is_transport`]) never carry a status
/// or headers.
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: ApiErrorKind,
    status: Option<StatusCode>,
    headers: Option<HeaderMap>,
    payload: Option<ErrorPayload>,
    message: String,
}

impl ApiError {
    /// Classifies a failed response into a typed error.
    ///
    /// When either `status` or `headers` is absent the failure is treated as
    /// a connection error. `message` is used only when the payload yields no
    /// better description.
    #[must_use]
    pub fn from_status(
        status: Option<StatusCode>,
        payload: Option<&Value>,
        message: Option<&str>,
        headers: Option<HeaderMap>,
    ) -> Self {
        let (Some(status), Some(headers)) = (status, headers) else {
            return Self::connection(message);
        };
        let payload = payload.and_then(ErrorPayload::from_value);
        let message = compose_message(Some(status), payload.as_ref(), message);
        Self {
            kind: ApiErrorKind::for_status(status),
            status: Some(status),
            headers: Some(headers),
            payload,
            message,
        }
    }

    /// A connection-level failure with no response.
    #[must_use]
    pub fn connection(message: Option<&str>) -> Self {
        Self::transport(
            ApiErrorKind::Connection,
            message.unwrap_or("Connection error."),
        )
    }

    /// The per-request timeout elapsed.
    #[must_use]
    pub fn timeout(message: Option<&str>) -> Self {
        Self::transport(
            ApiErrorKind::ConnectionTimeout,
            message.unwrap_or("Request timed out."),
        )
    }

    /// The caller cancelled the request.
    #[must_use]
    pub fn user_abort(message: Option<&str>) -> Self {
        Self::transport(
            ApiErrorKind::UserAbort,
            message.unwrap_or("Request was aborted."),
        )
    }

    fn transport(kind: ApiErrorKind, message: &str) -> Self {
        Self {
            kind,
            status: None,
            headers: None,
            payload: None,
            message: message.to_owned(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// Returns the HTTP status, if a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the response headers, if a response was received.
    #[must_use]
    pub const fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    /// Returns the parsed error body, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&ErrorPayload> {
        self.payload.as_ref()
    }

    /// Returns the payOS error code, if the body carried one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.payload.as_ref()?.code.as_deref()
    }

    /// Returns the payOS error description, if the body carried one.
    #[must_use]
    pub fn desc(&self) -> Option<&str> {
        self.payload.as_ref()?.desc.as_deref()
    }

    /// Returns the composed human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the failure is transient: connection failures,
    /// timeouts, and HTTP 408, 429 or 5xx.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ApiErrorKind::Connection | ApiErrorKind::ConnectionTimeout => true,
            ApiErrorKind::UserAbort => false,
            _ => self.status.is_some_and(is_retryable_status),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// Returns `true` for statuses worth retrying: 408, 429 and 5xx.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn compose_message(
    status: Option<StatusCode>,
    payload: Option<&ErrorPayload>,
    fallback: Option<&str>,
) -> String {
    let msg = payload
        .and_then(ErrorPayload::summary)
        .or_else(|| fallback.filter(|m| !m.is_empty()).map(str::to_owned));
    match (status, msg) {
        (Some(status), Some(msg)) => format!("HTTP {}, {msg}", status.as_u16()),
        (Some(status), None) => format!("HTTP {}", status.as_u16()),
        (None, Some(msg)) => msg,
        (None, None) => "No status code or body".to_owned(),
    }
}
