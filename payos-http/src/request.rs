//! The request descriptor handed to the executor.
//!
//! A [`RequestOptions`] is built once per logical call and never mutated by
//! the executor; every retry re-derives URL, headers and body from it.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use payos::{Error, Result};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// How the outgoing request is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSigning {
    /// Five-field payment-link signature, written into the body as `signature`.
    CreatePaymentLink,
    /// Sorted-object signature, written into the body as `signature`.
    Body,
    /// Encoded sorted-object signature, sent as the `x-signature` header.
    Header,
}

/// Where the response signature is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSigning {
    /// The envelope's `signature` field, over `data`.
    Body,
    /// The `x-signature` response header, over `data`.
    Header,
}

/// Signing modes for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureOpts {
    /// Applied to the outgoing JSON body, if any.
    pub request: Option<RequestSigning>,
    /// Checked against the response `data`, if any.
    pub response: Option<ResponseSigning>,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized as JSON. The only kind that can be signed.
    Json(Value),
    /// Sent verbatim.
    Bytes(Bytes),
}

/// Caller-tunable settings that resource handles forward to every call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Per-attempt timeout; falls back to the client default.
    pub timeout: Option<Duration>,
    /// Retry budget; falls back to the client default.
    pub max_retries: Option<u32>,
    /// Aborts the call when cancelled.
    pub cancel: Option<CancellationToken>,
    /// Extra headers. Replace client headers with the same name.
    pub headers: HeaderMap,
}

impl CallOptions {
    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Everything needed to perform one logical API call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Map<String, Value>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) headers: HeaderMap,
    pub(crate) signature: SignatureOpts,
    pub(crate) timeout: Option<Duration>,
    pub(crate) max_retries: Option<u32>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Creates a descriptor for `method path`.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Sets or replaces a query parameter, keeping its original position.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Sets a query parameter only when `value` is `Some`.
    #[must_use]
    pub fn with_optional_query<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_query(key, value),
            None => self,
        }
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Serializes `body` and sets it as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `body` cannot be represented as JSON.
    pub fn with_serialized<T: serde::Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        Ok(self.with_json(serde_json::to_value(body)?))
    }

    /// Sets a raw body.
    #[must_use]
    pub fn with_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Sets a header, replacing any value with the same name.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a header from a string value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is not a valid header value.
    pub fn try_with_header(self, name: HeaderName, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidArgument(format!("invalid value for header {name}")))?;
        Ok(self.with_header(name, value))
    }

    /// Sets the request signing mode.
    #[must_use]
    pub const fn with_request_signing(mut self, signing: RequestSigning) -> Self {
        self.signature.request = Some(signing);
        self
    }

    /// Sets the response verification mode.
    #[must_use]
    pub const fn with_response_signing(mut self, signing: ResponseSigning) -> Self {
        self.signature.response = Some(signing);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Applies caller settings on top of this descriptor.
    #[must_use]
    pub fn with_call_options(mut self, call: &CallOptions) -> Self {
        if let Some(timeout) = call.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(max_retries) = call.max_retries {
            self.max_retries = Some(max_retries);
        }
        if let Some(cancel) = &call.cancel {
            self.cancel = Some(cancel.clone());
        }
        merge_headers(&mut self.headers, &call.headers);
        self
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path relative to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query parameters in insertion order.
    #[must_use]
    pub const fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    /// Returns the body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Returns the header overrides.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the signing modes.
    #[must_use]
    pub const fn signature(&self) -> SignatureOpts {
        self.signature
    }
}

/// Replaces every header in `base` that `overrides` names, then appends
/// all override values.
pub(crate) fn merge_headers(base: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        base.remove(name);
    }
    for (name, value) in overrides {
        base.append(name.clone(), value.clone());
    }
}

/// Renders query values the way they go on the wire.
pub(crate) fn query_pairs(query: &Map<String, Value>) -> impl Iterator<Item = (&str, String)> {
    query.iter().map(|(key, value)| {
        let rendered = match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => value.to_string(),
        };
        (key.as_str(), rendered)
    })
}

/// A timeout must be a whole number of milliseconds.
pub(crate) fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.subsec_nanos() % 1_000_000 != 0 {
        return Err(Error::InvalidArgument(format!(
            "timeout must be a whole number of milliseconds, got {timeout:?}"
        )));
    }
    Ok(())
}
