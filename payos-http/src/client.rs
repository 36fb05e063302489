//! The request executor.
//!
//! [`PayOsClient`] turns one [`RequestOptions`] into one or more HTTP
//! attempts. Each attempt:
//!
//! 1. signs the JSON body (or sets `x-signature`) according to the
//!    descriptor's [`RequestSigning`] mode,
//! 2. races the exchange against the caller's cancellation token and the
//!    per-attempt timeout,
//! 3. classifies the outcome into success, a retryable failure, or a
//!    terminal [`Error`].
//!
//! Retryable failures (connection errors, timeouts, 408, 429, 5xx) sleep per
//! the [`RetryPolicy`](crate::RetryPolicy) and try again while budget
//! remains. Successful envelopes are checked against their signature before
//! `data` is returned.
//!
//! Every log line carries the chain's correlation id (`log_xxxxxx`). The
//! checksum key, signatures, and credential headers are never logged.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use payos::crypto::{CryptoProvider, SignatureOptions, default_provider, verify_hex};
use payos::error::is_retryable_status;
use payos::{ApiError, Envelope, Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::constants::{
    SENSITIVE_HEADERS, USER_AGENT as USER_AGENT_VALUE, X_API_KEY, X_CLIENT_ID, X_PARTNER_CODE,
    X_SIGNATURE,
};
use crate::download::FileDownload;
use crate::request::{
    RequestBody, RequestOptions, RequestSigning, ResponseSigning, SignatureOpts, merge_headers,
    query_pairs, validate_timeout,
};
use crate::retry::RetryState;

/// A payOS API client.
///
/// Cheap to clone; clones share configuration and the connection pool.
#[derive(Clone)]
pub struct PayOsClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    base_url: Url,
    http: reqwest::Client,
    crypto: Arc<dyn CryptoProvider>,
    default_headers: HeaderMap,
}

impl fmt::Debug for PayOsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayOsClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// A 2xx response with its body fully read.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Why a single attempt did not produce a 2xx response.
enum AttemptFailure {
    /// No response: connection failure, timeout or cancellation.
    Transport(ApiError),
    /// A non-2xx response.
    Status(RawResponse),
}

/// What a single attempt sends.
struct PreparedRequest {
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl PayOsClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a credential is empty, the base URL does
    /// not parse, a credential is not a valid header value, or the HTTP
    /// client cannot be built.
    pub fn try_new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut normalized = config.base_url.trim_end_matches('/').to_owned();
        normalized.push('/');
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("invalid base URL {:?}: {e}", config.base_url)))?;

        let http = match &config.http_client {
            Some(client) => client.clone(),
            None => reqwest::Client::builder()
                .build()
                .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?,
        };
        let crypto = config.crypto.clone().unwrap_or_else(default_provider);
        let default_headers = default_headers(&config)?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                base_url,
                http,
                crypto,
                default_headers,
            }),
        })
    }

    /// Builds a client from `PAYOS_*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`] and [`PayOsClient::try_new`].
    pub fn from_env() -> Result<Self> {
        Self::try_new(ClientConfig::from_env()?)
    }

    /// Returns the configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the normalized base URL (always ends with `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Returns the HMAC backend.
    #[must_use]
    pub fn crypto(&self) -> &Arc<dyn CryptoProvider> {
        &self.inner.crypto
    }

    pub(crate) fn checksum_key(&self) -> &str {
        &self.inner.config.checksum_key
    }

    /// Performs a JSON call and returns the envelope's verified `data`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for a timeout that is not whole milliseconds
    /// - [`Error::InvalidSignature`] if the body cannot be signed or the
    ///   response signature does not match
    /// - [`Error::Api`] for transport, HTTP status and application failures
    /// - [`Error::Json`] if a 2xx body is not an envelope or `data` does not
    ///   decode into `T`
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "payos.request",
            skip_all,
            fields(
                method = %options.method,
                path = %options.path,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            )
        )
    )]
    pub async fn request<T: DeserializeOwned>(&self, options: RequestOptions) -> Result<T> {
        let result = self.request_inner(&options).await;
        record_result_on_span(&result);
        result
    }

    async fn request_inner<T: DeserializeOwned>(&self, options: &RequestOptions) -> Result<T> {
        let raw = self.execute(options, "request").await?;
        let envelope: Envelope = serde_json::from_slice(&raw.body)?;

        if !envelope.is_success() {
            let payload = json!({
                "code": envelope.code,
                "desc": envelope.desc,
                "data": envelope.data,
            });
            return Err(ApiError::from_status(
                Some(raw.status),
                Some(&payload),
                Some(envelope.desc.as_str()),
                Some(raw.headers),
            )
            .into());
        }

        let data = envelope.data.unwrap_or(Value::Null);
        if let Some(mode) = options.signature.response {
            self.verify_response(mode, &data, envelope.signature.as_deref(), &raw.headers)?;
        }
        Ok(serde_json::from_value(data)?)
    }

    /// Downloads a binary resource. Never signs or verifies.
    ///
    /// A 2xx response with a JSON `content-type` is an error envelope and is
    /// raised as an [`ApiErrorKind::Application`](payos::ApiErrorKind) error.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request), minus signature errors.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "payos.download",
            skip_all,
            fields(
                method = %options.method,
                path = %options.path,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            )
        )
    )]
    pub async fn download(&self, mut options: RequestOptions) -> Result<FileDownload> {
        options.signature = SignatureOpts::default();
        let result = self.download_inner(&options).await;
        record_result_on_span(&result);
        result
    }

    async fn download_inner(&self, options: &RequestOptions) -> Result<FileDownload> {
        let raw = self.execute(options, "file download").await?;
        let is_json = raw
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));
        if is_json {
            let envelope: Envelope = serde_json::from_slice(&raw.body)?;
            let payload = json!({"code": envelope.code, "desc": envelope.desc});
            return Err(ApiError::from_status(
                Some(raw.status),
                Some(&payload),
                Some(envelope.desc.as_str()),
                Some(raw.headers),
            )
            .into());
        }
        Ok(FileDownload::from_parts(&raw.headers, raw.body))
    }

    /// `GET path` using `options` for everything else.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(with_route(options, Method::GET, path)).await
    }

    /// `POST path` using `options` for everything else.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(with_route(options, Method::POST, path)).await
    }

    /// `PUT path` using `options` for everything else.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(with_route(options, Method::PUT, path)).await
    }

    /// `PATCH path` using `options` for everything else.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(with_route(options, Method::PATCH, path)).await
    }

    /// `DELETE path` using `options` for everything else.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(with_route(options, Method::DELETE, path)).await
    }

    /// Runs the attempt loop until a 2xx response or a terminal error.
    async fn execute(&self, options: &RequestOptions, kind: &'static str) -> Result<RawResponse> {
        let max_retries = options.max_retries.unwrap_or(self.inner.config.max_retries);
        let timeout = options.timeout.unwrap_or(self.inner.config.timeout);
        validate_timeout(timeout)?;

        let policy = self.inner.config.retry_policy;
        let mut state = RetryState::new(max_retries);

        loop {
            let prepared = self.prepare(options)?;
            let log_id = state.correlation_id();
            tracing::debug!(
                log_id,
                attempt = state.attempt(),
                method = %options.method,
                url = %prepared.url,
                headers = %SanitizedHeaders(&prepared.headers),
                "sending {kind}"
            );

            let started = Instant::now();
            let failure = match self
                .send(&options.method, prepared, timeout, options.cancel.as_ref())
                .await
            {
                Ok(raw) => {
                    tracing::debug!(
                        log_id,
                        status = raw.status.as_u16(),
                        elapsed_ms = elapsed_ms(started),
                        "{} {} succeeded",
                        options.method,
                        options.path
                    );
                    return Ok(raw);
                }
                Err(failure) => failure,
            };

            let (error, retryable, headers) = match failure {
                AttemptFailure::Transport(error) => {
                    let retryable = error.is_retryable();
                    (error, retryable, None)
                }
                AttemptFailure::Status(raw) => {
                    let retryable = is_retryable_status(raw.status);
                    let headers = raw.headers.clone();
                    (classify_status(raw), retryable, Some(headers))
                }
            };

            if retryable && state.can_retry() {
                let delay = policy.delay_for(state.attempt(), headers.as_ref());
                tracing::info!(
                    log_id,
                    status = error.status().map(|s| s.as_u16()),
                    elapsed_ms = elapsed_ms(started),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "{} {} failed: {error}; retrying, {} attempts remaining",
                    options.method,
                    options.path,
                    state.retries_remaining()
                );
                tokio::time::sleep(delay).await;
                state.advance();
                continue;
            }

            let verdict = if retryable {
                "no more retries left"
            } else {
                "cannot retry"
            };
            tracing::info!(
                log_id,
                status = error.status().map(|s| s.as_u16()),
                elapsed_ms = elapsed_ms(started),
                "{} {} failed: {error}; {verdict}",
                options.method,
                options.path
            );
            return Err(error.into());
        }
    }

    /// One HTTP exchange, raced against cancellation and the timeout.
    async fn send(
        &self,
        method: &Method,
        prepared: PreparedRequest,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> std::result::Result<RawResponse, AttemptFailure> {
        let mut builder = self
            .inner
            .http
            .request(method.clone(), prepared.url)
            .headers(prepared.headers);
        if let Some(body) = prepared.body {
            builder = builder.body(body);
        }

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(RawResponse {
                status,
                headers,
                body,
            })
        };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(AttemptFailure::Transport(ApiError::user_abort(None))),
            () = tokio::time::sleep(timeout) => Err(AttemptFailure::Transport(ApiError::timeout(None))),
            result = exchange => match result {
                Ok(raw) if raw.status.is_success() => Ok(raw),
                Ok(raw) => Err(AttemptFailure::Status(raw)),
                Err(err) => {
                    tracing::debug!(error = %err, "transport error");
                    let error = if err.is_timeout() {
                        ApiError::timeout(None)
                    } else {
                        ApiError::connection(None)
                    };
                    Err(AttemptFailure::Transport(error))
                }
            },
        }
    }

    /// Derives URL, headers and body for one attempt.
    fn prepare(&self, options: &RequestOptions) -> Result<PreparedRequest> {
        let mut url = self
            .inner
            .base_url
            .join(options.path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidArgument(format!("invalid path {:?}: {e}", options.path)))?;
        if !options.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query_pairs(&options.query) {
                pairs.append_pair(key, &value);
            }
        }

        let (body, signature) = self.sign(options)?;

        let mut headers = self.inner.default_headers.clone();
        merge_headers(&mut headers, &options.headers);
        if let Some(signature) = signature {
            headers.insert(X_SIGNATURE, signature);
        }

        let body = match body {
            Some(RequestBody::Json(value)) => Some(Bytes::from(serde_json::to_vec(&value)?)),
            Some(RequestBody::Bytes(bytes)) => Some(bytes),
            None => None,
        };
        Ok(PreparedRequest { url, headers, body })
    }

    /// Applies request signing. Returns the body to send and, in header
    /// mode, the `x-signature` value.
    fn sign(&self, options: &RequestOptions) -> Result<(Option<RequestBody>, Option<HeaderValue>)> {
        let (mode, mut json) = match (options.signature.request, options.body.clone()) {
            (Some(mode), Some(RequestBody::Json(json))) => (mode, json),
            (Some(_), Some(RequestBody::Bytes(_))) => {
                return Err(Error::InvalidSignature("Cannot sign a non-JSON body".into()));
            }
            (_, body) => return Ok((body, None)),
        };

        let crypto = &self.inner.crypto;
        let key = self.checksum_key();
        match mode {
            RequestSigning::CreatePaymentLink => {
                let signature = crypto.sign_payment_request(&json, key).ok_or_else(|| {
                    Error::InvalidSignature("Failed to create payment signature".into())
                })?;
                insert_signature(&mut json, signature);
                Ok((Some(RequestBody::Json(json)), None))
            }
            RequestSigning::Body => {
                let signature = crypto.sign_object(&json, key).ok_or_else(|| {
                    Error::InvalidSignature("Failed to create body signature".into())
                })?;
                insert_signature(&mut json, signature);
                Ok((Some(RequestBody::Json(json)), None))
            }
            RequestSigning::Header => {
                let signature = crypto
                    .create_signature(key, &json, &SignatureOptions::default())
                    .ok_or_else(|| {
                        Error::InvalidSignature("Failed to create header signature".into())
                    })?;
                let value = HeaderValue::from_str(&signature).map_err(|_| {
                    Error::InvalidSignature("Failed to create header signature".into())
                })?;
                Ok((Some(RequestBody::Json(json)), Some(value)))
            }
        }
    }

    /// Checks the response signature over `data`. An absent signature passes.
    fn verify_response(
        &self,
        mode: ResponseSigning,
        data: &Value,
        body_signature: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<()> {
        let received = match mode {
            ResponseSigning::Body => body_signature,
            ResponseSigning::Header => headers.get(X_SIGNATURE).and_then(|v| v.to_str().ok()),
        };
        let Some(received) = received.filter(|s| !s.is_empty()) else {
            return Ok(());
        };

        let crypto = &self.inner.crypto;
        let key = self.checksum_key();
        let expected = match mode {
            ResponseSigning::Body => crypto.sign_object(data, key),
            ResponseSigning::Header => {
                crypto.create_signature(key, data, &SignatureOptions::default())
            }
        };
        if expected.is_some_and(|expected| verify_hex(&expected, received)) {
            Ok(())
        } else {
            Err(Error::InvalidSignature("Data integrity check failed".into()))
        }
    }
}

fn with_route(mut options: RequestOptions, method: Method, path: impl Into<String>) -> RequestOptions {
    options.method = method;
    options.path = path.into();
    options
}

fn insert_signature(body: &mut Value, signature: String) {
    if let Value::Object(map) = body {
        map.insert("signature".to_owned(), Value::String(signature));
    }
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let value = |name: &str, raw: &str, sensitive: bool| {
        let mut value = HeaderValue::from_str(raw)
            .map_err(|_| Error::Config(format!("{name} is not a valid header value")))?;
        value.set_sensitive(sensitive);
        Ok::<_, Error>(value)
    };

    let mut headers = HeaderMap::new();
    headers.insert(X_CLIENT_ID, value("client_id", &config.client_id, true)?);
    headers.insert(X_API_KEY, value("api_key", &config.api_key, true)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    if let Some(partner_code) = config.partner_code.as_deref().filter(|p| !p.is_empty()) {
        headers.insert(X_PARTNER_CODE, value("partner_code", partner_code, false)?);
    }
    Ok(headers)
}

/// Turns a non-2xx response into a classified error.
fn classify_status(raw: RawResponse) -> ApiError {
    let json = serde_json::from_slice::<Value>(&raw.body).ok();
    let text = match json {
        Some(_) => None,
        None => Some(String::from_utf8_lossy(&raw.body).into_owned()),
    };
    ApiError::from_status(
        Some(raw.status),
        json.as_ref(),
        text.as_deref(),
        Some(raw.headers),
    )
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Formats headers for logs with credentials masked.
struct SanitizedHeaders<'a>(&'a HeaderMap);

impl fmt::Display for SanitizedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.0 {
            if SENSITIVE_HEADERS.contains(&name.as_str()) || *name == X_SIGNATURE {
                map.entry(&name.as_str(), &"***");
            } else {
                map.entry(&name.as_str(), &value.to_str().unwrap_or("<binary>"));
            }
        }
        map.finish()
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R>(result: &Result<R>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "payOS request failed");
        }
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R>(_result: &Result<R>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use payos::ApiErrorKind;
    use serde::Deserialize;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const CHECKSUM_KEY: &str = "test-checksum-key";

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: String,
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5))
    }

    fn client_for(server: &MockServer) -> PayOsClient {
        let config = ClientConfig::new("client-id", "api-key", CHECKSUM_KEY)
            .with_base_url(server.uri())
            .with_retry_policy(fast_policy());
        PayOsClient::try_new(config).unwrap()
    }

    fn ok_envelope(data: &Value) -> Value {
        json!({"code": "00", "desc": "success", "data": data})
    }

    fn api_kind(err: &Error) -> ApiErrorKind {
        err.as_api().map(ApiError::kind).expect("api error")
    }

    #[test]
    fn test_try_new_rejects_bad_config() {
        assert!(matches!(
            PayOsClient::try_new(ClientConfig::new("", "a", "k")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PayOsClient::try_new(ClientConfig::new("c", "a", "k").with_base_url("not a url")),
            Err(Error::Config(_))
        ));
        let client = PayOsClient::try_new(ClientConfig::new("c", "a", "k")).unwrap();
        assert_eq!(client.base_url().as_str(), "https://api-merchant.payos.vn/");
        assert!(!format!("{client:?}").contains("\"a\""));
    }

    #[tokio::test]
    async fn test_sends_default_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/things"))
            .and(query_param("limit", "10"))
            .and(query_param("tags", "[\"a\",\"b\"]"))
            .and(header("x-client-id", "client-id"))
            .and(header("x-api-key", "api-key"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", USER_AGENT_VALUE))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "t1"}))))
            .expect(1)
            .mount(&server)
            .await;

        let thing: Thing = client_for(&server)
            .request(
                RequestOptions::get("/v1/things")
                    .with_query("limit", 10)
                    .with_query("tags", json!(["a", "b"])),
            )
            .await
            .unwrap();
        assert_eq!(thing.id, "t1");
    }

    #[tokio::test]
    async fn test_partner_code_and_header_override() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/things"))
            .and(header("x-partner-code", "partner"))
            .and(header("content-type", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "t"}))))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig::new("client-id", "api-key", CHECKSUM_KEY)
            .with_base_url(server.uri())
            .with_partner_code("partner");
        let client = PayOsClient::try_new(config).unwrap();
        let _: Thing = client
            .request(
                RequestOptions::get("/v1/things")
                    .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].headers.get_all("content-type").iter().count(), 1);
    }

    #[tokio::test]
    async fn test_retries_503_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "ok"}))))
            .expect(1)
            .mount(&server)
            .await;

        let thing: Thing = client_for(&server)
            .request(RequestOptions::get("/v1/flaky").with_max_retries(2))
            .await
            .unwrap();
        assert_eq!(thing.id, "ok");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/limited"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"code": "429", "desc": "Too many requests"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request::<Thing>(RequestOptions::get("/v1/limited").with_max_retries(1))
            .await
            .unwrap_err();
        assert_eq!(api_kind(&err), ApiErrorKind::RateLimited);
        let api = err.as_api().unwrap();
        assert_eq!(api.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(api.message(), "HTTP 429, Too many requests (code: 429)");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_after_header_sets_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/slow"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/slow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "late"}))))
            .mount(&server)
            .await;

        let started = Instant::now();
        let thing: Thing = client_for(&server)
            .request(RequestOptions::get("/v1/slow").with_max_retries(1))
            .await
            .unwrap();
        let elapsed = started.elapsed();
        assert_eq!(thing.id, "late");
        assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3000), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nothing here"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request::<Thing>(RequestOptions::get("/v1/missing"))
            .await
            .unwrap_err();
        assert_eq!(api_kind(&err), ApiErrorKind::NotFound);
        assert_eq!(err.to_string(), "HTTP 404, nothing here");
    }

    #[tokio::test]
    async fn test_application_error_on_http_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/payment-requests/1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": "01", "desc": "fail", "data": null})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request::<Thing>(RequestOptions::get("/v2/payment-requests/1"))
            .await
            .unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.kind(), ApiErrorKind::Application);
        assert_eq!(api.status(), Some(StatusCode::OK));
        assert_eq!(api.code(), Some("01"));
        assert_eq!(api.message(), "HTTP 200, fail (code: 01)");
    }

    #[tokio::test]
    async fn test_invalid_json_on_success_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request::<Thing>(RequestOptions::get("/v1/garbled"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_body_signing_and_verification() {
        let server = MockServer::start().await;
        let provider = default_provider();
        let data = json!({"id": "pl_1", "amount": 2000, "status": "PENDING"});
        let signature = provider.sign_object(&data, CHECKSUM_KEY).unwrap();
        let request_body = json!({"amount": 2000, "description": "x"});
        let request_signature = provider.sign_object(&request_body, CHECKSUM_KEY).unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/signed"))
            .and(body_partial_json(json!({"signature": request_signature})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "00", "desc": "success", "data": data, "signature": signature,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let thing: Thing = client_for(&server)
            .request(
                RequestOptions::post("/v1/signed")
                    .with_json(request_body)
                    .with_request_signing(RequestSigning::Body)
                    .with_response_signing(ResponseSigning::Body),
            )
            .await
            .unwrap();
        assert_eq!(thing.id, "pl_1");
    }

    #[tokio::test]
    async fn test_tampered_body_signature_fails() {
        let server = MockServer::start().await;
        let data = json!({"id": "pl_1", "amount": 2000});
        let mut signature = default_provider().sign_object(&data, CHECKSUM_KEY).unwrap();
        let flipped = if signature.ends_with('0') { '1' } else { '0' };
        signature.pop();
        signature.push(flipped);

        Mock::given(method("GET"))
            .and(path("/v1/signed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "00", "desc": "success", "data": data, "signature": signature,
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request::<Thing>(
                RequestOptions::get("/v1/signed").with_response_signing(ResponseSigning::Body),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_missing_response_signature_passes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/unsigned"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "u"}))))
            .mount(&server)
            .await;

        let thing: Thing = client_for(&server)
            .request(
                RequestOptions::get("/v1/unsigned").with_response_signing(ResponseSigning::Header),
            )
            .await
            .unwrap();
        assert_eq!(thing.id, "u");
    }

    #[tokio::test]
    async fn test_header_signing_round_trip() {
        let server = MockServer::start().await;
        let provider = default_provider();
        let body = json!({"referenceId": "r1", "amount": 1000, "toBin": "970422"});
        let request_signature = provider
            .create_signature(CHECKSUM_KEY, &body, &SignatureOptions::default())
            .unwrap();
        let data = json!({"id": "po_1"});
        let response_signature = provider
            .create_signature(CHECKSUM_KEY, &data, &SignatureOptions::default())
            .unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/payouts/"))
            .and(header("x-signature", request_signature.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-signature", response_signature.as_str())
                    .set_body_json(ok_envelope(&data)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let thing: Thing = client_for(&server)
            .request(
                RequestOptions::post("/v1/payouts/")
                    .with_json(body.clone())
                    .with_request_signing(RequestSigning::Header)
                    .with_response_signing(ResponseSigning::Header),
            )
            .await
            .unwrap();
        assert_eq!(thing.id, "po_1");

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent, body);
    }

    #[tokio::test]
    async fn test_payment_link_signing_inserts_signature() {
        let server = MockServer::start().await;
        let body = json!({
            "orderCode": 123,
            "amount": 2000,
            "description": "Thanh toan",
            "cancelUrl": "https://shop.vn/cancel",
            "returnUrl": "https://shop.vn/ok",
        });
        let expected = default_provider()
            .sign_payment_request(&body, CHECKSUM_KEY)
            .unwrap();
        Mock::given(method("POST"))
            .and(path("/v2/payment-requests"))
            .and(body_partial_json(json!({"signature": expected, "orderCode": 123})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "pl"}))))
            .expect(1)
            .mount(&server)
            .await;

        let _: Thing = client_for(&server)
            .request(
                RequestOptions::post("/v2/payment-requests")
                    .with_json(body)
                    .with_request_signing(RequestSigning::CreatePaymentLink),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unsignable_body_fails_before_network() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .request::<Thing>(
                RequestOptions::post("/v1/x")
                    .with_json(json!(["not", "an", "object"]))
                    .with_request_signing(RequestSigning::Body),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signing_raw_body_fails_before_network() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .request::<Thing>(
                RequestOptions::post("/v1/x")
                    .with_bytes(&b"{\"amount\":1}"[..])
                    .with_request_signing(RequestSigning::Header),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            Error::InvalidSignature(msg) if msg == "Cannot sign a non-JSON body"
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sub_millisecond_timeout_rejected() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .request::<Thing>(RequestOptions::get("/v1/x").with_timeout(Duration::from_micros(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/hang"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(ok_envelope(&json!({"id": "never"}))),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request::<Thing>(
                RequestOptions::get("/v1/hang")
                    .with_timeout(Duration::from_millis(50))
                    .with_max_retries(1),
            )
            .await
            .unwrap_err();
        assert_eq!(api_kind(&err), ApiErrorKind::ConnectionTimeout);
        assert_eq!(err.to_string(), "Request timed out.");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_beats_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/hang"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = client_for(&server)
            .request::<Thing>(
                RequestOptions::get("/v1/hang")
                    .with_timeout(Duration::from_secs(10))
                    .with_max_retries(3)
                    .with_cancellation(token),
            )
            .await
            .unwrap_err();
        assert_eq!(api_kind(&err), ApiErrorKind::UserAbort);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_sends_nothing() {
        let server = MockServer::start().await;
        let token = CancellationToken::new();
        token.cancel();
        let err = client_for(&server)
            .request::<Thing>(RequestOptions::get("/v1/x").with_cancellation(token))
            .await
            .unwrap_err();
        assert_eq!(api_kind(&err), ApiErrorKind::UserAbort);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::new("c", "a", "k")
            .with_base_url(format!("http://{addr}"))
            .with_retry_policy(fast_policy())
            .with_max_retries(1);
        let err = PayOsClient::try_new(config)
            .unwrap()
            .request::<Thing>(RequestOptions::get("/v1/x"))
            .await
            .unwrap_err();
        assert_eq!(api_kind(&err), ApiErrorKind::Connection);
        assert_eq!(err.to_string(), "Connection error.");
    }

    #[tokio::test]
    async fn test_connection_errors_use_full_retry_budget() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                drop(stream);
            }
        });

        let config = ClientConfig::new("c", "a", "k")
            .with_base_url(format!("http://{addr}"))
            .with_retry_policy(fast_policy())
            .with_max_retries(2);
        let err = PayOsClient::try_new(config)
            .unwrap()
            .request::<Thing>(RequestOptions::get("/v1/x"))
            .await
            .unwrap_err();
        assert_eq!(api_kind(&err), ApiErrorKind::Connection);
        assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/files/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"inv.pdf\"")
                    .set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"),
            )
            .mount(&server)
            .await;

        let file = client_for(&server)
            .download(RequestOptions::get("/v2/files/1"))
            .await
            .unwrap();
        assert_eq!(file.filename.as_deref(), Some("inv.pdf"));
        assert_eq!(file.content_type, "application/pdf");
        assert_eq!(file.size, Some(8));
        assert_eq!(&file.data[..], b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_download_json_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/files/2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": "20", "desc": "Invoice not found"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .download(RequestOptions::get("/v2/files/2"))
            .await
            .unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.kind(), ApiErrorKind::Application);
        assert_eq!(api.code(), Some("20"));
    }

    #[tokio::test]
    async fn test_verbs_override_route() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/things/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "9"}))))
            .expect(1)
            .mount(&server)
            .await;

        let thing: Thing = client_for(&server)
            .delete("/v1/things/9", RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(thing.id, "9");
    }

    #[tokio::test]
    async fn test_retry_chain_rebuilds_each_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/retry-body"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/retry-body"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(&json!({"id": "r"}))))
            .mount(&server)
            .await;

        let _: Thing = client_for(&server)
            .request(
                RequestOptions::post("/v1/retry-body")
                    .with_json(json!({"a": 1}))
                    .with_request_signing(RequestSigning::Body),
            )
            .await
            .unwrap();
        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, requests[1].body);
    }

    #[test]
    fn test_sanitized_headers_mask_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(X_CLIENT_ID, HeaderValue::from_static("client"));
        headers.insert(X_API_KEY, HeaderValue::from_static("secret"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let rendered = SanitizedHeaders(&headers).to_string();
        assert!(!rendered.contains("client\""));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("application/json"));
    }
}
