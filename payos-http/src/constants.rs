//! Wire constants shared across the client.

use std::time::Duration;

use http::HeaderName;

/// Production API endpoint.
pub const BASE_URL: &str = "https://api-merchant.payos.vn";

/// Per-attempt timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Retries after the first attempt when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Page size used by list endpoints when the caller does not pick one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Value of the `user-agent` header.
pub const USER_AGENT: &str = concat!("payOS/Rust ", env!("CARGO_PKG_VERSION"));

pub(crate) const X_CLIENT_ID: HeaderName = HeaderName::from_static("x-client-id");
pub(crate) const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
pub(crate) const X_PARTNER_CODE: HeaderName = HeaderName::from_static("x-partner-code");
pub(crate) const X_SIGNATURE: HeaderName = HeaderName::from_static("x-signature");
pub(crate) const X_IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("x-idempotency-key");
pub(crate) const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Headers whose values never reach the logs.
pub(crate) const SENSITIVE_HEADERS: [&str; 4] = ["x-client-id", "x-api-key", "authorization", "cookie"];
