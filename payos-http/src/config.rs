//! Client configuration.
//!
//! A [`ClientConfig`] is built in code with [`ClientConfig::new`] and the
//! `with_*` methods, or loaded from the process environment.
//!
//! # Environment Variables
//!
//! - `PAYOS_CLIENT_ID`, `PAYOS_API_KEY`, `PAYOS_CHECKSUM_KEY` (required)
//! - `PAYOS_PARTNER_CODE`
//! - `PAYOS_BASE_URL` (default: `https://api-merchant.payos.vn`)
//! - `PAYOS_TIMEOUT_MS` (default: `60000`)
//! - `PAYOS_MAX_RETRIES` (default: `2`)
//!
//! Values are trimmed; an empty value counts as unset.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use payos::crypto::CryptoProvider;
use payos::{Error, Result};

use crate::constants::{BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use crate::retry::RetryPolicy;

/// Credentials and transport settings for a [`PayOsClient`](crate::PayOsClient).
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) client_id: String,
    pub(crate) api_key: String,
    pub(crate) checksum_key: String,
    pub(crate) partner_code: Option<String>,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) http_client: Option<reqwest::Client>,
    pub(crate) crypto: Option<Arc<dyn CryptoProvider>>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &"[REDACTED]")
            .field("api_key", &"[REDACTED]")
            .field("checksum_key", &"[REDACTED]")
            .field("partner_code", &self.partner_code)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_policy", &self.retry_policy)
            .field("crypto", &self.crypto)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Creates a configuration with the three required credentials and
    /// default transport settings.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        api_key: impl Into<String>,
        checksum_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            api_key: api_key.into(),
            checksum_key: checksum_key.into(),
            partner_code: None,
            base_url: BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_policy: RetryPolicy::default(),
            http_client: None,
            crypto: None,
        }
    }

    /// Loads the configuration from `PAYOS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing credential, or
    /// an unparsable timeout or retry count.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads `.env` from the working directory (if present), then calls
    /// [`from_env`](Self::from_env).
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if a `.env` file exists but cannot be read or
    /// parsed, otherwise the same as [`from_env`](Self::from_env).
    pub fn from_dotenv() -> Result<Self> {
        check_dotenv(dotenvy::dotenv())?;
        Self::from_env()
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            read(name).ok_or_else(|| {
                Error::Config(format!(
                    "the {name} environment variable is missing or empty"
                ))
            })
        };

        let mut config = Self::new(
            required("PAYOS_CLIENT_ID")?,
            required("PAYOS_API_KEY")?,
            required("PAYOS_CHECKSUM_KEY")?,
        );
        config.partner_code = read("PAYOS_PARTNER_CODE");
        if let Some(base_url) = read("PAYOS_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(timeout) = read("PAYOS_TIMEOUT_MS") {
            let millis: u64 = timeout.parse().map_err(|_| {
                Error::Config(format!("PAYOS_TIMEOUT_MS is not a whole number: {timeout}"))
            })?;
            config.timeout = Duration::from_millis(millis);
        }
        if let Some(retries) = read("PAYOS_MAX_RETRIES") {
            config.max_retries = retries.parse().map_err(|_| {
                Error::Config(format!("PAYOS_MAX_RETRIES is not a whole number: {retries}"))
            })?;
        }
        Ok(config)
    }

    /// Sets the partner code sent as `x-partner-code`.
    #[must_use]
    pub fn with_partner_code(mut self, partner_code: impl Into<String>) -> Self {
        self.partner_code = Some(partner_code.into());
        self
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the default per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the default number of retries after the first attempt.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces the backoff schedule.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Uses a pre-built `reqwest` client instead of a fresh one.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Replaces the HMAC backend.
    #[must_use]
    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Returns the client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the partner code, if any.
    #[must_use]
    pub fn partner_code(&self) -> Option<&str> {
        self.partner_code.as_deref()
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the default per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the default retry count.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the backoff schedule.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("api_key", &self.api_key),
            ("checksum_key", &self.checksum_key),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

/// A missing `.env` is fine; any other load failure is surfaced.
fn check_dotenv<T>(result: dotenvy::Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => {
            tracing::debug!(error = %err, "no .env file loaded");
            Ok(())
        }
        Err(err) => Err(Error::Config(format!("failed to load .env: {err}"))),
    }
}
