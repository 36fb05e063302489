//! HMAC signing for payOS requests, responses and webhooks.
//!
//! A [`CryptoProvider`] supplies one primitive, a hex-encoded HMAC, plus
//! idempotency-key generation. The signing protocols are provided methods
//! on top of that primitive, so every backend produces identical output for
//! identical input:
//!
//! - [`CryptoProvider::sign_object`] - sorted `key=value` form, unencoded, HMAC-SHA256
//! - [`CryptoProvider::create_signature`] - sorted form with configurable encoding,
//!   array sorting and digest
//! - [`CryptoProvider::sign_payment_request`] - the fixed five-field form used when
//!   creating a payment link
//!
//! All signing methods return `None` when the key is empty, the data is
//! `null`, or the data has no canonical form. Callers treat `None` as
//! "cannot sign".

pub mod canonical;
mod rustcrypto;

#[cfg(feature = "ring")]
mod ring_backend;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use canonical::{PAYMENT_REQUEST_FIELDS, canonical_query, payment_request_message};
#[cfg(feature = "ring")]
pub use ring_backend::RingProvider;
pub use rustcrypto::RustCryptoProvider;

/// Digest used inside the HMAC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// HMAC-SHA1. Accepted by a few legacy endpoints.
    Sha1,
    /// HMAC-SHA256.
    #[default]
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

/// Knobs for [`CryptoProvider::create_signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureOptions {
    /// Percent-encode keys and values with the `encodeURIComponent` set.
    pub encode_uri: bool,
    /// Sort array elements by their rendered form before signing.
    pub sort_arrays: bool,
    /// HMAC digest.
    pub algorithm: SignatureAlgorithm,
}

impl Default for SignatureOptions {
    /// Header-signature defaults: encoded, arrays in order, SHA-256.
    fn default() -> Self {
        Self {
            encode_uri: true,
            sort_arrays: false,
            algorithm: SignatureAlgorithm::Sha256,
        }
    }
}

impl SignatureOptions {
    /// Body-signature form: no encoding, arrays in order, SHA-256.
    #[must_use]
    pub const fn unencoded() -> Self {
        Self {
            encode_uri: false,
            sort_arrays: false,
            algorithm: SignatureAlgorithm::Sha256,
        }
    }

    /// Sets the digest.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// A source of HMACs and idempotency keys.
///
/// Implementations must be deterministic: the same algorithm, key and
/// message always yield the same lowercase hex string.
pub trait CryptoProvider: Send + Sync + fmt::Debug {
    /// Computes `HMAC(algorithm, key, message)` as lowercase hex.
    fn hmac_hex(&self, algorithm: SignatureAlgorithm, key: &[u8], message: &[u8])
    -> Option<String>;

    /// Returns a fresh random UUID v4 string.
    fn new_uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Signs `data` in its sorted, unencoded `key=value` form with HMAC-SHA256.
    fn sign_object(&self, data: &Value, key: &str) -> Option<String> {
        self.create_signature(key, data, &SignatureOptions::unencoded())
    }

    /// Signs `data` in its sorted `key=value` form using `options`.
    fn create_signature(
        &self,
        key: &str,
        data: &Value,
        options: &SignatureOptions,
    ) -> Option<String> {
        if key.is_empty() || data.is_null() {
            return None;
        }
        let message = canonical_query(data, options)?;
        self.hmac_hex(options.algorithm, key.as_bytes(), message.as_bytes())
    }

    /// Signs a payment-link creation request over its five fixed fields.
    fn sign_payment_request(&self, data: &Value, key: &str) -> Option<String> {
        if key.is_empty() || data.is_null() {
            return None;
        }
        let message = payment_request_message(data)?;
        self.hmac_hex(SignatureAlgorithm::Sha256, key.as_bytes(), message.as_bytes())
    }
}

/// Returns the provider used when none is configured.
#[must_use]
pub fn default_provider() -> Arc<dyn CryptoProvider> {
    #[cfg(feature = "ring")]
    {
        Arc::new(RingProvider)
    }
    #[cfg(not(feature = "ring"))]
    {
        Arc::new(RustCryptoProvider)
    }
}

/// Compares two hex signatures in constant time, ignoring ASCII case.
#[must_use]
pub fn verify_hex(expected: &str, actual: &str) -> bool {
    let (a, b) = (expected.as_bytes(), actual.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b)
        .fold(0u8, |acc, (x, y)| {
            acc | (x.to_ascii_lowercase() ^ y.to_ascii_lowercase())
        })
        == 0
}
