//! The payOS response envelope.
//!
//! Every JSON endpoint answers with the same wrapper:
//!
//! ```json
//! {"code": "00", "desc": "success", "data": {...}, "signature": "ab12..."}
//! ```
//!
//! `code == "00"` is the only success sentinel, regardless of HTTP status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `code` value that marks a successful envelope.
pub const SUCCESS_CODE: &str = "00";

/// Wire wrapper returned by every payOS JSON endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    /// Status token; `"00"` on success.
    #[serde(default)]
    pub code: String,

    /// Human-readable description of `code`.
    #[serde(default)]
    pub desc: String,

    /// Response payload. JSON `null` decodes as `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// HMAC over `data`, present on body-signed endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl<T> Envelope<T> {
    /// Creates a successful envelope around `data`.
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE.to_owned(),
            desc: "success".to_owned(),
            data: Some(data),
            signature: None,
        }
    }

    /// Attaches a signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Returns `true` if `code` is `"00"` and `data` is present.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE && self.data.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_requires_code_and_data() {
        let ok: Envelope = serde_json::from_value(json!({
            "code": "00", "desc": "success", "data": {"id": "x"}
        }))
        .unwrap();
        assert!(ok.is_success());

        let failed: Envelope = serde_json::from_value(json!({"code": "01", "desc": "fail"})).unwrap();
        assert!(!failed.is_success());

        let null_data: Envelope =
            serde_json::from_value(json!({"code": "00", "desc": "success", "data": null})).unwrap();
        assert!(!null_data.is_success());
    }

    #[test]
    fn test_missing_fields_default() {
        let env: Envelope = serde_json::from_value(json!({})).unwrap();
        assert_eq!(env.code, "");
        assert!(env.signature.is_none());
        assert!(!env.is_success());
    }
}
