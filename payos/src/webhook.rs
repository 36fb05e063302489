//! Inbound webhook payloads and their verification.
//!
//! payOS POSTs a [`Webhook`] to the merchant's registered URL after each
//! payment. Its `signature` is an HMAC-SHA256 over `data` in the sorted,
//! unencoded `key=value` form ([`CryptoProvider::sign_object`]).
//!
//! Verification needs only the checksum key, so it lives here rather than
//! in the HTTP crate. Servers receiving webhooks can call [`verify_bytes`]
//! directly on the request body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{CryptoProvider, verify_hex};
use crate::error::{Error, Result};

/// The body payOS sends to a merchant webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    /// Status token; `"00"` on a successful payment.
    #[serde(default)]
    pub code: String,
    /// Description of `code`.
    #[serde(default)]
    pub desc: String,
    /// Whether payOS considers the payment successful.
    #[serde(default)]
    pub success: bool,
    /// The signed payload. Kept as raw JSON so verification sees exactly
    /// what was signed, including fields this crate does not model.
    #[serde(default)]
    pub data: Option<Value>,
    /// HMAC over `data`.
    #[serde(default)]
    pub signature: Option<String>,
}

/// Payment details carried by a verified webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    /// Merchant order code.
    pub order_code: i64,
    /// Amount received, in VND.
    pub amount: i64,
    /// Transfer description.
    pub description: String,
    /// Receiving account number.
    pub account_number: String,
    /// Bank transaction reference.
    pub reference: String,
    /// Bank-reported transaction time.
    pub transaction_date_time: String,
    /// Currency code.
    pub currency: String,
    /// Payment link this transfer settled.
    pub payment_link_id: String,
    /// Payment status token.
    pub code: String,
    /// Description of `code`.
    pub desc: String,
    /// Payer bank id, if known.
    #[serde(default)]
    pub counter_account_bank_id: Option<String>,
    /// Payer bank name, if known.
    #[serde(default)]
    pub counter_account_bank_name: Option<String>,
    /// Payer account holder, if known.
    #[serde(default)]
    pub counter_account_name: Option<String>,
    /// Payer account number, if known.
    #[serde(default)]
    pub counter_account_number: Option<String>,
    /// Virtual account holder, if used.
    #[serde(default)]
    pub virtual_account_name: Option<String>,
    /// Virtual account number, if used.
    #[serde(default)]
    pub virtual_account_number: Option<String>,
}

impl Webhook {
    /// Checks the signature over `data` and returns the typed payload.
    ///
    /// # Errors
    ///
    /// - [`Error::Webhook`] `"Invalid webhook data"` if `data` is missing
    /// - [`Error::Webhook`] `"Invalid signature"` if `signature` is missing
    /// - [`Error::Webhook`] `"Data not integrity"` if the signature does not match
    /// - [`Error::Webhook`] `"Invalid webhook data: .."` if verified data does
    ///   not decode into [`WebhookData`]
    pub fn verify(&self, provider: &dyn CryptoProvider, checksum_key: &str) -> Result<WebhookData> {
        let data = self.verify_raw(provider, checksum_key)?;
        serde_json::from_value(data.clone()).map_err(invalid_data)
    }

    /// Like [`verify`](Self::verify) but returns `data` undecoded.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify), minus decoding.
    pub fn verify_raw(&self, provider: &dyn CryptoProvider, checksum_key: &str) -> Result<&Value> {
        let data = match &self.data {
            Some(data) if !data.is_null() => data,
            _ => return Err(Error::Webhook("Invalid webhook data".into())),
        };
        let signature = match self.signature.as_deref() {
            Some(signature) if !signature.is_empty() => signature,
            _ => return Err(Error::Webhook("Invalid signature".into())),
        };
        match provider.sign_object(data, checksum_key) {
            Some(expected) if verify_hex(&expected, signature) => Ok(data),
            _ => Err(Error::Webhook("Data not integrity".into())),
        }
    }
}

/// Parses a raw webhook body and verifies it.
///
/// # Errors
///
/// [`Error::Webhook`] if the body is not a webhook, otherwise as
/// [`Webhook::verify`].
pub fn verify_bytes(
    body: &[u8],
    provider: &dyn CryptoProvider,
    checksum_key: &str,
) -> Result<WebhookData> {
    let webhook: Webhook = serde_json::from_slice(body).map_err(invalid_data)?;
    webhook.verify(provider, checksum_key)
}

fn invalid_data(err: serde_json::Error) -> Error {
    Error::Webhook(format!("Invalid webhook data: {err}"))
}
