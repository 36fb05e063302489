//! Typed handles over the payOS REST resources.
//!
//! Handles are cheap views that borrow a [`PayOsClient`] and forward a
//! [`CallOptions`] to every call they make:
//!
//! ```ignore
//! let link = client
//!     .payment_requests()
//!     .with_options(CallOptions::default().with_max_retries(0))
//!     .get(123_456)
//!     .await?;
//! ```

use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::client::PayOsClient;

pub mod batch;
pub mod invoices;
pub mod payment_requests;
pub mod payouts;
pub mod payouts_account;
pub mod webhooks;

pub use batch::{Batch, PayoutBatchItem, PayoutBatchRequest};
pub use invoices::{Invoice, Invoices, InvoicesInfo};
pub use payment_requests::{
    CreatePaymentLinkRequest, CreatePaymentLinkResponse, InvoiceRequest, PaymentLink,
    PaymentLinkItem, PaymentLinkStatus, PaymentRequests, Transaction,
};
pub use payouts::{
    EstimateCredit, EstimateCreditRequest, Payout, PayoutApprovalState, PayoutListParams,
    PayoutRequest, PayoutTransaction, PayoutTransactionState, Payouts,
};
pub use payouts_account::{PayoutAccountInfo, PayoutsAccount};
pub use webhooks::{ConfirmWebhookResponse, Webhooks};

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escapes `value` for use as one path segment.
pub(crate) fn segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Identifies a payment link either by its id or by the merchant order code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentLinkRef {
    /// The payment link id assigned by payOS.
    Id(String),
    /// The merchant's order code.
    OrderCode(i64),
}

impl PaymentLinkRef {
    pub(crate) fn to_segment(&self) -> String {
        match self {
            Self::Id(id) => segment(id),
            Self::OrderCode(code) => code.to_string(),
        }
    }
}

impl fmt::Display for PaymentLinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => f.write_str(id),
            Self::OrderCode(code) => write!(f, "{code}"),
        }
    }
}

impl From<&str> for PaymentLinkRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_owned())
    }
}

impl From<String> for PaymentLinkRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<i64> for PaymentLinkRef {
    fn from(order_code: i64) -> Self {
        Self::OrderCode(order_code)
    }
}

impl PayOsClient {
    /// Payment links (`/v2/payment-requests`).
    #[must_use]
    pub fn payment_requests(&self) -> PaymentRequests<'_> {
        PaymentRequests::new(self)
    }

    /// Payouts (`/v1/payouts`).
    #[must_use]
    pub fn payouts(&self) -> Payouts<'_> {
        Payouts::new(self)
    }

    /// The payout account (`/v1/payouts-account`).
    #[must_use]
    pub fn payouts_account(&self) -> PayoutsAccount<'_> {
        PayoutsAccount::new(self)
    }

    /// Webhook registration and verification.
    #[must_use]
    pub fn webhooks(&self) -> Webhooks<'_> {
        Webhooks::new(self)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::{Value, json};
    use wiremock::MockServer;

    use crate::client::PayOsClient;
    use crate::config::ClientConfig;

    pub(crate) const CHECKSUM_KEY: &str = "checksum";

    pub(crate) fn client_for(server: &MockServer) -> PayOsClient {
        let config = ClientConfig::new("client-id", "api-key", CHECKSUM_KEY)
            .with_base_url(server.uri())
            .with_max_retries(0);
        PayOsClient::try_new(config).unwrap()
    }

    pub(crate) fn ok(data: &Value) -> Value {
        json!({"code": "00", "desc": "success", "data": data})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_link_ref_segments() {
        assert_eq!(PaymentLinkRef::from(42).to_segment(), "42");
        assert_eq!(PaymentLinkRef::from("abc123").to_segment(), "abc123");
        assert_eq!(PaymentLinkRef::from("a/b c").to_segment(), "a%2Fb%20c");
        assert_eq!(PaymentLinkRef::from(String::from("x")).to_string(), "x");
    }
}
