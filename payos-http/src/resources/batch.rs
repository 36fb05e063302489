//! Batch payouts.

use payos::Result;
use serde::{Deserialize, Serialize};

use super::payouts::{Payout, idempotent_post};
use crate::client::PayOsClient;
use crate::request::{CallOptions, RequestSigning, ResponseSigning};

/// One transfer in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PayoutBatchItem {
    pub reference_id: String,
    pub amount: i64,
    pub description: String,
    pub to_bin: String,
    pub to_account_number: String,
}

/// Body of `POST /v1/payouts/batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutBatchRequest {
    /// Merchant reference for the whole batch.
    pub reference_id: String,
    /// Ask payOS to check destination accounts before approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_destination: Option<bool>,
    /// Merchant-defined categories. Sent as `null` when unset.
    #[serde(default)]
    pub category: Option<Vec<String>>,
    /// The transfers.
    pub payouts: Vec<PayoutBatchItem>,
}

/// Handle for `/v1/payouts/batch`.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    client: &'a PayOsClient,
    options: CallOptions,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(client: &'a PayOsClient) -> Self {
        Self {
            client,
            options: CallOptions::default(),
        }
    }

    /// Applies `options` to every call made through this handle.
    #[must_use]
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Creates a batch payout.
    ///
    /// # Errors
    ///
    /// [`payos::Error::InvalidArgument`] if the key is not a valid header
    /// value, otherwise see [`PayOsClient::request`].
    pub async fn create(
        &self,
        request: &PayoutBatchRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Payout> {
        let options = idempotent_post(self.client, "/v1/payouts/batch", idempotency_key)?
            .with_serialized(request)?
            .with_request_signing(RequestSigning::Header)
            .with_response_signing(ResponseSigning::Header)
            .with_call_options(&self.options);
        self.client.request(options).await
    }
}
