//! The merchant's payout account.

use payos::Result;
use serde::{Deserialize, Serialize};

use crate::client::PayOsClient;
use crate::request::{CallOptions, RequestOptions, ResponseSigning};

/// Balance of the payout account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutAccountInfo {
    /// Account number.
    pub account_number: String,
    /// Account holder.
    pub account_name: String,
    /// ISO 4217 code, normally `VND`.
    pub currency: String,
    /// Available balance as a decimal string.
    pub balance: String,
}

/// Handle for `/v1/payouts-account`.
#[derive(Debug, Clone)]
pub struct PayoutsAccount<'a> {
    client: &'a PayOsClient,
    options: CallOptions,
}

impl<'a> PayoutsAccount<'a> {
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

    /// Retrieves the current balance.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::request`].
    pub async fn balance(&self) -> Result<PayoutAccountInfo> {
        let options = RequestOptions::get("/v1/payouts-account/balance")
            .with_response_signing(ResponseSigning::Header)
            .with_call_options(&self.options);
        self.client.request(options).await
    }
}
