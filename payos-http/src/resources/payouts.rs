//! Payouts to bank accounts.
//!
//! Payout calls use header signing both ways: the request body is signed
//! into `x-signature`, and the response's `x-signature` covers `data`.
//! Creation is idempotent per `x-idempotency-key`; when the caller does not
//! supply one, a random UUID v4 is used.

use chrono::{DateTime, SecondsFormat, Utc};
use payos::Result;
use serde::{Deserialize, Serialize};

use super::batch::{Batch, PayoutBatchRequest};
use super::segment;
use crate::client::PayOsClient;
use crate::constants::{DEFAULT_PAGE_LIMIT, X_IDEMPOTENCY_KEY};
use crate::pagination::Page;
use crate::request::{CallOptions, RequestOptions, RequestSigning, ResponseSigning};

/// State of a single payout transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PayoutTransactionState {
    Received,
    Processing,
    Cancelled,
    Succeeded,
    OnHold,
    Reversed,
    Failed,
}

/// Approval state of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PayoutApprovalState {
    Drafting,
    Submitted,
    Approved,
    Rejected,
    Cancelled,
    Scheduled,
    Processing,
    Failed,
    PartialCompleted,
    Completed,
}

impl PayoutApprovalState {
    /// The wire name, e.g. `PARTIAL_COMPLETED`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drafting => "DRAFTING",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Scheduled => "SCHEDULED",
            Self::Processing => "PROCESSING",
            Self::Failed => "FAILED",
            Self::PartialCompleted => "PARTIAL_COMPLETED",
            Self::Completed => "COMPLETED",
        }
    }
}

/// Body of `POST /v1/payouts/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Merchant reference, unique per payout.
    pub reference_id: String,
    /// Amount in VND.
    pub amount: i64,
    /// Transfer description.
    pub description: String,
    /// Destination bank BIN.
    pub to_bin: String,
    /// Destination account number.
    pub to_account_number: String,
    /// Merchant-defined categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
}

/// Body of `POST /v1/payouts/estimate-credit`: a single payout or a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EstimateCreditRequest {
    /// A batch of payouts.
    Batch(PayoutBatchRequest),
    /// One payout.
    Single(PayoutRequest),
}

impl From<PayoutRequest> for EstimateCreditRequest {
    fn from(request: PayoutRequest) -> Self {
        Self::Single(request)
    }
}

impl From<PayoutBatchRequest> for EstimateCreditRequest {
    fn from(request: PayoutBatchRequest) -> Self {
        Self::Batch(request)
    }
}

/// One transfer inside a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PayoutTransaction {
    pub id: String,
    pub reference_id: String,
    pub amount: i64,
    pub description: String,
    pub to_bin: String,
    pub to_account_number: String,
    #[serde(default)]
    pub to_account_name: Option<String>,
    /// Bank reference once the transfer is executed.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub transaction_datetime: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    pub state: PayoutTransactionState,
}

/// A payout and its transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    /// Payout id.
    pub id: String,
    /// Merchant reference.
    pub reference_id: String,
    /// Transfers in this payout; one for single payouts.
    #[serde(default)]
    pub transactions: Vec<PayoutTransaction>,
    /// Merchant-defined categories.
    #[serde(default)]
    pub category: Option<Vec<String>>,
    /// Approval state.
    pub approval_state: PayoutApprovalState,
    /// Creation time, ISO 8601.
    pub created_at: String,
}

/// Credit needed to execute a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateCredit {
    /// Estimated credit in VND.
    pub estimate_credit: i64,
}

/// Filters for `GET /v1/payouts`.
///
/// Unset fields are left out of the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutListParams {
    /// Exact merchant reference.
    pub reference_id: Option<String>,
    /// Approval state.
    pub approval_state: Option<PayoutApprovalState>,
    /// Any of these categories.
    pub category: Vec<String>,
    /// Created at or after.
    pub from_date: Option<DateTime<Utc>>,
    /// Created at or before.
    pub to_date: Option<DateTime<Utc>>,
    /// Page size. Defaults to 10.
    pub limit: Option<u32>,
    /// Items to skip. Defaults to 0.
    pub offset: Option<u32>,
}

impl Default for PayoutListParams {
    fn default() -> Self {
        Self {
            reference_id: None,
            approval_state: None,
            category: Vec::new(),
            from_date: None,
            to_date: None,
            limit: Some(DEFAULT_PAGE_LIMIT),
            offset: Some(0),
        }
    }
}

impl PayoutListParams {
    fn apply(&self, options: RequestOptions) -> RequestOptions {
        let date = |at: &DateTime<Utc>| at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let category = (!self.category.is_empty()).then(|| self.category.join(","));
        options
            .with_optional_query("referenceId", self.reference_id.clone())
            .with_optional_query("approvalState", self.approval_state.map(PayoutApprovalState::as_str))
            .with_optional_query("category", category)
            .with_optional_query("fromDate", self.from_date.as_ref().map(date))
            .with_optional_query("toDate", self.to_date.as_ref().map(date))
            .with_optional_query("limit", self.limit)
            .with_optional_query("offset", self.offset)
    }
}

/// Handle for `/v1/payouts`.
#[derive(Debug, Clone)]
pub struct Payouts<'a> {
    client: &'a PayOsClient,
    options: CallOptions,
}

impl<'a> Payouts<'a> {
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

    /// Batch payouts.
    #[must_use]
    pub fn batch(&self) -> Batch<'a> {
        Batch::new(self.client).with_options(self.options.clone())
    }

    /// Creates a payout.
    ///
    /// Reuse the same `idempotency_key` when retrying a create so the server
    /// recognizes the duplicate.
    ///
    /// # Errors
    ///
    /// [`payos::Error::InvalidArgument`] if the key is not a valid header
    /// value, otherwise see [`PayOsClient::request`].
    pub async fn create(
        &self,
        request: &PayoutRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Payout> {
        let options = idempotent_post(self.client, "/v1/payouts/", idempotency_key)?
            .with_serialized(request)?
            .with_request_signing(RequestSigning::Header)
            .with_response_signing(ResponseSigning::Header)
            .with_call_options(&self.options);
        self.client.request(options).await
    }

    /// Retrieves a payout.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::request`].
    pub async fn get(&self, payout_id: &str) -> Result<Payout> {
        let options = RequestOptions::get(format!("/v1/payouts/{}", segment(payout_id)))
            .with_response_signing(ResponseSigning::Header)
            .with_call_options(&self.options);
        self.client.request(options).await
    }

    /// Estimates the credit a payout or batch would consume.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::request`].
    pub async fn estimate_credit(
        &self,
        request: impl Into<EstimateCreditRequest>,
    ) -> Result<EstimateCredit> {
        let options = RequestOptions::post("/v1/payouts/estimate-credit")
            .with_serialized(&request.into())?
            .with_request_signing(RequestSigning::Header)
            .with_call_options(&self.options);
        self.client.request(options).await
    }

    /// Lists payouts matching `params`.
    ///
    /// # Errors
    ///
    /// See [`Page::fetch`].
    pub async fn list(&self, params: &PayoutListParams) -> Result<Page<Payout>> {
        let options = params
            .apply(RequestOptions::get("/v1/payouts"))
            .with_response_signing(ResponseSigning::Header)
            .with_call_options(&self.options);
        Page::fetch(self.client, options).await
    }
}

/// A `POST` carrying `x-idempotency-key`, generated when not supplied.
pub(crate) fn idempotent_post(
    client: &PayOsClient,
    path: &str,
    idempotency_key: Option<&str>,
) -> Result<RequestOptions> {
    let key = match idempotency_key {
        Some(key) => key.to_owned(),
        None => client.crypto().new_uuid(),
    };
    RequestOptions::post(path).try_with_header(X_IDEMPOTENCY_KEY, &key)
}
