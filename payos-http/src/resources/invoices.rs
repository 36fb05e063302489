//! E-invoices attached to payment links.

use payos::Result;
use serde::{Deserialize, Serialize};

use super::{PaymentLinkRef, segment};
use crate::client::PayOsClient;
use crate::download::FileDownload;
use crate::request::{CallOptions, RequestOptions, ResponseSigning};

/// One issued invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Invoice {
    pub invoice_id: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    /// Issue time, Unix seconds.
    #[serde(default)]
    pub issued_timestamp: Option<i64>,
    /// Issue time, ISO 8601.
    #[serde(default)]
    pub issued_datetime: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub reservation_code: Option<String>,
    #[serde(default)]
    pub code_of_tax: Option<String>,
}

/// Invoices of one payment link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicesInfo {
    /// Issued invoices, oldest first.
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

/// Handle for `/v2/payment-requests/{id}/invoices`.
#[derive(Debug, Clone)]
pub struct Invoices<'a> {
    client: &'a PayOsClient,
    options: CallOptions,
}

impl<'a> Invoices<'a> {
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

    /// Lists the invoices of a payment link.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::request`].
    pub async fn get(&self, id: impl Into<PaymentLinkRef>) -> Result<InvoicesInfo> {
        let path = format!("/v2/payment-requests/{}/invoices", id.into().to_segment());
        let options = RequestOptions::get(path)
            .with_response_signing(ResponseSigning::Body)
            .with_call_options(&self.options);
        self.client.request(options).await
    }

    /// Downloads one invoice as PDF.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::download`].
    pub async fn download(
        &self,
        invoice_id: &str,
        id: impl Into<PaymentLinkRef>,
    ) -> Result<FileDownload> {
        let path = format!(
            "/v2/payment-requests/{}/invoices/{}/download",
            id.into().to_segment(),
            segment(invoice_id)
        );
        let options = RequestOptions::get(path).with_call_options(&self.options);
        self.client.download(options).await
    }
}
