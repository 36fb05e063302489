//! Payment links.

use payos::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::PaymentLinkRef;
use super::invoices::Invoices;
use crate::client::PayOsClient;
use crate::request::{CallOptions, RequestOptions, RequestSigning, ResponseSigning};

/// Lifecycle state of a payment link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentLinkStatus {
    /// Waiting for payment.
    Pending,
    /// Cancelled by the merchant.
    Cancelled,
    /// Partially paid.
    Underpaid,
    /// Fully paid.
    Paid,
    /// Expired before full payment.
    Expired,
    /// A payment is being settled.
    Processing,
    /// Payment failed.
    Failed,
}

/// One line of the order shown on the checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkItem {
    /// Item name.
    pub name: String,
    /// Quantity.
    pub quantity: i64,
    /// Unit price.
    pub price: i64,
    /// Unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// VAT rate: `-2`, `-1`, `0`, `5` or `10`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_percentage: Option<i8>,
}

/// E-invoice options for a payment link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    /// The buyer does not want an invoice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_not_get_invoice: Option<bool>,
    /// VAT rate applied to the whole order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_percentage: Option<i8>,
}

/// Body of `POST /v2/payment-requests`.
///
/// The `signature` field is computed by the client from `amount`,
/// `cancelUrl`, `description`, `orderCode` and `returnUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentLinkRequest {
    /// Merchant order code, unique per merchant.
    pub order_code: i64,
    /// Amount in VND.
    pub amount: i64,
    /// Transfer description.
    pub description: String,
    /// Where the buyer lands after cancelling.
    pub cancel_url: String,
    /// Where the buyer lands after paying.
    pub return_url: String,
    /// Order lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PaymentLinkItem>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_company_name: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_tax_code: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_email: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_phone: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_address: Option<String>,
    /// E-invoice options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceRequest>,
    /// Expiry as a Unix timestamp in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
}

impl CreatePaymentLinkRequest {
    /// Creates a request with the five signed fields set.
    #[must_use]
    pub fn new(
        order_code: i64,
        amount: i64,
        description: impl Into<String>,
        cancel_url: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            order_code,
            amount,
            description: description.into(),
            cancel_url: cancel_url.into(),
            return_url: return_url.into(),
            items: Vec::new(),
            buyer_name: None,
            buyer_company_name: None,
            buyer_tax_code: None,
            buyer_email: None,
            buyer_phone: None,
            buyer_address: None,
            invoice: None,
            expired_at: None,
        }
    }

    /// Appends an order line.
    #[must_use]
    pub fn with_item(mut self, item: PaymentLinkItem) -> Self {
        self.items.push(item);
        self
    }

    /// Sets the expiry (Unix seconds).
    #[must_use]
    pub const fn with_expired_at(mut self, expired_at: i64) -> Self {
        self.expired_at = Some(expired_at);
        self
    }
}

/// A freshly created payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct CreatePaymentLinkResponse {
    pub bin: String,
    pub account_number: String,
    pub account_name: String,
    pub amount: i64,
    pub description: String,
    pub order_code: i64,
    pub currency: String,
    pub payment_link_id: String,
    pub status: PaymentLinkStatus,
    #[serde(default)]
    pub expired_at: Option<i64>,
    /// Hosted checkout page.
    pub checkout_url: String,
    /// VietQR payload.
    pub qr_code: String,
}

/// A payment received against a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Transaction {
    pub reference: String,
    pub amount: i64,
    pub account_number: String,
    pub description: String,
    pub transaction_date_time: String,
    #[serde(default)]
    pub virtual_account_name: Option<String>,
    #[serde(default)]
    pub virtual_account_number: Option<String>,
    #[serde(default)]
    pub counter_account_bank_id: Option<String>,
    #[serde(default)]
    pub counter_account_bank_name: Option<String>,
    #[serde(default)]
    pub counter_account_name: Option<String>,
    #[serde(default)]
    pub counter_account_number: Option<String>,
}

/// Current state of a payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    /// Payment link id.
    pub id: String,
    /// Merchant order code.
    pub order_code: i64,
    /// Requested amount.
    pub amount: i64,
    /// Received so far.
    pub amount_paid: i64,
    /// Still owed.
    pub amount_remaining: i64,
    /// Lifecycle state.
    pub status: PaymentLinkStatus,
    /// Creation time, ISO 8601.
    pub created_at: String,
    /// Payments received.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Reason given when the link was cancelled.
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    /// Cancellation time, ISO 8601.
    #[serde(default)]
    pub canceled_at: Option<String>,
}

/// Handle for `/v2/payment-requests`.
#[derive(Debug, Clone)]
pub struct PaymentRequests<'a> {
    client: &'a PayOsClient,
    options: CallOptions,
}

impl<'a> PaymentRequests<'a> {
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

    /// Invoices issued for payment links.
    #[must_use]
    pub fn invoices(&self) -> Invoices<'a> {
        Invoices::new(self.client).with_options(self.options.clone())
    }

    /// Creates a payment link.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::request`].
    pub async fn create(
        &self,
        request: &CreatePaymentLinkRequest,
    ) -> Result<CreatePaymentLinkResponse> {
        let options = RequestOptions::post("/v2/payment-requests")
            .with_serialized(request)?
            .with_request_signing(RequestSigning::CreatePaymentLink)
            .with_response_signing(ResponseSigning::Body)
            .with_call_options(&self.options);
        self.client.request(options).await
    }

    /// Retrieves a payment link by id or order code.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::request`].
    pub async fn get(&self, id: impl Into<PaymentLinkRef>) -> Result<PaymentLink> {
        let path = format!("/v2/payment-requests/{}", id.into().to_segment());
        let options = RequestOptions::get(path)
            .with_response_signing(ResponseSigning::Body)
            .with_call_options(&self.options);
        self.client.request(options).await
    }

    /// Cancels a payment link. An empty `reason` sends no body.
    ///
    /// # Errors
    ///
    /// See [`PayOsClient::request`].
    pub async fn cancel(
        &self,
        id: impl Into<PaymentLinkRef>,
        reason: Option<&str>,
    ) -> Result<PaymentLink> {
        let path = format!("/v2/payment-requests/{}/cancel", id.into().to_segment());
        let mut options = RequestOptions::post(path).with_response_signing(ResponseSigning::Body);
        if let Some(reason) = reason.filter(|reason| !reason.is_empty()) {
            options = options.with_json(json!({ "cancellationReason": reason }));
        }
        self.client
            .request(options.with_call_options(&self.options))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{CHECKSUM_KEY, client_for, ok};
    use payos::SignatureOptions;
    use serde_json::Value;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn link_json(status: &str) -> Value {
        json!({
            "id": "pl_1",
            "orderCode": 123,
            "amount": 2000,
            "amountPaid": 0,
            "amountRemaining": 2000,
            "status": status,
            "createdAt": "2025-01-01T00:00:00+07:00",
            "transactions": [],
            "cancellationReason": null,
            "canceledAt": null,
        })
    }

    #[tokio::test]
    async fn test_create_signs_payment_fields_and_verifies_response() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let request = CreatePaymentLinkRequest::new(
            123,
            2000,
            "Order 123",
            "https://shop.example/cancel",
            "https://shop.example/return",
        )
        .with_item(PaymentLinkItem {
            name: "Tea".into(),
            quantity: 1,
            price: 2000,
            unit: None,
            tax_percentage: None,
        });
        let expected = client
            .crypto()
            .sign_payment_request(&serde_json::to_value(&request).unwrap(), CHECKSUM_KEY)
            .unwrap();

        let data = json!({
            "bin": "970422",
            "accountNumber": "0001",
            "accountName": "SHOP",
            "amount": 2000,
            "description": "Order 123",
            "orderCode": 123,
            "currency": "VND",
            "paymentLinkId": "pl_1",
            "status": "PENDING",
            "expiredAt": null,
            "checkoutUrl": "https://pay.payos.vn/web/pl_1",
            "qrCode": "000201",
        });
        let data_signature = client
            .crypto()
            .create_signature(CHECKSUM_KEY, &data, &SignatureOptions::unencoded())
            .unwrap();
        let mut envelope = ok(&data);
        envelope["signature"] = data_signature.into();

        Mock::given(method("POST"))
            .and(path("/v2/payment-requests"))
            .and(body_partial_json(json!({
                "orderCode": 123,
                "signature": expected,
                "items": [{"name": "Tea", "quantity": 1, "price": 2000}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope))
            .expect(1)
            .mount(&server)
            .await;

        let created = client.payment_requests().create(&request).await.unwrap();
        assert_eq!(created.payment_link_id, "pl_1");
        assert_eq!(created.status, PaymentLinkStatus::Pending);
        assert_eq!(created.expired_at, None);
    }

    #[tokio::test]
    async fn test_get_by_order_code_and_id() {
        let server = MockServer::start().await;
        for route in ["/v2/payment-requests/123", "/v2/payment-requests/pl_1"] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(ok(&link_json("PAID"))))
                .expect(1)
                .mount(&server)
                .await;
        }
        let client = client_for(&server);
        let by_code = client.payment_requests().get(123).await.unwrap();
        let by_id = client.payment_requests().get("pl_1").await.unwrap();
        assert_eq!(by_code, by_id);
        assert_eq!(by_code.status, PaymentLinkStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_with_and_without_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/payment-requests/123/cancel"))
            .and(body_json(json!({"cancellationReason": "out of stock"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok(&link_json("CANCELLED"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/payment-requests/pl_2/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok(&link_json("CANCELLED"))))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancelled = client
            .payment_requests()
            .cancel(123, Some("out of stock"))
            .await
            .unwrap();
        assert_eq!(cancelled.status, PaymentLinkStatus::Cancelled);

        client.payment_requests().cancel("pl_2", Some("")).await.unwrap();
        let requests = server.received_requests().await.unwrap();
        assert!(requests[1].body.is_empty());
    }
}
