//! Webhook registration and inbound verification.

use payos::{Error, Result, Webhook, WebhookData, webhook};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::PayOsClient;
use crate::request::{CallOptions, RequestOptions};

/// Result of a successful webhook registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ConfirmWebhookResponse {
    pub webhook_url: String,
    pub account_name: String,
    pub account_number: String,
    pub name: String,
    pub short_name: String,
}

/// Handle for webhook operations.
#[derive(Debug, Clone)]
pub struct Webhooks<'a> {
    client: &'a PayOsClient,
    options: CallOptions,
}

impl<'a> Webhooks<'a> {
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

    /// Registers `webhook_url`. payOS probes the URL before accepting it.
    ///
    /// # Errors
    ///
    /// [`Error::Webhook`] for an empty URL or when payOS rejects the
    /// endpoint; other errors as [`PayOsClient::request`].
    pub async fn confirm(&self, webhook_url: &str) -> Result<ConfirmWebhookResponse> {
        if webhook_url.is_empty() {
            return Err(Error::Webhook("Webhook URL invalid.".into()));
        }
        let options = RequestOptions::post("/confirm-webhook")
            .with_json(json!({ "webhookUrl": webhook_url }))
            .with_call_options(&self.options);
        match self.client.request(options).await {
            Err(Error::Api(err)) => Err(Error::Webhook(format!(
                "Webhook validation failed: {}",
                err.message()
            ))),
            result => result,
        }
    }

    /// Verifies a parsed webhook body with the client's checksum key.
    ///
    /// # Errors
    ///
    /// [`Error::Webhook`] if the payload is incomplete or forged.
    pub fn verify(&self, body: &Webhook) -> Result<WebhookData> {
        body.verify(self.client.crypto().as_ref(), self.client.checksum_key())
    }

    /// Parses and verifies a raw webhook body.
    ///
    /// # Errors
    ///
    /// [`Error::Webhook`] if the body is not a webhook or is forged.
    pub fn verify_bytes(&self, body: &[u8]) -> Result<WebhookData> {
        webhook::verify_bytes(body, self.client.crypto().as_ref(), self.client.checksum_key())
    }
}
