#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP client for the payOS merchant API.
//!
//! [`PayOsClient`] wraps a `reqwest` client with the payOS wire contract:
//! credential headers, request signing, response signature checks, typed
//! errors, and retries with backoff for transient failures. Typed resource
//! handles sit on top of it.
//!
//! ```no_run
//! # async fn run() -> payos::Result<()> {
//! use payos_http::PayOsClient;
//! use payos_http::resources::CreatePaymentLinkRequest;
//!
//! let client = PayOsClient::from_env()?;
//! let link = client
//!     .payment_requests()
//!     .create(&CreatePaymentLinkRequest::new(
//!         123,
//!         2000,
//!         "Order 123",
//!         "https://shop.example/cancel",
//!         "https://shop.example/return",
//!     ))
//!     .await?;
//! println!("{}", link.checkout_url);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`client`] - The request executor
//! - [`config`] - Credentials and client settings
//! - [`constants`] - Base URL, defaults and header names
//! - [`download`] - Binary responses
//! - [`pagination`] - Offset pagination over list endpoints
//! - [`request`] - The request descriptor
//! - [`resources`] - Typed resource handles
//! - [`retry`] - Backoff and retry bookkeeping
//!
//! # Feature Flags
//!
//! - `telemetry` - Wraps each call in a `tracing` span and records its outcome
//! - `ring` - Uses `ring` for HMAC and UUID generation

pub mod client;
pub mod config;
pub mod constants;
pub mod download;
pub mod pagination;
pub mod request;
pub mod resources;
pub mod retry;

pub use client::PayOsClient;
pub use config::ClientConfig;
pub use download::FileDownload;
pub use pagination::{Page, Pagination};
pub use request::{
    CallOptions, RequestBody, RequestOptions, RequestSigning, ResponseSigning, SignatureOpts,
};
pub use resources::PaymentLinkRef;
pub use retry::{RetryPolicy, RetryState};

pub use payos::{ApiError, ApiErrorKind, Error, Result, Webhook, WebhookData};
