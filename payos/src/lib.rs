#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the payOS merchant API.
//!
//! This crate holds everything about the payOS wire contract that does not
//! need an HTTP stack: the response envelope, the error taxonomy and its
//! status classifier, the HMAC signature protocols, and webhook verification.
//! The request engine lives in `payos-http`.
//!
//! # Modules
//!
//! - [`crypto`] - Canonicalization, HMAC backends and idempotency keys
//! - [`envelope`] - The `{code, desc, data, signature}` wire wrapper
//! - [`error`] - Typed errors and the HTTP status classifier
//! - [`webhook`] - Inbound webhook payloads and their verification
//!
//! # Feature Flags
//!
//! - `ring` - Enables [`crypto::RingProvider`], an HMAC backend built on `ring`

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod webhook;

pub use crypto::{CryptoProvider, RustCryptoProvider, SignatureAlgorithm, SignatureOptions};
pub use envelope::{Envelope, SUCCESS_CODE};
pub use error::{ApiError, ApiErrorKind, Error, ErrorPayload, Result};
pub use webhook::{Webhook, WebhookData};
