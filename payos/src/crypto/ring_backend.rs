//! HMAC backend built on `ring`.

use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use super::{CryptoProvider, SignatureAlgorithm};

/// HMAC backend using `ring`'s assembly-optimized primitives.
///
/// Produces byte-identical signatures to
/// [`RustCryptoProvider`](super::RustCryptoProvider).
#[derive(Debug, Clone, Copy, Default)]
pub struct RingProvider;

impl CryptoProvider for RingProvider {
    fn hmac_hex(
        &self,
        algorithm: SignatureAlgorithm,
        key: &[u8],
        message: &[u8],
    ) -> Option<String> {
        let algorithm = match algorithm {
            SignatureAlgorithm::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            SignatureAlgorithm::Sha256 => hmac::HMAC_SHA256,
            SignatureAlgorithm::Sha512 => hmac::HMAC_SHA512,
        };
        let key = hmac::Key::new(algorithm, key);
        Some(hex::encode(hmac::sign(&key, message).as_ref()))
    }

    fn new_uuid(&self) -> String {
        let mut bytes = [0u8; 16];
        if SystemRandom::new().fill(&mut bytes).is_err() {
            return uuid::Uuid::new_v4().to_string();
        }
        uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string()
    }
}
