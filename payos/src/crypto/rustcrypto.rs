//! Portable HMAC backend built on the `RustCrypto` crates.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use super::{CryptoProvider, SignatureAlgorithm};

/// HMAC backend using `hmac`, `sha1` and `sha2`. Works on every target.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl CryptoProvider for RustCryptoProvider {
    fn hmac_hex(
        &self,
        algorithm: SignatureAlgorithm,
        key: &[u8],
        message: &[u8],
    ) -> Option<String> {
        match algorithm {
            SignatureAlgorithm::Sha1 => mac_hex::<Hmac<Sha1>>(key, message),
            SignatureAlgorithm::Sha256 => mac_hex::<Hmac<Sha256>>(key, message),
            SignatureAlgorithm::Sha512 => mac_hex::<Hmac<Sha512>>(key, message),
        }
    }
}

fn mac_hex<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Option<String> {
    let mut mac = <M as KeyInit>::new_from_slice(key).ok()?;
    Mac::update(&mut mac, message);
    Some(hex::encode(Mac::finalize(mac).into_bytes()))
}
