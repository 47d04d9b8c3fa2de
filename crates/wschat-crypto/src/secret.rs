//! Shared secret produced by a completed key agreement.

use hkdf::Hkdf;
use num_bigint::BigUint;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

/// HKDF salt for domain separation (recommended by RFC 5869).
const HKDF_SALT: &[u8] = b"wschat-dh-hkdf-salt-v1";

/// Length of keys produced by [`SharedSecret::derive_key`].
pub const DERIVED_KEY_SIZE: usize = 32;

/// `peer_public^private_exponent mod p`, wiped on drop.
///
/// Held as big-endian bytes padded to the modulus width. Equality is
/// constant-time over that encoding.
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("width", &self.bytes.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.len() == other.bytes.len() && bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

impl Eq for SharedSecret {}

impl SharedSecret {
    /// Encode `value` at `width` bytes, the byte length of the modulus.
    pub(crate) fn new(value: &BigUint, width: usize) -> Self {
        Self {
            bytes: encode_fixed_be(value, width),
        }
    }

    /// The secret as an integer. The returned copy is not wiped on drop.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.bytes)
    }

    /// Big-endian encoding left-padded to the modulus width.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.bytes.clone())
    }

    /// Derive a 32-byte symmetric key via HKDF-SHA256.
    ///
    /// `info` separates keys used for different purposes from the same
    /// secret. The caller is responsible for zeroizing the returned bytes.
    pub fn derive_key(&self, info: &[u8]) -> Result<[u8; DERIVED_KEY_SIZE], CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), &self.bytes);
        let mut key = [0u8; DERIVED_KEY_SIZE];
        hk.expand(info, &mut key)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
        Ok(key)
    }
}

/// Big-endian bytes of `value`, left-padded with zeros to `width`.
///
/// Values wider than `width` are returned unpadded.
pub(crate) fn encode_fixed_be(value: &BigUint, width: usize) -> Vec<u8> {
    let raw = value.to_bytes_be();
    if raw.len() >= width {
        return raw;
    }
    let mut out = vec![0u8; width - raw.len()];
    out.extend_from_slice(&raw);
    out
}
