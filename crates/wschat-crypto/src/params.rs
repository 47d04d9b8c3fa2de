//! Domain parameters for finite-field Diffie-Hellman.
//!
//! Both parties must agree on `(p, g)` out of band before building an engine.
//! Primality of `p` is not checked; callers that don't have their own group
//! should use [`DomainParams::rfc3526_group14`].

use num_bigint::BigUint;
use num_traits::One;

use crate::error::CryptoError;

/// Smallest modulus for which `[2, p-2]` holds more than one exponent.
const MIN_MODULUS: u32 = 5;

/// 2048-bit MODP group prime from RFC 3526 section 3, big-endian.
const GROUP14_PRIME: [u8; 256] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe4, 0x5b, 0x3d,
    0xc2, 0x00, 0x7c, 0xb8, 0xa1, 0x63, 0xbf, 0x05, 0x98, 0xda, 0x48, 0x36,
    0x1c, 0x55, 0xd3, 0x9a, 0x69, 0x16, 0x3f, 0xa8, 0xfd, 0x24, 0xcf, 0x5f,
    0x83, 0x65, 0x5d, 0x23, 0xdc, 0xa3, 0xad, 0x96, 0x1c, 0x62, 0xf3, 0x56,
    0x20, 0x85, 0x52, 0xbb, 0x9e, 0xd5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6d,
    0x67, 0x0c, 0x35, 0x4e, 0x4a, 0xbc, 0x98, 0x04, 0xf1, 0x74, 0x6c, 0x08,
    0xca, 0x18, 0x21, 0x7c, 0x32, 0x90, 0x5e, 0x46, 0x2e, 0x36, 0xce, 0x3b,
    0xe3, 0x9e, 0x77, 0x2c, 0x18, 0x0e, 0x86, 0x03, 0x9b, 0x27, 0x83, 0xa2,
    0xec, 0x07, 0xa2, 0x8f, 0xb5, 0xc5, 0x5d, 0xf0, 0x6f, 0x4c, 0x52, 0xc9,
    0xde, 0x2b, 0xcb, 0xf6, 0x95, 0x58, 0x17, 0x18, 0x39, 0x95, 0x49, 0x7c,
    0xea, 0x95, 0x6a, 0xe5, 0x15, 0xd2, 0x26, 0x18, 0x98, 0xfa, 0x05, 0x10,
    0x15, 0x72, 0x8e, 0x5a, 0x8a, 0xac, 0xaa, 0x68, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff,
];

/// Validated `(p, g)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParams {
    p: BigUint,
    g: BigUint,
}

impl DomainParams {
    /// Validate and wrap a modulus and generator.
    ///
    /// Rejects `p < 5`, even `p`, and any `g` outside `[2, p-2]`.
    pub fn new(p: BigUint, g: BigUint) -> Result<Self, CryptoError> {
        if p < BigUint::from(MIN_MODULUS) {
            return Err(CryptoError::InvalidParameters(format!(
                "modulus must be at least {MIN_MODULUS}, got {p}"
            )));
        }
        if !p.bit(0) {
            return Err(CryptoError::InvalidParameters(format!(
                "modulus must be odd, got {p}"
            )));
        }
        let two = BigUint::from(2u32);
        if g < two || g > &p - &two {
            return Err(CryptoError::InvalidParameters(format!(
                "generator must lie in [2, p-2], got {g}"
            )));
        }
        Ok(Self { p, g })
    }

    /// Convenience constructor for small groups (tests, demos).
    pub fn from_u64(p: u64, g: u64) -> Result<Self, CryptoError> {
        Self::new(BigUint::from(p), BigUint::from(g))
    }

    /// The 2048-bit MODP group (RFC 3526 group 14) with generator 2.
    pub fn rfc3526_group14() -> Self {
        Self {
            p: BigUint::from_bytes_be(&GROUP14_PRIME),
            g: BigUint::from(2u32),
        }
    }

    /// The modulus `p`.
    pub const fn modulus(&self) -> &BigUint {
        &self.p
    }

    /// The generator `g`.
    pub const fn generator(&self) -> &BigUint {
        &self.g
    }

    /// Number of bytes needed to encode any residue mod `p`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn modulus_len(&self) -> usize {
        self.p.bits().div_ceil(8) as usize
    }

    /// `p - 1`, the only non-trivial element of order 2.
    pub(crate) fn modulus_minus_one(&self) -> BigUint {
        &self.p - BigUint::one()
    }
}
