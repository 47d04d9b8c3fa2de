//! Square-and-multiply modular exponentiation.
//!
//! Every product is formed at a width that holds the full square of the
//! modulus before it is reduced: `BigUint` grows as needed, and the `u64`
//! path widens into `u128`.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::CryptoError;

/// Compute `base^exponent mod modulus`.
///
/// Exponent `0` yields `1`; modulus `1` yields `0`. A zero modulus is rejected.
pub fn mod_pow(
    base: &BigUint,
    exponent: &BigUint,
    modulus: &BigUint,
) -> Result<BigUint, CryptoError> {
    mod_pow_be(base, &exponent.to_bytes_be(), modulus)
}

/// [`mod_pow`] with the exponent given as big-endian bytes.
///
/// Bits are consumed from the most significant end, so secret exponents
/// can stay in a wipeable buffer instead of a `BigUint`.
pub(crate) fn mod_pow_be(
    base: &BigUint,
    exponent: &[u8],
    modulus: &BigUint,
) -> Result<BigUint, CryptoError> {
    if modulus.is_zero() {
        return Err(CryptoError::InvalidParameters(
            "modulus must be non-zero".into(),
        ));
    }
    if modulus.is_one() {
        return Ok(BigUint::zero());
    }

    let base = base % modulus;
    let mut result = BigUint::one();
    // Leading zero bytes only square 1.
    for byte in exponent.iter().skip_while(|&&b| b == 0) {
        for shift in (0..8).rev() {
            result = (&result * &result) % modulus;
            if (byte >> shift) & 1 == 1 {
                result = (&result * &base) % modulus;
            }
        }
    }
    Ok(result)
}

/// `u64` variant of [`mod_pow`] with `u128` intermediates.
pub fn mod_pow_u64(base: u64, mut exponent: u64, modulus: u64) -> Result<u64, CryptoError> {
    if modulus == 0 {
        return Err(CryptoError::InvalidParameters(
            "modulus must be non-zero".into(),
        ));
    }
    if modulus == 1 {
        return Ok(0);
    }

    let m = u128::from(modulus);
    let mut result: u128 = 1;
    let mut base = u128::from(base) % m;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result * base % m;
        }
        base = base * base % m;
        exponent >>= 1;
    }
    // result < modulus <= u64::MAX
    #[allow(clippy::cast_possible_truncation)]
    Ok(result as u64)
}
