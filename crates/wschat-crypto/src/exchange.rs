//! Finite-field Diffie-Hellman key agreement.
//!
//! Each side builds a [`KeyExchangeEngine`] per session from shared domain
//! parameters, sends [`KeyExchangeEngine::public_value`] to the peer by
//! whatever channel it owns, and calls
//! [`KeyExchangeEngine::derive_shared_secret`] with the peer's value.
//!
//! An engine is immutable once built, so it can be shared across threads
//! behind an `Arc` without locking.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;
use crate::modpow::mod_pow_be;
use crate::params::DomainParams;
use crate::secret::{SharedSecret, encode_fixed_be};

/// One party's key-agreement state.
///
/// The private exponent is wiped when the engine is dropped.
#[derive(ZeroizeOnDrop)]
pub struct KeyExchangeEngine {
    #[zeroize(skip)]
    params: DomainParams,
    /// Big-endian, uniform in `[2, p-2]`. Never leaves the engine.
    private_exponent: Vec<u8>,
    /// `g^private_exponent mod p`.
    #[zeroize(skip)]
    public_value: BigUint,
}

impl std::fmt::Debug for KeyExchangeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchangeEngine")
            .field("modulus_bits", &self.params.modulus().bits())
            .field("public_value", &hex::encode(self.public_bytes()))
            .field("private_exponent", &"[REDACTED]")
            .finish()
    }
}

impl KeyExchangeEngine {
    /// Build an engine with a private exponent drawn from the OS generator.
    pub fn new(params: DomainParams) -> Result<Self, CryptoError> {
        Self::with_rng(params, &mut OsRng)
    }

    /// Build an engine drawing its private exponent from `rng`.
    ///
    /// Fails with [`CryptoError::RandomSourceUnavailable`] if `rng` cannot
    /// supply bytes; there is no fallback source.
    pub fn with_rng<R>(params: DomainParams, rng: &mut R) -> Result<Self, CryptoError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let private_exponent = sample_exponent(params.modulus(), rng)?;
        Self::from_exponent(params, private_exponent)
    }

    /// Build an engine with a caller-chosen private exponent in `[2, p-2]`.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn from_private_exponent(
        params: DomainParams,
        private_exponent: BigUint,
    ) -> Result<Self, CryptoError> {
        let two = BigUint::from(2u32);
        if private_exponent < two || private_exponent > params.modulus() - &two {
            return Err(CryptoError::InvalidParameters(
                "private exponent must lie in [2, p-2]".into(),
            ));
        }
        let bytes = Zeroizing::new(encode_fixed_be(&private_exponent, params.modulus_len()));
        Self::from_exponent(params, bytes)
    }

    fn from_exponent(
        params: DomainParams,
        mut private_exponent: Zeroizing<Vec<u8>>,
    ) -> Result<Self, CryptoError> {
        let public_value = mod_pow_be(params.generator(), &private_exponent, params.modulus())?;
        Ok(Self {
            params,
            // Moves the buffer out; the emptied wrapper has nothing left to wipe.
            private_exponent: std::mem::take(&mut *private_exponent),
            public_value,
        })
    }

    /// Domain parameters this engine was built with.
    pub const fn params(&self) -> &DomainParams {
        &self.params
    }

    /// Our public value, always in `[1, p-1]`.
    pub const fn public_value(&self) -> &BigUint {
        &self.public_value
    }

    /// Public value as big-endian bytes, left-padded to the modulus width.
    pub fn public_bytes(&self) -> Vec<u8> {
        encode_fixed_be(&self.public_value, self.params.modulus_len())
    }

    /// SHA-256 fingerprint of [`Self::public_bytes`] for out-of-band comparison.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.public_bytes())
    }

    /// Derive the shared secret from the peer's public value.
    ///
    /// Rejects `0` and values `>= p` as [`CryptoError::InvalidPeerValue`], and
    /// `1` or `p-1` as [`CryptoError::DegeneratePeerValue`]: those confine the
    /// result to `{1, p-1}` regardless of our exponent.
    pub fn derive_shared_secret(&self, peer_public: &BigUint) -> Result<SharedSecret, CryptoError> {
        let p = self.params.modulus();
        if peer_public.is_zero() || peer_public >= p {
            return Err(CryptoError::InvalidPeerValue(format!(
                "expected a value in [1, p-1] for a {}-bit modulus",
                p.bits()
            )));
        }
        if peer_public.is_one() || *peer_public == self.params.modulus_minus_one() {
            return Err(CryptoError::DegeneratePeerValue);
        }

        let value = mod_pow_be(peer_public, &self.private_exponent, p)?;
        Ok(SharedSecret::new(&value, self.params.modulus_len()))
    }

    /// [`Self::derive_shared_secret`] for a big-endian encoded peer value.
    ///
    /// Leading zero bytes are allowed up to the modulus width.
    pub fn derive_shared_secret_from_bytes(
        &self,
        peer_public: &[u8],
    ) -> Result<SharedSecret, CryptoError> {
        let width = self.params.modulus_len();
        if peer_public.len() > width {
            return Err(CryptoError::InvalidPeerValue(format!(
                "expected at most {width} bytes, got {}",
                peer_public.len()
            )));
        }
        self.derive_shared_secret(&BigUint::from_bytes_be(peer_public))
    }
}

/// Draw uniformly from `[2, p-2]` by rejection sampling.
///
/// Candidates are masked to the bit length of the range size, so each draw
/// is accepted with probability above one half. The result is big-endian
/// and never passes through a `BigUint`.
fn sample_exponent<R>(p: &BigUint, rng: &mut R) -> Result<Zeroizing<Vec<u8>>, CryptoError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    // [2, p-2] holds p-3 values; p >= 5 is guaranteed by DomainParams.
    let span = p - BigUint::from(3u32);
    let bits = span.bits();
    let byte_len = usize::try_from(bits.div_ceil(8))
        .map_err(|_| CryptoError::InvalidParameters("modulus too large".into()))?;
    let top_mask = 0xffu8 >> ((8 - bits % 8) % 8);
    let span_bytes = encode_fixed_be(&span, byte_len);

    let mut buf = Zeroizing::new(vec![0u8; byte_len]);
    loop {
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| CryptoError::RandomSourceUnavailable(e.to_string()))?;
        if let Some(first) = buf.first_mut() {
            *first &= top_mask;
        }
        // Equal-length big-endian slices order like the integers they encode.
        if buf.as_slice() < span_bytes.as_slice() {
            break;
        }
    }

    // candidate < p-3, so candidate + 2 <= p-2 fits in the same width:
    // p is odd, so p-3 is even and p-2 has the same bit length.
    if !add_small_be(&mut buf, 2) {
        return Err(CryptoError::InvalidParameters(
            "exponent overflowed its width".into(),
        ));
    }
    Ok(buf)
}

/// Add `n` to a big-endian integer in place. Returns `false` on overflow.
fn add_small_be(bytes: &mut [u8], n: u8) -> bool {
    let mut carry = n;
    for byte in bytes.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let (sum, overflow) = byte.overflowing_add(carry);
        *byte = sum;
        carry = u8::from(overflow);
    }
    carry == 0
}

/// Compute a colon-separated hex fingerprint from raw public value bytes.
pub fn fingerprint_of(public_bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(public_bytes);
    hash.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Run a full exchange between two fresh engines and return both secrets.
///
/// Mainly useful for testing. In production each side builds its own
/// engine, sends its public value, and derives with the peer's value.
#[cfg(any(test, feature = "test-utils"))]
pub fn perform_key_exchange(
    params: &DomainParams,
) -> Result<(SharedSecret, SharedSecret), CryptoError> {
    let alice = KeyExchangeEngine::new(params.clone())?;
    let bob = KeyExchangeEngine::new(params.clone())?;
    let alice_secret = alice.derive_shared_secret(bob.public_value())?;
    let bob_secret = bob.derive_shared_secret(alice.public_value())?;
    Ok((alice_secret, bob_secret))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    /// Replays a fixed byte sequence, cycling when exhausted.
    struct ReplayRng {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl ReplayRng {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.to_vec(),
                pos: 0,
            }
        }
    }

    impl RngCore for ReplayRng {
        fn next_u32(&mut self) -> u32 {
            let mut b = [0u8; 4];
            self.fill_bytes(&mut b);
            u32::from_be_bytes(b)
        }

        fn next_u64(&mut self) -> u64 {
            let mut b = [0u8; 8];
            self.fill_bytes(&mut b);
            u64::from_be_bytes(b)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for byte in dest {
                *byte = self.bytes[self.pos % self.bytes.len()];
                self.pos += 1;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ReplayRng {}

    /// Always fails, like an exhausted or unavailable entropy device.
    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            panic!("BrokenRng has no entropy")
        }

        fn next_u64(&mut self) -> u64 {
            panic!("BrokenRng has no entropy")
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            panic!("BrokenRng has no entropy")
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("entropy device unavailable")))
        }
    }

    impl CryptoRng for BrokenRng {}

    fn textbook() -> DomainParams {
        DomainParams::from_u64(23, 5).unwrap()
    }

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn textbook_exchange_with_fixed_exponent() {
        // Byte 4 maps to exponent 4 + 2 = 6.
        let engine = KeyExchangeEngine::with_rng(textbook(), &mut ReplayRng::new(&[4])).unwrap();
        assert_eq!(engine.public_value(), &big(8));

        let secret = engine.derive_shared_secret(&big(19)).unwrap();
        assert_eq!(secret.to_biguint(), big(2));
    }

    #[test]
    fn sampling_rejects_out_of_range_candidates() {
        // Range size is 20 (5 bits): 31 and 21 are rejected, 4 is accepted.
        let mut rng = ReplayRng::new(&[0xff, 0x15, 0x04]);
        let engine = KeyExchangeEngine::with_rng(textbook(), &mut rng).unwrap();
        assert_eq!(engine.public_value(), &big(8));
        assert_eq!(rng.pos, 3);
    }

    #[test]
    fn sampling_covers_both_ends_of_range() {
        // Candidate 0 -> exponent 2; candidate 19 -> exponent 21 = p-2.
        let low = KeyExchangeEngine::with_rng(textbook(), &mut ReplayRng::new(&[0])).unwrap();
        assert_eq!(low.public_value(), &big(25 % 23));
        let high = KeyExchangeEngine::with_rng(textbook(), &mut ReplayRng::new(&[19])).unwrap();
        assert_eq!(high.public_value(), &big(5).modpow(&big(21), &big(23)));
    }

    #[test]
    fn broken_random_source_is_reported() {
        let err = KeyExchangeEngine::with_rng(textbook(), &mut BrokenRng).unwrap_err();
        assert!(matches!(err, CryptoError::RandomSourceUnavailable(_)), "{err:?}");
    }

    #[test]
    fn from_private_exponent_matches_rng_construction() {
        let engine = KeyExchangeEngine::from_private_exponent(textbook(), big(6)).unwrap();
        assert_eq!(engine.public_value(), &big(8));
        assert_eq!(
            engine.derive_shared_secret(&big(19)).unwrap().to_biguint(),
            big(2)
        );
    }

    #[test]
    fn from_private_exponent_rejects_out_of_range() {
        for e in [0, 1, 22, 23] {
            assert!(matches!(
                KeyExchangeEngine::from_private_exponent(textbook(), big(e)),
                Err(CryptoError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn both_sides_agree_on_textbook_group() {
        let params = textbook();
        for _ in 0..50 {
            let a = KeyExchangeEngine::new(params.clone()).unwrap();
            let b = KeyExchangeEngine::new(params.clone()).unwrap();
            let ab = a.derive_shared_secret(b.public_value());
            let ba = b.derive_shared_secret(a.public_value());
            match (ab, ba) {
                (Ok(ab), Ok(ba)) => assert_eq!(ab, ba),
                // A public value of 1 or 22 is possible in a group this small.
                (Err(CryptoError::DegeneratePeerValue), Err(CryptoError::DegeneratePeerValue))
                | (Err(CryptoError::DegeneratePeerValue), Ok(_))
                | (Ok(_), Err(CryptoError::DegeneratePeerValue)) => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[test]
    fn both_sides_agree_on_group14() {
        let (alice, bob) = perform_key_exchange(&DomainParams::rfc3526_group14()).unwrap();
        assert_eq!(alice, bob);
        assert_eq!(alice.to_bytes().len(), 256);
        assert_eq!(
            alice.derive_key(b"wschat").unwrap(),
            bob.derive_key(b"wschat").unwrap()
        );
    }

    #[test]
    fn public_value_is_in_range() {
        let params = DomainParams::rfc3526_group14();
        let p = params.modulus().clone();
        for _ in 0..5 {
            let engine = KeyExchangeEngine::new(params.clone()).unwrap();
            assert!(!engine.public_value().is_zero());
            assert!(engine.public_value() < &p);
        }
        let small = textbook();
        for _ in 0..200 {
            let engine = KeyExchangeEngine::new(small.clone()).unwrap();
            let v = engine.public_value();
            assert!(*v >= big(1) && *v <= big(22), "{v}");
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let params = DomainParams::rfc3526_group14();
        let a = KeyExchangeEngine::new(params.clone()).unwrap();
        let b = KeyExchangeEngine::new(params).unwrap();
        let first = a.derive_shared_secret(b.public_value()).unwrap();
        let second = a.derive_shared_secret(b.public_value()).unwrap();
        assert_eq!(first, second);
        assert_eq!(a.public_value(), a.public_value());
    }

    #[test]
    fn rejects_out_of_range_peer_values() {
        let engine = KeyExchangeEngine::from_private_exponent(textbook(), big(6)).unwrap();
        for v in [0, 23, 28] {
            let err = engine.derive_shared_secret(&big(v)).unwrap_err();
            assert!(matches!(err, CryptoError::InvalidPeerValue(_)), "{v}: {err:?}");
        }
    }

    #[test]
    fn rejects_degenerate_peer_values() {
        let engine = KeyExchangeEngine::from_private_exponent(textbook(), big(6)).unwrap();
        for v in [1, 22] {
            assert_eq!(
                engine.derive_shared_secret(&big(v)).unwrap_err(),
                CryptoError::DegeneratePeerValue
            );
        }
    }

    #[test]
    fn rejects_degenerate_peer_values_on_group14() {
        let params = DomainParams::rfc3526_group14();
        let p = params.modulus().clone();
        let engine = KeyExchangeEngine::new(params).unwrap();
        assert_eq!(
            engine.derive_shared_secret(&(&p - 1u32)).unwrap_err(),
            CryptoError::DegeneratePeerValue
        );
        assert!(matches!(
            engine.derive_shared_secret(&p),
            Err(CryptoError::InvalidPeerValue(_))
        ));
        assert!(matches!(
            engine.derive_shared_secret(&(&p + 5u32)),
            Err(CryptoError::InvalidPeerValue(_))
        ));
    }

    #[test]
    fn public_bytes_roundtrip_through_peer() {
        let params = DomainParams::rfc3526_group14();
        let a = KeyExchangeEngine::new(params.clone()).unwrap();
        let b = KeyExchangeEngine::new(params).unwrap();
        let a_bytes = a.public_bytes();
        assert_eq!(a_bytes.len(), 256);
        assert_eq!(BigUint::from_bytes_be(&a_bytes), *a.public_value());

        let via_bytes = b.derive_shared_secret_from_bytes(&a_bytes).unwrap();
        let via_int = b.derive_shared_secret(a.public_value()).unwrap();
        assert_eq!(via_bytes, via_int);
    }

    #[test]
    fn bytes_variant_rejects_oversized_input() {
        let engine = KeyExchangeEngine::from_private_exponent(textbook(), big(6)).unwrap();
        let err = engine.derive_shared_secret_from_bytes(&[0, 19]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPeerValue(_)));
        assert_eq!(
            engine
                .derive_shared_secret_from_bytes(&[19])
                .unwrap()
                .to_biguint(),
            big(2)
        );
        assert!(matches!(
            engine.derive_shared_secret_from_bytes(&[]),
            Err(CryptoError::InvalidPeerValue(_))
        ));
    }

    #[test]
    fn concurrent_derivation_on_shared_engine() {
        let params = DomainParams::rfc3526_group14();
        let engine = Arc::new(KeyExchangeEngine::new(params.clone()).unwrap());
        let peer = KeyExchangeEngine::new(params).unwrap();
        let expected = peer.derive_shared_secret(engine.public_value()).unwrap();

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    let peer_public = peer.public_value().clone();
                    s.spawn(move || engine.derive_shared_secret(&peer_public).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for secret in &results {
            assert_eq!(secret, &expected);
        }
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KeyExchangeEngine>();
        assert_send_sync::<SharedSecret>();
    }

    #[test]
    fn fingerprint_is_human_readable_hex() {
        let engine = KeyExchangeEngine::new(DomainParams::rfc3526_group14()).unwrap();
        let fp = engine.fingerprint();

        // SHA-256 = 32 bytes = 32 hex pairs + 31 colons = 95 chars
        assert_eq!(fp.len(), 95);
        for segment in fp.split(':') {
            assert_eq!(segment.len(), 2);
            assert!(segment.chars().all(|c| c.is_ascii_hexdigit()));
        }
        assert_eq!(fp, fingerprint_of(&engine.public_bytes()));
    }

    #[test]
    fn two_engines_have_distinct_public_values() {
        let params = DomainParams::rfc3526_group14();
        let a = KeyExchangeEngine::new(params.clone()).unwrap();
        let b = KeyExchangeEngine::new(params).unwrap();
        assert_ne!(a.public_value(), b.public_value());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn private_exponent_is_wiped_on_drop() {
        fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<KeyExchangeEngine>();
    }

    #[test]
    fn private_exponent_is_held_as_bytes() {
        let engine = KeyExchangeEngine::with_rng(textbook(), &mut ReplayRng::new(&[19])).unwrap();
        assert_eq!(engine.private_exponent, vec![21]);

        let fixed = KeyExchangeEngine::from_private_exponent(textbook(), big(6)).unwrap();
        assert_eq!(fixed.private_exponent, vec![6]);
    }

    #[test]
    fn exponent_increment_carries_across_bytes() {
        let mut bytes = [0x00, 0xff, 0xfe];
        assert!(add_small_be(&mut bytes, 2));
        assert_eq!(bytes, [0x01, 0x00, 0x00]);

        let mut full = [0xff, 0xff];
        assert!(!add_small_be(&mut full, 2));
    }

    #[test]
    fn debug_impl_redacts_private_exponent() {
        let engine = KeyExchangeEngine::from_private_exponent(textbook(), big(17)).unwrap();
        let debug_output = format!("{engine:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("17"));
    }
}
