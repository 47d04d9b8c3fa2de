//! `wschat` key agreement
//!
//! Finite-field Diffie-Hellman for establishing session key material between
//! two chat peers. The transport that carries public values is the caller's
//! concern.
//!
//! ## Crypto primitives
//!
//! - **Group**: caller-supplied `(p, g)` or the RFC 3526 2048-bit MODP group
//! - **Agreement**: uniform private exponent in `[2, p-2]`, public value `g^x mod p`
//! - **Key derivation**: HKDF-SHA256 over the fixed-width shared secret

pub mod error;
pub mod exchange;
pub mod modpow;
pub mod params;
pub mod secret;

pub use error::CryptoError;
#[cfg(any(test, feature = "test-utils"))]
pub use exchange::perform_key_exchange;
pub use exchange::{KeyExchangeEngine, fingerprint_of};
pub use modpow::{mod_pow, mod_pow_u64};
pub use params::DomainParams;
pub use secret::{DERIVED_KEY_SIZE, SharedSecret};
