//! Key derivation and management
//!
//! BIP-32 derivation over secp256k1 plus the EVM account layer built on top of it.

pub mod derivation;
pub mod ethereum;

pub use derivation::{derive_private_key, parse_derivation_path, DerivedKey};
pub use ethereum::{derive, derive_signing_key, derivation_path, Account};
