//! Cryptographic primitives and operations
//!
//! Mnemonic handling, PIN-based secret sealing and HD key derivation.

pub mod codec;
pub mod keys;
pub mod legacy;
pub mod mnemonic;

pub use codec::{DecryptionScheme, EncryptedSecret, SecretCodec};
pub use keys::{Account, DerivedKey};
pub use mnemonic::{generate, is_plausible_mnemonic, validate, Mnemonic, WordCount};
