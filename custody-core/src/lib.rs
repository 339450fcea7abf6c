//! Custody Wallet Core - seed custody and EVM signing
//!
//! This library owns the wallet's seed material: it generates and validates
//! mnemonics, seals them under a PIN, keeps them in a hardware keystore,
//! derives EVM accounts and serves dApp signing requests.

pub mod error;
pub mod config;
pub mod crypto;
pub mod storage;
pub mod account;
pub mod lockout;
pub mod transaction;

// Re-export commonly used types for convenience
pub use error::{Error, ErrorKind, Result};
pub use config::CoreConfig;
pub use account::Wallet;
pub use transaction::SigningDispatcher;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
