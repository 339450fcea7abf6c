//! Account management
//!
//! The wallet facade plus the persisted list of derived accounts.

pub mod book;
pub mod wallet;

pub use book::AccountBook;
pub use wallet::{CreatedWallet, ImportedWallet, Wallet};
