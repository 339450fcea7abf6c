//! Persisted list of derived accounts

use std::sync::Arc;

use ethers::types::Address;

use crate::crypto::keys::Account;
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

/// The derived accounts, stored as a JSON array in the key-value store.
///
/// Only public data lives here: addresses, indices and display names.
#[derive(Clone)]
pub struct AccountBook {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl AccountBook {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub async fn load(&self) -> Result<Vec<Account>> {
        match self.store.get_item(&self.key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save(&self, accounts: &[Account]) -> Result<()> {
        let json = serde_json::to_string(accounts)?;
        self.store.set_item(&self.key, &json).await
    }

    pub async fn append(&self, account: Account) -> Result<()> {
        let mut accounts = self.load().await?;
        if accounts.iter().any(|a| a.derivation_index == account.derivation_index) {
            return Err(Error::Validation(format!(
                "Account {} already exists",
                account.derivation_index
            )));
        }
        accounts.push(account);
        self.save(&accounts).await
    }

    /// Lowest index not yet in the book
    pub async fn next_index(&self) -> Result<u32> {
        let accounts = self.load().await?;
        Ok(accounts
            .iter()
            .map(|a| a.derivation_index + 1)
            .max()
            .unwrap_or(0))
    }

    /// Derivation index for `address`; `Ok(None)` when the book is empty.
    /// An address that is not in a non-empty book is a `Validation` error.
    pub async fn index_of(&self, address: Address) -> Result<Option<u32>> {
        let accounts = self.load().await?;
        if accounts.is_empty() {
            return Ok(None);
        }
        let wanted = format!("{:?}", address);
        accounts
            .iter()
            .find(|a| a.address.eq_ignore_ascii_case(&wanted))
            .map(|a| Some(a.derivation_index))
            .ok_or_else(|| Error::Validation(format!("Unknown account: {}", wanted)))
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.remove_item(&self.key).await
    }
}
