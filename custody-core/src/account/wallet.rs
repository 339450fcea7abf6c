//! Wallet lifecycle exposed to the UI layer

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::crypto::codec::SecretCodec;
use crate::crypto::keys::{self, Account};
use crate::crypto::mnemonic::{self, Mnemonic, WordCount};
use crate::error::{Error, Result};
use crate::lockout::LockoutPolicy;
use crate::storage::{HardwareKeystore, KeyValueStore, SecretStore};
use super::book::AccountBook;

/// Result of [`Wallet::create`]; the phrase is shown once for backup
#[derive(Debug)]
pub struct CreatedWallet {
    pub mnemonic: Mnemonic,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedWallet {
    pub address: String,
}

/// Create, import, unlock and reset a single-seed wallet.
///
/// Holds only handles to storage; the mnemonic is re-read for every operation.
#[derive(Clone)]
pub struct Wallet {
    secrets: SecretStore,
    accounts: AccountBook,
    lockout: Arc<LockoutPolicy>,
}

impl Wallet {
    pub fn new(config: &CoreConfig, keystore: Arc<dyn HardwareKeystore>, kv: Arc<dyn KeyValueStore>) -> Self {
        let secrets = SecretStore::new(
            keystore,
            kv.clone(),
            SecretCodec::new(config.kdf),
            config.storage.clone(),
        );
        let accounts = AccountBook::new(kv, config.storage.accounts_key.clone());

        Self {
            secrets,
            accounts,
            lockout: Arc::new(LockoutPolicy::new(config.lockout)),
        }
    }

    pub fn secret_store(&self) -> &SecretStore {
        &self.secrets
    }

    pub fn account_book(&self) -> &AccountBook {
        &self.accounts
    }

    pub fn lockout(&self) -> &LockoutPolicy {
        &self.lockout
    }

    /// Generate a fresh mnemonic, persist it under `pin` and derive account 0
    pub async fn create(&self, pin: &str, word_count: WordCount) -> Result<CreatedWallet> {
        validate_pin(pin)?;
        let mnemonic = mnemonic::generate(word_count)?;
        let address = self.install(&mnemonic, pin).await?;
        info!(%address, words = word_count.words(), "Wallet created");
        Ok(CreatedWallet { mnemonic, address })
    }

    /// Restore from an existing phrase
    pub async fn import(&self, phrase: &str, pin: &str) -> Result<ImportedWallet> {
        validate_pin(pin)?;
        let mnemonic = Mnemonic::parse(phrase)?;
        let address = self.install(&mnemonic, pin).await?;
        info!(%address, "Wallet imported");
        Ok(ImportedWallet { address })
    }

    /// Check `pin` against the encrypted backup.
    ///
    /// A wrong PIN is `Ok(false)`; an open backoff window is `Err(LockedOut)`.
    /// Without a backup there is nothing to check and no attempt is counted.
    pub async fn unlock_with_pin(&self, pin: &str) -> Result<bool> {
        self.lockout.check()?;
        if !self.secrets.has_encrypted_backup().await {
            return Err(Error::missing_mnemonic());
        }

        match self.secrets.retrieve_with_pin(pin).await {
            Some(_) => {
                self.lockout.record_success();
                info!("Unlocked with PIN");
                Ok(true)
            }
            None => {
                let failures = self.lockout.record_failure();
                warn!(failures, "PIN unlock failed");
                Ok(false)
            }
        }
    }

    /// Unlock through the hardware keystore prompt. Success clears the lockout.
    pub async fn unlock_with_biometrics(&self) -> bool {
        let unlocked = self.secrets.retrieve().await.is_some();
        if unlocked {
            self.lockout.record_success();
            info!("Unlocked with biometrics");
        } else {
            warn!("Biometric unlock failed");
        }
        unlocked
    }

    /// Derive the next account and remember it under `name`
    pub async fn add_account(&self, name: &str) -> Result<String> {
        let mnemonic = self.secrets.retrieve().await.ok_or_else(Error::missing_mnemonic)?;

        let index = self.accounts.next_index().await?;
        let mut account = keys::derive(&mnemonic, index)?;
        if !name.trim().is_empty() {
            account.display_name = name.trim().to_string();
        }
        let address = account.address.clone();
        self.accounts.append(account).await?;

        info!(%address, index, "Account added");
        Ok(address)
    }

    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.accounts.load().await
    }

    /// Wipe secrets, accounts and the attempt counter. Never fails.
    pub async fn reset(&self) {
        self.secrets.clear().await;
        if let Err(e) = self.accounts.clear().await {
            warn!("Account list removal failed: {}", e);
        }
        self.lockout.record_success();
        info!("Wallet reset");
    }

    async fn install(&self, mnemonic: &Mnemonic, pin: &str) -> Result<String> {
        let account = keys::derive(mnemonic, 0)?;
        self.accounts.save(std::slice::from_ref(&account)).await?;
        if let Err(e) = self.secrets.store(mnemonic, pin).await {
            // no account may outlive its seed
            self.secrets.clear().await;
            if let Err(cleanup) = self.accounts.clear().await {
                warn!("Account list removal failed: {}", cleanup);
            }
            return Err(e);
        }
        self.lockout.record_success();
        Ok(account.address)
    }
}

fn validate_pin(pin: &str) -> Result<()> {
    if pin.is_empty() {
        return Err(Error::Validation("PIN must not be empty".to_string()));
    }
    Ok(())
}
