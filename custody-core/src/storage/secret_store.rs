//! Dual-backend persistence of the wallet mnemonic

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::StorageKeys;
use crate::crypto::codec::{EncryptedSecret, SecretCodec};
use crate::crypto::mnemonic::Mnemonic;
use crate::error::{Error, Result};
use super::keystore::{HardwareKeystore, PromptOptions};
use super::kv::KeyValueStore;

/// Keeps the mnemonic in the hardware keystore and a PIN-encrypted copy in the
/// key-value store, so either path can recover it on its own.
///
/// Nothing here caches a decrypted secret: every read goes back to a backend.
#[derive(Clone)]
pub struct SecretStore {
    keystore: Arc<dyn HardwareKeystore>,
    blobs: Arc<dyn KeyValueStore>,
    codec: SecretCodec,
    keys: StorageKeys,
}

impl SecretStore {
    pub fn new(
        keystore: Arc<dyn HardwareKeystore>,
        blobs: Arc<dyn KeyValueStore>,
        codec: SecretCodec,
        keys: StorageKeys,
    ) -> Self {
        Self {
            keystore,
            blobs,
            codec,
            keys,
        }
    }

    /// Write the mnemonic to both backends.
    ///
    /// Both writes are always attempted; if either fails the first error is returned.
    pub async fn store(&self, mnemonic: &Mnemonic, pin: &str) -> Result<()> {
        let keystore_result = self
            .keystore
            .set_entry(&self.keys.keystore_service, mnemonic.phrase())
            .await;
        if let Err(e) = &keystore_result {
            warn!("Keystore write failed: {}", e);
        }

        let blob_result = self.write_blob(mnemonic, pin).await;
        if let Err(e) = &blob_result {
            warn!("Encrypted backup write failed: {}", e);
        }

        keystore_result.and(blob_result).map_err(|e| match e {
            Error::Storage(msg) => Error::Storage(msg),
            other => Error::Storage(other.to_string()),
        })?;

        info!("Secret stored in keystore and encrypted backup");
        Ok(())
    }

    /// Read the mnemonic from the hardware keystore: silently first, then
    /// behind a biometric/passcode prompt. Any failure yields `None`.
    pub async fn retrieve(&self) -> Option<Mnemonic> {
        let service = &self.keys.keystore_service;

        match self.keystore.get_entry(service, None).await {
            Ok(Some(secret)) => match Mnemonic::parse(&secret) {
                Ok(mnemonic) => return Some(mnemonic),
                Err(_) => warn!("Keystore entry is not a valid mnemonic"),
            },
            Ok(None) => debug!("Silent keystore read returned nothing"),
            Err(e) => debug!("Silent keystore read failed: {}", e),
        }

        let prompt = PromptOptions::default();
        match self.keystore.get_entry(service, Some(&prompt)).await {
            Ok(Some(secret)) => Mnemonic::parse(&secret).ok(),
            Ok(None) => None,
            Err(e) => {
                debug!("Prompted keystore read failed: {}", e);
                None
            }
        }
    }

    /// Decrypt the encrypted backup with `pin`.
    ///
    /// Returns `None` for a missing blob, a wrong PIN or a storage failure. A
    /// blob that only opened under an older scheme is re-sealed under the
    /// current one.
    pub async fn retrieve_with_pin(&self, pin: &str) -> Option<Mnemonic> {
        let blob = match self.read_blob().await {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                warn!("Encrypted backup unreadable: {}", e);
                return None;
            }
        };

        let decrypted = self.codec.decrypt(&blob, pin)?;
        let mnemonic = Mnemonic::parse(&decrypted.plaintext).ok()?;

        if decrypted.scheme != self.codec.current_scheme() {
            info!(scheme = ?decrypted.scheme, "Migrating encrypted backup to current scheme");
            if let Err(e) = self.write_blob(&mnemonic, pin).await {
                warn!("Backup migration failed: {}", e);
            }
        }

        Some(mnemonic)
    }

    /// Whether a PIN-encrypted backup exists
    pub async fn has_encrypted_backup(&self) -> bool {
        matches!(self.blobs.get_item(&self.keys.secret_blob_key).await, Ok(Some(_)))
    }

    /// Best-effort wipe of both backends. Never fails.
    pub async fn clear(&self) {
        if let Err(e) = self.keystore.reset_entry(&self.keys.keystore_service).await {
            warn!("Keystore reset failed: {}", e);
        }
        if let Err(e) = self.blobs.remove_item(&self.keys.secret_blob_key).await {
            warn!("Encrypted backup removal failed: {}", e);
        }
        info!("Secret storage cleared");
    }

    async fn write_blob(&self, mnemonic: &Mnemonic, pin: &str) -> Result<()> {
        let blob = self.codec.encrypt(mnemonic.phrase(), pin)?;
        let json = serde_json::to_string(&blob)?;
        self.blobs.set_item(&self.keys.secret_blob_key, &json).await
    }

    async fn read_blob(&self) -> Result<Option<EncryptedSecret>> {
        match self.blobs.get_item(&self.keys.secret_blob_key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfPolicy;
    use crate::storage::{InMemoryKeyValueStore, InMemoryKeystore};

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn store() -> (SecretStore, Arc<InMemoryKeystore>, Arc<InMemoryKeyValueStore>) {
        let keystore = Arc::new(InMemoryKeystore::new());
        let blobs = Arc::new(InMemoryKeyValueStore::new());
        let codec = SecretCodec::new(KdfPolicy {
            iterations: 32,
            legacy_iterations: 8,
        });
        let store = SecretStore::new(keystore.clone(), blobs.clone(), codec, StorageKeys::default());
        (store, keystore, blobs)
    }

    #[tokio::test]
    async fn test_store_then_retrieve_both_paths() {
        let (store, _, _) = store();
        let mnemonic = Mnemonic::parse(ABANDON).unwrap();
        store.store(&mnemonic, "1234").await.unwrap();

        assert_eq!(store.retrieve().await, Some(mnemonic.clone()));
        assert_eq!(store.retrieve_with_pin("1234").await, Some(mnemonic));
        assert!(store.retrieve_with_pin("4321").await.is_none());
    }

    #[tokio::test]
    async fn test_silent_failure_falls_through_to_prompt() {
        let (store, keystore, _) = store();
        store.store(&Mnemonic::parse(ABANDON).unwrap(), "1234").await.unwrap();

        keystore.set_silent_read_fails(true);
        assert!(store.retrieve().await.is_some());
        assert_eq!(keystore.prompts_shown(), 1);

        keystore.set_prompt_denied(true);
        assert!(store.retrieve().await.is_none());
    }

    #[tokio::test]
    async fn test_blob_read_failure_is_none() {
        let (store, _, blobs) = store();
        store.store(&Mnemonic::parse(ABANDON).unwrap(), "1234").await.unwrap();
        blobs.set_reads_fail(true);
        assert!(store.retrieve_with_pin("1234").await.is_none());
    }
}
