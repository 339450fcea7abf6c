//! Runtime configuration for the custody core

use serde::{Deserialize, Serialize};

use crate::transaction::chains::{default_chains, ChainConfig};

/// PBKDF2 policy used when sealing secrets under a PIN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfPolicy {
    /// Rounds used for every new ciphertext
    pub iterations: u32,
    /// Rounds assumed for blobs written before the count was recorded
    pub legacy_iterations: u32,
}

impl Default for KdfPolicy {
    fn default() -> Self {
        Self {
            iterations: 5_000,
            legacy_iterations: 1_000,
        }
    }
}

/// Failed-PIN backoff configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Consecutive failures tolerated before attempts are refused
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 30,
            max_delay_secs: 3_600,
        }
    }
}

/// Names under which secrets and account data are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    /// Hardware keystore service holding the mnemonic
    pub keystore_service: String,
    /// Key-value entry holding the PIN-encrypted backup
    pub secret_blob_key: String,
    /// Key-value entry holding the derived account list
    pub accounts_key: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            keystore_service: "custody.wallet.mnemonic".to_string(),
            secret_blob_key: "custody.wallet.encrypted_mnemonic".to_string(),
            accounts_key: "custody.wallet.accounts".to_string(),
        }
    }
}

/// Top-level configuration handed to the wallet and the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub kdf: KdfPolicy,
    pub lockout: LockoutConfig,
    pub storage: StorageKeys,
    pub chains: Vec<ChainConfig>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kdf: KdfPolicy::default(),
            lockout: LockoutConfig::default(),
            storage: StorageKeys::default(),
            chains: default_chains(),
        }
    }
}

impl CoreConfig {
    /// Build the configuration from defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("CUSTODY_KDF_ITERATIONS") {
            config.kdf.iterations = v;
        }
        if let Some(v) = env_parse("CUSTODY_KDF_LEGACY_ITERATIONS") {
            config.kdf.legacy_iterations = v;
        }
        if let Some(v) = env_parse("CUSTODY_LOCKOUT_MAX_ATTEMPTS") {
            config.lockout.max_attempts = v;
        }
        if let Some(v) = env_parse("CUSTODY_LOCKOUT_BASE_DELAY_SECS") {
            config.lockout.base_delay_secs = v;
        }
        if let Some(v) = env_parse("CUSTODY_LOCKOUT_MAX_DELAY_SECS") {
            config.lockout.max_delay_secs = v;
        }

        for chain in config.chains.iter_mut() {
            if let Ok(url) = std::env::var(format!("CUSTODY_RPC_URL_{}", chain.chain_id)) {
                chain.rpc_url = url;
            }
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.kdf.iterations, 5_000);
        assert_eq!(config.kdf.legacy_iterations, 1_000);
        assert_eq!(config.lockout.max_attempts, 5);
        assert!(config.chains.iter().any(|c| c.chain_id == 1));
        assert!(config.chains.iter().any(|c| c.chain_id == 11155111));
    }

    #[test]
    fn test_rpc_override_from_env() {
        std::env::set_var("CUSTODY_RPC_URL_8453", "http://localhost:8545");
        let config = CoreConfig::from_env();
        std::env::remove_var("CUSTODY_RPC_URL_8453");

        let base = config.chains.iter().find(|c| c.chain_id == 8453).unwrap();
        assert_eq!(base.rpc_url, "http://localhost:8545");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CoreConfig = serde_json::from_str(r#"{"kdf":{"iterations":10000,"legacy_iterations":1000}}"#).unwrap();
        assert_eq!(config.kdf.iterations, 10_000);
        assert_eq!(config.lockout, LockoutConfig::default());
        assert!(!config.chains.is_empty());
    }
}
