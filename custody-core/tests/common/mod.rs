//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use custody_core::config::{CoreConfig, KdfPolicy};
use custody_core::transaction::{ChainConfig, ChainRpc, RpcConnector};
use custody_core::{Result, Wallet};
use custody_core::storage::{InMemoryKeyValueStore, InMemoryKeystore};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use parking_lot::Mutex;

pub const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const ABANDON_ADDRESS: &str = "0x9858effd232b4033e47d90003d41ec34ecaeda94";

/// Node fake that records every call
#[derive(Default)]
pub struct RecordingRpc {
    pub nonce_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
    pub gas_price_calls: AtomicUsize,
    pub sent: Mutex<Vec<Bytes>>,
}

impl RecordingRpc {
    pub fn total_calls(&self) -> usize {
        self.nonce_calls.load(Ordering::SeqCst)
            + self.estimate_calls.load(Ordering::SeqCst)
            + self.gas_price_calls.load(Ordering::SeqCst)
            + self.sent.lock().len()
    }
}

#[async_trait]
impl ChainRpc for RecordingRpc {
    async fn get_transaction_count(&self, _address: Address) -> Result<U256> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(4))
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(21_000))
    }

    async fn get_gas_price(&self) -> Result<U256> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(2_000_000_000u64))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let hash = H256::from(ethers::utils::keccak256(&raw));
        self.sent.lock().push(raw);
        Ok(hash)
    }
}

/// Hands out the same [`RecordingRpc`] for every chain
#[derive(Default)]
pub struct RecordingConnector {
    pub rpc: Arc<RecordingRpc>,
    pub connects: AtomicUsize,
}

impl RpcConnector for RecordingConnector {
    fn connect(&self, _chain: &ChainConfig) -> Result<Arc<dyn ChainRpc>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.rpc.clone())
    }
}

pub fn fast_config() -> CoreConfig {
    CoreConfig {
        kdf: KdfPolicy {
            iterations: 50,
            legacy_iterations: 5,
        },
        ..CoreConfig::default()
    }
}

pub struct Fixture {
    pub config: CoreConfig,
    pub keystore: Arc<InMemoryKeystore>,
    pub kv: Arc<InMemoryKeyValueStore>,
    pub wallet: Wallet,
}

pub fn fixture() -> Fixture {
    let config = fast_config();
    let keystore = Arc::new(InMemoryKeystore::new());
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let wallet = Wallet::new(&config, keystore.clone(), kv.clone());
    Fixture {
        config,
        keystore,
        kv,
        wallet,
    }
}
