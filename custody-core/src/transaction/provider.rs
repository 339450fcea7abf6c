//! Per-chain JSON-RPC access

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, H256, U256};
use tracing::debug;

use crate::error::{Error, Result};
use super::chains::ChainConfig;

/// The RPC calls the signer needs from a node
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Pending-block nonce for `address`
    async fn get_transaction_count(&self, address: Address) -> Result<U256>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256>;

    async fn get_gas_price(&self) -> Result<U256>;

    /// Broadcast a signed, RLP-encoded transaction and return its hash
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;
}

/// Opens an RPC client for a chain. Called lazily, only for methods that touch the network.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainRpc>>;
}

/// `ethers` HTTP provider
pub struct EthersRpc {
    provider: Provider<Http>,
}

impl EthersRpc {
    pub fn new(chain: &ChainConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())
            .map_err(|e| Error::Transport(format!("Failed to create provider for {}: {}", chain.name, e)))?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainRpc for EthersRpc {
    async fn get_transaction_count(&self, address: Address) -> Result<U256> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| Error::Transport(format!("eth_getTransactionCount failed: {}", e)))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
        self.provider
            .estimate_gas(tx, None)
            .await
            .map_err(|e| Error::Transport(format!("eth_estimateGas failed: {}", e)))
    }

    async fn get_gas_price(&self) -> Result<U256> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| Error::Transport(format!("eth_gasPrice failed: {}", e)))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| Error::Transport(format!("eth_sendRawTransaction failed: {}", e)))?;
        let hash = pending.tx_hash();
        debug!(tx_hash = ?hash, "Transaction broadcast");
        Ok(hash)
    }
}

/// Connects [`EthersRpc`] clients over HTTP
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl RpcConnector for HttpConnector {
    fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainRpc>> {
        Ok(Arc::new(EthersRpc::new(chain)?))
    }
}
