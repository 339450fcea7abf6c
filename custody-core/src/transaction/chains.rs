//! EVM chain table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One supported EVM network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub native_symbol: String,
    /// Whether the network accepts type-2 (EIP-1559) transactions
    pub eip1559: bool,
}

impl ChainConfig {
    pub fn new(chain_id: u64, name: &str, rpc_url: &str, native_symbol: &str, eip1559: bool) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
            native_symbol: native_symbol.to_string(),
            eip1559,
        }
    }

    /// CAIP-2 identifier, e.g. `eip155:1`
    pub fn caip2(&self) -> String {
        format!("eip155:{}", self.chain_id)
    }
}

pub fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig::new(1, "Ethereum", "https://eth.llamarpc.com", "ETH", true),
        ChainConfig::new(10, "Optimism", "https://mainnet.optimism.io", "ETH", true),
        ChainConfig::new(56, "BNB Smart Chain", "https://bsc-dataseed.binance.org", "BNB", false),
        ChainConfig::new(137, "Polygon", "https://polygon-rpc.com", "MATIC", true),
        ChainConfig::new(8453, "Base", "https://mainnet.base.org", "ETH", true),
        ChainConfig::new(42161, "Arbitrum One", "https://arb1.arbitrum.io/rpc", "ETH", true),
        ChainConfig::new(11155111, "Sepolia", "https://rpc.sepolia.org", "ETH", true),
    ]
}

/// Lookup table from chain id to configuration
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainConfig>,
}

impl ChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = ChainConfig>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
        }
    }

    /// Resolve a chain id; unknown ids are never mapped to a default
    pub fn get(&self, chain_id: u64) -> Result<&ChainConfig> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| Error::unsupported_chain(chain_id))
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new(default_chains())
    }
}

/// Parse a CAIP-2 `eip155:<id>` chain reference
pub fn parse_caip2(reference: &str) -> Result<u64> {
    reference
        .strip_prefix("eip155:")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Error::Validation(format!("Invalid chain reference: {}", reference)))
}
