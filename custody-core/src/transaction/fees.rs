//! Gas fee resolution.
//!
//! A caller may supply either a legacy `gasPrice` or the EIP-1559 pair, never
//! both: a legacy price suppresses the dynamic fields entirely.

use ethers::types::U256;
use tracing::debug;

use crate::error::Result;
use super::chains::ChainConfig;
use super::provider::ChainRpc;

/// 1.5 gwei
pub const DEFAULT_PRIORITY_FEE_WEI: u64 = 1_500_000_000;

/// What the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRequest {
    Legacy(U256),
    Dynamic {
        max_fee: Option<U256>,
        max_priority_fee: Option<U256>,
    },
}

impl FeeRequest {
    pub fn from_fields(gas_price: Option<U256>, max_fee: Option<U256>, max_priority_fee: Option<U256>) -> Self {
        match gas_price {
            Some(price) => Self::Legacy(price),
            None => Self::Dynamic {
                max_fee,
                max_priority_fee,
            },
        }
    }
}

/// Fully resolved fees, ready to go on a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSettings {
    Legacy {
        gas_price: U256,
    },
    Dynamic {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

/// Fill in whatever the caller left out, querying the node only when needed
pub async fn resolve_fees(request: FeeRequest, chain: &ChainConfig, rpc: &dyn ChainRpc) -> Result<FeeSettings> {
    let settings = match request {
        FeeRequest::Legacy(gas_price) => FeeSettings::Legacy { gas_price },
        FeeRequest::Dynamic { max_fee, .. } if !chain.eip1559 => {
            let gas_price = match max_fee {
                Some(fee) => fee,
                None => rpc.get_gas_price().await?,
            };
            FeeSettings::Legacy { gas_price }
        }
        FeeRequest::Dynamic {
            max_fee: Some(max_fee),
            max_priority_fee: Some(priority),
        } => dynamic(max_fee, priority),
        FeeRequest::Dynamic {
            max_fee,
            max_priority_fee,
        } => {
            let priority = max_priority_fee.unwrap_or_else(|| U256::from(DEFAULT_PRIORITY_FEE_WEI));
            let max_fee = match max_fee {
                Some(fee) => fee,
                None => {
                    let gas_price = rpc.get_gas_price().await?;
                    gas_price.saturating_mul(U256::from(2)).saturating_add(priority)
                }
            };
            dynamic(max_fee, priority)
        }
    };

    debug!(chain_id = chain.chain_id, ?settings, "Fees resolved");
    Ok(settings)
}

fn dynamic(max_fee: U256, priority: U256) -> FeeSettings {
    FeeSettings::Dynamic {
        max_fee_per_gas: max_fee,
        max_priority_fee_per_gas: priority.min(max_fee),
    }
}
