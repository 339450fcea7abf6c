//! Transaction object as sent by a dApp

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::fees::FeeRequest;

/// The `eth_sendTransaction` / `eth_signTransaction` parameter object.
///
/// Numeric fields are 0x-prefixed hex quantities. Any field the caller leaves
/// out is resolved against the chain when the transaction is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParams {
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default, alias = "input")]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub gas: Option<U256>,
    #[serde(default)]
    pub gas_limit: Option<U256>,
    #[serde(default)]
    pub gas_price: Option<U256>,
    #[serde(default)]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub nonce: Option<U256>,
}

impl TransactionParams {
    /// `gas` wins over the `gasLimit` spelling some dApps use
    pub fn gas_limit(&self) -> Option<U256> {
        self.gas.or(self.gas_limit)
    }

    pub fn fee_request(&self) -> FeeRequest {
        FeeRequest::from_fields(self.gas_price, self.max_fee_per_gas, self.max_priority_fee_per_gas)
    }
}
