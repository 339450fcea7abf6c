//! Transaction functionality
//!
//! Chain table, RPC access, fee resolution and the signing dispatcher for
//! EVM networks.

pub mod chains;
pub mod dispatcher;
pub mod ethereum;
pub mod fees;
pub mod provider;
pub mod request;
pub mod types;

pub use chains::{ChainConfig, ChainRegistry};
pub use dispatcher::SigningDispatcher;
pub use fees::{FeeRequest, FeeSettings};
pub use provider::{ChainRpc, EthersRpc, HttpConnector, RpcConnector};
pub use request::{WalletRequest, SUPPORTED_METHODS};
pub use types::TransactionParams;
