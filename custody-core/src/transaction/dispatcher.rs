//! Method-based routing of signing requests

use std::sync::Arc;

use ethers::signers::Signer;
use serde_json::Value;
use tracing::{debug, info};

use crate::account::AccountBook;
use crate::crypto::keys::{derive_signing_key, ethereum::address_from_key};
use crate::error::{Error, Result};
use crate::storage::SecretStore;
use super::chains::{ChainConfig, ChainRegistry};
use super::ethereum::{
    build_transaction, local_wallet, sign_personal_message, sign_raw_hash, sign_transaction, sign_typed_data,
    signature_hex,
};
use super::provider::RpcConnector;
use super::request::WalletRequest;

/// Serves signing requests for the configured chains.
///
/// The signing key is derived per call from a freshly retrieved seed and
/// dropped when the call returns.
#[derive(Clone)]
pub struct SigningDispatcher {
    chains: ChainRegistry,
    secrets: SecretStore,
    accounts: AccountBook,
    connector: Arc<dyn RpcConnector>,
}

impl SigningDispatcher {
    pub fn new(
        chains: ChainRegistry,
        secrets: SecretStore,
        accounts: AccountBook,
        connector: Arc<dyn RpcConnector>,
    ) -> Self {
        Self {
            chains,
            secrets,
            accounts,
            connector,
        }
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    /// Decode and serve a raw JSON-RPC call
    pub async fn handle_request(&self, method: &str, params: &Value, chain_id: u64) -> Result<String> {
        let chain = self.chains.get(chain_id)?;
        let request = WalletRequest::decode(method, params)?;
        self.execute(chain, request).await
    }

    /// Serve an already decoded request
    pub async fn dispatch(&self, request: WalletRequest, chain_id: u64) -> Result<String> {
        let chain = self.chains.get(chain_id)?;
        self.execute(chain, request).await
    }

    async fn execute(&self, chain: &ChainConfig, request: WalletRequest) -> Result<String> {
        let method = request.method();
        debug!(method, chain_id = chain.chain_id, "Dispatching request");

        let mnemonic = self.secrets.retrieve().await.ok_or_else(Error::missing_mnemonic)?;

        let index = match request.address() {
            Some(address) => self
                .accounts
                .index_of(address)
                .await?
                .ok_or_else(|| Error::Validation(format!("Unknown account: {:?}", address)))?,
            None => self.accounts.load().await?.first().map(|a| a.derivation_index).unwrap_or(0),
        };
        let key = derive_signing_key(&mnemonic, index)?;
        drop(mnemonic);

        if let Some(address) = request.address() {
            let derived = address_from_key(&key)?;
            if !derived.eq_ignore_ascii_case(&format!("{:?}", address)) {
                return Err(Error::Validation(format!("Unknown account: {:?}", address)));
            }
        }

        let wallet = local_wallet(&key, chain.chain_id)?;
        drop(key);

        let result = match request {
            WalletRequest::SendTransaction(params) => {
                let rpc = self.connector.connect(chain)?;
                let tx = build_transaction(&params, wallet.address(), chain, rpc.as_ref()).await?;
                let raw = sign_transaction(&wallet, &tx)?;
                let hash = rpc.send_raw_transaction(raw).await?;
                format!("{:#x}", hash)
            }
            WalletRequest::SignTransaction(params) => {
                let rpc = self.connector.connect(chain)?;
                let tx = build_transaction(&params, wallet.address(), chain, rpc.as_ref()).await?;
                let raw = sign_transaction(&wallet, &tx)?;
                format!("0x{}", hex::encode(raw.as_ref()))
            }
            WalletRequest::PersonalSign { message, .. } => {
                signature_hex(&sign_personal_message(&wallet, &message).await?)
            }
            WalletRequest::EthSign { hash, .. } => signature_hex(&sign_raw_hash(&wallet, hash)?),
            WalletRequest::SignTypedData { data, .. } => signature_hex(&sign_typed_data(&wallet, &data).await?),
        };

        info!(method, chain_id = chain.chain_id, "Request signed");
        Ok(result)
    }
}
