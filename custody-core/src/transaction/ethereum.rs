//! EVM transaction construction and signing

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, Signature, TransactionRequest, H256};
use tracing::debug;

use crate::crypto::keys::DerivedKey;
use crate::error::{Error, Result};
use super::chains::ChainConfig;
use super::fees::{resolve_fees, FeeSettings};
use super::provider::ChainRpc;
use super::types::TransactionParams;

/// Build a signer for `chain` from a derived key. The returned wallet must not
/// outlive the request it was created for.
pub fn local_wallet(key: &DerivedKey, chain_id: u64) -> Result<LocalWallet> {
    let wallet = LocalWallet::from_bytes(key.secret_bytes())
        .map_err(|e| Error::Signing(format!("Invalid private key: {}", e)))?;
    Ok(wallet.with_chain_id(chain_id))
}

/// Turn dApp params into a complete transaction.
///
/// A caller-supplied nonce is kept only when present; otherwise the pending
/// nonce is fetched. Gas is estimated when no limit was given.
pub async fn build_transaction(
    params: &TransactionParams,
    from: Address,
    chain: &ChainConfig,
    rpc: &dyn ChainRpc,
) -> Result<TypedTransaction> {
    let nonce = match params.nonce {
        Some(nonce) => nonce,
        None => rpc.get_transaction_count(from).await?,
    };
    let fees = resolve_fees(params.fee_request(), chain, rpc).await?;

    let mut tx: TypedTransaction = match fees {
        FeeSettings::Legacy { gas_price } => {
            let mut request = TransactionRequest::new()
                .from(from)
                .nonce(nonce)
                .gas_price(gas_price)
                .chain_id(chain.chain_id);
            if let Some(to) = params.to {
                request = request.to(to);
            }
            request.into()
        }
        FeeSettings::Dynamic {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let mut request = Eip1559TransactionRequest::new()
                .from(from)
                .nonce(nonce)
                .max_fee_per_gas(max_fee_per_gas)
                .max_priority_fee_per_gas(max_priority_fee_per_gas)
                .chain_id(chain.chain_id);
            if let Some(to) = params.to {
                request = request.to(to);
            }
            request.into()
        }
    };

    if let Some(value) = params.value {
        tx.set_value(value);
    }
    if let Some(data) = &params.data {
        tx.set_data(data.clone());
    }

    let gas = match params.gas_limit() {
        Some(gas) => gas,
        None => rpc.estimate_gas(&tx).await?,
    };
    tx.set_gas(gas);

    debug!(chain_id = chain.chain_id, nonce = %nonce, gas = %gas, "Transaction built");
    Ok(tx)
}

/// Sign and RLP-encode a transaction
pub fn sign_transaction(wallet: &LocalWallet, tx: &TypedTransaction) -> Result<Bytes> {
    let signature = wallet
        .sign_transaction_sync(tx)
        .map_err(|e| Error::Signing(format!("Failed to sign transaction: {}", e)))?;
    Ok(tx.rlp_signed(&signature))
}

/// EIP-191 `personal_sign`
pub async fn sign_personal_message(wallet: &LocalWallet, message: &[u8]) -> Result<Signature> {
    wallet
        .sign_message(message)
        .await
        .map_err(|e| Error::Signing(format!("Failed to sign message: {}", e)))
}

/// `eth_sign`: the 32-byte hash is signed as-is, without any prefix
pub fn sign_raw_hash(wallet: &LocalWallet, hash: H256) -> Result<Signature> {
    wallet
        .sign_hash(hash)
        .map_err(|e| Error::Signing(format!("Failed to sign hash: {}", e)))
}

/// EIP-712 structured data
pub async fn sign_typed_data(wallet: &LocalWallet, data: &TypedData) -> Result<Signature> {
    wallet
        .sign_typed_data(data)
        .await
        .map_err(|e| Error::InvalidTypedData(format!("Failed to sign typed data: {}", e)))
}

/// 0x-prefixed `r || s || v`
pub fn signature_hex(signature: &Signature) -> String {
    format!("0x{}", hex::encode(signature.to_vec()))
}
