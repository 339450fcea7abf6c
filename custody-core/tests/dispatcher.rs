//! Tests for the signing dispatcher

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use custody_core::crypto::mnemonic::WordCount;
use custody_core::transaction::{ChainRegistry, SigningDispatcher};
use custody_core::{Error, ErrorKind};
use ethers::types::{Address, Signature, H256};
use ethers::utils::{hash_message, rlp};
use serde_json::json;

use common::*;

fn dispatcher(fx: &Fixture, connector: Arc<RecordingConnector>) -> SigningDispatcher {
    SigningDispatcher::new(
        ChainRegistry::new(fx.config.chains.clone()),
        fx.wallet.secret_store().clone(),
        fx.wallet.account_book().clone(),
        connector,
    )
}

fn parse_signature(hex_sig: &str) -> Signature {
    hex_sig.trim_start_matches("0x").parse().unwrap()
}

#[tokio::test]
async fn test_personal_sign_with_seed() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let connector = Arc::new(RecordingConnector::default());
    let dispatcher = dispatcher(&fx, connector.clone());

    let result = dispatcher
        .handle_request("personal_sign", &json!(["Hello World", ABANDON_ADDRESS]), 1)
        .await
        .unwrap();

    let signature = parse_signature(&result);
    let signer = signature.recover(hash_message("Hello World")).unwrap();
    assert_eq!(signer, ABANDON_ADDRESS.parse::<Address>().unwrap());
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_account_outside_the_book_is_refused() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let dispatcher = dispatcher(&fx, Arc::new(RecordingConnector::default()));

    let err = dispatcher
        .handle_request(
            "personal_sign",
            &json!(["Hello World", "0x6fac4d18c912343bf86fa7049364dd4e424ab9c0"]),
            1,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("Unknown account"));
}

#[tokio::test]
async fn test_personal_sign_without_seed_is_authentication_error() {
    let fx = fixture();
    let connector = Arc::new(RecordingConnector::default());
    let dispatcher = dispatcher(&fx, connector.clone());

    let err = dispatcher
        .handle_request("personal_sign", &json!(["Hello World", ABANDON_ADDRESS]), 1)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(err.to_string().contains("Failed to retrieve mnemonic"));
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_send_without_seed_touches_no_rpc() {
    let fx = fixture();
    let connector = Arc::new(RecordingConnector::default());
    let dispatcher = dispatcher(&fx, connector.clone());

    let err = dispatcher
        .handle_request("eth_sendTransaction", &json!([{"from": ABANDON_ADDRESS, "to": ABANDON_ADDRESS}]), 1)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(connector.rpc.total_calls(), 0);
}

#[tokio::test]
async fn test_unknown_chain_fails_before_anything_else() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let connector = Arc::new(RecordingConnector::default());
    let dispatcher = dispatcher(&fx, connector.clone());

    for method in ["personal_sign", "eth_sendTransaction", "eth_signTypedData_v4"] {
        let err = dispatcher.handle_request(method, &json!([]), 999).await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported chain: 999");
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }
    assert_eq!(fx.keystore.prompts_shown(), 0);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_method() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let dispatcher = dispatcher(&fx, Arc::new(RecordingConnector::default()));

    let err = dispatcher.handle_request("eth_accounts", &json!([]), 1).await.unwrap_err();
    assert_eq!(err.to_string(), "Unsupported method: eth_accounts");
}

#[tokio::test]
async fn test_send_transaction_resolves_nonce_and_broadcasts() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let connector = Arc::new(RecordingConnector::default());
    let dispatcher = dispatcher(&fx, connector.clone());

    let hash = dispatcher
        .handle_request(
            "eth_sendTransaction",
            &json!([{"from": ABANDON_ADDRESS, "to": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e", "value": "0x1"}]),
            1,
        )
        .await
        .unwrap();

    let rpc = &connector.rpc;
    assert_eq!(rpc.nonce_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rpc.estimate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rpc.sent.lock().len(), 1);
    assert!(hash.starts_with("0x"));
    assert_eq!(hash.len(), 66);
}

#[tokio::test]
async fn test_sign_transaction_legacy_on_bsc() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let connector = Arc::new(RecordingConnector::default());
    let dispatcher = dispatcher(&fx, connector.clone());

    let raw = dispatcher
        .handle_request(
            "eth_signTransaction",
            &json!([{"from": ABANDON_ADDRESS, "to": ABANDON_ADDRESS, "nonce": "0x9", "gas": "0x5208"}]),
            56,
        )
        .await
        .unwrap();

    let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap();
    // legacy transactions are a bare RLP list
    assert!(bytes[0] >= 0xc0);
    let nonce: u64 = rlp::Rlp::new(&bytes).val_at(0).unwrap();
    assert_eq!(nonce, 9);

    let rpc = &connector.rpc;
    assert_eq!(rpc.nonce_calls.load(Ordering::SeqCst), 0);
    assert_eq!(rpc.estimate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(rpc.gas_price_calls.load(Ordering::SeqCst), 1);
    assert!(rpc.sent.lock().is_empty());
}

#[tokio::test]
async fn test_eth_sign_is_unprefixed() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let dispatcher = dispatcher(&fx, Arc::new(RecordingConnector::default()));
    let hash = H256::repeat_byte(0xab);

    let result = dispatcher
        .handle_request("eth_sign", &json!([ABANDON_ADDRESS, format!("{:#x}", hash)]), 1)
        .await
        .unwrap();

    let signer = parse_signature(&result).recover(hash).unwrap();
    assert_eq!(signer, ABANDON_ADDRESS.parse::<Address>().unwrap());
}

#[tokio::test]
async fn test_typed_data_v4_signs_and_bad_shapes_fail() {
    let fx = fixture();
    fx.wallet.import(ABANDON, "1234").await.unwrap();
    let dispatcher = dispatcher(&fx, Arc::new(RecordingConnector::default()));

    let typed = json!({
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "chainId", "type": "uint256"}
            ],
            "Greeting": [{"name": "text", "type": "string"}]
        },
        "primaryType": "Greeting",
        "domain": {"name": "Custody", "chainId": 1},
        "message": {"text": "gm"}
    });

    let from_object = dispatcher
        .handle_request("eth_signTypedData_v4", &json!([ABANDON_ADDRESS, typed.clone()]), 1)
        .await
        .unwrap();
    let from_string = dispatcher
        .handle_request("eth_signTypedData_v3", &json!([ABANDON_ADDRESS, typed.to_string()]), 1)
        .await
        .unwrap();
    assert_eq!(from_object, from_string);

    let err = dispatcher
        .handle_request("eth_signTypedData", &json!([ABANDON_ADDRESS, 17]), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTypedData(_)));
}

#[tokio::test]
async fn test_signs_with_requested_account() {
    let fx = fixture();
    fx.wallet.create("1234", WordCount::Words12).await.unwrap();
    let second = fx.wallet.add_account("Savings").await.unwrap();
    let dispatcher = dispatcher(&fx, Arc::new(RecordingConnector::default()));

    let result = dispatcher
        .handle_request("personal_sign", &json!(["0x6869", second]), 1)
        .await
        .unwrap();
    let signer = parse_signature(&result).recover(hash_message(b"hi")).unwrap();
    assert_eq!(format!("{:?}", signer), second);

    let err = dispatcher
        .handle_request("personal_sign", &json!(["hi", ABANDON_ADDRESS]), 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
