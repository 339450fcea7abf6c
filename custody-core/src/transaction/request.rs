//! Decoding of inbound JSON-RPC signing calls into typed requests

use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, H256};
use serde_json::Value;

use crate::error::{Error, Result};
use super::types::TransactionParams;

pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const ETH_SIGN_TRANSACTION: &str = "eth_signTransaction";
pub const PERSONAL_SIGN: &str = "personal_sign";
pub const ETH_SIGN: &str = "eth_sign";
pub const ETH_SIGN_TYPED_DATA: &str = "eth_signTypedData";
pub const ETH_SIGN_TYPED_DATA_V3: &str = "eth_signTypedData_v3";
pub const ETH_SIGN_TYPED_DATA_V4: &str = "eth_signTypedData_v4";

/// Every method the dispatcher can serve; also the method set granted to peers
pub const SUPPORTED_METHODS: [&str; 7] = [
    ETH_SEND_TRANSACTION,
    ETH_SIGN_TRANSACTION,
    PERSONAL_SIGN,
    ETH_SIGN,
    ETH_SIGN_TYPED_DATA,
    ETH_SIGN_TYPED_DATA_V3,
    ETH_SIGN_TYPED_DATA_V4,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedDataVersion {
    Unversioned,
    V3,
    V4,
}

/// A signing call with typed payload
#[derive(Debug, Clone)]
pub enum WalletRequest {
    SendTransaction(TransactionParams),
    SignTransaction(TransactionParams),
    PersonalSign {
        message: Vec<u8>,
        address: Option<Address>,
    },
    EthSign {
        address: Address,
        hash: H256,
    },
    SignTypedData {
        address: Option<Address>,
        data: Box<TypedData>,
        version: TypedDataVersion,
    },
}

impl WalletRequest {
    /// Decode `params` for `method`. Unknown methods are `UnsupportedOperation`,
    /// malformed params are `Validation`, unusable typed data is `InvalidTypedData`.
    pub fn decode(method: &str, params: &Value) -> Result<Self> {
        let args: &[Value] = match params {
            Value::Array(items) => items,
            Value::Null => &[],
            other => std::slice::from_ref(other),
        };

        match method {
            ETH_SEND_TRANSACTION => Ok(Self::SendTransaction(transaction_params(args)?)),
            ETH_SIGN_TRANSACTION => Ok(Self::SignTransaction(transaction_params(args)?)),
            PERSONAL_SIGN => decode_personal_sign(args),
            ETH_SIGN => decode_eth_sign(args),
            ETH_SIGN_TYPED_DATA => decode_typed_data(args, TypedDataVersion::Unversioned),
            ETH_SIGN_TYPED_DATA_V3 => decode_typed_data(args, TypedDataVersion::V3),
            ETH_SIGN_TYPED_DATA_V4 => decode_typed_data(args, TypedDataVersion::V4),
            other => Err(Error::unsupported_method(other)),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::SendTransaction(_) => ETH_SEND_TRANSACTION,
            Self::SignTransaction(_) => ETH_SIGN_TRANSACTION,
            Self::PersonalSign { .. } => PERSONAL_SIGN,
            Self::EthSign { .. } => ETH_SIGN,
            Self::SignTypedData { version, .. } => match version {
                TypedDataVersion::Unversioned => ETH_SIGN_TYPED_DATA,
                TypedDataVersion::V3 => ETH_SIGN_TYPED_DATA_V3,
                TypedDataVersion::V4 => ETH_SIGN_TYPED_DATA_V4,
            },
        }
    }

    /// The account the peer asked to sign with, if it named one
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::SendTransaction(tx) | Self::SignTransaction(tx) => tx.from,
            Self::PersonalSign { address, .. } | Self::SignTypedData { address, .. } => *address,
            Self::EthSign { address, .. } => Some(*address),
        }
    }

    /// Name `signer` as the signing account when the peer left it out
    pub fn with_default_signer(self, signer: Address) -> Self {
        match self {
            Self::SendTransaction(mut tx) => {
                tx.from.get_or_insert(signer);
                Self::SendTransaction(tx)
            }
            Self::SignTransaction(mut tx) => {
                tx.from.get_or_insert(signer);
                Self::SignTransaction(tx)
            }
            Self::PersonalSign { message, address } => Self::PersonalSign {
                message,
                address: address.or(Some(signer)),
            },
            Self::SignTypedData { address, data, version } => Self::SignTypedData {
                address: address.or(Some(signer)),
                data,
                version,
            },
            other => other,
        }
    }

    /// Whether serving the request needs a node connection
    pub fn needs_rpc(&self) -> bool {
        matches!(self, Self::SendTransaction(_) | Self::SignTransaction(_))
    }
}

pub fn is_supported_method(method: &str) -> bool {
    SUPPORTED_METHODS.contains(&method)
}

fn invalid_params(msg: &str) -> Error {
    Error::Validation(format!("Invalid params: {}", msg))
}

/// Strict `0x` + 40 hex address; used to tell the address apart from the payload
fn as_address(value: &Value) -> Option<Address> {
    let s = value.as_str()?;
    if s.len() != 42 || !s.starts_with("0x") {
        return None;
    }
    s.parse().ok()
}

fn transaction_params(args: &[Value]) -> Result<TransactionParams> {
    let tx = args
        .first()
        .filter(|v| v.is_object())
        .ok_or_else(|| invalid_params("expected a transaction object"))?;
    serde_json::from_value(tx.clone()).map_err(|e| invalid_params(&e.to_string()))
}

/// `[message, address]`, tolerating the reversed order some dApps send
fn decode_personal_sign(args: &[Value]) -> Result<WalletRequest> {
    let (message, address) = match args {
        [first, second, ..] => match (as_address(first), as_address(second)) {
            (Some(address), None) => (first_str(second)?, Some(address)),
            (_, address) => (first_str(first)?, address),
        },
        [only] => (first_str(only)?, None),
        [] => return Err(invalid_params("personal_sign expects a message")),
    };

    Ok(WalletRequest::PersonalSign {
        message: decode_message(message),
        address,
    })
}

fn first_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| invalid_params("message must be a string"))
}

/// 0x-prefixed hex is decoded to bytes, anything else is signed as UTF-8
fn decode_message(message: &str) -> Vec<u8> {
    message
        .strip_prefix("0x")
        .and_then(|h| hex::decode(h).ok())
        .unwrap_or_else(|| message.as_bytes().to_vec())
}

fn decode_eth_sign(args: &[Value]) -> Result<WalletRequest> {
    let [address, hash, ..] = args else {
        return Err(invalid_params("eth_sign expects [address, hash]"));
    };
    let address = as_address(address).ok_or_else(|| invalid_params("invalid address"))?;
    let hash = hash
        .as_str()
        .and_then(|h| h.strip_prefix("0x"))
        .and_then(|h| hex::decode(h).ok())
        .filter(|bytes| bytes.len() == 32)
        .map(|bytes| H256::from_slice(&bytes))
        .ok_or_else(|| invalid_params("eth_sign expects a 32-byte hex hash"))?;

    Ok(WalletRequest::EthSign { address, hash })
}

fn decode_typed_data(args: &[Value], version: TypedDataVersion) -> Result<WalletRequest> {
    let (address, payload) = match args {
        [first, second, ..] => match as_address(first) {
            Some(address) => (Some(address), second),
            None => (as_address(second), first),
        },
        [only] => (None, only),
        [] => return Err(Error::InvalidTypedData("missing typed data".to_string())),
    };

    Ok(WalletRequest::SignTypedData {
        address,
        data: Box::new(parse_typed_data(payload)?),
        version,
    })
}

/// Accept a JSON string or an already structured object. The legacy v1 array
/// format and anything else is rejected.
pub fn parse_typed_data(payload: &Value) -> Result<TypedData> {
    match payload {
        Value::String(json) => {
            serde_json::from_str(json).map_err(|e| Error::InvalidTypedData(e.to_string()))
        }
        Value::Object(_) => {
            serde_json::from_value(payload.clone()).map_err(|e| Error::InvalidTypedData(e.to_string()))
        }
        Value::Array(_) => Err(Error::InvalidTypedData("legacy v1 typed data is not supported".to_string())),
        _ => Err(Error::InvalidTypedData("typed data must be a JSON string or object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    const ADDRESS: &str = "0x9858effd232b4033e47d90003d41ec34ecaeda94";

    fn mail_typed_data() -> Value {
        json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "Person": [
                    {"name": "name", "type": "string"},
                    {"name": "wallet", "type": "address"}
                ],
                "Mail": [
                    {"name": "from", "type": "Person"},
                    {"name": "to", "type": "Person"},
                    {"name": "contents", "type": "string"}
                ]
            },
            "primaryType": "Mail",
            "domain": {
                "name": "Ether Mail",
                "version": "1",
                "chainId": 1,
                "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
            },
            "message": {
                "from": {"name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"},
                "to": {"name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"},
                "contents": "Hello, Bob!"
            }
        })
    }

    #[test]
    fn test_personal_sign_decodes_hex_and_plain() {
        let plain = WalletRequest::decode(PERSONAL_SIGN, &json!(["Hello World", ADDRESS])).unwrap();
        match plain {
            WalletRequest::PersonalSign { message, address } => {
                assert_eq!(message, b"Hello World");
                assert_eq!(address, Some(ADDRESS.parse().unwrap()));
            }
            other => panic!("unexpected {:?}", other),
        }

        let hex_msg = WalletRequest::decode(PERSONAL_SIGN, &json!(["0x48656c6c6f", ADDRESS])).unwrap();
        assert!(matches!(hex_msg, WalletRequest::PersonalSign { ref message, .. } if message == b"Hello"));
    }

    #[test]
    fn test_personal_sign_reversed_order() {
        let request = WalletRequest::decode(PERSONAL_SIGN, &json!([ADDRESS, "0x48656c6c6f"])).unwrap();
        assert_eq!(request.address(), Some(ADDRESS.parse().unwrap()));
        assert!(matches!(request, WalletRequest::PersonalSign { ref message, .. } if message == b"Hello"));
    }

    #[test]
    fn test_eth_sign_requires_32_bytes() {
        let hash = format!("0x{}", "11".repeat(32));
        let ok = WalletRequest::decode(ETH_SIGN, &json!([ADDRESS, hash])).unwrap();
        assert_eq!(ok.method(), ETH_SIGN);

        let err = WalletRequest::decode(ETH_SIGN, &json!([ADDRESS, "0x1234"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_typed_data_string_or_object() {
        let data = mail_typed_data();
        let from_object = WalletRequest::decode(ETH_SIGN_TYPED_DATA_V4, &json!([ADDRESS, data.clone()])).unwrap();
        assert_eq!(from_object.method(), ETH_SIGN_TYPED_DATA_V4);

        let from_string = WalletRequest::decode(ETH_SIGN_TYPED_DATA_V3, &json!([ADDRESS, data.to_string()])).unwrap();
        assert_eq!(from_string.address(), Some(ADDRESS.parse().unwrap()));
    }

    #[test]
    fn test_typed_data_rejects_other_shapes() {
        for payload in [json!(42), json!([{"type": "string", "name": "a", "value": "b"}]), json!("not json")] {
            let err = WalletRequest::decode(ETH_SIGN_TYPED_DATA, &json!([ADDRESS, payload])).unwrap_err();
            assert!(matches!(err, Error::InvalidTypedData(_)), "got {:?}", err);
        }
    }

    #[test]
    fn test_transaction_params_required() {
        let err = WalletRequest::decode(ETH_SEND_TRANSACTION, &json!([])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let ok = WalletRequest::decode(ETH_SIGN_TRANSACTION, &json!([{"from": ADDRESS, "to": ADDRESS}])).unwrap();
        assert!(ok.needs_rpc());
        assert_eq!(ok.address(), Some(ADDRESS.parse().unwrap()));
    }

    #[test]
    fn test_default_signer_fills_only_missing_address() {
        let other: Address = "0x6fac4d18c912343bf86fa7049364dd4e424ab9c0".parse().unwrap();

        let bare = WalletRequest::decode(PERSONAL_SIGN, &json!(["0x6869"])).unwrap();
        assert_eq!(bare.address(), None);
        assert_eq!(bare.with_default_signer(other).address(), Some(other));

        let named = WalletRequest::decode(PERSONAL_SIGN, &json!(["0x6869", ADDRESS])).unwrap();
        assert_eq!(named.with_default_signer(other).address(), Some(ADDRESS.parse().unwrap()));

        let tx = WalletRequest::decode(ETH_SEND_TRANSACTION, &json!([{"to": ADDRESS}])).unwrap();
        assert_eq!(tx.with_default_signer(other).address(), Some(other));
    }

    #[test]
    fn test_unknown_method() {
        let err = WalletRequest::decode("eth_getBalance", &json!([])).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported method: eth_getBalance");
        assert!(!is_supported_method("eth_getBalance"));
        assert!(is_supported_method(PERSONAL_SIGN));
    }
}
