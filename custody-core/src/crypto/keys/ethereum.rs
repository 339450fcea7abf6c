//! Ethereum account derivation

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::crypto::mnemonic::Mnemonic;
use crate::error::{Error, Result};
use super::derivation::{derive_private_key, DerivedKey};

/// An EVM account derived from the wallet mnemonic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Lowercase 0x-prefixed address
    pub address: String,
    pub derivation_index: u32,
    pub derivation_path: String,
    pub display_name: String,
}

/// BIP-44 path for the EVM account at `index`
pub fn derivation_path(index: u32) -> String {
    format!("m/44'/60'/0'/0/{}", index)
}

/// Derive the account at `index`. Pure and deterministic, no I/O.
pub fn derive(mnemonic: &Mnemonic, index: u32) -> Result<Account> {
    let key = derive_signing_key(mnemonic, index)?;
    let address = address_from_key(&key)?;

    Ok(Account {
        address,
        derivation_index: index,
        derivation_path: derivation_path(index),
        display_name: format!("Account {}", index + 1),
    })
}

/// Derive the private key for the account at `index`
pub fn derive_signing_key(mnemonic: &Mnemonic, index: u32) -> Result<DerivedKey> {
    let seed = mnemonic.to_seed()?;
    derive_private_key(&seed[..], &derivation_path(index))
}

pub fn address_from_key(key: &DerivedKey) -> Result<String> {
    public_key_to_address(&key.public_key_uncompressed()?)
}

/// Get the Ethereum address from an uncompressed public key
pub fn public_key_to_address(public_key: &[u8]) -> Result<String> {
    if public_key.len() != 65 || public_key[0] != 0x04 {
        return Err(Error::KeyDerivation("Invalid Ethereum public key length".to_string()));
    }

    // Skip the 0x04 tag, keep the last 20 bytes of the hash
    let hash = Keccak256::digest(&public_key[1..]);
    Ok(format!("0x{}", hex::encode(&hash[12..])))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_fixture_address() {
        let mnemonic = Mnemonic::parse(ABANDON).unwrap();
        let account = derive(&mnemonic, 0).unwrap();
        assert_eq!(account.address, "0x9858effd232b4033e47d90003d41ec34ecaeda94");
        assert_eq!(account.derivation_path, "m/44'/60'/0'/0/0");
        assert_eq!(account.display_name, "Account 1");
    }

    #[test]
    fn test_second_index_differs() {
        let mnemonic = Mnemonic::parse(ABANDON).unwrap();
        let first = derive(&mnemonic, 0).unwrap();
        let second = derive(&mnemonic, 1).unwrap();
        assert_ne!(first.address, second.address);
        assert_eq!(second.address, "0x6fac4d18c912343bf86fa7049364dd4e424ab9c0");
    }

    #[test]
    fn test_rejects_compressed_key() {
        assert!(public_key_to_address(&[0x02; 33]).is_err());
    }

    #[test]
    fn test_account_json_shape() {
        let mnemonic = Mnemonic::parse(ABANDON).unwrap();
        let json = serde_json::to_value(derive(&mnemonic, 0).unwrap()).unwrap();
        assert_eq!(json["derivationIndex"], 0);
        assert!(json.get("displayName").is_some());
    }
}
