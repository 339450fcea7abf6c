//! BIP-32 hierarchical key derivation over secp256k1

use std::fmt;

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

const HARDENED: u32 = 0x8000_0000;

/// A derived secp256k1 private key. Zeroed on drop; `Debug` never prints it.
pub struct DerivedKey {
    secret: Zeroizing<[u8; 32]>,
}

impl DerivedKey {
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Uncompressed SEC1 public key (65 bytes, leading 0x04)
    pub fn public_key_uncompressed(&self) -> Result<[u8; 65]> {
        let secp = Secp256k1::signing_only();
        let secret_key = SecretKey::from_slice(&self.secret[..])
            .map_err(|e| Error::KeyDerivation(format!("Invalid secret key: {}", e)))?;
        Ok(PublicKey::from_secret_key(&secp, &secret_key).serialize_uncompressed())
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derive the private key at `path` from a BIP-39 seed
pub fn derive_private_key(seed: &[u8], path: &str) -> Result<DerivedKey> {
    let components = parse_derivation_path(path)?;

    let (mut secret, mut chain_code) = derive_master_key(seed)?;
    for index in components {
        (secret, chain_code) = derive_child_key(&secret, &chain_code, index)?;
    }

    Ok(DerivedKey { secret })
}

/// Parse a BIP-32 derivation path such as `m/44'/60'/0'/0/3`
pub fn parse_derivation_path(path: &str) -> Result<Vec<u32>> {
    let rest = path
        .strip_prefix("m/")
        .ok_or_else(|| Error::KeyDerivation(format!("Invalid derivation path: {}", path)))?;

    rest.split('/')
        .filter(|c| !c.is_empty())
        .map(|component| {
            let (digits, hardened) = match component.strip_suffix('\'') {
                Some(d) => (d, true),
                None => (component, false),
            };
            let index = digits
                .parse::<u32>()
                .ok()
                .filter(|i| *i < HARDENED)
                .ok_or_else(|| Error::KeyDerivation(format!("Invalid derivation path component: {}", component)))?;
            Ok(if hardened { index | HARDENED } else { index })
        })
        .collect()
}

type KeyAndChainCode = (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>);

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<KeyAndChainCode> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|_| Error::KeyDerivation("HMAC error".to_string()))?;
    mac.update(data);
    let output = mac.finalize().into_bytes();

    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    Ok((left, right))
}

fn derive_master_key(seed: &[u8]) -> Result<KeyAndChainCode> {
    hmac_sha512(b"Bitcoin seed", seed)
}

fn derive_child_key(parent_key: &[u8; 32], parent_chain_code: &[u8; 32], index: u32) -> Result<KeyAndChainCode> {
    let parent_secret = SecretKey::from_slice(parent_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid parent key: {}", e)))?;

    let mut data = Zeroizing::new(Vec::with_capacity(37));
    if index >= HARDENED {
        data.push(0);
        data.extend_from_slice(parent_key);
    } else {
        let secp = Secp256k1::signing_only();
        data.extend_from_slice(&PublicKey::from_secret_key(&secp, &parent_secret).serialize());
    }
    data.extend_from_slice(&index.to_be_bytes());

    let (tweak, chain_code) = hmac_sha512(parent_chain_code, &data)?;

    let child = SecretKey::from_slice(&tweak[..])
        .map_err(|e| Error::KeyDerivation(format!("Invalid child key: {}", e)))?
        .add_tweak(&parent_secret.into())
        .map_err(|e| Error::KeyDerivation(format!("Key addition error: {}", e)))?;

    Ok((Zeroizing::new(child.secret_bytes()), chain_code))
}
