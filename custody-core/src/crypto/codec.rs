//! PIN-based sealing of the wallet secret.
//!
//! New ciphertexts are always version 2: PBKDF2-HMAC-SHA256 stretches the PIN
//! into an AES-256 key and the secret is encrypted in CBC mode with PKCS#7
//! padding. CBC is unauthenticated, so a wrong PIN usually decrypts to noise
//! rather than failing; every candidate plaintext must pass
//! [`is_plausible_mnemonic`] before it is accepted.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::KdfPolicy;
use crate::crypto::legacy;
use crate::crypto::mnemonic::is_plausible_mnemonic;
use crate::error::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Deprecated XOR-stream format, decrypt only
pub const VERSION_XOR: u8 = 1;
/// PBKDF2-SHA256 + AES-256-CBC
pub const VERSION_AES_CBC: u8 = 2;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;

/// Persisted shape of a sealed secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSecret {
    pub version: u8,
    /// Base64
    pub ciphertext: String,
    /// Hex
    pub salt: String,
    /// Hex
    pub iv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf_iterations: Option<u32>,
}

/// One way of attempting to open a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptionScheme {
    AesCbc { iterations: u32 },
    XorStream,
}

/// A plaintext that passed the plausibility check, tagged with the scheme that opened it
pub struct Decrypted {
    pub plaintext: Zeroizing<String>,
    pub scheme: DecryptionScheme,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecretCodec {
    policy: KdfPolicy,
}

impl SecretCodec {
    pub fn new(policy: KdfPolicy) -> Self {
        Self { policy }
    }

    /// The scheme every fresh ciphertext is written with
    pub fn current_scheme(&self) -> DecryptionScheme {
        DecryptionScheme::AesCbc {
            iterations: self.policy.iterations,
        }
    }

    /// Seal `plaintext` under `pin` with a fresh salt and IV
    pub fn encrypt(&self, plaintext: &str, pin: &str) -> Result<EncryptedSecret> {
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);

        let iterations = self.policy.iterations;
        let key = derive_key(pin, &salt, iterations);
        let ciphertext = Aes256CbcEnc::new_from_slices(&key[..], &iv)
            .map_err(|e| Error::Serialization(format!("Cipher init failed: {}", e)))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(EncryptedSecret {
            version: VERSION_AES_CBC,
            ciphertext: STANDARD.encode(ciphertext),
            salt: hex::encode(salt),
            iv: hex::encode(iv),
            kdf_iterations: Some(iterations),
        })
    }

    /// Ordered list of schemes `decrypt` tries for this blob.
    ///
    /// A recorded iteration count goes first, falling back to the current
    /// default when none was stored, then the legacy count. Unknown versions
    /// yield an empty list.
    pub fn candidates(&self, blob: &EncryptedSecret) -> Vec<DecryptionScheme> {
        match blob.version {
            VERSION_XOR => vec![DecryptionScheme::XorStream],
            VERSION_AES_CBC => {
                let first = blob.kdf_iterations.unwrap_or(self.policy.iterations);
                let mut schemes = vec![DecryptionScheme::AesCbc { iterations: first }];
                if first != self.policy.legacy_iterations {
                    schemes.push(DecryptionScheme::AesCbc {
                        iterations: self.policy.legacy_iterations,
                    });
                }
                schemes
            }
            _ => Vec::new(),
        }
    }

    /// Open a blob. Returns `None` for a wrong PIN, a malformed blob or a
    /// plaintext that is not shaped like a mnemonic; never errors.
    pub fn decrypt(&self, blob: &EncryptedSecret, pin: &str) -> Option<Decrypted> {
        let ciphertext = STANDARD.decode(&blob.ciphertext).ok()?;
        let salt = hex::decode(&blob.salt).ok()?;

        for scheme in self.candidates(blob) {
            let opened = match scheme {
                DecryptionScheme::AesCbc { iterations } => {
                    let iv = hex::decode(&blob.iv).ok()?;
                    open_aes_cbc(&ciphertext, pin, &salt, &iv, iterations)
                }
                DecryptionScheme::XorStream => Some(legacy::open(&ciphertext, pin, &salt)),
            };

            if let Some(plaintext) = opened.and_then(plausible_text) {
                debug!(?scheme, "Secret opened");
                return Some(Decrypted { plaintext, scheme });
            }
        }

        None
    }
}

fn derive_key(pin: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, iterations, &mut key[..]);
    key
}

fn open_aes_cbc(ciphertext: &[u8], pin: &str, salt: &[u8], iv: &[u8], iterations: u32) -> Option<Zeroizing<Vec<u8>>> {
    if iterations == 0 {
        return None;
    }
    let key = derive_key(pin, salt, iterations);
    Aes256CbcDec::new_from_slices(&key[..], iv)
        .ok()?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .ok()
        .map(Zeroizing::new)
}

fn plausible_text(bytes: Zeroizing<Vec<u8>>) -> Option<Zeroizing<String>> {
    let text = std::str::from_utf8(&bytes).ok()?;
    if is_plausible_mnemonic(text) {
        Some(Zeroizing::new(text.to_string()))
    } else {
        None
    }
}
