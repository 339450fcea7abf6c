//! Deprecated XOR-stream secret format.
//!
//! Early installs sealed the mnemonic by XOR-ing it with a keystream made of
//! repeated `SHA-256(pin || salt)` blocks. The format is only ever opened, so
//! old blobs can be migrated; nothing in this crate writes it anymore.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Apply the legacy keystream to `ciphertext`
pub fn open(ciphertext: &[u8], pin: &str, salt: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.update(salt);
    let digest: [u8; 32] = hasher.finalize().into();
    let block = Zeroizing::new(digest);

    Zeroizing::new(
        ciphertext
            .iter()
            .zip(block.iter().cycle())
            .map(|(c, k)| c ^ k)
            .collect(),
    )
}
