//! Mnemonic phrase generation, validation and seed expansion

use std::fmt;

use bip39::Language;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Supported mnemonic lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCount {
    /// 12 words (128 bits)
    Words12,
    /// 24 words (256 bits)
    Words24,
}

impl WordCount {
    /// Get entropy length in bytes
    fn entropy_bytes(&self) -> usize {
        match self {
            Self::Words12 => 16,
            Self::Words24 => 32,
        }
    }

    pub fn words(&self) -> usize {
        match self {
            Self::Words12 => 12,
            Self::Words24 => 24,
        }
    }
}

impl TryFrom<usize> for WordCount {
    type Error = Error;

    fn try_from(n: usize) -> Result<Self> {
        match n {
            12 => Ok(Self::Words12),
            24 => Ok(Self::Words24),
            other => Err(Error::Validation(format!("Unsupported word count: {}", other))),
        }
    }
}

/// A checksum-valid BIP-39 phrase.
///
/// The phrase is wiped from memory on drop and never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic(Zeroizing<String>);

impl Mnemonic {
    /// Normalize and validate a user-supplied phrase
    pub fn parse(phrase: &str) -> Result<Self> {
        let normalized = normalize(phrase);
        if !is_plausible_mnemonic(&normalized) {
            return Err(Error::Validation("Mnemonic must be 12 or 24 wordlist words".to_string()));
        }
        bip39::Mnemonic::parse_normalized(&normalized)
            .map_err(|e| Error::Validation(format!("Invalid mnemonic: {}", e)))?;

        Ok(Self(Zeroizing::new(normalized)))
    }

    pub fn phrase(&self) -> &str {
        self.0.as_str()
    }

    pub fn word_count(&self) -> usize {
        self.0.split(' ').count()
    }

    /// Expand the phrase into the 64-byte BIP-39 seed (empty passphrase)
    pub fn to_seed(&self) -> Result<Zeroizing<[u8; 64]>> {
        let mnemonic = bip39::Mnemonic::parse_normalized(self.phrase())
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(Zeroizing::new(mnemonic.to_seed("")))
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic([REDACTED; {} words])", self.word_count())
    }
}

/// Generate a new random mnemonic with the requested length
pub fn generate(word_count: WordCount) -> Result<Mnemonic> {
    let mut entropy = Zeroizing::new(vec![0u8; word_count.entropy_bytes()]);
    OsRng.fill_bytes(&mut entropy);

    let mnemonic = bip39::Mnemonic::from_entropy(&entropy)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    Ok(Mnemonic(Zeroizing::new(mnemonic.to_string())))
}

/// Check length, wordlist membership and checksum
pub fn validate(phrase: &str) -> bool {
    Mnemonic::parse(phrase).is_ok()
}

/// Shape check applied to decrypted plaintext: 12 or 24 single-space separated
/// wordlist tokens. Deliberately does not verify the checksum.
pub fn is_plausible_mnemonic(text: &str) -> bool {
    let words: Vec<&str> = text.split(' ').collect();
    if words.len() != 12 && words.len() != 24 {
        return false;
    }
    words
        .iter()
        .all(|w| !w.is_empty() && Language::English.find_word(w).is_some())
}

fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
