//! Seed phrases for one game round. Never persisted; wiped from memory on drop.

use super::DerivationError;
use bip39::Mnemonic;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// 128 bits of entropy, 12 words.
pub const ENTROPY_BYTES: usize = 16;

/// A validated BIP39 phrase (English wordlist).
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SeedPhrase(String);

impl SeedPhrase {
    /// Fresh 12-word phrase from OS randomness.
    pub fn generate() -> Self {
        let mut entropy = Zeroizing::new([0u8; ENTROPY_BYTES]);
        rand::rngs::OsRng.fill_bytes(entropy.as_mut());
        let mnemonic = Mnemonic::from_entropy(entropy.as_ref())
            .expect("16 bytes is a valid BIP39 entropy length");
        Self(mnemonic.to_string())
    }

    /// Parse and checksum-validate a phrase. Runs of whitespace collapse to single spaces.
    pub fn parse(phrase: &str) -> Result<Self, DerivationError> {
        let mnemonic = Mnemonic::parse_normalized(phrase)
            .map_err(|e| DerivationError::InvalidMnemonic(e.to_string()))?;
        Ok(Self(mnemonic.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }

    /// BIP39 seed with an empty passphrase.
    pub(crate) fn to_seed(&self) -> Result<Zeroizing<[u8; 64]>, DerivationError> {
        let mnemonic = Mnemonic::parse_normalized(&self.0)
            .map_err(|e| DerivationError::InvalidMnemonic(e.to_string()))?;
        Ok(Zeroizing::new(mnemonic.to_seed("")))
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase({} words, redacted)", self.word_count())
    }
}

/// True when `phrase` is a checksum-valid BIP39 mnemonic.
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_normalized(phrase).is_ok()
}
