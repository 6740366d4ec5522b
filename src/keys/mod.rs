//! Keys - BIP84 address derivation. Seed in, native segwit addresses out.
//!
//! For index `i` the path is `m/84'/0'/0'/0/i` on mainnet. The hardened
//! account chain is derived once from the master key; each address is then a
//! public (non-hardened) child of that chain, encoded as P2WPKH (`bc1q...`).
//!
//! Derivation is a pure function of the phrase: the same phrase always yields
//! the same addresses, which is what makes a "legendary seed" reproducible.

mod mnemonic;

pub use mnemonic::{validate_mnemonic, SeedPhrase, ENTROPY_BYTES};

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, CompressedPublicKey, Network};
use serde::Serialize;
use std::str::FromStr;

/// BIP84 external chain for the first mainnet account.
pub const BIP84_EXTERNAL_CHAIN: &str = "m/84'/0'/0'/0";

/// Errors during address derivation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerivationError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Address count must be at least 1")]
    InvalidCount,
    #[error("Could not derive public key for index {index}: {reason}")]
    ChildKey { index: u32, reason: String },
}

/// One derived receive address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedAddress {
    pub index: u32,
    pub address: String,
}

impl DerivedAddress {
    pub fn path(&self) -> String {
        format!("{}/{}", BIP84_EXTERNAL_CHAIN, self.index)
    }
}

/// Derive the first `count` BIP84 addresses of `mnemonic`.
pub fn derive_addresses(mnemonic: &str, count: u32) -> Result<Vec<DerivedAddress>, DerivationError> {
    let phrase = SeedPhrase::parse(mnemonic)?;
    derive_from_phrase(&phrase, count)
}

/// Same as [`derive_addresses`] for an already validated phrase.
pub fn derive_from_phrase(phrase: &SeedPhrase, count: u32) -> Result<Vec<DerivedAddress>, DerivationError> {
    if count == 0 {
        return Err(DerivationError::InvalidCount);
    }

    let seed = phrase.to_seed()?;
    let secp = Secp256k1::new();
    let chain_err = |e: bitcoin::bip32::Error| DerivationError::ChildKey { index: 0, reason: e.to_string() };

    let master = Xpriv::new_master(Network::Bitcoin, seed.as_ref()).map_err(chain_err)?;
    let path = DerivationPath::from_str(BIP84_EXTERNAL_CHAIN).map_err(chain_err)?;
    let chain = master.derive_priv(&secp, &path).map_err(chain_err)?;
    let chain = Xpub::from_priv(&secp, &chain);

    (0..count)
        .map(|index| {
            let child_err = |e: bitcoin::bip32::Error| DerivationError::ChildKey { index, reason: e.to_string() };
            let child = ChildNumber::from_normal_idx(index).map_err(child_err)?;
            let xpub = chain.derive_pub(&secp, &[child]).map_err(child_err)?;
            let address = Address::p2wpkh(&CompressedPublicKey(xpub.public_key), Network::Bitcoin);
            Ok(DerivedAddress { index, address: address.to_string() })
        })
        .collect()
}
