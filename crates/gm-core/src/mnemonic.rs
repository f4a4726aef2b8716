//! Passphrase → recovery phrase → master seed.
//!
//! Every step is the standard BIP-39 pipeline with the English wordlist and an
//! empty seed passphrase, so any conformant implementation that hashes the same
//! namespace string lands on the same 64-byte seed.

use bip39::Mnemonic;
use sha2::{Digest, Sha512};

use crate::error::Result;

/// 64-byte output of the mnemonic key-stretching step.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterSeed([u8; 64]);

impl MasterSeed {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSeed(..)")
    }
}

/// Encode the first 32 bytes of SHA-512(passphrase) as a 24-word phrase.
pub fn passphrase_to_mnemonic(passphrase: &str) -> Result<String> {
    let digest = Sha512::digest(passphrase.as_bytes());
    let mnemonic = Mnemonic::from_entropy(&digest[..32])?;
    Ok(mnemonic.to_string())
}

/// Stretch a recovery phrase into its master seed (PBKDF2-HMAC-SHA512,
/// salt `"mnemonic"`, 2048 rounds). The phrase must carry a valid checksum.
pub fn mnemonic_to_seed(phrase: &str) -> Result<MasterSeed> {
    let mnemonic = Mnemonic::parse(phrase)?;
    Ok(MasterSeed(mnemonic.to_seed("")))
}
