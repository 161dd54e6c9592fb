//! Key management
//!
//! SECURITY: This is the ONLY place where private keys exist.
//! - Keys are derived on demand from the mnemonic and held in alloy's PrivateKeySigner
//! - Keys are never serialized
//! - Keys and phrases are never logged (Debug impls are redacted)

use crate::{Error, Result};
use alloy::primitives::hex;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use alloy::signers::SignerSync;
use secrecy::{ExposeSecret, SecretString};

/// BIP-39 phrase lengths accepted by `derive`
const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Normalize an address for storage and comparison
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// A BIP-39 secret phrase
///
/// Whitespace is collapsed on construction; nothing else about the phrase is touched.
pub struct Mnemonic(SecretString);

impl Mnemonic {
    pub fn new(phrase: impl AsRef<str>) -> Self {
        let normalized = phrase
            .as_ref()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        Self(SecretString::from(normalized))
    }

    /// Expose the phrase. Callers must not log or persist the result
    /// anywhere other than the wallet store.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn word_count(&self) -> usize {
        self.expose().split(' ').filter(|w| !w.is_empty()).count()
    }
}

impl Clone for Mnemonic {
    fn clone(&self) -> Self {
        Self(SecretString::from(self.expose().to_owned()))
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Mnemonic([REDACTED])")
    }
}

/// Signing capability for one wallet address
///
/// A signer built from a mnemonic holds the private key; a view-only signer
/// only knows its address and refuses to sign.
pub struct WalletSigner {
    address: String,
    key: Option<PrivateKeySigner>,
}

impl WalletSigner {
    /// A signer with no key material
    pub fn view_only(address: &str) -> Self {
        Self {
            address: normalize_address(address),
            key: None,
        }
    }

    /// Lowercase `0x`-prefixed address
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn can_sign(&self) -> bool {
        self.key.is_some()
    }
}

impl std::fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address)
            .field("key", &if self.can_sign() { "[REDACTED]" } else { "none" })
            .finish()
    }
}

/// Derives addresses and signs approval messages
pub struct KeyManager;

impl KeyManager {
    /// Derive the wallet address and signer for a phrase
    ///
    /// Uses the standard Ethereum path `m/44'/60'/0'/0/0`, so the same phrase
    /// always yields the same address.
    pub fn derive(mnemonic: &Mnemonic) -> Result<(String, WalletSigner)> {
        let words = mnemonic.word_count();
        if !VALID_WORD_COUNTS.contains(&words) {
            return Err(Error::InvalidMnemonic(format!(
                "expected 12, 15, 18, 21 or 24 words, got {}",
                words
            )));
        }

        // The underlying error can quote the offending word, so it is not propagated.
        let key: PrivateKeySigner = MnemonicBuilder::<English>::default()
            .phrase(mnemonic.expose())
            .build()
            .map_err(|_| {
                Error::InvalidMnemonic("phrase failed word list or checksum validation".into())
            })?;

        let address = normalize_address(&key.address().to_string());
        let signer = WalletSigner {
            address: address.clone(),
            key: Some(key),
        };

        Ok((address, signer))
    }

    /// Derive only the address for a phrase
    pub fn address_of(mnemonic: &Mnemonic) -> Result<String> {
        Self::derive(mnemonic).map(|(address, _)| address)
    }

    /// Sign `message` with EIP-191 personal-message encoding
    ///
    /// The exact bytes are signed. Returns the 65-byte `r || s || v` signature
    /// as `0x`-prefixed hex.
    pub fn sign(signer: &WalletSigner, message: &str) -> Result<String> {
        let key = signer.key.as_ref().ok_or_else(|| {
            Error::Signing(format!(
                "wallet {} is view-only; re-import it with its mnemonic to sign",
                signer.address
            ))
        })?;

        let signature = key
            .sign_message_sync(message.as_bytes())
            .map_err(|e| Error::Signing(format!("Signing failed: {}", e)))?;

        Ok(hex::encode_prefixed(signature.as_bytes()))
    }
}
