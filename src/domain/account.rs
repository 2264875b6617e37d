use std::fmt;

use alloy_primitives::{keccak256, Address};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
    #[error("Signing key belongs to {derived}, expected {expected}")]
    AddressMismatch { expected: Address, derived: Address },
}

/// The single account held by this process.
///
/// The credential is supplied from outside (env var or key file); this type
/// never generates or persists keys. `Debug` output is redacted.
pub struct Account {
    address: Address,
    signing_key: Zeroizing<[u8; 32]>,
}

impl Account {
    /// Build an account from raw secret key bytes, deriving its address.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, AccountError> {
        let secret =
            SecretKey::from_slice(&bytes).map_err(|e| AccountError::InvalidKey(e.to_string()))?;
        Ok(Self {
            address: address_of(&secret),
            signing_key: Zeroizing::new(bytes),
        })
    }

    /// Import from a hex private key (`0x` prefix optional).
    pub fn from_hex_key(hex_key: &str) -> Result<Self, AccountError> {
        let hex_key = Zeroizing::new(hex_key.trim().trim_start_matches("0x").to_string());
        let bytes = Zeroizing::new(
            hex::decode(hex_key.as_str()).map_err(|e| AccountError::InvalidKey(e.to_string()))?,
        );
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            AccountError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Self::from_secret_bytes(key)
    }

    /// Check that the key derives the address the caller expects.
    pub fn expect_address(self, expected: Address) -> Result<Self, AccountError> {
        if self.address != expected {
            return Err(AccountError::AddressMismatch {
                expected,
                derived: self.address,
            });
        }
        Ok(self)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn secret_key(&self) -> Result<SecretKey, secp256k1::Error> {
        SecretKey::from_slice(self.signing_key.as_slice())
    }

    /// Return the signing key as 0x-prefixed hex. Only for an explicit
    /// user-initiated reveal.
    pub fn reveal_signing_key(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(self.signing_key.as_slice())))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Ethereum address of a secp256k1 key: last 20 bytes of
/// keccak256(uncompressed public key without the 0x04 prefix).
pub fn address_of(secret: &SecretKey) -> Address {
    let secp = Secp256k1::signing_only();
    let public = PublicKey::from_secret_key(&secp, secret);
    let hash = keccak256(&public.serialize_uncompressed()[1..]);
    Address::from_slice(&hash[12..])
}
