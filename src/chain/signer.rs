//! Relayer signing credential
//!
//! Wraps alloy's `PrivateKeySigner` and `EthereumWallet`. The raw key is only
//! ever held inside [`Redacted`] until it is parsed here; afterwards only the
//! derived address is exposed.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use std::path::Path;

use crate::error::ChainError;
use crate::redact::Redacted;

/// Destination-chain signing key
#[derive(Clone)]
pub struct Credential {
    wallet: EthereumWallet,
    address: Address,
}

impl Credential {
    /// Parse a hex private key (with or without 0x prefix)
    pub fn from_hex(key: &Redacted<String>) -> Result<Self, ChainError> {
        let signer: PrivateKeySigner = key
            .expose()
            .trim()
            .parse()
            .map_err(|_| ChainError::Signing("invalid private key".into()))?;

        let address = signer.address();
        Ok(Self {
            wallet: EthereumWallet::from(signer),
            address,
        })
    }

    /// Read a hex private key from a file
    pub fn from_file(path: &Path) -> Result<Self, ChainError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ChainError::Signing(format!("cannot read key file {}: {}", path.display(), e))
        })?;
        Self::from_hex(&Redacted(contents))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

/// Only the address is printable
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("key", &"<redacted>")
            .finish()
    }
}
