//! Vote signing.
//!
//! Every validator and the aggregator agree on a single primitive: secp256k1 ECDSA over the
//! raw 32 byte block hash, with RFC 6979 nonces. Signatures are therefore deterministic and
//! encoded as 65 bytes (`r || s || v`).

use std::{path::Path, str::FromStr};

use alloy_primitives::{Address, Bytes};
use alloy_signer::SignerSync;
use alloy_signer_local::{LocalSigner, PrivateKeySigner};
use zkoracle_primitives::aliases::BlockHash;

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("signer rejected block hash {hash}: {reason}")]
    Rejected { hash: BlockHash, reason: String },
}

/// Signing capability holding the validator key material.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait HashSigner: Send + Sync + 'static {
    fn sign_hash(&self, hash: &BlockHash) -> Result<Bytes, SignError>;
}

/// [`HashSigner`] over a secp256k1 key held in memory.
#[derive(Debug, Clone)]
pub struct LocalKeySigner {
    signer: PrivateKeySigner,
}

impl LocalKeySigner {
    /// Loads a hex encoded private key, with or without `0x` prefix.
    pub fn from_hex(private_key: &str) -> Result<Self, SignError> {
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| SignError::KeyUnavailable(format!("invalid private key: {e}")))?;

        Ok(Self { signer })
    }

    /// Decrypts a JSON keystore (Web3 Secret Storage).
    pub fn from_keystore(path: &Path, password: &str) -> Result<Self, SignError> {
        let signer = LocalSigner::decrypt_keystore(path, password).map_err(|e| {
            SignError::KeyUnavailable(format!("failed to decrypt keystore {path:?}: {e}"))
        })?;

        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl HashSigner for LocalKeySigner {
    fn sign_hash(&self, hash: &BlockHash) -> Result<Bytes, SignError> {
        let signature = self
            .signer
            .sign_hash_sync(hash)
            .map_err(|e| SignError::Rejected {
                hash: *hash,
                reason: e.to_string(),
            })?;

        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

/// Produces vote signatures over block hashes.
#[derive(Debug)]
pub struct VoteSigner<S> {
    signer: S,
}

impl<S: HashSigner> VoteSigner<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    pub fn sign(&self, block_hash: &BlockHash) -> Result<Bytes, SignError> {
        let signature = self.signer.sign_hash(block_hash)?;

        if signature.is_empty() {
            return Err(SignError::Rejected {
                hash: *block_hash,
                reason: "empty signature".to_string(),
            });
        }

        Ok(signature)
    }
}
