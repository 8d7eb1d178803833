//! Schnorr keys over secp256k1
//!
//! Coinstake kernels are unlocked with a Schnorr signature; the spent output
//! commits to the BLAKE3 hash of the x-only public key.

use k256::schnorr::signature::{Signer, Verifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::Hash;

/// Signature errors
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid private key")]
    InvalidPrivateKey,
}

/// 32-byte private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// 32-byte x-only public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 32]);

/// 64-byte Schnorr signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SchnorrSignature(pub [u8; 64]);

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        SigningKey::from_bytes(bytes)
            .map(PrivateKey)
            .map_err(|_| SignatureError::InvalidPrivateKey)
    }

    pub fn public_key(&self) -> PublicKey {
        let bytes = self.0.verifying_key().to_bytes();
        PublicKey(bytes.into())
    }

    /// Sign a 32-byte message digest
    pub fn sign(&self, message: &Hash) -> SchnorrSignature {
        let signature: Signature = self.0.sign(&message.0);
        SchnorrSignature(signature.to_bytes())
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        VerifyingKey::from_bytes(bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
        Ok(PublicKey(*bytes))
    }

    pub fn verify(&self, message: &Hash, signature: &SchnorrSignature) -> bool {
        let verifying_key = match VerifyingKey::from_bytes(&self.0) {
            Ok(vk) => vk,
            Err(_) => return false,
        };

        let sig = match Signature::try_from(signature.0.as_slice()) {
            Ok(s) => s,
            Err(_) => return false,
        };

        verifying_key.verify(&message.0, &sig).is_ok()
    }

    /// BLAKE3 commitment placed in the spent output's locking script
    pub fn pubkey_hash(&self) -> Hash {
        Hash(*blake3::hash(&self.0).as_bytes())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl std::fmt::Debug for SchnorrSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}
