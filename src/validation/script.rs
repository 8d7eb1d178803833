//! Script verification seam
//!
//! The core never interprets scripts itself; it hands the unlocking data and
//! the spent output's locking script to a `ScriptVerifier`.

use thiserror::Error;
use crate::crypto::{Hash, PublicKey, SchnorrSignature};
use crate::validation::Transaction;

/// Verifier sub-codes, carried by `PosError::SignatureInvalid`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("unlocking data is malformed")]
    MalformedUnlock,
    #[error("locking script is not a 32-byte key commitment")]
    UnsupportedLockingScript,
    #[error("public key does not match the spent output")]
    PubKeyMismatch,
    #[error("invalid public key encoding")]
    InvalidPubKey,
    #[error("signature verification failed")]
    BadSignature,
    #[error("witness data present before witness activation")]
    UnexpectedWitness,
}

/// The transaction and input being verified
#[derive(Debug, Clone, Copy)]
pub struct TxContext<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
}

/// Script/signature verification collaborator
pub trait ScriptVerifier {
    /// Verify `script_sig` (and `witness`, when witness verification is
    /// active at this height) against `script_pubkey`.
    fn verify(
        &self,
        script_sig: &[u8],
        script_pubkey: &[u8],
        witness: Option<&[Vec<u8>]>,
        ctx: &TxContext<'_>,
    ) -> Result<(), ScriptError>;
}

/// Pay-to-key-commitment verifier.
///
/// The locking script is `blake3(pubkey)` (32 bytes). The unlocking data is a
/// 64-byte Schnorr signature followed by the 32-byte public key, either in
/// `script_sig` or, once witnesses are active, as a two-item witness stack
/// with an empty `script_sig`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchnorrScriptVerifier;

impl SchnorrScriptVerifier {
    /// Build the `script_sig` that unlocks a key-commitment output
    pub fn unlocking_script(signature: &SchnorrSignature, public_key: &PublicKey) -> Vec<u8> {
        let mut script = Vec::with_capacity(96);
        script.extend_from_slice(&signature.0);
        script.extend_from_slice(&public_key.0);
        script
    }

    fn split_unlock<'a>(
        script_sig: &'a [u8],
        witness: Option<&'a [Vec<u8>]>,
    ) -> Result<(&'a [u8], &'a [u8]), ScriptError> {
        if script_sig.is_empty() {
            let stack = witness.ok_or(ScriptError::MalformedUnlock)?;
            return match stack {
                [sig, key] => Ok((sig.as_slice(), key.as_slice())),
                _ => Err(ScriptError::MalformedUnlock),
            };
        }
        if witness.map_or(false, |w| !w.is_empty()) {
            return Err(ScriptError::MalformedUnlock);
        }
        if script_sig.len() != 96 {
            return Err(ScriptError::MalformedUnlock);
        }
        Ok(script_sig.split_at(64))
    }
}

impl ScriptVerifier for SchnorrScriptVerifier {
    fn verify(
        &self,
        script_sig: &[u8],
        script_pubkey: &[u8],
        witness: Option<&[Vec<u8>]>,
        ctx: &TxContext<'_>,
    ) -> Result<(), ScriptError> {
        if witness.is_none() {
            let input = ctx.tx.inputs.get(ctx.input_index).ok_or(ScriptError::MalformedUnlock)?;
            if !input.witness.is_empty() {
                return Err(ScriptError::UnexpectedWitness);
            }
        }

        let commitment: [u8; 32] = script_pubkey
            .try_into()
            .map_err(|_| ScriptError::UnsupportedLockingScript)?;

        let (sig_bytes, key_bytes) = Self::split_unlock(script_sig, witness)?;
        let sig: [u8; 64] = sig_bytes.try_into().map_err(|_| ScriptError::MalformedUnlock)?;
        let key: [u8; 32] = key_bytes.try_into().map_err(|_| ScriptError::MalformedUnlock)?;

        let public_key = PublicKey::from_bytes(&key).map_err(|_| ScriptError::InvalidPubKey)?;
        if public_key.pubkey_hash() != Hash(commitment) {
            return Err(ScriptError::PubKeyMismatch);
        }

        let message = ctx.tx.signature_hash(ctx.input_index);
        if !public_key.verify(&message, &SchnorrSignature(sig)) {
            return Err(ScriptError::BadSignature);
        }
        Ok(())
    }
}
