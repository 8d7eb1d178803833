//! Transaction structure for coinstake validation
//!
//! UTXO-based transactions carrying their own timestamp, as proof-of-stake
//! chains require for the V1 kernel.

use serde::{Deserialize, Serialize};
use crate::crypto::{Hash, HashWriter};

/// Marker byte opening a privacy-pool spend in an unlocking script
pub const PRIVACY_SPEND_MARKER: u8 = 0xc2;

/// Reference to a previous transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the transaction containing the output
    pub hash: Hash,
    /// Index of the output in that transaction
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    /// Null outpoint (coinbase and privacy-pool spends)
    pub fn null() -> Self {
        Self { hash: Hash::zero(), index: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.hash == Hash::zero() && self.index == u32::MAX
    }
}

/// A transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    /// Unlocking script
    pub script_sig: Vec<u8>,
    /// Segregated witness stack
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Vec<u8>) -> Self {
        Self { prevout, script_sig, witness: Vec::new() }
    }

    /// Whether the unlocking script carries a privacy-pool spend
    pub fn is_privacy_spend(&self) -> bool {
        self.script_sig.first() == Some(&PRIVACY_SPEND_MARKER)
    }
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Amount in base units
    pub value: u64,
    /// Locking script
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, script_pubkey: Vec<u8>) -> Self {
        Self { value, script_pubkey }
    }

    /// Empty output marking a coinstake
    pub fn empty() -> Self {
        Self { value: 0, script_pubkey: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    /// Transaction timestamp (seconds since Unix epoch)
    pub time: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(time: u32, inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: 1,
            time,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Coinbase transaction paying `reward` to `script_pubkey`
    pub fn coinbase(time: u32, reward: u64, script_pubkey: Vec<u8>) -> Self {
        Self::new(
            time,
            vec![TxIn::new(OutPoint::null(), Vec::new())],
            vec![TxOut::new(reward, script_pubkey)],
        )
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null() && !self.inputs[0].is_privacy_spend()
    }

    /// Coinstake detection: the first output is empty and there are at
    /// least two outputs. The first input may only have a null prevout when
    /// it is a privacy-pool spend.
    pub fn is_coinstake(&self) -> bool {
        let Some(first) = self.inputs.first() else {
            return false;
        };
        if first.prevout.is_null() && !first.is_privacy_spend() {
            return false;
        }
        self.outputs.len() >= 2 && self.outputs[0].is_empty()
    }

    /// Transaction id (covers unlocking scripts, not witnesses)
    pub fn hash(&self) -> Hash {
        let mut writer = self.write_header();
        for input in &self.inputs {
            writer = writer
                .write_hash(&input.prevout.hash)
                .write_u32(input.prevout.index)
                .write_var_bytes(&input.script_sig);
        }
        self.write_outputs(writer).finish()
    }

    /// Digest signed by the owner of input `input_index`; unlocking data
    /// is excluded.
    pub fn signature_hash(&self, input_index: usize) -> Hash {
        let mut writer = self.write_header();
        for input in &self.inputs {
            writer = writer
                .write_hash(&input.prevout.hash)
                .write_u32(input.prevout.index);
        }
        self.write_outputs(writer)
            .write_u32(input_index as u32)
            .finish()
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    fn write_header(&self) -> HashWriter {
        HashWriter::new()
            .write_u32(self.version)
            .write_u32(self.time)
            .write_u32(self.inputs.len() as u32)
    }

    fn write_outputs(&self, mut writer: HashWriter) -> HashWriter {
        writer = writer.write_u32(self.outputs.len() as u32);
        for output in &self.outputs {
            writer = writer
                .write_u64(output.value)
                .write_var_bytes(&output.script_pubkey);
        }
        writer.write_u32(self.lock_time)
    }
}
