//! Cryptography module - double SHA-256 hashing and Schnorr signatures

mod hash;
mod schnorr;

pub use hash::*;
pub use schnorr::*;
