//! Mining module - coinstake kernel search

mod miner;

pub use miner::*;
