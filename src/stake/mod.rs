//! Stake module - funding sources of coinstake kernels

mod input;

pub use input::*;
