//! Consensus module - Block structure, chain parameters, targets, stake modifiers and kernel checks

mod block;
mod error;
mod params;
mod target;
mod modifier;
mod kernel;
mod proof;

pub use block::*;
pub use error::*;
pub use params::*;
pub use target::*;
pub use modifier::*;
pub use kernel::*;
pub use proof::*;
