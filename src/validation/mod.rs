//! Validation module - coinstake transactions, script verification and
//! privacy-pool spends

mod transaction;
mod script;
mod privacy;

pub use transaction::*;
pub use script::*;
pub use privacy::*;
