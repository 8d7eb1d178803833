//! Storage module - block index arena, collaborator seams and the block database

mod index;
mod view;
pub mod db;

pub use index::*;
pub use view::*;
pub use db::{BlockDb, StorageError};
