//! Utility modules

pub mod conversion;
pub mod memory_journal;
pub mod memory_storage;

pub use memory_journal::*;
pub use memory_storage::*;
