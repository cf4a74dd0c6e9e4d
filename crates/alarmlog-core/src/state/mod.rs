// # Log Store Implementations
//
// This module provides implementations of the LogStore trait for
// different persistence strategies.

pub mod file;
pub(crate) mod json_file;
pub mod memory;

pub use file::FileLogStore;
pub use memory::MemoryLogStore;
