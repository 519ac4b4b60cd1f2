//! Store implementations that live alongside the engine.

pub mod memory;

pub use memory::{InMemoryDirectory, InMemoryLedgerStore};
