//! Pool Registry Adapters
//!
//! Implementations of the [`PoolRegistry`](crate::domain::ports::PoolRegistry)
//! port: an in-process registry fed by drivers and a file-backed one.

pub mod file;
pub mod memory;

pub use file::*;
pub use memory::*;
