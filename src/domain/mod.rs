//! Domain layer - Core data model and port definitions
//!
//! This module defines the pool and requirement types the engine works on
//! and the traits (ports) that upstream adapters implement.

pub mod ports;
pub mod profile;

pub use ports::*;
pub use profile::*;
