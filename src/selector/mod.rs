//! Selector Module
//!
//! Policy-based capability matching: flattening of capability trees,
//! requirement expressions, the predicate chain and the selection service.

pub mod chain;
pub mod expression;
pub mod flatten;
pub mod predicate;
pub mod service;

pub use chain::*;
pub use expression::*;
pub use flatten::*;
pub use predicate::*;
pub use service::*;
