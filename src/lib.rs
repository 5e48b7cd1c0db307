//! Storage Pool Selector - Policy-Based Capability Matching
//!
//! Resolves declared storage requirements against a dynamic set of
//! heterogeneous backend pools and hands the surviving pools to the
//! provisioning layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          Selection Service                                   │
//! │            select_pool / select_pools / select_pool_for_request              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                           Predicate Chain                                    │
//! │  ┌──────┐  ┌──────────┐  ┌──────┐  ┌────────┐  ┌─────────────┐  ┌─────────┐  │
//! │  │ Zone │─▶│ Capacity │─▶│ Thin │─▶│ Dedupe │─▶│ Compression │─▶│DiskType │  │
//! │  └──────┘  └──────────┘  └──────┘  └────────┘  └─────────────┘  └────┬────┘  │
//! │                                                                      ▼       │
//! │                     ┌───────────────────────────────────────────────────┐    │
//! │                     │ Generic predicate (expressions over flattened map) │    │
//! │                     └───────────────────────────────────────────────────┘    │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────┐          ┌──────────────────────────────────┐  │
//! │  │   Expression Evaluator   │          │      Attribute Flattener         │  │
//! │  └──────────────────────────┘          └──────────────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                        Pool Registry (port)                                  │
//! │  ┌─────────────────────────────┐  ┌─────────────────────────────────────┐   │
//! │  │        In-Memory            │  │          File (YAML/JSON)            │   │
//! │  └─────────────────────────────┘  └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`selector`]: Flattening, expressions, predicates, chain and service
//! - [`registry`]: Pool registry adapters
//! - [`domain`]: Core data model and port definitions
//! - [`config`]: Engine configuration
//! - [`error`]: Error types and handling

pub mod config;
pub mod domain;
pub mod error;
pub mod registry;
pub mod selector;

// Re-export commonly used types
pub use config::SelectorConfig;

pub use domain::ports::{
    CapabilityTree, CapabilityValue, Pool, PoolRegistry, RequirementMap, Scalar,
};

pub use domain::profile::{Profile, VolumeRequest};

pub use error::{Error, ErrorKind, Result};

pub use registry::{FilePoolRegistry, InMemoryPoolRegistry};

pub use selector::{
    flatten, flatten_document, Expression, FlatCapabilities, Predicate, PredicateChain,
    PredicateKind, RequirementSet, SelectionService,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
