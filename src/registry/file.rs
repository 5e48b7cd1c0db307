//! File-Backed Pool Registry
//!
//! Reads pools from a YAML or JSON document on every listing, so edits to
//! the file are visible to the next selection without a restart.

use crate::domain::ports::{Pool, PoolRegistry};
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Accepted layouts: `pools: [...]` or a bare list. Entries stay generic
/// documents until [`Pool::from_document`] converts them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoolDocument {
    Wrapped { pools: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

impl PoolDocument {
    fn into_pools(self) -> Result<Vec<Pool>> {
        match self {
            PoolDocument::Wrapped { pools } | PoolDocument::Bare(pools) => {
                pools.into_iter().map(Pool::from_document).collect()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilePoolRegistry {
    path: PathBuf,
}

impl FilePoolRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a pool document; `.json` files are read as JSON, anything
    /// else as YAML
    pub fn parse(path: &Path, raw: &str) -> Result<Vec<Pool>> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let doc: PoolDocument = if is_json {
            serde_json::from_str(raw)?
        } else {
            serde_yaml::from_str(raw)?
        };
        doc.into_pools()
    }
}

#[async_trait]
impl PoolRegistry for FilePoolRegistry {
    async fn list_pools(&self) -> Result<Vec<Pool>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let pools = Self::parse(&self.path, &raw)?;
        debug!(path = %self.path.display(), "Loaded {} pools", pools.len());
        Ok(pools)
    }
}
