//! Selector Configuration
//!
//! Loaded once at startup from YAML; decides which built-in predicates run
//! as dedicated links and in which order. Left-out built-ins are still
//! honoured by the generic link, so the set of matching pools never depends
//! on this choice.

use crate::error::{Error, Result};
use crate::selector::predicate::PredicateKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Configuration for the selection engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorConfig {
    /// Zone used when a request names none
    pub default_availability_zone: String,
    /// Built-in predicates, in execution order
    pub predicates: Vec<PredicateKind>,
    /// Number of pools returned when the caller gives no limit
    pub default_limit: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            default_availability_zone: "default".into(),
            predicates: PredicateKind::DEFAULT_ORDER.to_vec(),
            default_limit: 1,
        }
    }
}

impl SelectorConfig {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: SelectorConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(Error::Configuration(
                "defaultLimit must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for kind in &self.predicates {
            if !seen.insert(kind) {
                return Err(Error::Configuration(format!(
                    "predicate {} is listed more than once",
                    kind
                )));
            }
        }

        Ok(())
    }
}
