//! Predicate Chain
//!
//! An immutable, ordered sequence of predicates built once at startup:
//! specific predicates first, then the generic catch-all for every key the
//! specific ones did not consume. Every link is pure intersection
//! filtering, so the result equals the order-preserved intersection over
//! all requirement keys regardless of link order.

use super::expression::RequirementSet;
use super::predicate::{GenericPredicate, Predicate, PredicateKind};
use crate::config::SelectorConfig;
use crate::domain::ports::{Pool, RequirementMap};
use crate::error::Result;
use tracing::debug;

pub struct PredicateChain {
    links: Vec<Box<dyn Predicate>>,
}

impl PredicateChain {
    /// Build a chain from specific predicates; the generic catch-all is
    /// appended and told which keys they consume
    pub fn new(specific: Vec<Box<dyn Predicate>>) -> Self {
        let consumed: Vec<String> = specific
            .iter()
            .filter_map(|p| p.key().map(str::to_string))
            .collect();

        let mut links = specific;
        links.push(Box::new(GenericPredicate::new(consumed)));
        Self { links }
    }

    /// Chain with every built-in predicate in default order
    pub fn standard() -> Self {
        Self::from_kinds(&PredicateKind::DEFAULT_ORDER)
    }

    pub fn from_kinds(kinds: &[PredicateKind]) -> Self {
        Self::new(kinds.iter().map(|kind| kind.build()).collect())
    }

    /// Chain with the built-ins enabled in configuration, in that order
    pub fn from_config(config: &SelectorConfig) -> Self {
        Self::from_kinds(&config.predicates)
    }

    /// Names of the links in execution order
    pub fn link_names(&self) -> Vec<&'static str> {
        self.links.iter().map(|p| p.name()).collect()
    }

    /// Run all links over `pools`.
    ///
    /// Every requirement expression is parsed before any link runs, so a
    /// malformed requirement fails even when no candidates remain.
    pub fn handle<'a>(
        &self,
        requirements: &RequirementMap,
        pools: &'a [Pool],
    ) -> Result<Vec<&'a Pool>> {
        let compiled = RequirementSet::compile(requirements)?;
        let mut survivors: Vec<&'a Pool> = pools.iter().collect();

        for link in &self.links {
            if survivors.is_empty() {
                break;
            }
            let before = survivors.len();
            survivors = link.filter(&compiled, &survivors)?;
            debug!(
                predicate = link.name(),
                before,
                after = survivors.len(),
                "Predicate applied"
            );
        }

        Ok(survivors)
    }
}

impl Default for PredicateChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for PredicateChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateChain")
            .field("links", &self.link_names())
            .finish()
    }
}
