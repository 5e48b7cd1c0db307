//! Selection Service
//!
//! Public entry point of the engine: fetches the current pools from the
//! registry, runs the predicate chain and returns the survivors. Holds no
//! state between calls besides the injected registry and chain.

use super::chain::PredicateChain;
use crate::domain::ports::{Pool, PoolRegistry, RequirementMap};
use crate::domain::profile::{Profile, VolumeRequest};
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SelectionService {
    registry: Arc<dyn PoolRegistry>,
    chain: Arc<PredicateChain>,
    default_zone: String,
}

impl SelectionService {
    pub fn new(registry: Arc<dyn PoolRegistry>, chain: Arc<PredicateChain>) -> Self {
        Self {
            registry,
            chain,
            default_zone: "default".into(),
        }
    }

    /// Zone used by [`select_pool_for_request`](Self::select_pool_for_request)
    /// when the request names none
    pub fn with_default_zone(mut self, zone: impl Into<String>) -> Self {
        self.default_zone = zone.into();
        self
    }

    pub fn chain(&self) -> &PredicateChain {
        &self.chain
    }

    /// Select the first pool satisfying `requirements`
    pub async fn select_pool(&self, requirements: &RequirementMap) -> Result<Pool> {
        let mut pools = self.select_pools(1, requirements).await?;
        // select_pools never returns an empty list
        pools
            .pop()
            .ok_or_else(|| Error::Internal("empty survivor set after selection".into()))
    }

    /// Select up to `limit` pools satisfying `requirements`, in registry order
    pub async fn select_pools(
        &self,
        limit: usize,
        requirements: &RequirementMap,
    ) -> Result<Vec<Pool>> {
        if limit == 0 {
            return Err(Error::InvalidRequest("limit must be at least 1".into()));
        }

        let pools = self.registry.list_pools().await.map_err(|e| {
            warn!("Listing pools failed: {}", e);
            e
        })?;
        debug!("Evaluating {} candidate pools", pools.len());

        let survivors = self.chain.handle(requirements, &pools)?;
        if survivors.is_empty() {
            return Err(Error::NoAvailablePool {
                requirements: describe(requirements),
            });
        }

        let selected: Vec<Pool> = survivors.into_iter().take(limit).cloned().collect();
        info!(
            "Selected {} of {} pools: {}",
            selected.len(),
            pools.len(),
            selected
                .iter()
                .map(|p| p.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(selected)
    }

    /// Resolve a profile and a volume request into requirements, then select
    pub async fn select_pool_for_request(
        &self,
        profile: &Profile,
        request: &VolumeRequest,
    ) -> Result<Pool> {
        let requirements = profile.resolve(request, &self.default_zone);
        debug!(
            profile = %profile.name,
            "Resolved {} requirements from profile",
            requirements.len()
        );
        self.select_pool(&requirements).await
    }
}

impl std::fmt::Debug for SelectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionService")
            .field("chain", &self.chain)
            .field("default_zone", &self.default_zone)
            .finish_non_exhaustive()
    }
}

fn describe(requirements: &RequirementMap) -> String {
    let body = requirements
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}
