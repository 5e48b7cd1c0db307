//! Selection Predicates
//!
//! Each built-in predicate owns one well-known requirement key and checks
//! it against a known pool attribute without going through flattening.
//! The generic predicate evaluates every remaining key against the pool's
//! flattened capability tree.

use super::expression::{parse_bool, Expression, Requirement, RequirementSet};
use super::flatten::flatten;
use crate::domain::ports::{Pool, Scalar};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

pub const ZONE_KEY: &str = "availabilityZone";
pub const SIZE_KEY: &str = "size";
pub const THIN_KEY: &str = "thin";
pub const DEDUPE_KEY: &str = "dedupe";
pub const COMPRESSION_KEY: &str = "compression";
pub const DISK_TYPE_KEY: &str = "diskType";

// =============================================================================
// Predicate Trait
// =============================================================================

/// A stateless link of the predicate chain
pub trait Predicate: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// The requirement key this predicate consumes, `None` for the catch-all
    fn key(&self) -> Option<&str>;

    /// Return the candidates satisfying this predicate, order preserved
    fn filter<'a>(
        &self,
        requirements: &RequirementSet,
        candidates: &[&'a Pool],
    ) -> Result<Vec<&'a Pool>>;
}

/// Built-in predicate kinds, in the form they appear in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredicateKind {
    Zone,
    Capacity,
    Thin,
    Dedupe,
    Compression,
    DiskType,
}

impl PredicateKind {
    /// Cheap, selective predicates first
    pub const DEFAULT_ORDER: [PredicateKind; 6] = [
        PredicateKind::Zone,
        PredicateKind::Capacity,
        PredicateKind::Thin,
        PredicateKind::Dedupe,
        PredicateKind::Compression,
        PredicateKind::DiskType,
    ];

    pub fn build(self) -> Box<dyn Predicate> {
        match self {
            PredicateKind::Zone => Box::new(ZonePredicate),
            PredicateKind::Capacity => Box::new(CapacityPredicate),
            PredicateKind::Thin => Box::new(FeaturePredicate::thin()),
            PredicateKind::Dedupe => Box::new(FeaturePredicate::dedupe()),
            PredicateKind::Compression => Box::new(FeaturePredicate::compression()),
            PredicateKind::DiskType => Box::new(DiskTypePredicate),
        }
    }

    /// The requirement key this kind consumes
    pub fn key(self) -> &'static str {
        match self {
            PredicateKind::Zone => ZONE_KEY,
            PredicateKind::Capacity => SIZE_KEY,
            PredicateKind::Thin => THIN_KEY,
            PredicateKind::Dedupe => DEDUPE_KEY,
            PredicateKind::Compression => COMPRESSION_KEY,
            PredicateKind::DiskType => DISK_TYPE_KEY,
        }
    }

    /// The built-in owning a well-known requirement key
    pub fn for_key(key: &str) -> Option<Self> {
        Self::DEFAULT_ORDER.into_iter().find(|kind| kind.key() == key)
    }
}

impl std::fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredicateKind::Zone => write!(f, "zone"),
            PredicateKind::Capacity => write!(f, "capacity"),
            PredicateKind::Thin => write!(f, "thin"),
            PredicateKind::Dedupe => write!(f, "dedupe"),
            PredicateKind::Compression => write!(f, "compression"),
            PredicateKind::DiskType => write!(f, "diskType"),
        }
    }
}

fn retain_matching<'a>(
    candidates: &[&'a Pool],
    mut is_match: impl FnMut(&Pool) -> Result<bool>,
) -> Result<Vec<&'a Pool>> {
    let mut survivors = Vec::with_capacity(candidates.len());
    for &pool in candidates {
        if is_match(pool)? {
            survivors.push(pool);
        }
    }
    Ok(survivors)
}

/// Full-grammar fallback for operator expressions on a built-in key
fn retain_by_expression<'a>(
    requirement: &Requirement,
    candidates: &[&'a Pool],
    attribute: impl Fn(&Pool) -> Option<Scalar>,
) -> Result<Vec<&'a Pool>> {
    retain_matching(candidates, |pool| match attribute(pool) {
        Some(value) => requirement.matches(&value),
        None => Ok(false),
    })
}

fn source_text(requirement: &Requirement) -> String {
    requirement.source.to_string()
}

// =============================================================================
// Zone Predicate
// =============================================================================

/// Availability zone, case-insensitive equality
#[derive(Debug, Clone, Copy, Default)]
pub struct ZonePredicate;

impl Predicate for ZonePredicate {
    fn name(&self) -> &'static str {
        "zone"
    }

    fn key(&self) -> Option<&str> {
        Some(ZONE_KEY)
    }

    fn filter<'a>(
        &self,
        requirements: &RequirementSet,
        candidates: &[&'a Pool],
    ) -> Result<Vec<&'a Pool>> {
        let Some(requirement) = requirements.get(ZONE_KEY) else {
            return Ok(candidates.to_vec());
        };

        match &requirement.expression {
            Expression::Literal(Scalar::String(zone)) => {
                let zone = zone.to_lowercase();
                retain_matching(candidates, |pool| {
                    Ok(pool.availability_zone.to_lowercase() == zone)
                })
            }
            Expression::Literal(_) => Err(Error::format(
                ZONE_KEY,
                &source_text(requirement),
                "availability zone must be a string",
            )),
            _ => retain_by_expression(requirement, candidates, |pool| {
                Some(Scalar::String(pool.availability_zone.clone()))
            }),
        }
    }
}

// =============================================================================
// Capacity Predicate
// =============================================================================

/// Requested size, satisfied by pools with at least that much free capacity
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityPredicate;

impl Predicate for CapacityPredicate {
    fn name(&self) -> &'static str {
        "capacity"
    }

    fn key(&self) -> Option<&str> {
        Some(SIZE_KEY)
    }

    fn filter<'a>(
        &self,
        requirements: &RequirementSet,
        candidates: &[&'a Pool],
    ) -> Result<Vec<&'a Pool>> {
        let Some(requirement) = requirements.get(SIZE_KEY) else {
            return Ok(candidates.to_vec());
        };

        let size = match &requirement.expression {
            Expression::Literal(Scalar::Number(n)) => Some(*n),
            Expression::Literal(Scalar::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite() && *n >= 0.0)
        .ok_or_else(|| {
            Error::format(
                SIZE_KEY,
                &source_text(requirement),
                "size must be a non-negative number",
            )
        })?;

        retain_matching(candidates, |pool| Ok(pool.free_capacity as f64 >= size))
    }
}

// =============================================================================
// Feature Predicate
// =============================================================================

/// Boolean pool feature declared in the pool's extras
#[derive(Debug, Clone, Copy)]
pub struct FeaturePredicate {
    name: &'static str,
    key: &'static str,
}

impl FeaturePredicate {
    pub fn thin() -> Self {
        Self {
            name: "thin",
            key: THIN_KEY,
        }
    }

    pub fn dedupe() -> Self {
        Self {
            name: "dedupe",
            key: DEDUPE_KEY,
        }
    }

    pub fn compression() -> Self {
        Self {
            name: "compression",
            key: COMPRESSION_KEY,
        }
    }
}

impl Predicate for FeaturePredicate {
    fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> Option<&str> {
        Some(self.key)
    }

    fn filter<'a>(
        &self,
        requirements: &RequirementSet,
        candidates: &[&'a Pool],
    ) -> Result<Vec<&'a Pool>> {
        let Some(requirement) = requirements.get(self.key) else {
            return Ok(candidates.to_vec());
        };

        let wanted = match &requirement.expression {
            Expression::Literal(Scalar::Bool(b)) => *b,
            Expression::Literal(Scalar::String(s)) => {
                parse_bool(s.trim()).ok_or_else(|| {
                    Error::format(self.key, s, "expected a boolean literal")
                })?
            }
            Expression::Literal(Scalar::Number(_)) => {
                return Err(Error::format(
                    self.key,
                    &source_text(requirement),
                    "expected a boolean literal",
                ))
            }
            _ => {
                return retain_by_expression(requirement, candidates, |pool| {
                    pool.extra(self.key).cloned()
                })
            }
        };

        retain_matching(candidates, |pool| match pool.extra(self.key) {
            Some(Scalar::Bool(actual)) => Ok(*actual == wanted),
            Some(other) => Err(Error::type_mismatch(self.key, "bool", other.type_name())),
            None => Ok(false),
        })
    }
}

// =============================================================================
// Disk Type Predicate
// =============================================================================

/// Disk type declared in the pool's extras, case-insensitive equality
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskTypePredicate;

impl Predicate for DiskTypePredicate {
    fn name(&self) -> &'static str {
        "diskType"
    }

    fn key(&self) -> Option<&str> {
        Some(DISK_TYPE_KEY)
    }

    fn filter<'a>(
        &self,
        requirements: &RequirementSet,
        candidates: &[&'a Pool],
    ) -> Result<Vec<&'a Pool>> {
        let Some(requirement) = requirements.get(DISK_TYPE_KEY) else {
            return Ok(candidates.to_vec());
        };

        match &requirement.expression {
            Expression::Literal(Scalar::String(wanted)) => {
                let wanted = wanted.to_lowercase();
                retain_matching(candidates, |pool| match pool.extra(DISK_TYPE_KEY) {
                    Some(Scalar::String(actual)) => Ok(actual.to_lowercase() == wanted),
                    Some(other) => {
                        Err(Error::type_mismatch(DISK_TYPE_KEY, "string", other.type_name()))
                    }
                    None => Ok(false),
                })
            }
            Expression::Literal(_) => Err(Error::format(
                DISK_TYPE_KEY,
                &source_text(requirement),
                "disk type must be a string",
            )),
            _ => retain_by_expression(requirement, candidates, |pool| {
                pool.extra(DISK_TYPE_KEY).cloned()
            }),
        }
    }
}

// =============================================================================
// Generic Predicate
// =============================================================================

/// Catch-all evaluating every requirement no built-in consumed.
///
/// A well-known key whose built-in is absent from the chain is resolved
/// the way that built-in resolves it, so trimming the chain never changes
/// which pools match.
#[derive(Debug, Clone, Default)]
pub struct GenericPredicate {
    consumed: BTreeSet<String>,
}

impl GenericPredicate {
    /// `consumed` lists the keys handled by the specific predicates
    pub fn new<I, S>(consumed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            consumed: consumed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Predicate for GenericPredicate {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn key(&self) -> Option<&str> {
        None
    }

    fn filter<'a>(
        &self,
        requirements: &RequirementSet,
        candidates: &[&'a Pool],
    ) -> Result<Vec<&'a Pool>> {
        let mut survivors = candidates.to_vec();
        let mut pending: Vec<&Requirement> = Vec::new();

        for requirement in requirements.iter() {
            if self.consumed.contains(&requirement.key) {
                continue;
            }
            match PredicateKind::for_key(&requirement.key) {
                Some(kind) => survivors = kind.build().filter(requirements, &survivors)?,
                None => pending.push(requirement),
            }
        }

        if pending.is_empty() {
            return Ok(survivors);
        }

        retain_matching(&survivors, |pool| {
            let flat = flatten(&pool.capability_tree());
            for requirement in &pending {
                let Some(value) = flat.get(&requirement.key) else {
                    trace!(
                        pool = %pool.id,
                        key = %requirement.key,
                        "Pool doesn't provide capability"
                    );
                    return Ok(false);
                };
                if !requirement.matches(value)? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::RequirementMap;
    use assert_matches::assert_matches;

    fn compile(entries: &[(&str, Scalar)]) -> RequirementSet {
        let map: RequirementMap = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        RequirementSet::compile(&map).unwrap()
    }

    fn ids(pools: &[&Pool]) -> Vec<String> {
        pools.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn test_capacity_at_least_requested() {
        let pools = vec![
            Pool::new("A").with_free_capacity(100),
            Pool::new("B").with_free_capacity(50),
            Pool::new("C").with_free_capacity(66),
        ];
        let refs: Vec<&Pool> = pools.iter().collect();

        let out = CapacityPredicate
            .filter(&compile(&[("size", 66.into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["A", "C"]);

        let out = CapacityPredicate
            .filter(&compile(&[("size", "101".into())]), &refs)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_capacity_rejects_expressions() {
        let pools = vec![Pool::new("A").with_free_capacity(100)];
        let refs: Vec<&Pool> = pools.iter().collect();

        let result = CapacityPredicate.filter(&compile(&[("size", ">= 5".into())]), &refs);
        assert_matches!(result, Err(Error::Format { .. }));
    }

    #[test]
    fn test_zone_literal_and_expression() {
        let pools = vec![
            Pool::new("A").with_zone("az1"),
            Pool::new("B").with_zone("az2"),
            Pool::new("C").with_zone("AZ1"),
        ];
        let refs: Vec<&Pool> = pools.iter().collect();

        let out = ZonePredicate
            .filter(&compile(&[("availabilityZone", "az1".into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["A", "C"]);

        let out = ZonePredicate
            .filter(&compile(&[("availabilityZone", "<or> az2 <or> az3".into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["B"]);
    }

    #[test]
    fn test_missing_key_is_pass_through() {
        let pools = vec![Pool::new("A"), Pool::new("B")];
        let refs: Vec<&Pool> = pools.iter().collect();
        let empty = RequirementSet::default();

        for kind in PredicateKind::DEFAULT_ORDER {
            let out = kind.build().filter(&empty, &refs).unwrap();
            assert_eq!(out.len(), 2, "{} should pass through", kind);
        }
    }

    #[test]
    fn test_feature_predicate() {
        let pools = vec![
            Pool::new("A").with_extra("thin", true),
            Pool::new("B").with_extra("thin", false),
            Pool::new("C"),
        ];
        let refs: Vec<&Pool> = pools.iter().collect();
        let thin = FeaturePredicate::thin();

        assert_eq!(
            ids(&thin.filter(&compile(&[("thin", true.into())]), &refs).unwrap()),
            vec!["A"]
        );
        assert_eq!(
            ids(&thin.filter(&compile(&[("thin", "false".into())]), &refs).unwrap()),
            vec!["B"]
        );
        assert_eq!(
            ids(&thin.filter(&compile(&[("thin", "<is> T".into())]), &refs).unwrap()),
            vec!["A"]
        );
        assert_matches!(
            thin.filter(&compile(&[("thin", "maybe".into())]), &refs),
            Err(Error::Format { .. })
        );
    }

    #[test]
    fn test_feature_predicate_type_mismatch() {
        let pools = vec![Pool::new("A").with_extra("dedupe", "yes")];
        let refs: Vec<&Pool> = pools.iter().collect();

        let result = FeaturePredicate::dedupe().filter(&compile(&[("dedupe", true.into())]), &refs);
        assert_matches!(result, Err(Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_disk_type_predicate() {
        let pools = vec![
            Pool::new("A").with_extra("diskType", "SSD"),
            Pool::new("B").with_extra("diskType", "NVMe SSD"),
            Pool::new("C").with_extra("diskType", "HDD"),
        ];
        let refs: Vec<&Pool> = pools.iter().collect();

        let out = DiskTypePredicate
            .filter(&compile(&[("diskType", "ssd".into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["A"]);

        let out = DiskTypePredicate
            .filter(&compile(&[("diskType", "<in> SSD".into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["A", "B"]);
    }

    #[test]
    fn test_generic_predicate_nested_keys() {
        let mut io = crate::domain::ports::CapabilityTree::new();
        io.insert("maxIOPS".into(), 8000.into());
        let pools = vec![
            Pool::new("A").with_extra("ioConnectivity", io),
            Pool::new("B"),
        ];
        let refs: Vec<&Pool> = pools.iter().collect();

        let generic = GenericPredicate::default();
        let out = generic
            .filter(&compile(&[("extras.ioConnectivity.maxIOPS", ">= 5000".into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["A"]);
    }

    #[test]
    fn test_generic_predicate_resolves_well_known_keys() {
        let pools = vec![
            Pool::new("A")
                .with_free_capacity(50)
                .with_extra("thin", true)
                .with_extra("diskType", "SSD"),
            Pool::new("B")
                .with_free_capacity(60)
                .with_extra("thin", false)
                .with_extra("diskType", "HDD"),
            Pool::new("C")
                .with_free_capacity(70)
                .with_extra("thin", true)
                .with_extra("diskType", "ssd"),
        ];
        let refs: Vec<&Pool> = pools.iter().collect();
        let generic = GenericPredicate::default();

        let out = generic
            .filter(&compile(&[("thin", true.into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["A", "C"]);

        let out = generic
            .filter(&compile(&[("size", 55.into()), ("diskType", "SSD".into())]), &refs)
            .unwrap();
        assert_eq!(ids(&out), vec!["C"]);

        assert_matches!(
            generic.filter(&compile(&[("size", ">= 5".into())]), &refs),
            Err(Error::Format { .. })
        );
    }

    #[test]
    fn test_kind_for_key() {
        for kind in PredicateKind::DEFAULT_ORDER {
            assert_eq!(PredicateKind::for_key(kind.key()), Some(kind));
        }
        assert_eq!(PredicateKind::for_key("freeCapacity"), None);
    }

    #[test]
    fn test_generic_predicate_skips_consumed_keys() {
        let pools = vec![Pool::new("A").with_free_capacity(1)];
        let refs: Vec<&Pool> = pools.iter().collect();

        let generic = GenericPredicate::new([SIZE_KEY]);
        let out = generic
            .filter(&compile(&[("size", 500.into())]), &refs)
            .unwrap();
        assert_eq!(out.len(), 1);
    }
}
