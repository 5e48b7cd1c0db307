//! Domain Ports - Core types and trait definitions for pool selection
//!
//! These types define the boundary between the matching engine and the
//! systems around it: drivers produce capability trees, callers produce
//! requirement maps, and a registry hands the engine its candidate pools.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Requirement keys starting with this prefix are annotations, never matched
pub const RESERVED_KEY_PREFIX: &str = ":";

// =============================================================================
// Scalar Values
// =============================================================================

/// A leaf value: either a flattened capability or a requirement literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Scalar {
    /// Name of the carried type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Number(_) => "number",
            Scalar::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

// =============================================================================
// Capability Tree
// =============================================================================

/// Named capability subtrees of a pool
pub type CapabilityTree = BTreeMap<String, CapabilityValue>;

/// A node in a pool's capability tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Scalar(Scalar),
    Map(CapabilityTree),
}

impl CapabilityValue {
    /// Build a capability tree from a generic structured document.
    ///
    /// The root must be an object. `null` members are dropped; arrays are
    /// rejected since they have no dot-addressable form.
    pub fn tree_from_document(doc: &serde_json::Value) -> Result<CapabilityTree> {
        match doc {
            serde_json::Value::Object(members) => convert_members("", members),
            serde_json::Value::Null => Ok(CapabilityTree::new()),
            other => Err(Error::Flatten {
                path: "<root>".into(),
                reason: format!("expected an object, found {}", json_type_name(other)),
            }),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            CapabilityValue::Scalar(s) => Some(s),
            CapabilityValue::Map(_) => None,
        }
    }
}

fn convert_members(
    prefix: &str,
    members: &serde_json::Map<String, serde_json::Value>,
) -> Result<CapabilityTree> {
    let mut tree = CapabilityTree::new();
    for (name, value) in members {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        let converted = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::Bool(b) => CapabilityValue::Scalar(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => {
                let n = n.as_f64().ok_or_else(|| Error::Flatten {
                    path: path.clone(),
                    reason: format!("number {} is not representable as f64", n),
                })?;
                CapabilityValue::Scalar(Scalar::Number(n))
            }
            serde_json::Value::String(s) => CapabilityValue::Scalar(Scalar::String(s.clone())),
            serde_json::Value::Object(inner) => CapabilityValue::Map(convert_members(&path, inner)?),
            serde_json::Value::Array(_) => {
                return Err(Error::Flatten {
                    path,
                    reason: "arrays are not supported in capability trees".into(),
                })
            }
        };
        tree.insert(name.clone(), converted);
    }
    Ok(tree)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<Scalar> for CapabilityValue {
    fn from(value: Scalar) -> Self {
        CapabilityValue::Scalar(value)
    }
}

macro_rules! capability_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CapabilityValue {
                fn from(value: $ty) -> Self {
                    CapabilityValue::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

capability_from_scalar!(bool, f64, i32, i64, u64, &str, String);

impl From<CapabilityTree> for CapabilityValue {
    fn from(tree: CapabilityTree) -> Self {
        CapabilityValue::Map(tree)
    }
}

/// Deserialize a capability tree through the generic document model
pub fn deserialize_tree<'de, D>(deserializer: D) -> std::result::Result<CapabilityTree, D::Error>
where
    D: Deserializer<'de>,
{
    let doc = serde_json::Value::deserialize(deserializer)?;
    CapabilityValue::tree_from_document(&doc).map_err(serde::de::Error::custom)
}

// =============================================================================
// Storage Pool
// =============================================================================

/// A unit of backend storage capacity with declared capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    /// Unique pool identifier
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Backend storage type (block, file, object)
    #[serde(default)]
    pub storage_type: String,
    /// Availability zone the pool belongs to
    #[serde(default)]
    pub availability_zone: String,
    /// Total capacity in GB
    #[serde(default)]
    pub total_capacity: u64,
    /// Free capacity in GB
    #[serde(default)]
    pub free_capacity: u64,
    /// Driver-specific capabilities
    #[serde(default, deserialize_with = "deserialize_tree")]
    pub extras: CapabilityTree,
}

impl Pool {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            storage_type: String::new(),
            availability_zone: String::new(),
            total_capacity: 0,
            free_capacity: 0,
            extras: CapabilityTree::new(),
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = zone.into();
        self
    }

    pub fn with_capacity(mut self, total: u64, free: u64) -> Self {
        self.total_capacity = total;
        self.free_capacity = free;
        self
    }

    pub fn with_free_capacity(mut self, free: u64) -> Self {
        self.free_capacity = free;
        self.total_capacity = self.total_capacity.max(free);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<CapabilityValue>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Build a pool from a generic document.
    ///
    /// `extras` is converted separately so an unsupported capability
    /// document surfaces as a flatten error, not a parse error.
    pub fn from_document(mut doc: serde_json::Value) -> Result<Self> {
        let raw_extras = doc
            .as_object_mut()
            .and_then(|members| members.remove("extras"));
        let extras = match raw_extras {
            Some(raw) => CapabilityValue::tree_from_document(&raw)?,
            None => CapabilityTree::new(),
        };

        let mut pool: Pool = serde_json::from_value(doc)?;
        pool.extras = extras;
        Ok(pool)
    }

    /// Look up a top-level scalar in the pool's extras
    pub fn extra(&self, key: &str) -> Option<&Scalar> {
        self.extras.get(key).and_then(CapabilityValue::as_scalar)
    }

    /// The whole pool record as one capability tree, keyed by wire names
    pub fn capability_tree(&self) -> CapabilityTree {
        let mut tree = CapabilityTree::new();
        tree.insert("id".into(), self.id.as_str().into());
        tree.insert("name".into(), self.name.as_str().into());
        tree.insert("description".into(), self.description.as_str().into());
        tree.insert("storageType".into(), self.storage_type.as_str().into());
        tree.insert("availabilityZone".into(), self.availability_zone.as_str().into());
        tree.insert("totalCapacity".into(), self.total_capacity.into());
        tree.insert("freeCapacity".into(), self.free_capacity.into());
        tree.insert("extras".into(), CapabilityValue::Map(self.extras.clone()));
        tree
    }
}

// =============================================================================
// Requirements
// =============================================================================

/// Caller-declared constraints, attribute path to requirement expression
pub type RequirementMap = BTreeMap<String, Scalar>;

/// Check whether a requirement key is a reserved annotation
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_KEY_PREFIX)
}

// =============================================================================
// Pool Registry Port
// =============================================================================

/// Upstream source of the currently known pools
#[async_trait]
pub trait PoolRegistry: Send + Sync {
    /// List all known pools with their capability trees
    async fn list_pools(&self) -> Result<Vec<Pool>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_tree_from_document() {
        let doc = json!({
            "thin": true,
            "latency": 5,
            "ioConnectivity": { "accessProtocol": "iscsi" },
            "note": null
        });
        let tree = CapabilityValue::tree_from_document(&doc).unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree["thin"], CapabilityValue::Scalar(Scalar::Bool(true)));
        assert_eq!(tree["latency"], CapabilityValue::Scalar(Scalar::Number(5.0)));
        assert_matches!(&tree["ioConnectivity"], CapabilityValue::Map(m) if m.len() == 1);
    }

    #[test]
    fn test_tree_rejects_arrays_and_scalars() {
        let doc = json!({ "advanced": { "tags": ["a", "b"] } });
        let err = CapabilityValue::tree_from_document(&doc).unwrap_err();
        assert_matches!(err, Error::Flatten { ref path, .. } if path == "advanced.tags");

        let err = CapabilityValue::tree_from_document(&json!("just a string")).unwrap_err();
        assert_matches!(err, Error::Flatten { .. });
    }

    #[test]
    fn test_pool_deserialize() {
        let pool: Pool = serde_json::from_value(json!({
            "id": "pool-1",
            "availabilityZone": "az1",
            "freeCapacity": 50,
            "extras": { "thin": true, "dataStorage": { "provisioningPolicy": "Thin" } }
        }))
        .unwrap();

        assert_eq!(pool.id, "pool-1");
        assert_eq!(pool.free_capacity, 50);
        assert_eq!(pool.extra("thin"), Some(&Scalar::Bool(true)));
        assert!(pool.extra("dataStorage").is_none());
    }

    #[test]
    fn test_pool_from_document() {
        let pool = Pool::from_document(json!({
            "id": "pool-1",
            "freeCapacity": 50,
            "extras": { "thin": true, "unset": null }
        }))
        .unwrap();
        assert_eq!(pool.extra("thin"), Some(&Scalar::Bool(true)));
        assert_eq!(pool.extras.len(), 1);

        let err = Pool::from_document(json!({
            "id": "pool-2",
            "extras": { "advanced": { "tags": ["a"] } }
        }))
        .unwrap_err();
        assert_matches!(err, Error::Flatten { ref path, .. } if path == "advanced.tags");

        let err = Pool::from_document(json!({ "freeCapacity": 1 })).unwrap_err();
        assert_matches!(err, Error::JsonParse(_));
    }

    #[test]
    fn test_capability_tree_uses_wire_names() {
        let pool = Pool::new("p1").with_zone("az1").with_free_capacity(10);
        let tree = pool.capability_tree();

        assert_eq!(tree["availabilityZone"], CapabilityValue::from("az1"));
        assert_eq!(tree["freeCapacity"], CapabilityValue::from(10u64));
        assert_matches!(tree["extras"], CapabilityValue::Map(_));
    }

    #[test]
    fn test_reserved_key() {
        assert!(is_reserved_key(":hint"));
        assert!(!is_reserved_key("hint"));
    }
}
