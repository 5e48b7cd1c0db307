//! Storage Profiles
//!
//! A profile is a named, reusable bundle of requirements. Before reaching
//! the matching engine it is merged with the per-request parameters into a
//! flat requirement map.

use super::ports::{RequirementMap, Scalar};
use serde::{Deserialize, Serialize};

// =============================================================================
// Provisioning Properties
// =============================================================================

/// Suggested data storage capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStorage {
    #[serde(default)]
    pub is_space_efficient: bool,
    /// Thin, Thick, ...
    #[serde(default)]
    pub provisioning_policy: String,
    /// Recovery time objective in seconds, 0 means unset
    #[serde(default)]
    pub recovery_time_objective: u64,
}

/// Suggested IO connectivity capabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoConnectivity {
    #[serde(default)]
    pub access_protocol: String,
    #[serde(default, rename = "maxIOPS")]
    pub max_iops: u64,
    #[serde(default, rename = "maxBWS")]
    pub max_bws: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningProperties {
    #[serde(default)]
    pub data_storage: Option<DataStorage>,
    #[serde(default)]
    pub io_connectivity: Option<IoConnectivity>,
}

// =============================================================================
// Profile
// =============================================================================

/// A reusable requirement bundle authored by an administrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Requested capabilities copied verbatim into the requirement map
    #[serde(default)]
    pub custom_properties: RequirementMap,
    #[serde(default)]
    pub provisioning_properties: ProvisioningProperties,
}

/// Per-request parameters of a volume creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    /// Requested size in GB
    pub size: u64,
    #[serde(default)]
    pub availability_zone: Option<String>,
    /// Pin the request to one pool
    #[serde(default)]
    pub pool_id: Option<String>,
}

impl Profile {
    /// Merge this profile with a request into a requirement map.
    ///
    /// Basic rules from the request override same-named custom properties.
    pub fn resolve(&self, request: &VolumeRequest, default_zone: &str) -> RequirementMap {
        let mut requirements = self.custom_properties.clone();

        requirements.insert("size".into(), Scalar::from(request.size));

        let zone = request
            .availability_zone
            .as_deref()
            .filter(|z| !z.is_empty())
            .unwrap_or(default_zone);
        requirements.insert("availabilityZone".into(), zone.into());

        if let Some(pool_id) = request.pool_id.as_deref().filter(|id| !id.is_empty()) {
            requirements.insert("id".into(), pool_id.into());
        }

        if let Some(ds) = &self.provisioning_properties.data_storage {
            requirements.insert(
                "extras.dataStorage.isSpaceEfficient".into(),
                format!("<is> {}", ds.is_space_efficient).into(),
            );
            if !ds.provisioning_policy.is_empty() {
                requirements.insert(
                    "extras.dataStorage.provisioningPolicy".into(),
                    ds.provisioning_policy.as_str().into(),
                );
            }
            if ds.recovery_time_objective != 0 {
                requirements.insert(
                    "extras.dataStorage.recoveryTimeObjective".into(),
                    format!("<= {}", ds.recovery_time_objective).into(),
                );
            }
        }

        if let Some(ic) = &self.provisioning_properties.io_connectivity {
            if !ic.access_protocol.is_empty() {
                requirements.insert(
                    "extras.ioConnectivity.accessProtocol".into(),
                    ic.access_protocol.as_str().into(),
                );
            }
            if ic.max_iops != 0 {
                requirements.insert(
                    "extras.ioConnectivity.maxIOPS".into(),
                    format!(">= {}", ic.max_iops).into(),
                );
            }
            if ic.max_bws != 0 {
                requirements.insert(
                    "extras.ioConnectivity.maxBWS".into(),
                    format!(">= {}", ic.max_bws).into(),
                );
            }
        }

        requirements
    }
}
