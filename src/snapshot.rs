//! Offline inventory and spot-price recordings
//!
//! Both providers read a JSON document (optionally gzip-compressed as
//! `<path>.gz`) and answer the provider traits from memory. They back the
//! `estimate` command and the integration tests.
//!
//! An inventory snapshot looks like:
//!
//! ```json
//! {
//!   "clusters": [{
//!     "descriptor": {
//!       "id": "j-1", "state": "TERMINATED", "zone": "us-east-1a",
//!       "created_at": "2024-03-01T08:00:00Z", "ended_at": "2024-03-01T10:00:00Z"
//!     },
//!     "fleets_only": false,
//!     "groups": [{
//!       "id": "ig-1", "role": "MASTER", "instance_kind": "m5.xlarge",
//!       "volumes": [{ "volume_type": "gp2", "size_gib": 32 }],
//!       "instances": [{
//!         "id": "i-1", "kind": "m5.xlarge", "pricing_mode": "ON_DEMAND",
//!         "created_at": "2024-03-01T08:00:00Z", "terminated_at": "2024-03-01T10:00:00Z"
//!       }]
//!     }]
//!   }]
//! }
//! ```

use crate::error::{CostError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clustercost_core::provider::{ClusterInventory, SpotPricePage, SpotPriceSource};
use clustercost_core::types::{
    ClusterDescriptor, ClusterId, GroupId, GroupQueryMode, Instance, InstanceKind, ResourceGroup,
    Zone,
};
use clustercost_pricing::catalog::read_resource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A recorded group (or fleet) with its instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedGroup {
    #[serde(flatten)]
    pub group: ResourceGroup,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// A recorded cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCluster {
    pub descriptor: ClusterDescriptor,
    /// Cluster was provisioned as elastic fleets and rejects group queries
    #[serde(default)]
    pub fleets_only: bool,
    #[serde(default)]
    pub groups: Vec<RecordedGroup>,
}

/// In-memory [`ClusterInventory`] backed by a JSON recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub clusters: Vec<RecordedCluster>,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_resource(path)?.ok_or_else(|| {
        CostError::Config(format!("snapshot {} does not exist", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| CostError::Parse {
        file: path.to_path_buf(),
        error: e.to_string(),
    })
}

impl InventorySnapshot {
    /// Load `path`, or `path.gz` when present
    pub fn load(path: &Path) -> Result<Self> {
        let snapshot: Self = load_json(path)?;
        debug!(
            "Loaded {} clusters from {}",
            snapshot.clusters.len(),
            path.display()
        );
        Ok(snapshot)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.clusters
            .iter()
            .map(|c| c.descriptor.id.clone())
            .collect()
    }

    fn cluster(&self, id: &ClusterId) -> Result<&RecordedCluster> {
        self.clusters
            .iter()
            .find(|c| &c.descriptor.id == id)
            .ok_or_else(|| CostError::UnknownCluster(id.clone()))
    }

    fn groups_for(&self, id: &ClusterId, mode: GroupQueryMode) -> Result<&[RecordedGroup]> {
        let cluster = self.cluster(id)?;
        let supported = match mode {
            GroupQueryMode::InstanceGroups => !cluster.fleets_only,
            GroupQueryMode::InstanceFleets => cluster.fleets_only,
        };
        if !supported {
            return Err(CostError::UnsupportedQueryMode {
                cluster: id.clone(),
                mode: mode.to_string(),
            });
        }
        Ok(&cluster.groups)
    }
}

#[async_trait]
impl ClusterInventory for InventorySnapshot {
    async fn describe_cluster(&self, cluster: &ClusterId) -> Result<ClusterDescriptor> {
        Ok(self.cluster(cluster)?.descriptor.clone())
    }

    async fn list_resource_groups(&self, cluster: &ClusterId) -> Result<Vec<ResourceGroup>> {
        Ok(self
            .groups_for(cluster, GroupQueryMode::InstanceGroups)?
            .iter()
            .map(|g| g.group.clone())
            .collect())
    }

    async fn list_elastic_fleets(&self, cluster: &ClusterId) -> Result<Vec<ResourceGroup>> {
        Ok(self
            .groups_for(cluster, GroupQueryMode::InstanceFleets)?
            .iter()
            .map(|g| g.group.clone())
            .collect())
    }

    async fn list_instances(
        &self,
        cluster: &ClusterId,
        group: &GroupId,
        mode: GroupQueryMode,
    ) -> Result<Vec<Instance>> {
        self.groups_for(cluster, mode)?
            .iter()
            .find(|g| &g.group.id == group)
            .map(|g| g.instances.clone())
            .ok_or_else(|| {
                CostError::InvalidArgument(format!("cluster {cluster} has no group {group}"))
            })
    }
}

/// One spot observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedObservation {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Observations for one (instance kind, zone)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSeries {
    pub instance_kind: InstanceKind,
    pub zone: Zone,
    pub observations: Vec<RecordedObservation>,
}

fn default_page_size() -> usize {
    100
}

/// In-memory [`SpotPriceSource`] with fixed-size pagination.
///
/// A range query returns the last observation at or before `start` (the
/// price in effect when the range opens) followed by every observation in
/// `(start, end]`, oldest first. Continuation tokens are offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSpotPrices {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub series: Vec<RecordedSeries>,
}

impl Default for RecordedSpotPrices {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            series: Vec::new(),
        }
    }
}

impl RecordedSpotPrices {
    pub fn load(path: &Path) -> Result<Self> {
        load_json(path)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    fn range(
        &self,
        kind: &InstanceKind,
        zone: &Zone,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, f64)> {
        let mut observations: Vec<(DateTime<Utc>, f64)> = self
            .series
            .iter()
            .filter(|s| &s.instance_kind == kind && &s.zone == zone)
            .flat_map(|s| s.observations.iter().map(|o| (o.timestamp, o.price)))
            .collect();
        observations.sort_by_key(|(ts, _)| *ts);

        let opening = observations.iter().rev().find(|(ts, _)| *ts <= start).copied();
        opening
            .into_iter()
            .chain(
                observations
                    .into_iter()
                    .filter(|(ts, _)| *ts > start && *ts <= end),
            )
            .collect()
    }
}

#[async_trait]
impl SpotPriceSource for RecordedSpotPrices {
    async fn fetch_page(
        &self,
        kind: &InstanceKind,
        zone: &Zone,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_token: Option<String>,
    ) -> Result<SpotPricePage> {
        let offset = match next_token.as_deref() {
            None | Some("") => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                CostError::InvalidArgument(format!("invalid continuation token: {token}"))
            })?,
        };
        let page_size = self.page_size.max(1);
        let all = self.range(kind, zone, start, end);

        let page_end = (offset + page_size).min(all.len());
        let observations = all.get(offset..page_end).map(<[_]>::to_vec).unwrap_or_default();
        let next_token = (page_end < all.len()).then(|| page_end.to_string());

        Ok(SpotPricePage {
            observations,
            next_token,
        })
    }
}
