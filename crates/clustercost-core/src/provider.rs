//! Provider traits for inventory and spot-price data
//!
//! The engine never talks to a cloud control plane directly. Callers plug in
//! implementations of these traits: live API clients in production, JSON
//! recordings for offline use and tests.

use crate::error::Result;
use crate::types::{
    ClusterDescriptor, ClusterId, GroupId, GroupQueryMode, Instance, InstanceKind, ResourceGroup,
    Zone,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of cluster, resource-group and instance records.
#[async_trait]
pub trait ClusterInventory: Send + Sync {
    /// Describe a single cluster.
    async fn describe_cluster(&self, cluster: &ClusterId) -> Result<ClusterDescriptor>;

    /// List homogeneous resource groups.
    ///
    /// Fails with [`CostError::UnsupportedQueryMode`](crate::error::CostError::UnsupportedQueryMode)
    /// for clusters provisioned as elastic fleets.
    async fn list_resource_groups(&self, cluster: &ClusterId) -> Result<Vec<ResourceGroup>>;

    /// List elastic resource fleets.
    async fn list_elastic_fleets(&self, cluster: &ClusterId) -> Result<Vec<ResourceGroup>>;

    /// List every instance (running or terminated) of a group or fleet.
    async fn list_instances(
        &self,
        cluster: &ClusterId,
        group: &GroupId,
        mode: GroupQueryMode,
    ) -> Result<Vec<Instance>>;
}

/// One page of spot-price observations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotPricePage {
    pub observations: Vec<(DateTime<Utc>, f64)>,
    /// Continuation token, `None` on the last page
    pub next_token: Option<String>,
}

/// Paginated spot-price history, bounded by an explicit time range.
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    async fn fetch_page(
        &self,
        kind: &InstanceKind,
        zone: &Zone,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_token: Option<String>,
    ) -> Result<SpotPricePage>;
}
