//! Cluster-level cost queries
//!
//! [`CostService`] ties an inventory, a [`CostAggregator`] and a
//! [`ResultCache`] together and answers per-cluster and multi-cluster
//! questions. Its contract towards callers is that they always receive a
//! structurally valid breakdown: only unsupported-workload errors escape,
//! every other failure degrades to [`CostBreakdown::empty_cluster`].

use crate::aggregation::{ClusterEstimate, CostAggregator, SurchargeModel};
use crate::cache::ResultCache;
use crate::error::Result;
use chrono::Utc;
use clustercost_core::breakdown::CostBreakdown;
use clustercost_core::provider::ClusterInventory;
use clustercost_core::types::{ClusterDescriptor, ClusterId, Platform, TimeWindow};
use clustercost_core::workload::ServicePlan;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Split a dashboard multi-value selection into cluster ids.
///
/// Accepts `(id1|id2|...)` or a single bare id. Blanks are dropped and
/// repeated ids are kept once, in order of first appearance.
///
/// # Examples
///
/// ```
/// use clustercost::service::parse_selection;
///
/// let ids = parse_selection("(j-1|j-2|j-1)");
/// assert_eq!(ids.len(), 2);
/// assert_eq!(parse_selection("j-3")[0].as_str(), "j-3");
/// ```
pub fn parse_selection(selection: &str) -> Vec<ClusterId> {
    let trimmed = selection.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    let mut seen = HashSet::new();
    inner
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .map(ClusterId::new)
        .collect()
}

pub struct CostService {
    inventory: Arc<dyn ClusterInventory>,
    aggregator: CostAggregator,
    cache: ResultCache,
    platform: Platform,
    plan: ServicePlan,
    window: TimeWindow,
}

impl CostService {
    pub fn new(
        inventory: Arc<dyn ClusterInventory>,
        aggregator: CostAggregator,
        platform: Platform,
        plan: ServicePlan,
    ) -> Self {
        Self {
            inventory,
            aggregator,
            cache: ResultCache::new(),
            platform,
            plan,
            window: TimeWindow::unbounded(),
        }
    }

    /// Restrict every estimate to `window`. Windowed results are never cached.
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn aggregator(&self) -> &CostAggregator {
        &self.aggregator
    }

    fn caches_results(&self) -> bool {
        self.window == TimeWindow::unbounded()
    }

    pub async fn describe_cluster(&self, cluster: &ClusterId) -> Result<ClusterDescriptor> {
        if let Some(descriptor) = self.cache.get_descriptor(cluster).await {
            return Ok(descriptor);
        }
        let descriptor = self.inventory.describe_cluster(cluster).await?;
        self.cache.store_descriptor(&descriptor).await;
        Ok(descriptor)
    }

    async fn try_estimate(&self, cluster: &ClusterId) -> Result<ClusterEstimate> {
        let descriptor = self.describe_cluster(cluster).await?;
        let surcharge = SurchargeModel::for_cluster(self.platform, &descriptor, &self.plan)?;
        let estimate = self
            .aggregator
            .estimate_cluster(
                self.inventory.as_ref(),
                &descriptor,
                &surcharge,
                self.window,
                Utc::now(),
            )
            .await?;

        if self.caches_results() {
            if estimate.is_degraded() {
                warn!(
                    "Not caching estimate for cluster {}: {} instances could not be priced",
                    cluster,
                    estimate.degraded.len()
                );
            } else {
                self.cache.store(&descriptor, &estimate).await;
            }
        }
        Ok(estimate)
    }

    /// Full estimate for one cluster.
    ///
    /// Unsupported-workload errors propagate; any other failure is logged
    /// and yields an empty estimate. Concurrent requests for the same
    /// cluster share one computation when results are cached.
    pub async fn cluster_estimate(&self, cluster: &ClusterId) -> Result<ClusterEstimate> {
        if !self.caches_results() {
            return self.estimate_or_empty(cluster).await;
        }
        if let Some(estimate) = self.cache.get_estimate(cluster).await {
            debug!("Using cached estimate for {}", cluster);
            return Ok(estimate);
        }

        let slot = self.cache.estimate_slot(cluster).await;
        let _computing = slot.lock().await;
        // another caller may have finished while we waited
        if let Some(estimate) = self.cache.get_estimate(cluster).await {
            debug!("Using cached estimate for {}", cluster);
            return Ok(estimate);
        }
        self.estimate_or_empty(cluster).await
    }

    async fn estimate_or_empty(&self, cluster: &ClusterId) -> Result<ClusterEstimate> {
        match self.try_estimate(cluster).await {
            Ok(estimate) => Ok(estimate),
            Err(e) if e.is_unsupported_input() => Err(e),
            Err(e) => {
                warn!("Problem estimating cluster {}: {}", cluster, e);
                Ok(ClusterEstimate::empty(cluster.clone()))
            }
        }
    }

    pub async fn cluster_cost(&self, cluster: &ClusterId) -> Result<CostBreakdown> {
        Ok(self.cluster_estimate(cluster).await?.breakdown)
    }

    /// Estimates for several clusters, computed concurrently
    pub async fn cluster_estimates(&self, clusters: &[ClusterId]) -> Result<Vec<ClusterEstimate>> {
        join_all(clusters.iter().map(|id| self.cluster_estimate(id)))
            .await
            .into_iter()
            .collect()
    }

    /// Entrywise sum of the breakdowns of several clusters
    pub async fn clusters_cost(&self, clusters: &[ClusterId]) -> Result<CostBreakdown> {
        let estimates = self.cluster_estimates(clusters).await?;
        Ok(CostBreakdown::add_costs(estimates.iter().map(|e| &e.breakdown)))
    }

    /// Summed breakdown for a dashboard selection such as `(j-1|j-2)`
    pub async fn selection_cost(&self, selection: &str) -> Result<CostBreakdown> {
        self.clusters_cost(&parse_selection(selection)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::InventorySnapshot;
    use clustercost_core::error::CostError;
    use clustercost_pricing::{PriceCatalog, SpotPriceInterpolator};
    use async_trait::async_trait;
    use clustercost_core::types::{GroupId, GroupQueryMode, Instance, ResourceGroup};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn snapshot() -> InventorySnapshot {
        let doc = json!({
            "clusters": [{
                "descriptor": {
                    "id": "j-1", "state": "TERMINATED", "zone": "us-east-1a",
                    "created_at": "2024-03-01T00:00:00Z",
                    "ended_at": "2024-03-01T01:00:00Z",
                    "runtime": { "job_flag": "unknown", "runtime_version": "13.3.x-scala2.12" }
                },
                "groups": [{
                    "id": "ig-1", "role": "MASTER", "instance_kind": "m5.xlarge",
                    "instances": [{
                        "id": "i-1", "kind": "m5.xlarge", "pricing_mode": "ON_DEMAND",
                        "created_at": "2024-03-01T00:00:00Z",
                        "terminated_at": "2024-03-01T01:00:00Z"
                    }]
                }]
            }, {
                "descriptor": {
                    "id": "j-2", "state": "TERMINATED", "zone": "us-east-1a",
                    "created_at": "2024-03-01T00:00:00Z",
                    "ended_at": "2024-03-01T01:00:00Z"
                },
                "groups": [{
                    "id": "ig-2", "role": "CORE", "instance_kind": "m5.xlarge",
                    "instances": [{
                        "id": "i-ok", "kind": "m5.xlarge", "pricing_mode": "ON_DEMAND",
                        "created_at": "2024-03-01T00:00:00Z",
                        "terminated_at": "2024-03-01T01:00:00Z"
                    }, {
                        "id": "i-bad", "kind": "m5.xlarge", "pricing_mode": "ON_DEMAND",
                        "created_at": "2024-03-01T01:00:00Z",
                        "terminated_at": "2024-03-01T00:00:00Z"
                    }]
                }]
            }]
        });
        InventorySnapshot::from_json_str(&doc.to_string()).unwrap()
    }

    fn service_over(inventory: Arc<dyn ClusterInventory>, platform: Platform) -> CostService {
        let catalog = PriceCatalog::empty().with_on_demand("m5.xlarge", 1.0);
        let aggregator =
            CostAggregator::new(Arc::new(catalog), Arc::new(SpotPriceInterpolator::offline()));
        CostService::new(inventory, aggregator, platform, ServicePlan::default())
    }

    fn service(platform: Platform) -> CostService {
        service_over(Arc::new(snapshot()), platform)
    }

    /// Counts group listings and yields before answering
    struct CountingInventory {
        inner: InventorySnapshot,
        listings: AtomicU32,
    }

    #[async_trait]
    impl ClusterInventory for CountingInventory {
        async fn describe_cluster(&self, cluster: &ClusterId) -> Result<ClusterDescriptor> {
            tokio::task::yield_now().await;
            self.inner.describe_cluster(cluster).await
        }

        async fn list_resource_groups(&self, cluster: &ClusterId) -> Result<Vec<ResourceGroup>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.list_resource_groups(cluster).await
        }

        async fn list_elastic_fleets(&self, cluster: &ClusterId) -> Result<Vec<ResourceGroup>> {
            self.inner.list_elastic_fleets(cluster).await
        }

        async fn list_instances(
            &self,
            cluster: &ClusterId,
            group: &GroupId,
            mode: GroupQueryMode,
        ) -> Result<Vec<Instance>> {
            tokio::task::yield_now().await;
            self.inner.list_instances(cluster, group, mode).await
        }
    }

    #[test]
    fn test_parse_selection() {
        let ids = parse_selection(" (j-1| j-2 ||j-3) ");
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["j-1", "j-2", "j-3"]);
        assert_eq!(parse_selection("j-9").len(), 1);
        assert!(parse_selection("()").is_empty());
    }

    #[test]
    fn test_parse_selection_drops_repeated_ids() {
        let ids = parse_selection("(j-2|j-1| j-2 |j-1)");
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["j-2", "j-1"]);
    }

    #[tokio::test]
    async fn test_repeated_selection_is_counted_once() {
        let svc = service(Platform::Emr);
        let single = svc.selection_cost("j-1").await.unwrap();
        let repeated = svc.selection_cost("(j-1|j-1)").await.unwrap();
        assert!((repeated.get("MASTER.COMPUTE") - 1.0).abs() < 1e-9);
        assert!((repeated.total() - single.total()).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_requests_compute_once() {
        let inventory = Arc::new(CountingInventory {
            inner: snapshot(),
            listings: AtomicU32::new(0),
        });
        let svc = service_over(inventory.clone(), Platform::Emr);
        let id = ClusterId::new("j-1");

        let (a, b) = futures::join!(svc.cluster_estimate(&id), svc.cluster_estimate(&id));
        assert_eq!(a.unwrap().breakdown, b.unwrap().breakdown);
        assert_eq!(inventory.listings.load(Ordering::SeqCst), 1);

        svc.cluster_estimate(&id).await.unwrap();
        assert_eq!(inventory.listings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_degraded_estimate_is_not_cached() {
        let svc = service(Platform::Emr);
        let id = ClusterId::new("j-2");
        let estimate = svc.cluster_estimate(&id).await.unwrap();
        assert!(estimate.is_degraded());
        assert!((estimate.breakdown.get("CORE.COMPUTE") - 1.0).abs() < 1e-9);
        assert!(svc.cache().get_estimate(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_cluster_yields_empty_breakdown() {
        let svc = service(Platform::Emr);
        let costs = svc.cluster_cost(&ClusterId::new("j-missing")).await.unwrap();
        assert_eq!(costs, CostBreakdown::empty_cluster());
    }

    #[tokio::test]
    async fn test_terminal_cluster_is_cached() {
        let svc = service(Platform::Emr);
        let id = ClusterId::new("j-1");
        let first = svc.cluster_cost(&id).await.unwrap();
        assert!((first.get("MASTER.COMPUTE") - 1.0).abs() < 1e-9);
        assert_eq!(svc.cache().get_cost(&id).await, Some(first));
    }

    #[tokio::test]
    async fn test_unsupported_workload_propagates() {
        let svc = service(Platform::Databricks);
        let err = svc.cluster_cost(&ClusterId::new("j-1")).await.unwrap_err();
        assert!(matches!(err, CostError::UnsupportedWorkload { .. }));
    }

    #[tokio::test]
    async fn test_selection_sums_clusters() {
        let svc = service(Platform::Emr);
        let single = svc.cluster_cost(&ClusterId::new("j-1")).await.unwrap();
        let summed = svc.selection_cost("(j-1|j-missing)").await.unwrap();
        assert!((summed.total() - single.total()).abs() < 1e-9);
        assert!(summed.contains_key("MASTER.COMPUTE"));
        assert!(summed.contains_key("CORE.STORAGE"));
    }
}
