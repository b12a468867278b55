//! Process-lifetime memoization of cluster results
//!
//! Only terminal clusters are cached: once a cluster has stopped its cost can
//! no longer change. Entries are write-once; a second store for the same
//! cluster keeps the first value.

use crate::aggregation::ClusterEstimate;
use clustercost_core::breakdown::CostBreakdown;
use clustercost_core::types::{ClusterDescriptor, ClusterId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Cluster id → estimate and cluster id → descriptor caches
#[derive(Default)]
pub struct ResultCache {
    estimates: RwLock<HashMap<ClusterId, ClusterEstimate>>,
    descriptors: RwLock<HashMap<ClusterId, ClusterDescriptor>>,
    slots: RwLock<HashMap<ClusterId, Arc<Mutex<()>>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_estimate(&self, cluster: &ClusterId) -> Option<ClusterEstimate> {
        self.estimates.read().await.get(cluster).cloned()
    }

    pub async fn get_cost(&self, cluster: &ClusterId) -> Option<CostBreakdown> {
        self.estimates
            .read()
            .await
            .get(cluster)
            .map(|estimate| estimate.breakdown.clone())
    }

    /// Cache an estimate if `descriptor` is terminal. Returns whether it was stored.
    pub async fn store(&self, descriptor: &ClusterDescriptor, estimate: &ClusterEstimate) -> bool {
        if !descriptor.is_terminal() {
            return false;
        }
        let mut estimates = self.estimates.write().await;
        if estimates.contains_key(&descriptor.id) {
            return false;
        }
        debug!("Caching cost of terminated cluster {}", descriptor.id);
        estimates.insert(descriptor.id.clone(), estimate.clone());
        true
    }

    pub async fn get_descriptor(&self, cluster: &ClusterId) -> Option<ClusterDescriptor> {
        self.descriptors.read().await.get(cluster).cloned()
    }

    /// Cache a descriptor if it is terminal. Returns whether it was stored.
    pub async fn store_descriptor(&self, descriptor: &ClusterDescriptor) -> bool {
        if !descriptor.is_terminal() {
            return false;
        }
        let mut descriptors = self.descriptors.write().await;
        if descriptors.contains_key(&descriptor.id) {
            return false;
        }
        descriptors.insert(descriptor.id.clone(), descriptor.clone());
        true
    }

    /// Per-cluster lock held while an estimate is computed, so concurrent
    /// first requests for the same cluster wait for one computation
    pub async fn estimate_slot(&self, cluster: &ClusterId) -> Arc<Mutex<()>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(cluster) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(cluster.clone()).or_default())
    }

    pub async fn len(&self) -> usize {
        self.estimates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.estimates.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clustercost_core::breakdown::CostCategory;
    use clustercost_core::types::{ClusterState, Zone};

    fn descriptor(id: &str, state: ClusterState) -> ClusterDescriptor {
        ClusterDescriptor {
            id: ClusterId::new(id),
            name: id.to_string(),
            state,
            zone: Zone::new("us-east-1a"),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ended_at: None,
            runtime: None,
        }
    }

    fn estimate(id: &str, compute: f64) -> ClusterEstimate {
        let mut estimate = ClusterEstimate::empty(ClusterId::new(id));
        estimate.breakdown.add("CORE", CostCategory::Compute, compute);
        estimate
    }

    #[tokio::test]
    async fn test_only_terminal_clusters_are_cached() {
        let cache = ResultCache::new();
        let running = descriptor("j-run", ClusterState::Running);
        let done = descriptor("j-done", ClusterState::Terminated);

        assert!(!cache.store(&running, &estimate("j-run", 1.0)).await);
        assert!(cache.store(&done, &estimate("j-done", 2.0)).await);

        assert!(cache.get_cost(&running.id).await.is_none());
        assert_eq!(cache.get_cost(&done.id).await.unwrap().total(), 2.0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_entries_are_write_once() {
        let cache = ResultCache::new();
        let done = descriptor("j-done", ClusterState::TerminatedWithErrors);

        assert!(cache.store(&done, &estimate("j-done", 2.0)).await);
        assert!(!cache.store(&done, &estimate("j-done", 5.0)).await);
        assert_eq!(cache.get_cost(&done.id).await.unwrap().total(), 2.0);
    }

    #[tokio::test]
    async fn test_descriptor_cache() {
        let cache = ResultCache::new();
        let starting = descriptor("j-1", ClusterState::Starting);
        assert!(!cache.store_descriptor(&starting).await);
        assert!(cache.get_descriptor(&starting.id).await.is_none());

        let done = descriptor("j-2", ClusterState::Terminated);
        assert!(cache.store_descriptor(&done).await);
        assert_eq!(cache.get_descriptor(&done.id).await, Some(done));
    }

    #[tokio::test]
    async fn test_estimate_slot_is_shared_per_cluster() {
        let cache = ResultCache::new();
        let a = cache.estimate_slot(&ClusterId::new("j-1")).await;
        let b = cache.estimate_slot(&ClusterId::new("j-1")).await;
        let other = cache.estimate_slot(&ClusterId::new("j-2")).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));

        let _held = a.lock().await;
        assert!(b.try_lock().is_err());
        assert!(other.try_lock().is_ok());
    }
}
