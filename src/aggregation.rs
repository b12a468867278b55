//! Cost aggregation across resource groups and instances
//!
//! The [`CostAggregator`] prices every instance of a cluster and folds the
//! results into a [`CostBreakdown`] keyed by group role and cost category:
//!
//! - `COMPUTE`: on-demand list price × hours, or the spot integral
//! - `SURCHARGE`: the managed-service fee or the compute-unit surcharge
//! - `STORAGE`: declared volumes plus the fixed root volume
//!
//! A failure while pricing one instance never aborts the cluster: the
//! instance contributes nothing, a warning is logged, and it is reported in
//! [`ClusterEstimate::degraded`].
//!
//! # Examples
//!
//! ```no_run
//! use clustercost::aggregation::{CostAggregator, SurchargeModel};
//! use clustercost::snapshot::InventorySnapshot;
//! use clustercost_core::{ClusterId, ClusterInventory, TimeWindow};
//! use clustercost_pricing::{PriceCatalog, SpotPriceInterpolator};
//! use std::sync::Arc;
//!
//! # async fn example() -> clustercost::Result<()> {
//! let inventory = InventorySnapshot::load("inventory.json".as_ref())?;
//! let aggregator = CostAggregator::new(
//!     Arc::new(PriceCatalog::empty()),
//!     Arc::new(SpotPriceInterpolator::offline()),
//! );
//!
//! let descriptor = inventory.describe_cluster(&ClusterId::new("j-1")).await?;
//! let estimate = aggregator
//!     .estimate_cluster(
//!         &inventory,
//!         &descriptor,
//!         &SurchargeModel::ServiceFee,
//!         TimeWindow::unbounded(),
//!         chrono::Utc::now(),
//!     )
//!     .await?;
//! println!("{}", estimate.breakdown.total());
//! # Ok(())
//! # }
//! ```

use crate::error::{CostError, Result};
use chrono::{DateTime, Utc};
use clustercost_core::breakdown::{CostBreakdown, CostCategory};
use clustercost_core::provider::ClusterInventory;
use clustercost_core::types::{
    ClusterDescriptor, ClusterId, GroupQueryMode, Instance, Platform, PricingMode, ResourceGroup,
    TimeWindow, VolumeSpec, Zone, seconds_between,
};
use clustercost_core::workload::{ServicePlan, WorkloadVariant};
use clustercost_pricing::{PriceCatalog, SpotPriceInterpolator, StorageCostEstimator};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the secondary surcharge is computed for a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurchargeModel {
    /// No surcharge
    None,
    /// Managed-service per-instance fee list × hours
    ServiceFee,
    /// Compute-unit cost per hour × hours, by workload variant and plan
    ComputeUnits {
        variant: WorkloadVariant,
        plan: ServicePlan,
    },
}

impl SurchargeModel {
    /// Surcharge model for a cluster on `platform`.
    ///
    /// Notebook-platform clusters must carry runtime signals that map to a
    /// workload variant; anything else is an unsupported-input error.
    pub fn for_cluster(
        platform: Platform,
        descriptor: &ClusterDescriptor,
        plan: &ServicePlan,
    ) -> Result<Self> {
        match platform {
            Platform::Emr => Ok(Self::ServiceFee),
            Platform::Databricks => {
                let (job_flag, runtime_version) = descriptor
                    .runtime
                    .as_ref()
                    .map(|r| (r.job_flag.as_str(), r.runtime_version.as_str()))
                    .unwrap_or_default();
                let variant = WorkloadVariant::determine(job_flag, runtime_version)?;
                Ok(Self::ComputeUnits {
                    variant,
                    plan: plan.clone(),
                })
            }
        }
    }
}

/// An instance whose cost could not be estimated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedInstance {
    pub instance_id: String,
    pub role: String,
    pub reason: String,
}

/// Breakdown for one cluster plus side-channel details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEstimate {
    pub cluster: ClusterId,
    pub breakdown: CostBreakdown,
    /// Compute units consumed, for unit-surcharge clusters
    pub surcharge_units: f64,
    /// Instances that contributed 0 because estimation failed
    pub degraded: Vec<DegradedInstance>,
}

impl ClusterEstimate {
    pub fn empty(cluster: ClusterId) -> Self {
        Self {
            cluster,
            breakdown: CostBreakdown::empty_cluster(),
            surcharge_units: 0.0,
            degraded: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Cost of one instance over its effective interval
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InstanceCost {
    pub compute: f64,
    pub surcharge: f64,
    pub surcharge_units: f64,
    pub storage: f64,
}

impl InstanceCost {
    pub fn total(&self) -> f64 {
        self.compute + self.surcharge + self.storage
    }
}

/// A group together with its instances
#[derive(Debug, Clone)]
pub struct GroupInventory {
    pub group: ResourceGroup,
    pub instances: Vec<Instance>,
}

/// Prices instances and folds them into breakdowns
pub struct CostAggregator {
    catalog: Arc<PriceCatalog>,
    spot: Arc<SpotPriceInterpolator>,
}

impl CostAggregator {
    pub fn new(catalog: Arc<PriceCatalog>, spot: Arc<SpotPriceInterpolator>) -> Self {
        Self { catalog, spot }
    }

    pub fn catalog(&self) -> &PriceCatalog {
        &self.catalog
    }

    /// Price one instance.
    ///
    /// The billable interval is `[created, terminated or now)` clipped to
    /// `window`; an empty interval costs nothing. Instances that end before
    /// they start are an error.
    pub async fn estimate_instance(
        &self,
        instance: &Instance,
        volumes: &[VolumeSpec],
        zone: &Zone,
        surcharge: &SurchargeModel,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<InstanceCost> {
        let end = instance.end_or(now);
        if end < instance.created_at {
            return Err(CostError::InvalidInterval(format!(
                "instance {} ends at {} before its creation at {}",
                instance.id, end, instance.created_at
            )));
        }

        let Some((from, to)) = window.clip(instance.created_at, end) else {
            return Ok(InstanceCost::default());
        };
        let hours = seconds_between(from, to) / 3600.0;

        let compute = match instance.pricing_mode {
            PricingMode::OnDemand => self.catalog.price_for(&instance.kind) * hours,
            PricingMode::Spot => self.spot.estimate(&instance.kind, zone, from, to).await?,
        };

        let (surcharge, surcharge_units) = match surcharge {
            SurchargeModel::None => (0.0, 0.0),
            SurchargeModel::ServiceFee => (self.catalog.service_fee_for(&instance.kind) * hours, 0.0),
            SurchargeModel::ComputeUnits { variant, plan } => {
                let info = self
                    .catalog
                    .secondary_unit_cost(&instance.kind, *variant, plan);
                (info.cost_per_hour * hours, info.units_per_hour * hours)
            }
        };

        // group volumes are authoritative; fall back to what the instance reports
        let volumes = if volumes.is_empty() {
            instance.volumes.as_slice()
        } else {
            volumes
        };
        let storage = StorageCostEstimator::instance_storage_cost(hours, volumes);

        Ok(InstanceCost {
            compute,
            surcharge,
            surcharge_units,
            storage,
        })
    }

    /// Price every instance of every group into one estimate
    pub async fn estimate_groups(
        &self,
        cluster: &ClusterId,
        groups: &[GroupInventory],
        zone: &Zone,
        surcharge: &SurchargeModel,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> ClusterEstimate {
        let mut estimate = ClusterEstimate {
            cluster: cluster.clone(),
            breakdown: CostBreakdown::new(),
            surcharge_units: 0.0,
            degraded: Vec::new(),
        };

        for entry in groups {
            let role = entry.group.role.as_str();
            estimate.breakdown.ensure_group(role);

            let costs = join_all(entry.instances.iter().map(|instance| {
                self.estimate_instance(
                    instance,
                    &entry.group.volumes,
                    zone,
                    surcharge,
                    window,
                    now,
                )
            }))
            .await;

            for (instance, cost) in entry.instances.iter().zip(costs) {
                match cost {
                    Ok(cost) => {
                        estimate.breakdown.add(role, CostCategory::Compute, cost.compute);
                        estimate
                            .breakdown
                            .add(role, CostCategory::Surcharge, cost.surcharge);
                        estimate.breakdown.add(role, CostCategory::Storage, cost.storage);
                        estimate.surcharge_units += cost.surcharge_units;
                    }
                    Err(e) => {
                        warn!(
                            "Problem estimating {} {} ({}) in cluster {}: {}",
                            instance.pricing_mode, instance.kind, instance.id, cluster, e
                        );
                        estimate.degraded.push(DegradedInstance {
                            instance_id: instance.id.clone(),
                            role: role.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        debug!(
            "Cluster {} estimated at ${:.4} ({} degraded instances)",
            cluster,
            estimate.breakdown.total(),
            estimate.degraded.len()
        );
        estimate
    }

    /// List a cluster's groups and instances from `inventory` and price them.
    ///
    /// Clusters that cannot be listed as homogeneous resource groups are
    /// listed as elastic fleets instead; the breakdown is keyed the same way.
    pub async fn estimate_cluster(
        &self,
        inventory: &dyn ClusterInventory,
        descriptor: &ClusterDescriptor,
        surcharge: &SurchargeModel,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<ClusterEstimate> {
        let cluster = &descriptor.id;
        let (groups, mode) = match inventory.list_resource_groups(cluster).await {
            Ok(groups) => (groups, GroupQueryMode::InstanceGroups),
            Err(CostError::UnsupportedQueryMode { .. }) => {
                info!("Cluster {} uses instance fleets", cluster);
                (
                    inventory.list_elastic_fleets(cluster).await?,
                    GroupQueryMode::InstanceFleets,
                )
            }
            Err(e) => return Err(e),
        };

        let mut listed = Vec::with_capacity(groups.len());
        for group in groups {
            let instances = inventory.list_instances(cluster, &group.id, mode).await?;
            listed.push(GroupInventory { group, instances });
        }

        // instances still running at `now` are billed up to now; the
        // cluster end bounds them once it is known
        let now = descriptor.ended_at.map_or(now, |ended| ended.min(now));
        Ok(self
            .estimate_groups(cluster, &listed, &descriptor.zone, surcharge, window, now)
            .await)
    }
}
