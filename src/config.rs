//! Engine configuration
//!
//! [`EngineConfig`] collects the settings a cost query depends on and wires
//! the pricing pieces into a [`CostService`].

use crate::aggregation::CostAggregator;
use crate::cli::EngineArgs;
use crate::error::{CostError, Result};
use crate::service::CostService;
use clustercost_core::provider::{ClusterInventory, SpotPriceSource};
use clustercost_core::retry::RetryPolicy;
use clustercost_core::types::{Platform, Region};
use clustercost_core::workload::ServicePlan;
use clustercost_pricing::{CatalogStore, PriceCatalog, SpotPriceInterpolator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// `<data dir>/clustercost/resources`, or `./clustercost/resources` when the
/// platform has no data directory
pub fn default_resources_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clustercost")
        .join("resources")
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub resources: PathBuf,
    pub region: Region,
    pub platform: Platform,
    pub plan: ServicePlan,
    pub retry_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resources: default_resources_dir(),
            region: Region::new("us-east-1"),
            platform: Platform::default(),
            plan: ServicePlan::default(),
            retry_attempts: RetryPolicy::default().max_attempts,
        }
    }
}

impl EngineConfig {
    pub fn from_cli(args: &EngineArgs) -> Result<Self> {
        if args.retry_attempts == 0 {
            return Err(CostError::InvalidArgument(
                "--retry-attempts must be at least 1".to_string(),
            ));
        }
        let region = args.region.trim();
        if region.is_empty() {
            return Err(CostError::Config("region must not be empty".to_string()));
        }

        Ok(Self {
            resources: args.resources.clone().unwrap_or_else(default_resources_dir),
            region: Region::new(region),
            platform: args.platform,
            plan: ServicePlan::new(&args.plan),
            retry_attempts: args.retry_attempts,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.retry_attempts)
    }

    pub fn catalog_store(&self) -> CatalogStore {
        CatalogStore::new(self.resources.clone())
    }

    /// Load the catalog for the configured region
    pub async fn load_catalog(&self) -> Result<Arc<PriceCatalog>> {
        let catalog = self.catalog_store().catalog_for(&self.region).await?;
        debug!(
            "Using {} on-demand prices for {} from {}",
            catalog.on_demand_count(),
            self.region,
            self.resources.display()
        );
        Ok(catalog)
    }

    pub async fn build_service(
        &self,
        inventory: Arc<dyn ClusterInventory>,
        spot_source: Arc<dyn SpotPriceSource>,
    ) -> Result<CostService> {
        let catalog = self.load_catalog().await?;
        let spot = Arc::new(SpotPriceInterpolator::with_retry(
            spot_source,
            self.retry_policy(),
        ));
        Ok(CostService::new(
            inventory,
            CostAggregator::new(catalog, spot),
            self.platform,
            self.plan.clone(),
        ))
    }
}
