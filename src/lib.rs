//! clustercost - Estimate list-price costs of compute clusters
//!
//! This library provides functionality to:
//! - Load vendor price list snapshots and surcharge tables per region
//! - Integrate spot-price histories over each instance's lifetime
//! - Price block storage attached to instances
//! - Aggregate per-instance costs into flat `<group>.<category>` breakdowns
//! - Memoize results of terminated clusters
//!
//! # Examples
//!
//! ```no_run
//! use clustercost::{
//!     config::EngineConfig,
//!     snapshot::{InventorySnapshot, RecordedSpotPrices},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> clustercost::Result<()> {
//!     let inventory = InventorySnapshot::load("clusters.json".as_ref())?;
//!     let spot = RecordedSpotPrices::load("spot.json".as_ref())?;
//!
//!     let service = EngineConfig::default()
//!         .build_service(Arc::new(inventory), Arc::new(spot))
//!         .await?;
//!     let costs = service.selection_cost("(j-1|j-2)").await?;
//!     println!("TOTAL = {:.2}", costs.total());
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cache;
pub mod cli;
pub mod config;
pub mod output;
pub mod service;
pub mod snapshot;

pub use clustercost_core::error;

// Re-export commonly used types
pub use clustercost_core::{ClusterId, CostBreakdown, CostError, Result};
pub use service::CostService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
