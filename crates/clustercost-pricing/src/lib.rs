//! Price catalogs, surcharge tables, storage and spot pricing for clustercost
//!
//! This crate loads vendor list prices from snapshot files, integrates
//! spot-price histories over arbitrary intervals and prices block storage.
//! It never talks to an inventory; the aggregator in the root crate combines
//! these pieces per instance.

pub mod catalog;
pub mod snapshot_fetcher;
pub mod spot;
pub mod storage;
pub mod surcharge;

pub use catalog::{CatalogStore, ParseStats, PriceCatalog};
pub use snapshot_fetcher::SnapshotFetcher;
pub use spot::{SpotPriceHistory, SpotPriceInterpolator};
pub use storage::StorageCostEstimator;
pub use surcharge::UnitInfo;
