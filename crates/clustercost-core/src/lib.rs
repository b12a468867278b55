//! Core types, traits, and utilities for clustercost
//!
//! This crate provides the foundational types, error handling, cost
//! breakdown, workload classification, provider traits and retry policy
//! used by all other clustercost crates.

pub mod breakdown;
pub mod error;
pub mod provider;
pub mod retry;
pub mod types;
pub mod workload;

// Re-export commonly used types
pub use breakdown::{CostBreakdown, CostCategory};
pub use error::{CostError, Result};
pub use provider::{ClusterInventory, SpotPricePage, SpotPriceSource};
pub use retry::RetryPolicy;
pub use types::{
    ClusterDescriptor, ClusterId, ClusterState, GroupId, GroupQueryMode, Instance, InstanceKind,
    Platform, PricingMode, Region, ResourceGroup, RuntimeSignals, TimeWindow, VolumeSpec, Zone,
};
pub use workload::{ServicePlan, WorkloadVariant};
