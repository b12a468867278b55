//! Block-storage cost estimation
//!
//! Volume prices are quoted per GB-month; volumes are declared in GiB and
//! billed per hour of runtime.

use clustercost_core::types::VolumeSpec;
use tracing::warn;

/// Hours in a billing month
pub const HOURS_PER_MONTH: f64 = 720.0;

/// GB to GiB conversion applied to declared sizes
pub const GIB_FACTOR: f64 = 0.931323;

/// Size of the root volume every instance carries
pub const ROOT_VOLUME_GIB: u32 = 15;

/// Volume type the root volume is billed as
pub const ROOT_VOLUME_TYPE: &str = "gp2";

/// Per-GB-month list price for a volume type, `None` when unknown
pub fn rate_per_gb_month(volume_type: &str) -> Option<f64> {
    match volume_type {
        "gp2" => Some(0.10),
        "gp3" => Some(0.08),
        "io1" | "io2" => Some(0.125),
        "standard" => Some(0.05),
        "st1" => Some(0.045),
        "sc1" => Some(0.015),
        _ => None,
    }
}

/// Pure storage cost estimator
///
/// # Examples
/// ```
/// use clustercost_pricing::storage::StorageCostEstimator;
///
/// let cost = StorageCostEstimator::volume_cost(720.0, "gp2", 100);
/// assert!((cost - 100.0 * 0.10 * 0.931323).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageCostEstimator;

impl StorageCostEstimator {
    /// Cost of one volume over `hours`; unknown types cost 0
    pub fn volume_cost(hours: f64, volume_type: &str, size_gib: u32) -> f64 {
        match rate_per_gb_month(volume_type) {
            Some(rate) => f64::from(size_gib) * rate * GIB_FACTOR * hours / HOURS_PER_MONTH,
            None => {
                warn!("Unknown volume type {}, storage cost counted as 0", volume_type);
                0.0
            }
        }
    }

    /// Cost of the fixed root volume over `hours`
    pub fn root_volume_cost(hours: f64) -> f64 {
        Self::volume_cost(hours, ROOT_VOLUME_TYPE, ROOT_VOLUME_GIB)
    }

    /// Root volume plus every declared volume
    pub fn instance_storage_cost(hours: f64, volumes: &[VolumeSpec]) -> f64 {
        volumes
            .iter()
            .map(|v| Self::volume_cost(hours, &v.volume_type, v.size_gib))
            .sum::<f64>()
            + Self::root_volume_cost(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_rates() {
        assert_eq!(rate_per_gb_month("gp2"), Some(0.10));
        assert_eq!(rate_per_gb_month("gp3"), Some(0.08));
        assert_eq!(rate_per_gb_month("io1"), Some(0.125));
        assert_eq!(rate_per_gb_month("io2"), Some(0.125));
        assert_eq!(rate_per_gb_month("standard"), Some(0.05));
        assert_eq!(rate_per_gb_month("st1"), Some(0.045));
        assert_eq!(rate_per_gb_month("sc1"), Some(0.015));
        assert_eq!(rate_per_gb_month("GP2"), None);
    }

    #[test]
    fn test_unknown_type_costs_nothing() {
        assert_eq!(StorageCostEstimator::volume_cost(10.0, "magnetic-tape", 500), 0.0);
    }

    #[test]
    fn test_volume_formula() {
        let cost = StorageCostEstimator::volume_cost(3.0, "gp3", 64);
        let expected = 64.0 * 0.08 * 0.931323 * 3.0 / 720.0;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_root_volume() {
        let cost = StorageCostEstimator::root_volume_cost(1.0);
        assert!((cost - 15.0 * 0.1 * 0.931323 / 720.0).abs() < 1e-12);
        assert_eq!(StorageCostEstimator::root_volume_cost(0.0), 0.0);
    }

    #[test]
    fn test_instance_storage_includes_root_once() {
        let volumes = vec![VolumeSpec::new("gp2", 32), VolumeSpec::new("gp2", 32)];
        let cost = StorageCostEstimator::instance_storage_cost(2.0, &volumes);
        let expected = (32.0 + 32.0 + 15.0) * 0.1 * 0.931323 * 2.0 / 720.0;
        assert!((cost - expected).abs() < 1e-12);
    }
}
