//! Workload variants and service plans for compute-unit surcharges
//!
//! The notebook platform bills a per-unit surcharge whose rate depends on
//! what kind of workload a cluster runs. The variant is derived from two
//! signals reported by the platform: a "scheduled job" flag and the runtime
//! version string.

use crate::error::{CostError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of workload variants a cluster can be billed as
///
/// # Examples
/// ```
/// use clustercost_core::workload::WorkloadVariant;
///
/// let variant = WorkloadVariant::determine("true", "13.3.x-photon-scala2.12").unwrap();
/// assert_eq!(variant, WorkloadVariant::JobAccelerated);
/// assert_eq!(variant.label(), "Jobs Compute Photon");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkloadVariant {
    JobStandard,
    JobAccelerated,
    JobLight,
    InteractiveStandard,
    InteractiveAccelerated,
}

impl WorkloadVariant {
    /// All variants, in table order
    pub const ALL: [WorkloadVariant; 5] = [
        Self::JobStandard,
        Self::JobAccelerated,
        Self::JobLight,
        Self::InteractiveStandard,
        Self::InteractiveAccelerated,
    ];

    /// Derive the variant from the job flag and runtime version.
    ///
    /// The flag is compared case-insensitively after trimming. A runtime
    /// version mentioning `photon` selects the accelerated variant; for
    /// scheduled jobs, one mentioning `light` selects the light variant.
    /// Any other flag value is an error.
    pub fn determine(job_flag: &str, runtime_version: &str) -> Result<Self> {
        let version = runtime_version.to_lowercase();
        let accelerated = version.contains("photon");

        match job_flag.trim().to_lowercase().as_str() {
            "true" if accelerated => Ok(Self::JobAccelerated),
            "true" if version.contains("light") => Ok(Self::JobLight),
            "true" => Ok(Self::JobStandard),
            "false" if accelerated => Ok(Self::InteractiveAccelerated),
            "false" => Ok(Self::InteractiveStandard),
            _ => Err(CostError::UnsupportedWorkload {
                job_flag: job_flag.to_string(),
                runtime_version: runtime_version.to_string(),
            }),
        }
    }

    /// Display label used in the surcharge tables
    pub fn label(&self) -> &'static str {
        match self {
            Self::JobStandard => "Jobs Compute",
            Self::JobAccelerated => "Jobs Compute Photon",
            Self::JobLight => "Jobs Light Compute",
            Self::InteractiveStandard => "All-Purpose Compute",
            Self::InteractiveAccelerated => "All-Purpose Compute Photon",
        }
    }

    /// Parse a surcharge-table label back into a variant, ignoring case
    pub fn parse_label(label: &str) -> Result<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(label))
            .ok_or_else(|| CostError::UnknownWorkloadLabel(label.to_string()))
    }

    pub fn is_job(&self) -> bool {
        matches!(
            self,
            Self::JobStandard | Self::JobAccelerated | Self::JobLight
        )
    }
}

impl fmt::Display for WorkloadVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for WorkloadVariant {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_label(s)
    }
}

/// Subscription plan of the notebook platform (e.g. `premium`)
///
/// Plans are normalized to lowercase so table rows and CLI arguments compare
/// equal regardless of case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServicePlan(String);

impl ServicePlan {
    pub fn new(plan: impl AsRef<str>) -> Self {
        Self(plan.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ServicePlan {
    fn default() -> Self {
        Self::new("premium")
    }
}

impl fmt::Display for ServicePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServicePlan {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}
