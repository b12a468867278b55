//! Core domain types for clustercost
//!
//! This module contains the fundamental types used throughout the workspace.
//! These types provide strong typing for instance kinds, cluster and group
//! identifiers, zones, regions, and the inventory records that the cost
//! engine consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strongly-typed instance kind wrapper (e.g. `m5.xlarge`)
///
/// Instance kinds correlate to on-demand/spot prices as well as hardware
/// attributes, and are used as lookup keys in every price index.
///
/// # Examples
/// ```
/// use clustercost_core::types::InstanceKind;
///
/// let kind = InstanceKind::new("m5.xlarge");
/// assert_eq!(kind.as_str(), "m5.xlarge");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceKind(String);

impl InstanceKind {
    /// Create a new InstanceKind from any string-like type
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cluster identifier (e.g. `j-2AXXXXXXGAPLF`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Create a new ClusterId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ClusterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resource group (or fleet) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Availability zone (e.g. `us-east-1a`); spot prices are quoted per zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(String);

impl Zone {
    pub fn new(zone: impl Into<String>) -> Self {
        Self(zone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Geographic region (e.g. `us-east-1`); price catalogs are built per region
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an instance is billed for raw compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingMode {
    /// Fixed hourly list price
    OnDemand,
    /// Fluctuating spot-market price, integrated over the run
    Spot,
}

impl fmt::Display for PricingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnDemand => write!(f, "ON_DEMAND"),
            Self::Spot => write!(f, "SPOT"),
        }
    }
}

impl FromStr for PricingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "ON_DEMAND" => Ok(Self::OnDemand),
            "SPOT" => Ok(Self::Spot),
            _ => Err(format!("Invalid pricing mode: {s}")),
        }
    }
}

/// Cluster lifecycle state as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Starting,
    Bootstrapping,
    Running,
    Waiting,
    Terminating,
    Terminated,
    TerminatedWithErrors,
}

impl ClusterState {
    /// Terminal clusters can no longer accrue cost, so their estimates are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::TerminatedWithErrors)
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Starting => "STARTING",
            Self::Bootstrapping => "BOOTSTRAPPING",
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::TerminatedWithErrors => "TERMINATED_WITH_ERRORS",
        };
        write!(f, "{label}")
    }
}

/// Vendor platform whose surcharge model applies
///
/// # Examples
/// ```
/// use clustercost_core::types::Platform;
/// use std::str::FromStr;
///
/// assert_eq!(Platform::from_str("databricks").unwrap(), Platform::Databricks);
/// assert_eq!(Platform::Emr.to_string(), "emr");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Managed Hadoop clusters: flat per-instance service fee
    #[default]
    Emr,
    /// Notebook platform clusters: compute-unit surcharge by workload variant
    Databricks,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emr => write!(f, "emr"),
            Self::Databricks => write!(f, "databricks"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emr" | "aws_emr" => Ok(Self::Emr),
            "databricks" | "dbx" | "aws_dbx" => Ok(Self::Databricks),
            _ => Err(format!("Invalid platform: {s}")),
        }
    }
}

/// Inventory query mode for listing a cluster's resource groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupQueryMode {
    /// Homogeneous instance groups
    InstanceGroups,
    /// Elastic instance fleets
    InstanceFleets,
}

impl fmt::Display for GroupQueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceGroups => write!(f, "instance-groups"),
            Self::InstanceFleets => write!(f, "instance-fleets"),
        }
    }
}

/// A declared block-storage volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Volume type tag (e.g. `gp3`)
    pub volume_type: String,
    /// Size in GiB
    pub size_gib: u32,
}

impl VolumeSpec {
    pub fn new(volume_type: impl Into<String>, size_gib: u32) -> Self {
        Self {
            volume_type: volume_type.into(),
            size_gib,
        }
    }
}

/// A named, role-tagged collection of homogeneous instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    /// Group or fleet id
    pub id: GroupId,
    /// Role tag used as the breakdown key prefix (e.g. `MASTER`, `CORE`, `TASK`)
    pub role: String,
    /// Instance kind the group was declared with
    pub instance_kind: InstanceKind,
    /// Extra volumes attached to every instance in the group
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
}

/// One running (or terminated) compute unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Provider instance id, used to report degraded estimates
    pub id: String,
    pub kind: InstanceKind,
    pub pricing_mode: PricingMode,
    pub created_at: DateTime<Utc>,
    /// `None` while the instance is still running
    #[serde(default)]
    pub terminated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
}

impl Instance {
    /// End of the billable interval, using `now` for running instances
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.terminated_at.unwrap_or(now)
    }

    pub fn is_running(&self) -> bool {
        self.terminated_at.is_none()
    }
}

/// Raw signals from which a workload variant is derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSignals {
    /// "true"/"false" scheduled-job flag as reported upstream
    pub job_flag: String,
    /// Runtime version string, possibly carrying feature markers
    pub runtime_version: String,
}

/// Cluster metadata as described by the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub id: ClusterId,
    #[serde(default)]
    pub name: String,
    pub state: ClusterState,
    /// Availability zone the cluster's instances run in
    pub zone: Zone,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub runtime: Option<RuntimeSignals>,
}

impl ClusterDescriptor {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Cluster runtime, using `now` as the end for active clusters
    pub fn runtime_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.ended_at.unwrap_or(now) - self.created_at
    }
}

/// Optional bounds applied to every instance's billable interval
///
/// # Examples
/// ```
/// use clustercost_core::types::TimeWindow;
/// use chrono::{TimeZone, Utc};
///
/// let window = TimeWindow::unbounded();
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
/// assert_eq!(window.clip(start, end), Some((start, end)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Intersect `[from, to)` with the window, `None` if nothing remains
    pub fn clip(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let from = self.start.map_or(from, |s| s.max(from));
        let to = self.end.map_or(to, |e| e.min(to));
        (from < to).then_some((from, to))
    }
}

/// Seconds between two timestamps, with sub-second precision
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

/// Cost of running `seconds` at an hourly price
pub fn normalized_cost(seconds: f64, hourly_price: f64) -> f64 {
    seconds * hourly_price / 3600.0
}
