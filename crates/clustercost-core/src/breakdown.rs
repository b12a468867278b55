//! Hierarchical cost breakdown
//!
//! A [`CostBreakdown`] is the stable output contract of the engine: a flat,
//! string-keyed map whose keys are `<group>.<category>` plus a `TOTAL` entry
//! holding the sum of every category. Breakdowns are additive, so totals for
//! several clusters are simply the entrywise sum over the key union.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Key holding the sum of all categories
pub const TOTAL: &str = "TOTAL";

/// Roles present in the empty breakdown returned for failed estimates
pub const DEFAULT_ROLES: [&str; 2] = ["MASTER", "CORE"];

/// Cost category within a resource group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostCategory {
    /// Raw on-demand or spot compute
    Compute,
    /// Vendor software fee or compute-unit surcharge
    Surcharge,
    /// Attached block storage, including the root volume
    Storage,
}

impl CostCategory {
    pub const ALL: [CostCategory; 3] = [Self::Compute, Self::Surcharge, Self::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "COMPUTE",
            Self::Surcharge => "SURCHARGE",
            Self::Storage => "STORAGE",
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Breakdown key for a group role and category
pub fn breakdown_key(role: &str, category: CostCategory) -> String {
    format!("{role}.{category}")
}

/// Flat `<group>.<category>` → USD map with a `TOTAL` entry
///
/// # Examples
/// ```
/// use clustercost_core::breakdown::{CostBreakdown, CostCategory};
///
/// let mut costs = CostBreakdown::new();
/// costs.add("MASTER", CostCategory::Compute, 1.5);
/// costs.add("MASTER", CostCategory::Storage, 0.5);
/// assert_eq!(costs.total(), 2.0);
/// assert_eq!(costs.get("MASTER.COMPUTE"), 1.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostBreakdown {
    entries: BTreeMap<String, f64>,
}

impl Default for CostBreakdown {
    fn default() -> Self {
        Self::new()
    }
}

impl CostBreakdown {
    /// Breakdown containing only `TOTAL = 0`
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(TOTAL.to_string(), 0.0);
        Self { entries }
    }

    /// Breakdown with every category of each role present and zero
    pub fn with_groups<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut breakdown = Self::new();
        for role in roles {
            breakdown.ensure_group(role.as_ref());
        }
        breakdown
    }

    /// The structurally valid result returned when a cluster cannot be estimated
    pub fn empty_cluster() -> Self {
        Self::with_groups(DEFAULT_ROLES)
    }

    /// Make sure all three category keys of `role` exist
    pub fn ensure_group(&mut self, role: &str) {
        for category in CostCategory::ALL {
            self.entries
                .entry(breakdown_key(role, category))
                .or_insert(0.0);
        }
    }

    /// Add `amount` to a group's category and to `TOTAL`
    pub fn add(&mut self, role: &str, category: CostCategory, amount: f64) {
        self.ensure_group(role);
        *self
            .entries
            .entry(breakdown_key(role, category))
            .or_insert(0.0) += amount;
        *self.entries.entry(TOTAL.to_string()).or_insert(0.0) += amount;
    }

    /// Amount stored under `key`, 0 when absent
    pub fn get(&self, key: &str) -> f64 {
        self.entries.get(key).copied().unwrap_or(0.0)
    }

    pub fn category(&self, role: &str, category: CostCategory) -> f64 {
        self.get(&breakdown_key(role, category))
    }

    pub fn total(&self) -> f64 {
        self.get(TOTAL)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Distinct group roles, in key order
    pub fn groups(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self
            .entries
            .keys()
            .filter_map(|k| k.rsplit_once('.').map(|(role, _)| role))
            .collect();
        roles.dedup();
        roles
    }

    /// Entrywise sum over the key union of several breakdowns
    pub fn add_costs<'a, I>(breakdowns: I) -> Self
    where
        I: IntoIterator<Item = &'a CostBreakdown>,
    {
        let mut sum = Self::new();
        for breakdown in breakdowns {
            sum += breakdown;
        }
        sum
    }

    pub fn into_inner(self) -> BTreeMap<String, f64> {
        self.entries
    }
}

impl From<BTreeMap<String, f64>> for CostBreakdown {
    fn from(mut entries: BTreeMap<String, f64>) -> Self {
        entries.entry(TOTAL.to_string()).or_insert(0.0);
        Self { entries }
    }
}

impl AddAssign<&CostBreakdown> for CostBreakdown {
    fn add_assign(&mut self, other: &CostBreakdown) {
        for (key, value) in &other.entries {
            *self.entries.entry(key.clone()).or_insert(0.0) += value;
        }
    }
}

impl AddAssign for CostBreakdown {
    fn add_assign(&mut self, other: CostBreakdown) {
        *self += &other;
    }
}

impl Add for CostBreakdown {
    type Output = CostBreakdown;

    fn add(mut self, other: CostBreakdown) -> CostBreakdown {
        self += &other;
        self
    }
}

impl Sum for CostBreakdown {
    fn sum<I: Iterator<Item = CostBreakdown>>(iter: I) -> Self {
        iter.fold(Self::new(), Add::add)
    }
}
