//! Output formatting module for clustercost
//!
//! This module provides formatters for displaying estimates in different formats:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and integration with other tools
//!
//! # Examples
//!
//! ```
//! use clustercost::aggregation::ClusterEstimate;
//! use clustercost::output::get_formatter;
//! use clustercost_core::{ClusterId, CostBreakdown};
//!
//! let estimates = vec![ClusterEstimate::empty(ClusterId::new("j-1"))];
//! let totals = CostBreakdown::add_costs(estimates.iter().map(|e| &e.breakdown));
//!
//! let table = get_formatter(false).format_estimates(&estimates, &totals);
//! assert!(table.contains("j-1"));
//!
//! let json = get_formatter(true).format_estimates(&estimates, &totals);
//! assert!(json.contains("\"clusters\""));
//! ```

use crate::aggregation::ClusterEstimate;
use clustercost_core::breakdown::{CostBreakdown, CostCategory};
use clustercost_core::types::InstanceKind;
use colored::Colorize;
use prettytable::{Cell, Row, Table, format, row};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

/// Catalog view of one instance kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceInfo {
    pub kind: InstanceKind,
    pub on_demand_price: f64,
    pub service_fee: f64,
    pub attributes: BTreeMap<String, String>,
}

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format per-cluster estimates followed by their sum
    fn format_estimates(&self, estimates: &[ClusterEstimate], totals: &CostBreakdown) -> String;

    /// Format the catalog entry of an instance kind
    fn format_instance_info(&self, info: &InstanceInfo) -> String;
}

/// Table formatter for human-readable output
pub struct TableFormatter;

impl TableFormatter {
    /// Format currency with dollar sign
    fn format_currency(amount: f64) -> String {
        format!("${amount:.2}")
    }

    fn group_row(cluster: &str, role: &str, costs: &CostBreakdown) -> Row {
        let compute = costs.category(role, CostCategory::Compute);
        let surcharge = costs.category(role, CostCategory::Surcharge);
        let storage = costs.category(role, CostCategory::Storage);
        row![
            cluster,
            role,
            r -> Self::format_currency(compute),
            r -> Self::format_currency(surcharge),
            r -> Self::format_currency(storage),
            r -> Self::format_currency(compute + surcharge + storage)
        ]
    }

    fn format_totals_row(totals: &CostBreakdown) -> Row {
        let sum = |category| {
            totals
                .groups()
                .iter()
                .map(|role| totals.category(role, category))
                .sum::<f64>()
        };
        row![
            b -> "TOTAL",
            "",
            b -> Self::format_currency(sum(CostCategory::Compute)),
            b -> Self::format_currency(sum(CostCategory::Surcharge)),
            b -> Self::format_currency(sum(CostCategory::Storage)),
            b -> Self::format_currency(totals.total())
        ]
    }
}

impl OutputFormatter for TableFormatter {
    fn format_estimates(&self, estimates: &[ClusterEstimate], totals: &CostBreakdown) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![
            b -> "Cluster",
            b -> "Group",
            b -> "Compute",
            b -> "Surcharge",
            b -> "Storage",
            b -> "Total"
        ]);

        for estimate in estimates {
            for role in estimate.breakdown.groups() {
                table.add_row(Self::group_row(
                    estimate.cluster.as_str(),
                    role,
                    &estimate.breakdown,
                ));
            }
        }

        // Add separator
        table.add_row(Row::new(vec![Cell::new(""); 6]));
        table.add_row(Self::format_totals_row(totals));

        let mut output = table.to_string();

        let units: f64 = estimates.iter().map(|e| e.surcharge_units).sum();
        if units > 0.0 {
            output.push_str(&format!("\nCompute units consumed: {units:.3}\n"));
        }

        for estimate in estimates.iter().filter(|e| e.is_degraded()) {
            output.push_str(&format!(
                "\n{}\n",
                format!(
                    "Cluster {}: {} instance(s) could not be estimated, costs are understated",
                    estimate.cluster,
                    estimate.degraded.len()
                )
                .yellow()
            ));
            for degraded in &estimate.degraded {
                output.push_str(&format!(
                    "  {} ({}): {}\n",
                    degraded.instance_id, degraded.role, degraded.reason
                ));
            }
        }

        output
    }

    fn format_instance_info(&self, info: &InstanceInfo) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Attribute", b -> "Value"]);

        table.add_row(row!["instanceType", info.kind]);
        table.add_row(row!["onDemandPrice", r -> format!("${:.4}/h", info.on_demand_price)]);
        table.add_row(row!["serviceFee", r -> format!("${:.4}/h", info.service_fee)]);
        for (name, value) in &info.attributes {
            if name != "instanceType" {
                table.add_row(row![name, value]);
            }
        }

        table.to_string()
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    fn render(value: &serde_json::Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_estimates(&self, estimates: &[ClusterEstimate], totals: &CostBreakdown) -> String {
        let output = json!({
            "clusters": estimates.iter().map(|e| json!({
                "cluster": e.cluster,
                "costs": e.breakdown,
                "surcharge_units": e.surcharge_units,
                "degraded": e.degraded,
            })).collect::<Vec<_>>(),
            "totals": totals,
        });

        Self::render(&output)
    }

    fn format_instance_info(&self, info: &InstanceInfo) -> String {
        Self::render(&json!(info))
    }
}

/// Get the appropriate formatter
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
