//! Compute-unit surcharge tables
//!
//! Two tab-separated tables describe the notebook platform's surcharge:
//!
//! - the rate table: `variant label \t plan \t cost per unit`
//! - the units table: `instance kind \t variant label \t plan \t units per hour`
//!
//! Combining them yields, per instance kind, the units consumed per hour and
//! their cost per hour for every (variant, plan) pair.

use clustercost_core::error::Result;
use clustercost_core::types::InstanceKind;
use clustercost_core::workload::{ServicePlan, WorkloadVariant};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Units per hour and their cost per hour for one (kind, variant, plan)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UnitInfo {
    pub units_per_hour: f64,
    pub cost_per_hour: f64,
}

/// Cost per unit, keyed by (variant, plan)
pub type RateTable = HashMap<(WorkloadVariant, ServicePlan), f64>;

/// Parsed units table
#[derive(Debug, Clone, Default)]
pub struct SurchargeTable {
    entries: HashMap<InstanceKind, HashMap<(WorkloadVariant, ServicePlan), UnitInfo>>,
    pub duplicates: usize,
}

impl SurchargeTable {
    pub fn get(
        &self,
        kind: &InstanceKind,
        variant: WorkloadVariant,
        plan: &ServicePlan,
    ) -> Option<UnitInfo> {
        self.entries
            .get(kind)
            .and_then(|per_kind| per_kind.get(&(variant, plan.clone())))
            .copied()
    }

    /// Number of instance kinds with at least one entry
    pub fn kinds(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_row(line: &str) -> Option<Vec<&str>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.split('\t').map(str::trim).collect())
}

fn parse_number(field: &str, line_no: usize, source: &Path) -> Option<f64> {
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            warn!(
                "Skipping row {} of {}: '{}' is not a number",
                line_no,
                source.display(),
                field
            );
            None
        }
    }
}

/// Parse the rate table.
///
/// Unknown variant labels are an error. Duplicate (variant, plan) rows keep
/// the first rate and are skipped with a warning.
pub fn parse_rates(content: &str, source: &Path) -> Result<RateTable> {
    let mut rates = RateTable::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let Some(fields) = split_row(line) else {
            continue;
        };
        if fields.len() < 3 {
            warn!("Skipping short row {} of {}", line_no, source.display());
            continue;
        }

        let variant = WorkloadVariant::parse_label(fields[0])?;
        let plan = ServicePlan::new(fields[1]);
        let Some(cost) = parse_number(fields[2], line_no, source) else {
            continue;
        };

        if rates.contains_key(&(variant, plan.clone())) {
            warn!(
                "Duplicate rate for {} / {} in {}, keeping the first",
                variant,
                plan,
                source.display()
            );
            continue;
        }
        rates.insert((variant, plan), cost);
    }

    Ok(rates)
}

/// Parse the units table against a rate table.
///
/// Rows whose (variant, plan) has no rate and duplicate rows are skipped
/// with a warning; unknown variant labels are an error.
pub fn parse_units(content: &str, rates: &RateTable, source: &Path) -> Result<SurchargeTable> {
    let mut table = SurchargeTable::default();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let Some(fields) = split_row(line) else {
            continue;
        };
        if fields.len() < 4 {
            warn!("Skipping short row {} of {}", line_no, source.display());
            continue;
        }

        let kind = InstanceKind::new(fields[0]);
        let variant = WorkloadVariant::parse_label(fields[1])?;
        let plan = ServicePlan::new(fields[2]);
        let Some(units_per_hour) = parse_number(fields[3], line_no, source) else {
            continue;
        };

        let Some(rate) = rates.get(&(variant, plan.clone())) else {
            warn!(
                "No unit rate for {} / {}, skipping {} in {}",
                variant,
                plan,
                kind,
                source.display()
            );
            continue;
        };

        let per_kind = table.entries.entry(kind.clone()).or_default();
        if per_kind.contains_key(&(variant, plan.clone())) {
            warn!("Duplicate unit info for {} on {} / {}", kind, variant, plan);
            table.duplicates += 1;
            continue;
        }
        per_kind.insert(
            (variant, plan),
            UnitInfo {
                units_per_hour,
                cost_per_hour: rate * units_per_hour,
            },
        );
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clustercost_core::error::CostError;

    const RATES: &str = "Jobs Compute\tPremium\t0.15\n\
                         Jobs Compute Photon\tpremium\t0.15\n\
                         All-Purpose Compute\tpremium\t0.55\n\
                         Jobs Compute\tstandard\t0.10\n";

    fn source() -> &'static Path {
        Path::new("rates.tsv")
    }

    #[test]
    fn test_parse_rates_normalizes_plan() {
        let rates = parse_rates(RATES, source()).unwrap();
        assert_eq!(rates.len(), 4);
        assert_eq!(
            rates[&(WorkloadVariant::JobStandard, ServicePlan::new("premium"))],
            0.15
        );
    }

    #[test]
    fn test_parse_rates_rejects_unknown_label() {
        let err = parse_rates("Serverless SQL\tpremium\t0.7\n", source()).unwrap_err();
        assert!(matches!(err, CostError::UnknownWorkloadLabel(_)));
    }

    #[test]
    fn test_parse_rates_keeps_first_duplicate() {
        let rates = parse_rates(
            "Jobs Compute\tpremium\t0.15\nJobs Compute\tPREMIUM\t0.99\n",
            source(),
        )
        .unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(
            rates[&(WorkloadVariant::JobStandard, ServicePlan::new("premium"))],
            0.15
        );
    }

    #[test]
    fn test_parse_units_multiplies_rate() {
        let rates = parse_rates(RATES, source()).unwrap();
        let units = "m5.xlarge\tJobs Compute\tpremium\t0.69\n\
                     m5.xlarge\tAll-Purpose Compute\tpremium\t0.69\n\
                     c3.2xlarge\tJobs Compute\tpremium\t1.000\n";
        let table = parse_units(units, &rates, Path::new("units.tsv")).unwrap();

        assert_eq!(table.kinds(), 2);
        let info = table
            .get(
                &InstanceKind::new("m5.xlarge"),
                WorkloadVariant::InteractiveStandard,
                &ServicePlan::new("premium"),
            )
            .unwrap();
        assert_eq!(info.units_per_hour, 0.69);
        assert!((info.cost_per_hour - 0.55 * 0.69).abs() < 1e-12);
    }

    #[test]
    fn test_parse_units_skips_rows_without_rate_and_duplicates() {
        let rates = parse_rates(RATES, source()).unwrap();
        let units = "m5.xlarge\tJobs Light Compute\tpremium\t0.69\n\
                     m5.xlarge\tJobs Compute\tpremium\t0.69\n\
                     m5.xlarge\tJobs Compute\tpremium\t0.75\n\
                     m5.xlarge\tJobs Compute\tpremium\tabc\n";
        let table = parse_units(units, &rates, Path::new("units.tsv")).unwrap();
        let kind = InstanceKind::new("m5.xlarge");
        let plan = ServicePlan::new("premium");

        assert!(table.get(&kind, WorkloadVariant::JobLight, &plan).is_none());
        assert_eq!(
            table
                .get(&kind, WorkloadVariant::JobStandard, &plan)
                .unwrap()
                .units_per_hour,
            0.69
        );
        assert_eq!(table.duplicates, 1);
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let rates = parse_rates("\n# label\tplan\tcost\n\nJobs Compute\tpremium\t0.15\n", source())
            .unwrap();
        assert_eq!(rates.len(), 1);
    }
}
