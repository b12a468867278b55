//! CLI interface for clustercost
//!
//! Engine settings (resources directory, region, platform, plan, retry
//! attempts) are global flags with environment fallbacks; the subcommand
//! selects what to do with them.
//!
//! # Example
//!
//! ```bash
//! # Download price lists for two regions
//! clustercost fetch-prices us-east-1,eu-west-1
//!
//! # Estimate every cluster in a recorded inventory
//! clustercost estimate --inventory clusters.json --spot-prices spot.json
//!
//! # Only the part of two clusters' lifetime that fell in January
//! clustercost --platform databricks estimate -i clusters.json \
//!     --clusters "(0101-abc|0102-def)" --since 2024-01-01 --until 2024-02-01 --json
//! ```

use crate::error::{CostError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use clustercost_core::types::{Platform, TimeWindow};
use std::path::PathBuf;

/// Estimate list-price costs of compute clusters
#[derive(Parser, Debug, Clone)]
#[command(name = "clustercost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Only show warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every command
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Directory holding price list snapshots and surcharge tables
    #[arg(long, env = "CLUSTERCOST_RESOURCES", global = true)]
    pub resources: Option<PathBuf>,

    /// Region whose price lists are used
    #[arg(long, env = "CLUSTERCOST_REGION", default_value = "us-east-1", global = true)]
    pub region: String,

    /// Vendor platform (emr or databricks)
    #[arg(long, env = "CLUSTERCOST_PLATFORM", default_value = "emr", global = true)]
    pub platform: Platform,

    /// Service plan for compute-unit surcharges
    #[arg(long, env = "CLUSTERCOST_PLAN", default_value = "premium", global = true)]
    pub plan: String,

    /// Attempts per spot-price page before giving up
    #[arg(long, default_value = "5", global = true)]
    pub retry_attempts: u32,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Estimate cluster costs from a recorded inventory
    Estimate {
        /// Inventory snapshot (JSON, or a .gz next to it)
        #[arg(long, short = 'i')]
        inventory: PathBuf,

        /// Recorded spot-price observations
        #[arg(long)]
        spot_prices: Option<PathBuf>,

        /// Cluster selection, `(id1|id2)` or a single id; all clusters if omitted
        #[arg(long, short = 'c')]
        clusters: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Only count usage from this time on (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only count usage before this time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
    },

    /// Download price list snapshots into the resources directory
    FetchPrices {
        /// Regions to fetch, comma separated; `*` for every known region
        #[arg(default_value = "*")]
        regions: Vec<String>,
    },

    /// Show catalog attributes of an instance kind
    InstanceInfo {
        /// Instance kind, e.g. m5.xlarge
        kind: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parse an RFC 3339 timestamp or a YYYY-MM-DD date (midnight UTC)
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            CostError::InvalidArgument(format!(
                "Invalid timestamp '{value}', expected RFC 3339 or YYYY-MM-DD"
            ))
        })
}

/// Build a time window from optional `--since` / `--until` values
pub fn parse_window(since: Option<&str>, until: Option<&str>) -> Result<TimeWindow> {
    let start = since.map(parse_timestamp).transpose()?;
    let end = until.map(parse_timestamp).transpose()?;
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(CostError::InvalidInterval(format!(
                "--until {e} is before --since {s}"
            )));
        }
    }
    Ok(TimeWindow::new(start, end))
}
