//! Error types for clustercost
//!
//! This module defines the error types used throughout the clustercost
//! workspace. All errors are derived from `thiserror` for convenient error
//! handling and automatic `From` implementations.
//!
//! Most missing-data situations (an unknown instance kind, an absent price
//! list) are *not* errors: lookups return a zero sentinel and log a warning.
//! `CostError` covers the cases that have to be surfaced to a caller, and
//! exactly one of them, [`CostError::UnsupportedWorkload`], must never be
//! swallowed because it would silently misclassify a bill.
//!
//! # Example
//!
//! ```
//! use clustercost_core::error::{CostError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to CostError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::ClusterId;

/// Main error type for clustercost operations
#[derive(Error, Debug)]
pub enum CostError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse {
        /// The file that caused the error
        file: PathBuf,
        /// The error message
        error: String,
    },

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Job flag / runtime version combination that maps to no workload variant
    #[error("Unsupported runtime: job flag '{job_flag}' with version '{runtime_version}'")]
    UnsupportedWorkload {
        job_flag: String,
        runtime_version: String,
    },

    /// Workload label in a surcharge table that maps to no variant
    #[error("Unsupported workload label: {0}")]
    UnknownWorkloadLabel(String),

    /// The inventory cannot answer this query mode for the cluster
    #[error("Query mode {mode} not supported for cluster {cluster}")]
    UnsupportedQueryMode { cluster: ClusterId, mode: String },

    /// The inventory has no cluster with this id
    #[error("Unknown cluster: {0}")]
    UnknownCluster(ClusterId),

    /// Error response from an upstream provider API
    #[error("Upstream error {code}: {message}")]
    Upstream { code: String, message: String },

    /// A retried operation kept failing
    #[error("{operation} failed after {attempts} attempts (last delay {last_delay:?})")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_delay: Duration,
        #[source]
        source: Box<CostError>,
    },

    /// An instance or window whose end precedes its start
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Upstream error codes that signal rate limiting rather than a real failure
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "SlowDown",
];

impl CostError {
    /// Whether the error is a transient upstream failure worth retrying.
    ///
    /// Server errors (codes starting with `5`) and throttling responses are
    /// transient; everything else fails immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Upstream { code, .. } => {
                code.starts_with('5') || THROTTLING_CODES.contains(&code.as_str())
            }
            Self::Network(e) => e.is_timeout() || e.status().is_some_and(|s| s.is_server_error()),
            _ => false,
        }
    }

    /// Whether the error must reach the caller instead of degrading to a zero cost
    pub fn is_unsupported_input(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedWorkload { .. } | Self::UnknownWorkloadLabel(_)
        )
    }
}

/// Convenience type alias for Results in clustercost
///
/// # Example
///
/// ```
/// use clustercost_core::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, CostError>;
