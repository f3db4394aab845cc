//! Error types shared across the sweep.

use std::time::Duration;

use thiserror::Error;

/// Pre-flight configuration failure. The process never starts a cycle with one of these.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more required settings were absent or blank.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid configuration for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Failures talking to the domain registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The record listing could not be fetched; fatal for the cycle.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// A single record update was rejected or never arrived.
    #[error("registry update failed for record {id}: {message}")]
    UpdateFailed { id: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failures inside one engine run. These never leave the executor; each maps to
/// a degraded outcome with a diagnostic summary.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Timeout: Scan took too long.")]
    Timeout(Duration),

    #[error("Error: JSON output file was not generated. Domain unreachable?")]
    OutputMissing,

    #[error("Script Error: {0}")]
    Execution(String),

    #[error("Script Error: malformed engine report: {0}")]
    MalformedReport(#[from] serde_json::Error),
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Execution(err.to_string())
    }
}
