//! Error types for the hemp_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hemp_core operations
///
/// Every variant is fatal to a simulation run. Imbalances are reported
/// separately as [`crate::ImbalanceWarning`] values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A ledger key that was never written (or was already retired)
    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    /// A component name outside the fixed schema
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// Rule or configuration parameter outside its valid domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Composition weights that do not sum to one
    #[error("Invalid composition: {0}")]
    InvalidComposition(String),

    /// Moisture target that would require adding water
    #[error(
        "Moisture target {target} unreachable for {stream} (current moisture content {current:.6})"
    )]
    MoistureTargetUnreachable {
        stream: String,
        target: f64,
        current: f64,
    },

    /// A computed component mass below zero
    #[error("Negative quantity in {record}: {component} = {value}")]
    NegativeQuantity {
        record: String,
        component: String,
        value: f64,
    },

    /// Write to a record created by an earlier stage
    #[error("Record {0} was sealed by an earlier stage")]
    SealedRecord(String),

    /// Stage wiring error (read before write, dangling intermediates, ...)
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
