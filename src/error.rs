//! Error types for Wayfinder

use thiserror::Error;

/// Wayfinder error type
///
/// Every variant is recoverable at the boundary of the navigation core.
/// Stale estimates are not errors; they travel as a flag on
/// [`crate::PositionEstimate`] and [`crate::NavigationState`].
#[derive(Error, Debug)]
pub enum WayfinderError {
    /// Requested node or path does not exist in the graph
    #[error("Not found: {0}")]
    NotFound(String),

    /// A position was requested before an anchor was established
    #[error("Estimator is uncalibrated: waiting for an initial fix or anchor")]
    Uncalibrated,

    /// An explicit call was given unusable values (non-finite or out of range)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be parsed or is out of range
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for WayfinderError {
    fn from(e: serde_yaml::Error) -> Self {
        WayfinderError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WayfinderError>;
