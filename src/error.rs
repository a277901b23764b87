//! Error types for the cluster manager.

use thiserror::Error;

/// Errors produced by geocluster operations.
///
/// Malformed geohash keys are *not* errors at the codec level (decoding yields
/// `None`); this type covers misuse of the index, rejected input and
/// configuration problems.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Input rejected before it reached the index (e.g. non-finite coordinates).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A key that must be a valid geobox key was malformed.
    #[error("invalid geohash key: {0:?}")]
    InvalidGeohash(String),

    /// Two geoboxes from different precisions were passed to a merge.
    #[error("cannot merge geoboxes of different precisions ({left} vs {right})")]
    PrecisionMismatch { left: usize, right: usize },

    /// A geobox was merged into itself.
    #[error("cannot merge geobox {0:?} into itself")]
    SelfMerge(String),

    /// A merge referenced a geobox that holds no cell.
    #[error("no cluster cell for geobox {0:?}")]
    MissingCell(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Encoding or decoding of an external representation failed.
    #[error("serialization error: {0}")]
    SerializationErrorWithContext(String),
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationErrorWithContext(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
