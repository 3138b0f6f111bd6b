//! Persistent array store.
//!
//! An array is saved as two sibling files sharing a stem: `<stem>.json`
//! holds name, kind, axes and samples; `<stem>.metadata.json` holds the
//! attribute map as a flat JSON object.

pub mod artifact;
pub mod layout;

use std::path::PathBuf;

use crate::models::ArrayError;

pub use artifact::{exists, payload_path, read, sidecar_path, write, StoredElement};
pub use layout::{check_component, ArrayStore, COMBINED_STEM};

/// Errors from the array store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// One of the two artifacts is absent.
    #[error("No stored artifact at {0}")]
    NotFound(PathBuf),

    /// An artifact exists but could not be parsed.
    #[error("Malformed artifact {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An artifact parsed but describes an inconsistent array.
    #[error("Inconsistent artifact {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ArrayError,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON cannot represent NaN or infinities.
    #[error("Non-finite sample at flat index {index} for {path}")]
    NonFinite { path: PathBuf, index: usize },

    /// A float attribute or coordinate cannot be represented in JSON.
    #[error("Non-finite value in '{field}' for {path}")]
    NonFiniteField { path: PathBuf, field: String },

    #[error("Invalid path component '{0}'")]
    InvalidComponent(String),

    #[error(transparent)]
    Array(#[from] ArrayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for a plain cache miss, as opposed to a damaged artifact.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
