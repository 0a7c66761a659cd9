//! Errors raised by providers and containers

use super::value::PropertyKind;
use thiserror::Error;

/// Result type for property operations
pub type Result<T> = std::result::Result<T, DataError>;

/// Property access and provider bookkeeping errors
///
/// Every variant is a local contract violation reported to the caller; none is
/// recovered from internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// No property with this name exists in the namespace
    #[error("property not found: {name}")]
    PropertyNotFound {
        /// Name that was queried
        name: String,
    },

    /// Typed access against a value of another kind
    #[error("type mismatch for property {name}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Name that was queried
        name: String,
        /// Kind requested by the caller
        expected: PropertyKind,
        /// Kind actually stored
        found: PropertyKind,
    },

    /// Provider attach/detach contract violated
    #[error("invalid provider state: {0}")]
    InvalidProviderState(String),

    /// Write to a synthetic property maintained by the container
    #[error("property is read-only: {name}")]
    ReadOnlyProperty {
        /// Name that was written
        name: String,
    },

    /// Operation on a z-sorter that has been disposed
    #[error("z-sorter has been disposed")]
    SorterDisposed,
}

impl DataError {
    pub(crate) fn not_found(name: &str) -> Self {
        Self::PropertyNotFound {
            name: name.to_owned(),
        }
    }

    pub(crate) fn mismatch(name: &str, expected: PropertyKind, found: PropertyKind) -> Self {
        Self::TypeMismatch {
            name: name.to_owned(),
            expected,
            found,
        }
    }
}
