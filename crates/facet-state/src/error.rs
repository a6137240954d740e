//! Error types for facet-state operations.

use thiserror::Error;

/// Result type alias for facet-state operations.
pub type FacetResult<T> = Result<T, FacetError>;

/// Errors that can occur during facet-state operations.
#[derive(Debug, Error)]
pub enum FacetError {
    /// Selector string could not be parsed into a property path.
    #[error("malformed path {raw:?}: {reason}")]
    MalformedPath {
        /// The selector as supplied by the caller.
        raw: String,
        /// Why tokenization rejected it.
        reason: &'static str,
    },

    /// Operation attempted through a handle whose store no longer exists.
    #[error("store detached: the owning store has been dropped")]
    DetachedStore,

    /// A mutation payload or initial state whose root is not an object.
    #[error("state root must be an object, found {found}")]
    InvalidStateShape {
        /// The actual root type found.
        found: &'static str,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FacetError {
    /// Create a malformed path error.
    #[inline]
    pub fn malformed_path(raw: impl Into<String>, reason: &'static str) -> Self {
        FacetError::MalformedPath {
            raw: raw.into(),
            reason,
        }
    }

    /// Create an invalid state shape error.
    #[inline]
    pub fn invalid_state_shape(found: &'static str) -> Self {
        FacetError::InvalidStateShape { found }
    }
}

/// Get the type name of a JSON value.
#[inline]
pub fn value_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
