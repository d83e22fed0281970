//! Crate-wide error type shared by the document model, catalog, cache, and
//! evaluator layers. The clause transformer has its own richer error enum in
//! [`crate::transform::errors`] and converts into this type at the API edge.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the non-transformer layers.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A document payload would not fit the 28-bit entry length field.
    #[error("container payload exceeds the maximum of {max} bytes")]
    ContainerTooLarge {
        /// Largest representable payload size.
        max: u32,
    },
    /// A serialized document failed structural validation.
    #[error("corrupt document: {0}")]
    CorruptDocument(&'static str),
    /// A scalar was cast to an incompatible type.
    #[error("cannot cast {from} to {to}")]
    InvalidTypeCast {
        /// Source type name.
        from: &'static str,
        /// Target type name.
        to: &'static str,
    },
    /// A catalog lookup missed.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// A vertex label was used where an edge label was required, or vice
    /// versa.
    #[error("label '{label}' is a {actual} label, not a {expected} label")]
    LabelKindMismatch {
        /// Offending label name.
        label: String,
        /// Kind recorded in the catalog.
        actual: &'static str,
        /// Kind the caller required.
        expected: &'static str,
    },
    /// The host signalled cooperative cancellation.
    #[error("query cancelled")]
    Cancelled,
    /// A serialization step failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// An internal invariant was violated; intentionally terminal.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(&'static str),
}
