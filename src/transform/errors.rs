//! Structured errors emitted by the clause transformer.
//!
//! Every error is fatal to the current clause transformation; recovery is
//! limited to dropping the scopes built so far. Errors carry the source
//! position when the parser tracked one, and expose a machine-readable
//! code so hosts can distinguish failure classes without string matching.

use std::fmt;

use thiserror::Error;

use crate::ast::Location;

/// Result alias for transformer entry points.
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Failure classes of the clause transformer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// `DELETE`/`SET`/`REMOVE` opened the statement.
    #[error("{clause} cannot be the first clause in a query")]
    FirstClauseIllegal {
        /// Offending clause keyword.
        clause: &'static str,
    },
    /// A name was referenced before being bound.
    #[error("variable `{name}` does not exist")]
    UndefinedVariable {
        /// The unbound name.
        name: String,
    },
    /// A bound name was re-declared with a new label or new properties.
    #[error("variable `{name}` already exists")]
    VariableRedeclared {
        /// The re-declared name.
        name: String,
    },
    /// An `UNWIND` alias shadows an existing output column.
    #[error("duplicate variable `{name}`")]
    DuplicateAlias {
        /// The shadowing alias.
        name: String,
    },
    /// An undirected relationship appeared in `CREATE`.
    #[error("only directed relationships are allowed in CREATE")]
    DirectedRelationshipRequired,
    /// A `CREATE`/`MERGE` relationship is missing its label.
    #[error("relationships must specify a label in {clause}")]
    EdgeLabelRequired {
        /// Offending clause keyword.
        clause: &'static str,
    },
    /// `CREATE` properties were supplied as a parameter.
    #[error("properties in a CREATE clause as a parameter are not supported")]
    ParameterPropertiesUnsupported,
    /// A property accessor with more than one segment in `SET`/`REMOVE`.
    #[error("{clause} only supports one-level property updates")]
    NestedPropertyUpdateUnsupported {
        /// Offending clause keyword.
        clause: &'static str,
    },
    /// `+=`-style property map addition.
    #[error("{clause} does not support adding properties from maps")]
    AddPropertiesFromMapUnsupported {
        /// Offending clause keyword.
        clause: &'static str,
    },
    /// `ORDER BY` over a `UNION` named an expression outside the output
    /// columns.
    #[error("invalid UNION ORDER BY clause: only result column names can be used")]
    InvalidUnionOrderBy,
    /// A recursive common-table-expression context reached the union top.
    #[error("recursive CTEs are not supported")]
    RecursiveCteUnsupported,
    /// The two legs of a `UNION` expose different column counts.
    #[error("each UNION query must have the same number of columns (left has {left}, right has {right})")]
    UnionColumnMismatch {
        /// Left leg arity.
        left: usize,
        /// Right leg arity.
        right: usize,
    },
    /// No common type exists for a `UNION` output column.
    #[error("UNION column {column} cannot be resolved to a common type")]
    InvalidTypeCast {
        /// 1-based column position.
        column: usize,
    },
    /// A vertex label was used for an edge, or vice versa.
    #[error("label `{label}` is for {actual}s, not {expected}s")]
    LabelKindMismatch {
        /// Offending label name.
        label: String,
        /// Kind recorded in the catalog.
        actual: &'static str,
        /// Kind the pattern required.
        expected: &'static str,
    },
    /// A catalog lookup missed.
    #[error("label `{label}` does not exist")]
    NotFound {
        /// The missing label name.
        label: String,
    },
    /// `SKIP`/`LIMIT` referenced variables of the current query level.
    #[error("argument of {construct} must not contain variables")]
    InvalidSkipLimit {
        /// `SKIP` or `LIMIT`.
        construct: &'static str,
    },
    /// An internal invariant was violated; intentionally terminal.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(&'static str),
}

impl ErrorKind {
    /// Machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::FirstClauseIllegal { .. } => "FirstClauseIllegal",
            ErrorKind::UndefinedVariable { .. } => "UndefinedVariable",
            ErrorKind::VariableRedeclared { .. } => "VariableRedeclared",
            ErrorKind::DuplicateAlias { .. } => "DuplicateAlias",
            ErrorKind::DirectedRelationshipRequired => "DirectedRelationshipRequired",
            ErrorKind::EdgeLabelRequired { .. } => "EdgeLabelRequired",
            ErrorKind::ParameterPropertiesUnsupported => "ParameterPropertiesUnsupported",
            ErrorKind::NestedPropertyUpdateUnsupported { .. } => "NestedPropertyUpdateUnsupported",
            ErrorKind::AddPropertiesFromMapUnsupported { .. } => "AddPropertiesFromMapUnsupported",
            ErrorKind::InvalidUnionOrderBy => "InvalidUnionOrderBy",
            ErrorKind::RecursiveCteUnsupported => "RecursiveCteUnsupported",
            ErrorKind::UnionColumnMismatch { .. } => "UnionColumnMismatch",
            ErrorKind::InvalidTypeCast { .. } => "InvalidTypeCast",
            ErrorKind::LabelKindMismatch { .. } => "LabelKindMismatch",
            ErrorKind::NotFound { .. } => "NotFound",
            ErrorKind::InvalidSkipLimit { .. } => "InvalidSkipLimit",
            ErrorKind::InternalInvariantViolated(_) => "InternalInvariantViolated",
        }
    }
}

/// A transformer error: the failure class plus the source position, when
/// the parser tracked one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Byte offset into the query text.
    pub location: Location,
}

impl TransformError {
    /// Builds an error without a position.
    pub fn new(kind: ErrorKind) -> Self {
        TransformError {
            kind,
            location: None,
        }
    }

    /// Builds an error anchored at `location`.
    pub fn at(kind: ErrorKind, location: Location) -> Self {
        TransformError { kind, location }
    }

    /// Machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(at) => write!(f, "{} (at offset {at})", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ErrorKind> for TransformError {
    fn from(kind: ErrorKind) -> Self {
        TransformError::new(kind)
    }
}

impl From<crate::error::GraphError> for TransformError {
    fn from(err: crate::error::GraphError) -> Self {
        use crate::error::GraphError;
        let kind = match err {
            GraphError::LabelKindMismatch {
                label,
                actual,
                expected,
            } => ErrorKind::LabelKindMismatch {
                label,
                actual,
                expected,
            },
            GraphError::NotFound(what) => ErrorKind::NotFound {
                label: what.to_owned(),
            },
            GraphError::InternalInvariantViolated(msg) => {
                ErrorKind::InternalInvariantViolated(msg)
            }
            _ => ErrorKind::InternalInvariantViolated("document layer failure during transform"),
        };
        TransformError::new(kind)
    }
}
