//! Error types for filter and order compilation
//!
//! Two families of failure are kept apart:
//! - [`ValidationError`] - the request itself is wrong and the caller can fix it.
//!   The surrounding API layer is expected to surface these to the consumer.
//! - [`SchemaError`] - the schema layer handed the compiler something that does
//!   not exist. These indicate a bug upstream and must not be shown as user errors.

use thiserror::Error;

/// Caller-fixable problems with a filter or order request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`_exists` can only be used directly inside a relationship filter")]
    ExistsOutsideRelationship,

    #[error("`_exists` must be the only condition inside the `{relationship}` filter")]
    ExistsNotSole { relationship: String },

    #[error("cannot order `{entity}` by to-many relationship `{relationship}`")]
    RelationshipNotOrderable { entity: String, relationship: String },

    #[error("adapter `{adapter}` does not support geo-distance ordering")]
    GeoOrderingUnsupported { adapter: String },

    #[error("adapter `{adapter}` does not support priority ordering")]
    PriorityOrderingUnsupported { adapter: String },

    #[error("adapter `{adapter}` does not support sort direction `{direction}`")]
    UnsupportedSortDirection { adapter: String, direction: String },

    #[error("operator `{operator}` is not supported for field `{field}` on adapter `{adapter}`")]
    UnsupportedOperator {
        adapter: String,
        field: String,
        operator: String,
    },

    #[error("invalid value for `{field}` `{operator}`: {reason}")]
    InvalidValue {
        field: String,
        operator: String,
        reason: String,
    },

    #[error("malformed filter: {reason}")]
    MalformedFilter { reason: String },

    #[error("malformed order: {reason}")]
    MalformedOrder { reason: String },
}

impl ValidationError {
    pub(crate) fn invalid_value(
        field: impl Into<String>,
        operator: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_filter(reason: impl Into<String>) -> Self {
        Self::MalformedFilter {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_order(reason: impl Into<String>) -> Self {
        Self::MalformedOrder {
            reason: reason.into(),
        }
    }
}

/// Schema lookups that failed. Always a programming error in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown entity `{entity}`")]
    UnknownEntity { entity: String },

    #[error("entity `{entity}` has no relationship `{relationship}`")]
    UnknownRelationship { entity: String, relationship: String },

    #[error("entity `{entity}` declares `{name}` more than once")]
    DuplicateName { entity: String, name: String },
}

/// Any failure from the top-level compile entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl CompileError {
    /// The validation error, if this failure is one the API consumer can fix.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Schema(_) => None,
        }
    }
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::ExistsNotSole {
            relationship: "author".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`_exists` must be the only condition inside the `author` filter"
        );

        let err = ValidationError::invalid_value("age", "_gte", "expected an integer");
        assert_eq!(
            err.to_string(),
            "invalid value for `age` `_gte`: expected an integer"
        );
    }

    #[test]
    fn test_compile_error_wraps_both_families() {
        let err: CompileError = ValidationError::ExistsOutsideRelationship.into();
        assert!(err.as_validation().is_some());

        let err: CompileError = SchemaError::UnknownEntity {
            entity: "ghost".to_string(),
        }
        .into();
        assert!(err.as_validation().is_none());
        assert_eq!(err.to_string(), "unknown entity `ghost`");
    }
}
