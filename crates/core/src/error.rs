//! Identifier conversion error model.

use thiserror::Error;

/// Result type used by the identifier registry and converters.
pub type IdResult<T> = Result<T, IdError>;

/// Identifier conversion failure.
///
/// These are schema/programming errors rather than transient conditions, so
/// callers propagate them instead of retrying.
#[derive(Debug, Error)]
pub enum IdError {
    /// A factory was requested for a type that is not a registered strongly typed id.
    #[error("type '{type_name}' is not a strongly-typed id type")]
    NotStronglyTypedId { type_name: &'static str },

    /// The id type has no single-argument constructor for the requested value type.
    #[error("type '{type_name}' doesn't have a constructor with one parameter of type '{value_type}'")]
    MissingConstructor {
        type_name: &'static str,
        value_type: &'static str,
    },

    /// No converter could be resolved for the type.
    #[error("cannot create converter for '{type_name}'")]
    UnresolvedConverter { type_name: &'static str },

    /// A value of the wrong type was handed to a typed accessor.
    #[error("type mismatch: expected '{expected}'")]
    TypeMismatch { expected: &'static str },

    /// A JSON token could not be decoded as the underlying value type.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl IdError {
    pub fn not_strongly_typed(type_name: &'static str) -> Self {
        Self::NotStronglyTypedId { type_name }
    }

    pub fn type_mismatch(expected: &'static str) -> Self {
        Self::TypeMismatch { expected }
    }
}
