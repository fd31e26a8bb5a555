//! Error types for cadledger core.

use crate::types::Dimension;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while editing a session.
///
/// Everything except [`CoreError::InternalInvariant`] describes bad input or a
/// collaborator failure. `InternalInvariant` signals a programming defect; it
/// aborts the offending command and is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A lookup with "must exist" semantics found no match.
    #[error("entity not found: {name}")]
    NotFound {
        /// Name that was looked up (after alias resolution).
        name: String,
    },

    /// The name resolved to an entity that is destroyed.
    #[error("entity {name} is destroyed")]
    DestroyedEntity {
        /// Name of the destroyed entity.
        name: String,
    },

    /// Inserting an entity collided with a live entity name.
    #[error("duplicate name {name} in dimension {dimension}")]
    DuplicateName {
        /// The colliding name.
        name: String,
        /// Dimension of the collection.
        dimension: Dimension,
    },

    /// An operation requiring at least one target got none.
    #[error("empty selection for {operation}")]
    EmptySelection {
        /// Operation that was invoked.
        operation: String,
    },

    /// A condition that indicates a defect rather than bad input.
    #[error("internal invariant violated: {message}")]
    InternalInvariant {
        /// Description of the violated invariant.
        message: String,
    },

    /// The arguments are well-formed but the operation cannot apply to them.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation was rejected.
        message: String,
    },

    /// The geometric kernel failed to construct a result.
    #[error("kernel error: {message}")]
    Kernel {
        /// Kernel diagnostic.
        message: String,
    },
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a destroyed entity error.
    pub fn destroyed(name: impl Into<String>) -> Self {
        Self::DestroyedEntity { name: name.into() }
    }

    /// Creates a duplicate name error.
    pub fn duplicate_name(name: impl Into<String>, dimension: Dimension) -> Self {
        Self::DuplicateName {
            name: name.into(),
            dimension,
        }
    }

    /// Creates an empty selection error.
    pub fn empty_selection(operation: impl Into<String>) -> Self {
        Self::EmptySelection {
            operation: operation.into(),
        }
    }

    /// Creates an internal invariant error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InternalInvariant {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a kernel error.
    pub fn kernel(message: impl Into<String>) -> Self {
        Self::Kernel {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a defect in the engine.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalInvariant { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            CoreError::not_found("Pt0003").to_string(),
            "entity not found: Pt0003"
        );
        assert_eq!(
            CoreError::empty_selection("translate").to_string(),
            "empty selection for translate"
        );
        let dup = CoreError::duplicate_name("Crv0001", Dimension::D1);
        assert_eq!(dup.to_string(), "duplicate name Crv0001 in dimension 1");
    }

    #[test]
    fn only_invariant_is_internal() {
        assert!(CoreError::invariant("double destroy").is_internal());
        assert!(!CoreError::destroyed("Pt0000").is_internal());
        assert!(!CoreError::kernel("empty cut").is_internal());
    }
}
