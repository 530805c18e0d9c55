//! Error taxonomy for core operations.

use crate::store::StoreError;
use serde::Serialize;

/// Errors returned by registries, the assignment engine and the lifecycle.
///
/// Partial failures (first write succeeded, second failed) surface as
/// `Persistence` and are not rolled back.
#[derive(Debug, thiserror::Error)]
pub enum GravitonError {
    /// A lookup found nothing.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A lookup that expected exactly one match found several.
    #[error("expected one {entity} matching {key}, found {count}")]
    MultipleFound {
        entity: &'static str,
        key: String,
        count: usize,
    },

    /// Exclusivity or uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed or missing required field.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Underlying store failure.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl GravitonError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MultipleFound { .. } => ErrorKind::MultipleFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

/// Stable classification used by outer layers to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    MultipleFound,
    Conflict,
    Validation,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::MultipleFound => "multiple_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Persistence => "persistence",
        }
    }
}

pub type Result<T, E = GravitonError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            GravitonError::not_found("batch", "x").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            GravitonError::conflict("taken").kind().as_str(),
            "conflict"
        );
        let err = GravitonError::from(StoreError::LockBusy {
            lock_path: "/tmp/x.lock".to_string(),
            holder: "pid 42".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn messages_name_the_entity() {
        let err = GravitonError::not_found("hydrometer", "Green Hydrometer");
        assert_eq!(err.to_string(), "hydrometer not found: Green Hydrometer");
    }
}
