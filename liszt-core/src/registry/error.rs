//! Registry errors.
//!
//! Every backend maps its storage failures into [`RegistryError`] so callers
//! can tell bad input from conflicts from unavailable storage. Driver errors
//! are kept only as the `source`.

use std::fmt;

use super::entity::EntityKind;

/// Boxed underlying cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for registrar operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Coarse classification shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing required input
    InvalidArgument,
    /// An entity the operation must act on does not exist
    NotFound,
    /// A storage constraint was violated
    Conflict,
    /// Storage failed, or the call was cancelled or timed out
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Registrar error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Bad input, e.g. an empty building name.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong
        message: String,
    },

    /// An entity the operation must act on is absent.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type
        entity: EntityKind,
        /// Requested identifier
        id: String,
    },

    /// A backend constraint was violated.
    #[error("conflict: {message}")]
    Conflict {
        /// What conflicted
        message: String,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Storage I/O failed or returned unusable data.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What failed
        message: String,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// The caller cancelled the context.
    #[error("operation cancelled")]
    Cancelled,

    /// The context deadline passed before the operation finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl RegistryError {
    /// Create an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a `NotFound` error.
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a `Conflict` error without an underlying cause.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Conflict` error wrapping its cause.
    pub fn conflict_from(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Conflict {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an `Unavailable` error without an underlying cause.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create an `Unavailable` error wrapping its cause.
    pub fn unavailable_from(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Coarse classification. Cancellation and deadline expiry are
    /// `Unavailable`; use [`Self::is_cancellation`] to tell them apart.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unavailable { .. } | Self::Cancelled | Self::DeadlineExceeded => {
                ErrorKind::Unavailable
            }
        }
    }

    /// Whether the error came from the context rather than from storage.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
