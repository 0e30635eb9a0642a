use thiserror::Error;

use crate::db::RepositoryError;
use crate::location::LocationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("tax rate {0} is not found")]
    TaxRateNotFound(i64),

    #[error("tax class {0} is not found")]
    TaxClassNotFound(i64),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("location service unavailable: {0}")]
    DependencyUnavailable(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<LocationError> for ServiceError {
    fn from(err: LocationError) -> Self {
        ServiceError::DependencyUnavailable(err.to_string())
    }
}

/// Coarse classification a transport layer can map to its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    DependencyUnavailable,
    Internal,
}

impl ErrorKind {
    /// Conventional HTTP status for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Validation => 400,
            Self::DependencyUnavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TaxRateNotFound(_) | Self::TaxClassNotFound(_) => ErrorKind::NotFound,
            Self::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            Self::Repository(_) => ErrorKind::Internal,
        }
    }
}
