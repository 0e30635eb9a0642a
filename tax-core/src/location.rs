//! Contract for the external service that names states, provinces and
//! countries.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::LocationName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location service unreachable: {0}")]
    Transport(String),

    #[error("location service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid location service response: {0}")]
    Decode(String),
}

impl LocationError {
    /// Whether trying the same request again can succeed: transport
    /// failures, 5xx and 429 can; other statuses and bad bodies cannot.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Decode(_) => false,
        }
    }
}

/// Resolves display names for a batch of state or province ids.
///
/// Ids the service does not know are simply absent from the result.
#[async_trait]
pub trait LocationLookup: Send + Sync {
    async fn get_names(
        &self,
        state_or_province_ids: &BTreeSet<i64>,
    ) -> Result<Vec<LocationName>, LocationError>;
}
