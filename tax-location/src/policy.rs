use std::collections::BTreeSet;
use std::future::Future;

use async_trait::async_trait;
use tax_core::{LocationError, LocationLookup, LocationName};
use tracing::{error, warn};

use crate::config::{Fallback, RetryPolicy};

/// Run `operation` until it succeeds, fails with an error that is not
/// [retryable](LocationError::is_retryable), or `policy` runs out of
/// attempts. Then `fallback` decides the outcome.
///
/// [`Fallback::Empty`] yields `T::default()`; [`Fallback::Propagate`] logs
/// the last error and returns it.
pub async fn retry_with_fallback<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
    fallback: Fallback,
) -> Result<T, LocationError>
where
    T: Default,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LocationError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    let last_error = loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = policy.backoff_for(attempt - 1);
                warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "location lookup failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => break e,
        }
    };

    match fallback {
        Fallback::Empty => {
            warn!(attempts = attempt, error = %last_error, "location lookup failed, using empty result");
            Ok(T::default())
        }
        Fallback::Propagate => {
            error!(attempts = attempt, error = %last_error, "location lookup failed");
            Err(last_error)
        }
    }
}

/// [`LocationLookup`] decorator applying [`retry_with_fallback`] to every
/// call of the wrapped lookup.
pub struct ResilientLocationLookup<L> {
    inner: L,
    policy: RetryPolicy,
    fallback: Fallback,
}

impl<L: LocationLookup> ResilientLocationLookup<L> {
    pub fn new(
        inner: L,
        policy: RetryPolicy,
        fallback: Fallback,
    ) -> Self {
        Self {
            inner,
            policy,
            fallback,
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: LocationLookup> LocationLookup for ResilientLocationLookup<L> {
    async fn get_names(
        &self,
        state_or_province_ids: &BTreeSet<i64>,
    ) -> Result<Vec<LocationName>, LocationError> {
        retry_with_fallback(
            &self.policy,
            || self.inner.get_names(state_or_province_ids),
            self.fallback,
        )
        .await
    }
}
