//! Location-service adapters for [`tax_core::LocationLookup`].
//!
//! [`HttpLocationClient`] talks to the back-office location API;
//! [`ResilientLocationLookup`] wraps any lookup with retries and a
//! configurable fallback. [`build_lookup`] wires both from a
//! [`LocationConfig`].

pub mod client;
pub mod config;
pub mod policy;

pub use client::HttpLocationClient;
pub use config::{Fallback, LocationConfig, RetryPolicy};
pub use policy::{ResilientLocationLookup, retry_with_fallback};

use tax_core::LocationError;

/// Build the HTTP client described by `config`, wrapped in its retry policy.
pub fn build_lookup(
    config: &LocationConfig,
) -> Result<ResilientLocationLookup<HttpLocationClient>, LocationError> {
    let client = HttpLocationClient::new(config)?;
    Ok(ResilientLocationLookup::new(
        client,
        config.retry.clone(),
        config.fallback,
    ))
}
