//! Tax rate management and resolution on top of a [`TaxRateRepository`]
//! and a [`LocationLookup`].
//!
//! [`TaxRateRepository`]: crate::db::TaxRateRepository
//! [`LocationLookup`]: crate::location::LocationLookup

mod error;
mod tax_rate_service;

#[cfg(test)]
pub(crate) mod fakes;

pub use error::{ErrorKind, ServiceError};
pub use tax_rate_service::TaxRateService;
