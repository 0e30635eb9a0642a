pub mod db;
pub mod location;
pub mod models;
pub mod service;

pub use db::repository::{RepositoryError, TaxRateRepository};
pub use location::{LocationError, LocationLookup};
pub use models::*;
pub use service::{ErrorKind, ServiceError, TaxRateService};
