pub mod config;
pub mod loader;

pub use config::AppConfig;
pub use loader::{LoadSummary, TaxRateLoader, TaxRateLoaderError, TaxRateRecord};
