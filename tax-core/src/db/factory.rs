use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::repository::{RepositoryError, TaxRateRepository};

/// Which storage backend to open, and how.
///
/// `backend` selects a factory by [`RepositoryFactory::backend_name`],
/// ignoring case and surrounding blanks. `connection_string` is handed to
/// that factory as is.
///
/// | backend    | connection_string examples                   |
/// |------------|----------------------------------------------|
/// | `sqlite`   | `tax_rates.db`, `sqlite:rates.db`, `:memory:` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub backend: String,
    pub connection_string: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            connection_string: ":memory:".to_string(),
        }
    }
}

/// Opens a [`TaxRateRepository`] for one backend. Backend crates export a
/// unit struct implementing this and register it with a
/// [`RepositoryRegistry`].
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Lowercase name matched against [`DbConfig::backend`].
    fn backend_name(&self) -> &'static str;

    /// Return a repository whose schema is ready for use.
    async fn create(&self, config: &DbConfig) -> Result<Box<dyn TaxRateRepository>, RepositoryError>;
}

/// Backend factories keyed by name.
pub struct RepositoryRegistry {
    factories: HashMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Add `factory`, replacing any factory registered under the same name.
    pub fn register(&mut self, factory: Box<dyn RepositoryFactory>) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Registered backend names in alphabetical order.
    pub fn available_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Open a repository with the factory named by `config.backend`.
    ///
    /// A blank or unknown backend is a [`RepositoryError::Configuration`]
    /// that lists the registered names. Factory errors are returned
    /// unchanged.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRateRepository>, RepositoryError> {
        let backend = config.backend.trim().to_ascii_lowercase();
        let Some(factory) = self.factories.get(backend.as_str()) else {
            return Err(RepositoryError::Configuration(format!(
                "unknown tax rate store backend '{}'; available: {}",
                config.backend,
                self.available_backends().join(", ")
            )));
        };

        factory.create(config).await
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
