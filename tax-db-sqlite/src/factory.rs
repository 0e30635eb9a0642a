use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use tax_core::db::repository::{RepositoryError, TaxRateRepository};
use tax_core::db::{DbConfig, RepositoryFactory};

use crate::repository::SqliteRepository;

/// Resolve the seeds directory at runtime.
///
/// Resolution order:
/// 1. **`TAX_DB_SQLITE_SEEDS_DIR`** if set.
/// 2. **`./seeds`** if the directory exists in the current working directory.
/// 3. **`$CARGO_MANIFEST_DIR/seeds`** as a last resort when running from the
///    build tree.
pub fn seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TAX_DB_SQLITE_SEEDS_DIR") {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// [`RepositoryFactory`] for SQLite.
///
/// ```rust,no_run
/// use tax_core::db::RepositoryRegistry;
/// use tax_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string`, apply
    /// migrations and load the default tax classes.
    ///
    /// Accepts a bare file path (created if missing), a `sqlite:` URL or
    /// `":memory:"`.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRateRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.migrate()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        let seeds = seeds_dir();
        let applied = repo
            .apply_seeds(&seeds)
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        info!(
            connection = %config.connection_string,
            seeds = %seeds.display(),
            applied,
            "sqlite repository ready"
        );
        Ok(Box::new(repo))
    }
}
