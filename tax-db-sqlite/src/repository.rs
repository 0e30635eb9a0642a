use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tax_core::{
    AuditInfo, NewTaxRate, Page, RateQuery, RepositoryError, TaxClass, TaxClassRef, TaxRate,
    TaxRateEntry, TaxRateRepository,
};
use tracing::debug;

use crate::decimal::{decimal_to_f64, get_decimal};

const TAX_RATE_COLUMNS: &str = "r.id AS id, r.rate AS rate, r.zip_code AS zip_code,
    r.country_id AS country_id, r.state_or_province_id AS state_or_province_id,
    r.tax_class_id AS tax_class_id, r.created_on AS created_on, r.created_by AS created_by,
    r.last_modified_on AS last_modified_on, r.last_modified_by AS last_modified_by";

/// Applicability filter shared by the resolution queries. Binds, in order:
/// country id, state id, zip code.
const MATCH_FILTER: &str = "r.country_id = ?
    AND (r.state_or_province_id IS NULL OR r.state_or_province_id = ?)
    AND (r.zip_code IS NULL OR r.zip_code = ?)";

/// Most specific first: an exact zip is worth 2, an exact state 1. Only
/// rows that passed [`MATCH_FILTER`] are ranked, so a non-null column is an
/// exact match.
const SPECIFICITY_ORDER: &str = "(CASE WHEN r.zip_code IS NOT NULL THEN 2 ELSE 0 END
    + CASE WHEN r.state_or_province_id IS NOT NULL THEN 1 ELSE 0 END) DESC, r.id ASC";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect to `database_url`, creating the database file if missing.
    ///
    /// Accepts sqlx URLs (`sqlite:tax_rates.db`), bare paths and `:memory:`.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool. The schema is not touched; call
    /// [`migrate`](Self::migrate) before use.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bring the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")
    }

    /// Execute every `.sql` file in `seeds_dir`, in file name order, and
    /// return how many were applied. Seeds must be idempotent; they run on
    /// every start.
    pub async fn apply_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<usize> {
        let files = seed_files(seeds_dir)?;
        for path in &files {
            let sql = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;
            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "seed applied");
        }
        Ok(files.len())
    }
}

fn seed_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read seeds directory '{}'", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("Failed to list seeds directory '{}'", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn get<'r, T>(
    row: &'r SqliteRow,
    column: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {}: {}", column, e)))
}

fn row_to_audit(row: &SqliteRow) -> Result<AuditInfo, RepositoryError> {
    Ok(AuditInfo {
        created_on: get::<DateTime<Utc>>(row, "created_on")?,
        created_by: get(row, "created_by")?,
        last_modified_on: get::<DateTime<Utc>>(row, "last_modified_on")?,
        last_modified_by: get(row, "last_modified_by")?,
    })
}

fn row_to_tax_class(row: &SqliteRow) -> Result<TaxClass, RepositoryError> {
    Ok(TaxClass {
        id: get(row, "id")?,
        name: get(row, "name")?,
        audit: row_to_audit(row)?,
    })
}

fn row_to_tax_rate(row: &SqliteRow) -> Result<TaxRate, RepositoryError> {
    Ok(TaxRate {
        id: get(row, "id")?,
        rate: get_decimal(row, "rate")?,
        zip_code: get(row, "zip_code")?,
        country_id: get(row, "country_id")?,
        state_or_province_id: get(row, "state_or_province_id")?,
        tax_class: TaxClassRef(get(row, "tax_class_id")?),
        audit: row_to_audit(row)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<TaxRateEntry, RepositoryError> {
    Ok(TaxRateEntry {
        tax_rate: row_to_tax_rate(row)?,
        tax_class_name: get(row, "tax_class_name")?,
    })
}

#[async_trait]
impl TaxRateRepository for SqliteRepository {
    async fn tax_class_exists(
        &self,
        id: i64,
    ) -> Result<bool, RepositoryError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tax_class WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn tax_class_ref(
        &self,
        id: i64,
    ) -> Result<TaxClassRef, RepositoryError> {
        // The foreign key on tax_rate.tax_class_id rejects dangling refs at
        // write time, so no lookup is needed here.
        Ok(TaxClassRef(id))
    }

    async fn create_tax_class(
        &self,
        name: &str,
        actor: &str,
    ) -> Result<TaxClass, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tax_class (name, created_on, created_by, last_modified_on, last_modified_by)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_tax_class(result.last_insert_rowid()).await
    }

    async fn get_tax_class(
        &self,
        id: i64,
    ) -> Result<TaxClass, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, created_on, created_by, last_modified_on, last_modified_by
             FROM tax_class WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_tax_class(&row)
    }

    async fn list_tax_classes(&self) -> Result<Vec<TaxClass>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, created_on, created_by, last_modified_on, last_modified_by
             FROM tax_class ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_tax_class).collect()
    }

    async fn tax_rate_exists(
        &self,
        id: i64,
    ) -> Result<bool, RepositoryError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tax_rate WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn save_tax_rate(
        &self,
        rate: NewTaxRate,
        actor: &str,
    ) -> Result<TaxRate, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tax_rate (
                rate, zip_code, country_id, state_or_province_id, tax_class_id,
                created_on, created_by, last_modified_on, last_modified_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(decimal_to_f64(rate.rate))
        .bind(&rate.zip_code)
        .bind(rate.country_id)
        .bind(rate.state_or_province_id)
        .bind(rate.tax_class.id())
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = result.last_insert_rowid();
        self.find_tax_rate(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_tax_rate(
        &self,
        rate: &TaxRate,
        actor: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE tax_rate SET
                rate = ?, zip_code = ?, country_id = ?, state_or_province_id = ?,
                tax_class_id = ?, last_modified_on = ?, last_modified_by = ?
             WHERE id = ?",
        )
        .bind(decimal_to_f64(rate.rate))
        .bind(&rate.zip_code)
        .bind(rate.country_id)
        .bind(rate.state_or_province_id)
        .bind(rate.tax_class.id())
        .bind(Utc::now())
        .bind(actor)
        .bind(rate.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn find_tax_rate(
        &self,
        id: i64,
    ) -> Result<Option<TaxRate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TAX_RATE_COLUMNS} FROM tax_rate r WHERE r.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_tax_rate).transpose()
    }

    async fn find_all_tax_rates(&self) -> Result<Vec<TaxRate>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TAX_RATE_COLUMNS} FROM tax_rate r ORDER BY r.id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_tax_rate).collect()
    }

    async fn delete_tax_rate(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM tax_rate WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn find_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> Result<Page<TaxRateEntry>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tax_rate")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let offset = i64::from(page_no) * i64::from(page_size);
        let rows = sqlx::query(&format!(
            "SELECT {TAX_RATE_COLUMNS}, c.name AS tax_class_name
             FROM tax_rate r
             JOIN tax_class c ON c.id = r.tax_class_id
             ORDER BY r.id
             LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let items = rows
            .iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(
            items,
            page_no,
            page_size,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    async fn find_best_match(
        &self,
        tax_class_id: i64,
        query: &RateQuery,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT r.rate AS rate
             FROM tax_rate r
             WHERE r.tax_class_id = ? AND {MATCH_FILTER}
             ORDER BY {SPECIFICITY_ORDER}
             LIMIT 1"
        ))
        .bind(tax_class_id)
        .bind(query.country_id)
        .bind(query.state_or_province_id)
        .bind(&query.zip_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(|r| get_decimal(r, "rate")).transpose()
    }

    async fn find_best_matches(
        &self,
        tax_class_ids: &BTreeSet<i64>,
        query: &RateQuery,
    ) -> Result<Vec<TaxRate>, RepositoryError> {
        if tax_class_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT * FROM (
                SELECT {TAX_RATE_COLUMNS},
                       ROW_NUMBER() OVER (PARTITION BY r.tax_class_id ORDER BY {SPECIFICITY_ORDER}) AS rn
                FROM tax_rate r
                WHERE r.country_id = "
        ));
        builder.push_bind(query.country_id);
        builder.push(" AND (r.state_or_province_id IS NULL OR r.state_or_province_id = ");
        builder.push_bind(query.state_or_province_id);
        builder.push(") AND (r.zip_code IS NULL OR r.zip_code = ");
        builder.push_bind(query.zip_code.clone());
        builder.push(") AND r.tax_class_id IN (");
        let mut ids = builder.separated(", ");
        for id in tax_class_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
        builder.push(") WHERE rn = 1 ORDER BY id");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(row_to_tax_rate).collect()
    }
}
