use std::collections::BTreeSet;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{NewTaxRate, Page, RateQuery, TaxClass, TaxClassRef, TaxRate, TaxRateEntry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Storage contract for tax classes and tax rates.
///
/// Every write is a single statement, so a failed call leaves no partial
/// row behind.
///
/// Rate resolution follows one precedence rule for both
/// [`find_best_match`](Self::find_best_match) and
/// [`find_best_matches`](Self::find_best_matches): a rate applies when its
/// country equals the query country, its state is unset or equal, and its
/// zip code is unset or equal. Among applicable rates an exact zip (2)
/// plus an exact state (1) gives the score; the highest score wins and
/// remaining ties go to the lowest id.
#[async_trait]
pub trait TaxRateRepository: Send + Sync {
    // Tax classes
    async fn tax_class_exists(&self, id: i64) -> Result<bool, RepositoryError>;
    async fn tax_class_ref(&self, id: i64) -> Result<TaxClassRef, RepositoryError>;
    async fn create_tax_class(&self, name: &str, actor: &str) -> Result<TaxClass, RepositoryError>;
    async fn get_tax_class(&self, id: i64) -> Result<TaxClass, RepositoryError>;
    async fn list_tax_classes(&self) -> Result<Vec<TaxClass>, RepositoryError>;

    // Tax rates
    async fn tax_rate_exists(&self, id: i64) -> Result<bool, RepositoryError>;

    async fn save_tax_rate(
        &self,
        rate: NewTaxRate,
        actor: &str,
    ) -> Result<TaxRate, RepositoryError>;

    /// Replace every mutable column of the row identified by `rate.id`.
    async fn update_tax_rate(
        &self,
        rate: &TaxRate,
        actor: &str,
    ) -> Result<(), RepositoryError>;

    async fn find_tax_rate(&self, id: i64) -> Result<Option<TaxRate>, RepositoryError>;
    async fn find_all_tax_rates(&self) -> Result<Vec<TaxRate>, RepositoryError>;
    async fn delete_tax_rate(&self, id: i64) -> Result<(), RepositoryError>;

    /// Zero-based page of rates in id order, each with its class name.
    async fn find_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> Result<Page<TaxRateEntry>, RepositoryError>;

    // Resolution
    async fn find_best_match(
        &self,
        tax_class_id: i64,
        query: &RateQuery,
    ) -> Result<Option<Decimal>, RepositoryError>;

    /// Best match per requested class, ordered by rate id. Classes without
    /// any applicable rate are left out.
    async fn find_best_matches(
        &self,
        tax_class_ids: &BTreeSet<i64>,
        query: &RateQuery,
    ) -> Result<Vec<TaxRate>, RepositoryError>;
}
