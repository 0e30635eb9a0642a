use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use crate::db::TaxRateRepository;
use crate::location::LocationLookup;
use crate::models::{
    MAX_TAX_CLASS_NAME_LEN, NewTaxRate, Page, RateQuery, SYSTEM_ACTOR, TaxClass, TaxRate,
    TaxRateDetail, TaxRateInput, TaxRateVm,
};

use super::ServiceError;

/// Creates, replaces, deletes and resolves tax rates.
///
/// Every mutation checks that the referenced tax class (and, for updates
/// and deletes, the rate itself) exists before anything is written. The
/// service neither retries nor logs failures; errors go straight back to
/// the caller.
#[derive(Clone)]
pub struct TaxRateService {
    repo: Arc<dyn TaxRateRepository>,
    location: Arc<dyn LocationLookup>,
    actor: String,
}

impl TaxRateService {
    pub fn new(
        repo: Arc<dyn TaxRateRepository>,
        location: Arc<dyn LocationLookup>,
    ) -> Self {
        Self {
            repo,
            location,
            actor: SYSTEM_ACTOR.to_string(),
        }
    }

    /// Name recorded in the audit columns of rows this service writes.
    pub fn with_actor(
        mut self,
        actor: impl Into<String>,
    ) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    // ── tax classes ──────────────────────────────────────────────────────

    pub async fn create_tax_class(
        &self,
        name: &str,
    ) -> Result<TaxClass, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation(
                "tax class name must not be blank".to_string(),
            ));
        }
        if name.chars().count() > MAX_TAX_CLASS_NAME_LEN {
            return Err(ServiceError::Validation(format!(
                "tax class name must be at most {MAX_TAX_CLASS_NAME_LEN} characters"
            )));
        }
        let existing = self.repo.list_tax_classes().await?;
        if existing.iter().any(|class| class.name == name) {
            return Err(ServiceError::Validation(format!(
                "tax class '{name}' already exists"
            )));
        }

        Ok(self.repo.create_tax_class(name, &self.actor).await?)
    }

    pub async fn list_tax_classes(&self) -> Result<Vec<TaxClass>, ServiceError> {
        Ok(self.repo.list_tax_classes().await?)
    }

    // ── mutations ────────────────────────────────────────────────────────

    pub async fn create_tax_rate(
        &self,
        input: &TaxRateInput,
    ) -> Result<TaxRate, ServiceError> {
        validate_rate(input.rate)?;
        self.ensure_tax_class_exists(input.tax_class_id).await?;

        let new_rate = NewTaxRate {
            rate: input.rate,
            zip_code: input.normalized_zip_code(),
            country_id: input.country_id,
            state_or_province_id: input.state_or_province_id,
            tax_class: self.repo.tax_class_ref(input.tax_class_id).await?,
        };

        let created = self.repo.save_tax_rate(new_rate, &self.actor).await?;
        debug!(id = created.id, tax_class_id = input.tax_class_id, "tax rate created");
        Ok(created)
    }

    /// Replace every mutable field of rate `id` with `input`.
    pub async fn update_tax_rate(
        &self,
        id: i64,
        input: &TaxRateInput,
    ) -> Result<(), ServiceError> {
        validate_rate(input.rate)?;

        let mut tax_rate = self
            .repo
            .find_tax_rate(id)
            .await?
            .ok_or(ServiceError::TaxRateNotFound(id))?;

        self.ensure_tax_class_exists(input.tax_class_id).await?;

        tax_rate.rate = input.rate;
        tax_rate.zip_code = input.normalized_zip_code();
        tax_rate.tax_class = self.repo.tax_class_ref(input.tax_class_id).await?;
        tax_rate.state_or_province_id = input.state_or_province_id;
        tax_rate.country_id = input.country_id;

        self.repo.update_tax_rate(&tax_rate, &self.actor).await?;
        debug!(id, "tax rate updated");
        Ok(())
    }

    pub async fn delete(
        &self,
        id: i64,
    ) -> Result<(), ServiceError> {
        if !self.repo.tax_rate_exists(id).await? {
            return Err(ServiceError::TaxRateNotFound(id));
        }
        self.repo.delete_tax_rate(id).await?;
        debug!(id, "tax rate deleted");
        Ok(())
    }

    // ── reads ────────────────────────────────────────────────────────────

    pub async fn find_by_id(
        &self,
        id: i64,
    ) -> Result<TaxRateVm, ServiceError> {
        self.repo
            .find_tax_rate(id)
            .await?
            .map(TaxRateVm::from)
            .ok_or(ServiceError::TaxRateNotFound(id))
    }

    pub async fn find_all(&self) -> Result<Vec<TaxRateVm>, ServiceError> {
        let rates = self.repo.find_all_tax_rates().await?;
        Ok(rates.iter().map(TaxRateVm::from).collect())
    }

    /// One page of rates joined with their tax class and location names.
    ///
    /// Location names for the whole page are fetched in a single call. Rows
    /// the location service has no names for are left out of `items`; the
    /// page totals still count them.
    pub async fn get_pageable_tax_rates(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> Result<Page<TaxRateDetail>, ServiceError> {
        if page_size == 0 {
            return Err(ServiceError::Validation(
                "page size must be at least 1".to_string(),
            ));
        }

        let page = self.repo.find_page(page_no, page_size).await?;

        let state_ids: BTreeSet<i64> = page
            .items
            .iter()
            .filter_map(|entry| entry.tax_rate.state_or_province_id)
            .collect();

        if state_ids.is_empty() {
            return Ok(page.map_items(Vec::new()));
        }

        let names: HashMap<i64, _> = self
            .location
            .get_names(&state_ids)
            .await?
            .into_iter()
            .map(|name| (name.state_or_province_id, name))
            .collect();

        let details: Vec<TaxRateDetail> = page
            .items
            .iter()
            .filter_map(|entry| {
                let rate = &entry.tax_rate;
                let location = names.get(&rate.state_or_province_id?)?;
                Some(TaxRateDetail {
                    id: rate.id,
                    rate: rate.rate,
                    zip_code: rate.zip_code.clone(),
                    tax_class_name: entry.tax_class_name.clone(),
                    state_or_province_name: location.state_or_province_name.clone(),
                    country_name: location.country_name.clone(),
                })
            })
            .collect();

        debug!(
            page_no,
            rows = page.items.len(),
            enriched = details.len(),
            "tax rate page assembled"
        );
        Ok(page.map_items(details))
    }

    // ── resolution ───────────────────────────────────────────────────────

    /// Rate of the most specific match for `tax_class_id` at `query`, or
    /// zero when no rate applies.
    pub async fn get_tax_percent(
        &self,
        tax_class_id: i64,
        query: &RateQuery,
    ) -> Result<Decimal, ServiceError> {
        let rate = self.repo.find_best_match(tax_class_id, query).await?;
        Ok(rate.unwrap_or(Decimal::ZERO))
    }

    /// Most specific match for each distinct class in `tax_class_ids`.
    ///
    /// Classes with no applicable rate are omitted; the result is ordered
    /// by rate id.
    pub async fn get_bulk_tax_rate(
        &self,
        tax_class_ids: &[i64],
        query: &RateQuery,
    ) -> Result<Vec<TaxRateVm>, ServiceError> {
        let ids: BTreeSet<i64> = tax_class_ids.iter().copied().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self.repo.find_best_matches(&ids, query).await?;
        Ok(matches.iter().map(TaxRateVm::from).collect())
    }

    async fn ensure_tax_class_exists(
        &self,
        tax_class_id: i64,
    ) -> Result<(), ServiceError> {
        if self.repo.tax_class_exists(tax_class_id).await? {
            Ok(())
        } else {
            Err(ServiceError::TaxClassNotFound(tax_class_id))
        }
    }
}

fn validate_rate(rate: Decimal) -> Result<(), ServiceError> {
    if rate < Decimal::ZERO {
        return Err(ServiceError::Validation(format!(
            "rate must not be negative, got {rate}"
        )));
    }
    Ok(())
}
