//! In-memory collaborators for service tests.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::db::{RepositoryError, TaxRateRepository};
use crate::location::{LocationError, LocationLookup};
use crate::models::{
    AuditInfo, LocationName, NewTaxRate, Page, RateQuery, TaxClass, TaxClassRef, TaxRate,
    TaxRateEntry,
};

#[derive(Default)]
struct Tables {
    classes: Vec<TaxClass>,
    rates: Vec<TaxRate>,
    next_rate_id: i64,
    bulk_queries: usize,
}

/// Applies the same precedence the SQL backend does, over plain vectors.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn rate_count(&self) -> usize {
        self.tables.lock().unwrap().rates.len()
    }

    pub fn bulk_queries(&self) -> usize {
        self.tables.lock().unwrap().bulk_queries
    }
}

/// Score of `rate` for `query`: exact zip 2, exact state 1, country-wide 0.
/// `None` when the rate does not apply.
fn specificity(
    query: &RateQuery,
    rate: &TaxRate,
) -> Option<u8> {
    if rate.country_id != query.country_id {
        return None;
    }
    let state_score = match rate.state_or_province_id {
        None => 0,
        Some(id) if Some(id) == query.state_or_province_id => 1,
        Some(_) => return None,
    };
    let zip_score = match rate.zip_code.as_deref() {
        None => 0,
        Some(zip) if Some(zip) == query.zip_code.as_deref() => 2,
        Some(_) => return None,
    };
    Some(zip_score + state_score)
}

fn best_match<'a>(
    rates: impl Iterator<Item = &'a TaxRate>,
    query: &RateQuery,
) -> Option<&'a TaxRate> {
    rates
        .filter_map(|rate| specificity(query, rate).map(|score| (score, rate)))
        .max_by(|(a_score, a), (b_score, b)| a_score.cmp(b_score).then(b.id.cmp(&a.id)))
        .map(|(_, rate)| rate)
}

#[async_trait]
impl TaxRateRepository for InMemoryRepository {
    async fn tax_class_exists(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.tables.lock().unwrap().classes.iter().any(|c| c.id == id))
    }

    async fn tax_class_ref(&self, id: i64) -> Result<TaxClassRef, RepositoryError> {
        Ok(TaxClassRef(id))
    }

    async fn create_tax_class(&self, name: &str, actor: &str) -> Result<TaxClass, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let class = TaxClass {
            id: tables.classes.len() as i64 + 1,
            name: name.to_string(),
            audit: AuditInfo::created(actor, Utc::now()),
        };
        tables.classes.push(class.clone());
        Ok(class)
    }

    async fn get_tax_class(&self, id: i64) -> Result<TaxClass, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        tables
            .classes
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_tax_classes(&self) -> Result<Vec<TaxClass>, RepositoryError> {
        Ok(self.tables.lock().unwrap().classes.clone())
    }

    async fn tax_rate_exists(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.tables.lock().unwrap().rates.iter().any(|r| r.id == id))
    }

    async fn save_tax_rate(&self, rate: NewTaxRate, actor: &str) -> Result<TaxRate, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.next_rate_id += 1;
        let saved = TaxRate {
            id: tables.next_rate_id,
            rate: rate.rate,
            zip_code: rate.zip_code,
            country_id: rate.country_id,
            state_or_province_id: rate.state_or_province_id,
            tax_class: rate.tax_class,
            audit: AuditInfo::created(actor, Utc::now()),
        };
        tables.rates.push(saved.clone());
        Ok(saved)
    }

    async fn update_tax_rate(&self, rate: &TaxRate, actor: &str) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let slot = tables
            .rates
            .iter_mut()
            .find(|r| r.id == rate.id)
            .ok_or(RepositoryError::NotFound)?;
        let audit = slot.audit.touched(actor, Utc::now());
        *slot = TaxRate {
            audit,
            ..rate.clone()
        };
        Ok(())
    }

    async fn find_tax_rate(&self, id: i64) -> Result<Option<TaxRate>, RepositoryError> {
        Ok(self.tables.lock().unwrap().rates.iter().find(|r| r.id == id).cloned())
    }

    async fn find_all_tax_rates(&self) -> Result<Vec<TaxRate>, RepositoryError> {
        Ok(self.tables.lock().unwrap().rates.clone())
    }

    async fn delete_tax_rate(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.rates.len();
        tables.rates.retain(|r| r.id != id);
        if tables.rates.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> Result<Page<TaxRateEntry>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        let items = tables
            .rates
            .iter()
            .skip(page_no as usize * page_size as usize)
            .take(page_size as usize)
            .map(|rate| TaxRateEntry {
                tax_rate: rate.clone(),
                tax_class_name: tables
                    .classes
                    .iter()
                    .find(|c| c.id == rate.tax_class.id())
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
            })
            .collect();
        Ok(Page::new(items, page_no, page_size, tables.rates.len() as u64))
    }

    async fn find_best_match(
        &self,
        tax_class_id: i64,
        query: &RateQuery,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let tables = self.tables.lock().unwrap();
        let candidates = tables
            .rates
            .iter()
            .filter(|r| r.tax_class.id() == tax_class_id);
        Ok(best_match(candidates, query).map(|r| r.rate))
    }

    async fn find_best_matches(
        &self,
        tax_class_ids: &BTreeSet<i64>,
        query: &RateQuery,
    ) -> Result<Vec<TaxRate>, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        tables.bulk_queries += 1;
        let mut matches: Vec<TaxRate> = tax_class_ids
            .iter()
            .filter_map(|class_id| {
                let candidates = tables
                    .rates
                    .iter()
                    .filter(|r| r.tax_class.id() == *class_id);
                best_match(candidates, query).cloned()
            })
            .collect();
        matches.sort_by_key(|r| r.id);
        Ok(matches)
    }
}

/// Location lookup that answers from a fixed table and records every
/// request it receives.
#[derive(Default)]
pub struct StubLocations {
    names: Vec<LocationName>,
    failure: Option<LocationError>,
    requests: Mutex<Vec<BTreeSet<i64>>>,
}

impl StubLocations {
    pub fn with_names(names: &[(i64, &str, &str)]) -> Self {
        Self {
            names: names
                .iter()
                .map(|(id, state, country)| LocationName {
                    state_or_province_id: *id,
                    state_or_province_name: state.to_string(),
                    country_name: country.to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(error: LocationError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<BTreeSet<i64>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocationLookup for StubLocations {
    async fn get_names(
        &self,
        state_or_province_ids: &BTreeSet<i64>,
    ) -> Result<Vec<LocationName>, LocationError> {
        self.requests
            .lock()
            .unwrap()
            .push(state_or_province_ids.clone());
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .names
            .iter()
            .filter(|n| state_or_province_ids.contains(&n.state_or_province_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn rate(
        state: Option<i64>,
        zip: Option<&str>,
    ) -> TaxRate {
        TaxRate {
            id: 1,
            rate: dec!(0.05),
            zip_code: zip.map(str::to_string),
            country_id: 1,
            state_or_province_id: state,
            tax_class: TaxClassRef(1),
            audit: AuditInfo::created("test", Utc::now()),
        }
    }

    #[test]
    fn exact_zip_outranks_state_which_outranks_country() {
        let query = RateQuery::new(1, Some(5), Some("10001"));

        assert_eq!(specificity(&query, &rate(Some(5), Some("10001"))), Some(3));
        assert_eq!(specificity(&query, &rate(None, Some("10001"))), Some(2));
        assert_eq!(specificity(&query, &rate(Some(5), None)), Some(1));
        assert_eq!(specificity(&query, &rate(None, None)), Some(0));
    }

    #[test]
    fn mismatching_rates_do_not_apply() {
        let query = RateQuery::new(1, Some(5), Some("10001"));

        assert_eq!(specificity(&query, &rate(Some(6), None)), None);
        assert_eq!(specificity(&query, &rate(Some(5), Some("99999"))), None);

        let mut other_country = rate(None, None);
        other_country.country_id = 2;
        assert_eq!(specificity(&query, &other_country), None);
    }

    #[test]
    fn query_without_state_only_matches_country_wide_rates() {
        let query = RateQuery::new(1, None, None);

        assert_eq!(specificity(&query, &rate(None, None)), Some(0));
        assert_eq!(specificity(&query, &rate(Some(5), None)), None);
        assert_eq!(specificity(&query, &rate(None, Some("10001"))), None);
    }
}
