use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AuditInfo, TaxClassRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate {
    pub id: i64,
    /// Fraction of the taxed amount, e.g. `0.08` for 8%.
    pub rate: Decimal,
    /// `None` applies the rate to every zip code of the state / country.
    pub zip_code: Option<String>,
    pub country_id: i64,
    /// `None` applies the rate to the whole country.
    pub state_or_province_id: Option<i64>,
    pub tax_class: TaxClassRef,
    pub audit: AuditInfo,
}

/// For inserting new rates (no id or audit values)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxRate {
    pub rate: Decimal,
    pub zip_code: Option<String>,
    pub country_id: i64,
    pub state_or_province_id: Option<i64>,
    pub tax_class: TaxClassRef,
}

/// Complete field set supplied by callers to create or replace a rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRateInput {
    pub rate: Decimal,
    #[serde(default)]
    pub zip_code: Option<String>,
    pub tax_class_id: i64,
    #[serde(default)]
    pub state_or_province_id: Option<i64>,
    pub country_id: i64,
}

impl TaxRateInput {
    /// Zip code with blank values folded into the "all zips" wildcard.
    pub fn normalized_zip_code(&self) -> Option<String> {
        normalize_zip_code(self.zip_code.as_deref())
    }
}

/// Trims `zip` and maps empty input to `None`.
pub fn normalize_zip_code(zip: Option<&str>) -> Option<String> {
    zip.map(str::trim)
        .filter(|z| !z.is_empty())
        .map(str::to_string)
}

/// Location a rate is resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuery {
    pub country_id: i64,
    pub state_or_province_id: Option<i64>,
    pub zip_code: Option<String>,
}

impl RateQuery {
    pub fn new(
        country_id: i64,
        state_or_province_id: Option<i64>,
        zip_code: Option<&str>,
    ) -> Self {
        Self {
            country_id,
            state_or_province_id,
            zip_code: normalize_zip_code(zip_code),
        }
    }
}

/// Flat read view of a [`TaxRate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRateVm {
    pub id: i64,
    pub rate: Decimal,
    pub zip_code: Option<String>,
    pub tax_class_id: i64,
    pub state_or_province_id: Option<i64>,
    pub country_id: i64,
}

impl From<&TaxRate> for TaxRateVm {
    fn from(rate: &TaxRate) -> Self {
        Self {
            id: rate.id,
            rate: rate.rate,
            zip_code: rate.zip_code.clone(),
            tax_class_id: rate.tax_class.id(),
            state_or_province_id: rate.state_or_province_id,
            country_id: rate.country_id,
        }
    }
}

impl From<TaxRate> for TaxRateVm {
    fn from(rate: TaxRate) -> Self {
        Self::from(&rate)
    }
}

/// A stored rate together with the name of its tax class, as listed page by
/// page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRateEntry {
    pub tax_rate: TaxRate,
    pub tax_class_name: String,
}

/// Listing row: a rate joined with its tax class and location names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRateDetail {
    pub id: i64,
    pub rate: Decimal,
    pub zip_code: Option<String>,
    pub tax_class_name: String,
    pub state_or_province_name: String,
    pub country_name: String,
}
