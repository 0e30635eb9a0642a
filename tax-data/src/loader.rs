use std::collections::HashMap;
use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::{ServiceError, TaxRateInput, TaxRateService};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading tax rate data.
#[derive(Debug, Error)]
pub enum TaxRateLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Record {record}: {source}")]
    Record {
        record: usize,
        #[source]
        source: ServiceError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<csv::Error> for TaxRateLoaderError {
    fn from(err: csv::Error) -> Self {
        TaxRateLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from the tax rates CSV file.
///
/// - `tax_class`: class name; created on first use
/// - `rate`: the rate as a decimal (e.g. `0.08`)
/// - `zip_code`: empty applies to every zip code
/// - `country_id`: required
/// - `state_or_province_id`: empty applies to the whole country
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaxRateRecord {
    pub tax_class: String,
    pub rate: Decimal,
    pub zip_code: Option<String>,
    pub country_id: i64,
    pub state_or_province_id: Option<i64>,
}

/// Counts reported after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub classes_created: usize,
    pub rates_inserted: usize,
}

/// Loader for tax rate data from CSV files.
///
/// Rows go through [`TaxRateService`], so they are validated exactly like
/// rates created any other way.
pub struct TaxRateLoader;

impl TaxRateLoader {
    /// Parse tax rate records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<TaxRateRecord>, TaxRateLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: TaxRateRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Insert `records`, creating any tax class that does not exist yet.
    ///
    /// Stops at the first rejected record; rows before it stay inserted.
    pub async fn load(
        service: &TaxRateService,
        records: &[TaxRateRecord],
    ) -> Result<LoadSummary, TaxRateLoaderError> {
        let mut class_ids: HashMap<String, i64> = service
            .list_tax_classes()
            .await?
            .into_iter()
            .map(|class| (class.name, class.id))
            .collect();
        let mut summary = LoadSummary::default();

        for (index, record) in records.iter().enumerate() {
            let record_no = index + 1;
            let name = record.tax_class.trim();

            let tax_class_id = match class_ids.get(name) {
                Some(id) => *id,
                None => {
                    let class = service
                        .create_tax_class(name)
                        .await
                        .map_err(|source| TaxRateLoaderError::Record {
                            record: record_no,
                            source,
                        })?;
                    debug!(id = class.id, name = %class.name, "tax class created");
                    summary.classes_created += 1;
                    class_ids.insert(class.name, class.id);
                    class.id
                }
            };

            let input = TaxRateInput {
                rate: record.rate,
                zip_code: record.zip_code.clone(),
                tax_class_id,
                state_or_province_id: record.state_or_province_id,
                country_id: record.country_id,
            };
            service
                .create_tax_rate(&input)
                .await
                .map_err(|source| TaxRateLoaderError::Record {
                    record: record_no,
                    source,
                })?;
            summary.rates_inserted += 1;
        }

        info!(
            classes_created = summary.classes_created,
            rates_inserted = summary.rates_inserted,
            "tax rates loaded"
        );
        Ok(summary)
    }
}
