use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::Client;
use tax_core::{LocationError, LocationLookup, LocationName};
use tracing::debug;

use crate::config::LocationConfig;

const STATE_COUNTRY_NAMES_PATH: &str = "/backoffice/state-or-provinces/state-country-names";

/// HTTP client for the back-office location API.
pub struct HttpLocationClient {
    client: Client,
    base_url: String,
}

impl HttpLocationClient {
    pub fn new(config: &LocationConfig) -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LocationError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LocationLookup for HttpLocationClient {
    /// One `GET` for the whole batch, ids joined by commas. An empty batch
    /// is answered locally.
    async fn get_names(
        &self,
        state_or_province_ids: &BTreeSet<i64>,
    ) -> Result<Vec<LocationName>, LocationError> {
        if state_or_province_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = state_or_province_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}{}", self.base_url, STATE_COUNTRY_NAMES_PATH);
        debug!(%url, ids = %ids, "requesting location names");

        let response = self
            .client
            .get(&url)
            .query(&[("stateOrProvinceIds", ids.as_str())])
            .send()
            .await
            .map_err(|e| LocationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LocationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Vec<LocationName>>()
            .await
            .map_err(|e| LocationError::Decode(e.to_string()))
    }
}
