use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::CredentialProvider;
use crate::error::{PersistError, SourceError};
use crate::fetcher::TreasurySource;
use crate::session::{RateUpdate, RateWriter};

/// One row of `GET /treasury/exchange-rate-list`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryRate {
    pub base_currency: String,
    pub target_currency: String,
    pub current_rate: f64,
}

/// Client for the internal treasury service: the platform's own quoted
/// rates plus the rate-setting endpoint.
pub struct TreasuryApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl TreasuryApi {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }
}

#[async_trait]
impl TreasurySource for TreasuryApi {
    async fn rate_list(&self) -> Result<Vec<TreasuryRate>, SourceError> {
        let url = format!("{}/treasury/exchange-rate-list", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.credentials.bearer_token())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl RateWriter for TreasuryApi {
    async fn update_exchange_rate(&self, update: &RateUpdate) -> Result<(), PersistError> {
        // No request body; the endpoint takes everything in the query string.
        let url = format!("{}/treasury/update-exchange-rate", self.base_url);
        let rate = update.rate.to_string();
        let resp = self
            .client
            .put(&url)
            .query(&[
                ("baseCurrency", update.base_currency.as_str()),
                ("targetCurrency", update.target_currency.as_str()),
                ("rate", rate.as_str()),
                ("manualExpiry", update.manual_expiry.as_str()),
            ])
            .bearer_auth(self.credentials.bearer_token())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PersistError::Rejected(resp.status()));
        }
        Ok(())
    }
}
