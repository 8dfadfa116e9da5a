use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::CredentialProvider;
use crate::error::SourceError;
use crate::fetcher::FxSource;

/// One entry of the FX provider's `GET /rates?source=&target=` response.
/// Only the rate matters; the provider echoes the pair alongside it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FxRate {
    pub rate: f64,
}

/// Client for the third-party FX-rate provider, used for every pair that
/// does not route through the treasury.
pub struct FxApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl FxApi {
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
impl FxSource for FxApi {
    async fn pair_rate(&self, base: &str, target: &str) -> Result<Decimal, SourceError> {
        let url = format!("{}/rates", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("source", base), ("target", target)])
            .bearer_auth(self.credentials.bearer_token())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status()));
        }
        let entries: Vec<FxRate> = resp.json().await?;
        let first = entries.first().ok_or_else(|| SourceError::NoRate {
            base: base.to_string(),
            target: target.to_string(),
        })?;
        Decimal::try_from(first.rate).map_err(|_| SourceError::BadNumber(first.rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_entries_parse() {
        let body = r#"[{"source": "USD", "target": "EUR", "rate": 0.9187}]"#;
        let entries: Vec<FxRate> = serde_json::from_str(body).unwrap();
        assert_eq!(entries[0].rate, 0.9187);
    }

    #[test]
    fn empty_response_parses_to_no_entries() {
        let entries: Vec<FxRate> = serde_json::from_str("[]").unwrap();
        assert!(entries.is_empty());
    }
}
