use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_DESTINATIONS: &str = "KES,EUR,NGN,UGX,TZS";

#[derive(Debug, Clone)]
pub struct Settings {
    pub treasury_url: String,
    pub fx_url: String,
    pub api_token: String,
    pub destinations: Vec<String>,
    pub poll_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let treasury_url =
            env::var("RATEDESK_TREASURY_URL").context("RATEDESK_TREASURY_URL is not set")?;
        let fx_url = env::var("RATEDESK_FX_URL").context("RATEDESK_FX_URL is not set")?;
        let api_token =
            env::var("RATEDESK_API_TOKEN").context("RATEDESK_API_TOKEN is not set")?;

        let poll_interval = match env::var("RATEDESK_POLL_INTERVAL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .context("RATEDESK_POLL_INTERVAL_SECS must be a whole number of seconds")?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        };

        let destinations = parse_destinations(
            &env::var("RATEDESK_DESTINATIONS").unwrap_or_else(|_| DEFAULT_DESTINATIONS.to_string()),
        );
        if destinations.is_empty() {
            anyhow::bail!("RATEDESK_DESTINATIONS must name at least one currency code");
        }

        Ok(Self {
            treasury_url,
            fx_url,
            api_token,
            destinations,
            poll_interval,
        })
    }
}

fn parse_destinations(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}
