//! CoinGecko market list source

use crate::{
    constants::{
        COINGECKO_API_URL, COINGECKO_MARKETS_ENDPOINT, MARKETS_QUERY, REQUEST_TIMEOUT_SECS,
        USER_AGENT,
    },
    error::ProviderError,
    provider::CoinMarketSource,
    types::CoinQuote,
};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

/// CoinGecko `/coins/markets` source
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
}

impl CoinGeckoSource {
    /// Creates a new CoinGecko source against the public API
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(COINGECKO_API_URL)
    }

    /// Creates a source against a different base URL (mirror, local stub)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Builds the markets URL with the fixed query
    pub fn build_url(&self) -> String {
        let query = MARKETS_QUERY
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}{}?{}", self.base_url, COINGECKO_MARKETS_ENDPOINT, query)
    }

    async fn request(&self) -> Result<Vec<CoinQuote>, ProviderError> {
        let url = self.build_url();
        tracing::debug!(url = %url, "Fetching market list from CoinGecko");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ProviderError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::api(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        let response_text = response.text().await.map_err(ProviderError::NetworkError)?;
        let coins = parse_markets(&response_text)?;

        tracing::debug!(count = coins.len(), "Fetched market list from CoinGecko");

        Ok(coins)
    }
}

/// Parses a `/coins/markets` body into validated quotes
///
/// The body must be a JSON array. Entries that do not decode as a
/// `CoinQuote`, fail `CoinQuote::is_well_formed`, or repeat an earlier id
/// are dropped; the rest keep their order.
pub fn parse_markets(body: &str) -> Result<Vec<CoinQuote>, ProviderError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!(
            "Failed to parse CoinGecko markets response: {}",
            e
        ))
    })?;

    let mut seen = HashSet::with_capacity(entries.len());
    let mut coins = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let quote = match serde_json::from_value::<CoinQuote>(entry) {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!(index, error = %e, "Dropping undecodable market entry");
                continue;
            }
        };

        if !quote.is_well_formed() {
            tracing::warn!(index, id = %quote.id, "Dropping malformed market entry");
            continue;
        }

        if !seen.insert(quote.id.clone()) {
            tracing::warn!(index, id = %quote.id, "Dropping duplicate market entry");
            continue;
        }

        coins.push(quote);
    }

    Ok(coins)
}

#[async_trait]
impl CoinMarketSource for CoinGeckoSource {
    async fn fetch_top_coins(&self) -> Result<Vec<CoinQuote>, ProviderError> {
        let result = self.request().await;

        if let Err(e) = &result {
            tracing::error!(
                source = self.source_name(),
                transport = e.is_transport(),
                rate_limited = e.is_rate_limited(),
                error = %e,
                "Failed to fetch market list"
            );
        }

        result
    }

    fn source_name(&self) -> &'static str {
        "coingecko"
    }
}
