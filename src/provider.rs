//! Source abstraction for fetching the ranked market list from external APIs

use crate::{error::ProviderError, types::CoinQuote};
use async_trait::async_trait;

/// Trait for market list sources
///
/// Implementations fetch the top coins by market cap from some API
/// (CoinGecko today). The query is fixed by the implementation.
#[async_trait]
pub trait CoinMarketSource: Send + Sync {
    /// Fetches the current ranked market list
    ///
    /// # Returns
    /// The validated coins in the order the source sent them, or an error
    /// if the transport failed or the source reported a failure
    async fn fetch_top_coins(&self) -> Result<Vec<CoinQuote>, ProviderError>;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted outcome of one mock fetch
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        Coins(Vec<CoinQuote>),
        Api(u16),
        Invalid(String),
    }

    #[derive(Debug, Clone)]
    struct Scripted {
        outcome: MockOutcome,
        delay: Duration,
    }

    /// Mock source replaying queued outcomes, each after its own delay
    pub struct MockSource {
        script: Arc<Mutex<VecDeque<Scripted>>>,
        fallback: Arc<Mutex<MockOutcome>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl Default for MockSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockSource {
        pub fn new() -> Self {
            Self {
                script: Arc::new(Mutex::new(VecDeque::new())),
                fallback: Arc::new(Mutex::new(MockOutcome::Invalid(
                    "no scripted response".to_string(),
                ))),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn push_coins(&self, coins: Vec<CoinQuote>, delay: Duration) {
            self.push(MockOutcome::Coins(coins), delay);
        }

        pub fn push_error(&self, status: u16, delay: Duration) {
            self.push(MockOutcome::Api(status), delay);
        }

        pub fn push(&self, outcome: MockOutcome, delay: Duration) {
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted { outcome, delay });
        }

        /// Outcome used once the script runs dry
        pub fn set_fallback(&self, outcome: MockOutcome) {
            *self.fallback.lock().unwrap() = outcome;
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl CoinMarketSource for MockSource {
        async fn fetch_top_coins(&self) -> Result<Vec<CoinQuote>, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            let next = self.script.lock().unwrap().pop_front();
            let Scripted { outcome, delay } = next.unwrap_or_else(|| Scripted {
                outcome: self.fallback.lock().unwrap().clone(),
                delay: Duration::ZERO,
            });

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match outcome {
                MockOutcome::Coins(coins) => Ok(coins),
                MockOutcome::Api(status) => Err(ProviderError::api(status, "mock failure")),
                MockOutcome::Invalid(msg) => Err(ProviderError::invalid_response(msg)),
            }
        }

        fn source_name(&self) -> &'static str {
            "mock"
        }
    }

    /// Builds a batch of `n` coins sorted by market cap descending.
    /// `tag` is folded into the ids so batches can be told apart.
    pub fn batch(tag: &str, n: usize) -> Vec<CoinQuote> {
        (0..n)
            .map(|i| CoinQuote {
                id: format!("{}-{}", tag, i),
                symbol: format!("c{}", i),
                name: format!("Coin {}", i),
                image: format!("https://example.com/{}.png", i),
                current_price: 100.0 + i as f64,
                price_change_percentage_24h: Some(i as f64 - 1.0),
                market_cap: 1_000_000.0 * (n - i) as f64,
            })
            .collect()
    }
}
