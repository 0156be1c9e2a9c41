//! Coin feed controller
//!
//! Owns the poll timer and the manual refresh action, and publishes a
//! read-only `FeedState` to whoever renders it.

use crate::{
    constants::{EVENT_CHANNEL_CAPACITY, REFRESH_INTERVAL_SECS, STALE_THRESHOLD_SECS},
    error::ProviderError,
    metrics::{FetchMetrics, MetricsCollector},
    provider::CoinMarketSource,
    providers::CoinGeckoSource,
    store::{CommitOutcome, FeedStore, FetchTicket},
    types::{ComponentHealth, FeedEvent, FeedState, HealthStatus},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Timing knobs of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    /// Period of the automatic poll
    pub refresh_interval: Duration,
    /// Snapshot age above which the health check reports `Degraded`
    pub stale_threshold: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(REFRESH_INTERVAL_SECS),
            stale_threshold: Duration::from_secs(STALE_THRESHOLD_SECS),
        }
    }
}

/// State shared between the feed handle, the poller and refresh tasks
struct FeedCore {
    source: Arc<dyn CoinMarketSource>,
    store: FeedStore,
    metrics: MetricsCollector,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedCore {
    /// Runs the fetch for an already issued ticket and commits the result
    async fn fetch_and_commit(&self, ticket: FetchTicket) -> CommitOutcome {
        let start = Instant::now();
        let result = self.source.fetch_top_coins().await;
        let latency = start.elapsed();
        self.metrics.record(latency, result.is_ok()).await;

        let count = result.as_ref().map(Vec::len).unwrap_or_default();
        let error_message = result.as_ref().err().map(ProviderError::to_string);
        if let Some(error) = &error_message {
            tracing::warn!(
                sequence = ticket.sequence,
                manual = ticket.manual,
                error = %error,
                "Failed to fetch market list"
            );
        }

        let outcome = self.store.complete(ticket, result);
        match outcome {
            CommitOutcome::Committed => {
                let event = match error_message {
                    Some(error) => FeedEvent::fetch_failed(error, ticket.sequence),
                    None => {
                        tracing::debug!(
                            sequence = ticket.sequence,
                            manual = ticket.manual,
                            count,
                            latency_ms = latency.as_millis() as u64,
                            "Replaced coin snapshot"
                        );
                        FeedEvent::snapshot_replaced(count, ticket.sequence)
                    }
                };
                let _ = self.events.send(event);
            }
            CommitOutcome::Stale => {
                tracing::debug!(
                    sequence = ticket.sequence,
                    "Discarding result of a fetch overtaken by a newer one"
                );
                let _ = self.events.send(FeedEvent::stale_result_discarded(ticket.sequence));
            }
            CommitOutcome::Released => {
                tracing::debug!(
                    sequence = ticket.sequence,
                    "Discarding result of a fetch that finished after teardown"
                );
            }
        }

        outcome
    }
}

/// Auto-refreshing market feed
///
/// Creating a feed immediately starts a fetch and arms a timer that
/// re-fetches every `refresh_interval`. Dropping the feed (or calling
/// `shutdown`) cancels the timer; fetches already in flight are allowed to
/// finish but no longer touch the state.
///
/// Must be created from within a tokio runtime.
///
/// # Example
/// ```no_run
/// use coin_feed::CoinFeed;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let feed = CoinFeed::new()?;
/// let mut updates = feed.subscribe();
///
/// let state = updates.wait_for(|state| state.sequence > 0).await?;
/// for coin in &state.coins {
///     println!("{}: ${:.2}", coin.display_symbol(), coin.current_price);
/// }
/// # Ok(())
/// # }
/// ```
pub struct CoinFeed {
    core: Arc<FeedCore>,
    config: FeedConfig,
    poller: Option<JoinHandle<()>>,
}

impl CoinFeed {
    /// Creates a feed backed by the public CoinGecko API
    pub fn new() -> Result<Self, ProviderError> {
        let source = CoinGeckoSource::new()?;
        Ok(Self::with_source(Arc::new(source)))
    }

    /// Creates a feed with a custom source and the default timings
    pub fn with_source(source: Arc<dyn CoinMarketSource>) -> Self {
        Self::with_config(source, FeedConfig::default())
    }

    /// Creates a feed with a custom source and timings
    pub fn with_config(source: Arc<dyn CoinMarketSource>, config: FeedConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let core = Arc::new(FeedCore {
            metrics: MetricsCollector::new(source.source_name()),
            store: FeedStore::new(),
            source,
            events,
        });

        let poller = Self::spawn_poller(core.clone(), config.refresh_interval);

        Self {
            core,
            config,
            poller: Some(poller),
        }
    }

    /// Starts the poll timer. The first tick fires immediately.
    fn spawn_poller(core: Arc<FeedCore>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                source = core.source.source_name(),
                refresh_interval_secs = every.as_secs(),
                "Starting coin feed poller"
            );

            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !core.store.is_alive() {
                    break;
                }

                // Polls run detached: aborting the poller only stops the timer.
                let ticket = core.store.begin_fetch(false);
                let task_core = core.clone();
                tokio::spawn(async move {
                    task_core.fetch_and_commit(ticket).await;
                });
            }
        })
    }

    /// Starts a manual refresh without waiting for it
    ///
    /// `refreshing` is raised before this returns and drops once the
    /// refresh (and any other refresh still in flight) completes.
    /// Returns `None` without fetching once the feed has been shut down.
    pub fn trigger_refresh(&self) -> Option<JoinHandle<CommitOutcome>> {
        if !self.core.store.is_alive() {
            return None;
        }

        let ticket = self.core.store.begin_fetch(true);
        let core = self.core.clone();
        Some(tokio::spawn(async move { core.fetch_and_commit(ticket).await }))
    }

    /// Runs a manual refresh and waits for its result to be applied
    ///
    /// After shutdown nothing is fetched and `Released` is returned.
    pub async fn refresh_now(&self) -> CommitOutcome {
        if !self.core.store.is_alive() {
            return CommitOutcome::Released;
        }

        let ticket = self.core.store.begin_fetch(true);
        self.core.fetch_and_commit(ticket).await
    }

    /// Returns a copy of the current state
    pub fn snapshot(&self) -> FeedState {
        self.core.store.snapshot()
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.core.store.subscribe()
    }

    /// Subscribes to fetch events
    pub fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.core.events.subscribe()
    }

    /// Returns the name of the current source
    pub fn source_name(&self) -> &'static str {
        self.core.source.source_name()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Gets fetch metrics including latency percentiles and success rate
    pub async fn fetch_metrics(&self) -> FetchMetrics {
        self.core.metrics.snapshot().await
    }

    /// Perform a health check on the feed
    pub async fn health_check(&self) -> ComponentHealth {
        let state = self.snapshot();
        let metrics = self.fetch_metrics().await;
        let stale = state.is_stale(self.config.stale_threshold.as_secs());

        let mut details = std::collections::HashMap::new();
        details.insert("coins".to_string(), serde_json::json!(state.coins.len()));
        details.insert("source_name".to_string(), serde_json::json!(self.source_name()));
        details.insert("sequence".to_string(), serde_json::json!(state.sequence));
        details.insert("stale".to_string(), serde_json::json!(stale));
        details.insert(
            "consecutive_failures".to_string(),
            serde_json::json!(metrics.consecutive_failures),
        );
        if let Some(age) = state.age() {
            details.insert("age_secs".to_string(), serde_json::json!(age.as_secs()));
        }

        let (status, message) = if state.coins.is_empty() {
            (
                HealthStatus::Unhealthy,
                "Coin feed has no market data".to_string(),
            )
        } else if state.error.is_some() {
            (
                HealthStatus::Degraded,
                format!(
                    "Coin feed is showing old data after {} failed fetches",
                    metrics.consecutive_failures
                ),
            )
        } else if stale {
            (
                HealthStatus::Degraded,
                "Coin feed snapshot is stale".to_string(),
            )
        } else {
            (
                HealthStatus::Healthy,
                "Coin feed is operational with fresh data".to_string(),
            )
        };

        ComponentHealth {
            name: "coin_feed".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }

    /// Cancels the poll timer and stops all further state writes
    pub fn shutdown(&mut self) {
        self.core.store.release();
        if let Some(poller) = self.poller.take() {
            poller.abort();
            tracing::info!(source = self.source_name(), "Stopped coin feed poller");
        }
    }
}

impl Drop for CoinFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FETCH_ERROR_MESSAGE;
    use crate::provider::mock::{batch, MockOutcome, MockSource};
    use crate::types::FeedStatus;

    fn feed_with(mock: &Arc<MockSource>) -> CoinFeed {
        CoinFeed::with_source(mock.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_fetch_and_refresh() {
        let mock = Arc::new(MockSource::new());
        mock.push_coins(batch("first", 30), Duration::from_secs(1));
        let feed = feed_with(&mock);

        let state = feed.snapshot();
        assert!(state.loading);
        assert!(state.coins.is_empty());
        assert_eq!(state.status(), FeedStatus::Initial);

        let mut rx = feed.subscribe();
        rx.wait_for(|s| s.sequence == 1).await.unwrap();
        let state = feed.snapshot();
        assert!(!state.loading);
        assert_eq!(state.coins.len(), 30);
        assert_eq!(state.status(), FeedStatus::Ready);

        mock.push_coins(batch("second", 30), Duration::from_secs(2));
        let refresh = feed.trigger_refresh().expect("feed is running");
        let state = feed.snapshot();
        assert!(state.refreshing);
        assert_eq!(state.status(), FeedStatus::Refreshing);
        assert_eq!(state.coins, batch("first", 30));

        assert_eq!(refresh.await.unwrap(), CommitOutcome::Committed);
        let state = feed.snapshot();
        assert!(!state.refreshing);
        assert!(!state.loading);
        assert_eq!(state.coins, batch("second", 30));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_coins_then_recovers() {
        let mock = Arc::new(MockSource::new());
        mock.push_coins(batch("good", 5), Duration::ZERO);
        let feed = feed_with(&mock);
        feed.subscribe().wait_for(|s| s.sequence == 1).await.unwrap();

        mock.push_error(500, Duration::ZERO);
        assert_eq!(feed.refresh_now().await, CommitOutcome::Committed);
        let state = feed.snapshot();
        assert_eq!(state.error.as_deref(), Some(FETCH_ERROR_MESSAGE));
        assert_eq!(state.coins, batch("good", 5));
        assert_eq!(state.status(), FeedStatus::Errored);
        assert!(!state.refreshing);

        mock.push_coins(batch("better", 4), Duration::ZERO);
        feed.refresh_now().await;
        let state = feed.snapshot();
        assert!(state.error.is_none());
        assert_eq!(state.coins, batch("better", 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_failure_reports_error_with_no_coins() {
        let mock = Arc::new(MockSource::new());
        mock.push(MockOutcome::Invalid("not json".to_string()), Duration::ZERO);
        let feed = feed_with(&mock);

        feed.subscribe().wait_for(|s| s.sequence == 1).await.unwrap();
        let state = feed.snapshot();
        assert!(state.coins.is_empty());
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some(FETCH_ERROR_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_does_not_overwrite_newer_refresh() {
        let mock = Arc::new(MockSource::new());
        mock.push_coins(batch("poll", 3), Duration::from_secs(10));
        let feed = feed_with(&mock);
        let mut events = feed.events();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mock.call_count(), 1);

        mock.push_coins(batch("refresh", 3), Duration::from_secs(1));
        let refresh = feed.trigger_refresh().expect("feed is running");
        assert_eq!(refresh.await.unwrap(), CommitOutcome::Committed);
        let state = feed.snapshot();
        assert_eq!(state.coins, batch("refresh", 3));
        assert!(state.loading, "poll still in flight");
        assert!(!state.refreshing);

        tokio::time::sleep(Duration::from_secs(15)).await;
        let state = feed.snapshot();
        assert_eq!(state.coins, batch("refresh", 3));
        assert_eq!(state.sequence, 2);
        assert!(!state.loading);

        let first = events.recv().await.unwrap();
        assert_eq!(first.event_type(), "SNAPSHOT_REPLACED");
        assert_eq!(first.sequence(), 2);
        let second = events.recv().await.unwrap();
        assert_eq!(second.event_type(), "STALE_RESULT_DISCARDED");
        assert_eq!(second.sequence(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let mock = Arc::new(MockSource::new());
        mock.set_fallback(MockOutcome::Coins(batch("steady", 2)));
        let feed = feed_with(&mock);
        assert_eq!(feed.config().refresh_interval, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(mock.call_count(), 3);
        assert_eq!(feed.snapshot().sequence, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_interval() {
        let mock = Arc::new(MockSource::new());
        mock.set_fallback(MockOutcome::Coins(batch("fast", 1)));
        let config = FeedConfig {
            refresh_interval: Duration::from_secs(5),
            ..FeedConfig::default()
        };
        let _feed = CoinFeed::with_config(mock.clone(), config);

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_timer_and_ignores_late_result() {
        let mock = Arc::new(MockSource::new());
        mock.push_coins(batch("late", 3), Duration::from_secs(5));
        mock.set_fallback(MockOutcome::Coins(batch("never", 3)));
        let feed = feed_with(&mock);
        let rx = feed.subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mock.call_count(), 1);
        drop(feed);

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(mock.call_count(), 1);
        let state = rx.borrow();
        assert!(state.coins.is_empty());
        assert_eq!(state.sequence, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_and_metrics() {
        let mock = Arc::new(MockSource::new());
        mock.push_coins(batch("ok", 2), Duration::from_millis(50));
        let feed = feed_with(&mock);

        assert_eq!(feed.health_check().await.status, HealthStatus::Unhealthy);

        feed.subscribe().wait_for(|s| s.sequence == 1).await.unwrap();
        let health = feed.health_check().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.details["coins"], serde_json::json!(2));

        mock.push_error(429, Duration::ZERO);
        feed.refresh_now().await;
        let health = feed.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);

        let metrics = feed.fetch_metrics().await;
        assert_eq!(metrics.source_name, "mock");
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_shutdown_does_nothing() {
        let mock = Arc::new(MockSource::new());
        mock.set_fallback(MockOutcome::Coins(batch("steady", 2)));
        let mut feed = feed_with(&mock);
        feed.subscribe().wait_for(|s| s.sequence == 1).await.unwrap();
        assert_eq!(mock.call_count(), 1);

        feed.shutdown();
        assert!(feed.trigger_refresh().is_none());
        assert_eq!(feed.refresh_now().await, CommitOutcome::Released);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.call_count(), 1);
        let state = feed.snapshot();
        assert!(!state.refreshing);
        assert_eq!(state.sequence, 1);
    }
}
