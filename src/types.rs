//! Types for the coin feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the ranked market list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinQuote {
    /// Stable identifier, unique within a batch
    pub id: String,

    /// Ticker, displayed upper-cased
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Logo URL
    pub image: String,

    /// Latest price in USD
    pub current_price: f64,

    /// 24h price change percentage, absent when the source has none
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,

    /// Market capitalization in USD, the ranking key
    pub market_cap: f64,
}

impl CoinQuote {
    /// Checks the invariants a decoded entry must hold before it is accepted
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty()
            && self.current_price.is_finite()
            && self.market_cap.is_finite()
            && self
                .price_change_percentage_24h
                .map_or(true, |p| p.is_finite())
    }

    /// Ticker as shown to the user
    pub fn display_symbol(&self) -> String {
        self.symbol.to_uppercase()
    }
}

/// Effective state of the feed, derived from the `FeedState` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    /// Nothing committed yet
    Initial,
    /// Last committed fetch succeeded
    Ready,
    /// Last committed fetch failed
    Errored,
    /// A manual refresh is in flight
    Refreshing,
}

/// Read-only snapshot of the feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedState {
    /// Latest successful batch, kept when a later fetch fails
    pub coins: Vec<CoinQuote>,

    /// True while any fetch is in flight
    pub loading: bool,

    /// True while a manual refresh is in flight
    pub refreshing: bool,

    /// Set by a failed fetch, cleared by the next successful one
    pub error: Option<String>,

    /// When the current `coins` were received
    pub fetched_at: Option<DateTime<Utc>>,

    /// Sequence number of the last committed fetch attempt (0 = none)
    pub sequence: u64,
}

impl FeedState {
    /// State of a freshly created feed: empty and loading
    pub fn initial() -> Self {
        Self {
            coins: Vec::new(),
            loading: true,
            refreshing: false,
            error: None,
            fetched_at: None,
            sequence: 0,
        }
    }

    pub fn status(&self) -> FeedStatus {
        if self.refreshing {
            FeedStatus::Refreshing
        } else if self.error.is_some() {
            FeedStatus::Errored
        } else if self.sequence == 0 {
            FeedStatus::Initial
        } else {
            FeedStatus::Ready
        }
    }

    /// Age of the current coins, `None` if nothing was ever received
    pub fn age(&self) -> Option<std::time::Duration> {
        self.fetched_at.map(|at| {
            let duration = Utc::now().signed_duration_since(at);
            std::time::Duration::from_secs(duration.num_seconds().max(0) as u64)
        })
    }

    /// Check if the coins are older than `threshold_seconds` (or missing)
    pub fn is_stale(&self, threshold_seconds: u64) -> bool {
        match self.age() {
            Some(age) => age.as_secs() > threshold_seconds,
            None => true,
        }
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Feed events broadcast to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedEvent {
    /// A fetch succeeded and replaced the snapshot
    SnapshotReplaced {
        id: Uuid,
        count: usize,
        sequence: u64,
        timestamp: DateTime<Utc>,
    },

    /// A fetch failed; the snapshot was kept
    FetchFailed {
        id: Uuid,
        error_message: String,
        sequence: u64,
        timestamp: DateTime<Utc>,
    },

    /// A fetch completed after a newer one had already been committed
    StaleResultDiscarded {
        id: Uuid,
        sequence: u64,
        timestamp: DateTime<Utc>,
    },
}

impl FeedEvent {
    pub fn snapshot_replaced(count: usize, sequence: u64) -> Self {
        Self::SnapshotReplaced {
            id: Uuid::new_v4(),
            count,
            sequence,
            timestamp: Utc::now(),
        }
    }

    pub fn fetch_failed(error_message: impl Into<String>, sequence: u64) -> Self {
        Self::FetchFailed {
            id: Uuid::new_v4(),
            error_message: error_message.into(),
            sequence,
            timestamp: Utc::now(),
        }
    }

    pub fn stale_result_discarded(sequence: u64) -> Self {
        Self::StaleResultDiscarded {
            id: Uuid::new_v4(),
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Sequence number of the fetch attempt the event belongs to
    pub fn sequence(&self) -> u64 {
        match self {
            FeedEvent::SnapshotReplaced { sequence, .. } => *sequence,
            FeedEvent::FetchFailed { sequence, .. } => *sequence,
            FeedEvent::StaleResultDiscarded { sequence, .. } => *sequence,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::SnapshotReplaced { .. } => "SNAPSHOT_REPLACED",
            FeedEvent::FetchFailed { .. } => "FETCH_FAILED",
            FeedEvent::StaleResultDiscarded { .. } => "STALE_RESULT_DISCARDED",
        }
    }
}

impl std::fmt::Display for FeedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedEvent::SnapshotReplaced {
                count, sequence, ..
            } => write!(f, "Snapshot #{} replaced with {} coins", sequence, count),
            FeedEvent::FetchFailed {
                error_message,
                sequence,
                ..
            } => write!(f, "Fetch #{} failed: {}", sequence, error_message),
            FeedEvent::StaleResultDiscarded { sequence, .. } => {
                write!(f, "Fetch #{} discarded as stale", sequence)
            }
        }
    }
}

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Fresh data and the last attempt succeeded
    Healthy,
    /// Data is shown but stale or the last attempt failed
    Degraded,
    /// No data to show
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
