//! # Coin Feed
//!
//! Auto-refreshing list of the top 30 cryptocurrencies by market cap,
//! fetched from CoinGecko's `/coins/markets` endpoint.
//!
//! ## Usage
//!
//! A `CoinFeed` polls the market list every 60 seconds for as long as it
//! is alive and publishes a read-only `FeedState`. The `view` module turns
//! that state into formatted, coloured rows.
//!
//! ```no_run
//! use coin_feed::{CoinFeed, FeedView};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let feed = CoinFeed::new()?;
//! let mut updates = feed.subscribe();
//!
//! loop {
//!     updates.changed().await?;
//!     let view = FeedView::from_state(&updates.borrow_and_update());
//!     print!("{}", coin_feed::view::render_ansi(&view));
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! CoinFeed (poll timer every 60s, trigger_refresh)
//!     ↓
//! CoinMarketSource (CoinGecko)
//!     ↓
//! FeedStore (sequence-checked commits, watch channel)
//!     ↓
//! FeedView / render_ansi
//! ```
//!
//! Fetch failures never reach the view as errors: the state keeps the
//! last good coins and carries a fixed message in `error`.

pub mod constants;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod store;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use error::ProviderError;
pub use feed::{CoinFeed, FeedConfig};
pub use metrics::FetchMetrics;
pub use provider::CoinMarketSource;
pub use providers::CoinGeckoSource;
pub use store::CommitOutcome;
pub use types::{
    CoinQuote, ComponentHealth, FeedEvent, FeedState, FeedStatus, HealthStatus,
};
pub use view::{color_for, format_percentage, format_price, CoinRow, FeedView, PercentColor};
