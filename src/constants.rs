//! Constants for the coin feed
//!
//! All configuration for the feed is centralized here.
//! No runtime configuration (config.yml, env vars) is used - the feed
//! operates with these compile-time constants.

/// How often the feed re-fetches the market list (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 60;

/// How long before a snapshot is reported as stale by the health check (in seconds)
pub const STALE_THRESHOLD_SECS: u64 = 300;

/// HTTP request timeout when fetching the market list (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko API endpoint for ranked market data
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// Fixed query for the markets endpoint, in request order
pub const MARKETS_QUERY: &[(&str, &str)] = &[
    ("vs_currency", "usd"),
    ("order", "market_cap_desc"),
    ("per_page", "30"),
    ("page", "1"),
    ("sparkline", "false"),
];

/// User agent for HTTP requests
pub const USER_AGENT: &str = "coin-feed/0.1.0";

/// Message shown to the user whenever a fetch fails, whatever the cause
pub const FETCH_ERROR_MESSAGE: &str = "Failed to load coins";

/// Display color for a strictly positive 24h change (#10b981)
pub const POSITIVE_COLOR: (u8, u8, u8) = (0x10, 0xb9, 0x81);

/// Display color for a zero or negative 24h change (#ef4444)
pub const NEGATIVE_COLOR: (u8, u8, u8) = (0xef, 0x44, 0x44);

/// Capacity of the feed event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
