//! Market list source implementations

pub mod coingecko;

pub use coingecko::{parse_markets, CoinGeckoSource};
