//! Presentation of a feed snapshot
//!
//! Turns a `FeedState` into display-ready rows and renders them as an
//! ANSI-coloured table for the terminal.

use crate::{
    constants::{NEGATIVE_COLOR, POSITIVE_COLOR},
    types::{CoinQuote, FeedState},
};
use std::fmt::Write;

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";

/// Display color of a 24h change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentColor {
    /// Strictly positive change
    Positive,
    /// Zero or negative change
    Negative,
}

impl PercentColor {
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            PercentColor::Positive => POSITIVE_COLOR,
            PercentColor::Negative => NEGATIVE_COLOR,
        }
    }

    /// `rgb()` as a `#rrggbb` string
    pub fn hex(&self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }

    fn ansi(&self) -> String {
        let (r, g, b) = self.rgb();
        format!("\x1b[38;2;{};{};{}m", r, g, b)
    }
}

/// Chooses the display color for a 24h change. Zero counts as negative.
pub fn color_for(percentage: f64) -> PercentColor {
    if percentage > 0.0 {
        PercentColor::Positive
    } else {
        PercentColor::Negative
    }
}

/// Formats a 24h change with two decimals and an explicit `+` when positive
///
/// ```
/// use coin_feed::view::format_percentage;
///
/// assert_eq!(format_percentage(2.5), "+2.50%");
/// assert_eq!(format_percentage(-1.2), "-1.20%");
/// assert_eq!(format_percentage(0.0), "0.00%");
/// ```
pub fn format_percentage(percentage: f64) -> String {
    // -0.0 would otherwise print as "-0.00%"
    let percentage = if percentage == 0.0 { 0.0 } else { percentage };
    if percentage > 0.0 {
        format!("+{:.2}%", percentage)
    } else {
        format!("{:.2}%", percentage)
    }
}

/// Formats a USD price like `$1,234.50`, keeping 2 to 6 fraction digits
///
/// ```
/// use coin_feed::view::format_price;
///
/// assert_eq!(format_price(50000.0), "$50,000.00");
/// assert_eq!(format_price(0.00012345), "$0.000123");
/// ```
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return "N/A".to_string();
    }

    let fixed = format!("{:.6}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');
    let sign = if price < 0.0 { "-" } else { "" };

    format!(
        "{}${}.{:0<2}",
        sign,
        group_thousands(int_part),
        frac
    )
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// One display-ready line of the coin list
#[derive(Debug, Clone, PartialEq)]
pub struct CoinRow {
    /// 1-based position in the snapshot
    pub rank: usize,
    pub id: String,
    pub name: String,
    /// Upper-cased ticker
    pub symbol: String,
    pub image: String,
    pub price: String,
    /// Formatted 24h change, `--` when the source had none
    pub change: String,
    pub color: PercentColor,
}

impl CoinRow {
    pub fn from_quote(rank: usize, quote: &CoinQuote) -> Self {
        let (change, color) = match quote.price_change_percentage_24h {
            Some(p) => (format_percentage(p), color_for(p)),
            None => ("--".to_string(), PercentColor::Negative),
        };

        Self {
            rank,
            id: quote.id.clone(),
            name: quote.name.clone(),
            symbol: quote.display_symbol(),
            image: quote.image.clone(),
            price: format_price(quote.current_price),
            change,
            color,
        }
    }
}

/// What the surface shows for a given state
#[derive(Debug, Clone, PartialEq)]
pub enum FeedView {
    /// The last fetch failed; the list is replaced by the message
    Error(String),
    /// Nothing to show yet
    Loading,
    /// The coin list, in snapshot order
    List { rows: Vec<CoinRow>, refreshing: bool },
}

impl FeedView {
    pub fn from_state(state: &FeedState) -> Self {
        if let Some(message) = &state.error {
            return FeedView::Error(message.clone());
        }

        if state.loading && state.coins.is_empty() {
            return FeedView::Loading;
        }

        let rows = state
            .coins
            .iter()
            .enumerate()
            .map(|(i, quote)| CoinRow::from_quote(i + 1, quote))
            .collect();

        FeedView::List {
            rows,
            refreshing: state.refreshing,
        }
    }
}

/// Renders a view as an ANSI-coloured block of text
pub fn render_ansi(view: &FeedView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}Crypto Tracker{}", ANSI_BOLD, ANSI_RESET);
    let _ = writeln!(out, "{}Top 30{}", ANSI_DIM, ANSI_RESET);
    let _ = writeln!(out);

    match view {
        FeedView::Error(message) => {
            let _ = writeln!(
                out,
                "{}{}{}",
                PercentColor::Negative.ansi(),
                message,
                ANSI_RESET
            );
        }
        FeedView::Loading => {
            let _ = writeln!(out, "Loading coins...");
        }
        FeedView::List { rows, refreshing } => {
            if *refreshing {
                let _ = writeln!(out, "{}Refreshing...{}", ANSI_DIM, ANSI_RESET);
            }
            let _ = writeln!(
                out,
                "{}{:>3}  {:<22} {:<8} {:>16} {:>9}{}",
                ANSI_BOLD, "#", "NAME", "SYMBOL", "PRICE", "24H %", ANSI_RESET
            );
            for row in rows {
                let _ = writeln!(
                    out,
                    "{:>3}  {:<22} {:<8} {:>16} {}{:>9}{}",
                    row.rank,
                    truncate(&row.name, 22),
                    row.symbol,
                    row.price,
                    row.color.ansi(),
                    row.change,
                    ANSI_RESET
                );
            }
        }
    }

    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('~');
        cut
    }
}
