//! Terminal coin tracker
//!
//! Run with: cargo run --bin coin-feed
//!
//! Type `r` + Enter to refresh, `q` + Enter (or Ctrl-C) to quit.
//! With stdin closed or redirected the tracker keeps running until Ctrl-C.
//! Logs go to stderr; set RUST_LOG to change the filter.

use coin_feed::{view::render_ansi, CoinFeed, FeedView};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

fn draw(view: &FeedView) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}{}", CLEAR_SCREEN, render_ansi(view))?;
    writeln!(stdout, "\n[r] refresh  [q] quit")?;
    stdout.flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,coin_feed=debug")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut feed = CoinFeed::new()?;
    info!(source = feed.source_name(), "Coin feed started");

    let mut updates = feed.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let view = FeedView::from_state(&updates.borrow_and_update());
    draw(&view)?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = FeedView::from_state(&updates.borrow_and_update());
                draw(&view)?;
            }
            line = input.next_line(), if stdin_open => {
                match line?.as_deref().map(str::trim) {
                    Some("r") => {
                        feed.trigger_refresh();
                    }
                    Some("q") => break,
                    Some(_) => {}
                    None => {
                        info!("stdin closed, running until Ctrl-C");
                        stdin_open = false;
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }

    feed.shutdown();
    let metrics = feed.fetch_metrics().await;
    info!(
        total_requests = metrics.total_requests,
        failed_requests = metrics.failed_requests,
        latency_p50_ms = metrics.latency_p50_ms,
        "Coin feed stopped"
    );

    Ok(())
}
