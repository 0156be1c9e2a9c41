//! In-memory feed state with watch-channel broadcast
//!
//! Every fetch attempt is issued a ticket carrying a monotonically
//! increasing sequence number. A completed attempt is committed only when
//! its number is newer than the last committed one, so an old response
//! that lands late never overwrites a newer snapshot.

use crate::{
    constants::FETCH_ERROR_MESSAGE,
    types::{CoinQuote, FeedState},
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Issued by `FeedStore::begin_fetch`, handed back to `FeedStore::complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    /// Sequence number of the attempt, starting at 1
    pub sequence: u64,
    /// True for a user-initiated refresh
    pub manual: bool,
}

/// What `FeedStore::complete` did with a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The result replaced the snapshot (success) or set the error (failure)
    Committed,
    /// A newer attempt was already committed; the result was dropped
    Stale,
    /// The store was released; nothing was written
    Released,
}

#[derive(Debug, Default)]
struct InFlight {
    next_sequence: u64,
    fetches: usize,
    refreshes: usize,
}

/// Owner of the feed state
///
/// Readers subscribe through a `watch` channel; all writes go through
/// `begin_fetch` / `complete` and are serialized by an internal lock.
pub struct FeedStore {
    state: watch::Sender<FeedState>,
    in_flight: Mutex<InFlight>,
    alive: AtomicBool,
}

impl FeedStore {
    /// Creates a store in the initial (empty, loading) state
    pub fn new() -> Self {
        let (state, _) = watch::channel(FeedState::initial());
        Self {
            state,
            in_flight: Mutex::new(InFlight::default()),
            alive: AtomicBool::new(true),
        }
    }

    /// Returns a copy of the current state
    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// True until `release` is called
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Stops all further writes. Fetches still in flight complete as `Released`.
    pub fn release(&self) {
        self.alive.store(false, Ordering::Release);
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new in-flight fetch and raises `loading` (and `refreshing`
    /// for manual refreshes)
    pub fn begin_fetch(&self, manual: bool) -> FetchTicket {
        let mut in_flight = self.lock_in_flight();
        in_flight.next_sequence += 1;
        in_flight.fetches += 1;
        if manual {
            in_flight.refreshes += 1;
        }

        if self.is_alive() {
            self.state.send_modify(|state| {
                state.loading = true;
                state.refreshing = state.refreshing || manual;
            });
        }

        FetchTicket {
            sequence: in_flight.next_sequence,
            manual,
        }
    }

    /// Completes a fetch
    ///
    /// On success the coins are replaced wholesale and the error cleared; on
    /// failure the error is set to `FETCH_ERROR_MESSAGE` and the coins are
    /// kept. `loading` / `refreshing` drop once no fetch / refresh remains
    /// in flight, whether or not the result itself was committed.
    pub fn complete<E>(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<CoinQuote>, E>,
    ) -> CommitOutcome {
        let mut in_flight = self.lock_in_flight();
        in_flight.fetches = in_flight.fetches.saturating_sub(1);
        if ticket.manual {
            in_flight.refreshes = in_flight.refreshes.saturating_sub(1);
        }

        if !self.is_alive() {
            return CommitOutcome::Released;
        }

        let loading = in_flight.fetches > 0;
        let refreshing = in_flight.refreshes > 0;
        let stale = ticket.sequence <= self.state.borrow().sequence;

        self.state.send_modify(|state| {
            if !stale {
                match result {
                    Ok(coins) => {
                        state.coins = coins;
                        state.error = None;
                        state.fetched_at = Some(Utc::now());
                    }
                    Err(_) => {
                        state.error = Some(FETCH_ERROR_MESSAGE.to_string());
                    }
                }
                state.sequence = ticket.sequence;
            }
            state.loading = loading;
            state.refreshing = refreshing;
        });

        if stale {
            CommitOutcome::Stale
        } else {
            CommitOutcome::Committed
        }
    }
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}
