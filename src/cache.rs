use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::state::MatchRecord;

/// Handle for one issued fetch. The token comes from a single monotonic
/// counter; the cancel flag is flipped when a newer fetch for the same key
/// supersedes this one, and workers are expected to check it between
/// steps.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub key: String,
    pub token: u64,
    pub background: bool,
    cancel: Arc<AtomicBool>,
}

impl FetchTicket {
    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// What happened to a completed fetch at the fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Latest token for its key: the payload (or error) was applied.
    Applied,
    /// Superseded or canceled: discarded without touching shared state.
    Superseded,
}

/// Read-only view of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheView {
    pub records: Vec<MatchRecord>,
    pub has_payload: bool,
    pub loading: bool,
    pub refreshing: bool,
    pub stale: bool,
    pub error: Option<String>,
    pub age: Option<Duration>,
}

#[derive(Debug, Default)]
struct Entry {
    records: Vec<MatchRecord>,
    has_payload: bool,
    fetched_at: Option<Instant>,
    loading: bool,
    refreshing: bool,
    error: Option<String>,
    latest_token: u64,
    inflight_cancel: Option<Arc<AtomicBool>>,
}

/// Per-query-key result cache with TTL and request fencing.
///
/// Explicitly constructed and shared as `Arc<FetchCache>`; there is no
/// module-level singleton, so tests get fresh state for free. All
/// mutation funnels through `begin`/`complete`/`invalidate`, which hold
/// the map lock only for the duration of the bookkeeping; network I/O
/// happens outside, in whichever worker owns the ticket.
#[derive(Debug, Default)]
pub struct FetchCache {
    counter: AtomicU64,
    entries: Mutex<HashMap<String, Entry>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fenced ticket for `key`, cancelling any fetch still in
    /// flight for it. A foreground fetch flips the loading flag only when
    /// there is no payload to show meanwhile; refreshes of a populated
    /// entry report through the separate refreshing flag so the initial
    /// paint indicator never flickers.
    pub fn begin(&self, key: &str, background: bool) -> FetchTicket {
        assert!(!key.trim().is_empty(), "cache key must not be empty");
        let token = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));

        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let entry = entries.entry(key.to_string()).or_default();
        if let Some(previous) = entry.inflight_cancel.take() {
            previous.store(true, Ordering::SeqCst);
        }
        entry.latest_token = token;
        entry.inflight_cancel = Some(cancel.clone());
        if background || entry.has_payload {
            entry.refreshing = true;
        } else {
            entry.loading = true;
        }

        FetchTicket {
            key: key.to_string(),
            token,
            background,
            cancel,
        }
    }

    /// Applies a fetch result behind the fence. Only the latest issued
    /// ticket for the key may mutate the entry; anything older resolves as
    /// a silent no-op. Failures keep the previous payload as a stale
    /// fallback and record the error beside it.
    pub fn complete(&self, ticket: &FetchTicket, result: Result<Vec<MatchRecord>>) -> FetchOutcome {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let Some(entry) = entries.get_mut(&ticket.key) else {
            return FetchOutcome::Superseded;
        };
        if ticket.token != entry.latest_token || ticket.is_canceled() {
            return FetchOutcome::Superseded;
        }

        entry.inflight_cancel = None;
        entry.loading = false;
        entry.refreshing = false;
        match result {
            Ok(records) => {
                entry.records = records;
                entry.has_payload = true;
                entry.fetched_at = Some(Instant::now());
                entry.error = None;
            }
            Err(err) => {
                entry.error = Some(format!("{err:#}"));
            }
        }
        FetchOutcome::Applied
    }

    pub fn snapshot(&self, key: &str, ttl: Duration) -> CacheView {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let Some(entry) = entries.get(key) else {
            return CacheView {
                records: Vec::new(),
                has_payload: false,
                loading: false,
                refreshing: false,
                stale: false,
                error: None,
                age: None,
            };
        };
        let age = entry.fetched_at.map(|at| at.elapsed());
        CacheView {
            records: entry.records.clone(),
            has_payload: entry.has_payload,
            loading: entry.loading,
            refreshing: entry.refreshing,
            stale: entry.has_payload && age.map(|a| a > ttl).unwrap_or(true),
            error: entry.error.clone(),
            age,
        }
    }

    /// Fresh means a payload exists and its TTL has not lapsed; callers
    /// may serve it without touching the network.
    pub fn is_fresh(&self, key: &str, ttl: Duration) -> bool {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(key)
            .and_then(|entry| {
                entry
                    .has_payload
                    .then_some(())
                    .and(entry.fetched_at.map(|at| at.elapsed() <= ttl))
            })
            .unwrap_or(false)
    }

    /// Manual refresh: the payload stays (fallback on failure) but the
    /// entry is aged out so the next access refetches.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.fetched_at = None;
        }
    }

    /// True while a fetch issued for `key` has not yet resolved.
    pub fn has_inflight(&self, key: &str) -> bool {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(key)
            .map(|entry| entry.inflight_cancel.is_some())
            .unwrap_or(false)
    }
}
