use std::env;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::cache::{FetchCache, FetchOutcome, FetchTicket};
use crate::clock::{estimate_minute, minute_is_plausible};
use crate::dedupe::dedupe_records;
use crate::match_fetch::{MatchSource, day_key, normalize_day};
use crate::policy::ReconciliationPolicy;
use crate::rank::{RankContext, sort_matches};
use crate::scheduler::RefreshScheduler;
use crate::state::{Delta, EngineCommand, MatchRecord, MatchView, QuerySnapshot, live_count};
use crate::status::{Bucket, bucket_for, lookup_status};
use crate::status::{MatchStatus, validate_status};

/// Result of one pure reconcile pass over a raw record set.
#[derive(Debug)]
pub struct ReconcileOutput {
    pub matches: Vec<MatchView>,
    pub unknown: Vec<MatchView>,
    pub anomalies: Vec<String>,
    pub duplicates_dropped: usize,
}

/// The synchronous pipeline: dedupe, normalize, validate, annotate, rank.
/// No I/O and no shared state: given the same records, clock and policy
/// it always produces the same projection, which is what makes the whole
/// engine testable with a pinned `now`.
pub fn reconcile(
    records: Vec<MatchRecord>,
    now: DateTime<Utc>,
    policy: &ReconciliationPolicy,
    favorites_enabled: bool,
) -> ReconcileOutput {
    let mut anomalies = Vec::new();
    let (deduped, duplicates_dropped) = dedupe_records(records, policy);
    if duplicates_dropped > 0 {
        anomalies.push(format!(
            "[INFO] Collapsed {duplicates_dropped} duplicate record(s)"
        ));
    }

    let mut matches = Vec::new();
    let mut unknown = Vec::new();
    for record in deduped {
        let normalized = match lookup_status(&record.raw_status) {
            Some(status) => status,
            None => {
                anomalies.push(format!(
                    "[WARN] Unknown status '{}' on {} vs {} ({})",
                    record.raw_status, record.home_team, record.away_team, record.id
                ));
                MatchStatus::Upcoming
            }
        };
        if record.start_time.is_none() {
            anomalies.push(format!(
                "[WARN] Unparsable kickoff on {} vs {} ({}); excluded from views",
                record.home_team, record.away_team, record.id
            ));
        }
        let status = validate_status(normalized, record.start_time, now, policy);
        if status == MatchStatus::Live
            && let Some(minute) = record.minute
            && !minute_is_plausible(minute, record.start_time, now, policy)
        {
            anomalies.push(format!(
                "[WARN] Implausible minute {minute} on {} ({})",
                record.home_team, record.id
            ));
        }
        let bucket = bucket_for(status, record.start_time.is_some());
        let favorite = policy.is_favorite_team(&record.home_team)
            || policy.is_favorite_team(&record.away_team)
            || policy.is_favorite_competition(&record.competition);
        let display_minute = estimate_minute(&record, status, now, policy);
        let view = MatchView {
            status,
            bucket,
            display_minute,
            favorite,
            record,
        };
        if view.bucket == Bucket::Unknown {
            unknown.push(view);
        } else {
            matches.push(view);
        }
    }

    let ctx = RankContext {
        now,
        policy,
        favorites_enabled,
    };
    sort_matches(&mut matches, &ctx);
    unknown.sort_by(|a, b| a.record.id.cmp(&b.record.id));

    ReconcileOutput {
        matches,
        unknown,
        anomalies,
        duplicates_dropped,
    }
}

enum Job {
    Tick,
    Fetched {
        ticket: FetchTicket,
        result: anyhow::Result<Vec<MatchRecord>>,
    },
}

/// Spawns the provider thread. Raw records come in through `source`, the
/// reconciled projection goes out through `tx` as `Delta`s, and the
/// consumer steers with `cmd_rx`. The thread ends on
/// `EngineCommand::Shutdown` or when the command channel closes.
pub fn spawn_engine(
    policy: ReconciliationPolicy,
    source: Arc<dyn MatchSource>,
    tx: Sender<Delta>,
    cmd_rx: Receiver<EngineCommand>,
    initial_day: Option<String>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let cache = Arc::new(FetchCache::new());
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let tick_tx = job_tx.clone();
        let mut scheduler = RefreshScheduler::start(policy.refresh.clone(), move || {
            let _ = tick_tx.send(Job::Tick);
        });
        let pool = build_fetch_pool();

        let mut favorites_enabled = policy.prioritize_favorites;
        let mut current_day = initial_day
            .map(|day| normalize_day(&day))
            .unwrap_or_else(|| day_key(Utc::now().date_naive()));
        let mut last_clock_refresh = Instant::now();
        let mut last_live_count = 0usize;

        request_fetch(&cache, &source, &pool, &job_tx, &current_day, false);
        emit_snapshot(
            &cache,
            &policy,
            favorites_enabled,
            &current_day,
            &tx,
            false,
        );

        'outer: loop {
            loop {
                match cmd_rx.try_recv() {
                    Ok(EngineCommand::SelectDay { day }) => {
                        current_day = normalize_day(&day);
                        if cache.is_fresh(&current_day, policy.cache_ttl) {
                            let _ = tx.send(Delta::Log(format!(
                                "[INFO] Serving {current_day} from cache"
                            )));
                        } else {
                            request_fetch(&cache, &source, &pool, &job_tx, &current_day, false);
                        }
                        last_live_count = emit_snapshot(
                            &cache,
                            &policy,
                            favorites_enabled,
                            &current_day,
                            &tx,
                            false,
                        );
                        scheduler.update_live_count(last_live_count);
                    }
                    Ok(EngineCommand::Refetch) => {
                        cache.invalidate(&current_day);
                        request_fetch(&cache, &source, &pool, &job_tx, &current_day, false);
                        last_live_count = emit_snapshot(
                            &cache,
                            &policy,
                            favorites_enabled,
                            &current_day,
                            &tx,
                            false,
                        );
                    }
                    Ok(EngineCommand::PrefetchWindow { days }) => {
                        let today = Utc::now().date_naive();
                        for offset in 1..=days.min(14) as i64 {
                            let Some(date) = today.checked_add_signed(ChronoDuration::days(offset))
                            else {
                                continue;
                            };
                            let day = day_key(date);
                            if !cache.is_fresh(&day, policy.cache_ttl)
                                && !cache.has_inflight(&day)
                            {
                                request_fetch(&cache, &source, &pool, &job_tx, &day, true);
                            }
                        }
                    }
                    Ok(EngineCommand::SetFavoritesEnabled(enabled)) => {
                        favorites_enabled = enabled;
                        last_live_count = emit_snapshot(
                            &cache,
                            &policy,
                            favorites_enabled,
                            &current_day,
                            &tx,
                            false,
                        );
                    }
                    Ok(EngineCommand::Shutdown) | Err(TryRecvError::Disconnected) => break 'outer,
                    Err(TryRecvError::Empty) => break,
                }
            }

            match job_rx.recv_timeout(Duration::from_millis(400)) {
                Ok(Job::Tick) => {
                    if !cache.has_inflight(&current_day) {
                        request_fetch(&cache, &source, &pool, &job_tx, &current_day, true);
                    }
                }
                Ok(Job::Fetched { ticket, result }) => {
                    let key = ticket.key.clone();
                    match cache.complete(&ticket, result) {
                        FetchOutcome::Applied => {
                            if key == current_day {
                                last_live_count = emit_snapshot(
                                    &cache,
                                    &policy,
                                    favorites_enabled,
                                    &current_day,
                                    &tx,
                                    true,
                                );
                                scheduler.update_live_count(last_live_count);
                                last_clock_refresh = Instant::now();
                            } else {
                                let _ = tx.send(Delta::Log(format!(
                                    "[INFO] Prefetched {key}"
                                )));
                            }
                        }
                        FetchOutcome::Superseded => {
                            let _ = tx.send(Delta::Log(format!(
                                "[INFO] Discarded superseded response for {key}"
                            )));
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break 'outer,
            }

            // While matches are in play the display clock drifts by itself;
            // re-derive it between fetches so the minute keeps moving.
            if last_live_count > 0 && last_clock_refresh.elapsed() >= Duration::from_secs(30) {
                last_live_count = emit_snapshot(
                    &cache,
                    &policy,
                    favorites_enabled,
                    &current_day,
                    &tx,
                    false,
                );
                scheduler.update_live_count(last_live_count);
                last_clock_refresh = Instant::now();
            }
        }

        scheduler.stop();
    })
}

/// Issues a fenced fetch for `day` and hands the blocking request to a
/// worker. The worker never touches shared state; it reports back through
/// the job channel and the fence decides whether the payload lands.
fn request_fetch(
    cache: &Arc<FetchCache>,
    source: &Arc<dyn MatchSource>,
    pool: &Option<rayon::ThreadPool>,
    job_tx: &Sender<Job>,
    day: &str,
    background: bool,
) {
    let ticket = cache.begin(day, background);
    let source = source.clone();
    let job_tx = job_tx.clone();
    let day = day.to_string();
    let job = move || {
        let result = if ticket.is_canceled() {
            Err(anyhow::anyhow!("canceled before dispatch"))
        } else {
            source.fetch_day(&day)
        };
        let _ = job_tx.send(Job::Fetched { ticket, result });
    };
    if let Some(pool) = pool.as_ref() {
        pool.spawn(job);
    } else {
        thread::spawn(job);
    }
}

fn emit_snapshot(
    cache: &Arc<FetchCache>,
    policy: &ReconciliationPolicy,
    favorites_enabled: bool,
    day: &str,
    tx: &Sender<Delta>,
    log_anomalies: bool,
) -> usize {
    let view = cache.snapshot(day, policy.cache_ttl);
    let output = reconcile(view.records, Utc::now(), policy, favorites_enabled);
    if log_anomalies {
        for line in &output.anomalies {
            let _ = tx.send(Delta::Log(line.clone()));
        }
    }
    let count = live_count(&output.matches);
    let snapshot = QuerySnapshot {
        key: day.to_string(),
        matches: output.matches,
        unknown: output.unknown,
        live_count: count,
        loading: view.loading,
        background_refreshing: view.refreshing,
        stale: view.stale,
        error: view.error,
    };
    let _ = tx.send(Delta::Snapshot(snapshot));
    count
}

fn build_fetch_pool() -> Option<rayon::ThreadPool> {
    let threads = env::var("FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(4)
        .clamp(2, 32);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}
