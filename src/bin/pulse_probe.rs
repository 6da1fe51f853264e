use std::env;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use matchpulse::engine::spawn_engine;
use matchpulse::fake_feed::FakeMatchSource;
use matchpulse::match_fetch::{HttpMatchSource, MatchSource};
use matchpulse::policy::ReconciliationPolicy;
use matchpulse::state::{Delta, EngineCommand, QuerySnapshot};

/// Console probe for the reconciliation engine: spawns it against the
/// fake or real feed, prints each snapshot as it lands, and exits after
/// PROBE_SECS. Handy for eyeballing zombie correction and ordering
/// without a frontend.
fn main() {
    dotenvy::dotenv().ok();

    let source: Arc<dyn MatchSource> = match env::var("FEED_SOURCE").as_deref() {
        Ok("http") => Arc::new(HttpMatchSource::from_env()),
        _ => Arc::new(FakeMatchSource::new()),
    };
    let run_secs = env::var("PROBE_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(20)
        .clamp(1, 600);
    let day = env::var("PROBE_DAY").ok();

    let policy = ReconciliationPolicy::from_env();
    let (tx, rx) = mpsc::channel::<Delta>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>();
    let handle = spawn_engine(policy, source, tx, cmd_rx, day);

    let _ = cmd_tx.send(EngineCommand::PrefetchWindow { days: 2 });

    let deadline = Instant::now() + Duration::from_secs(run_secs);
    while Instant::now() < deadline {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Delta::Snapshot(snapshot)) => print_snapshot(&snapshot),
            Ok(Delta::Log(line)) => println!("{line}"),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = cmd_tx.send(EngineCommand::Shutdown);
    let _ = handle.join();
}

fn print_snapshot(snapshot: &QuerySnapshot) {
    let mut flags = Vec::new();
    if snapshot.loading {
        flags.push("loading");
    }
    if snapshot.background_refreshing {
        flags.push("refreshing");
    }
    if snapshot.stale {
        flags.push("stale");
    }
    println!(
        "== {} | {} match(es), {} live{}{}",
        snapshot.key,
        snapshot.matches.len(),
        snapshot.live_count,
        if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(","))
        },
        snapshot
            .error
            .as_deref()
            .map(|e| format!(" err: {e}"))
            .unwrap_or_default(),
    );
    for m in &snapshot.matches {
        println!(
            "  {:<8} {:>6} {:<22} {:>5} {:<22} {}{}",
            m.status.label(),
            m.display_minute
                .as_ref()
                .map(|d| d.label.clone())
                .unwrap_or_default(),
            m.record.home_team,
            m.score_line(),
            m.record.away_team,
            m.record.competition,
            if m.favorite { " *" } else { "" },
        );
    }
    for m in &snapshot.unknown {
        println!(
            "  ?        {:<22} {:>5} {:<22} {} (no kickoff time)",
            m.record.home_team,
            m.score_line(),
            m.record.away_team,
            m.record.competition,
        );
    }
}
