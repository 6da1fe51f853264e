use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::match_fetch::MatchSource;
use crate::state::MatchRecord;

/// Offline stand-in for the remote repository. Serves a fixed slate of
/// fixtures pinned to the current wall clock so every feed pathology the
/// reconciler handles (zombies, premature live flags, duplicate sources,
/// unknown statuses, broken timestamps) shows up without a network.
pub struct FakeMatchSource {
    jitter: bool,
}

impl FakeMatchSource {
    pub fn new() -> Self {
        Self { jitter: true }
    }

    /// No score/minute jitter; used where tests want stable output.
    pub fn fixed() -> Self {
        Self { jitter: false }
    }
}

impl Default for FakeMatchSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchSource for FakeMatchSource {
    fn fetch_day(&self, _day: &str) -> Result<Vec<MatchRecord>> {
        let mut records = seed_records(Utc::now());
        if self.jitter {
            let mut rng = rand::thread_rng();
            for record in &mut records {
                if record.raw_status == "live" || record.raw_status == "inprogress" {
                    if rng.gen_bool(0.15) {
                        record.home_score = record.home_score.map(|s| s + 1);
                    }
                    record.minute = record.minute.map(|m| m + rng.gen_range(0..2));
                }
            }
        }
        Ok(records)
    }
}

fn record(
    id: &str,
    competition: &str,
    home: &str,
    away: &str,
    raw_status: &str,
    start_time: Option<DateTime<Utc>>,
    source: &str,
) -> MatchRecord {
    let mut rec = MatchRecord::stub(id, home, away);
    rec.competition = competition.to_string();
    rec.raw_status = raw_status.to_string();
    rec.start_time = start_time;
    rec.updated_at = start_time;
    rec.source = source.to_string();
    rec
}

/// One slate covering every reconciliation path. Kickoffs are relative to
/// `now` so the temporal validator sees the same geometry on every run.
pub fn seed_records(now: DateTime<Utc>) -> Vec<MatchRecord> {
    let mut records = Vec::new();

    // Plain live match with a trustworthy clock.
    let mut live = record(
        "fake-live-1",
        "Premier League",
        "Arsenal",
        "Chelsea",
        "live",
        Some(now - Duration::minutes(31)),
        "alpha",
    );
    live.home_score = Some(1);
    live.away_score = Some(0);
    live.minute = Some(30);
    live.updated_at = Some(now - Duration::minutes(1));
    records.push(live);

    // Halftime, upstream minute frozen at 45.
    let mut halftime = record(
        "fake-ht-1",
        "La Liga",
        "Sevilla",
        "Real Betis",
        "ht",
        Some(now - Duration::minutes(55)),
        "alpha",
    );
    halftime.home_score = Some(0);
    halftime.away_score = Some(0);
    halftime.minute = Some(45);
    records.push(halftime);

    // Zombie: flagged in progress five hours after kickoff.
    let mut zombie = record(
        "fake-zombie-1",
        "Serie A",
        "Torino",
        "Genoa",
        "inprogress",
        Some(now - Duration::hours(5)),
        "alpha",
    );
    zombie.home_score = Some(2);
    zombie.away_score = Some(2);
    zombie.minute = Some(87);
    records.push(zombie);

    // Pushed live two hours before kickoff.
    records.push(record(
        "fake-early-1",
        "Bundesliga",
        "Mainz",
        "Augsburg",
        "live",
        Some(now + Duration::hours(2)),
        "alpha",
    ));

    // Upcoming tonight and tomorrow.
    records.push(record(
        "fake-up-1",
        "HNL",
        "Dinamo Zagreb",
        "Hajduk Split",
        "ns",
        Some(now + Duration::hours(3)),
        "alpha",
    ));
    records.push(record(
        "fake-up-2",
        "Ligue 1",
        "Lyon",
        "Monaco",
        "scheduled",
        Some(now + Duration::hours(26)),
        "alpha",
    ));

    // Finished earlier today.
    let mut finished = record(
        "fake-ft-1",
        "Premier League",
        "Everton",
        "Fulham",
        "ft",
        Some(now - Duration::hours(4)),
        "alpha",
    );
    finished.home_score = Some(3);
    finished.away_score = Some(1);
    records.push(finished);

    // Duplicate pair: same fixture from two providers, beta wrote later.
    let kickoff = now + Duration::minutes(90);
    let mut dup_a = record(
        "fake-dup-a",
        "Eredivisie",
        "Ajax",
        "Feyenoord",
        "ns",
        Some(kickoff),
        "alpha",
    );
    dup_a.updated_at = Some(now - Duration::minutes(20));
    records.push(dup_a);
    let mut dup_b = record(
        "fake-dup-b",
        "Eredivisie",
        "Ajax",
        "Feyenoord",
        "ns",
        Some(kickoff),
        "beta",
    );
    dup_b.updated_at = Some(now - Duration::minutes(5));
    records.push(dup_b);

    // Unknown status spelling straight from a provider change log.
    records.push(record(
        "fake-odd-1",
        "Championship",
        "Leeds",
        "Norwich",
        "awaiting_officials",
        Some(now + Duration::hours(6)),
        "alpha",
    ));

    // Broken timestamp: classifiable by nobody.
    records.push(record(
        "fake-broken-1",
        "Primeira Liga",
        "Braga",
        "Porto",
        "ns",
        None,
        "alpha",
    ));

    records
}
