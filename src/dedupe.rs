use std::collections::HashMap;

use crate::policy::ReconciliationPolicy;
use crate::state::MatchRecord;

/// Lowercases, trims and collapses whitespace so provider spelling quirks
/// ("Arsenal FC " vs "arsenal  fc") land on the same key.
pub fn normalize_team(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Composite identity of the real-world fixture: both team names plus the
/// kickoff rounded to the minute. Records with no parsable kickoff key on
/// their upstream id so they can never be merged by accident.
pub fn fixture_key(record: &MatchRecord) -> String {
    match record.start_time {
        Some(start) => format!(
            "{}|{}|{}",
            normalize_team(&record.home_team),
            normalize_team(&record.away_team),
            start.timestamp() / 60
        ),
        None => format!("id|{}", record.id),
    }
}

/// Collapses records that describe the same fixture, keeping the one with
/// the later upstream write and breaking remaining ties by source
/// authority, then by id. Single hash-map pass; the output is sorted by
/// fixture key so the result set is independent of input order. Returns
/// the surviving records and how many were collapsed.
pub fn dedupe_records(
    records: Vec<MatchRecord>,
    policy: &ReconciliationPolicy,
) -> (Vec<MatchRecord>, usize) {
    let total = records.len();
    let mut by_key: HashMap<String, MatchRecord> = HashMap::with_capacity(total);

    for record in records {
        let key = fixture_key(&record);
        match by_key.get_mut(&key) {
            Some(existing) => {
                if replaces(existing, &record, policy) {
                    *existing = record;
                }
            }
            None => {
                by_key.insert(key, record);
            }
        }
    }

    let mut keyed: Vec<(String, MatchRecord)> = by_key.into_iter().collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    let deduped: Vec<MatchRecord> = keyed.into_iter().map(|(_, record)| record).collect();
    let dropped = total - deduped.len();
    (deduped, dropped)
}

/// True when `candidate` should replace `existing` for the same fixture.
fn replaces(existing: &MatchRecord, candidate: &MatchRecord, policy: &ReconciliationPolicy) -> bool {
    match (existing.updated_at, candidate.updated_at) {
        (Some(a), Some(b)) if a != b => return b > a,
        (None, Some(_)) => return true,
        (Some(_), None) => return false,
        _ => {}
    }
    let existing_rank = policy.source_rank(&existing.source);
    let candidate_rank = policy.source_rank(&candidate.source);
    if existing_rank != candidate_rank {
        return candidate_rank < existing_rank;
    }
    candidate.id < existing.id
}
