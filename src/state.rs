use chrono::{DateTime, Utc};

use crate::clock::DisplayMinute;
use crate::status::{Bucket, MatchStatus};

/// One raw upstream match record after JSON parsing. Field values are
/// untrusted: the status string is opaque, the minute may be wrong, and
/// timestamps may be missing. Records are ephemeral: every poll cycle
/// rebuilds them from scratch.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub id: String,
    pub source: String,
    pub competition: String,
    pub competition_id: Option<u32>,
    pub home_team: String,
    pub away_team: String,
    pub home_team_id: Option<u32>,
    pub away_team_id: Option<u32>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub raw_status: String,
    pub minute: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
}

impl MatchRecord {
    /// Blank record for tests and seeds; only identity fields filled.
    pub fn stub(id: &str, home: &str, away: &str) -> Self {
        Self {
            id: id.to_string(),
            source: String::new(),
            competition: String::new(),
            competition_id: None,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_team_id: None,
            away_team_id: None,
            home_score: None,
            away_score: None,
            raw_status: String::new(),
            minute: None,
            start_time: None,
            updated_at: None,
            current_period_start: None,
        }
    }
}

/// Immutable projection of one match as of a reconcile pass. The canonical
/// status is recomputed on every pass, never stored upstream, so stale
/// feed states heal themselves as wall-clock time advances.
#[derive(Debug, Clone)]
pub struct MatchView {
    pub record: MatchRecord,
    pub status: MatchStatus,
    pub bucket: Bucket,
    pub display_minute: Option<DisplayMinute>,
    pub favorite: bool,
}

impl MatchView {
    pub fn is_live(&self) -> bool {
        self.status.is_in_play()
    }

    pub fn score_line(&self) -> String {
        match (self.record.home_score, self.record.away_score) {
            (Some(h), Some(a)) => format!("{h}-{a}"),
            _ => "-".to_string(),
        }
    }
}

pub fn live_count(matches: &[MatchView]) -> usize {
    matches.iter().filter(|m| m.is_live()).count()
}

/// What a consumer sees for one query key. `matches` is ordered by the
/// priority comparator; `unknown` holds records that could not be
/// classified (unparsable start time) and stays out of the primary views.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub key: String,
    pub matches: Vec<MatchView>,
    pub unknown: Vec<MatchView>,
    pub live_count: usize,
    pub loading: bool,
    pub background_refreshing: bool,
    pub stale: bool,
    pub error: Option<String>,
}

impl QuerySnapshot {
    pub fn empty(key: &str) -> Self {
        Self {
            key: key.to_string(),
            matches: Vec::new(),
            unknown: Vec::new(),
            live_count: 0,
            loading: false,
            background_refreshing: false,
            stale: false,
            error: None,
        }
    }
}

/// Everything the engine pushes to its consumer flows through this single
/// channel: fresh snapshots and diagnostic log lines. The consumer never
/// reaches into engine state directly.
#[derive(Debug, Clone)]
pub enum Delta {
    Snapshot(QuerySnapshot),
    Log(String),
}

/// Commands a consumer sends the engine thread.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Switch the active query to another calendar day (YYYYMMDD or any
    /// spelling `normalize_day` accepts).
    SelectDay { day: String },
    /// User-initiated refresh of the active day; invalidates the cache
    /// entry so the next fetch goes to the network.
    Refetch,
    /// Warm the cache for the next `days` calendar days in the background.
    PrefetchWindow { days: usize },
    SetFavoritesEnabled(bool),
    Shutdown,
}
