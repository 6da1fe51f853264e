use std::env;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Duration as ChronoDuration;

/// Polling cadence as a step function of the live-match count.
///
/// Tiers are `(minimum live count, interval)` pairs sorted ascending by
/// count; the interval for a given count is the last tier whose threshold
/// is not above it, or `idle` when nothing is live. Intervals must be
/// non-increasing as load grows so the schedule stays predictable.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub idle: Duration,
    pub tiers: Vec<(usize, Duration)>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(30),
            tiers: vec![
                (1, Duration::from_millis(15_000)),
                (10, Duration::from_millis(3_000)),
                (20, Duration::from_millis(2_500)),
                (50, Duration::from_millis(2_000)),
                (100, Duration::from_millis(1_500)),
            ],
        }
    }
}

impl RefreshPolicy {
    pub fn new(idle: Duration, tiers: Vec<(usize, Duration)>) -> Result<Self> {
        let policy = Self { idle, tiers };
        policy.check()?;
        Ok(policy)
    }

    fn check(&self) -> Result<()> {
        let mut prev_count = 0usize;
        let mut prev_interval = self.idle;
        for (count, interval) in &self.tiers {
            if *count <= prev_count && prev_count != 0 {
                bail!("refresh tiers must have ascending live counts");
            }
            if *count == 0 {
                bail!("refresh tier threshold must be at least 1");
            }
            if *interval > prev_interval {
                bail!("refresh intervals must not increase with load");
            }
            prev_count = *count;
            prev_interval = *interval;
        }
        Ok(())
    }

    pub fn interval_for(&self, live_count: usize) -> Duration {
        let mut interval = self.idle;
        for (count, tier_interval) in &self.tiers {
            if live_count >= *count {
                interval = *tier_interval;
            } else {
                break;
            }
        }
        interval
    }
}

/// Every heuristic constant the reconciliation pipeline consults, gathered
/// in one explicitly constructed object so call sites cannot drift apart
/// on thresholds and tests can pin deterministic values.
#[derive(Debug, Clone)]
pub struct ReconciliationPolicy {
    /// Matches still flagged live this long after kickoff are corrected
    /// to finished.
    pub max_live_age: ChronoDuration,
    /// Upstream minute values further than this from the wall-clock
    /// elapsed minutes are treated as unreliable.
    pub minute_tolerance: i64,
    /// Upstream minute values above this are never trusted.
    pub minute_ceiling: i64,
    /// Cached result sets older than this are stale (still served as a
    /// fallback, but a background refresh is due).
    pub cache_ttl: Duration,
    pub refresh: RefreshPolicy,
    /// Competition name -> display weight; matched exactly first, then by
    /// substring in either direction.
    pub competition_weights: Vec<(String, i32)>,
    pub favorite_teams: Vec<String>,
    pub favorite_competitions: Vec<String>,
    pub prioritize_favorites: bool,
    /// Feed names in descending authority, used only to break dedupe ties.
    pub authoritative_sources: Vec<String>,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            max_live_age: ChronoDuration::hours(3),
            minute_tolerance: 20,
            minute_ceiling: 130,
            cache_ttl: Duration::from_secs(300),
            refresh: RefreshPolicy::default(),
            competition_weights: default_competition_weights(),
            favorite_teams: Vec::new(),
            favorite_competitions: Vec::new(),
            prioritize_favorites: true,
            authoritative_sources: Vec::new(),
        }
    }
}

impl ReconciliationPolicy {
    /// Relaxed profile: tolerates feeds that keep matches live through long
    /// stoppages (extra time, abandoned-and-resumed fixtures).
    pub fn relaxed() -> Self {
        Self {
            max_live_age: ChronoDuration::hours(10),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let mut policy = Self::default();

        if let Some(mins) = parse_env::<i64>("ZOMBIE_CUTOFF_MINS") {
            policy.max_live_age = ChronoDuration::minutes(mins.clamp(90, 24 * 60));
        }
        if let Some(mins) = parse_env::<i64>("CLOCK_TOLERANCE_MINS") {
            policy.minute_tolerance = mins.clamp(1, 60);
        }
        if let Some(secs) = parse_env::<u64>("CACHE_TTL_SECS") {
            policy.cache_ttl = Duration::from_secs(secs.clamp(30, 3600));
        }
        if let Some(secs) = parse_env::<u64>("IDLE_POLL_SECS") {
            policy.refresh.idle = Duration::from_secs(secs.clamp(5, 600));
        }
        if let Some(secs) = parse_env::<u64>("LIVE_POLL_SECS") {
            let base = Duration::from_secs(secs.clamp(2, 120));
            if let Some(first) = policy.refresh.tiers.first_mut() {
                first.1 = base;
            }
            // Faster tiers keep their defaults unless the base dropped
            // below them; never let the table increase with load.
            for tier in policy.refresh.tiers.iter_mut().skip(1) {
                if tier.1 > base {
                    tier.1 = base;
                }
            }
        }

        policy.favorite_teams = list_env("FAVORITE_TEAMS");
        policy.favorite_competitions = list_env("FAVORITE_LEAGUES");
        if let Ok(raw) = env::var("PRIORITIZE_FAVORITES") {
            policy.prioritize_favorites = !matches!(raw.trim(), "0" | "false" | "no");
        }
        let sources = list_env("FEED_SOURCE_PRIORITY");
        if !sources.is_empty() {
            policy.authoritative_sources = sources;
        }

        policy
    }

    pub fn competition_weight(&self, name: &str) -> i32 {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return 0;
        }
        for (entry, weight) in &self.competition_weights {
            if entry.to_lowercase() == needle {
                return *weight;
            }
        }
        for (entry, weight) in &self.competition_weights {
            let entry_lower = entry.to_lowercase();
            if needle.contains(&entry_lower) || entry_lower.contains(&needle) {
                return *weight;
            }
        }
        0
    }

    pub fn source_rank(&self, source: &str) -> usize {
        let needle = source.trim().to_lowercase();
        self.authoritative_sources
            .iter()
            .position(|s| s.to_lowercase() == needle)
            .unwrap_or(self.authoritative_sources.len())
    }

    pub fn is_favorite_team(&self, team: &str) -> bool {
        let needle = team.trim().to_lowercase();
        self.favorite_teams
            .iter()
            .any(|fav| fav.to_lowercase() == needle)
    }

    pub fn is_favorite_competition(&self, competition: &str) -> bool {
        let needle = competition.trim().to_lowercase();
        self.favorite_competitions
            .iter()
            .any(|fav| needle.contains(&fav.to_lowercase()))
    }
}

fn default_competition_weights() -> Vec<(String, i32)> {
    [
        ("Champions League", 100),
        ("World Cup", 98),
        ("European Championship", 95),
        ("Premier League", 90),
        ("La Liga", 88),
        ("LaLiga", 88),
        ("Serie A", 86),
        ("Bundesliga", 84),
        ("Ligue 1", 82),
        ("Europa League", 78),
        ("Conference League", 70),
        ("Copa Libertadores", 66),
        ("Eredivisie", 58),
        ("Primeira Liga", 56),
        ("Championship", 52),
        ("HNL", 48),
        ("Major League Soccer", 44),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse().ok())
}

fn list_env(key: &str) -> Vec<String> {
    let Ok(raw) = env::var(key) else {
        return Vec::new();
    };
    raw.split([',', ';'])
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
