use chrono::{DateTime, Utc};

use crate::policy::ReconciliationPolicy;

/// Canonical match states. Everything the upstream feeds emit collapses
/// into one of these; raw strings never travel past the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStatus {
    Live,
    Halftime,
    Upcoming,
    Finished,
    Canceled,
    Postponed,
    Abandoned,
    Suspended,
}

impl MatchStatus {
    pub fn is_in_play(self) -> bool {
        matches!(self, MatchStatus::Live | MatchStatus::Halftime)
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchStatus::Live => "LIVE",
            MatchStatus::Halftime => "HT",
            MatchStatus::Upcoming => "UPCOMING",
            MatchStatus::Finished => "FT",
            MatchStatus::Canceled => "CANC",
            MatchStatus::Postponed => "POSTP",
            MatchStatus::Abandoned => "ABAN",
            MatchStatus::Suspended => "SUSP",
        }
    }
}

/// Display bucket a classified match lands in. `Unknown` is reserved for
/// records whose start time could not be parsed; they stay out of the
/// three primary views but remain listable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Live,
    Upcoming,
    Finished,
    Unknown,
}

/// Closed mapping of known upstream spellings. Kept as one flat table so a
/// new provider spelling is a one-line change and a miss is detectable.
const STATUS_SYNONYMS: &[(&str, MatchStatus)] = &[
    ("live", MatchStatus::Live),
    ("inprogress", MatchStatus::Live),
    ("in_progress", MatchStatus::Live),
    ("playing", MatchStatus::Live),
    ("1h", MatchStatus::Live),
    ("2h", MatchStatus::Live),
    ("first_half", MatchStatus::Live),
    ("second_half", MatchStatus::Live),
    ("et", MatchStatus::Live),
    ("extra_time", MatchStatus::Live),
    ("ht", MatchStatus::Halftime),
    ("halftime", MatchStatus::Halftime),
    ("half_time", MatchStatus::Halftime),
    ("break", MatchStatus::Halftime),
    ("ns", MatchStatus::Upcoming),
    ("scheduled", MatchStatus::Upcoming),
    ("not_started", MatchStatus::Upcoming),
    ("notstarted", MatchStatus::Upcoming),
    ("upcoming", MatchStatus::Upcoming),
    ("fixture", MatchStatus::Upcoming),
    ("tbd", MatchStatus::Upcoming),
    ("ft", MatchStatus::Finished),
    ("full_time", MatchStatus::Finished),
    ("fulltime", MatchStatus::Finished),
    ("ended", MatchStatus::Finished),
    ("finished", MatchStatus::Finished),
    ("afterextra", MatchStatus::Finished),
    ("after_extra_time", MatchStatus::Finished),
    ("aet", MatchStatus::Finished),
    ("penalties", MatchStatus::Finished),
    ("pen", MatchStatus::Finished),
    ("ap", MatchStatus::Finished),
    ("cancelled", MatchStatus::Canceled),
    ("canceled", MatchStatus::Canceled),
    ("canc", MatchStatus::Canceled),
    ("postponed", MatchStatus::Postponed),
    ("postp", MatchStatus::Postponed),
    ("abandoned", MatchStatus::Abandoned),
    ("aban", MatchStatus::Abandoned),
    ("suspended", MatchStatus::Suspended),
    ("susp", MatchStatus::Suspended),
    ("int", MatchStatus::Suspended),
    ("interrupted", MatchStatus::Suspended),
];

/// Case-insensitive table lookup; `None` means the spelling is not in the
/// closed mapping and the caller should record an anomaly.
pub fn lookup_status(raw: &str) -> Option<MatchStatus> {
    let needle = raw.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    STATUS_SYNONYMS
        .iter()
        .find(|(spelling, _)| *spelling == needle)
        .map(|(_, status)| *status)
}

/// Unrecognized strings fail open to `Upcoming`, the least alarming
/// state. Never an error: a feed typo must not take down the view.
pub fn normalize_status(raw: &str) -> MatchStatus {
    lookup_status(raw).unwrap_or(MatchStatus::Upcoming)
}

/// Corrects implausible status assignments against the one independent
/// signal the upstream cannot get wrong for us: our own clock.
///
/// A missing start time means the record cannot be live-validated at all;
/// the normalized status passes through and classification puts the match
/// in the unknown bucket.
pub fn validate_status(
    normalized: MatchStatus,
    start_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &ReconciliationPolicy,
) -> MatchStatus {
    let Some(start) = start_time else {
        return normalized;
    };
    if !normalized.is_in_play() {
        return normalized;
    }
    if now - start > policy.max_live_age {
        // Zombie: the feed forgot to move this match out of live.
        return MatchStatus::Finished;
    }
    if start > now {
        return MatchStatus::Upcoming;
    }
    normalized
}

pub fn bucket_for(status: MatchStatus, has_start_time: bool) -> Bucket {
    if !has_start_time {
        return Bucket::Unknown;
    }
    match status {
        MatchStatus::Live | MatchStatus::Halftime => Bucket::Live,
        // Postponed and suspended fixtures are still expected to be
        // played; they list with upcoming rather than with results.
        MatchStatus::Upcoming | MatchStatus::Postponed | MatchStatus::Suspended => Bucket::Upcoming,
        MatchStatus::Finished | MatchStatus::Canceled | MatchStatus::Abandoned => Bucket::Finished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup_status("InProgress"), Some(MatchStatus::Live));
        assert_eq!(lookup_status(" HT "), Some(MatchStatus::Halftime));
        assert_eq!(lookup_status("FULL_TIME"), Some(MatchStatus::Finished));
        assert_eq!(lookup_status("garbage"), None);
    }

    #[test]
    fn unknown_spellings_fail_open_to_upcoming() {
        assert_eq!(normalize_status("mystery_state"), MatchStatus::Upcoming);
        assert_eq!(normalize_status(""), MatchStatus::Upcoming);
    }

    #[test]
    fn zombie_live_is_corrected_to_finished() {
        let policy = ReconciliationPolicy::default();
        let now = Utc::now();
        let start = now - Duration::hours(5);
        assert_eq!(
            validate_status(MatchStatus::Live, Some(start), now, &policy),
            MatchStatus::Finished
        );
        assert_eq!(
            validate_status(MatchStatus::Halftime, Some(start), now, &policy),
            MatchStatus::Finished
        );
    }

    #[test]
    fn cutoff_is_exclusive() {
        let policy = ReconciliationPolicy::default();
        let now = Utc::now();
        let at_cutoff = now - policy.max_live_age;
        assert_eq!(
            validate_status(MatchStatus::Live, Some(at_cutoff), now, &policy),
            MatchStatus::Live
        );
        let past_cutoff = at_cutoff - Duration::seconds(1);
        assert_eq!(
            validate_status(MatchStatus::Live, Some(past_cutoff), now, &policy),
            MatchStatus::Finished
        );
    }

    #[test]
    fn premature_live_is_corrected_to_upcoming() {
        let policy = ReconciliationPolicy::default();
        let now = Utc::now();
        let start = now + Duration::hours(2);
        assert_eq!(
            validate_status(MatchStatus::Live, Some(start), now, &policy),
            MatchStatus::Upcoming
        );
    }

    #[test]
    fn missing_start_time_passes_through_and_buckets_unknown() {
        let policy = ReconciliationPolicy::default();
        let now = Utc::now();
        assert_eq!(
            validate_status(MatchStatus::Live, None, now, &policy),
            MatchStatus::Live
        );
        assert_eq!(bucket_for(MatchStatus::Live, false), Bucket::Unknown);
    }

    #[test]
    fn terminal_and_interrupted_states_bucket_apart() {
        assert_eq!(bucket_for(MatchStatus::Postponed, true), Bucket::Upcoming);
        assert_eq!(bucket_for(MatchStatus::Suspended, true), Bucket::Upcoming);
        assert_eq!(bucket_for(MatchStatus::Canceled, true), Bucket::Finished);
        assert_eq!(bucket_for(MatchStatus::Abandoned, true), Bucket::Finished);
    }
}
