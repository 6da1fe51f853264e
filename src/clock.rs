use chrono::{DateTime, Utc};

use crate::policy::ReconciliationPolicy;
use crate::state::MatchRecord;
use crate::status::MatchStatus;

/// Elapsed-time value shown next to a live match. `minute` carries the
/// numeric estimate when one exists (it also feeds the live-progress
/// tie-break when ranking); `label` is what the viewer sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMinute {
    pub label: String,
    pub minute: Option<u16>,
}

impl DisplayMinute {
    fn numeric(minute: i64) -> Self {
        Self {
            label: format_minute(minute),
            minute: Some(minute as u16),
        }
    }

    fn marker(label: &str) -> Self {
        Self {
            label: label.to_string(),
            minute: None,
        }
    }
}

/// Derives the display clock for one match. Returns `None` unless the
/// validated status is live or halftime.
///
/// The upstream minute is used only when it passes the reliability check;
/// otherwise the estimate falls back to the current-period anchor when the
/// feed supplies one. With neither, the match shows a bare "LIVE" marker:
/// a wrong derived number erodes trust faster than an honest unknown.
pub fn estimate_minute(
    record: &MatchRecord,
    status: MatchStatus,
    now: DateTime<Utc>,
    policy: &ReconciliationPolicy,
) -> Option<DisplayMinute> {
    match status {
        MatchStatus::Halftime => Some(DisplayMinute::marker("HT")),
        MatchStatus::Live => Some(live_minute(record, now, policy)),
        _ => None,
    }
}

fn live_minute(
    record: &MatchRecord,
    now: DateTime<Utc>,
    policy: &ReconciliationPolicy,
) -> DisplayMinute {
    if let Some(minute) = record.minute
        && minute_is_plausible(minute, record.start_time, now, policy)
    {
        return DisplayMinute::numeric(minute);
    }

    if let Some(period_start) = record.current_period_start
        && let Some(start) = record.start_time
        && period_start <= now
    {
        // Second-half anchor: a period that opened well after kickoff is
        // the restart, so the clock resumes from 45.
        let offset = if (period_start - start).num_minutes() > 45 {
            45
        } else {
            0
        };
        let estimated = offset + (now - period_start).num_minutes() + 1;
        if estimated > 0 && estimated <= policy.minute_ceiling {
            return DisplayMinute::numeric(estimated);
        }
    }

    DisplayMinute::marker("LIVE")
}

/// Reliability check for the upstream minute counter: positive, under the
/// sane ceiling, and within tolerance of the wall-clock elapsed minutes.
/// Wall elapsed runs ahead of match minutes (halftime break), which the
/// tolerance absorbs.
pub fn minute_is_plausible(
    minute: i64,
    start_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &ReconciliationPolicy,
) -> bool {
    if minute <= 0 || minute > policy.minute_ceiling {
        return false;
    }
    let Some(start) = start_time else {
        // No kickoff to cross-check against; accept the bounded value.
        return true;
    };
    let wall = (now - start).num_minutes();
    (minute - wall).abs() <= policy.minute_tolerance
}

/// Injury time renders as a base+added split; past 90+15 the match is in
/// extra time and tagged as such.
fn format_minute(minute: i64) -> String {
    if minute > 105 {
        format!("{minute}' (ET)")
    } else if minute > 90 {
        format!("90+{}'", minute - 90)
    } else if minute > 45 && minute <= 60 {
        format!("45+{}'", minute - 45)
    } else {
        format!("{minute}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn live_record(minutes_ago: i64, upstream_minute: Option<i64>) -> MatchRecord {
        let mut record = MatchRecord::stub("m1", "Home", "Away");
        record.raw_status = "live".to_string();
        record.start_time = Some(Utc::now() - Duration::minutes(minutes_ago));
        record.minute = upstream_minute;
        record
    }

    #[test]
    fn none_outside_live_and_halftime() {
        let policy = ReconciliationPolicy::default();
        let record = live_record(30, Some(29));
        for status in [
            MatchStatus::Upcoming,
            MatchStatus::Finished,
            MatchStatus::Canceled,
            MatchStatus::Postponed,
            MatchStatus::Abandoned,
            MatchStatus::Suspended,
        ] {
            assert!(estimate_minute(&record, status, Utc::now(), &policy).is_none());
        }
    }

    #[test]
    fn halftime_is_a_marker_without_a_number() {
        let policy = ReconciliationPolicy::default();
        let record = live_record(50, Some(45));
        let display = estimate_minute(&record, MatchStatus::Halftime, Utc::now(), &policy).unwrap();
        assert_eq!(display.label, "HT");
        assert_eq!(display.minute, None);
    }

    #[test]
    fn trusted_upstream_minute_wins() {
        let policy = ReconciliationPolicy::default();
        let record = live_record(30, Some(29));
        let display = estimate_minute(&record, MatchStatus::Live, Utc::now(), &policy).unwrap();
        assert_eq!(display.label, "29'");
        assert_eq!(display.minute, Some(29));
    }

    #[test]
    fn implausible_minute_falls_back_to_marker() {
        let policy = ReconciliationPolicy::default();
        // Claims minute 85 half an hour after kickoff.
        let record = live_record(30, Some(85));
        let display = estimate_minute(&record, MatchStatus::Live, Utc::now(), &policy).unwrap();
        assert_eq!(display.label, "LIVE");
        assert_eq!(display.minute, None);
    }

    #[test]
    fn period_anchor_estimates_second_half() {
        let policy = ReconciliationPolicy::default();
        let now = Utc::now();
        let mut record = live_record(75, None);
        // Second half restarted 12 minutes ago.
        record.current_period_start = Some(now - Duration::minutes(12));
        let display = estimate_minute(&record, MatchStatus::Live, now, &policy).unwrap();
        assert_eq!(display.minute, Some(58));
        assert_eq!(display.label, "45+13'");
    }

    #[test]
    fn injury_and_extra_time_formatting() {
        assert_eq!(format_minute(12), "12'");
        assert_eq!(format_minute(45), "45'");
        assert_eq!(format_minute(47), "45+2'");
        assert_eq!(format_minute(60), "45+15'");
        assert_eq!(format_minute(61), "61'");
        assert_eq!(format_minute(90), "90'");
        assert_eq!(format_minute(94), "90+4'");
        assert_eq!(format_minute(105), "90+15'");
        assert_eq!(format_minute(112), "112' (ET)");
    }

    #[test]
    fn ceiling_rejects_absurd_counters() {
        let policy = ReconciliationPolicy::default();
        assert!(!minute_is_plausible(500, None, Utc::now(), &policy));
        assert!(!minute_is_plausible(0, None, Utc::now(), &policy));
        assert!(!minute_is_plausible(-3, None, Utc::now(), &policy));
    }
}
