use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::policy::ReconciliationPolicy;
use crate::state::MatchView;
use crate::status::MatchStatus;

/// Everything the comparator is allowed to consult besides the two
/// matches themselves. Keeping it explicit keeps the ordering a pure
/// function of its inputs.
#[derive(Debug, Clone, Copy)]
pub struct RankContext<'a> {
    pub now: DateTime<Utc>,
    pub policy: &'a ReconciliationPolicy,
    pub favorites_enabled: bool,
}

/// Fixed weights: in-play outranks everything, then fixtures still to be
/// played, then results, then limbo states, then dead fixtures.
pub fn status_weight(status: MatchStatus) -> i32 {
    match status {
        MatchStatus::Live | MatchStatus::Halftime => 5,
        MatchStatus::Upcoming => 4,
        MatchStatus::Finished => 3,
        MatchStatus::Postponed | MatchStatus::Suspended => 2,
        MatchStatus::Canceled | MatchStatus::Abandoned => 1,
    }
}

/// Relevance decays from "now" in both directions: a match about to kick
/// off and one that just ended both beat a fixture next weekend. Missing
/// kickoffs sort to the far end of their tier.
fn temporal_distance_secs(view: &MatchView, now: DateTime<Utc>) -> i64 {
    match view.record.start_time {
        Some(start) => (start - now).num_seconds().abs(),
        None => i64::MAX,
    }
}

fn derived_minute(view: &MatchView) -> u16 {
    view.display_minute
        .as_ref()
        .and_then(|d| d.minute)
        .unwrap_or(0)
}

/// Total order over matches for display. Most significant key first:
/// favorites, canonical status tier, temporal proximity, competition
/// weight, live progress, then lexicographic fallbacks so equal-rank rows
/// never flicker on re-sort.
pub fn compare_matches(a: &MatchView, b: &MatchView, ctx: &RankContext) -> Ordering {
    if ctx.favorites_enabled {
        match (a.favorite, b.favorite) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }

    let tier = status_weight(b.status).cmp(&status_weight(a.status));
    if tier != Ordering::Equal {
        return tier;
    }

    let proximity = temporal_distance_secs(a, ctx.now).cmp(&temporal_distance_secs(b, ctx.now));
    if proximity != Ordering::Equal {
        return proximity;
    }

    let competition = ctx
        .policy
        .competition_weight(&b.record.competition)
        .cmp(&ctx.policy.competition_weight(&a.record.competition));
    if competition != Ordering::Equal {
        return competition;
    }

    if a.is_live() && b.is_live() {
        let progress = derived_minute(b).cmp(&derived_minute(a));
        if progress != Ordering::Equal {
            return progress;
        }
    }

    a.record
        .competition
        .cmp(&b.record.competition)
        .then_with(|| a.record.home_team.cmp(&b.record.home_team))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

pub fn sort_matches(matches: &mut [MatchView], ctx: &RankContext) {
    matches.sort_by(|a, b| compare_matches(a, b, ctx));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DisplayMinute;
    use crate::state::MatchRecord;
    use crate::status::{Bucket, bucket_for};
    use chrono::Duration;

    fn view(id: &str, status: MatchStatus, start_offset_mins: i64) -> MatchView {
        let mut record = MatchRecord::stub(id, "Home", "Away");
        record.start_time = Some(Utc::now() + Duration::minutes(start_offset_mins));
        MatchView {
            status,
            bucket: bucket_for(status, true),
            display_minute: None,
            favorite: false,
            record,
        }
    }

    #[test]
    fn live_outranks_everything() {
        let policy = ReconciliationPolicy::default();
        let ctx = RankContext {
            now: Utc::now(),
            policy: &policy,
            favorites_enabled: true,
        };
        let live = view("a", MatchStatus::Live, -30);
        let upcoming = view("b", MatchStatus::Upcoming, 5);
        let finished = view("c", MatchStatus::Finished, -200);
        assert_eq!(compare_matches(&live, &upcoming, &ctx), Ordering::Less);
        assert_eq!(compare_matches(&upcoming, &finished, &ctx), Ordering::Less);
        assert_eq!(compare_matches(&finished, &live, &ctx), Ordering::Greater);
    }

    #[test]
    fn self_comparison_is_equal() {
        let policy = ReconciliationPolicy::default();
        let ctx = RankContext {
            now: Utc::now(),
            policy: &policy,
            favorites_enabled: true,
        };
        let m = view("a", MatchStatus::Live, -10);
        assert_eq!(compare_matches(&m, &m, &ctx), Ordering::Equal);
    }

    #[test]
    fn greater_live_minute_ranks_first() {
        let policy = ReconciliationPolicy::default();
        let ctx = RankContext {
            now: Utc::now(),
            policy: &policy,
            favorites_enabled: true,
        };
        let mut early = view("a", MatchStatus::Live, -10);
        early.display_minute = Some(DisplayMinute {
            label: "9'".to_string(),
            minute: Some(9),
        });
        let mut late = view("b", MatchStatus::Live, -10);
        late.record.start_time = early.record.start_time;
        late.display_minute = Some(DisplayMinute {
            label: "71'".to_string(),
            minute: Some(71),
        });
        assert_eq!(compare_matches(&late, &early, &ctx), Ordering::Less);
    }
}
