use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde_json::Value;

use crate::state::MatchRecord;

const DEFAULT_FEED_URL: &str = "http://127.0.0.1:8090/api/matches";
const REQUEST_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Boundary to the remote match repository. Implementations return raw,
/// unreconciled records for one calendar day; everything downstream of
/// this trait is synchronous and pure.
pub trait MatchSource: Send + Sync {
    fn fetch_day(&self, day: &str) -> Result<Vec<MatchRecord>>;
}

/// HTTP-backed source. The endpoint serves the day's fixture list as JSON
/// keyed by competition; the base URL comes from `MATCH_FEED_URL` when
/// set.
pub struct HttpMatchSource {
    base_url: String,
}

impl HttpMatchSource {
    pub fn from_env() -> Self {
        let base_url = env::var("MATCH_FEED_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        Self { base_url }
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl MatchSource for HttpMatchSource {
    fn fetch_day(&self, day: &str) -> Result<Vec<MatchRecord>> {
        let client = http_client()?;
        let url = format!("{}?date={}", self.base_url, normalize_day(day));
        let resp = client
            .get(&url)
            .header(USER_AGENT, "matchpulse/0.1")
            .send()
            .context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            anyhow::bail!("http {}: {}", status, body);
        }
        parse_match_feed_json(&body)
    }
}

/// Squeezes any date spelling down to the 8-digit day key the feed (and
/// the cache) use; inputs that are not a date pass through trimmed.
pub fn normalize_day(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 8 {
        digits
    } else {
        raw.trim().to_string()
    }
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Tolerant parse of the feed payload. The shape is nested competitions
/// with match arrays; provider quirks (string scores, missing blocks,
/// `null` bodies) degrade to absent fields, never to a parse failure for
/// the whole set.
pub fn parse_match_feed_json(raw: &str) -> Result<Vec<MatchRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid match feed json")?;

    let competitions = root
        .get("competitions")
        .or_else(|| root.get("leagues"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut records = Vec::new();
    for competition in &competitions {
        let competition_name = pick_str(competition, &["name", "displayName"]).unwrap_or_default();
        let competition_id = pick_u32(competition, &["primaryId", "id"]);
        let Some(fixtures) = competition
            .get("matches")
            .or_else(|| competition.get("fixtures"))
            .and_then(|v| v.as_array())
        else {
            continue;
        };
        for fixture in fixtures {
            if let Some(record) =
                parse_fixture(fixture, &competition_name, competition_id)
            {
                records.push(record);
            }
        }
    }
    Ok(records)
}

fn parse_fixture(value: &Value, competition: &str, competition_id: Option<u32>) -> Option<MatchRecord> {
    let id = pick_str(value, &["id", "matchId"])?;
    let home = value.get("home")?;
    let away = value.get("away")?;
    let status = value.get("status").unwrap_or(&Value::Null);

    Some(MatchRecord {
        id,
        source: pick_str(value, &["source", "provider"]).unwrap_or_default(),
        competition: competition.to_string(),
        competition_id,
        home_team: pick_str(home, &["name", "shortName"]).unwrap_or_default(),
        away_team: pick_str(away, &["name", "shortName"]).unwrap_or_default(),
        home_team_id: pick_u32(home, &["id"]),
        away_team_id: pick_u32(away, &["id"]),
        home_score: pick_i32(home, &["score"]),
        away_score: pick_i32(away, &["score"]),
        raw_status: pick_str(status, &["short", "type", "state"])
            .or_else(|| pick_str(value, &["state"]))
            .unwrap_or_default(),
        minute: pick_i64(status, &["minute", "elapsed"]),
        start_time: pick_str(status, &["utcTime", "startTime"])
            .or_else(|| pick_str(value, &["kickoff", "startTime"]))
            .as_deref()
            .and_then(parse_utc_time),
        updated_at: pick_str(value, &["updatedAt", "lastUpdated"])
            .as_deref()
            .and_then(parse_utc_time),
        current_period_start: pick_str(status, &["periodStartUtc", "currentPeriodStart"])
            .as_deref()
            .and_then(parse_utc_time),
    })
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DDTHH:MM[:SS]` assumed UTC.
/// Anything else is `None`; the record then lands in the unknown bucket
/// rather than poisoning classification.
pub fn parse_utc_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    let cleaned = trimmed.trim_end_matches('Z').replace(' ', "T");
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn pick_str(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            match v {
                Value::String(s) if !s.trim().is_empty() => return Some(s.trim().to_string()),
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }
    }
    None
}

fn pick_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(num) = v.as_u64() {
                return Some(num as u32);
            }
            if let Some(s) = v.as_str()
                && let Ok(num) = s.trim().parse::<u32>()
            {
                return Some(num);
            }
        }
    }
    None
}

fn pick_i32(value: &Value, keys: &[&str]) -> Option<i32> {
    pick_i64(value, keys).map(|num| num as i32)
}

fn pick_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(num) = v.as_i64() {
                return Some(num);
            }
            if let Some(s) = v.as_str()
                && let Ok(num) = s.trim().parse::<i64>()
            {
                return Some(num);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_normalization_strips_punctuation() {
        assert_eq!(normalize_day("2024-05-01"), "20240501");
        assert_eq!(normalize_day("20240501"), "20240501");
        assert_eq!(normalize_day(" today "), "today");
    }

    #[test]
    fn utc_time_accepts_common_spellings() {
        assert!(parse_utc_time("2024-05-01T18:30:00Z").is_some());
        assert!(parse_utc_time("2024-05-01T18:30:00+02:00").is_some());
        assert!(parse_utc_time("2024-05-01T18:30").is_some());
        assert!(parse_utc_time("2024-05-01 18:30:00").is_some());
        assert!(parse_utc_time("soon").is_none());
        assert!(parse_utc_time("").is_none());
    }
}
