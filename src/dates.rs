//! Feed timestamp handling.
//!
//! Feeds publish dates in whatever format they like, so items keep the raw
//! string and these helpers interpret it when sorting or displaying.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Parses RFC 2822 (RSS), RFC 3339 (ISO-8601) and a few common zone-less
/// layouts, the latter read in the server's local timezone.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Timestamp used for ordering. Unparsable dates count as `now`, which
/// places them among the most recent items.
pub fn effective_timestamp(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    parse_pub_date(raw).unwrap_or(now)
}

/// "今日 HH:mm", "昨日 HH:mm" or "YYYY/MM/DD HH:mm" in the offset of `now`.
pub fn format_date(raw: &str, now: DateTime<FixedOffset>) -> Option<String> {
    let date = parse_pub_date(raw)?.with_timezone(&now.timezone());
    let today = now.date_naive();

    let label = if date.date_naive() == today {
        format!("今日 {}", date.format("%H:%M"))
    } else if today.pred_opt() == Some(date.date_naive()) {
        format!("昨日 {}", date.format("%H:%M"))
    } else {
        date.format("%Y/%m/%d %H:%M").to_string()
    };
    Some(label)
}

/// "N分前" under an hour, "N時間前" under a day, otherwise "N日前".
pub fn relative_time(raw: &str, now: DateTime<Utc>) -> Option<String> {
    let elapsed = now.signed_duration_since(parse_pub_date(raw)?);

    let label = if elapsed.num_minutes() < 60 {
        format!("{}分前", elapsed.num_minutes().max(0))
    } else if elapsed.num_hours() < 24 {
        format!("{}時間前", elapsed.num_hours())
    } else {
        format!("{}日前", elapsed.num_days())
    };
    Some(label)
}
