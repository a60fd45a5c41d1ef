//! Timestamp normalization between the two boundaries calendar items
//! cross:
//!
//! - Every timestamp sent to or received from an assistant tool
//!   carries an explicit UTC offset in the user's timezone.
//! - Every timestamp written to storage is UTC.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, SubsecRound,
    TimeZone, Utc,
};
use chrono_tz::Tz;

/// Resolve an IANA timezone name, falling back to UTC when the name
/// is not recognized.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!("Unknown timezone {:?}, using UTC", name);
            Tz::UTC
        }
    }
}

/// The UTC offset of `tz` at the instant `at`.
pub fn utc_offset(tz: Tz, at: DateTime<Utc>) -> FixedOffset {
    tz.offset_from_utc_datetime(&at.naive_utc()).fix()
}

/// Format an offset as `+HH:MM` / `-HH:MM`.
pub fn format_offset(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
}

/// Parse a timestamp received from a tool call. Values with an offset
/// (including `Z`) are taken as is. Values without one are read as
/// wall clock time in `tz`.
pub fn parse_tool_timestamp(value: &str, tz: Tz) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("`{}` is not an ISO 8601 date-time", value))?;

    // Ambiguous local times (DST fall back) resolve to the earlier
    // instant and skipped ones (spring forward) are rejected
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("`{}` does not exist in {}", value, tz.name()))
}

/// Parse the upper bound of a range. A bare date covers that whole day
/// so `to: "2025-10-24"` includes items ending that evening.
pub fn parse_tool_range_end(value: &str, tz: Tz) -> Result<DateTime<Utc>, String> {
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(date) => {
            let next = date
                .succ_opt()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| format!("`{}` is out of range", value))?;
            tz.from_local_datetime(&next)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc) - Duration::seconds(1))
                .ok_or_else(|| format!("`{}` does not exist in {}", value, tz.name()))
        }
        Err(_) => parse_tool_timestamp(value, tz),
    }
}

/// Render a stored instant for a tool result in the user's timezone.
pub fn to_tool_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Render an instant for storage. The fixed width keeps stored values
/// ordered lexically so range filters can compare them directly.
pub fn to_storage_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Drop what storage can't hold so an item built in memory equals the
/// same item read back.
pub fn to_storage_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

pub fn parse_storage_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Today's date in `tz`, formatted as `YYYY-MM-DD`.
pub fn local_date(tz: Tz, at: DateTime<Utc>) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d").to_string()
}
