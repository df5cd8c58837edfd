//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(m|min|minute|h|hour|d|day)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~10 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Parse a datetime string as ISO 8601, relative time, or `now`.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "20 minutes ago", "2h ago", "1 day ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '20 minutes ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let minutes_per_unit = match &caps[2] {
        "m" | "min" | "minute" => 1,
        "h" | "hour" => 60,
        "d" | "day" => 60 * 24,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > MAX_RELATIVE_MINUTES / minutes_per_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Parse an optional `--at` value, defaulting to `now`.
pub fn parse_at(at: Option<&str>, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    at.map_or(Ok(now), |s| parse_datetime(s, now))
}

/// Years accepted for an explicit `--day`.
const DAY_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Parse a calendar day given as YYYY-MM-DD, `today` or `yesterday`.
pub fn parse_day(s: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let day = match s.trim() {
        "today" => today,
        "yesterday" => today
            .pred_opt()
            .context("Day out of range: yesterday")?,
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .with_context(|| format!("Invalid day: {other}. Use YYYY-MM-DD"))?,
    };
    if !DAY_YEARS.contains(&day.year()) {
        anyhow::bail!(
            "Day out of range: {day}. Use a year from {} to {}",
            DAY_YEARS.start(),
            DAY_YEARS.end()
        );
    }
    Ok(day)
}

/// Formats milliseconds as "Xh Ym" or "Xm".
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Formats a running timer as "M:SS" or "H:MM:SS".
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Local wall-clock time of `instant`, as "HH:MM".
pub fn format_clock<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format("%H:%M").to_string()
}

/// Local date and time of `instant`, as "YYYY-MM-DD HH:MM".
pub fn format_datetime<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

/// Rounds a volume for display: whole millilitres, tenths of an ounce.
pub fn format_volume(amount: f64, unit: cradle_core::VolumeUnit) -> String {
    match unit {
        cradle_core::VolumeUnit::Ml => format!("{amount:.0} {unit}"),
        cradle_core::VolumeUnit::Oz => format!("{amount:.1} {unit}"),
    }
}

/// Generates a 10-character bar for a ratio in `[0, 1]`.
/// Nonzero ratios below 5% still get a single block.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(ratio: f64) -> String {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = if ratio > 0.0 && ratio < 0.05 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

/// Name of the local IANA timezone, for headers.
pub fn timezone_name() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}
