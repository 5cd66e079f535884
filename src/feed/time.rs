// Timestamp parsing for feed items.
//
// A rendered item carries its time either as a machine-readable attribute
// (RFC 3339, usually UTC) or as short relative text like "3h" or "2天".
// Everything is normalized to a naive UTC instant so a run never mixes zones.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDateTime};
use regex_lite::Regex;

/// Raw time information read from one rendered item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSignal {
    /// Machine-readable attribute value (e.g. the `datetime` attribute).
    pub absolute: Option<String>,
    /// Visible relative text (e.g. "5m", "3 hours", "2天").
    pub relative: Option<String>,
}

impl TimeSignal {
    pub fn relative(value: impl Into<String>) -> Self {
        Self {
            absolute: None,
            relative: Some(value.into()),
        }
    }

    /// Short description of the raw input, for diagnostics.
    pub fn describe(&self) -> String {
        match (&self.absolute, &self.relative) {
            (Some(a), Some(r)) => format!("{a} / {r}"),
            (Some(a), None) => a.clone(),
            (None, Some(r)) => r.clone(),
            (None, None) => "<none>".to_string(),
        }
    }
}

/// Outcome of parsing a `TimeSignal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTime {
    Absolute(NaiveDateTime),
    Relative(NaiveDateTime),
    /// Nothing parsed; the reference time is used instead.
    Fallback(NaiveDateTime),
}

impl ParsedTime {
    pub fn instant(self) -> NaiveDateTime {
        match self {
            ParsedTime::Absolute(t) | ParsedTime::Relative(t) | ParsedTime::Fallback(t) => t,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, ParsedTime::Fallback(_))
    }
}

/// Relative-time unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

/// Parse a time signal against the reference instant `now`.
///
/// The absolute form wins when it parses. Otherwise the leading number and
/// unit of the relative text are used to compute `now - amount`. If neither
/// works the result is `ParsedTime::Fallback(now)`.
pub fn parse_time(signal: &TimeSignal, now: NaiveDateTime) -> ParsedTime {
    if let Some(t) = signal.absolute.as_deref().and_then(parse_absolute) {
        return ParsedTime::Absolute(t);
    }
    // An amount too large to subtract is as unusable as no amount.
    let relative = signal
        .relative
        .as_deref()
        .and_then(parse_relative)
        .and_then(|ago| now.checked_sub_signed(ago));
    if let Some(t) = relative {
        return ParsedTime::Relative(t);
    }
    ParsedTime::Fallback(now)
}

/// Parse an absolute timestamp and drop its offset after converting to UTC.
pub fn parse_absolute(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    // Offset-less ISO timestamps are taken as already being UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Parse relative text such as "5m", "3 hours ago", "2天" into a duration.
pub fn parse_relative(raw: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)\s*([^\d\s]*)").expect("relative time pattern is valid")
    });

    let caps = re.captures(raw.trim())?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map(|m| m.as_str()).and_then(unit_of)?;

    let duration = match unit {
        Unit::Seconds => Duration::try_seconds(amount)?,
        Unit::Minutes => Duration::try_minutes(amount)?,
        Unit::Hours => Duration::try_hours(amount)?,
        Unit::Days => Duration::try_days(amount)?,
    };
    Some(duration)
}

fn unit_of(token: &str) -> Option<Unit> {
    let t = token.to_lowercase();
    if t.starts_with("分") || t.starts_with("min") || t == "m" {
        Some(Unit::Minutes)
    } else if t.starts_with("小时")
        || t.starts_with("小時")
        || t.starts_with("hour")
        || matches!(t.as_str(), "h" | "hr" | "hrs")
    {
        Some(Unit::Hours)
    } else if t.starts_with("天") || t.starts_with("day") || t == "d" {
        Some(Unit::Days)
    } else if t.starts_with("秒") || t.starts_with("sec") || t == "s" {
        Some(Unit::Seconds)
    } else {
        None
    }
}
