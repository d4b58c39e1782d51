//! Publication date normalization.
//!
//! Feeds in the wild put almost anything in `pubDate`. Layouts are tried in
//! order and the first match wins; text nothing matches yields `None` and the
//! post is stored without a publication time.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy)]
enum Layout {
    /// RFC 2822 / RFC 1123, weekday optional
    Rfc2822,
    Rfc3339,
    /// strftime layout ending in a numeric offset
    Offset(&'static str),
    /// strftime layout followed by an alphabetic zone abbreviation
    ZoneName(&'static str),
    /// strftime layout with no zone at all, read as UTC
    Naive(&'static str),
    /// Date only, midnight UTC
    Date(&'static str),
}

const LAYOUTS: &[Layout] = &[
    // Zone names first: RFC 2822 parsing reads unlisted names as -0000
    Layout::ZoneName("%a, %d %b %Y %H:%M:%S"),
    Layout::ZoneName("%a, %d %B %Y %H:%M:%S"),
    Layout::ZoneName("%d %b %Y %H:%M:%S"),
    Layout::ZoneName("%a, %d %b %Y %H:%M"),
    Layout::Rfc2822,
    Layout::Offset("%a, %d %b %Y %H:%M:%S %:z"),
    Layout::Offset("%a, %d %B %Y %H:%M:%S %z"),
    Layout::Offset("%A, %d %B %Y %H:%M:%S %z"),
    Layout::Offset("%d %b %Y %H:%M:%S %z"),
    Layout::Rfc3339,
    Layout::Offset("%Y-%m-%dT%H:%M:%S%.f%z"),
    Layout::Offset("%Y-%m-%d %H:%M:%S %z"),
    Layout::Naive("%a, %d %b %Y %H:%M:%S"),
    Layout::Naive("%d %b %Y %H:%M:%S"),
    Layout::Naive("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::Naive("%Y-%m-%d %H:%M:%S"),
    Layout::Date("%Y-%m-%d"),
    Layout::Date("%a, %d %b %Y"),
    Layout::Date("%d %b %Y"),
];

/// Parse a feed's raw publication date into UTC.
///
/// Returns `None` for empty or unrecognized input. Never panics.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }

    if let Some(parsed) = try_layouts(&cleaned) {
        return Some(parsed);
    }

    // Hand-built feeds often carry a weekday that disagrees with the date
    strip_weekday(&cleaned).and_then(try_layouts)
}

fn try_layouts(s: &str) -> Option<DateTime<Utc>> {
    LAYOUTS.iter().find_map(|layout| apply(*layout, s))
}

fn apply(layout: Layout, s: &str) -> Option<DateTime<Utc>> {
    match layout {
        Layout::Rfc2822 => DateTime::parse_from_rfc2822(s).ok().map(to_utc),
        Layout::Rfc3339 => DateTime::parse_from_rfc3339(s).ok().map(to_utc),
        Layout::Offset(fmt) => DateTime::parse_from_str(s, fmt).ok().map(to_utc),
        Layout::ZoneName(fmt) => {
            let (rest, zone) = s.rsplit_once(' ')?;
            if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            let naive = NaiveDateTime::parse_from_str(rest, fmt).ok()?;
            let offset = zone_offset(zone).or_else(|| FixedOffset::east_opt(0))?;
            offset.from_local_datetime(&naive).single().map(to_utc)
        }
        Layout::Naive(fmt) => NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .map(|naive| naive.and_utc()),
        Layout::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc()),
    }
}

/// Offsets for zone abbreviations common in feeds. Anything else is read as UTC.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    let hours = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        "BST" | "CET" => 1,
        "CEST" | "EET" => 2,
        "EEST" => 3,
        "JST" | "KST" => 9,
        "AEST" => 10,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

fn to_utc<Tz: TimeZone>(dt: DateTime<Tz>) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// `"Tue, 02 Jan 2006 ..."` -> `"02 Jan 2006 ..."`
fn strip_weekday(s: &str) -> Option<&str> {
    let (head, rest) = s.split_once(',')?;
    if head.is_empty() || !head.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(rest.trim_start())
}
