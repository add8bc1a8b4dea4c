//! Timestamp formatting for roster rows and messages.
//!
//! Server timestamps are microseconds since the epoch.

use chrono::{DateTime, Datelike, Local, TimeZone};

pub fn us_to_ms(us: i64) -> i64 {
    us.div_euclid(1000)
}

fn to_zone<Tz: TimeZone>(us: i64, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp_micros(us).map(|ts| ts.with_timezone(&now.timezone()))
}

/// `HH:mm, MMM D`, with the year appended when it is not the current one.
pub fn format_ts_at<Tz: TimeZone>(us: i64, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(ts) = to_zone(us, now) else {
        return String::new();
    };
    if ts.year() != now.year() {
        ts.format("%H:%M, %b %-d, %Y").to_string()
    } else {
        ts.format("%H:%M, %b %-d").to_string()
    }
}

/// Roster row time: just `HH:mm` for today, the date for earlier days, and the year
/// for earlier years.
pub fn format_roster_ts_at<Tz: TimeZone>(us: i64, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(ts) = to_zone(us, now) else {
        return String::new();
    };
    let format = if ts.year() != now.year() {
        "%H:%M, %b %-d, %Y"
    } else if ts.day() != now.day() || ts.month() != now.month() {
        "%H:%M, %b %-d"
    } else {
        "%H:%M"
    };
    ts.format(format).to_string()
}

/// `MMM D, HH:mm`, with the year before the time when it is not the current one.
pub fn format_room_ts_at<Tz: TimeZone>(us: i64, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(ts) = to_zone(us, now) else {
        return String::new();
    };
    if ts.year() != now.year() {
        ts.format("%b %-d, %Y, %H:%M").to_string()
    } else {
        ts.format("%b %-d, %H:%M").to_string()
    }
}

pub fn format_ts(us: i64) -> String {
    format_ts_at(us, &Local::now())
}

pub fn format_roster_ts(us: i64) -> String {
    format_roster_ts_at(us, &Local::now())
}

pub fn format_room_ts(us: i64) -> String {
    format_room_ts_at(us, &Local::now())
}
