//! Timestamp formats for logged records.
//!
//! The format is chosen once per logging session from a fixed set of
//! formats, plus a free-form strftime pattern.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Default pattern for the `strftime` time format.
pub const DEFAULT_STRFTIME: &str = "%Y%m%d_%H%M%S";

/// Names of the time formats as they appear in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeFormatKind {
    De,
    DeMsec,
    Us,
    UsMsec,
    Iso,
    IsoMsec,
    #[default]
    Unix,
    UnixMsec,
    Strftime,
}

/// A resolved timestamp format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `31.12.2024 23:59:59`
    De,
    /// `31.12.2024 23:59:59,123`
    DeMsec,
    /// `12/31/2024 23:59:59`
    Us,
    /// `12/31/2024 23:59:59.123`
    UsMsec,
    /// `2024-12-31T23:59:59+01:00`
    Iso,
    /// `2024-12-31T23:59:59.123+01:00`
    IsoMsec,
    /// `1735685999`
    Unix,
    /// `1735685999.123`
    UnixMsec,
    Strftime(String),
}

impl TimestampFormat {
    /// Resolve a configured format name. `pattern` is only used by `strftime`.
    pub fn new(kind: TimeFormatKind, pattern: &str) -> Self {
        match kind {
            TimeFormatKind::De => TimestampFormat::De,
            TimeFormatKind::DeMsec => TimestampFormat::DeMsec,
            TimeFormatKind::Us => TimestampFormat::Us,
            TimeFormatKind::UsMsec => TimestampFormat::UsMsec,
            TimeFormatKind::Iso => TimestampFormat::Iso,
            TimeFormatKind::IsoMsec => TimestampFormat::IsoMsec,
            TimeFormatKind::Unix => TimestampFormat::Unix,
            TimeFormatKind::UnixMsec => TimestampFormat::UnixMsec,
            TimeFormatKind::Strftime => TimestampFormat::Strftime(pattern.to_string()),
        }
    }

    /// Format `at`. Never fails: a broken strftime pattern yields an
    /// `Error: ...` string in place of the timestamp.
    pub fn format<Tz>(&self, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        // Leap seconds report 1000+ milliseconds
        let millis = at.timestamp_subsec_millis().min(999);

        match self {
            TimestampFormat::De => at.format("%d.%m.%Y %H:%M:%S").to_string(),
            TimestampFormat::DeMsec => {
                format!("{},{millis:03}", at.format("%d.%m.%Y %H:%M:%S"))
            }
            TimestampFormat::Us => at.format("%m/%d/%Y %H:%M:%S").to_string(),
            TimestampFormat::UsMsec => {
                format!("{}.{millis:03}", at.format("%m/%d/%Y %H:%M:%S"))
            }
            TimestampFormat::Iso => at.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            TimestampFormat::IsoMsec => format!(
                "{}.{millis:03}{}",
                at.format("%Y-%m-%dT%H:%M:%S"),
                at.format("%:z")
            ),
            TimestampFormat::Unix => at.timestamp().to_string(),
            TimestampFormat::UnixMsec => format!("{}.{millis:03}", at.timestamp()),
            TimestampFormat::Strftime(pattern) => format_strftime(at, pattern),
        }
    }
}

impl From<&TimestampFormat> for TimeFormatKind {
    fn from(format: &TimestampFormat) -> Self {
        match format {
            TimestampFormat::De => TimeFormatKind::De,
            TimestampFormat::DeMsec => TimeFormatKind::DeMsec,
            TimestampFormat::Us => TimeFormatKind::Us,
            TimestampFormat::UsMsec => TimeFormatKind::UsMsec,
            TimestampFormat::Iso => TimeFormatKind::Iso,
            TimestampFormat::IsoMsec => TimeFormatKind::IsoMsec,
            TimestampFormat::Unix => TimeFormatKind::Unix,
            TimestampFormat::UnixMsec => TimeFormatKind::UnixMsec,
            TimestampFormat::Strftime(_) => TimeFormatKind::Strftime,
        }
    }
}

fn format_strftime<Tz>(at: &DateTime<Tz>, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return format!("Error: invalid strftime pattern '{}'", pattern.replace('\n', " "));
    }

    let mut out = String::new();
    match write!(out, "{}", at.format_with_items(items.into_iter())) {
        Ok(()) => out,
        Err(_) => format!(
            "Error: cannot format timestamp with '{}'",
            pattern.replace('\n', " ")
        ),
    }
}
