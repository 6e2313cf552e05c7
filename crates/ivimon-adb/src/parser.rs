//! Threadtime logcat line parsing
//!
//! This module parses the `-v threadtime` layout:
//!
//! ```text
//! MM-DD HH:MM:SS.mmm  PID  TID LEVEL TAG: MESSAGE
//! ```
//!
//! Logcat timestamps carry no year, so callers supply a reference year.
//! [`parse_line`] is pure and deterministic; [`LineParser`] adds the New
//! Year rollover for long-running sessions.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use ivimon_core::prelude::*;
use ivimon_core::record::{LogLevel, LogRecord};

/// Static regex pattern for threadtime lines
///
/// The tag is everything up to the first colon; at least one whitespace
/// character must follow that colon.
static LOGCAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<month>\d{2})-(?P<day>\d{2})\s+(?P<hour>\d{2}):(?P<minute>\d{2}):(?P<second>\d{2})\.(?P<millis>\d{3})\s+(?P<pid>\d+)\s+(?P<tid>\d+)\s+(?P<level>[A-Z])\s+(?P<tag>[^:]*):\s+(?P<message>.*)$",
    )
    .expect("Invalid logcat pattern regex")
});

/// Parse one threadtime line with a fixed reference year
///
/// Any structural mismatch (layout, non-numeric pid/tid, impossible
/// calendar date) is a recoverable [`Error::Parse`]. A level letter
/// outside the documented set still parses, with [`LogLevel::Unknown`].
pub fn parse_line(line: &str, reference_year: i32) -> Result<LogRecord> {
    let caps = LOGCAT_PATTERN
        .captures(line)
        .ok_or_else(|| Error::parse(line))?;
    record_from_captures(&caps, reference_year, line)
}

fn field<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map(|m| m.as_str()).unwrap_or("")
}

fn record_from_captures(caps: &Captures<'_>, reference_year: i32, line: &str) -> Result<LogRecord> {
    let month: u32 = field(caps, "month").parse().map_err(|_| Error::parse(line))?;
    let day: u32 = field(caps, "day").parse().map_err(|_| Error::parse(line))?;
    let hour: u32 = field(caps, "hour").parse().map_err(|_| Error::parse(line))?;
    let minute: u32 = field(caps, "minute")
        .parse()
        .map_err(|_| Error::parse(line))?;
    let second: u32 = field(caps, "second")
        .parse()
        .map_err(|_| Error::parse(line))?;
    let millis: u32 = field(caps, "millis")
        .parse()
        .map_err(|_| Error::parse(line))?;

    let pid: i32 = field(caps, "pid").parse().map_err(|_| Error::parse(line))?;
    let tid: i32 = field(caps, "tid").parse().map_err(|_| Error::parse(line))?;

    let timestamp = NaiveDate::from_ymd_opt(reference_year, month, day)
        .and_then(|date| date.and_hms_milli_opt(hour, minute, second, millis))
        .ok_or_else(|| Error::parse(line))?;

    let level_code = field(caps, "level").chars().next().unwrap_or('U');

    Ok(LogRecord {
        timestamp,
        level: LogLevel::from_code(level_code),
        pid,
        tid,
        tag: field(caps, "tag").trim().to_string(),
        message: field(caps, "message").trim().to_string(),
        raw_line: line.to_string(),
    })
}

/// Stateful line parser that tracks the reference year across New Year
///
/// The year advances only on an observed 12 -> 01 month transition.
/// Out-of-order months elsewhere in the year never move it.
#[derive(Debug, Clone)]
pub struct LineParser {
    reference_year: i32,
    last_month: Option<u32>,
}

impl LineParser {
    pub fn new(reference_year: i32) -> Self {
        Self {
            reference_year,
            last_month: None,
        }
    }

    /// The year currently applied to incoming lines
    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Parse one line, rolling the reference year forward at New Year
    ///
    /// The rollover applies to the triggering line itself: the first
    /// January line after a December line already gets the new year.
    /// Rollover state only advances on successfully parsed lines.
    pub fn parse(&mut self, line: &str) -> Result<LogRecord> {
        let caps = LOGCAT_PATTERN
            .captures(line)
            .ok_or_else(|| Error::parse(line))?;

        let month: u32 = field(&caps, "month").parse().map_err(|_| Error::parse(line))?;
        if self.last_month == Some(12) && month == 1 {
            self.reference_year += 1;
            debug!(
                "logcat month rolled 12 -> 01, reference year now {}",
                self.reference_year
            );
        }

        let record = record_from_captures(&caps, self.reference_year, line)?;
        self.last_month = Some(month);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE: &str = "01-07 12:34:56.789  1234  5678 E MyTag: Something failed";

    #[test]
    fn test_parse_canonical_line() {
        let rec = parse_line(SAMPLE, 2025).unwrap();
        assert_eq!(rec.timestamp.year(), 2025);
        assert_eq!(rec.timestamp.month(), 1);
        assert_eq!(rec.timestamp.day(), 7);
        assert_eq!(rec.timestamp.hour(), 12);
        assert_eq!(rec.timestamp.minute(), 34);
        assert_eq!(rec.timestamp.second(), 56);
        assert_eq!(rec.timestamp.nanosecond(), 789_000_000);
        assert_eq!(rec.level, LogLevel::Error);
        assert_eq!(rec.pid, 1234);
        assert_eq!(rec.tid, 5678);
        assert_eq!(rec.tag, "MyTag");
        assert_eq!(rec.message, "Something failed");
        assert_eq!(rec.raw_line, SAMPLE);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse_line(SAMPLE, 2025).unwrap();
        let second = parse_line(SAMPLE, 2025).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_single_space_columns() {
        let line = "03-15 08:00:01.002 42 43 I ServiceManager: service added";
        let rec = parse_line(line, 2024).unwrap();
        assert_eq!(rec.pid, 42);
        assert_eq!(rec.tid, 43);
        assert_eq!(rec.level, LogLevel::Info);
        assert_eq!(rec.tag, "ServiceManager");
    }

    #[test]
    fn test_parse_undocumented_level_letter_is_unknown() {
        let line = "01-07 12:34:56.789  1234  5678 S MyTag: silent?";
        let rec = parse_line(line, 2025).unwrap();
        assert_eq!(rec.level, LogLevel::Unknown);
    }

    #[test]
    fn test_parse_lowercase_level_is_failure() {
        let line = "01-07 12:34:56.789  1234  5678 e MyTag: bad level column";
        assert!(parse_line(line, 2025).is_err());
    }

    #[test]
    fn test_parse_rejects_buffer_header() {
        let err = parse_line("--------- beginning of main", 2025);
        assert!(matches!(err, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("", 2025).is_err());
        assert!(parse_line("not a logcat line at all", 2025).is_err());
        assert!(parse_line("01-07 12:34:56  1 2 E Tag: no millis", 2025).is_err());
    }

    #[test]
    fn test_parse_rejects_impossible_date() {
        let line = "02-30 10:00:00.000   100   200 I Tag: bad day of month";
        assert!(parse_line(line, 2025).is_err());
        let line = "13-01 10:00:00.000   100   200 I Tag: bad month";
        assert!(parse_line(line, 2025).is_err());
        let line = "01-07 25:00:00.000   100   200 I Tag: bad hour";
        assert!(parse_line(line, 2025).is_err());
    }

    #[test]
    fn test_parse_requires_space_after_tag_colon() {
        let line = "01-07 12:34:56.789  1234  5678 E MyTag:no space";
        assert!(parse_line(line, 2025).is_err());
    }

    #[test]
    fn test_parse_tag_with_spaces_and_padding() {
        let line = "01-07 12:34:56.789  1234  5678 I Update Engine : check finished";
        let rec = parse_line(line, 2025).unwrap();
        assert_eq!(rec.tag, "Update Engine");
        assert_eq!(rec.message, "check finished");
    }

    #[test]
    fn test_parse_empty_tag() {
        let line = "01-07 12:34:56.789  1234  5678 I : bare colon tag";
        let rec = parse_line(line, 2025).unwrap();
        assert_eq!(rec.tag, "");
        assert_eq!(rec.message, "bare colon tag");
    }

    #[test]
    fn test_parse_message_keeps_interior_colons() {
        let line = "01-07 12:34:56.789   812   903 W NetStack: connect 10.0.0.2:8080 refused";
        let rec = parse_line(line, 2025).unwrap();
        assert_eq!(rec.tag, "NetStack");
        assert_eq!(rec.message, "connect 10.0.0.2:8080 refused");
    }

    #[test]
    fn test_line_parser_rolls_year_at_new_year() {
        let mut parser = LineParser::new(2024);
        let december = parser
            .parse("12-31 23:59:59.999   100   200 I Tag: old year")
            .unwrap();
        assert_eq!(december.timestamp.year(), 2024);

        let january = parser
            .parse("01-01 00:00:00.120   100   200 I Tag: new year")
            .unwrap();
        assert_eq!(january.timestamp.year(), 2025);
        assert_eq!(parser.reference_year(), 2025);

        // Later lines stay in the new year.
        let later = parser
            .parse("01-02 08:00:00.000   100   200 I Tag: next day")
            .unwrap();
        assert_eq!(later.timestamp.year(), 2025);
    }

    #[test]
    fn test_line_parser_ignores_mid_year_regression() {
        let mut parser = LineParser::new(2025);
        parser
            .parse("05-10 10:00:00.000   100   200 I Tag: may")
            .unwrap();
        let stray = parser
            .parse("04-30 23:59:00.000   100   200 I Tag: late april stray")
            .unwrap();
        assert_eq!(stray.timestamp.year(), 2025);
        assert_eq!(parser.reference_year(), 2025);
    }

    #[test]
    fn test_line_parser_failure_keeps_state() {
        let mut parser = LineParser::new(2024);
        parser
            .parse("12-31 23:00:00.000   100   200 I Tag: december")
            .unwrap();
        assert!(parser.parse("garbage").is_err());
        let january = parser
            .parse("01-01 00:10:00.000   100   200 I Tag: january")
            .unwrap();
        assert_eq!(january.timestamp.year(), 2025);
    }
}
