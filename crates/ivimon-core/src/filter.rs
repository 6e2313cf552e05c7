//! Live-view filter criteria
//!
//! A [`FilterCriteria`] value is an immutable snapshot: the ingest loop
//! swaps the whole value when the user changes the filter, so no record is
//! ever evaluated against a half-updated criteria set.

use std::collections::HashSet;

use regex::Regex;

use crate::error::{Error, Result};
use crate::record::{LogLevel, LogRecord};

/// Which records the live view accepts
///
/// Every criterion is optional; the default value accepts every record.
/// Archiving and anomaly detection ignore these criteria entirely.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Minimum severity; records below this floor are rejected
    pub min_level: LogLevel,
    /// Allowlist matched against the record's pid OR tid
    pub pid_tid: Option<HashSet<i32>>,
    /// Regex searched against the tag
    pub tag_pattern: Option<Regex>,
    /// Regex searched against the message
    pub msg_pattern: Option<Regex>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum severity floor (builder pattern)
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Set the pid/tid allowlist (builder pattern)
    pub fn with_pid_tid(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.pid_tid = Some(ids.into_iter().collect());
        self
    }

    /// Compile and set the tag pattern
    pub fn with_tag_pattern(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::filter(format!("bad tag pattern '{}': {}", pattern, e)))?;
        self.tag_pattern = Some(re);
        Ok(self)
    }

    /// Compile and set the message pattern
    pub fn with_msg_pattern(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::filter(format!("bad message pattern '{}': {}", pattern, e)))?;
        self.msg_pattern = Some(re);
        Ok(self)
    }

    /// Check if any criterion is active (not the accept-all default)
    pub fn is_active(&self) -> bool {
        self.min_level != LogLevel::Unknown
            || self.pid_tid.is_some()
            || self.tag_pattern.is_some()
            || self.msg_pattern.is_some()
    }

    /// Reset all criteria to the accept-all default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check if a record passes every active criterion
    ///
    /// Checks run cheapest first with short-circuiting: severity compare,
    /// set lookup, then the two regex scans. An absent criterion passes.
    pub fn matches(&self, record: &LogRecord) -> bool {
        if !record.level.at_least(self.min_level) {
            return false;
        }

        if let Some(ids) = &self.pid_tid {
            if !ids.contains(&record.pid) && !ids.contains(&record.tid) {
                return false;
            }
        }

        if let Some(re) = &self.tag_pattern {
            if !re.is_match(&record.tag) {
                return false;
            }
        }

        if let Some(re) = &self.msg_pattern {
            if !re.is_match(&record.message) {
                return false;
            }
        }

        true
    }
}
