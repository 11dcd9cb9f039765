//! Session event log
//!
//! Append-only, chronologically ordered record of confirmed events. The log
//! is frozen when the session stops; nothing can be changed afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LogEntry, ViolationCategory};

/// Format elapsed milliseconds as `mm:ss`.
///
/// Minutes are not wrapped into hours, so a 75 minute session reads `75:00`.
pub fn format_elapsed(elapsed_ms: i64) -> String {
    let total_secs = elapsed_ms.max(0) / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    start_time: DateTime<Utc>,
    entries: Vec<LogEntry>,
    frozen: bool,
}

impl SessionLog {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            entries: Vec::new(),
            frozen: false,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Append an entry stamped relative to the session start.
    ///
    /// Returns the new entry, or `None` once the log is frozen.
    pub fn log_event(
        &mut self,
        category: ViolationCategory,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<&LogEntry> {
        if self.frozen {
            tracing::debug!(category = %category, "dropping entry for frozen log");
            return None;
        }

        let elapsed_ms = (now - self.start_time).num_milliseconds().max(0);
        self.entries.push(LogEntry {
            elapsed: format_elapsed(elapsed_ms),
            elapsed_ms,
            category,
            message: message.into(),
        });
        self.entries.last()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries recorded for `category`
    pub fn count(&self, category: &ViolationCategory) -> usize {
        self.entries
            .iter()
            .filter(|e| &e.category == category)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(999), "00:00");
        assert_eq!(format_elapsed(1_000), "00:01");
        assert_eq!(format_elapsed(65_432), "01:05");
        assert_eq!(format_elapsed(75 * 60_000), "75:00");
        assert_eq!(format_elapsed(-5), "00:00");
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut log = SessionLog::new(at(10_000));
        log.log_event(ViolationCategory::TabSwitch, "first", at(12_500));
        log.log_event(ViolationCategory::GazeLeft, "second", at(73_000));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].elapsed, "00:02");
        assert_eq!(entries[0].elapsed_ms, 2_500);
        assert_eq!(entries[1].elapsed, "01:03");
        assert_eq!(entries[1].message, "second");
    }

    #[test]
    fn test_frozen_log_rejects_appends() {
        let mut log = SessionLog::new(at(0));
        log.log_event(ViolationCategory::System, "Session ended", at(1_000));
        log.freeze();

        assert!(log
            .log_event(ViolationCategory::TabSwitch, "late", at(2_000))
            .is_none());
        assert_eq!(log.len(), 1);
        assert!(log.is_frozen());
    }

    #[test]
    fn test_count_by_category() {
        let mut log = SessionLog::new(at(0));
        log.log_event(ViolationCategory::TabSwitch, "a", at(1));
        log.log_event(ViolationCategory::TabSwitch, "b", at(2));
        log.log_event(ViolationCategory::MultipleFaces, "c", at(3));

        assert_eq!(log.count(&ViolationCategory::TabSwitch), 2);
        assert_eq!(log.count(&ViolationCategory::MultipleFaces), 1);
        assert_eq!(log.count(&ViolationCategory::GazeUp), 0);
    }
}
