//! Session aggregate
//!
//! One monitored interval: identity, start/stop instants, the event log and
//! the debounce window. Owned exclusively by a single controller.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ProctorConfig;
use crate::debouncer::{DebounceState, ThresholdCrossing, ViolationDebouncer};
use crate::event_log::SessionLog;
use crate::types::{LogEntry, ViolationCategory};

#[derive(Debug, Clone)]
pub struct Session {
    session_id: String,
    student_id: String,
    log: SessionLog,
    debouncer: ViolationDebouncer,
    stopped_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(student_id: &str, config: &ProctorConfig, start_time: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            log: SessionLog::new(start_time),
            debouncer: ViolationDebouncer::new(config.clone()),
            stopped_at: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.log.start_time()
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    pub fn is_frozen(&self) -> bool {
        self.log.is_frozen()
    }

    pub fn entries(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn debounce_state(&self) -> &DebounceState {
        self.debouncer.state()
    }

    /// Run a debounced observation and log any threshold crossing
    pub fn observe(
        &mut self,
        category: Option<ViolationCategory>,
        now: DateTime<Utc>,
    ) -> Option<ThresholdCrossing> {
        let crossing = self.debouncer.observe(category, now)?;
        let message = sustained_message(&crossing);
        self.log.log_event(crossing.category.clone(), message, now);
        Some(crossing)
    }

    /// Log a zero-tolerance event right away
    pub fn record(
        &mut self,
        category: ViolationCategory,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<&LogEntry> {
        self.log.log_event(category, message, now)
    }

    pub fn interrupt_window(&mut self) {
        self.debouncer.interrupt();
    }

    /// Append the closing entry and freeze the log
    pub fn finish(&mut self, now: DateTime<Utc>) {
        if self.log.is_frozen() {
            return;
        }
        self.log
            .log_event(ViolationCategory::System, "Session ended", now);
        self.log.freeze();
        self.stopped_at = Some(now);
    }
}

fn sustained_message(crossing: &ThresholdCrossing) -> String {
    let secs = crossing.tolerance_ms as f64 / 1000.0;
    match &crossing.category {
        ViolationCategory::GazeLeft => format!("Looking LEFT for more than {secs}s"),
        ViolationCategory::GazeRight => format!("Looking RIGHT for more than {secs}s"),
        ViolationCategory::GazeUp => format!("Looking UP for more than {secs}s"),
        ViolationCategory::GazeDown => format!("Looking DOWN for more than {secs}s"),
        ViolationCategory::PersonMissing => format!("No face detected for more than {secs}s"),
        other => format!("{other} sustained for more than {secs}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_crossing_is_logged_with_message() {
        let mut session = Session::new("student-1", &ProctorConfig::default(), at(0));
        session.observe(Some(ViolationCategory::GazeLeft), at(0));
        let crossing = session.observe(Some(ViolationCategory::GazeLeft), at(3_100));

        assert!(crossing.is_some());
        let entries = session.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, ViolationCategory::GazeLeft);
        assert_eq!(entries[0].message, "Looking LEFT for more than 3s");
        assert_eq!(entries[0].elapsed, "00:03");
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut session = Session::new("student-1", &ProctorConfig::default(), at(0));
        session.finish(at(10_000));
        session.finish(at(20_000));

        assert_eq!(session.entries().len(), 1);
        assert_eq!(session.stopped_at(), Some(at(10_000)));
        assert!(session.is_frozen());
    }

    #[test]
    fn test_fractional_tolerance_message() {
        let config = ProctorConfig {
            absence_tolerance_ms: 2_500,
            ..ProctorConfig::default()
        };
        let mut session = Session::new("s", &config, at(0));
        session.observe(Some(ViolationCategory::PersonMissing), at(0));
        session.observe(Some(ViolationCategory::PersonMissing), at(2_600));
        assert_eq!(
            session.entries()[0].message,
            "No face detected for more than 2.5s"
        );
    }
}
