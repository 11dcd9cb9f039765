//! Report generation
//!
//! Renders a frozen session into the canonical plain-text integrity report,
//! and optionally a JSON summary for machine consumers. The text form is the
//! durable artifact handed to persistence; its layout is fixed byte for byte.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProctorError;
use crate::session::Session;
use crate::types::LogEntry;
use crate::{PRODUCER_NAME, PROCTOR_VERSION};

/// Report title line
pub const REPORT_TITLE: &str = "EXAM INTEGRITY REPORT";

/// Horizontal rule between report sections
pub const REPORT_RULE: &str = "------------------------------------------------";

/// Width of the TYPE column
pub const TYPE_COLUMN_WIDTH: usize = 16;

/// Date format used in the report header
const REPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Render the plain-text report for a stopped session.
///
/// The generation date is the instant the session stopped, so rendering the
/// same session twice yields identical text.
pub fn render_text(session: &Session) -> Result<String, ProctorError> {
    let generated_at = session.stopped_at().ok_or_else(|| {
        ProctorError::InvalidState("report is only available after the session stops".to_string())
    })?;

    Ok(render_entries(
        session.student_id(),
        generated_at,
        session.entries(),
    ))
}

/// Render report text from raw parts
pub fn render_entries(
    student_id: &str,
    generated_at: DateTime<Utc>,
    entries: &[LogEntry],
) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 8);
    lines.push(REPORT_TITLE.to_string());
    lines.push(format!("Student ID: {student_id}"));
    lines.push(format!("Date: {}", generated_at.format(REPORT_DATE_FORMAT)));
    lines.push(REPORT_RULE.to_string());
    lines.push(format!(
        "TIME   | {:<width$} | DETAILS",
        "TYPE",
        width = TYPE_COLUMN_WIDTH
    ));
    lines.push(REPORT_RULE.to_string());

    for entry in entries {
        lines.push(format!(
            "[{}] | {:<width$} | {}",
            entry.elapsed,
            entry.category.label(),
            entry.message,
            width = TYPE_COLUMN_WIDTH
        ));
    }

    lines.push(REPORT_RULE.to_string());
    lines.push(format!("Total Events: {}", entries.len()));

    lines.join("\n") + "\n"
}

/// File name used when persisting a report.
///
/// Characters outside `[A-Za-z0-9_-]` in the student id become `_`.
pub fn report_filename(student_id: &str, generated_at: DateTime<Utc>) -> String {
    let safe_id: String = student_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe_id = if safe_id.is_empty() {
        "unknown".to_string()
    } else {
        safe_id
    };

    format!(
        "report_{}_{}.txt",
        safe_id,
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Producer metadata embedded in summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Machine-readable summary of a stopped session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub producer: ReportProducer,
    pub session_id: String,
    pub student_id: String,
    pub started_at_utc: String,
    pub stopped_at_utc: String,
    pub duration_sec: f64,
    pub total_events: usize,
    /// Entry count keyed by category label
    pub events_by_category: BTreeMap<String, usize>,
    pub entries: Vec<LogEntry>,
}

/// Encoder for [`ReportSummary`] payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, session: &Session) -> Result<ReportSummary, ProctorError> {
        let stopped_at = session.stopped_at().ok_or_else(|| {
            ProctorError::InvalidState(
                "summary is only available after the session stops".to_string(),
            )
        })?;

        let mut events_by_category = BTreeMap::new();
        for entry in session.entries() {
            *events_by_category
                .entry(entry.category.label().to_string())
                .or_insert(0) += 1;
        }

        let duration_ms = (stopped_at - session.start_time()).num_milliseconds().max(0);

        Ok(ReportSummary {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: PROCTOR_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: session.session_id().to_string(),
            student_id: session.student_id().to_string(),
            started_at_utc: session.start_time().to_rfc3339(),
            stopped_at_utc: stopped_at.to_rfc3339(),
            duration_sec: duration_ms as f64 / 1000.0,
            total_events: session.entries().len(),
            events_by_category,
            entries: session.entries().to_vec(),
        })
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, session: &Session) -> Result<String, ProctorError> {
        let summary = self.encode(session)?;
        serde_json::to_string_pretty(&summary).map_err(ProctorError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProctorConfig;
    use crate::types::ViolationCategory;
    use pretty_assertions::assert_eq;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    /// 2024-01-15T14:00:00Z
    const START_MS: i64 = 1_705_327_200_000;

    fn stopped_session() -> Session {
        let mut session = Session::new("STU-042", &ProctorConfig::default(), at(START_MS));
        session.record(
            ViolationCategory::TabSwitch,
            "Page hidden (tab switched or minimized)",
            at(START_MS + 45_000),
        );
        session.record(
            ViolationCategory::MultipleFaces,
            "Multiple faces detected (2)",
            at(START_MS + 72_300),
        );
        session.finish(at(START_MS + 125_000));
        session
    }

    #[test]
    fn test_render_text_layout() {
        let text = render_text(&stopped_session()).unwrap();
        let expected = "\
EXAM INTEGRITY REPORT
Student ID: STU-042
Date: 2024-01-15 14:02:05 UTC
------------------------------------------------
TIME   | TYPE             | DETAILS
------------------------------------------------
[00:45] | TAB_SWITCH       | Page hidden (tab switched or minimized)
[01:12] | MULTIPLE_FACES   | Multiple faces detected (2)
[02:05] | SYSTEM           | Session ended
------------------------------------------------
Total Events: 3
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_is_deterministic() {
        let session = stopped_session();
        assert_eq!(render_text(&session).unwrap(), render_text(&session).unwrap());
    }

    #[test]
    fn test_render_requires_stopped_session() {
        let session = Session::new("STU-042", &ProctorConfig::default(), at(START_MS));
        assert!(matches!(
            render_text(&session),
            Err(ProctorError::InvalidState(_))
        ));
    }

    #[test]
    fn test_empty_report() {
        let text = render_entries("x", at(START_MS), &[]);
        assert!(text.ends_with("------------------------------------------------\nTotal Events: 0\n"));
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(
            report_filename("STU-042", at(START_MS)),
            "report_STU-042_20240115_140000.txt"
        );
        assert_eq!(
            report_filename("../etc/passwd", at(START_MS)),
            "report____etc_passwd_20240115_140000.txt"
        );
        assert_eq!(
            report_filename("", at(START_MS)),
            "report_unknown_20240115_140000.txt"
        );
    }

    #[test]
    fn test_summary_counts() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let json = encoder.encode_to_json(&stopped_session()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["producer"]["name"], "synheart-proctor");
        assert_eq!(payload["producer"]["instance_id"], "test-instance");
        assert_eq!(payload["student_id"], "STU-042");
        assert_eq!(payload["total_events"], 3);
        assert_eq!(payload["duration_sec"], 125.0);
        assert_eq!(payload["events_by_category"]["TAB_SWITCH"], 1);
        assert_eq!(payload["events_by_category"]["SYSTEM"], 1);
        assert_eq!(payload["entries"][1]["category"], "multiple_faces");
    }
}
