//! Parsing and batch validation for proctor.input_event.v1 streams

use serde::Serialize;

use crate::config::LandmarkIndices;
use crate::error::ProctorError;
use crate::schema::input_event::*;

/// Adapter for reading input event streams
pub struct InputEventAdapter;

impl InputEventAdapter {
    /// Parse a JSON string containing an array of InputEvents
    pub fn parse_array(json: &str) -> Result<Vec<InputEvent>, ProctorError> {
        let events: Vec<InputEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing InputEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<InputEvent>, ProctorError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            if let Some(event) = Self::parse_line(line, line_num + 1)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Parse one NDJSON line; blank lines yield `None`
    pub fn parse_line(line: &str, line_num: usize) -> Result<Option<InputEvent>, ProctorError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<InputEvent>(trimmed)
            .map(Some)
            .map_err(|e| ProctorError::ParseError(format!("Failed to parse line {line_num}: {e}")))
    }

    /// Validate a batch of events, including timestamp ordering.
    ///
    /// Returns only the failures.
    pub fn validate_events(
        events: &[InputEvent],
        indices: &LandmarkIndices,
    ) -> Vec<ValidationResult> {
        let mut failures = Vec::new();
        let mut previous: Option<i64> = None;

        for (index, event) in events.iter().enumerate() {
            let outcome = event.validate(indices).and_then(|_| match previous {
                Some(prev) if event.timestamp_ms < prev => {
                    Err(ValidationError::TimestampRegression {
                        previous: prev,
                        actual: event.timestamp_ms,
                    })
                }
                _ => Ok(()),
            });

            match outcome {
                Ok(()) => previous = Some(event.timestamp_ms),
                Err(error) => failures.push(ValidationResult {
                    index,
                    event_id: event.event_id.clone(),
                    error,
                }),
            }
        }

        failures
    }
}

/// A single failed record
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub event_id: Option<String>,
    pub error: ValidationError,
}

/// Serializable view of a [`ValidationResult`]
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub message: String,
}

impl From<&ValidationResult> for ValidationIssue {
    fn from(result: &ValidationResult) -> Self {
        Self {
            index: result.index,
            event_id: result.event_id.clone(),
            message: result.error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::fixtures::centered_face;
    use crate::types::FocusEvent;

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"{"schema_version":"proctor.input_event.v1","timestamp_ms":0,"kind":"frame","faces":[]}

{"schema_version":"proctor.input_event.v1","timestamp_ms":4100,"kind":"page_hidden"}
{"schema_version":"proctor.input_event.v1","timestamp_ms":4200,"kind":"window_blur","event_id":"e-3"}"#;

        let events = InputEventAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].focus_event(), Some(FocusEvent::PageHidden));
        assert_eq!(events[2].event_id.as_deref(), Some("e-3"));
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"schema_version\":\"proctor.input_event.v1\",\"timestamp_ms\":0,\"kind\":\"frame\"}\n{not json}";
        let err = InputEventAdapter::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array() {
        let events = vec![
            InputEvent::frame(0, vec![centered_face()]),
            InputEvent::focus(10, FocusEvent::WindowBlur),
        ];
        let json = serde_json::to_string(&events).unwrap();
        assert_eq!(InputEventAdapter::parse_array(&json).unwrap(), events);
    }

    #[test]
    fn test_validate_events() {
        let events = vec![
            InputEvent::frame(0, vec![centered_face()]),
            InputEvent::frame(100, vec![]),
            InputEvent::focus(100, FocusEvent::PageHidden),
        ];
        let results = InputEventAdapter::validate_events(&events, &LandmarkIndices::default());
        assert!(results.is_empty());
    }

    #[test]
    fn test_validate_events_ordering() {
        let events = vec![
            InputEvent::frame(500, vec![]),
            InputEvent::frame(400, vec![]).with_event_id("late"),
            InputEvent::frame(600, vec![]),
        ];
        let results = InputEventAdapter::validate_events(&events, &LandmarkIndices::default());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
        assert_eq!(results[0].event_id.as_deref(), Some("late"));
        assert_eq!(
            results[0].error,
            ValidationError::TimestampRegression {
                previous: 500,
                actual: 400
            }
        );
    }
}
