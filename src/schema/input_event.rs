//! proctor.input_event.v1 schema definition
//!
//! One record per frame result or focus notification, stamped with the
//! milliseconds since the session clock origin. A stream of these is enough to
//! replay a whole session offline.

use serde::{Deserialize, Serialize};

use crate::config::LandmarkIndices;
use crate::types::{FocusEvent, FrameResult, LandmarkFrame};

/// Current schema version
pub const SCHEMA_VERSION: &str = "proctor.input_event.v1";

/// Largest accepted offset from the clock origin (100 Julian years)
pub const MAX_TIMESTAMP_MS: i64 = 3_155_760_000_000;

/// What an input record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A classification result from the vision pipeline
    Frame,
    /// The page became hidden
    PageHidden,
    /// The window lost input focus
    WindowBlur,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Frame => "frame",
            EventKind::PageHidden => "page_hidden",
            EventKind::WindowBlur => "window_blur",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Schema version (must be "proctor.input_event.v1")
    pub schema_version: String,
    /// Milliseconds since the session clock origin
    pub timestamp_ms: i64,
    pub kind: EventKind,
    /// Detected faces; only meaningful for `frame` records. An empty list
    /// means nobody was in view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faces: Vec<LandmarkFrame>,
    /// Optional producer-side identifier, echoed in validation results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl InputEvent {
    pub fn frame(timestamp_ms: i64, faces: Vec<LandmarkFrame>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp_ms,
            kind: EventKind::Frame,
            faces,
            event_id: None,
        }
    }

    pub fn focus(timestamp_ms: i64, event: FocusEvent) -> Self {
        let kind = match event {
            FocusEvent::PageHidden => EventKind::PageHidden,
            FocusEvent::WindowBlur => EventKind::WindowBlur,
        };
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp_ms,
            kind,
            faces: Vec::new(),
            event_id: None,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// The frame result carried by a `frame` record
    pub fn frame_result(&self) -> Option<FrameResult> {
        match self.kind {
            EventKind::Frame => Some(FrameResult::new(self.faces.clone())),
            _ => None,
        }
    }

    /// The focus notification carried by a `page_hidden`/`window_blur` record
    pub fn focus_event(&self) -> Option<FocusEvent> {
        match self.kind {
            EventKind::Frame => None,
            EventKind::PageHidden => Some(FocusEvent::PageHidden),
            EventKind::WindowBlur => Some(FocusEvent::WindowBlur),
        }
    }

    /// Validate a single record in isolation.
    ///
    /// Ordering across records is checked by
    /// [`InputEventAdapter::validate_events`](super::InputEventAdapter::validate_events).
    pub fn validate(&self, indices: &LandmarkIndices) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.timestamp_ms < 0 {
            return Err(ValidationError::NegativeTimestamp(self.timestamp_ms));
        }
        if self.timestamp_ms > MAX_TIMESTAMP_MS {
            return Err(ValidationError::TimestampOutOfRange {
                actual: self.timestamp_ms,
            });
        }

        if self.kind != EventKind::Frame {
            if !self.faces.is_empty() {
                return Err(ValidationError::UnexpectedFaces {
                    kind: self.kind.as_str().to_string(),
                });
            }
            return Ok(());
        }

        let required = indices.required_points();
        for (face, landmarks) in self.faces.iter().enumerate() {
            if landmarks.len() < required {
                return Err(ValidationError::MissingReferencePoints {
                    face,
                    required,
                    actual: landmarks.len(),
                });
            }
            if let Some(point) = landmarks.points.iter().position(|p| !p.is_finite()) {
                return Err(ValidationError::NonFiniteCoordinate { face, point });
            }
        }

        Ok(())
    }
}

/// Validation errors for input events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Negative timestamp: {0}")]
    NegativeTimestamp(i64),

    #[error("Timestamp {actual} ms is outside the supported range")]
    TimestampOutOfRange { actual: i64 },

    #[error("Timestamp went backwards: {actual} after {previous}")]
    TimestampRegression { previous: i64, actual: i64 },

    #[error("Face {face} has {actual} landmarks but at least {required} are required")]
    MissingReferencePoints {
        face: usize,
        required: usize,
        actual: usize,
    },

    #[error("Face {face} has a non-finite coordinate at landmark {point}")]
    NonFiniteCoordinate { face: usize, point: usize },

    #[error("{kind} records must not carry faces")]
    UnexpectedFaces { kind: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::fixtures::centered_face;
    use crate::types::Landmark;

    #[test]
    fn test_serialize_focus_event() {
        let event = InputEvent::focus(4_100, FocusEvent::PageHidden);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"schema_version":"proctor.input_event.v1","timestamp_ms":4100,"kind":"page_hidden"}"#
        );
    }

    #[test]
    fn test_deserialize_frame_without_faces() {
        let json = r#"{"schema_version":"proctor.input_event.v1","timestamp_ms":0,"kind":"frame"}"#;
        let event: InputEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Frame);
        assert_eq!(event.frame_result().unwrap().face_count(), 0);
        assert!(event.focus_event().is_none());
        assert!(event.validate(&LandmarkIndices::default()).is_ok());
    }

    #[test]
    fn test_validate_schema_version() {
        let mut event = InputEvent::frame(0, vec![]);
        event.schema_version = "proctor.input_event.v0".to_string();
        assert!(matches!(
            event.validate(&LandmarkIndices::default()),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_validate_timestamp_upper_bound() {
        let indices = LandmarkIndices::default();
        assert!(InputEvent::frame(MAX_TIMESTAMP_MS, vec![]).validate(&indices).is_ok());
        assert_eq!(
            InputEvent::frame(i64::MAX, vec![]).validate(&indices),
            Err(ValidationError::TimestampOutOfRange { actual: i64::MAX })
        );
        assert!(matches!(
            InputEvent::focus(9_000_000_000_000_000, FocusEvent::PageHidden).validate(&indices),
            Err(ValidationError::TimestampOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_reference_points() {
        let short = LandmarkFrame {
            points: vec![Landmark::new(0.5, 0.5); 10],
        };
        let event = InputEvent::frame(0, vec![centered_face(), short]);
        assert_eq!(
            event.validate(&LandmarkIndices::default()),
            Err(ValidationError::MissingReferencePoints {
                face: 1,
                required: 455,
                actual: 10
            })
        );
    }

    #[test]
    fn test_validate_non_finite() {
        let mut face = centered_face();
        face.points[7].x = f64::NAN;
        let event = InputEvent::frame(0, vec![face]);
        assert_eq!(
            event.validate(&LandmarkIndices::default()),
            Err(ValidationError::NonFiniteCoordinate { face: 0, point: 7 })
        );
    }

    #[test]
    fn test_focus_record_rejects_faces() {
        let mut event = InputEvent::focus(10, FocusEvent::WindowBlur);
        event.faces.push(centered_face());
        assert!(matches!(
            event.validate(&LandmarkIndices::default()),
            Err(ValidationError::UnexpectedFaces { .. })
        ));
    }
}
