//! Core data types
//!
//! This module defines the values that flow through the monitoring engine:
//! landmark input from the vision model, derived gaze directions, violation
//! categories, log entries and the live status pushed to subscribers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One normalized 2D point on a detected face.
///
/// Coordinates are in the [0, 1] range relative to the video frame. A depth
/// component is accepted from producers that emit one but is never used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Ordered landmark set for a single face in a single frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    pub points: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Landmark at `index`, if the producer supplied that many points
    pub fn point(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Output of the external vision model for one processed video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// Zero, one or many detected faces
    #[serde(default)]
    pub faces: Vec<LandmarkFrame>,
}

impl FrameResult {
    pub fn new(faces: Vec<LandmarkFrame>) -> Self {
        Self { faces }
    }

    /// A frame in which the model found nobody
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Discrete head/gaze direction derived from one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GazeDirection {
    #[default]
    Center,
    Left,
    Right,
    Up,
    Down,
}

impl GazeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GazeDirection::Center => "CENTER",
            GazeDirection::Left => "LEFT",
            GazeDirection::Right => "RIGHT",
            GazeDirection::Up => "UP",
            GazeDirection::Down => "DOWN",
        }
    }

    /// Violation category for an off-screen direction, `None` for center
    pub fn violation(&self) -> Option<ViolationCategory> {
        match self {
            GazeDirection::Center => None,
            GazeDirection::Left => Some(ViolationCategory::GazeLeft),
            GazeDirection::Right => Some(ViolationCategory::GazeRight),
            GazeDirection::Up => Some(ViolationCategory::GazeUp),
            GazeDirection::Down => Some(ViolationCategory::GazeDown),
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is being monitored
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    GazeLeft,
    GazeRight,
    GazeUp,
    GazeDown,
    PersonMissing,
    MultipleFaces,
    TabSwitch,
    /// Lifecycle entries written by the engine itself
    System,
    /// Host-defined category
    #[serde(untagged)]
    Custom(String),
}

/// Wire names of the built-in categories; labels are the same names uppercased
const BUILTIN_NAMES: [&str; 8] = [
    "gaze_left",
    "gaze_right",
    "gaze_up",
    "gaze_down",
    "person_missing",
    "multiple_faces",
    "tab_switch",
    "system",
];

impl ViolationCategory {
    /// Label used in the TYPE column of the report
    pub fn label(&self) -> &str {
        match self {
            ViolationCategory::GazeLeft => "GAZE_LEFT",
            ViolationCategory::GazeRight => "GAZE_RIGHT",
            ViolationCategory::GazeUp => "GAZE_UP",
            ViolationCategory::GazeDown => "GAZE_DOWN",
            ViolationCategory::PersonMissing => "PERSON_MISSING",
            ViolationCategory::MultipleFaces => "MULTIPLE_FACES",
            ViolationCategory::TabSwitch => "TAB_SWITCH",
            ViolationCategory::System => "SYSTEM",
            ViolationCategory::Custom(name) => name.as_str(),
        }
    }

    /// A custom category whose name is blank or would read as a built-in
    /// one, in the report or on the wire
    pub fn is_ambiguous_custom(&self) -> bool {
        let ViolationCategory::Custom(name) = self else {
            return false;
        };
        let name = name.trim();
        name.is_empty()
            || BUILTIN_NAMES
                .iter()
                .any(|builtin| builtin.eq_ignore_ascii_case(name))
    }

    pub fn is_gaze(&self) -> bool {
        matches!(
            self,
            ViolationCategory::GazeLeft
                | ViolationCategory::GazeRight
                | ViolationCategory::GazeUp
                | ViolationCategory::GazeDown
        )
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single immutable entry in the session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Elapsed session time formatted as `mm:ss`
    pub elapsed: String,
    /// Elapsed session time in milliseconds
    pub elapsed_ms: i64,
    pub category: ViolationCategory,
    pub message: String,
}

/// Asynchronous host focus/visibility notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusEvent {
    /// The page became hidden (tab switched, minimized)
    PageHidden,
    /// The window lost input focus
    WindowBlur,
}

impl FocusEvent {
    pub fn message(&self) -> &'static str {
        match self {
            FocusEvent::PageHidden => "Page hidden (tab switched or minimized)",
            FocusEvent::WindowBlur => "Window lost focus",
        }
    }
}

/// Lifecycle state of a session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Stopped,
}

/// Live, non-persisted status pushed to the subscriber on every frame and
/// lifecycle transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub direction: GazeDirection,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<LandmarkFrame>,
}

impl LiveStatus {
    /// Status with no warning and no landmark echo
    pub fn message(status: impl Into<String>) -> Self {
        Self {
            direction: GazeDirection::Center,
            status: status.into(),
            warning: None,
            landmarks: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaze_direction_serialization() {
        let json = serde_json::to_string(&GazeDirection::Left).unwrap();
        assert_eq!(json, "\"LEFT\"");

        let parsed: GazeDirection = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(parsed, GazeDirection::Down);
    }

    #[test]
    fn test_violation_category_serialization() {
        let json = serde_json::to_string(&ViolationCategory::MultipleFaces).unwrap();
        assert_eq!(json, "\"multiple_faces\"");

        let custom: ViolationCategory = serde_json::from_str("\"phone_detected\"").unwrap();
        assert_eq!(custom, ViolationCategory::Custom("phone_detected".to_string()));
        assert_eq!(custom.label(), "phone_detected");
    }

    #[test]
    fn test_custom_names_clashing_with_builtins() {
        for name in ["GAZE_LEFT", "gaze_left", "Tab_Switch", "SYSTEM", " person_missing ", ""] {
            assert!(
                ViolationCategory::Custom(name.to_string()).is_ambiguous_custom(),
                "{name:?}"
            );
        }
        assert!(!ViolationCategory::Custom("PHONE_DETECTED".to_string()).is_ambiguous_custom());
        assert!(!ViolationCategory::GazeLeft.is_ambiguous_custom());
    }

    #[test]
    fn test_direction_to_violation() {
        assert_eq!(GazeDirection::Center.violation(), None);
        assert_eq!(
            GazeDirection::Up.violation(),
            Some(ViolationCategory::GazeUp)
        );
        assert!(GazeDirection::Right.violation().unwrap().is_gaze());
        assert!(!ViolationCategory::PersonMissing.is_gaze());
    }

    #[test]
    fn test_landmark_frame_is_transparent() {
        let json = r#"[{"x": 0.1, "y": 0.2}, {"x": 0.3, "y": 0.4, "z": -0.01}]"#;
        let frame: LandmarkFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.point(1).unwrap().z, Some(-0.01));
        assert!(frame.point(2).is_none());
    }

    #[test]
    fn test_live_status_skips_empty_fields() {
        let status = LiveStatus::message("Active Monitoring");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["direction"], "CENTER");
        assert!(json.get("warning").is_none());
        assert!(json.get("landmarks").is_none());
    }
}
