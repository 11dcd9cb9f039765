//! Engine configuration
//!
//! Tolerance windows, classification thresholds and landmark slot indices.
//! Everything is a plain serde struct with defaults so deployments can
//! calibrate sensitivity from a JSON file without code changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ProctorError;
use crate::types::ViolationCategory;

/// Default sustained-gaze tolerance (3 seconds)
pub const DEFAULT_GAZE_TOLERANCE_MS: u64 = 3_000;

/// Default absence tolerance (5 seconds)
pub const DEFAULT_ABSENCE_TOLERANCE_MS: u64 = 5_000;

/// Default horizontal half-band around the face center
pub const DEFAULT_HORIZONTAL_THRESHOLD: f64 = 0.25;

/// Default vertical half-band around the face center
pub const DEFAULT_VERTICAL_THRESHOLD: f64 = 0.15;

/// Default number of faces the vision model is asked to track
pub const DEFAULT_MAX_FACES: usize = 2;

/// Landmark slots the direction classifier reads.
///
/// Defaults match the MediaPipe FaceMesh topology (468/478 points).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkIndices {
    pub nose_tip: usize,
    pub left_edge: usize,
    pub right_edge: usize,
    pub chin: usize,
    pub forehead: usize,
}

impl Default for LandmarkIndices {
    fn default() -> Self {
        Self {
            nose_tip: 1,
            left_edge: 234,
            right_edge: 454,
            chin: 152,
            forehead: 10,
        }
    }
}

impl LandmarkIndices {
    /// Smallest face size (point count) that covers every slot
    pub fn required_points(&self) -> usize {
        [
            self.nose_tip,
            self.left_edge,
            self.right_edge,
            self.chin,
            self.forehead,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Tolerance for each gaze category, in milliseconds
    pub gaze_tolerance_ms: u64,
    /// Tolerance for person-missing, in milliseconds
    pub absence_tolerance_ms: u64,
    /// Tolerances for host-defined categories, keyed by category label.
    /// Custom categories without an entry are zero-tolerance.
    pub custom_tolerances_ms: HashMap<String, u64>,
    /// Horizontal half-band `H` around 0.5
    pub horizontal_threshold: f64,
    /// Vertical half-band `V` around 0.5
    pub vertical_threshold: f64,
    /// Maximum faces tracked by the vision model; only used to tell one
    /// face from many
    pub max_faces: usize,
    pub landmarks: LandmarkIndices,
    /// Echo the primary face's landmarks in live status updates
    pub echo_landmarks: bool,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            gaze_tolerance_ms: DEFAULT_GAZE_TOLERANCE_MS,
            absence_tolerance_ms: DEFAULT_ABSENCE_TOLERANCE_MS,
            custom_tolerances_ms: HashMap::new(),
            horizontal_threshold: DEFAULT_HORIZONTAL_THRESHOLD,
            vertical_threshold: DEFAULT_VERTICAL_THRESHOLD,
            max_faces: DEFAULT_MAX_FACES,
            landmarks: LandmarkIndices::default(),
            echo_landmarks: true,
        }
    }
}

impl ProctorConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ProctorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ProctorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<(), ProctorError> {
        for (name, value) in [
            ("horizontal_threshold", self.horizontal_threshold),
            ("vertical_threshold", self.vertical_threshold),
        ] {
            if !(value > 0.0 && value < 0.5) {
                return Err(ProctorError::InvalidConfig(format!(
                    "{name} must be within (0, 0.5), got {value}"
                )));
            }
        }

        if self.gaze_tolerance_ms == 0 {
            return Err(ProctorError::InvalidConfig(
                "gaze_tolerance_ms must be greater than zero".to_string(),
            ));
        }

        if self.absence_tolerance_ms == 0 {
            return Err(ProctorError::InvalidConfig(
                "absence_tolerance_ms must be greater than zero".to_string(),
            ));
        }

        if self.max_faces < 2 {
            return Err(ProctorError::InvalidConfig(format!(
                "max_faces must be at least 2 to detect multiple people, got {}",
                self.max_faces
            )));
        }

        if let Some(name) = self
            .custom_tolerances_ms
            .keys()
            .find(|name| ViolationCategory::Custom((*name).clone()).is_ambiguous_custom())
        {
            return Err(ProctorError::InvalidConfig(format!(
                "custom_tolerances_ms key {name:?} is blank or names a built-in category"
            )));
        }

        Ok(())
    }

    /// Tolerance window for a category, `None` for zero-tolerance categories
    pub fn tolerance_ms(&self, category: &ViolationCategory) -> Option<u64> {
        match category {
            ViolationCategory::GazeLeft
            | ViolationCategory::GazeRight
            | ViolationCategory::GazeUp
            | ViolationCategory::GazeDown => Some(self.gaze_tolerance_ms),
            ViolationCategory::PersonMissing => Some(self.absence_tolerance_ms),
            ViolationCategory::MultipleFaces
            | ViolationCategory::TabSwitch
            | ViolationCategory::System => None,
            ViolationCategory::Custom(name) => self
                .custom_tolerances_ms
                .get(name)
                .copied()
                .filter(|ms| *ms > 0),
        }
    }
}
