//! Direction classification
//!
//! Maps one face's landmarks to a discrete gaze direction by locating the
//! nose tip inside the face's bounding landmarks. The image shown to the
//! subject is mirrored, so a nose close to the camera-left edge means the
//! subject turned right.

use crate::config::{LandmarkIndices, ProctorConfig};
use crate::types::{GazeDirection, LandmarkFrame};

/// Spans below this are treated as zero width/height
const MIN_SPAN: f64 = 1e-9;

/// Stateless landmark → direction classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionClassifier {
    indices: LandmarkIndices,
    horizontal_threshold: f64,
    vertical_threshold: f64,
}

impl Default for DirectionClassifier {
    fn default() -> Self {
        Self::from_config(&ProctorConfig::default())
    }
}

impl DirectionClassifier {
    pub fn from_config(config: &ProctorConfig) -> Self {
        Self {
            indices: config.landmarks,
            horizontal_threshold: config.horizontal_threshold,
            vertical_threshold: config.vertical_threshold,
        }
    }

    /// Classify a single face.
    ///
    /// Total: a face missing one of the reference slots reads as CENTER, and
    /// an axis with no span is treated as centered on that axis.
    pub fn classify(&self, face: &LandmarkFrame) -> GazeDirection {
        let idx = &self.indices;
        let (Some(nose), Some(left), Some(right), Some(chin), Some(forehead)) = (
            face.point(idx.nose_tip),
            face.point(idx.left_edge),
            face.point(idx.right_edge),
            face.point(idx.chin),
            face.point(idx.forehead),
        ) else {
            return GazeDirection::Center;
        };

        // Horizontal turn wins over vertical tilt
        if let Some(rel_x) = relative_position(nose.x, left.x, right.x) {
            if rel_x < 0.5 - self.horizontal_threshold {
                return GazeDirection::Right;
            }
            if rel_x > 0.5 + self.horizontal_threshold {
                return GazeDirection::Left;
            }
        }

        if let Some(rel_y) = relative_position(nose.y, forehead.y, chin.y) {
            if rel_y < 0.5 - self.vertical_threshold {
                return GazeDirection::Up;
            }
            if rel_y > 0.5 + self.vertical_threshold {
                return GazeDirection::Down;
            }
        }

        GazeDirection::Center
    }
}

/// Position of `value` along `start..end` (0 at start, 1 at end)
fn relative_position(value: f64, start: f64, end: f64) -> Option<f64> {
    let span = end - start;
    if !span.is_finite() || span.abs() < MIN_SPAN {
        return None;
    }
    let rel = (value - start) / span;
    rel.is_finite().then_some(rel)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::config::LandmarkIndices;
    use crate::types::{Landmark, LandmarkFrame};

    /// Build a full-size face with the reference slots placed so that the
    /// nose sits at (`rel_x`, `rel_y`) inside the face box
    pub fn face_at(rel_x: f64, rel_y: f64) -> LandmarkFrame {
        let idx = LandmarkIndices::default();
        let mut points = vec![Landmark::new(0.5, 0.5); idx.required_points()];

        let (left, right) = (0.3, 0.7);
        let (forehead, chin) = (0.2, 0.8);

        points[idx.left_edge] = Landmark::new(left, 0.5);
        points[idx.right_edge] = Landmark::new(right, 0.5);
        points[idx.forehead] = Landmark::new(0.5, forehead);
        points[idx.chin] = Landmark::new(0.5, chin);
        points[idx.nose_tip] = Landmark::new(
            left + rel_x * (right - left),
            forehead + rel_y * (chin - forehead),
        );

        LandmarkFrame::new(points)
    }

    pub fn centered_face() -> LandmarkFrame {
        face_at(0.5, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::face_at;
    use super::*;
    use crate::config::{DEFAULT_HORIZONTAL_THRESHOLD, DEFAULT_VERTICAL_THRESHOLD};
    use crate::types::Landmark;

    #[test]
    fn test_center_band() {
        let classifier = DirectionClassifier::default();

        for rel_x in [0.26, 0.3, 0.5, 0.7, 0.74] {
            for rel_y in [0.36, 0.4, 0.5, 0.6, 0.64] {
                assert_eq!(
                    classifier.classify(&face_at(rel_x, rel_y)),
                    GazeDirection::Center,
                    "rel_x={rel_x} rel_y={rel_y}"
                );
            }
        }
    }

    /// Face box spanning 0..1 on both axes, so the nose coordinates are
    /// the relative positions bit for bit
    fn unit_box_face(x: f64, y: f64) -> LandmarkFrame {
        let idx = LandmarkIndices::default();
        let mut points = vec![Landmark::new(0.5, 0.5); idx.required_points()];
        points[idx.left_edge] = Landmark::new(0.0, 0.5);
        points[idx.right_edge] = Landmark::new(1.0, 0.5);
        points[idx.forehead] = Landmark::new(0.5, 0.0);
        points[idx.chin] = Landmark::new(0.5, 1.0);
        points[idx.nose_tip] = Landmark::new(x, y);
        LandmarkFrame::new(points)
    }

    fn next_down(v: f64) -> f64 {
        f64::from_bits(v.to_bits() - 1)
    }

    fn next_up(v: f64) -> f64 {
        f64::from_bits(v.to_bits() + 1)
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        let classifier = DirectionClassifier::default();
        let (h, v) = (DEFAULT_HORIZONTAL_THRESHOLD, DEFAULT_VERTICAL_THRESHOLD);
        let (left_edge, right_edge) = (0.5 - h, 0.5 + h);
        let (top_edge, bottom_edge) = (0.5 - v, 0.5 + v);

        for (x, y) in [
            (left_edge, 0.5),
            (right_edge, 0.5),
            (0.5, top_edge),
            (0.5, bottom_edge),
            (left_edge, top_edge),
            (right_edge, bottom_edge),
        ] {
            assert_eq!(
                classifier.classify(&unit_box_face(x, y)),
                GazeDirection::Center,
                "x={x} y={y}"
            );
        }

        let outside = [
            (next_down(left_edge), 0.5, GazeDirection::Right),
            (next_up(right_edge), 0.5, GazeDirection::Left),
            (0.5, next_down(top_edge), GazeDirection::Up),
            (0.5, next_up(bottom_edge), GazeDirection::Down),
        ];
        for (x, y, expected) in outside {
            assert_eq!(
                classifier.classify(&unit_box_face(x, y)),
                expected,
                "x={x} y={y}"
            );
        }
    }

    #[test]
    fn test_horizontal_is_mirrored() {
        let classifier = DirectionClassifier::default();
        assert_eq!(classifier.classify(&face_at(0.1, 0.5)), GazeDirection::Right);
        assert_eq!(classifier.classify(&face_at(0.9, 0.5)), GazeDirection::Left);
    }

    #[test]
    fn test_vertical() {
        let classifier = DirectionClassifier::default();
        assert_eq!(classifier.classify(&face_at(0.5, 0.2)), GazeDirection::Up);
        assert_eq!(classifier.classify(&face_at(0.5, 0.8)), GazeDirection::Down);
    }

    #[test]
    fn test_horizontal_takes_priority() {
        let classifier = DirectionClassifier::default();
        assert_eq!(classifier.classify(&face_at(0.9, 0.9)), GazeDirection::Left);
        assert_eq!(classifier.classify(&face_at(0.1, 0.1)), GazeDirection::Right);
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = ProctorConfig {
            horizontal_threshold: 0.1,
            vertical_threshold: 0.05,
            ..ProctorConfig::default()
        };
        let strict = DirectionClassifier::from_config(&config);
        let lenient = DirectionClassifier::default();

        let face = face_at(0.68, 0.5);
        assert_eq!(strict.classify(&face), GazeDirection::Left);
        assert_eq!(lenient.classify(&face), GazeDirection::Center);

        let face = face_at(0.5, 0.58);
        assert_eq!(strict.classify(&face), GazeDirection::Down);
        assert_eq!(lenient.classify(&face), GazeDirection::Center);
    }

    #[test]
    fn test_pure_function() {
        let classifier = DirectionClassifier::default();
        let face = face_at(0.85, 0.5);
        let first = classifier.classify(&face);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&face), first);
        }
    }

    #[test]
    fn test_missing_slots_are_center() {
        let classifier = DirectionClassifier::default();
        let short = LandmarkFrame::new(vec![Landmark::new(0.9, 0.9); 20]);
        assert_eq!(classifier.classify(&short), GazeDirection::Center);
        assert_eq!(
            classifier.classify(&LandmarkFrame::default()),
            GazeDirection::Center
        );
    }

    #[test]
    fn test_zero_span_axis_is_centered() {
        let classifier = DirectionClassifier::default();
        let idx = LandmarkIndices::default();
        let mut face = face_at(0.5, 0.9);
        face.points[idx.left_edge] = Landmark::new(0.5, 0.5);
        face.points[idx.right_edge] = Landmark::new(0.5, 0.5);

        // Horizontal axis collapses, vertical still reads
        assert_eq!(classifier.classify(&face), GazeDirection::Down);

        face.points[idx.chin] = face.points[idx.forehead];
        assert_eq!(classifier.classify(&face), GazeDirection::Center);
    }

    #[test]
    fn test_compact_indices() {
        let config = ProctorConfig {
            landmarks: LandmarkIndices {
                nose_tip: 0,
                left_edge: 1,
                right_edge: 2,
                chin: 3,
                forehead: 4,
            },
            ..ProctorConfig::default()
        };
        let classifier = DirectionClassifier::from_config(&config);
        let face = LandmarkFrame::new(vec![
            Landmark::new(0.32, 0.5),
            Landmark::new(0.3, 0.5),
            Landmark::new(0.7, 0.5),
            Landmark::new(0.5, 0.8),
            Landmark::new(0.5, 0.2),
        ]);
        assert_eq!(classifier.classify(&face), GazeDirection::Right);
    }
}
