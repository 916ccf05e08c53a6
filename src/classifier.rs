//! Rule-based exercise classification from channel ranges.
//!
//! Rules are evaluated in a fixed priority order and the first match wins;
//! ties are never broken by magnitude. Vertical wrist/shoulder travel separates
//! pull-ups from stance-fixed exercises, and knee/hip/elbow ranges separate the
//! rest.

use serde::{Deserialize, Serialize};

use crate::config::ClassifierThresholds;
use crate::ranges::RangeProfile;
use crate::types::ExerciseType;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub exercise_type: ExerciseType,
    /// Absent for `unknown`
    pub confidence: Option<f64>,
}

/// Normalized margin of `value > threshold`, clamped to [0, 1]
fn above(value: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 1.0;
    }
    ((value - threshold) / threshold).clamp(0.0, 1.0)
}

/// Normalized margin of `value < threshold`, clamped to [0, 1]
fn below(value: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 1.0;
    }
    ((threshold - value) / threshold).clamp(0.0, 1.0)
}

/// Margin of `low <= value <= high` relative to the band half-width
fn within(value: f64, low: f64, high: f64) -> f64 {
    let half_width = (high - low) / 2.0;
    if half_width <= 0.0 {
        return 1.0;
    }
    ((value - low).min(high - value) / half_width).clamp(0.0, 1.0)
}

fn weakest(margins: &[f64]) -> f64 {
    margins.iter().copied().fold(1.0, f64::min)
}

pub struct ExerciseClassifier {
    thresholds: ClassifierThresholds,
}

impl ExerciseClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, ranges: &RangeProfile) -> Classification {
        let t = &self.thresholds;
        let elbow = ranges.elbow_range;
        let knee = ranges.knee_range;
        let hip = ranges.hip_range;
        let vertical = ranges.vertical_range();

        let specific = |exercise_type, margins: &[f64]| Classification {
            exercise_type,
            confidence: Some(0.5 + 0.5 * weakest(margins)),
        };
        let coarse = |exercise_type, margins: &[f64]| Classification {
            exercise_type,
            confidence: Some(0.5 * weakest(margins)),
        };

        let result = if vertical > t.pullup_vertical_min
            && elbow > t.pullup_elbow_min
            && knee < t.pullup_knee_max
        {
            specific(
                ExerciseType::Pullup,
                &[
                    above(vertical, t.pullup_vertical_min),
                    above(elbow, t.pullup_elbow_min),
                    below(knee, t.pullup_knee_max),
                ],
            )
        } else if knee > t.squat_knee_min && vertical > t.squat_vertical_min {
            specific(
                ExerciseType::Squat,
                &[
                    above(knee, t.squat_knee_min),
                    above(vertical, t.squat_vertical_min),
                ],
            )
        } else if knee >= t.deadlift_knee_min
            && knee <= t.deadlift_knee_max
            && hip > t.deadlift_hip_min
            && vertical <= t.deadlift_vertical_max
        {
            specific(
                ExerciseType::Deadlift,
                &[
                    within(knee, t.deadlift_knee_min, t.deadlift_knee_max),
                    above(hip, t.deadlift_hip_min),
                    below(vertical, t.deadlift_vertical_max),
                ],
            )
        } else if elbow > t.pushup_elbow_min
            && vertical <= t.pushup_vertical_max
            && knee < t.pushup_knee_max
        {
            specific(
                ExerciseType::Pushup,
                &[
                    above(elbow, t.pushup_elbow_min),
                    below(vertical, t.pushup_vertical_max),
                    below(knee, t.pushup_knee_max),
                ],
            )
        } else if elbow > t.upper_body_elbow_min && knee < t.upper_body_knee_max {
            coarse(
                ExerciseType::UpperBody,
                &[
                    above(elbow, t.upper_body_elbow_min),
                    below(knee, t.upper_body_knee_max),
                ],
            )
        } else if knee > t.lower_body_knee_min && elbow < t.lower_body_elbow_max {
            coarse(
                ExerciseType::LowerBody,
                &[
                    above(knee, t.lower_body_knee_min),
                    below(elbow, t.lower_body_elbow_max),
                ],
            )
        } else if elbow > t.full_body_elbow_min && knee > t.full_body_knee_min {
            coarse(
                ExerciseType::FullBody,
                &[
                    above(elbow, t.full_body_elbow_min),
                    above(knee, t.full_body_knee_min),
                ],
            )
        } else {
            Classification {
                exercise_type: ExerciseType::Unknown,
                confidence: None,
            }
        };

        log::debug!(
            "Classified {} (confidence {:?}) from elbow {:.1} knee {:.1} hip {:.1} vertical {:.3}",
            result.exercise_type,
            result.confidence,
            elbow,
            knee,
            hip,
            vertical
        );
        result
    }
}

impl Default for ExerciseClassifier {
    fn default() -> Self {
        Self::new(ClassifierThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn profile(elbow: f64, knee: f64, hip: f64, wrist_y: f64) -> RangeProfile {
        RangeProfile {
            elbow_range: elbow,
            knee_range: knee,
            hip_range: hip,
            wrist_y_range: wrist_y,
            shoulder_y_range: 0.0,
        }
    }

    fn classify(p: RangeProfile) -> ExerciseType {
        ExerciseClassifier::default().classify(&p).exercise_type
    }

    #[test]
    fn test_pullup() {
        assert_eq!(classify(profile(70.0, 10.0, 0.0, 0.08)), ExerciseType::Pullup);
    }

    #[test]
    fn test_squat() {
        assert_eq!(classify(profile(10.0, 70.0, 0.0, 0.08)), ExerciseType::Squat);
    }

    #[test]
    fn test_deadlift() {
        assert_eq!(classify(profile(10.0, 40.0, 60.0, 0.02)), ExerciseType::Deadlift);
        // Band edges are inclusive
        assert_eq!(classify(profile(10.0, 25.0, 30.0, 0.05)), ExerciseType::Deadlift);
        assert_eq!(classify(profile(10.0, 55.0, 30.0, 0.0)), ExerciseType::Deadlift);
    }

    #[test]
    fn test_pushup() {
        assert_eq!(classify(profile(80.0, 5.0, 5.0, 0.02)), ExerciseType::Pushup);
    }

    #[test]
    fn test_shoulder_travel_counts_as_vertical() {
        let mut p = profile(70.0, 10.0, 0.0, 0.0);
        p.shoulder_y_range = 0.1;
        assert_eq!(classify(p), ExerciseType::Pullup);
    }

    #[test]
    fn test_rule_order_breaks_ties() {
        // Satisfies pullup and upper_body; pullup is evaluated first
        assert_eq!(classify(profile(90.0, 5.0, 0.0, 0.2)), ExerciseType::Pullup);
    }

    #[test]
    fn test_coarse_categories() {
        // Vertical travel between the pushup and pullup windows
        assert_eq!(classify(profile(90.0, 5.0, 0.0, 0.04)), ExerciseType::UpperBody);
        // Knee swing without vertical travel, hip too small for a deadlift
        assert_eq!(classify(profile(10.0, 70.0, 5.0, 0.0)), ExerciseType::LowerBody);
        assert_eq!(classify(profile(65.0, 40.0, 5.0, 0.2)), ExerciseType::FullBody);
        assert_eq!(classify(profile(5.0, 5.0, 5.0, 0.0)), ExerciseType::Unknown);
    }

    #[test]
    fn test_confidence_bands() {
        let classifier = ExerciseClassifier::default();

        let pullup = classifier.classify(&profile(70.0, 10.0, 0.0, 0.08));
        // Weakest margin is vertical: (0.08 - 0.06) / 0.06
        assert_relative_eq!(pullup.confidence.unwrap(), 0.5 + 0.5 / 3.0, epsilon = 1e-9);

        let coarse = classifier.classify(&profile(10.0, 70.0, 5.0, 0.0));
        assert!(coarse.confidence.unwrap() <= 0.5);

        let unknown = classifier.classify(&profile(0.0, 0.0, 0.0, 0.0));
        assert_eq!(unknown.confidence, None);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = ClassifierThresholds {
            squat_knee_min: 80.0,
            ..Default::default()
        };
        let classifier = ExerciseClassifier::new(thresholds);
        let result = classifier.classify(&profile(10.0, 70.0, 0.0, 0.08));
        assert_ne!(result.exercise_type, ExerciseType::Squat);
    }
}
