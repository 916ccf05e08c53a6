//! Threshold configuration for the analysis pipeline.
//!
//! All thresholds are empirically tuned per deployment and camera setup, so
//! every one of them can be overridden by a flat snake_case key, either from a
//! JSON file, a `MOVEMENT_<KEY>` environment variable or [`ThresholdConfig::set`].
//! The resulting value is built once at startup and shared read-only.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::smoothing::MAX_SMOOTHING_WINDOW;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "MOVEMENT_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Centered moving-average window (samples, odd)
    pub window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { window: 7 }
    }
}

/// Range signatures for the rule-based exercise classifier.
/// Angles in degrees, vertical ranges in normalized image units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub pullup_vertical_min: f64,
    pub pullup_elbow_min: f64,
    pub pullup_knee_max: f64,
    pub squat_knee_min: f64,
    pub squat_vertical_min: f64,
    pub deadlift_knee_min: f64,
    pub deadlift_knee_max: f64,
    pub deadlift_hip_min: f64,
    pub deadlift_vertical_max: f64,
    pub pushup_elbow_min: f64,
    pub pushup_vertical_max: f64,
    pub pushup_knee_max: f64,
    pub upper_body_elbow_min: f64,
    pub upper_body_knee_max: f64,
    pub lower_body_knee_min: f64,
    pub lower_body_elbow_max: f64,
    pub full_body_elbow_min: f64,
    pub full_body_knee_min: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            pullup_vertical_min: 0.06,
            pullup_elbow_min: 35.0,
            pullup_knee_max: 25.0,
            squat_knee_min: 55.0,
            squat_vertical_min: 0.04,
            deadlift_knee_min: 25.0,
            deadlift_knee_max: 55.0,
            deadlift_hip_min: 20.0,
            deadlift_vertical_max: 0.05,
            pushup_elbow_min: 45.0,
            pushup_vertical_max: 0.03,
            pushup_knee_max: 25.0,
            upper_body_elbow_min: 60.0,
            upper_body_knee_max: 30.0,
            lower_body_knee_min: 30.0,
            lower_body_elbow_max: 60.0,
            full_body_elbow_min: 30.0,
            full_body_knee_min: 30.0,
        }
    }
}

/// Hysteresis bands and amplitude floors for repetition counting
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepThresholds {
    pub pullup_min_amplitude: f64,
    pub pullup_low_fraction: f64,
    pub pullup_high_fraction: f64,
    pub squat_min_amplitude: f64,
    pub squat_low_percentile: f64,
    pub squat_high_percentile: f64,
    pub deadlift_min_amplitude: f64,
    pub deadlift_low_percentile: f64,
    pub deadlift_high_percentile: f64,
    pub pushup_min_amplitude: f64,
    pub pushup_low_percentile: f64,
    pub pushup_high_percentile: f64,
    /// Degrees of range per estimated rep for coarse categories
    pub fallback_degrees_per_rep: f64,
    pub max_reps: u32,
}

impl Default for RepThresholds {
    fn default() -> Self {
        Self {
            pullup_min_amplitude: 0.03,
            pullup_low_fraction: 0.25,
            pullup_high_fraction: 0.75,
            squat_min_amplitude: 30.0,
            squat_low_percentile: 30.0,
            squat_high_percentile: 70.0,
            deadlift_min_amplitude: 20.0,
            deadlift_low_percentile: 35.0,
            deadlift_high_percentile: 75.0,
            pushup_min_amplitude: 25.0,
            pushup_low_percentile: 35.0,
            pushup_high_percentile: 75.0,
            fallback_degrees_per_rep: 25.0,
            max_reps: 200,
        }
    }
}

/// Person-presence and motion gate thresholds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    pub person_frames_ratio_min: f64,
    pub person_avg_visibility_min: f64,
    pub person_min_keypoints: u32,
    /// A keypoint counts as present above this visibility
    pub keypoint_visibility_cutoff: f64,
    pub motion_score_min: f64,
    pub low_fps_cutoff: f64,
    pub low_fps_adjustment: f64,
    pub angle_motion_scale: f64,
    pub vertical_motion_scale: f64,
    pub good_frames_ratio: f64,
    pub good_avg_visibility: f64,
    pub good_motion_score: f64,
    pub frames_ratio_penalty: f64,
    pub visibility_penalty: f64,
    pub motion_penalty: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            person_frames_ratio_min: 0.10,
            person_avg_visibility_min: 0.50,
            person_min_keypoints: 4,
            keypoint_visibility_cutoff: 0.5,
            motion_score_min: 1.0,
            low_fps_cutoff: 20.0,
            low_fps_adjustment: 0.15,
            angle_motion_scale: 25.0,
            vertical_motion_scale: 0.05,
            good_frames_ratio: 0.60,
            good_avg_visibility: 0.70,
            good_motion_score: 1.5,
            frames_ratio_penalty: 0.8,
            visibility_penalty: 0.8,
            motion_penalty: 0.9,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorThresholds {
    /// Below this classifier confidence a mismatch is inconclusive
    pub mismatch_min_confidence: f64,
}

impl Default for ValidatorThresholds {
    fn default() -> Self {
        Self {
            mismatch_min_confidence: 0.6,
        }
    }
}

/// Immutable process-wide threshold set
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub smoothing: SmoothingConfig,
    pub classifier: ClassifierThresholds,
    pub reps: RepThresholds,
    pub gate: GateThresholds,
    pub validator: ValidatorThresholds,
}

enum Slot<'a> {
    Real(&'a mut f64),
    Count(&'a mut usize),
    Whole(&'a mut u32),
}

impl ThresholdConfig {
    /// Defaults, then the optional JSON file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Every overridable key, in declaration order
    pub fn keys(&self) -> Vec<&'static str> {
        let mut copy = self.clone();
        copy.slots().into_iter().map(|(key, _)| key).collect()
    }

    /// Apply `MOVEMENT_<KEY>` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<usize, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0;
        for key in self.keys() {
            let var = format!("{}{}", ENV_PREFIX, key.to_uppercase());
            if let Some(raw) = lookup(&var) {
                self.set_str(key, &raw)?;
                log::info!("Threshold override {}={} (from {})", key, raw.trim(), var);
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Parse and set a single `key=value` assignment.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), ConfigError> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidValue {
                key: assignment.to_string(),
                reason: "expected key=value".to_string(),
            })?;
        self.set_str(key.trim(), value)
    }

    pub fn set_str(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let value: f64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{}' is not a number", raw.trim()),
        })?;
        self.set(key, value)
    }

    /// Override one threshold by its flat key.
    pub fn set(&mut self, key: &str, value: f64) -> Result<(), ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        let slot = self
            .slots()
            .into_iter()
            .find(|(name, _)| *name == key)
            .map(|(_, slot)| slot)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let integral = value >= 0.0 && value.fract() == 0.0;
        match slot {
            Slot::Real(target) => *target = value,
            Slot::Count(_) | Slot::Whole(_) if !integral => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must be a non-negative integer".to_string(),
                });
            }
            Slot::Count(target) => *target = value as usize,
            Slot::Whole(target) => *target = value as u32,
        }
        Ok(())
    }

    fn slots(&mut self) -> Vec<(&'static str, Slot<'_>)> {
        let s = &mut self.smoothing;
        let c = &mut self.classifier;
        let r = &mut self.reps;
        let g = &mut self.gate;
        let v = &mut self.validator;
        vec![
            ("smoothing_window", Slot::Count(&mut s.window)),
            ("pullup_vertical_min", Slot::Real(&mut c.pullup_vertical_min)),
            ("pullup_elbow_min", Slot::Real(&mut c.pullup_elbow_min)),
            ("pullup_knee_max", Slot::Real(&mut c.pullup_knee_max)),
            ("squat_knee_min", Slot::Real(&mut c.squat_knee_min)),
            ("squat_vertical_min", Slot::Real(&mut c.squat_vertical_min)),
            ("deadlift_knee_min", Slot::Real(&mut c.deadlift_knee_min)),
            ("deadlift_knee_max", Slot::Real(&mut c.deadlift_knee_max)),
            ("deadlift_hip_min", Slot::Real(&mut c.deadlift_hip_min)),
            ("deadlift_vertical_max", Slot::Real(&mut c.deadlift_vertical_max)),
            ("pushup_elbow_min", Slot::Real(&mut c.pushup_elbow_min)),
            ("pushup_vertical_max", Slot::Real(&mut c.pushup_vertical_max)),
            ("pushup_knee_max", Slot::Real(&mut c.pushup_knee_max)),
            ("upper_body_elbow_min", Slot::Real(&mut c.upper_body_elbow_min)),
            ("upper_body_knee_max", Slot::Real(&mut c.upper_body_knee_max)),
            ("lower_body_knee_min", Slot::Real(&mut c.lower_body_knee_min)),
            ("lower_body_elbow_max", Slot::Real(&mut c.lower_body_elbow_max)),
            ("full_body_elbow_min", Slot::Real(&mut c.full_body_elbow_min)),
            ("full_body_knee_min", Slot::Real(&mut c.full_body_knee_min)),
            ("pullup_min_amplitude", Slot::Real(&mut r.pullup_min_amplitude)),
            ("pullup_low_fraction", Slot::Real(&mut r.pullup_low_fraction)),
            ("pullup_high_fraction", Slot::Real(&mut r.pullup_high_fraction)),
            ("squat_min_amplitude", Slot::Real(&mut r.squat_min_amplitude)),
            ("squat_low_percentile", Slot::Real(&mut r.squat_low_percentile)),
            ("squat_high_percentile", Slot::Real(&mut r.squat_high_percentile)),
            ("deadlift_min_amplitude", Slot::Real(&mut r.deadlift_min_amplitude)),
            ("deadlift_low_percentile", Slot::Real(&mut r.deadlift_low_percentile)),
            ("deadlift_high_percentile", Slot::Real(&mut r.deadlift_high_percentile)),
            ("pushup_min_amplitude", Slot::Real(&mut r.pushup_min_amplitude)),
            ("pushup_low_percentile", Slot::Real(&mut r.pushup_low_percentile)),
            ("pushup_high_percentile", Slot::Real(&mut r.pushup_high_percentile)),
            ("fallback_degrees_per_rep", Slot::Real(&mut r.fallback_degrees_per_rep)),
            ("max_reps", Slot::Whole(&mut r.max_reps)),
            ("person_frames_ratio_min", Slot::Real(&mut g.person_frames_ratio_min)),
            ("person_avg_visibility_min", Slot::Real(&mut g.person_avg_visibility_min)),
            ("person_min_keypoints", Slot::Whole(&mut g.person_min_keypoints)),
            ("keypoint_visibility_cutoff", Slot::Real(&mut g.keypoint_visibility_cutoff)),
            ("motion_score_min", Slot::Real(&mut g.motion_score_min)),
            ("low_fps_cutoff", Slot::Real(&mut g.low_fps_cutoff)),
            ("low_fps_adjustment", Slot::Real(&mut g.low_fps_adjustment)),
            ("angle_motion_scale", Slot::Real(&mut g.angle_motion_scale)),
            ("vertical_motion_scale", Slot::Real(&mut g.vertical_motion_scale)),
            ("good_frames_ratio", Slot::Real(&mut g.good_frames_ratio)),
            ("good_avg_visibility", Slot::Real(&mut g.good_avg_visibility)),
            ("good_motion_score", Slot::Real(&mut g.good_motion_score)),
            ("frames_ratio_penalty", Slot::Real(&mut g.frames_ratio_penalty)),
            ("visibility_penalty", Slot::Real(&mut g.visibility_penalty)),
            ("motion_penalty", Slot::Real(&mut g.motion_penalty)),
            ("mismatch_min_confidence", Slot::Real(&mut v.mismatch_min_confidence)),
        ]
    }

    /// Reject threshold sets that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if self.smoothing.window == 0 || self.smoothing.window > MAX_SMOOTHING_WINDOW {
            return Err(invalid(
                "smoothing_window",
                &format!("must be within 1..={}", MAX_SMOOTHING_WINDOW),
            ));
        }

        let r = &self.reps;
        let bands = [
            ("squat", r.squat_low_percentile, r.squat_high_percentile),
            ("deadlift", r.deadlift_low_percentile, r.deadlift_high_percentile),
            ("pushup", r.pushup_low_percentile, r.pushup_high_percentile),
        ];
        for (name, low, high) in bands {
            if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
                return Err(invalid(
                    &format!("{}_low_percentile", name),
                    "percentiles must satisfy 0 <= low < high <= 100",
                ));
            }
        }
        if !(0.0..=1.0).contains(&r.pullup_low_fraction)
            || !(0.0..=1.0).contains(&r.pullup_high_fraction)
            || r.pullup_low_fraction >= r.pullup_high_fraction
        {
            return Err(invalid(
                "pullup_low_fraction",
                "fractions must satisfy 0 <= low < high <= 1",
            ));
        }
        if r.fallback_degrees_per_rep <= 0.0 {
            return Err(invalid("fallback_degrees_per_rep", "must be positive"));
        }

        let c = &self.classifier;
        if c.deadlift_knee_min > c.deadlift_knee_max {
            return Err(invalid(
                "deadlift_knee_min",
                "must not exceed deadlift_knee_max",
            ));
        }

        let g = &self.gate;
        for (key, value) in [
            ("person_frames_ratio_min", g.person_frames_ratio_min),
            ("person_avg_visibility_min", g.person_avg_visibility_min),
            ("keypoint_visibility_cutoff", g.keypoint_visibility_cutoff),
            ("good_frames_ratio", g.good_frames_ratio),
            ("good_avg_visibility", g.good_avg_visibility),
            ("frames_ratio_penalty", g.frames_ratio_penalty),
            ("visibility_penalty", g.visibility_penalty),
            ("motion_penalty", g.motion_penalty),
            ("mismatch_min_confidence", self.validator.mismatch_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, "must be within [0, 1]"));
            }
        }
        if g.angle_motion_scale <= 0.0 || g.vertical_motion_scale <= 0.0 {
            return Err(invalid("angle_motion_scale", "motion scales must be positive"));
        }
        if g.motion_score_min < 0.0 || g.low_fps_adjustment < 0.0 {
            return Err(invalid("motion_score_min", "must not be negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ThresholdConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.smoothing.window, 7);
        assert_eq!(config.gate.person_frames_ratio_min, 0.10);
        assert_eq!(config.reps.max_reps, 200);
    }

    #[test]
    fn test_every_key_is_settable() {
        let mut config = ThresholdConfig::default();
        for key in config.keys() {
            assert!(config.set(key, 1.0).is_ok(), "key {} rejected", key);
        }
    }

    #[test]
    fn test_set_unknown_key() {
        let mut config = ThresholdConfig::default();
        assert!(matches!(
            config.set("no_such_threshold", 1.0),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_integer_slots_reject_fractions() {
        let mut config = ThresholdConfig::default();
        assert!(config.set("person_min_keypoints", 2.5).is_err());
        assert!(config.set("smoothing_window", -1.0).is_err());
        config.set("person_min_keypoints", 6.0).unwrap();
        assert_eq!(config.gate.person_min_keypoints, 6);
    }

    #[test]
    fn test_oversized_smoothing_window_rejected() {
        let mut config = ThresholdConfig::default();
        config.set("smoothing_window", 1e19).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "smoothing_window"
        ));

        config.set("smoothing_window", MAX_SMOOTHING_WINDOW as f64).unwrap();
        assert!(config.validate().is_ok());
        config.set("smoothing_window", 0.0).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_style_overrides() {
        let vars: HashMap<String, String> = [
            ("MOVEMENT_PERSON_FRAMES_RATIO_MIN", "0.25"),
            ("MOVEMENT_SQUAT_HIGH_PERCENTILE", " 80 "),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = ThresholdConfig::default();
        let applied = config.apply_overrides(|name| vars.get(name).cloned()).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(config.gate.person_frames_ratio_min, 0.25);
        assert_eq!(config.reps.squat_high_percentile, 80.0);
    }

    #[test]
    fn test_override_parse_error() {
        let mut config = ThresholdConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "MOVEMENT_MOTION_SCORE_MIN").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_assignment() {
        let mut config = ThresholdConfig::default();
        config.apply_assignment("low_fps_adjustment=0.2").unwrap();
        assert_eq!(config.gate.low_fps_adjustment, 0.2);
        assert!(config.apply_assignment("low_fps_adjustment").is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ThresholdConfig::from_json_str(r#"{"gate":{"person_min_keypoints":6}}"#).unwrap();
        assert_eq!(config.gate.person_min_keypoints, 6);
        assert_eq!(config.gate.person_avg_visibility_min, 0.50);
        assert_eq!(config.classifier, ClassifierThresholds::default());
    }

    #[test]
    fn test_validate_rejects_inverted_percentiles() {
        let mut config = ThresholdConfig::default();
        config.set("pushup_low_percentile", 80.0).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ratio_above_one() {
        let mut config = ThresholdConfig::default();
        config.set("good_avg_visibility", 1.5).unwrap();
        assert!(config.validate().is_err());
    }
}
