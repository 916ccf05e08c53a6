//! Declared-vs-detected exercise validation.

use crate::config::ValidatorThresholds;
use crate::error::AnalysisError;
use crate::report::MatchRecord;
use crate::types::ExerciseType;

/// Normalize a caller-supplied exercise name.
/// Lowercases, strips spaces and hyphens and resolves plural/alias spellings;
/// unrecognized names pass through in normalized form.
pub fn normalize_exercise_label(name: &str) -> Option<String> {
    let key: String = name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if key.is_empty() {
        return None;
    }
    let canonical = match key.as_str() {
        "pullup" | "pullups" | "chinup" | "chinups" => "pullup",
        "squat" | "squats" => "squat",
        "deadlift" | "deadlifts" => "deadlift",
        "pushup" | "pushups" => "pushup",
        "burpee" | "burpees" => "burpee",
        "lunge" | "lunges" => "lunge",
        "plank" | "planks" => "plank",
        other => other,
    };
    Some(canonical.to_string())
}

pub struct ExerciseMatchValidator {
    thresholds: ValidatorThresholds,
}

impl ExerciseMatchValidator {
    pub fn new(thresholds: ValidatorThresholds) -> Self {
        Self { thresholds }
    }

    /// Compare a normalized expected label with the classifier output.
    ///
    /// Only a strict request with a confident, determinate detection can fail;
    /// everything else yields a non-blocking match record.
    pub fn validate(
        &self,
        expected: &str,
        detected: ExerciseType,
        confidence: Option<f64>,
        strict: bool,
    ) -> Result<MatchRecord, AnalysisError> {
        let matched = expected == detected.as_str();
        let confident =
            confidence.map_or(false, |c| c >= self.thresholds.mismatch_min_confidence);

        if !matched && strict && !detected.is_indeterminate() && confident {
            log::warn!(
                "Exercise mismatch: expected '{}', detected '{}' ({:?})",
                expected,
                detected,
                confidence
            );
            return Err(AnalysisError::ExerciseMismatch {
                expected: expected.to_string(),
                detected,
                confidence: confidence.unwrap_or_default(),
            });
        }

        if !matched {
            log::info!(
                "Declared '{}' but detected '{}', continuing (strict={}, confidence {:?})",
                expected,
                detected,
                strict,
                confidence
            );
        }

        Ok(MatchRecord {
            expected_exercise: expected.to_string(),
            detected_exercise: detected,
            matched,
        })
    }
}

impl Default for ExerciseMatchValidator {
    fn default() -> Self {
        Self::new(ValidatorThresholds::default())
    }
}
