//! Result types handed to the feedback-generation collaborator.
//!
//! A rejection serializes as `{status: "error", code, message, tips, diagnostics}`
//! and an acceptance as `{status: "success", movement_analysis, diagnostics,
//! quality_score, quality_warnings, validation}`.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::ranges::{AngleAverages, RangeProfile};
use crate::types::ExerciseType;

/// Classification, ranges and rep count of one recording
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementAnalysisResult {
    pub exercise_type: ExerciseType,
    #[serde(flatten)]
    pub ranges: RangeProfile,
    pub estimated_reps: u32,
    #[serde(flatten)]
    pub averages: AngleAverages,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Motion amplitudes fed into the motion score
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionAmplitude {
    pub elbow: f64,
    pub knee: f64,
    pub shoulder_y: f64,
    pub wrist_y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GateDiagnostics {
    pub frames_with_pose_ratio: f64,
    pub avg_visibility: f64,
    pub min_keypoints_per_frame: u32,
    pub motion_amplitude: MotionAmplitude,
    pub motion_score: f64,
    pub frames_with_pose: usize,
    pub source_total_frames: usize,
    pub sample_fps: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    NoPerson,
    InsufficientMotion,
}

/// Expected vs detected exercise for a declared exercise label
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub expected_exercise: String,
    pub detected_exercise: ExerciseType,
    #[serde(rename = "match")]
    pub matched: bool,
}

/// Validation block of every accepted result.
/// The match fields are present only when the caller declared an exercise.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Classifier confidence, `null` for `unknown`
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub declared: Option<MatchRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptedAnalysis {
    pub status: ResponseStatus,
    pub movement_analysis: MovementAnalysisResult,
    pub diagnostics: GateDiagnostics,
    /// Multiplicative trust proxy in [0, 1]
    pub quality_score: f64,
    pub quality_warnings: Vec<String>,
    #[serde(default)]
    pub validation: ValidationRecord,
}

/// Structured, user-facing gate failure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateFailure {
    pub status: ResponseStatus,
    pub code: RejectionCode,
    pub message: String,
    pub tips: Vec<String>,
    pub diagnostics: GateDiagnostics,
}

impl GateFailure {
    pub fn to_error(&self) -> AnalysisError {
        let d = &self.diagnostics;
        match self.code {
            RejectionCode::NoPerson if d.frames_with_pose == 0 => AnalysisError::EmptySeries,
            RejectionCode::NoPerson => AnalysisError::NoPersonDetected(format!(
                "pose in {:.1}% of frames, avg visibility {:.2}, min keypoints {}",
                d.frames_with_pose_ratio * 100.0,
                d.avg_visibility,
                d.min_keypoints_per_frame
            )),
            RejectionCode::InsufficientMotion => {
                AnalysisError::InsufficientMotion(format!("motion score {:.2}", d.motion_score))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GateDecision {
    Accepted(AcceptedAnalysis),
    Rejected(GateFailure),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted(_))
    }

    pub fn diagnostics(&self) -> &GateDiagnostics {
        match self {
            GateDecision::Accepted(a) => &a.diagnostics,
            GateDecision::Rejected(r) => &r.diagnostics,
        }
    }

    /// Turn a rejection into its error variant for `?`-style callers
    pub fn into_result(self) -> Result<AcceptedAnalysis, AnalysisError> {
        match self {
            GateDecision::Accepted(accepted) => Ok(accepted),
            GateDecision::Rejected(failure) => Err(failure.to_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: RejectionCode, frames_with_pose: usize) -> GateFailure {
        GateFailure {
            status: ResponseStatus::Error,
            code,
            message: "No person detected in the video".to_string(),
            tips: vec!["Improve lighting".to_string()],
            diagnostics: GateDiagnostics {
                frames_with_pose,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_failure_shape() {
        let decision = GateDecision::Rejected(failure(RejectionCode::NoPerson, 3));
        let value = serde_json::to_value(&decision).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["code", "diagnostics", "message", "status", "tips"]);
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "NO_PERSON");
    }

    #[test]
    fn test_rejection_errors() {
        assert_eq!(
            failure(RejectionCode::NoPerson, 0).to_error(),
            AnalysisError::EmptySeries
        );
        assert!(matches!(
            failure(RejectionCode::NoPerson, 4).to_error(),
            AnalysisError::NoPersonDetected(_)
        ));
        let decision = GateDecision::Rejected(failure(RejectionCode::InsufficientMotion, 40));
        assert!(!decision.is_accepted());
        assert!(matches!(
            decision.into_result(),
            Err(AnalysisError::InsufficientMotion(_))
        ));
    }

    #[test]
    fn test_validation_record_shape() {
        let bare = ValidationRecord {
            confidence: Some(0.7),
            declared: None,
        };
        let value = serde_json::to_value(&bare).unwrap();
        assert_eq!(value, serde_json::json!({ "confidence": 0.7 }));

        let declared = ValidationRecord {
            confidence: None,
            declared: Some(MatchRecord {
                expected_exercise: "squat".to_string(),
                detected_exercise: ExerciseType::Unknown,
                matched: false,
            }),
        };
        let value = serde_json::to_value(&declared).unwrap();
        assert!(value["confidence"].is_null());
        assert_eq!(value["expected_exercise"], "squat");
        assert_eq!(value["detected_exercise"], "unknown");
        assert_eq!(value["match"], false);

        let back: ValidationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, declared);
    }

    #[test]
    fn test_movement_analysis_is_flat() {
        let result = MovementAnalysisResult {
            exercise_type: ExerciseType::Squat,
            ranges: RangeProfile {
                knee_range: 72.0,
                ..Default::default()
            },
            estimated_reps: 3,
            averages: AngleAverages::default(),
            confidence: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["exercise_type"], "squat");
        assert_eq!(value["knee_range"], 72.0);
        assert!(value.get("confidence").is_none());

        let back: MovementAnalysisResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
