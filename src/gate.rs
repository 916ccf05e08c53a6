//! Two-level quality gate.
//!
//! Level 1 blocks recordings that show no trackable person or no usable
//! motion. Level 2 never blocks; it degrades a multiplicative quality score and
//! collects warnings so downstream feedback can be hedged for a person who is
//! present but imperfectly tracked.

use crate::config::GateThresholds;
use crate::report::{
    AcceptedAnalysis, GateDecision, GateDiagnostics, GateFailure, MotionAmplitude,
    MovementAnalysisResult, RejectionCode, ResponseStatus, ValidationRecord,
};
use crate::types::{FrameSeries, Joint};

const NO_PERSON_MESSAGE: &str = "No person detected in the video";
const NO_PERSON_TIPS: [&str; 3] = [
    "Ensure full body is in frame",
    "Improve lighting",
    "Keep camera steady",
];
const INSUFFICIENT_MOTION_MESSAGE: &str = "Insufficient motion for analysis";
const INSUFFICIENT_MOTION_TIPS: [&str; 2] = [
    "Perform at least one full repetition",
    "Increase movement amplitude",
];

/// Raw detector statistics for one recording
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionStats {
    pub frames_with_pose: usize,
    pub source_total_frames: usize,
    pub fps: f64,
    /// Mean visibility over the gate keypoints of every pose frame
    pub avg_visibility: f64,
    /// Fewest keypoints above the visibility cutoff in any single frame
    pub min_keypoints_per_frame: u32,
}

impl DetectionStats {
    pub fn from_series(series: &FrameSeries, visibility_cutoff: f64) -> Self {
        let mut sum = 0.0;
        let mut samples = 0usize;
        let mut min_keypoints: Option<u32> = None;

        for frame in &series.frames {
            let mut visible = 0u32;
            for joint in Joint::GATE_KEYPOINTS {
                if let Some(v) = frame.visibility_of(joint) {
                    sum += v;
                    samples += 1;
                    if v > visibility_cutoff {
                        visible += 1;
                    }
                }
            }
            min_keypoints = Some(min_keypoints.map_or(visible, |m| m.min(visible)));
        }

        DetectionStats {
            frames_with_pose: series.len(),
            source_total_frames: series.source_total_frames,
            fps: series.fps,
            avg_visibility: if samples > 0 {
                sum / samples as f64
            } else {
                0.0
            },
            min_keypoints_per_frame: min_keypoints.unwrap_or(0),
        }
    }

    pub fn frames_with_pose_ratio(&self) -> f64 {
        if self.source_total_frames == 0 {
            0.0
        } else {
            self.frames_with_pose as f64 / self.source_total_frames as f64
        }
    }
}

pub struct QualityGate {
    thresholds: GateThresholds,
}

impl QualityGate {
    pub fn new(thresholds: GateThresholds) -> Self {
        Self { thresholds }
    }

    /// Motion score floor, relaxed for coarse temporal sampling
    pub fn motion_threshold(&self, fps: f64) -> f64 {
        let t = &self.thresholds;
        if fps < t.low_fps_cutoff {
            (t.motion_score_min - t.low_fps_adjustment).max(0.0)
        } else {
            t.motion_score_min
        }
    }

    pub fn motion_amplitude(&self, analysis: &MovementAnalysisResult) -> (MotionAmplitude, f64) {
        let t = &self.thresholds;
        let r = &analysis.ranges;
        let amplitude = MotionAmplitude {
            elbow: r.elbow_range,
            knee: r.knee_range,
            shoulder_y: r.shoulder_y_range,
            wrist_y: r.wrist_y_range,
        };
        let score = [
            amplitude.elbow / t.angle_motion_scale,
            amplitude.knee / t.angle_motion_scale,
            amplitude.shoulder_y / t.vertical_motion_scale,
            amplitude.wrist_y / t.vertical_motion_scale,
        ]
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
        (amplitude, score)
    }

    pub fn diagnostics(
        &self,
        stats: &DetectionStats,
        analysis: Option<&MovementAnalysisResult>,
    ) -> GateDiagnostics {
        let (motion_amplitude, motion_score) = analysis
            .map(|a| self.motion_amplitude(a))
            .unwrap_or_default();
        GateDiagnostics {
            frames_with_pose_ratio: stats.frames_with_pose_ratio(),
            avg_visibility: stats.avg_visibility,
            min_keypoints_per_frame: stats.min_keypoints_per_frame,
            motion_amplitude,
            motion_score,
            frames_with_pose: stats.frames_with_pose,
            source_total_frames: stats.source_total_frames,
            sample_fps: stats.fps,
        }
    }

    /// Rejection for a recording in which no frame had a pose
    pub fn reject_empty(&self, stats: &DetectionStats) -> GateDecision {
        log::warn!(
            "Rejecting recording: no pose in any of {} frames",
            stats.source_total_frames
        );
        GateDecision::Rejected(Self::failure(
            RejectionCode::NoPerson,
            self.diagnostics(stats, None),
        ))
    }

    pub fn evaluate(
        &self,
        stats: &DetectionStats,
        analysis: MovementAnalysisResult,
    ) -> GateDecision {
        let t = &self.thresholds;
        let diagnostics = self.diagnostics(stats, Some(&analysis));
        let ratio = diagnostics.frames_with_pose_ratio;

        // Level 1: person presence
        let mut absent = Vec::new();
        if ratio < t.person_frames_ratio_min {
            absent.push(format!(
                "pose ratio {:.3} < {:.3}",
                ratio, t.person_frames_ratio_min
            ));
        }
        if diagnostics.avg_visibility < t.person_avg_visibility_min {
            absent.push(format!(
                "avg visibility {:.3} < {:.3}",
                diagnostics.avg_visibility, t.person_avg_visibility_min
            ));
        }
        if diagnostics.min_keypoints_per_frame < t.person_min_keypoints {
            absent.push(format!(
                "min keypoints {} < {}",
                diagnostics.min_keypoints_per_frame, t.person_min_keypoints
            ));
        }
        if !absent.is_empty() {
            log::warn!("Rejecting recording (NO_PERSON): {}", absent.join(", "));
            return GateDecision::Rejected(Self::failure(RejectionCode::NoPerson, diagnostics));
        }

        // Level 1: motion sufficiency
        let motion_min = self.motion_threshold(stats.fps);
        if diagnostics.motion_score < motion_min && analysis.estimated_reps < 1 {
            log::warn!(
                "Rejecting recording (INSUFFICIENT_MOTION): score {:.2} < {:.2} at {:.1} fps",
                diagnostics.motion_score,
                motion_min,
                stats.fps
            );
            return GateDecision::Rejected(Self::failure(
                RejectionCode::InsufficientMotion,
                diagnostics,
            ));
        }

        // Level 2: quality score
        let mut quality_score = 1.0;
        let mut quality_warnings = Vec::new();
        if ratio < t.good_frames_ratio {
            quality_score *= t.frames_ratio_penalty;
            quality_warnings.push(format!(
                "Person detected in only {:.0}% of frames",
                ratio * 100.0
            ));
        }
        if diagnostics.avg_visibility < t.good_avg_visibility {
            quality_score *= t.visibility_penalty;
            quality_warnings.push(format!(
                "Low keypoint visibility (average {:.2})",
                diagnostics.avg_visibility
            ));
        }
        if diagnostics.motion_score < t.good_motion_score {
            quality_score *= t.motion_penalty;
            quality_warnings.push(format!(
                "Limited range of motion (motion score {:.2})",
                diagnostics.motion_score
            ));
        }

        log::info!(
            "Accepted {} with {} reps, quality {:.2}",
            analysis.exercise_type,
            analysis.estimated_reps,
            quality_score
        );

        let validation = ValidationRecord {
            confidence: analysis.confidence,
            declared: None,
        };
        GateDecision::Accepted(AcceptedAnalysis {
            status: ResponseStatus::Success,
            movement_analysis: analysis,
            diagnostics,
            quality_score,
            quality_warnings,
            validation,
        })
    }

    fn failure(code: RejectionCode, diagnostics: GateDiagnostics) -> GateFailure {
        let (message, tips): (&str, &[&str]) = match code {
            RejectionCode::NoPerson => (NO_PERSON_MESSAGE, &NO_PERSON_TIPS[..]),
            RejectionCode::InsufficientMotion => {
                (INSUFFICIENT_MOTION_MESSAGE, &INSUFFICIENT_MOTION_TIPS[..])
            }
        };
        GateFailure {
            status: ResponseStatus::Error,
            code,
            message: message.to_string(),
            tips: tips.iter().map(|t| t.to_string()).collect(),
            diagnostics,
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(GateThresholds::default())
    }
}
