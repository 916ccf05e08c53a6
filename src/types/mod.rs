pub mod exercise;

pub use exercise::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AnalysisError;

/// Named skeletal joints reported by the pose detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
}

impl Joint {
    /// Keypoints whose visibility feeds the person-presence gate
    pub const GATE_KEYPOINTS: [Joint; 8] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftElbow,
        Joint::RightElbow,
    ];
}

/// One detected pose in one video frame.
///
/// Produced by the external detector; frames without a detected person are
/// omitted from the series rather than zero-filled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_index: u64,
    pub timestamp: f64,
    /// Joint angles in degrees (elbow, knee, hip)
    #[serde(default)]
    pub angles: BTreeMap<Joint, f64>,
    /// Normalized vertical coordinate in [0, 1], image-down positive
    #[serde(default)]
    pub heights: BTreeMap<Joint, f64>,
    /// Detector visibility confidence in [0, 1]
    #[serde(default)]
    pub visibility: BTreeMap<Joint, f64>,
}

impl FrameRecord {
    pub fn new(frame_index: u64, fps: f64) -> Self {
        let timestamp = if fps > 0.0 {
            frame_index as f64 / fps
        } else {
            0.0
        };
        Self {
            frame_index,
            timestamp,
            angles: BTreeMap::new(),
            heights: BTreeMap::new(),
            visibility: BTreeMap::new(),
        }
    }

    pub fn with_angle(mut self, joint: Joint, degrees: f64) -> Self {
        self.angles.insert(joint, degrees);
        self
    }

    pub fn with_height(mut self, joint: Joint, y: f64) -> Self {
        self.heights.insert(joint, y);
        self
    }

    pub fn with_visibility(mut self, joint: Joint, visibility: f64) -> Self {
        self.visibility.insert(joint, visibility);
        self
    }

    /// Angle for a joint, skipping non-finite detector output
    pub fn angle(&self, joint: Joint) -> Option<f64> {
        self.angles.get(&joint).copied().filter(|v| v.is_finite())
    }

    pub fn height(&self, joint: Joint) -> Option<f64> {
        self.heights.get(&joint).copied().filter(|v| v.is_finite())
    }

    pub fn visibility_of(&self, joint: Joint) -> Option<f64> {
        self.visibility.get(&joint).copied().filter(|v| v.is_finite())
    }
}

/// Ordered pose frames of one recording plus source video metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameSeries {
    pub frames: Vec<FrameRecord>,
    /// Frames attempted by the detector, including those without a pose
    pub source_total_frames: usize,
    pub fps: f64,
    /// Seconds
    #[serde(default)]
    pub duration: f64,
}

impl FrameSeries {
    pub fn new(frames: Vec<FrameRecord>, source_total_frames: usize, fps: f64) -> Self {
        let duration = if fps > 0.0 {
            source_total_frames as f64 / fps
        } else {
            0.0
        };
        Self {
            frames,
            source_total_frames,
            fps,
            duration,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Check the structural invariants the detector promises.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.frames.len() > self.source_total_frames {
            return Err(AnalysisError::InvalidSeries(format!(
                "{} pose frames exceed {} source frames",
                self.frames.len(),
                self.source_total_frames
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(AnalysisError::InvalidSeries(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        let ordered = self
            .frames
            .windows(2)
            .all(|pair| pair[0].frame_index < pair[1].frame_index);
        if !ordered {
            return Err(AnalysisError::InvalidSeries(
                "frame indices must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}
