//! Channel extraction and range analysis.
//!
//! A channel is one scalar per pose frame (e.g. average knee angle). Channels
//! are smoothed once per recording and shared by the range analyzer and the
//! repetition counter.

use serde::{Deserialize, Serialize};

use crate::smoothing::MovingAverage;
use crate::types::{FrameRecord, FrameSeries, Joint};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    ElbowAngle,
    KneeAngle,
    HipAngle,
    WristHeight,
    ShoulderHeight,
}

#[derive(Clone, Copy)]
enum Measure {
    Angle,
    Height,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::ElbowAngle,
        Channel::KneeAngle,
        Channel::HipAngle,
        Channel::WristHeight,
        Channel::ShoulderHeight,
    ];

    fn joints(&self) -> (Joint, Joint) {
        match self {
            Channel::ElbowAngle => (Joint::LeftElbow, Joint::RightElbow),
            Channel::KneeAngle => (Joint::LeftKnee, Joint::RightKnee),
            Channel::HipAngle => (Joint::LeftHip, Joint::RightHip),
            Channel::WristHeight => (Joint::LeftWrist, Joint::RightWrist),
            Channel::ShoulderHeight => (Joint::LeftShoulder, Joint::RightShoulder),
        }
    }

    fn measure(&self) -> Measure {
        match self {
            Channel::WristHeight | Channel::ShoulderHeight => Measure::Height,
            _ => Measure::Angle,
        }
    }

    fn index(&self) -> usize {
        match self {
            Channel::ElbowAngle => 0,
            Channel::KneeAngle => 1,
            Channel::HipAngle => 2,
            Channel::WristHeight => 3,
            Channel::ShoulderHeight => 4,
        }
    }
}

fn read(frame: &FrameRecord, joint: Joint, measure: Measure) -> Option<f64> {
    match measure {
        Measure::Angle => frame.angle(joint),
        Measure::Height => frame.height(joint),
    }
}

/// Left/right average per frame, or the single side that is present
fn averaged(series: &FrameSeries, channel: Channel) -> Vec<Option<f64>> {
    let (left, right) = channel.joints();
    let measure = channel.measure();
    series
        .frames
        .iter()
        .map(|f| match (read(f, left, measure), read(f, right, measure)) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        })
        .collect()
}

fn one_side(series: &FrameSeries, joint: Joint, measure: Measure) -> Vec<Option<f64>> {
    series
        .frames
        .iter()
        .map(|f| read(f, joint, measure))
        .collect()
}

/// Carry the last present value across gaps; leading gaps take the first
/// present value. Returns an empty series when nothing is present.
pub fn fill_gaps(samples: &[Option<f64>]) -> Vec<f64> {
    let first = match samples.iter().flatten().next() {
        Some(v) => *v,
        None => return Vec::new(),
    };
    let mut last = first;
    samples
        .iter()
        .map(|s| {
            if let Some(v) = s {
                last = *v;
            }
            last
        })
        .collect()
}

/// max - min, 0.0 for an empty series
pub fn range_of(samples: &[f64]) -> f64 {
    let (min, max) = min_max(samples);
    if samples.is_empty() {
        0.0
    } else {
        (max - min).max(0.0)
    }
}

pub fn min_max(samples: &[f64]) -> (f64, f64) {
    samples
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn mean(samples: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = samples.iter().flatten().copied().collect();
    if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    }
}

/// Smoothed channel series for one recording
#[derive(Clone, Debug)]
pub struct SmoothedChannels {
    channels: [Vec<f64>; 5],
    elbow_left: Vec<f64>,
    elbow_right: Vec<f64>,
}

impl SmoothedChannels {
    pub fn from_series(series: &FrameSeries, smoother: &MovingAverage) -> Self {
        let channels = Channel::ALL.map(|c| smoother.apply(&fill_gaps(&averaged(series, c))));
        let elbow_left =
            smoother.apply(&fill_gaps(&one_side(series, Joint::LeftElbow, Measure::Angle)));
        let elbow_right =
            smoother.apply(&fill_gaps(&one_side(series, Joint::RightElbow, Measure::Angle)));
        Self {
            channels,
            elbow_left,
            elbow_right,
        }
    }

    /// Smoothed samples, empty when the channel is absent from every frame
    pub fn get(&self, channel: Channel) -> &[f64] {
        &self.channels[channel.index()]
    }

    /// Elbow range over the union of both sides, falling back to the
    /// averaged channel
    fn elbow_range(&self) -> f64 {
        let union: Vec<f64> = self
            .elbow_left
            .iter()
            .chain(self.elbow_right.iter())
            .copied()
            .collect();
        range_of(&union).max(range_of(self.get(Channel::ElbowAngle)))
    }

    pub fn ranges(&self) -> RangeProfile {
        RangeProfile {
            elbow_range: self.elbow_range(),
            knee_range: range_of(self.get(Channel::KneeAngle)),
            hip_range: range_of(self.get(Channel::HipAngle)),
            wrist_y_range: range_of(self.get(Channel::WristHeight)),
            shoulder_y_range: range_of(self.get(Channel::ShoulderHeight)),
        }
    }
}

/// Per-channel amplitude of one recording
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeProfile {
    /// Degrees
    pub elbow_range: f64,
    pub knee_range: f64,
    pub hip_range: f64,
    /// Normalized image units
    pub wrist_y_range: f64,
    pub shoulder_y_range: f64,
}

impl RangeProfile {
    /// Larger of the two vertical-position ranges
    pub fn vertical_range(&self) -> f64 {
        self.wrist_y_range.max(self.shoulder_y_range)
    }
}

/// Mean of each raw per-side joint angle (degrees, 0.0 if absent)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleAverages {
    pub avg_left_elbow_angle: f64,
    pub avg_right_elbow_angle: f64,
    pub avg_left_knee_angle: f64,
    pub avg_right_knee_angle: f64,
    pub avg_left_hip_angle: f64,
    pub avg_right_hip_angle: f64,
}

impl AngleAverages {
    pub fn from_series(series: &FrameSeries) -> Self {
        let avg = |joint| mean(&one_side(series, joint, Measure::Angle));
        AngleAverages {
            avg_left_elbow_angle: avg(Joint::LeftElbow),
            avg_right_elbow_angle: avg(Joint::RightElbow),
            avg_left_knee_angle: avg(Joint::LeftKnee),
            avg_right_knee_angle: avg(Joint::RightKnee),
            avg_left_hip_angle: avg(Joint::LeftHip),
            avg_right_hip_angle: avg(Joint::RightHip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series_with(frames: Vec<FrameRecord>) -> FrameSeries {
        let n = frames.len();
        FrameSeries::new(frames, n, 30.0)
    }

    #[test]
    fn test_fill_gaps() {
        let filled = fill_gaps(&[None, Some(2.0), None, Some(5.0), None]);
        assert_eq!(filled, vec![2.0, 2.0, 2.0, 5.0, 5.0]);
        assert!(fill_gaps(&[None, None]).is_empty());
    }

    #[test]
    fn test_absent_channel_has_zero_range() {
        let frames = (0..10)
            .map(|i| FrameRecord::new(i, 30.0).with_angle(Joint::LeftKnee, 90.0 + i as f64))
            .collect();
        let series = series_with(frames);
        let channels = SmoothedChannels::from_series(&series, &MovingAverage::new(1));
        let ranges = channels.ranges();
        assert_eq!(ranges.hip_range, 0.0);
        assert_eq!(ranges.wrist_y_range, 0.0);
        assert!(!ranges.knee_range.is_nan());
        assert_relative_eq!(ranges.knee_range, 9.0);
    }

    #[test]
    fn test_empty_series_ranges() {
        let series = series_with(Vec::new());
        let ranges = SmoothedChannels::from_series(&series, &MovingAverage::default()).ranges();
        assert_eq!(ranges, RangeProfile::default());
    }

    #[test]
    fn test_left_right_averaged() {
        let frames = vec![
            FrameRecord::new(0, 30.0)
                .with_height(Joint::LeftWrist, 0.2)
                .with_height(Joint::RightWrist, 0.4),
            FrameRecord::new(1, 30.0).with_height(Joint::RightWrist, 0.5),
        ];
        let series = series_with(frames);
        let channels = SmoothedChannels::from_series(&series, &MovingAverage::new(1));
        let wrist = channels.get(Channel::WristHeight);
        assert_relative_eq!(wrist[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(wrist[1], 0.5);
    }

    #[test]
    fn test_elbow_range_considers_sides_separately() {
        // Sides move in opposition: the average is flat but each side swings 40 degrees
        let frames = (0..6)
            .map(|i| {
                let swing = if i % 2 == 0 { 20.0 } else { -20.0 };
                FrameRecord::new(i, 30.0)
                    .with_angle(Joint::LeftElbow, 120.0 + swing)
                    .with_angle(Joint::RightElbow, 120.0 - swing)
            })
            .collect();
        let series = series_with(frames);
        let channels = SmoothedChannels::from_series(&series, &MovingAverage::new(1));
        assert_relative_eq!(range_of(channels.get(Channel::ElbowAngle)), 0.0);
        assert_relative_eq!(channels.ranges().elbow_range, 40.0);
    }

    #[test]
    fn test_angle_averages() {
        let frames = vec![
            FrameRecord::new(0, 30.0).with_angle(Joint::LeftKnee, 100.0),
            FrameRecord::new(1, 30.0).with_angle(Joint::LeftKnee, 140.0),
        ];
        let averages = AngleAverages::from_series(&series_with(frames));
        assert_relative_eq!(averages.avg_left_knee_angle, 120.0);
        assert_eq!(averages.avg_right_knee_angle, 0.0);
    }

    #[test]
    fn test_vertical_range_takes_max() {
        let profile = RangeProfile {
            wrist_y_range: 0.02,
            shoulder_y_range: 0.07,
            ..Default::default()
        };
        assert_relative_eq!(profile.vertical_range(), 0.07, epsilon = 1e-12);
    }
}
