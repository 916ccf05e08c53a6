//! Repetition counting.
//!
//! Every exercise with a dedicated profile runs the same two-state hysteresis
//! machine over one smoothed drive channel. A rep is only counted after the
//! signal crosses the low band and then the high band, so noise around a single
//! threshold cannot double-count. Bands are derived from each recording's own
//! distribution because camera distance and body proportions vary.

use serde::{Deserialize, Serialize};

use crate::config::RepThresholds;
use crate::ranges::{min_max, Channel, RangeProfile, SmoothedChannels};
use crate::types::ExerciseType;

/// How the low/high bands are placed inside the drive channel
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BandRule {
    /// `min + fraction * amplitude`
    Fraction { low: f64, high: f64 },
    /// Percentiles (0-100) of the smoothed samples
    Percentile { low: f64, high: f64 },
}

impl BandRule {
    pub fn bands(&self, samples: &[f64]) -> (f64, f64) {
        match *self {
            BandRule::Fraction { low, high } => {
                let (min, max) = min_max(samples);
                let amplitude = max - min;
                (min + low * amplitude, min + high * amplitude)
            }
            BandRule::Percentile { low, high } => {
                (percentile(samples, low), percentile(samples, high))
            }
        }
    }
}

/// Drive channel, band placement and minimum amplitude for one exercise
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RepProfile {
    pub drive: Channel,
    pub bands: BandRule,
    pub min_amplitude: f64,
}

impl RepProfile {
    /// `None` for coarse categories, which use the range heuristic instead
    pub fn for_exercise(exercise: ExerciseType, t: &RepThresholds) -> Option<Self> {
        let profile = match exercise {
            // Image y grows downward: the low band is the top of the pull
            ExerciseType::Pullup => RepProfile {
                drive: Channel::ShoulderHeight,
                bands: BandRule::Fraction {
                    low: t.pullup_low_fraction,
                    high: t.pullup_high_fraction,
                },
                min_amplitude: t.pullup_min_amplitude,
            },
            ExerciseType::Squat => RepProfile {
                drive: Channel::KneeAngle,
                bands: BandRule::Percentile {
                    low: t.squat_low_percentile,
                    high: t.squat_high_percentile,
                },
                min_amplitude: t.squat_min_amplitude,
            },
            ExerciseType::Deadlift => RepProfile {
                drive: Channel::HipAngle,
                bands: BandRule::Percentile {
                    low: t.deadlift_low_percentile,
                    high: t.deadlift_high_percentile,
                },
                min_amplitude: t.deadlift_min_amplitude,
            },
            ExerciseType::Pushup => RepProfile {
                drive: Channel::ElbowAngle,
                bands: BandRule::Percentile {
                    low: t.pushup_low_percentile,
                    high: t.pushup_high_percentile,
                },
                min_amplitude: t.pushup_min_amplitude,
            },
            _ => return None,
        };
        Some(profile)
    }

    /// Count full cycles in an already smoothed drive series
    pub fn count(&self, samples: &[f64]) -> u32 {
        if samples.is_empty() {
            return 0;
        }
        let (min, max) = min_max(samples);
        if max - min < self.min_amplitude {
            return 0;
        }
        let (low, high) = self.bands.bands(samples);
        let mut counter = HysteresisCounter::new(low, high);
        for &v in samples {
            counter.update(v);
        }
        counter.count()
    }
}

/// Phase of the hysteresis machine.
/// `Rest` is hanging/extended/lockout, `Engaged` is the top of a pull or the
/// bottom of a squat, hinge or press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Rest,
    Engaged,
}

pub struct HysteresisCounter {
    low: f64,
    high: f64,
    phase: Phase,
    count: u32,
}

impl HysteresisCounter {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            phase: Phase::Rest,
            count: 0,
        }
    }

    /// Feed one sample, returns true when it completes a rep
    pub fn update(&mut self, value: f64) -> bool {
        match self.phase {
            Phase::Rest if value <= self.low => {
                self.phase = Phase::Engaged;
                false
            }
            Phase::Engaged if value >= self.high => {
                self.phase = Phase::Rest;
                self.count += 1;
                true
            }
            _ => false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(samples: &[f64], pct: f64) -> f64 {
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

pub struct RepCounter {
    thresholds: RepThresholds,
}

impl RepCounter {
    pub fn new(thresholds: RepThresholds) -> Self {
        Self { thresholds }
    }

    pub fn count(
        &self,
        exercise: ExerciseType,
        channels: &SmoothedChannels,
        ranges: &RangeProfile,
    ) -> u32 {
        let reps = match RepProfile::for_exercise(exercise, &self.thresholds) {
            Some(profile) => profile.count(channels.get(profile.drive)),
            None => self.estimate_from_ranges(ranges),
        };
        let capped = reps.min(self.thresholds.max_reps);
        log::debug!("Counted {} reps for {} (raw {})", capped, exercise, reps);
        capped
    }

    /// Coarse categories: one rep per fixed slice of the widest angle range
    fn estimate_from_ranges(&self, ranges: &RangeProfile) -> u32 {
        let widest = ranges
            .elbow_range
            .max(ranges.knee_range)
            .max(ranges.hip_range);
        let estimate = (widest / self.thresholds.fallback_degrees_per_rep).floor();
        if estimate.is_finite() && estimate > 0.0 {
            estimate.min(u32::MAX as f64) as u32
        } else {
            0
        }
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(RepThresholds::default())
    }
}
