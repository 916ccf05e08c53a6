//! End-to-end movement analysis pipeline.
//!
//! frames -> smoothing -> ranges -> classifier -> rep counter -> quality gate
//! -> exercise-match validation. One call is one sequential pass over one
//! recording; the only shared state is the immutable [`ThresholdConfig`], so an
//! analyzer can be used from many threads at once.

use crossbeam::channel;
use std::sync::Arc;

use crate::classifier::ExerciseClassifier;
use crate::config::ThresholdConfig;
use crate::error::{AResult, AnalysisError};
use crate::gate::{DetectionStats, QualityGate};
use crate::ranges::{AngleAverages, SmoothedChannels};
use crate::report::{GateDecision, MovementAnalysisResult};
use crate::reps::RepCounter;
use crate::smoothing::MovingAverage;
use crate::types::FrameSeries;
use crate::validator::{normalize_exercise_label, ExerciseMatchValidator};

/// Caller-side options for one analysis
#[derive(Clone, Debug, Default)]
pub struct AnalysisRequest {
    /// Exercise the user says they performed (any alias spelling)
    pub expected_exercise: Option<String>,
    /// Fail on a confident mismatch instead of annotating it
    pub strict: bool,
}

impl AnalysisRequest {
    pub fn expecting(exercise: &str, strict: bool) -> Self {
        Self {
            expected_exercise: Some(exercise.to_string()),
            strict,
        }
    }
}

pub struct MovementAnalyzer {
    config: Arc<ThresholdConfig>,
    smoother: MovingAverage,
    classifier: ExerciseClassifier,
    rep_counter: RepCounter,
    gate: QualityGate,
    validator: ExerciseMatchValidator,
}

impl MovementAnalyzer {
    pub fn new(config: Arc<ThresholdConfig>) -> Self {
        Self {
            smoother: MovingAverage::new(config.smoothing.window),
            classifier: ExerciseClassifier::new(config.classifier.clone()),
            rep_counter: RepCounter::new(config.reps.clone()),
            gate: QualityGate::new(config.gate.clone()),
            validator: ExerciseMatchValidator::new(config.validator.clone()),
            config,
        }
    }

    /// Classify and count reps without gating
    pub fn analyze_movement(&self, series: &FrameSeries) -> MovementAnalysisResult {
        let channels = SmoothedChannels::from_series(series, &self.smoother);
        let ranges = channels.ranges();
        let classification = self.classifier.classify(&ranges);
        let estimated_reps = self
            .rep_counter
            .count(classification.exercise_type, &channels, &ranges);

        MovementAnalysisResult {
            exercise_type: classification.exercise_type,
            ranges,
            estimated_reps,
            averages: AngleAverages::from_series(series),
            confidence: classification.confidence,
        }
    }

    /// Full analysis of one recording.
    ///
    /// Gate rejections are returned as `Ok(GateDecision::Rejected)`; `Err` is
    /// reserved for malformed input and strict exercise mismatches.
    pub fn evaluate(
        &self,
        series: &FrameSeries,
        request: &AnalysisRequest,
    ) -> AResult<GateDecision> {
        let stats =
            DetectionStats::from_series(series, self.config.gate.keypoint_visibility_cutoff);
        if series.is_empty() {
            return Ok(self.gate.reject_empty(&stats));
        }
        series.validate()?;

        log::debug!(
            "Analyzing {} pose frames of {} at {:.1} fps",
            series.len(),
            series.source_total_frames,
            series.fps
        );

        let analysis = self.analyze_movement(series);
        let mut decision = self.gate.evaluate(&stats, analysis);

        if let GateDecision::Accepted(accepted) = &mut decision {
            let expected = request
                .expected_exercise
                .as_deref()
                .and_then(normalize_exercise_label);
            if let Some(expected) = expected {
                let record = self.validator.validate(
                    &expected,
                    accepted.movement_analysis.exercise_type,
                    accepted.movement_analysis.confidence,
                    request.strict,
                )?;
                accepted.validation.declared = Some(record);
            }
        }

        Ok(decision)
    }

    /// Evaluate several recordings on a pool of worker threads.
    /// Results come back in input order.
    pub fn evaluate_batch(
        &self,
        recordings: &[FrameSeries],
        request: &AnalysisRequest,
        workers: usize,
    ) -> Vec<AResult<GateDecision>> {
        let workers = workers.clamp(1, recordings.len().max(1));
        let (job_tx, job_rx) = channel::unbounded::<usize>();
        let (result_tx, result_rx) = channel::unbounded();

        for idx in 0..recordings.len() {
            let _ = job_tx.send(idx);
        }
        drop(job_tx);

        let scoped = crossbeam::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    for idx in job_rx.iter() {
                        let outcome = self.evaluate(&recordings[idx], request);
                        if result_tx.send((idx, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        if scoped.is_err() {
            log::error!("A batch analysis worker panicked; its recordings are dropped");
        }

        let mut slots: Vec<Option<AResult<GateDecision>>> =
            (0..recordings.len()).map(|_| None).collect();
        for (idx, outcome) in result_rx.try_iter() {
            slots[idx] = Some(outcome);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    Err(AnalysisError::WorkerFailed(format!(
                        "recording {} was not analyzed",
                        idx
                    )))
                })
            })
            .collect()
    }
}

impl Default for MovementAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(ThresholdConfig::default()))
    }
}
