//! Pose-based exercise analysis: smoothing, range extraction, exercise
//! classification, repetition counting and quality gating over per-frame
//! keypoint data produced by an external pose detector.

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod gate;
pub mod ranges;
pub mod reps;
pub mod report;
pub mod smoothing;
pub mod types;
pub mod validator;

pub use analyzer::{AnalysisRequest, MovementAnalyzer};
pub use config::ThresholdConfig;
pub use error::{AResult, AnalysisError, ConfigError};
pub use report::{AcceptedAnalysis, GateDecision, GateFailure, MovementAnalysisResult};
pub use types::{ExerciseType, FrameRecord, FrameSeries, Joint};
