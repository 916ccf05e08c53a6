use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use movement_analyzer_rs::{
    AResult, AnalysisError, AnalysisRequest, FrameSeries, GateDecision, MovementAnalyzer,
    ThresholdConfig,
};

#[derive(Parser, Debug)]
#[command(name = "movement_analyzer")]
#[command(about = "Classify exercises and count reps from pose keypoint series", long_about = None)]
struct Args {
    /// Frame series to analyze (*.json or *.json.gz)
    #[arg(long, conflicts_with = "batch_dir")]
    series: Option<PathBuf>,

    /// Directory of frame series to analyze concurrently
    #[arg(long)]
    batch_dir: Option<PathBuf>,

    /// JSON threshold file (MOVEMENT_* environment variables still apply)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Threshold override, e.g. --set motion_score_min=0.8 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Exercise the user says they performed
    #[arg(long)]
    expected: Option<String>,

    /// Fail on a confident exercise mismatch
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Worker threads for --batch-dir
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ThresholdConfig::load(args.config.as_deref())
        .context("Failed to load threshold configuration")?;
    for assignment in &args.overrides {
        config
            .apply_assignment(assignment)
            .with_context(|| format!("Invalid --set '{}'", assignment))?;
    }
    config.validate()?;

    let analyzer = MovementAnalyzer::new(Arc::new(config));
    let request = AnalysisRequest {
        expected_exercise: args.expected.clone(),
        strict: args.strict,
    };

    let report = match (&args.series, &args.batch_dir) {
        (Some(path), _) => {
            let series = load_series(path)?;
            log::info!(
                "Loaded {} ({} pose frames of {})",
                path.display(),
                series.len(),
                series.source_total_frames
            );
            render(path, analyzer.evaluate(&series, &request))
        }
        (None, Some(dir)) => {
            let paths = collect_series(dir)?;
            if paths.is_empty() {
                bail!("No *.json or *.json.gz series found in {}", dir.display());
            }
            let recordings = paths
                .iter()
                .map(|p| load_series(p))
                .collect::<Result<Vec<_>>>()?;
            log::info!(
                "Analyzing {} recordings with {} workers",
                recordings.len(),
                args.workers
            );
            let results = analyzer.evaluate_batch(&recordings, &request, args.workers);
            let entries: Vec<Value> = paths
                .iter()
                .zip(results)
                .map(|(path, outcome)| render(path, outcome))
                .collect();
            let accepted = entries
                .iter()
                .filter(|e| e["decision"]["status"] == "success")
                .count();
            json!({
                "analyzed_at": Utc::now().to_rfc3339(),
                "total": entries.len(),
                "accepted": accepted,
                "results": entries,
            })
        }
        (None, None) => bail!("Provide --series <file> or --batch-dir <dir>"),
    };

    let text = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn load_series(path: &Path) -> Result<FrameSeries> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let series = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
    } else {
        serde_json::from_reader(BufReader::new(file))
    };
    series.with_context(|| format!("Failed to parse {}", path.display()))
}

fn collect_series(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".json") || n.ends_with(".json.gz"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Report entry for one recording.
/// Gate decisions are embedded unchanged; analysis errors get a structured
/// entry with a distinct code.
fn render(path: &Path, outcome: AResult<GateDecision>) -> Value {
    let mut entry = json!({
        "source": path.display().to_string(),
        "analyzed_at": Utc::now().to_rfc3339(),
    });
    let (key, body) = match outcome {
        Ok(decision) => match serde_json::to_value(&decision) {
            Ok(value) => ("decision", value),
            Err(e) => (
                "error",
                json!({ "status": "error", "code": "SERIALIZATION", "message": e.to_string() }),
            ),
        },
        Err(err) => {
            log::warn!("{}: {}", path.display(), err);
            ("error", error_entry(&err))
        }
    };
    if let Some(object) = entry.as_object_mut() {
        object.insert(key.to_string(), body);
    }
    entry
}

fn error_entry(err: &AnalysisError) -> Value {
    let code = match err {
        AnalysisError::EmptySeries => "EMPTY_SERIES",
        AnalysisError::NoPersonDetected(_) => "NO_PERSON",
        AnalysisError::InsufficientMotion(_) => "INSUFFICIENT_MOTION",
        AnalysisError::ExerciseMismatch { .. } => "EXERCISE_MISMATCH",
        AnalysisError::InvalidSeries(_) => "INVALID_SERIES",
        AnalysisError::WorkerFailed(_) => "WORKER_FAILED",
    };
    let mut value = json!({ "status": "error", "code": code, "message": err.to_string() });
    if let AnalysisError::ExerciseMismatch {
        expected,
        detected,
        confidence,
    } = err
    {
        if let Some(object) = value.as_object_mut() {
            object.insert("expected".to_string(), json!(expected));
            object.insert("detected".to_string(), json!(detected));
            object.insert("confidence".to_string(), json!(confidence));
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use movement_analyzer_rs::{ExerciseType, FrameRecord, Joint};

    fn keys(value: &Value) -> Vec<String> {
        let mut keys: Vec<String> = value
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    #[test]
    fn test_rejection_shape_preserved() {
        let analyzer = MovementAnalyzer::default();
        let empty = FrameSeries::new(Vec::new(), 120, 30.0);
        let entry = render(
            Path::new("empty.json"),
            analyzer.evaluate(&empty, &AnalysisRequest::default()),
        );
        assert_eq!(keys(&entry), vec!["analyzed_at", "decision", "source"]);
        assert_eq!(
            keys(&entry["decision"]),
            vec!["code", "diagnostics", "message", "status", "tips"]
        );
        assert_eq!(entry["decision"]["code"], "NO_PERSON");
        assert_eq!(entry["source"], "empty.json");
    }

    #[test]
    fn test_mismatch_has_own_code() {
        let err = AnalysisError::ExerciseMismatch {
            expected: "squat".to_string(),
            detected: ExerciseType::Pullup,
            confidence: 0.9,
        };
        let entry = render(Path::new("pullup.json"), Err(err));
        assert_eq!(keys(&entry), vec!["analyzed_at", "error", "source"]);
        let error = &entry["error"];
        assert_eq!(error["code"], "EXERCISE_MISMATCH");
        assert_eq!(error["expected"], "squat");
        assert_eq!(error["detected"], "pullup");
        assert_eq!(error["confidence"], 0.9);
    }

    #[test]
    fn test_invalid_series_code() {
        let analyzer = MovementAnalyzer::default();
        let frames = vec![FrameRecord::new(0, 30.0).with_angle(Joint::LeftKnee, 120.0)];
        let series = FrameSeries::new(frames, 1, 0.0);
        let entry = render(
            Path::new("bad.json"),
            analyzer.evaluate(&series, &AnalysisRequest::default()),
        );
        assert_eq!(entry["error"]["code"], "INVALID_SERIES");
    }
}
