//! Exercise categories produced by the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Pullup,
    Squat,
    Deadlift,
    Pushup,
    UpperBody,
    LowerBody,
    FullBody,
    Unknown,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 8] = [
        ExerciseType::Pullup,
        ExerciseType::Squat,
        ExerciseType::Deadlift,
        ExerciseType::Pushup,
        ExerciseType::UpperBody,
        ExerciseType::LowerBody,
        ExerciseType::FullBody,
        ExerciseType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Pullup => "pullup",
            ExerciseType::Squat => "squat",
            ExerciseType::Deadlift => "deadlift",
            ExerciseType::Pushup => "pushup",
            ExerciseType::UpperBody => "upper_body",
            ExerciseType::LowerBody => "lower_body",
            ExerciseType::FullBody => "full_body",
            ExerciseType::Unknown => "unknown",
        }
    }

    /// Named exercises with a dedicated rep-counting profile
    pub fn is_specific(&self) -> bool {
        matches!(
            self,
            ExerciseType::Pullup
                | ExerciseType::Squat
                | ExerciseType::Deadlift
                | ExerciseType::Pushup
        )
    }

    /// `unknown` is a valid terminal classification, not a failure
    pub fn is_indeterminate(&self) -> bool {
        *self == ExerciseType::Unknown
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExerciseType::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unrecognized exercise type '{}'", s))
    }
}
