//! Sentence difficulty classification.
//!
//! Labels come back from the prediction service as free strings. They are
//! stored verbatim on each segment; [`CefrLevel`] is only used to derive the
//! aggregate level of a whole video.

mod http;

pub use http::{HttpDifficultyClassifier, PredictRequest, Prediction};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for difficulty classifiers.
#[async_trait]
pub trait DifficultyClassifier: Send + Sync {
    /// Return one label per input text, in input order.
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>>;
}

/// Common European Framework of Reference proficiency band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl std::str::FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            _ => Err(format!("Unknown CEFR level: {}", s)),
        }
    }
}

impl std::fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        };
        write!(f, "{}", s)
    }
}

/// Lower median of the recognised labels. Unknown labels are ignored.
pub fn aggregate_level<S: AsRef<str>>(labels: &[S]) -> Option<CefrLevel> {
    let mut levels: Vec<CefrLevel> = labels
        .iter()
        .filter_map(|l| l.as_ref().parse().ok())
        .collect();

    if levels.is_empty() {
        return None;
    }

    levels.sort();
    Some(levels[(levels.len() - 1) / 2])
}
