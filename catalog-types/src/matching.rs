use crate::CategoryId;
use derive_more::Display;
use serde::Serialize;

pub const HIGH_CONFIDENCE: f64 = 0.7;
pub const MEDIUM_CONFIDENCE: f64 = 0.4;
/// Scores under this floor are noise and never returned.
pub const SCORE_FLOOR: f64 = 0.05;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[display("high")]
    High,
    #[display("medium")]
    Medium,
    #[display("low")]
    Low,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE {
            Self::High
        } else if score >= MEDIUM_CONFIDENCE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub category_id: CategoryId,
    pub display_path: String,
    pub score: f64,
    pub confidence: Confidence,
    pub matched_keywords: Vec<String>,
}
