use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actual scores and completion state. Immutable per game (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResult {
    pub game_id: String,
    pub home_score: i32,
    pub away_score: i32,
    pub completed: bool,
    pub final_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Settlement {
    Win,
    Loss,
    Push,
    Void,
}

/// Per-PublishedPrediction settlement record (§3, §4.K). Immutable once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grading {
    pub prediction_id: Uuid,
    pub game_id: String,
    pub settlement: Settlement,
    /// CLV = p_closed - p_taken (probability-space) or the price-based
    /// equivalent; positive is favorable.
    pub clv: f64,
    pub realized_units: f64,
    pub graded_at: DateTime<Utc>,
}
