use crate::sport::{MarketType, Sport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification tier (§3, §4.G). Normalized to five states per the
/// resolved Open Question in SPEC_FULL.md §12.3 — no per-sport variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Edge,
    Lean,
    MarketAligned,
    NoPlay,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    Approved,
    BlockedByIntegrity,
    BlockedByOddsMismatch,
    BlockedByCalibration,
}

/// Result of classification for one (game, market_type) at one context_hash
/// (§3, §4.H). Invariants enforced by the assembler's validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDecision {
    pub game_id: String,
    pub sport: Sport,
    pub market_type: MarketType,
    pub context_hash: String,

    pub model_preference_selection_id: String,
    pub recommended_selection_id: Option<String>,

    pub market_line: Option<f64>,
    pub market_american_odds: i32,

    pub edge_points: f64,
    pub edge_ev_pct: f64,

    pub model_probability_raw: f64,
    pub model_probability_adjusted: f64,

    pub classification: Tier,
    pub release_status: ReleaseStatus,
    pub reasons: Vec<String>,

    pub inputs_hash: String,
    pub decision_version: u32,
    pub calibration_version: Option<String>,
    pub computed_at: DateTime<Utc>,
}

/// Container of the three market decisions for a game, sharing one
/// inputs_hash and one computed_at (§3). Consumers fetch this atomic
/// bundle, never individual markets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDecisions {
    pub game_id: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub spread: Option<MarketDecision>,
    pub moneyline: Option<MarketDecision>,
    pub total: Option<MarketDecision>,
    pub inputs_hash: String,
    pub decision_version: u32,
    pub computed_at: DateTime<Utc>,
}
