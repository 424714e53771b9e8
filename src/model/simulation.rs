use crate::sport::MarketType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub half_width: f64,
    pub confidence_level: f64,
}

/// One per (context_hash, market_type, selection). Immutable once written
/// (§3, §4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub context_hash: String,
    pub market_type: MarketType,
    pub selection_id: String,

    pub schema_version: String,
    pub event_id: String,
    pub home_team_key: String,
    pub away_team_key: String,

    pub model_probability: f64,
    pub confidence_interval: ConfidenceInterval,
    pub devigged_market_probability: f64,
    pub raw_edge: f64,
    pub edge_pct: f64,

    /// true when the simulation's internal Monte Carlo error metric settled
    /// below its configured threshold before `iterations_run` was reached.
    pub converged: bool,
    pub iterations_run: u32,

    /// Model fair line for spread/total, fair American price for moneyline.
    pub model_fair_line: Option<f64>,
    pub model_fair_price: Option<i32>,

    pub model_preference_selection_id: String,

    pub calibration_version: Option<String>,
    pub created_at_utc: DateTime<Utc>,
}

impl SimulationResult {
    /// §4.D / §8 symmetry tolerance: `tau = max(0.0015, 2/sqrt(n))`.
    pub fn symmetry_tolerance(n: u32) -> f64 {
        let n = n.max(1) as f64;
        (2.0 / n.sqrt()).max(0.0015)
    }
}
