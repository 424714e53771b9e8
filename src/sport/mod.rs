//! Sport Config Registry (4.A).
//!
//! Pure lookup by sport key. All numeric thresholds are data, not code
//! branches — one classifier/calibration body dispatches on `SportConfig`.
//! Grounded on the locked constants in the original service's
//! `sport_calibration_config.py` and `sport_sanity_config.py`.

mod registry;

pub use registry::SportConfigRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed enumeration of supported leagues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sport {
    Nba,
    Nfl,
    Nhl,
    Mlb,
    Ncaaf,
    Ncaab,
}

impl Sport {
    pub const ALL: [Sport; 6] = [
        Sport::Nba,
        Sport::Nfl,
        Sport::Nhl,
        Sport::Mlb,
        Sport::Ncaaf,
        Sport::Ncaab,
    ];

    /// The sport key used by upstream odds-provider feeds, matching the
    /// original service's `sport_key` values.
    pub fn sport_key(self) -> &'static str {
        match self {
            Sport::Nba => "basketball_nba",
            Sport::Nfl => "americanfootball_nfl",
            Sport::Nhl => "icehockey_nhl",
            Sport::Mlb => "baseball_mlb",
            Sport::Ncaaf => "americanfootball_ncaaf",
            Sport::Ncaab => "basketball_ncaab",
        }
    }

    pub fn from_sport_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.sport_key() == key)
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sport_key())
    }
}

/// Bettable market shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketType {
    Spread,
    Total,
    Moneyline2Way,
    Moneyline3Way,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketType::Spread => "spread",
            MarketType::Total => "total",
            MarketType::Moneyline2Way => "moneyline_2way",
            MarketType::Moneyline3Way => "moneyline_3way",
        };
        write!(f, "{s}")
    }
}

/// Settlement window for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSettlement {
    FullGame,
    Regulation,
}

impl fmt::Display for MarketSettlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketSettlement::FullGame => "full_game",
            MarketSettlement::Regulation => "regulation",
        };
        write!(f, "{s}")
    }
}

/// Variance bands used by the calibration engine's variance gating step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VarianceBands {
    pub normal_z: f64,
    pub high_z: f64,
    pub extreme_z: f64,
}

/// Elite-override thresholds (4.F): all four must pass together.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EliteOverrideThresholds {
    pub min_probability: f64,
    pub max_z_variance: f64,
    pub min_data_quality: f64,
    pub max_injury_uncertainty: f64,
}

/// League baseline clamp limits (4.F step 4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaselineClampLimits {
    pub max_bias_vs_actual: f64,
    pub max_bias_vs_market: f64,
    pub max_over_rate: f64,
    pub calibration_window_days: i64,
}

/// Sport-specific distribution-sanity rules beyond the generic RCL z-score
/// (spec.md §3: "OT frequency, one-goal-game frequency for NHL, key-number
/// protection for NFL").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSanityRules {
    pub max_ot_frequency: Option<f64>,
    pub max_one_goal_game_frequency: Option<f64>,
    pub key_numbers: Vec<i32>,
    pub key_number_buffer: f64,
}

/// The frozen, per-sport configuration consulted by every downstream stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportConfig {
    pub sport: Sport,

    /// Market-anchor penalty thresholds (points/runs/goals).
    pub soft_deviation: f64,
    pub hard_deviation: f64,

    /// Minimum publish thresholds.
    pub min_publish_probability: f64,
    pub min_ev_vs_vig_pct: f64,
    pub min_model_vegas_diff: f64,

    pub variance_bands: VarianceBands,
    pub elite_override: EliteOverrideThresholds,
    pub baseline_clamp: BaselineClampLimits,

    /// Edge/Lean/Aligned classification thresholds (4.G).
    pub edge_min_prob: f64,
    pub edge_min_ev_pct: f64,
    pub lean_min_prob: f64,
    pub lean_min_ev_pct: f64,
    pub aligned_tol_points: f64,
    pub aligned_tol_prob: f64,

    pub primary_market: MarketType,
    pub compression_factor: f64,
    pub volatility_ceiling: f64,

    pub distribution_sanity: DistributionSanityRules,

    /// Legal (market_type, settlement) pairs for this sport.
    pub supported_markets: Vec<(MarketType, MarketSettlement)>,

    /// Odds staleness thresholds, in hours (integrity_config.py).
    pub max_odds_age_hours: f64,
    pub live_market_max_age_minutes: f64,
    pub line_validity_range: (f64, f64),

    /// Confirmation window for the signal lifecycle: N of last M sims must
    /// agree on side and tier >= LEAN.
    pub confirmation_n: u32,
    pub confirmation_m: u32,
}
