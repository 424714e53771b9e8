use crate::sport::{MarketType, Sport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One side's line/price pair for a market, carried in both American and
/// decimal form so downstream consumers never have to re-derive one from
/// the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub line: Option<f64>,
    pub american_odds: i32,
    pub decimal_odds: f64,
}

/// Immutable record of market lines for one (game, bookmaker, timestamp).
/// Identity is `content_hash`; never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub content_hash: String,
    pub game_id: String,
    pub sport: Sport,
    pub captured_at: DateTime<Utc>,
    pub bookmaker_key: String,
    /// market_type -> side_key -> quote, e.g. "spread" -> "home" -> {-5.5, -110, 1.909}
    pub markets: BTreeMap<MarketType, BTreeMap<String, PriceQuote>>,
    pub home_team_key: String,
    pub away_team_key: String,
    pub home_team_name: String,
    pub away_team_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InjuryStatus {
    Probable,
    Questionable,
    Doubtful,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjuryEntry {
    pub player_key: String,
    pub status: InjuryStatus,
    /// 0.0 (no impact) to 1.0 (irreplaceable starter).
    pub impact_factor: f64,
}

/// Immutable per-team injury list, bound by content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjurySnapshot {
    pub content_hash: String,
    pub team_key: String,
    pub sport: Sport,
    pub captured_at: DateTime<Utc>,
    pub entries: Vec<InjuryEntry>,
}

impl InjurySnapshot {
    /// Largest single impact factor among players not merely Probable; used
    /// by the signal lifecycle's ROSTER_CHANGE invalidation threshold.
    pub fn max_relevant_impact(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.status != InjuryStatus::Probable)
            .map(|e| e.impact_factor)
            .fold(0.0, f64::max)
    }
}
