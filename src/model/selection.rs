use crate::sport::MarketType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Home,
    Away,
    Over,
    Under,
    Draw,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Over => "over",
            Side::Under => "under",
            Side::Draw => "draw",
        };
        write!(f, "{s}")
    }
}

/// Canonical identifier for one side of a market (§3, §4.C). Attributes
/// beyond `selection_id` are presentation metadata, never part of the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub selection_id: String,
    pub team_display_name: String,
    pub side: Side,
    pub market_line_for_selection: Option<f64>,
    pub market_type: MarketType,
}

/// Sentinel preference/direction values used where no side qualifies.
pub const NO_EDGE: &str = "NO_EDGE";
pub const INVALID: &str = "INVALID";
