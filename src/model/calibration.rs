use crate::sport::{MarketType, Sport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fitted probability-calibration model for one (sport, market, bucket)
/// segment. Applied segment-by-segment (§3, §4.K).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSegment {
    pub sport: Sport,
    pub market_type: MarketType,
    pub bucket: String,
    /// Isotonic/Platt parameters, stored opaquely here since the fitting
    /// method is a collaborator concern; the engine only applies them.
    pub params: Vec<f64>,
}

/// A versioned set of calibration segments, promoted by an explicit
/// pointer swap recorded in the audit log — never a silent rollout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationVersion {
    pub version: String,
    pub segments: Vec<CalibrationSegment>,
    pub fitted_at: DateTime<Utc>,
    pub promoted_at: Option<DateTime<Utc>>,
}
