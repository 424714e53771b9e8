use crate::sport::{MarketType, Sport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only, one per produced MarketDecision (approved or blocked).
/// Writer role has only {insert, find}; retention: 7 years (§3, §4.L).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub event_id: Uuid,
    pub inputs_hash: String,
    pub decision_version: u32,
    pub classification: String,
    pub release_status: String,
    pub edge_points: f64,
    pub model_prob: f64,
    pub trace_id: String,
    pub engine_version: String,
    pub market_type: MarketType,
    pub league: Sport,
    pub logged_at: DateTime<Utc>,
    pub retention_expires_at: DateTime<Utc>,
}

impl AuditLogRecord {
    pub const RETENTION_YEARS: i64 = 7;
}
