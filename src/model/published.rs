use crate::model::{MarketDecision, Selection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Internal,
    Web,
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Free,
    Premium,
    Internal,
}

/// An immutable record that a specific MarketDecision was released to a
/// channel at a visibility, with locked-in copies of the versions and
/// ticket terms current at publish time (§3, §4.J). Unique on
/// (prediction_id, channel) while `is_official`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedPrediction {
    pub prediction_id: Uuid,
    pub channel: Channel,
    pub visibility: Visibility,

    pub game_id: String,
    pub selection: Selection,

    pub market_snapshot_id: String,
    pub engine_version: String,
    pub model_version: String,
    pub calibration_version: Option<String>,
    pub p_calibrated: f64,
    pub market_key: String,
    pub locked_line: Option<f64>,
    pub locked_american_odds: i32,

    pub is_official: bool,
    pub void_reason: Option<String>,

    pub published_at: DateTime<Utc>,
}

/// Derives a stable prediction_id from (inputs_hash, channel) so that
/// retrying the same logical publish lands on the same unique key as the
/// first attempt instead of minting a fresh one every call — the gate's
/// idempotency (§4.J) depends on this being deterministic, not random.
fn deterministic_prediction_id(inputs_hash: &str, channel: Channel) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(inputs_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{channel:?}").as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

impl PublishedPrediction {
    pub fn from_decision(
        decision: &MarketDecision,
        selection: Selection,
        channel: Channel,
        visibility: Visibility,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            prediction_id: deterministic_prediction_id(&decision.inputs_hash, channel),
            channel,
            visibility,
            game_id: decision.game_id.clone(),
            selection,
            market_snapshot_id: decision.context_hash.clone(),
            engine_version: String::new(),
            model_version: String::new(),
            calibration_version: decision.calibration_version.clone(),
            p_calibrated: decision.model_probability_adjusted,
            market_key: decision.market_type.to_string(),
            locked_line: decision.market_line,
            locked_american_odds: decision.market_american_odds,
            is_official: true,
            void_reason: None,
            published_at,
        }
    }
}
