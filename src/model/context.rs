use crate::sport::Sport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable tuple identifying one simulation run's inputs. Identity is
/// `context_hash = SHA-256` over its canonical serialization (§3, §4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationContext {
    pub context_hash: String,
    pub game_id: String,
    pub sport: Sport,
    pub model_version: String,
    pub engine_version: String,
    pub data_feed_version: String,
    pub odds_snapshot_hash: String,
    pub injury_snapshot_hashes: Vec<String>,
    pub pace_factor: f64,
    pub fatigue_factor: f64,
    pub iteration_count: u32,
    pub seed_base: u64,
    pub created_at: DateTime<Utc>,
}

impl SimulationContext {
    /// The canonical field tuple hashed to produce `context_hash`, in the
    /// fixed order the resolver expects — callers must not reorder this
    /// without also changing every persisted context_hash's meaning.
    pub fn canonical_fields(&self) -> Vec<String> {
        vec![
            self.game_id.clone(),
            self.sport.to_string(),
            self.model_version.clone(),
            self.engine_version.clone(),
            self.data_feed_version.clone(),
            self.odds_snapshot_hash.clone(),
            {
                let mut hashes = self.injury_snapshot_hashes.clone();
                hashes.sort();
                hashes.join(",")
            },
            format!("{:.6}", self.pace_factor),
            format!("{:.6}", self.fatigue_factor),
            self.iteration_count.to_string(),
            self.seed_base.to_string(),
        ]
    }
}
