//! Simulation Result Ingest (§4.D). Accepts a SimulationResult proposed by
//! an external simulation worker and enforces the canonical contract before
//! it is ever persisted or fed to the calibration engine.

mod selection_id;

pub use selection_id::{
    generate_market_selections, normalize_line, selection_id, validate_selection_consistency,
};

use crate::error::{EngineError, EngineResult};
use crate::model::SimulationResult;
use crate::store::ContentStore;
use tracing::warn;

/// The fields the external simulator must supply, pre-validation. Mirrors
/// the wire shape in §6 ("canonical contract fields").
#[derive(Debug, Clone)]
pub struct ProposedSimulationResult {
    pub result: SimulationResult,
    pub home_team_key: String,
    pub away_team_key: String,
    pub p_a: f64,
    pub p_b: f64,
    pub p_push: f64,
}

pub struct SimulationIngest<'a> {
    store: &'a ContentStore,
}

impl<'a> SimulationIngest<'a> {
    pub fn new(store: &'a ContentStore) -> Self {
        Self { store }
    }

    /// Validates and, on success, persists the result. Rejects unless every
    /// contract invariant in §4.D holds.
    pub fn ingest(
        &self,
        proposed: ProposedSimulationResult,
        snapshot_home_key: &str,
        snapshot_away_key: &str,
    ) -> EngineResult<SimulationResult> {
        let result = proposed.result;

        if self.store.get_sim_context(&result.context_hash)?.is_none() {
            return Err(EngineError::ContextMismatch {
                expected: result.context_hash.clone(),
                actual: "none".to_string(),
            });
        }

        if result.schema_version.trim().is_empty()
            || result.event_id.trim().is_empty()
            || result.model_preference_selection_id.trim().is_empty()
        {
            return Err(EngineError::MalformedCompetitors(
                "missing canonical contract field".to_string(),
            ));
        }

        // team_key (stable id), not display name, is used for matching.
        if proposed.home_team_key != snapshot_home_key || proposed.away_team_key != snapshot_away_key {
            return Err(EngineError::MalformedCompetitors(format!(
                "team key mismatch: sim=({}, {}) snapshot=({}, {})",
                proposed.home_team_key, proposed.away_team_key, snapshot_home_key, snapshot_away_key
            )));
        }

        let tau = SimulationResult::symmetry_tolerance(result.iterations_run);
        let sum = proposed.p_a + proposed.p_b + proposed.p_push;
        if (sum - 1.0).abs() > tau {
            warn!(sum, tau, "symmetry violation on ingest");
            return Err(EngineError::SymmetryViolation { sum, tolerance: tau });
        }

        self.store.put_sim_result(result.clone())?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfidenceInterval, SimulationContext};
    use crate::sport::{MarketType, Sport};
    use chrono::Utc;
    use std::sync::Arc;

    fn store() -> ContentStore {
        let conn = Arc::new(parking_lot::Mutex::new(crate::store::open(":memory:").unwrap()));
        ContentStore::new(conn)
    }

    fn base_result(context_hash: &str) -> SimulationResult {
        SimulationResult {
            context_hash: context_hash.to_string(),
            market_type: MarketType::Moneyline2Way,
            selection_id: "abc".into(),
            schema_version: "1".into(),
            event_id: "G1".into(),
            home_team_key: "LAL".into(),
            away_team_key: "BOS".into(),
            model_probability: 0.6,
            confidence_interval: ConfidenceInterval {
                lower: 0.55,
                upper: 0.65,
                half_width: 0.05,
                confidence_level: 0.95,
            },
            devigged_market_probability: 0.55,
            raw_edge: 0.05,
            edge_pct: 5.0,
            converged: true,
            iterations_run: 10_000,
            model_fair_line: None,
            model_fair_price: Some(-150),
            model_preference_selection_id: "abc".into(),
            calibration_version: None,
            created_at_utc: Utc::now(),
        }
    }

    #[test]
    fn rejects_unknown_context() {
        let store = store();
        let ingest = SimulationIngest::new(&store);
        let proposed = ProposedSimulationResult {
            result: base_result("missing"),
            home_team_key: "LAL".into(),
            away_team_key: "BOS".into(),
            p_a: 0.6,
            p_b: 0.4,
            p_push: 0.0,
        };
        let err = ingest.ingest(proposed, "LAL", "BOS").unwrap_err();
        assert_eq!(err.reason_code(), "CONTEXT_HASH_MISMATCH");
    }

    #[test]
    fn rejects_symmetry_violation() {
        let store = store();
        let context_hash = store
            .put_sim_context(SimulationContext {
                context_hash: String::new(),
                game_id: "G1".into(),
                sport: Sport::Nba,
                model_version: "m1".into(),
                engine_version: "e1".into(),
                data_feed_version: "d1".into(),
                odds_snapshot_hash: "o1".into(),
                injury_snapshot_hashes: vec![],
                pace_factor: 1.0,
                fatigue_factor: 1.0,
                iteration_count: 10_000,
                seed_base: 1,
                created_at: Utc::now(),
            })
            .unwrap();
        let ingest = SimulationIngest::new(&store);
        let proposed = ProposedSimulationResult {
            result: base_result(&context_hash),
            home_team_key: "LAL".into(),
            away_team_key: "BOS".into(),
            p_a: 0.8,
            p_b: 0.4,
            p_push: 0.0,
        };
        let err = ingest.ingest(proposed, "LAL", "BOS").unwrap_err();
        assert_eq!(err.reason_code(), "SYMMETRY_VIOLATION");
    }
}
