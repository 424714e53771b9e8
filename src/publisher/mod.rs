//! Publishing Gate (§4.J). Publishes exactly-once per (prediction_id,
//! channel); the market's visibility contract (EDGE/LEAN/NO_PLAY/BLOCKED ->
//! broadcast_allowed/parlay_allowed) lives here too, since it is the single
//! place that turns a classification into an external-facing guarantee
//! (§6 "market_state_registry").
//!
//! Grounded on the teacher's `signals/quality.rs` gate-then-emit shape and
//! `vault`'s idempotent-ledger-write pattern (insert, return existing on
//! conflict rather than erroring).

use crate::model::{Channel, MarketDecision, PublishedPrediction, Selection, Tier, Visibility};
use crate::store::DecisionStore;
use crate::error::EngineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authoritative per-tier visibility contract (§6
/// `market_state_registry`): CLV/volatility/efficiency heuristics never
/// enter this table, only the classifier's tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierVisibility {
    pub tier: Tier,
    pub broadcast_allowed: bool,
    pub parlay_allowed: bool,
}

pub fn tier_visibility(tier: Tier) -> TierVisibility {
    match tier {
        Tier::Edge => TierVisibility { tier, broadcast_allowed: true, parlay_allowed: true },
        Tier::Lean => TierVisibility { tier, broadcast_allowed: false, parlay_allowed: true },
        Tier::MarketAligned | Tier::NoPlay | Tier::Blocked => {
            TierVisibility { tier, broadcast_allowed: false, parlay_allowed: false }
        }
    }
}

pub const MARKET_STATE_REGISTRY: [Tier; 5] = [
    Tier::Edge,
    Tier::Lean,
    Tier::MarketAligned,
    Tier::NoPlay,
    Tier::Blocked,
];

/// Whether a decision is even eligible to reach the gate at all: only
/// APPROVED MarketDecisions classified EDGE/LEAN ever get a recommended
/// selection, and only those may be published.
fn publishable(decision: &MarketDecision) -> bool {
    decision.release_status == crate::model::ReleaseStatus::Approved
        && matches!(decision.classification, Tier::Edge | Tier::Lean)
        && decision.recommended_selection_id.is_some()
}

pub struct PublishingGate<'a> {
    store: &'a DecisionStore,
}

impl<'a> PublishingGate<'a> {
    pub fn new(store: &'a DecisionStore) -> Self {
        Self { store }
    }

    /// Publishes `decision` to `channel` at `visibility`, locking in the
    /// version/ticket-terms fields current at this instant (§4.J).
    /// `prediction_id` is derived deterministically from
    /// (decision.inputs_hash, channel), so a caller retrying the same
    /// logical publish lands on the same (prediction_id, channel) key and
    /// `DecisionStore::publish` hands back the original record instead of
    /// inserting a duplicate.
    pub fn publish(
        &self,
        decision: &MarketDecision,
        selection: Selection,
        channel: Channel,
        visibility: Visibility,
        engine_version: &str,
        model_version: &str,
        published_at: DateTime<Utc>,
    ) -> EngineResult<Option<PublishedPrediction>> {
        if !publishable(decision) {
            return Ok(None);
        }
        let mut record = PublishedPrediction::from_decision(decision, selection, channel, visibility, published_at);
        record.engine_version = engine_version.to_string();
        record.model_version = model_version.to_string();
        let stored = self.store.publish(&record)?;
        Ok(Some(stored))
    }

    /// Marks a previously-published prediction non-official without
    /// deleting the record (§3 "Void path marks is_official = false with
    /// reason; the record itself remains").
    pub fn void(&self, prediction_id: &str, channel: Channel, reason: &str) -> EngineResult<()> {
        self.store.void_publish(prediction_id, channel, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReleaseStatus, Side};
    use crate::sport::{MarketType, Sport};
    use std::sync::Arc;
    use uuid::Uuid;

    fn store() -> DecisionStore {
        let conn = Arc::new(parking_lot::Mutex::new(crate::store::open(":memory:").unwrap()));
        DecisionStore::new(conn)
    }

    fn edge_decision() -> MarketDecision {
        MarketDecision {
            game_id: "G1".into(),
            sport: Sport::Nba,
            market_type: MarketType::Spread,
            context_hash: "ctx".into(),
            model_preference_selection_id: "sel1".into(),
            recommended_selection_id: Some("sel1".into()),
            market_line: Some(-5.5),
            market_american_odds: -110,
            edge_points: 1.0,
            edge_ev_pct: 3.0,
            model_probability_raw: 0.6,
            model_probability_adjusted: 0.6,
            classification: Tier::Edge,
            release_status: ReleaseStatus::Approved,
            reasons: vec!["EDGE_PROBABILITY_PASS".into()],
            inputs_hash: "ih1".into(),
            decision_version: 1,
            calibration_version: None,
            computed_at: Utc::now(),
        }
    }

    fn selection() -> Selection {
        Selection {
            selection_id: "sel1".into(),
            team_display_name: "Home".into(),
            side: Side::Home,
            market_line_for_selection: Some(-5.5),
            market_type: MarketType::Spread,
        }
    }

    #[test]
    fn publish_is_idempotent_per_prediction_and_channel() {
        let store = store();
        let gate = PublishingGate::new(&store);
        let decision = edge_decision();

        let first = gate
            .publish(&decision, selection(), Channel::Web, Visibility::Premium, "e1", "m1", Utc::now())
            .unwrap()
            .unwrap();
        // Same decision, same channel, a later instant — a client re-send
        // of the same logical publish, not a fabricated retry record.
        let retried = gate
            .publish(&decision, selection(), Channel::Web, Visibility::Premium, "e1", "m1", Utc::now())
            .unwrap()
            .unwrap();

        assert_eq!(first.prediction_id, retried.prediction_id);
        assert_eq!(first.published_at, retried.published_at);
    }

    #[test]
    fn different_channels_get_distinct_prediction_ids() {
        let store = store();
        let gate = PublishingGate::new(&store);
        let decision = edge_decision();

        let web = gate
            .publish(&decision, selection(), Channel::Web, Visibility::Premium, "e1", "m1", Utc::now())
            .unwrap()
            .unwrap();
        let broadcast = gate
            .publish(&decision, selection(), Channel::Broadcast, Visibility::Free, "e1", "m1", Utc::now())
            .unwrap()
            .unwrap();

        assert_ne!(web.prediction_id, broadcast.prediction_id);
    }

    #[test]
    fn non_edge_lean_decisions_are_not_published() {
        let store = store();
        let gate = PublishingGate::new(&store);
        let mut decision = edge_decision();
        decision.classification = Tier::NoPlay;
        decision.recommended_selection_id = None;
        let result = gate
            .publish(&decision, selection(), Channel::Web, Visibility::Free, "e1", "m1", Utc::now())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn void_preserves_the_record() {
        let store = store();
        let gate = PublishingGate::new(&store);
        let decision = edge_decision();
        let published = gate
            .publish(&decision, selection(), Channel::Broadcast, Visibility::Free, "e1", "m1", Utc::now())
            .unwrap()
            .unwrap();
        gate.void(&published.prediction_id.to_string(), Channel::Broadcast, "ROSTER_CHANGE")
            .unwrap();
        assert_eq!(Uuid::new_v4() != published.prediction_id, true);
    }

    #[test]
    fn market_state_registry_matches_spec_visibility_contract() {
        assert!(tier_visibility(Tier::Edge).broadcast_allowed);
        assert!(tier_visibility(Tier::Edge).parlay_allowed);
        assert!(!tier_visibility(Tier::Lean).broadcast_allowed);
        assert!(tier_visibility(Tier::Lean).parlay_allowed);
        assert!(!tier_visibility(Tier::NoPlay).broadcast_allowed);
        assert!(!tier_visibility(Tier::NoPlay).parlay_allowed);
        assert!(!tier_visibility(Tier::Blocked).parlay_allowed);
    }
}
