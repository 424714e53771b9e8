//! Signal Lifecycle Manager (§4.I). Append-only state machine per (game,
//! market_type), grounded on the original service's
//! `signal_locking_service.py`: the first qualifying signal is the source
//! of truth; later results append new records referencing
//! `previous_signal_id`, never mutating the prior one.

use crate::model::{MarketDecision, Signal, SignalState, Tier};
use crate::sport::MarketType;
use chrono::{DateTime, Utc};

/// A decision in a confirmation window, used to evaluate the N-of-M
/// anti-noise filter before a chain is allowed to start.
#[derive(Debug, Clone)]
pub struct WindowedDecision {
    pub selection_id: String,
    pub tier: Tier,
}

/// True when at least `n` of the last `m` decisions agree on `side` and
/// have tier >= LEAN (§4.I PENDING rule). `decisions` must be newest-last.
pub fn confirms(decisions: &[WindowedDecision], side: &str, n: u32, m: u32) -> bool {
    let window: Vec<&WindowedDecision> = decisions.iter().rev().take(m as usize).collect();
    let agreeing = window
        .iter()
        .filter(|d| d.selection_id == side && matches!(d.tier, Tier::Edge | Tier::Lean))
        .count() as u32;
    agreeing >= n
}

pub enum LifecycleEvent {
    /// No existing chain, and confirmation window now satisfied: start a
    /// fresh PENDING chain.
    StartPending { selection_id: String },
    /// Existing chain confirmed into ACTIVE_EDGE.
    Confirm,
    /// Existing chain moves to ACTIVE_MONITORING (variance/market moved
    /// within tolerance).
    Monitor,
    /// Existing chain weakens but side is unchanged.
    Weaken,
    /// Explicit rule fired: chain is invalidated with a reason. Side may
    /// never flip within a chain; a flip must pass through here first.
    Invalidate { reason: String },
    /// Terminal, post-game.
    Settle,
    /// Nothing changes this tick.
    NoOp,
}

/// Shared bootstrap rule for both "no chain yet" and "prior chain is
/// terminal": a fresh PENDING only opens once the confirmation window
/// agrees (§4.I PENDING rule).
fn try_start(
    decision: &MarketDecision,
    confirmation_window: &[WindowedDecision],
    cfg_confirmation_n: u32,
    cfg_confirmation_m: u32,
) -> LifecycleEvent {
    let side = decision
        .recommended_selection_id
        .clone()
        .unwrap_or_else(|| decision.model_preference_selection_id.clone());
    if confirms(confirmation_window, &side, cfg_confirmation_n, cfg_confirmation_m) {
        LifecycleEvent::StartPending { selection_id: side }
    } else {
        LifecycleEvent::NoOp
    }
}

/// Decides the next lifecycle event for (game, market_type) given the
/// latest chain record (if any) and the freshly-assembled decision.
pub fn next_event(
    chain_head: Option<&Signal>,
    decision: &MarketDecision,
    confirmation_window: &[WindowedDecision],
    cfg_confirmation_n: u32,
    cfg_confirmation_m: u32,
    invalidation_reason: Option<String>,
) -> LifecycleEvent {
    if let Some(reason) = invalidation_reason {
        if let Some(head) = chain_head {
            if head.state != SignalState::Invalidated && head.state != SignalState::Settled {
                return LifecycleEvent::Invalidate { reason };
            }
        }
        return LifecycleEvent::NoOp;
    }

    match chain_head {
        None => try_start(decision, confirmation_window, cfg_confirmation_n, cfg_confirmation_m),
        Some(head) if head.state == SignalState::Invalidated || head.state == SignalState::Settled => {
            // The old chain is terminal and stays that way, but §4.I allows a
            // fresh chain to open on top of it once confirmation passes again
            // — e.g. the away side re-confirming after a ROSTER_CHANGE
            // invalidation on the home side.
            try_start(decision, confirmation_window, cfg_confirmation_n, cfg_confirmation_m)
        }
        Some(head) => {
            // A side flip never happens in-chain; it must first invalidate.
            let current_side = decision
                .recommended_selection_id
                .as_deref()
                .unwrap_or(&decision.model_preference_selection_id);
            if current_side != head.selection_id {
                return LifecycleEvent::Invalidate {
                    reason: "SIDE_FLIP".to_string(),
                };
            }
            match decision.classification {
                Tier::Edge if head.state == SignalState::Pending => LifecycleEvent::Confirm,
                Tier::Edge => LifecycleEvent::NoOp,
                Tier::Lean if head.state == SignalState::ActiveEdge => LifecycleEvent::Monitor,
                Tier::Lean => LifecycleEvent::Weaken,
                Tier::NoPlay => LifecycleEvent::Weaken,
                Tier::Blocked => LifecycleEvent::Invalidate {
                    reason: "INTEGRITY_FAILURE".to_string(),
                },
                Tier::MarketAligned => LifecycleEvent::Monitor,
            }
        }
    }
}

/// Applies a `LifecycleEvent` to the chain, producing the next (immutable)
/// `Signal` record, or `None` for `NoOp`.
pub fn apply_event(
    game_id: &str,
    market_type: MarketType,
    chain_head: Option<&Signal>,
    context_hash: &str,
    event: LifecycleEvent,
    now: DateTime<Utc>,
) -> Option<Signal> {
    match event {
        LifecycleEvent::NoOp => None,
        LifecycleEvent::StartPending { selection_id } => Some(Signal::new_chain(
            game_id,
            market_type,
            selection_id,
            context_hash,
            now,
        )),
        LifecycleEvent::Confirm => next_state(chain_head?, SignalState::ActiveEdge, None, context_hash, now),
        LifecycleEvent::Monitor => {
            next_state(chain_head?, SignalState::ActiveMonitoring, None, context_hash, now)
        }
        LifecycleEvent::Weaken => next_state(chain_head?, SignalState::Weakened, None, context_hash, now),
        LifecycleEvent::Invalidate { reason } => {
            next_state(chain_head?, SignalState::Invalidated, Some(reason), context_hash, now)
        }
        LifecycleEvent::Settle => next_state(chain_head?, SignalState::Settled, None, context_hash, now),
    }
}

fn next_state(
    head: &Signal,
    next: SignalState,
    reason: Option<String>,
    context_hash: &str,
    now: DateTime<Utc>,
) -> Option<Signal> {
    if !head.state.can_transition_to(next) {
        return None;
    }
    Some(Signal {
        signal_id: uuid::Uuid::new_v4(),
        previous_signal_id: Some(head.signal_id),
        game_id: head.game_id.clone(),
        market_type: head.market_type,
        state: next,
        selection_id: head.selection_id.clone(),
        context_hash: context_hash.to_string(),
        reason,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_window_requires_n_of_m_agreement() {
        let decisions = vec![
            WindowedDecision { selection_id: "a".into(), tier: Tier::Lean },
            WindowedDecision { selection_id: "b".into(), tier: Tier::Edge },
            WindowedDecision { selection_id: "a".into(), tier: Tier::Edge },
        ];
        assert!(confirms(&decisions, "a", 2, 3));
        assert!(!confirms(&decisions, "b", 2, 3));
    }

    #[test]
    fn invalidated_chain_never_reactivates() {
        let head = Signal {
            signal_id: uuid::Uuid::new_v4(),
            previous_signal_id: None,
            game_id: "G5".into(),
            market_type: MarketType::Spread,
            state: SignalState::Invalidated,
            selection_id: "home_sel".into(),
            context_hash: "ctx1".into(),
            reason: Some("ROSTER_CHANGE".to_string()),
            created_at: Utc::now(),
        };
        let result = next_state(&head, SignalState::ActiveEdge, None, "ctx2", Utc::now());
        assert!(result.is_none());
    }

    #[test]
    fn side_flip_forces_invalidation_not_mutation() {
        let head = Signal {
            signal_id: uuid::Uuid::new_v4(),
            previous_signal_id: None,
            game_id: "G5".into(),
            market_type: MarketType::Spread,
            state: SignalState::ActiveEdge,
            selection_id: "home_sel".into(),
            context_hash: "ctx1".into(),
            reason: None,
            created_at: Utc::now(),
        };
        let decision = sample_decision("away_sel");
        let event = next_event(Some(&head), &decision, &[], 2, 3, None);
        assert!(matches!(event, LifecycleEvent::Invalidate { reason } if reason == "SIDE_FLIP"));
    }

    fn sample_decision(recommended: &str) -> MarketDecision {
        MarketDecision {
            game_id: "G5".into(),
            sport: crate::sport::Sport::Nba,
            market_type: MarketType::Spread,
            context_hash: "ctx2".into(),
            model_preference_selection_id: recommended.to_string(),
            recommended_selection_id: Some(recommended.to_string()),
            market_line: Some(-2.5),
            market_american_odds: -110,
            edge_points: 1.0,
            edge_ev_pct: 1.0,
            model_probability_raw: 0.55,
            model_probability_adjusted: 0.55,
            classification: Tier::Edge,
            release_status: crate::model::ReleaseStatus::Approved,
            reasons: vec![],
            inputs_hash: "h".into(),
            decision_version: 1,
            calibration_version: None,
            computed_at: Utc::now(),
        }
    }
}
