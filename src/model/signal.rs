use crate::sport::MarketType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a Signal chain (§3, §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalState {
    Pending,
    ActiveEdge,
    ActiveMonitoring,
    Weakened,
    Invalidated,
    Settled,
}

impl SignalState {
    /// Allowed next states, enforced by the lifecycle manager — the state
    /// machine in §4.I. `Invalidated` and `Settled` are terminal for a
    /// chain; a flip to a new side always starts a fresh chain at `Pending`.
    pub fn allowed_transitions(self) -> &'static [SignalState] {
        use SignalState::*;
        match self {
            Pending => &[ActiveEdge, ActiveMonitoring, Invalidated],
            ActiveEdge => &[ActiveMonitoring, Weakened, Invalidated, Settled],
            ActiveMonitoring => &[ActiveEdge, Weakened, Invalidated, Settled],
            Weakened => &[ActiveEdge, ActiveMonitoring, Invalidated, Settled],
            Invalidated => &[],
            Settled => &[],
        }
    }

    pub fn can_transition_to(self, next: SignalState) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

/// The lifecycle wrapper around a MarketDecision chosen for external use.
/// Append-only: each record is immutable; a new state is a new record
/// referencing `previous_signal_id` (§3, §4.I).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: Uuid,
    pub previous_signal_id: Option<Uuid>,
    pub game_id: String,
    pub market_type: MarketType,
    pub state: SignalState,
    /// Constant across a chain until an Invalidated record; a flip requires
    /// invalidation and a fresh chain.
    pub selection_id: String,
    pub context_hash: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    pub fn new_chain(
        game_id: impl Into<String>,
        market_type: MarketType,
        selection_id: impl Into<String>,
        context_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            signal_id: Uuid::new_v4(),
            previous_signal_id: None,
            game_id: game_id.into(),
            market_type,
            state: SignalState::Pending,
            selection_id: selection_id.into(),
            context_hash: context_hash.into(),
            reason: None,
            created_at,
        }
    }
}
