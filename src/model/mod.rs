//! Core data model (§3): the immutable record types that flow through the
//! pipeline. Everything here is plain data — behavior lives in the
//! component modules that consume it.

mod audit;
mod calibration;
mod context;
mod decision;
mod grading;
mod published;
mod selection;
mod signal;
mod simulation;
mod snapshot;

pub use audit::AuditLogRecord;
pub use calibration::{CalibrationSegment, CalibrationVersion};
pub use context::SimulationContext;
pub use decision::{GameDecisions, MarketDecision, ReleaseStatus, Tier};
pub use grading::{EventResult, Grading, Settlement};
pub use published::{Channel, PublishedPrediction, Visibility};
pub use selection::{Selection, Side, INVALID, NO_EDGE};
pub use signal::{Signal, SignalState};
pub use simulation::{ConfidenceInterval, SimulationResult};
pub use snapshot::{InjurySnapshot, InjuryStatus, OddsSnapshot};
