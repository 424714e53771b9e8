//! Structured error taxonomy.
//!
//! Every public pipeline entry point returns `Result<T, EngineError>`. The
//! `kind()` drives both the HTTP status at the API boundary and the reason
//! code attached to MarketDecision/AuditLog records. Recoverable kinds
//! (Availability, transient Persistence) are handled by the caller with
//! retry/backoff; everything else is surfaced as-is.

use thiserror::Error;

/// High-level error category, matching the taxonomy in the error handling
/// design: Integrity, Contract, Calibration, Availability, Persistence,
/// Grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Integrity,
    Contract,
    Calibration,
    Availability,
    Persistence,
    Grading,
}

impl ErrorKind {
    /// Recoverable kinds are retried locally by the caller and never reach
    /// an external consumer as a failure.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::Availability)
    }

    /// Fail-closed kinds must never result in a guessed prediction.
    pub fn is_fail_closed(self) -> bool {
        matches!(self, ErrorKind::Integrity | ErrorKind::Contract)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing market line for {market_type} on game {game_id}")]
    MissingMarketLine { game_id: String, market_type: String },

    #[error("malformed competitors: {0}")]
    MalformedCompetitors(String),

    #[error("symmetry violation: sum={sum:.6}, tolerance={tolerance:.6}")]
    SymmetryViolation { sum: f64, tolerance: f64 },

    #[error("context hash mismatch: expected {expected}, got {actual}")]
    ContextMismatch { expected: String, actual: String },

    #[error("roster unavailable for team {team_key} ({sport})")]
    RosterUnavailable { team_key: String, sport: String },

    #[error("stale odds: age_hours={age_hours:.1} exceeds max {max_hours:.1} for {sport}")]
    StaleOdds {
        sport: String,
        age_hours: f64,
        max_hours: f64,
    },

    #[error("market line out of structural range for {sport}: {line}")]
    LineOutOfRange { sport: String, line: f64 },

    #[error("MARKET_CONTRACT_MISMATCH: {sport} does not support {market_type}/{settlement}")]
    MarketContractMismatch {
        sport: String,
        market_type: String,
        settlement: String,
    },

    #[error("unknown sport key: {0}")]
    UnknownSport(String),

    #[error("baseline drift exceeded for {sport}: {detail}")]
    BaselineDriftExceeded { sport: String, detail: String },

    #[error("elite override conditions not met: {0}")]
    EliteOverrideNotMet(String),

    #[error("odds provider unavailable: {0}")]
    OddsProviderUnavailable(String),

    #[error("simulation worker timed out after {0:?}")]
    SimulationTimeout(std::time::Duration),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("malformed record json: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit insert failed, decision not emitted: {0}")]
    AuditInsertFailed(String),

    #[error("audit store refused mutation: {0}")]
    AuditMutationRefused(String),

    #[error("grading pending: missing scores for event {0}")]
    GradingPending(String),

    #[error("backpressure: dropped tick for sport {0}")]
    BackpressureDropped(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;
        match self {
            MissingMarketLine { .. }
            | MalformedCompetitors(_)
            | SymmetryViolation { .. }
            | ContextMismatch { .. }
            | RosterUnavailable { .. }
            | StaleOdds { .. }
            | LineOutOfRange { .. } => ErrorKind::Integrity,

            MarketContractMismatch { .. } | UnknownSport(_) => ErrorKind::Contract,

            BaselineDriftExceeded { .. } | EliteOverrideNotMet(_) => ErrorKind::Calibration,

            OddsProviderUnavailable(_) | SimulationTimeout(_) | BackpressureDropped(_) => {
                ErrorKind::Availability
            }

            Storage(_) | Serialization(_) | AuditInsertFailed(_) | AuditMutationRefused(_) => {
                ErrorKind::Persistence
            }

            GradingPending(_) => ErrorKind::Grading,
        }
    }

    /// The machine-readable reason code attached to MarketDecision.reasons[]
    /// and the audit record.
    pub fn reason_code(&self) -> &'static str {
        use EngineError::*;
        match self {
            MissingMarketLine { .. } => "MISSING_MARKET_LINE",
            MalformedCompetitors(_) => "MALFORMED_COMPETITORS",
            SymmetryViolation { .. } => "SYMMETRY_VIOLATION",
            ContextMismatch { .. } => "CONTEXT_HASH_MISMATCH",
            RosterUnavailable { .. } => "ROSTER_UNAVAILABLE",
            StaleOdds { .. } => "STALE_ODDS",
            LineOutOfRange { .. } => "LINE_OUT_OF_RANGE",
            MarketContractMismatch { .. } => "MARKET_CONTRACT_MISMATCH",
            UnknownSport(_) => "UNKNOWN_SPORT",
            BaselineDriftExceeded { .. } => "BASELINE_DRIFT_EXCEEDED",
            EliteOverrideNotMet(_) => "ELITE_OVERRIDE_NOT_MET",
            OddsProviderUnavailable(_) => "ODDS_PROVIDER_UNAVAILABLE",
            SimulationTimeout(_) => "SIMULATION_TIMEOUT",
            Storage(_) => "STORAGE_ERROR",
            Serialization(_) => "SERIALIZATION_ERROR",
            AuditInsertFailed(_) => "AUDIT_INSERT_FAILED",
            AuditMutationRefused(_) => "AUDIT_MUTATION_REFUSED",
            GradingPending(_) => "GRADING_PENDING",
            BackpressureDropped(_) => "BACKPRESSURE_DROPPED",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
