//! Market Decision Assembler + Validator (§4.H). Builds one MarketDecision
//! per market_type and enforces the validator invariants before release.

use crate::classifier::{self, ClassificationOutcome, ClassifierInput};
use crate::hash::canonical_json_hash;
use crate::model::{MarketDecision, ReleaseStatus, Selection, Tier};
use crate::sport::{MarketType, Sport, SportConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct AssemblyInput {
    pub game_id: String,
    pub sport: Sport,
    pub market_type: MarketType,
    pub context_hash: String,
    pub selections: Vec<Selection>,
    pub model_preference_selection_id: String,
    pub market_line: Option<f64>,
    pub market_american_odds: i32,
    pub edge_points: f64,
    pub model_probability_raw: f64,
    pub model_probability_adjusted: f64,
    pub calibration_version: Option<String>,
    pub decision_version: u32,
    pub classifier_input: ClassifierInput,
    pub model_line: Option<f64>,
    pub integrity_failure_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Violation(pub String);

pub fn assemble(cfg: &SportConfig, input: AssemblyInput, computed_at: DateTime<Utc>) -> MarketDecision {
    let mut reasons = Vec::new();

    let classification_outcome: ClassificationOutcome = if input.integrity_failure_reason.is_some() {
        ClassificationOutcome {
            tier: Tier::Blocked,
            reasons: vec![input.integrity_failure_reason.clone().unwrap()],
        }
    } else {
        classifier::classify(cfg, input.classifier_input, input.model_line, input.market_line)
    };
    reasons.extend(classification_outcome.reasons.clone());

    let recommended_selection_id = if matches!(classification_outcome.tier, Tier::Edge | Tier::Lean)
        && input.classifier_input.calibration_publish
    {
        Some(input.model_preference_selection_id.clone())
    } else {
        None
    };

    let inputs_hash = canonical_json_hash(&InputsHashFields {
        context_hash: &input.context_hash,
        market_type: input.market_type,
        market_line: input.market_line,
        market_odds: input.market_american_odds,
        calibration_version: input.calibration_version.as_deref(),
        decision_version: input.decision_version,
    });

    let violations = validate(
        cfg,
        &input,
        classification_outcome.tier,
        &reasons,
    );

    let (classification, release_status) = if !violations.is_empty() {
        for v in &violations {
            reasons.push(v.0.clone());
        }
        (Tier::Blocked, ReleaseStatus::BlockedByIntegrity)
    } else if classification_outcome.tier == Tier::Blocked {
        (Tier::Blocked, ReleaseStatus::BlockedByIntegrity)
    } else if !input.classifier_input.calibration_publish {
        (classification_outcome.tier, ReleaseStatus::BlockedByCalibration)
    } else {
        (classification_outcome.tier, ReleaseStatus::Approved)
    };

    MarketDecision {
        game_id: input.game_id,
        sport: input.sport,
        market_type: input.market_type,
        context_hash: input.context_hash,
        model_preference_selection_id: input.model_preference_selection_id,
        recommended_selection_id: if release_status == ReleaseStatus::Approved {
            recommended_selection_id
        } else {
            None
        },
        market_line: input.market_line,
        market_american_odds: input.market_american_odds,
        edge_points: input.edge_points,
        edge_ev_pct: input.classifier_input.ev_pct,
        model_probability_raw: input.model_probability_raw,
        model_probability_adjusted: input.model_probability_adjusted,
        classification,
        release_status,
        reasons,
        inputs_hash,
        decision_version: input.decision_version,
        calibration_version: input.calibration_version,
        computed_at,
    }
}

/// Validator invariants (§4.H): all must hold for `release_status =
/// APPROVED`. Any failure sets classification = BLOCKED and attaches the
/// violations to reasons.
fn validate(
    cfg: &SportConfig,
    input: &AssemblyInput,
    tier: Tier,
    reasons: &[String],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !cfg
        .supported_markets
        .iter()
        .any(|(mt, _)| *mt == input.market_type)
    {
        violations.push(Violation("UNSUPPORTED_MARKET_TYPE".to_string()));
    }

    // §4.C/§4.H: every selection id non-empty and unique, and the model's
    // preferred selection actually names one of this market's own
    // selections (direction collapses onto preference in this design, so
    // both arguments are the same id) — catches a stale/foreign
    // `model_preference_selection_id` before it can be promoted to
    // `recommended_selection_id`.
    if let Err(err) = crate::ingest::validate_selection_consistency(
        &input.selections,
        &input.model_preference_selection_id,
        &input.model_preference_selection_id,
    ) {
        violations.push(Violation(err.reason_code().to_string()));
    }

    if matches!(tier, Tier::Edge | Tier::Lean) && input.edge_points == 0.0 && input.classifier_input.ev_pct <= 0.0 {
        violations.push(Violation("NON_ZERO_EDGE_REQUIRED".to_string()));
    }

    if tier == Tier::MarketAligned {
        let banned = ["misprice", "edge", "value", "inefficiency"];
        if reasons
            .iter()
            .any(|r| banned.iter().any(|b| r.to_lowercase().contains(b)))
        {
            violations.push(Violation("ALIGNED_WITH_EDGE_REASON".to_string()));
        }
    }

    if input.market_type == MarketType::Spread && input.market_line == Some(0.0) {
        violations.push(Violation("SPREAD_LINE_ZERO".to_string()));
    }

    violations
}

#[derive(Serialize)]
struct InputsHashFields<'a> {
    context_hash: &'a str,
    market_type: MarketType,
    market_line: Option<f64>,
    market_odds: i32,
    calibration_version: Option<&'a str>,
    decision_version: u32,
}
