//! The decision pipeline proper (§2 flow): RCL -> Calibration -> Classifier
//! -> Assembler -> Signal lifecycle -> Audit -> Publish, run once per
//! SimulationContext across the sport's supported markets. This is the
//! glue the Orchestrator drives; every stage it calls is one of the pure
//! component modules at the crate root.

use crate::calibration::{self, BaselineStats, CalibrationInput};
use crate::classifier::{self, ClassifierInput};
use crate::error::{EngineError, EngineResult};
use crate::ingest::{generate_market_selections, ProposedSimulationResult, SimulationIngest};
use crate::model::{AuditLogRecord, GameDecisions, MarketDecision, Signal};
use crate::rcl::{self, LiveGameState, RealityCheckInput};
use crate::signal::{self, WindowedDecision};
use crate::sport::{MarketType, SportConfigRegistry};
use crate::store::{AuditStore, ContentStore, DecisionStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info_span;
use uuid::Uuid;

/// External facts needed to evaluate one market for one context, supplied
/// by the orchestrator from its collaborators (odds provider, league
/// historical stats, baseline rolling window) — this pipeline never
/// fetches them itself.
#[derive(Debug, Clone)]
pub struct MarketPipelineInput {
    pub market_line: Option<f64>,
    pub market_american_odds: i32,
    pub book_key: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub league_mean: f64,
    pub league_std_dev: f64,
    pub live: Option<LiveGameState>,
    pub data_quality: f64,
    pub injury_uncertainty: f64,
    pub baseline: BaselineStats,
    pub calibration_version: Option<String>,
    pub decision_version: u32,
}

pub struct PipelineOutcome {
    pub game_decisions: GameDecisions,
    pub signals: Vec<Signal>,
}

pub struct GamePipeline {
    pub content_store: Arc<ContentStore>,
    pub decision_store: Arc<DecisionStore>,
    pub audit_store: Arc<AuditStore>,
    pub sport_registry: Arc<SportConfigRegistry>,
    pub engine_version: String,
}

impl GamePipeline {
    /// Runs every market the sport supports against one SimulationContext's
    /// results. Writes a MarketDecision and an audit record for each
    /// market (approved or blocked — §4.L "one per produced MarketDecision")
    /// and advances the signal chain for each.
    pub fn run(
        &self,
        context: &crate::model::SimulationContext,
        proposed_results: Vec<ProposedSimulationResult>,
        market_inputs: &HashMap<MarketType, MarketPipelineInput>,
    ) -> EngineResult<PipelineOutcome> {
        let span = info_span!("pipeline_run", game_id = %context.game_id, sport = %context.sport, context_hash = %context.context_hash);
        let _guard = span.enter();

        let cfg = self.sport_registry.config_for(context.sport);

        // §4.D: nothing a simulation worker proposes reaches calibration or
        // classification until SimulationIngest has checked it against the
        // bound odds snapshot's team keys and the context's own symmetry
        // tolerance. A market whose proposal fails ingest still gets a
        // MarketDecision — BLOCKED, never silently dropped (§4.D/§4.G/§7).
        let snapshot = self
            .content_store
            .get_odds_snapshot(&context.odds_snapshot_hash)?
            .ok_or_else(|| EngineError::ContextMismatch {
                expected: context.odds_snapshot_hash.clone(),
                actual: "none".to_string(),
            })?;
        let ingest = SimulationIngest::new(&self.content_store);

        let mut by_market: HashMap<MarketType, crate::model::SimulationResult> = HashMap::new();
        let mut ingest_failures: HashMap<MarketType, String> = HashMap::new();
        for proposed in proposed_results {
            let market_type = proposed.result.market_type;
            match ingest.ingest(proposed, &snapshot.home_team_key, &snapshot.away_team_key) {
                Ok(result) => {
                    by_market.insert(market_type, result);
                }
                Err(err) => {
                    ingest_failures.insert(market_type, err.reason_code().to_string());
                }
            }
        }

        let mut spread = None;
        let mut moneyline = None;
        let mut total = None;
        let mut signals = Vec::new();

        for (market_type, settlement) in cfg.supported_markets.iter().copied() {
            if settlement != crate::sport::MarketSettlement::FullGame {
                continue;
            }
            let sim = by_market.get(&market_type);
            let ingest_failure_reason = ingest_failures.get(&market_type).cloned();
            if sim.is_none() && ingest_failure_reason.is_none() {
                continue;
            }
            let Some(inputs) = market_inputs.get(&market_type) else { continue };

            let decision = self.decide_one_market(context, cfg, market_type, sim, inputs, ingest_failure_reason, Utc::now())?;

            self.decision_store.put_market_decision(&decision)?;
            self.write_audit(context, &decision)?;

            let chain = self.decision_store.get_signal_chain(&context.game_id, market_type)?;
            let chain_head = chain.last().cloned();
            let recent = self.decision_store.recent_market_decisions(&context.game_id, market_type, cfg.confirmation_m)?;
            let window: Vec<WindowedDecision> = recent
                .iter()
                .map(|d| WindowedDecision {
                    selection_id: d
                        .recommended_selection_id
                        .clone()
                        .unwrap_or_else(|| d.model_preference_selection_id.clone()),
                    tier: d.classification,
                })
                .collect();
            let invalidation_reason = integrity_invalidation_reason(&decision);
            let event = signal::next_event(
                chain_head.as_ref(),
                &decision,
                &window,
                cfg.confirmation_n,
                cfg.confirmation_m,
                invalidation_reason,
            );
            if let Some(next) = signal::apply_event(&context.game_id, market_type, chain_head.as_ref(), &context.context_hash, event, Utc::now()) {
                self.decision_store.put_signal(&next)?;
                signals.push(next);
            }

            match market_type {
                MarketType::Spread => spread = Some(decision),
                MarketType::Moneyline2Way | MarketType::Moneyline3Way => moneyline = Some(decision),
                MarketType::Total => total = Some(decision),
            }
        }

        let any = spread.as_ref().or(moneyline.as_ref()).or(total.as_ref());
        let (inputs_hash, decision_version, computed_at) = match any {
            Some(d) => (d.inputs_hash.clone(), d.decision_version, d.computed_at),
            None => (String::new(), 0, Utc::now()),
        };

        let home_team_name = market_inputs.values().next().map(|i| i.home_team_name.clone()).unwrap_or_default();
        let away_team_name = market_inputs.values().next().map(|i| i.away_team_name.clone()).unwrap_or_default();
        self.decision_store.put_game_meta(&context.game_id, &home_team_name, &away_team_name)?;

        Ok(PipelineOutcome {
            game_decisions: GameDecisions {
                game_id: context.game_id.clone(),
                home_team_name,
                away_team_name,
                spread,
                moneyline,
                total,
                inputs_hash,
                decision_version,
                computed_at,
            },
            signals,
        })
    }

    fn decide_one_market(
        &self,
        context: &crate::model::SimulationContext,
        cfg: &crate::sport::SportConfig,
        market_type: MarketType,
        sim: Option<&crate::model::SimulationResult>,
        inputs: &MarketPipelineInput,
        ingest_failure_reason: Option<String>,
        computed_at: chrono::DateTime<Utc>,
    ) -> EngineResult<MarketDecision> {
        let rcl_out = if market_type == MarketType::Total {
            Some(rcl::evaluate(RealityCheckInput {
                model_total: sim.and_then(|s| s.model_fair_line).unwrap_or(inputs.league_mean),
                league_mean: inputs.league_mean,
                league_std_dev: inputs.league_std_dev,
                live: inputs.live,
            }))
        } else {
            None
        };
        let rcl_passed = rcl_out.as_ref().map(|o| o.rcl_passed).unwrap_or(true);

        let model_probability = sim.map(|s| s.model_probability).unwrap_or(0.0);
        let model_value = sim.and_then(|s| s.model_fair_line).unwrap_or(model_probability);
        let market_value = inputs.market_line.unwrap_or_else(|| sim.map(|s| s.devigged_market_probability).unwrap_or(0.0));
        let current_sigma = sim.map(|s| s.confidence_interval.half_width.max(f64::EPSILON)).unwrap_or(f64::EPSILON);

        let calib_input = CalibrationInput {
            model_value,
            market_value,
            p_raw: model_probability,
            edge_raw: sim.map(|s| s.raw_edge).unwrap_or(0.0),
            model_probability,
            current_sigma,
            data_quality: inputs.data_quality,
            injury_uncertainty: inputs.injury_uncertainty,
            baseline: inputs.baseline,
        };
        let calib_out = calibration::calibrate(cfg, calib_input);

        let selections = generate_market_selections(
            &context.game_id,
            market_type,
            inputs.market_line,
            &inputs.book_key,
            &inputs.home_team_name,
            &inputs.away_team_name,
        );

        let prob_edge = calib_out.p_adjusted - classifier::american_odds_to_implied_prob(inputs.market_american_odds);
        let ev_pct = classifier::compute_ev_2way(calib_out.p_adjusted, inputs.market_american_odds);

        let edge_points = match market_type {
            MarketType::Spread | MarketType::Total => model_value - market_value,
            MarketType::Moneyline2Way | MarketType::Moneyline3Way => prob_edge,
        };

        let variance_downgraded = matches!(calib_out.confidence_label, crate::calibration::ConfidenceLabel::Downgraded);

        // A roster change severe enough to blow through the elite-override
        // injury-uncertainty ceiling is too uncertain to trust at all, not
        // merely too uncertain for an override (§4.I "roster change" /
        // ROSTER_CHANGE invalidation). An ingest rejection (§4.D) takes
        // precedence — there's no trustworthy SimulationResult behind this
        // market at all.
        let integrity_failure_reason = ingest_failure_reason.or_else(|| {
            if inputs.injury_uncertainty > cfg.elite_override.max_injury_uncertainty {
                Some("ROSTER_CHANGE".to_string())
            } else {
                None
            }
        });

        let classifier_input = ClassifierInput {
            market_type,
            prob_edge,
            ev_pct,
            calibration_publish: calib_out.publish,
            rcl_passed,
            variance_downgraded,
            integrity_failure: false,
            edge_points,
        };

        let assembly_input = crate::assembler::AssemblyInput {
            game_id: context.game_id.clone(),
            sport: context.sport,
            market_type,
            context_hash: context.context_hash.clone(),
            selections,
            model_preference_selection_id: sim
                .map(|s| s.model_preference_selection_id.clone())
                .unwrap_or_else(|| crate::model::INVALID.to_string()),
            market_line: inputs.market_line,
            market_american_odds: inputs.market_american_odds,
            edge_points,
            model_probability_raw: model_probability,
            model_probability_adjusted: calib_out.p_adjusted,
            calibration_version: inputs.calibration_version.clone(),
            decision_version: inputs.decision_version,
            classifier_input,
            model_line: sim.and_then(|s| s.model_fair_line),
            integrity_failure_reason,
        };

        Ok(crate::assembler::assemble(cfg, assembly_input, computed_at))
    }

    fn write_audit(&self, context: &crate::model::SimulationContext, decision: &MarketDecision) -> EngineResult<()> {
        let now = Utc::now();
        self.audit_store.insert(AuditLogRecord {
            event_id: Uuid::new_v4(),
            inputs_hash: decision.inputs_hash.clone(),
            decision_version: decision.decision_version,
            classification: format!("{:?}", decision.classification),
            release_status: format!("{:?}", decision.release_status),
            edge_points: decision.edge_points,
            model_prob: decision.model_probability_adjusted,
            trace_id: context.context_hash.clone(),
            engine_version: self.engine_version.clone(),
            market_type: decision.market_type,
            league: decision.sport,
            logged_at: now,
            retention_expires_at: now,
        })
    }
}

/// Derives the signal lifecycle's invalidation reason from a BLOCKED
/// decision (§4.I "explicit rule fired: ... integrity failure").
fn integrity_invalidation_reason(decision: &MarketDecision) -> Option<String> {
    if decision.classification == crate::model::Tier::Blocked {
        Some(decision.reasons.first().cloned().unwrap_or_else(|| "INTEGRITY_FAILURE".to_string()))
    } else {
        None
    }
}

