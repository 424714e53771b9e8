//! End-to-end pipeline scenarios (§8 seeded examples), run against a
//! tempfile-backed store through `GamePipeline::run` rather than the
//! individual component unit tests each module already carries.

use chrono::Utc;
use linewatch_core::calibration::BaselineStats;
use linewatch_core::ingest::{selection_id, ProposedSimulationResult};
use linewatch_core::model::{ConfidenceInterval, OddsSnapshot, ReleaseStatus, Side, SimulationContext, SimulationResult, Tier};
use linewatch_core::orchestrator::{GamePipeline, MarketPipelineInput};
use linewatch_core::sport::{MarketType, Sport, SportConfigRegistry};
use linewatch_core::store::{AuditStore, ContentStore, DecisionStore};
use std::sync::Arc;

fn pipeline(db_path: &str) -> GamePipeline {
    let conn = Arc::new(parking_lot::Mutex::new(linewatch_core::store::open(db_path).unwrap()));
    GamePipeline {
        content_store: Arc::new(ContentStore::new(conn.clone())),
        decision_store: Arc::new(DecisionStore::new(conn.clone())),
        audit_store: Arc::new(AuditStore::new(conn).unwrap()),
        sport_registry: Arc::new(SportConfigRegistry::locked()),
        engine_version: "test-1".into(),
    }
}

/// Registers the odds snapshot + simulation context a scenario needs and
/// returns the persisted context (its `context_hash` is the real,
/// content-derived one `SimulationIngest` will look up). `distinguisher`
/// varies the context's canonical fields across calls within one game so
/// repeated ticks (the signal lifecycle scenario) get distinct contexts.
fn setup_context(pipe: &GamePipeline, game_id: &str, sport: Sport, distinguisher: &str) -> SimulationContext {
    let odds_hash = pipe
        .content_store
        .put_odds_snapshot(OddsSnapshot {
            content_hash: String::new(),
            game_id: game_id.to_string(),
            sport,
            captured_at: Utc::now(),
            bookmaker_key: "dk".into(),
            markets: Default::default(),
            home_team_key: "HOME".into(),
            away_team_key: "AWAY".into(),
            home_team_name: "Home".into(),
            away_team_name: "Away".into(),
        })
        .unwrap();
    let context_hash = pipe
        .content_store
        .put_sim_context(SimulationContext {
            context_hash: String::new(),
            game_id: game_id.to_string(),
            sport,
            model_version: distinguisher.to_string(),
            engine_version: "e1".into(),
            data_feed_version: "d1".into(),
            odds_snapshot_hash: odds_hash,
            injury_snapshot_hashes: vec![],
            pace_factor: 1.0,
            fatigue_factor: 1.0,
            iteration_count: 10_000,
            seed_base: 1,
            created_at: Utc::now(),
        })
        .unwrap();
    pipe.content_store.get_sim_context(&context_hash).unwrap().unwrap()
}

fn clean_baseline() -> BaselineStats {
    BaselineStats { bias_vs_actual: 0.1, bias_vs_market: 0.1, over_rate: 0.5 }
}

#[allow(clippy::too_many_arguments)]
fn proposed_result(
    context_hash: &str,
    market_type: MarketType,
    event_id: &str,
    model_probability: f64,
    devigged_market_probability: f64,
    model_fair_line: Option<f64>,
    preference_selection_id: &str,
    half_width: f64,
) -> ProposedSimulationResult {
    let result = SimulationResult {
        context_hash: context_hash.to_string(),
        market_type,
        selection_id: preference_selection_id.to_string(),
        schema_version: "1".into(),
        event_id: event_id.to_string(),
        home_team_key: "HOME".into(),
        away_team_key: "AWAY".into(),
        model_probability,
        confidence_interval: ConfidenceInterval {
            lower: model_probability - half_width,
            upper: model_probability + half_width,
            half_width,
            confidence_level: 0.95,
        },
        devigged_market_probability,
        raw_edge: (model_probability - devigged_market_probability).abs(),
        edge_pct: 0.0,
        converged: true,
        iterations_run: 10_000,
        model_fair_line,
        model_fair_price: None,
        model_preference_selection_id: preference_selection_id.to_string(),
        calibration_version: None,
        created_at_utc: Utc::now(),
    };
    // Two-sided market, no push side in these scenarios: raw probabilities
    // sum to 1.0 by construction, well inside the symmetry tolerance.
    ProposedSimulationResult {
        result,
        home_team_key: "HOME".into(),
        away_team_key: "AWAY".into(),
        p_a: model_probability,
        p_b: 1.0 - model_probability,
        p_push: 0.0,
    }
}

#[allow(clippy::too_many_arguments)]
fn market_input(
    market_line: Option<f64>,
    market_american_odds: i32,
    league_mean: f64,
    league_std_dev: f64,
    injury_uncertainty: f64,
    decision_version: u32,
) -> MarketPipelineInput {
    MarketPipelineInput {
        market_line,
        market_american_odds,
        book_key: "dk".into(),
        home_team_name: "Home".into(),
        away_team_name: "Away".into(),
        league_mean,
        league_std_dev,
        live: None,
        data_quality: 0.99,
        injury_uncertainty,
        baseline: clean_baseline(),
        calibration_version: None,
        decision_version,
    }
}

/// Scenario 1: NBA spread MARKET_ALIGNED.
#[test]
fn nba_spread_market_aligned() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let pipe = pipeline(tmp.path().to_str().unwrap());
    let context = setup_context(&pipe, "G1", Sport::Nba, "ctx1");

    let home_sel = selection_id("G1", MarketType::Spread, Side::Home, Some(-5.5), "dk");
    let sim = proposed_result(&context.context_hash, MarketType::Spread, "G1", 0.522, 0.522, Some(-5.5), &home_sel, 0.05);
    let mut inputs = std::collections::HashMap::new();
    inputs.insert(MarketType::Spread, market_input(Some(-5.5), -110, 220.0, 11.0, 0.05, 1));

    let outcome = pipe.run(&context, vec![sim], &inputs).unwrap();

    let spread = outcome.game_decisions.spread.expect("spread decision produced");
    assert_eq!(spread.classification, Tier::MarketAligned);
    assert_eq!(spread.edge_points, 0.0);
    assert_eq!(spread.recommended_selection_id, None);
    assert_eq!(spread.release_status, ReleaseStatus::Approved);
    assert!(!spread.reasons.iter().any(|r| r.to_lowercase().contains("misprice")));
}

/// Scenario 4: MLB moneyline EDGE with EV = +9.0.
#[test]
fn mlb_moneyline_edge() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let pipe = pipeline(tmp.path().to_str().unwrap());
    let context = setup_context(&pipe, "G4", Sport::Mlb, "ctx4");

    let home_sel = selection_id("G4", MarketType::Moneyline2Way, Side::Home, None, "dk");
    // p_raw chosen so MLB's 0.7 compression factor lands p_adjusted on 0.66.
    let p_raw = 0.5 + (0.66 - 0.5) / 0.7;
    let sim = proposed_result(&context.context_hash, MarketType::Moneyline2Way, "G4", p_raw, 0.60, None, &home_sel, 0.05);
    let mut inputs = std::collections::HashMap::new();
    inputs.insert(MarketType::Moneyline2Way, market_input(None, -150, 8.5, 1.0, 0.05, 1));

    let outcome = pipe.run(&context, vec![sim], &inputs).unwrap();

    let ml = outcome.game_decisions.moneyline.expect("moneyline decision produced");
    assert_eq!(ml.classification, Tier::Edge);
    assert_eq!(ml.release_status, ReleaseStatus::Approved);
    assert_eq!(ml.recommended_selection_id, Some(home_sel));
    assert!(ml.reasons.contains(&"EDGE_PROBABILITY_PASS".to_string()));
    assert!((ml.edge_ev_pct - 9.0).abs() < 1e-6, "got {}", ml.edge_ev_pct);
}

/// Scenario 3: NHL total, extreme variance blocks publish; never EDGE.
#[test]
fn nhl_total_extreme_variance_blocks() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let pipe = pipeline(tmp.path().to_str().unwrap());
    let context = setup_context(&pipe, "G3", Sport::Nhl, "ctx3");

    let over_sel = selection_id("G3", MarketType::Total, Side::Over, Some(6.0), "dk");
    // current_sigma / soft_deviation(0.8) = 1.45, past NHL's extreme_z (1.35).
    let sim = proposed_result(&context.context_hash, MarketType::Total, "G3", 0.60, 0.50, Some(6.8), &over_sel, 0.8 * 1.45);
    let mut inputs = std::collections::HashMap::new();
    inputs.insert(MarketType::Total, market_input(Some(6.0), -110, 6.2, 0.6, 0.05, 1));

    let outcome = pipe.run(&context, vec![sim], &inputs).unwrap();

    let total = outcome.game_decisions.total.expect("total decision produced");
    assert_ne!(total.classification, Tier::Edge);
    assert!(matches!(total.classification, Tier::Lean | Tier::NoPlay));
    assert!(total.reasons.contains(&"EXTREME_VARIANCE".to_string()));
    assert_eq!(total.release_status, ReleaseStatus::BlockedByCalibration);
}

/// Scenario 5: signal lifecycle — PENDING -> ACTIVE_EDGE -> INVALIDATED
/// (ROSTER_CHANGE), no reactivation on the old chain, fresh PENDING once the
/// flipped side re-confirms.
#[test]
fn signal_lifecycle_roster_change_invalidation_and_fresh_chain() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let pipe = pipeline(tmp.path().to_str().unwrap());

    let home_sel = selection_id("G5", MarketType::Spread, Side::Home, Some(-2.5), "dk");
    let away_sel = selection_id("G5", MarketType::Spread, Side::Away, Some(2.5), "dk");

    let run = |tick: &str, p_adjusted: f64, injury_uncertainty: f64, preference: &str| {
        let context = setup_context(&pipe, "G5", Sport::Nba, tick);
        let sim = proposed_result(&context.context_hash, MarketType::Spread, "G5", p_adjusted, 0.50, Some(-2.5), preference, 0.3);
        let mut inputs = std::collections::HashMap::new();
        inputs.insert(MarketType::Spread, market_input(Some(-2.5), -110, 220.0, 11.0, injury_uncertainty, 1));
        pipe.run(&context, vec![sim], &inputs).unwrap()
    };

    // sim1, sim2: LEAN home, twice in a row -> 2-of-3 confirmation opens PENDING.
    run("ctx1", 0.555, 0.05, &home_sel);
    run("ctx2", 0.555, 0.05, &home_sel);
    let chain = pipe.decision_store.get_signal_chain("G5", MarketType::Spread).unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].state, linewatch_core::model::SignalState::Pending);
    assert_eq!(chain[0].selection_id, home_sel);

    // sim3: still home, now EDGE -> confirms the pending chain.
    run("ctx3", 0.60, 0.05, &home_sel);
    let chain = pipe.decision_store.get_signal_chain("G5", MarketType::Spread).unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.last().unwrap().state, linewatch_core::model::SignalState::ActiveEdge);

    // sim4: roster change blows through NBA's injury-uncertainty ceiling ->
    // INVALIDATED with reason ROSTER_CHANGE, side unchanged.
    let outcome4 = run("ctx4", 0.60, 0.20, &home_sel);
    let spread4 = outcome4.game_decisions.spread.unwrap();
    assert_eq!(spread4.classification, Tier::Blocked);
    assert!(spread4.reasons.contains(&"ROSTER_CHANGE".to_string()));
    let chain = pipe.decision_store.get_signal_chain("G5", MarketType::Spread).unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.last().unwrap().state, linewatch_core::model::SignalState::Invalidated);
    assert_eq!(chain.last().unwrap().reason, Some("ROSTER_CHANGE".to_string()));
    assert_eq!(chain.last().unwrap().selection_id, home_sel);

    // sim5: away now favored, but a single confirming sim must not reactivate
    // or mutate the invalidated chain.
    run("ctx5", 0.60, 0.05, &away_sel);
    let chain = pipe.decision_store.get_signal_chain("G5", MarketType::Spread).unwrap();
    assert_eq!(chain.len(), 3, "a lone away sim must not touch the invalidated chain");
    assert_eq!(chain.last().unwrap().state, linewatch_core::model::SignalState::Invalidated);

    // sim6: away confirms a second time -> fresh PENDING chain on the away side.
    run("ctx6", 0.60, 0.05, &away_sel);
    let chain = pipe.decision_store.get_signal_chain("G5", MarketType::Spread).unwrap();
    assert_eq!(chain.len(), 4);
    let fresh = chain.last().unwrap();
    assert_eq!(fresh.state, linewatch_core::model::SignalState::Pending);
    assert_eq!(fresh.selection_id, away_sel);
    assert_eq!(fresh.previous_signal_id, None);
}

/// §4.D contract check: a proposal referencing a context_hash the pipeline
/// never registered must BLOCK that market, not flow through to an
/// APPROVED edge.
#[test]
fn unregistered_context_hash_blocks_instead_of_approving() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let pipe = pipeline(tmp.path().to_str().unwrap());
    let context = setup_context(&pipe, "G7", Sport::Mlb, "ctx7");

    let home_sel = selection_id("G7", MarketType::Moneyline2Way, Side::Home, None, "dk");
    let p_raw = 0.5 + (0.66 - 0.5) / 0.7;
    // context_hash does not match anything SimulationIngest can resolve.
    let sim = proposed_result("never-registered", MarketType::Moneyline2Way, "G7", p_raw, 0.60, None, &home_sel, 0.05);
    let mut inputs = std::collections::HashMap::new();
    inputs.insert(MarketType::Moneyline2Way, market_input(None, -150, 8.5, 1.0, 0.05, 1));

    let outcome = pipe.run(&context, vec![sim], &inputs).unwrap();

    let ml = outcome.game_decisions.moneyline.expect("a BLOCKED decision is still produced");
    assert_eq!(ml.classification, Tier::Blocked);
    assert_eq!(ml.release_status, ReleaseStatus::BlockedByIntegrity);
    assert!(ml.reasons.contains(&"CONTEXT_HASH_MISMATCH".to_string()));
    assert_eq!(ml.recommended_selection_id, None);
}

/// §4.D contract check: proposed team keys that don't match the bound odds
/// snapshot must BLOCK, even though the probabilities and context_hash are
/// otherwise fine.
#[test]
fn mismatched_team_key_blocks_instead_of_approving() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let pipe = pipeline(tmp.path().to_str().unwrap());
    let context = setup_context(&pipe, "G8", Sport::Mlb, "ctx8");

    let home_sel = selection_id("G8", MarketType::Moneyline2Way, Side::Home, None, "dk");
    let p_raw = 0.5 + (0.66 - 0.5) / 0.7;
    let mut sim = proposed_result(&context.context_hash, MarketType::Moneyline2Way, "G8", p_raw, 0.60, None, &home_sel, 0.05);
    sim.home_team_key = "WRONG".into();
    let mut inputs = std::collections::HashMap::new();
    inputs.insert(MarketType::Moneyline2Way, market_input(None, -150, 8.5, 1.0, 0.05, 1));

    let outcome = pipe.run(&context, vec![sim], &inputs).unwrap();

    let ml = outcome.game_decisions.moneyline.expect("a BLOCKED decision is still produced");
    assert_eq!(ml.classification, Tier::Blocked);
    assert!(ml.reasons.contains(&"MALFORMED_COMPETITORS".to_string()));
}

/// §4.C/§4.H: a `model_preference_selection_id` absent from the market's
/// own generated selections must BLOCK rather than be promoted to
/// `recommended_selection_id`, even when everything else about the
/// proposal would otherwise classify as EDGE.
#[test]
fn foreign_preference_selection_id_is_blocked() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let pipe = pipeline(tmp.path().to_str().unwrap());
    let context = setup_context(&pipe, "G9", Sport::Mlb, "ctx9");

    let p_raw = 0.5 + (0.66 - 0.5) / 0.7;
    let foreign_sel = selection_id("OTHER_GAME", MarketType::Moneyline2Way, Side::Home, None, "fd");
    let sim = proposed_result(&context.context_hash, MarketType::Moneyline2Way, "G9", p_raw, 0.60, None, &foreign_sel, 0.05);
    let mut inputs = std::collections::HashMap::new();
    inputs.insert(MarketType::Moneyline2Way, market_input(None, -150, 8.5, 1.0, 0.05, 1));

    let outcome = pipe.run(&context, vec![sim], &inputs).unwrap();

    let ml = outcome.game_decisions.moneyline.expect("moneyline decision produced");
    assert_eq!(ml.classification, Tier::Blocked);
    assert_eq!(ml.release_status, ReleaseStatus::BlockedByIntegrity);
    assert!(ml.reasons.contains(&"MALFORMED_COMPETITORS".to_string()));
    assert_eq!(ml.recommended_selection_id, None);
}
