//! Edge / Tier Classifier (§4.G). Sole inputs: probability edge, EV at
//! offered American odds, data integrity flags. CLV, market movement,
//! volatility label, and market-efficiency heuristics never alter the
//! tier — they are metadata only, consumed by the signal lifecycle.
//!
//! EV formulas grounded on the original `ev_calculator.py` and styled on
//! the teacher's `arbitrage/fees.rs` (plain pure functions, inline tests).

use crate::model::Tier;
use crate::sport::{MarketType, SportConfig};

/// Payout per $100 staked for American odds (§6 bit-exact format):
/// negative odds pay `10000/|odds|`; positive odds pay `odds`.
pub fn payout_per_100(american_odds: i32) -> f64 {
    if american_odds < 0 {
        10_000.0 / (american_odds.unsigned_abs() as f64)
    } else {
        american_odds as f64
    }
}

/// American odds -> implied probability (vig-inclusive).
pub fn american_odds_to_implied_prob(american_odds: i32) -> f64 {
    if american_odds < 0 {
        let abs = american_odds.unsigned_abs() as f64;
        abs / (abs + 100.0)
    } else {
        100.0 / (american_odds as f64 + 100.0)
    }
}

/// 2-way EV per $100 staked: `p_win * payout - p_loss * 100`.
pub fn compute_ev_2way(p_win: f64, american_odds: i32) -> f64 {
    let payout = payout_per_100(american_odds);
    let p_loss = 1.0 - p_win;
    p_win * payout - p_loss * 100.0
}

/// 3-way EV: draw counts as a loss against the stake, same as any other
/// non-winning outcome.
pub fn compute_ev_3way(p_win: f64, p_draw: f64, american_odds: i32) -> f64 {
    let payout = payout_per_100(american_odds);
    let p_loss = 1.0 - p_win - p_draw;
    p_win * payout - (p_loss + p_draw) * 100.0
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput {
    pub market_type: MarketType,
    pub prob_edge: f64,
    pub ev_pct: f64,
    pub calibration_publish: bool,
    pub rcl_passed: bool,
    pub variance_downgraded: bool,
    pub integrity_failure: bool,
    pub edge_points: f64,
}

#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub tier: Tier,
    pub reasons: Vec<String>,
}

/// Classifies one market per §4.G's rules, including NFL/NCAAF/NCAAB
/// key-number protection (downgrades EDGE -> LEAN).
pub fn classify(
    cfg: &SportConfig,
    input: ClassifierInput,
    model_line: Option<f64>,
    market_line: Option<f64>,
) -> ClassificationOutcome {
    let mut reasons = Vec::new();

    if input.integrity_failure {
        reasons.push("INTEGRITY_FAILURE".to_string());
        return ClassificationOutcome {
            tier: Tier::Blocked,
            reasons,
        };
    }

    let abs_edge = input.prob_edge.abs();

    let mut tier = if abs_edge >= cfg.edge_min_prob
        && input.ev_pct >= cfg.edge_min_ev_pct
        && input.calibration_publish
        && input.rcl_passed
        && !input.variance_downgraded
    {
        reasons.push("EDGE_PROBABILITY_PASS".to_string());
        Tier::Edge
    } else if abs_edge >= cfg.lean_min_prob && input.ev_pct >= cfg.lean_min_ev_pct && input.calibration_publish {
        reasons.push("LEAN_PROBABILITY_PASS".to_string());
        Tier::Lean
    } else if input.edge_points.abs() < cfg.aligned_tol_points || abs_edge < cfg.aligned_tol_prob {
        Tier::MarketAligned
    } else {
        Tier::NoPlay
    };

    if tier == Tier::Edge && crosses_key_number_against_model(cfg, model_line, market_line) {
        tier = Tier::Lean;
        reasons.push("KEY_NUMBER_DOWNGRADE".to_string());
    }

    ClassificationOutcome { tier, reasons }
}

/// True when the market line has already crossed a sport key number (lies
/// on the value side) while the model line has not crossed it and sits
/// within the configured buffer of it (§4.G key-number protection): the
/// model's edge hinges on a key number it hasn't confidently cleared.
fn crosses_key_number_against_model(
    cfg: &SportConfig,
    model_line: Option<f64>,
    market_line: Option<f64>,
) -> bool {
    let (Some(model_line), Some(market_line)) = (model_line, market_line) else {
        return false;
    };
    let buffer = cfg.distribution_sanity.key_number_buffer;
    let market_abs = market_line.abs();
    let model_abs = model_line.abs();
    cfg.distribution_sanity.key_numbers.iter().any(|&key| {
        let key = key as f64;
        market_abs > key && model_abs <= key && (key - model_abs) < buffer
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_matches_spec_examples() {
        assert!((payout_per_100(-150) - 66.666_666_67).abs() < 1e-6);
        assert!((payout_per_100(120) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn mlb_moneyline_edge_matches_scenario_four() {
        let ev = compute_ev_2way(0.66, -150);
        assert!((ev - 9.0).abs() < 1e-6, "got {ev}");
    }

    #[test]
    fn three_way_ev_counts_draw_as_a_loss() {
        // Draw counted as loss against stake (spec §4.G): EV should equal
        // the 2-way formula with p_loss widened to include p_draw.
        let ev = compute_ev_3way(0.5, 0.2, 150);
        let expected = 0.5 * payout_per_100(150) - (0.2 + 0.3) * 100.0;
        assert!((ev - expected).abs() < 1e-9);
    }

    #[test]
    fn implied_prob_matches_negative_and_positive_odds() {
        assert!((american_odds_to_implied_prob(-150) - 0.6).abs() < 1e-9);
        assert!((american_odds_to_implied_prob(120) - (100.0 / 220.0)).abs() < 1e-9);
    }

    #[test]
    fn grading_settlement_matches_scenario_six() {
        let payout = payout_per_100(-110);
        assert!((payout - 90.909_090_9).abs() < 1e-4);
    }

    #[test]
    fn key_number_downgrades_edge_to_lean() {
        use crate::sport::SportConfigRegistry;
        let registry = SportConfigRegistry::locked();
        let cfg = registry.config_for(crate::sport::Sport::Nfl);
        let input = ClassifierInput {
            market_type: MarketType::Spread,
            prob_edge: 0.08,
            ev_pct: 3.0,
            calibration_publish: true,
            rcl_passed: true,
            variance_downgraded: false,
            integrity_failure: false,
            edge_points: 3.0,
        };
        let outcome = classify(cfg, input, Some(-2.6), Some(-3.5));
        assert_eq!(outcome.tier, Tier::Lean);
        assert!(outcome.reasons.contains(&"KEY_NUMBER_DOWNGRADE".to_string()));
    }

    #[test]
    fn without_key_number_conflict_stays_edge() {
        use crate::sport::SportConfigRegistry;
        let registry = SportConfigRegistry::locked();
        let cfg = registry.config_for(crate::sport::Sport::Nfl);
        let input = ClassifierInput {
            market_type: MarketType::Spread,
            prob_edge: 0.08,
            ev_pct: 3.0,
            calibration_publish: true,
            rcl_passed: true,
            variance_downgraded: false,
            integrity_failure: false,
            edge_points: 3.0,
        };
        let outcome = classify(cfg, input, Some(-6.0), Some(-5.5));
        assert_eq!(outcome.tier, Tier::Edge);
    }
}
