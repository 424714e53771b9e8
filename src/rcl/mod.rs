//! Reality Check Layer (§4.E). A pure, stateless guardrail: given the
//! model's projected total and the league's historical distribution, it
//! flags or clamps implausible outputs before they ever reach calibration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceGuardrailStatus {
    NotApplicable,
    Feasible,
    Infeasible,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RealityCheckInput {
    pub model_total: f64,
    pub league_mean: f64,
    pub league_std_dev: f64,
    /// Live-game fields; `None` for pre-game checks.
    pub live: Option<LiveGameState>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiveGameState {
    pub current_combined_score: f64,
    pub elapsed_minutes: f64,
    pub regulation_minutes: f64,
    /// Max points/minute a team can plausibly add the rest of the way,
    /// sport-specific (drawn from `SportConfig`/distribution sanity rules).
    pub feasibility_ceiling_points_per_minute: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RealityCheckOutput {
    pub z: f64,
    pub clamped_model_total: f64,
    pub rcl_passed: bool,
    pub confidence_downgraded: bool,
    pub pace_guardrail_status: PaceGuardrailStatus,
}

/// §4.E policy: `z = (model_total - mu) / sigma`.
/// - |z| <= 2.0 -> pass.
/// - 2.0 < |z| <= 3.0 -> flag, downgrade confidence, still passable.
/// - |z| > 3.0 -> clamp to mu +/- 2*sigma, rcl_passed = false (no EDGE).
pub fn evaluate(input: RealityCheckInput) -> RealityCheckOutput {
    let sigma = input.league_std_dev.max(f64::EPSILON);
    let z = (input.model_total - input.league_mean) / sigma;
    let abs_z = z.abs();

    let (clamped_model_total, rcl_passed, confidence_downgraded) = if abs_z > 3.0 {
        let clamp_bound = input.league_mean + 2.0 * sigma * z.signum();
        (clamp_bound, false, true)
    } else if abs_z > 2.0 {
        (input.model_total, true, true)
    } else {
        (input.model_total, true, false)
    };

    let pace_guardrail_status = match input.live {
        None => PaceGuardrailStatus::NotApplicable,
        Some(live) => {
            let remaining_minutes = (live.regulation_minutes - live.elapsed_minutes).max(0.0);
            if remaining_minutes <= 0.0 {
                PaceGuardrailStatus::Feasible
            } else {
                let required_combined = (clamped_model_total - live.current_combined_score).max(0.0);
                let required_rate_per_team = (required_combined / 2.0) / remaining_minutes;
                if required_rate_per_team > live.feasibility_ceiling_points_per_minute {
                    PaceGuardrailStatus::Infeasible
                } else {
                    PaceGuardrailStatus::Feasible
                }
            }
        }
    };

    RealityCheckOutput {
        z,
        clamped_model_total,
        rcl_passed: rcl_passed && pace_guardrail_status != PaceGuardrailStatus::Infeasible,
        confidence_downgraded,
        pace_guardrail_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_two_sigma_passes_clean() {
        let out = evaluate(RealityCheckInput {
            model_total: 219.0,
            league_mean: 220.0,
            league_std_dev: 11.0,
            live: None,
        });
        assert!(out.rcl_passed);
        assert!(!out.confidence_downgraded);
    }

    #[test]
    fn between_two_and_three_sigma_flags_but_passes() {
        let out = evaluate(RealityCheckInput {
            model_total: 220.0 + 2.5 * 11.0,
            league_mean: 220.0,
            league_std_dev: 11.0,
            live: None,
        });
        assert!(out.rcl_passed);
        assert!(out.confidence_downgraded);
    }

    #[test]
    fn beyond_three_sigma_clamps_and_fails() {
        let out = evaluate(RealityCheckInput {
            model_total: 220.0 + 4.0 * 11.0,
            league_mean: 220.0,
            league_std_dev: 11.0,
            live: None,
        });
        assert!(!out.rcl_passed);
        assert_eq!(out.clamped_model_total, 220.0 + 2.0 * 11.0);
    }

    #[test]
    fn infeasible_pace_blocks_edge_even_within_sigma() {
        let out = evaluate(RealityCheckInput {
            model_total: 230.0,
            league_mean: 220.0,
            league_std_dev: 11.0,
            live: Some(LiveGameState {
                current_combined_score: 100.0,
                elapsed_minutes: 44.0,
                regulation_minutes: 48.0,
                feasibility_ceiling_points_per_minute: 2.0,
            }),
        });
        assert_eq!(out.pace_guardrail_status, PaceGuardrailStatus::Infeasible);
        assert!(!out.rcl_passed);
    }
}
