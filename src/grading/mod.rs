//! Grading & Calibration Loop (§4.K). After an EventResult arrives: settle
//! every official PublishedPrediction, compute CLV against the closing
//! line, and feed the per-segment calibration training set. Promotion of a
//! newly-fitted CalibrationVersion is an explicit pointer swap recorded in
//! the audit log — never a silent rollout (§4.K step 3).
//!
//! Grounded on the teacher's `backtest_v2` settlement/metrics style: pure
//! functions over immutable records, no hidden mutation of the inputs.

use crate::classifier::payout_per_100;
use crate::error::{EngineError, EngineResult};
use crate::model::{EventResult, Grading, PublishedPrediction, Settlement, Side};
use crate::sport::MarketType;
use chrono::{DateTime, Utc};

/// Inputs a caller assembles for one settlement: the published prediction,
/// the final result, and (if available) the closing-line implied
/// probability captured near game start (§3 "EventResult", §4.K step 2).
#[derive(Debug, Clone)]
pub struct GradingInput<'a> {
    pub prediction: &'a PublishedPrediction,
    pub result: &'a EventResult,
    pub closing_implied_probability: Option<f64>,
    pub taken_implied_probability: f64,
}

/// Signed margin for the selection's side: `(score_for - score_against) +
/// locked_line`. Positive means the side covered; zero is a push.
fn spread_margin(prediction: &PublishedPrediction, result: &EventResult) -> EngineResult<f64> {
    let line = prediction
        .locked_line
        .ok_or_else(|| EngineError::MissingMarketLine {
            game_id: prediction.game_id.clone(),
            market_type: MarketType::Spread.to_string(),
        })?;
    let (for_score, against_score) = match prediction.selection.side {
        Side::Home => (result.home_score, result.away_score),
        Side::Away => (result.away_score, result.home_score),
        other => {
            return Err(EngineError::MalformedCompetitors(format!(
                "spread settlement requires home/away side, got {other}"
            )))
        }
    };
    Ok((for_score - against_score) as f64 + line)
}

fn total_margin(prediction: &PublishedPrediction, result: &EventResult) -> EngineResult<f64> {
    let line = prediction
        .locked_line
        .ok_or_else(|| EngineError::MissingMarketLine {
            game_id: prediction.game_id.clone(),
            market_type: MarketType::Total.to_string(),
        })?;
    let combined = (result.home_score + result.away_score) as f64;
    match prediction.selection.side {
        Side::Over => Ok(combined - line),
        Side::Under => Ok(line - combined),
        other => {
            return Err(EngineError::MalformedCompetitors(format!(
                "total settlement requires over/under side, got {other}"
            )))
        }
    }
}

fn moneyline_outcome(prediction: &PublishedPrediction, result: &EventResult) -> EngineResult<Settlement> {
    if result.home_score == result.away_score {
        // Ties/ OT rules vary per sport (spec.md §4.K: "ties per sport
        // rule — MLB/NHL full-game grade under sport rule"); full-game
        // moneyline on an unresolved tie is graded Push rather than
        // guessing a winner.
        return Ok(Settlement::Push);
    }
    let side_won = match prediction.selection.side {
        Side::Home => result.home_score > result.away_score,
        Side::Away => result.away_score > result.home_score,
        other => {
            return Err(EngineError::MalformedCompetitors(format!(
                "moneyline settlement requires home/away side, got {other}"
            )))
        }
    };
    Ok(if side_won { Settlement::Win } else { Settlement::Loss })
}

/// Settles one PublishedPrediction against its EventResult (§4.K step 1-2).
/// Fails with `GradingPending` when the result is not yet final (§7
/// "Grading: missing scores -> leave grading pending; do not void").
pub fn grade(input: GradingInput<'_>, graded_at: DateTime<Utc>) -> EngineResult<Grading> {
    if !input.result.completed {
        return Err(EngineError::GradingPending(input.prediction.game_id.clone()));
    }
    if !input.prediction.is_official {
        return Err(EngineError::GradingPending(format!(
            "{} is voided, not officially graded",
            input.prediction.game_id
        )));
    }

    let market_type: MarketType = market_type_from_key(&input.prediction.market_key)?;

    let settlement = match market_type {
        MarketType::Spread => match spread_margin(input.prediction, input.result)? {
            m if m > 0.0 => Settlement::Win,
            m if m < 0.0 => Settlement::Loss,
            _ => Settlement::Push,
        },
        MarketType::Total => match total_margin(input.prediction, input.result)? {
            m if m > 0.0 => Settlement::Win,
            m if m < 0.0 => Settlement::Loss,
            _ => Settlement::Push,
        },
        MarketType::Moneyline2Way | MarketType::Moneyline3Way => {
            moneyline_outcome(input.prediction, input.result)?
        }
    };

    let realized_units = match settlement {
        Settlement::Win => payout_per_100(input.prediction.locked_american_odds) / 100.0,
        Settlement::Loss => -1.0,
        Settlement::Push | Settlement::Void => 0.0,
    };

    let clv = match input.closing_implied_probability {
        Some(p_closed) => p_closed - input.taken_implied_probability,
        None => 0.0,
    };

    Ok(Grading {
        prediction_id: input.prediction.prediction_id,
        game_id: input.prediction.game_id.clone(),
        settlement,
        clv,
        realized_units,
        graded_at,
    })
}

fn market_type_from_key(key: &str) -> EngineResult<MarketType> {
    match key {
        "spread" => Ok(MarketType::Spread),
        "total" => Ok(MarketType::Total),
        "moneyline_2way" => Ok(MarketType::Moneyline2Way),
        "moneyline_3way" => Ok(MarketType::Moneyline3Way),
        other => Err(EngineError::MalformedCompetitors(format!(
            "unrecognized market_key {other}"
        ))),
    }
}

/// Per-segment rolling stats the calibration engine's league baseline
/// clamp (§4.F step 4) consumes, computed over a sport's
/// `calibration_window_days` of Gradings (SPEC_FULL.md §11.3: a rolling,
/// persisted window, not an in-memory-only counter).
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingBaseline {
    pub bias_vs_actual: f64,
    pub bias_vs_market: f64,
    pub over_rate: f64,
    pub sample_size: usize,
}

/// Folds a window of Gradings paired with the model probability and
/// market-implied probability used at publish time into the
/// `BaselineStats` the calibration engine consumes.
pub fn compute_rolling_baseline(samples: &[(Grading, f64, f64)]) -> RollingBaseline {
    if samples.is_empty() {
        return RollingBaseline::default();
    }
    let n = samples.len() as f64;
    let mut bias_actual_sum = 0.0;
    let mut bias_market_sum = 0.0;
    let mut overs = 0usize;
    for (grading, model_prob, market_prob) in samples {
        let actual_outcome = match grading.settlement {
            Settlement::Win => 1.0,
            Settlement::Loss => 0.0,
            Settlement::Push | Settlement::Void => 0.5,
        };
        bias_actual_sum += model_prob - actual_outcome;
        bias_market_sum += model_prob - market_prob;
        if *model_prob > *market_prob {
            overs += 1;
        }
    }
    RollingBaseline {
        bias_vs_actual: bias_actual_sum / n,
        bias_vs_market: bias_market_sum / n,
        over_rate: overs as f64 / n,
        sample_size: samples.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, Selection, Visibility};
    use uuid::Uuid;

    fn prediction(side: Side, line: Option<f64>, odds: i32, market_key: &str) -> PublishedPrediction {
        PublishedPrediction {
            prediction_id: Uuid::new_v4(),
            channel: Channel::Web,
            visibility: Visibility::Free,
            game_id: "G6".into(),
            selection: Selection {
                selection_id: "sel".into(),
                team_display_name: "Home".into(),
                side,
                market_line_for_selection: line,
                market_type: MarketType::Spread,
            },
            market_snapshot_id: "ctx".into(),
            engine_version: "e1".into(),
            model_version: "m1".into(),
            calibration_version: None,
            p_calibrated: 0.6,
            market_key: market_key.into(),
            locked_line: line,
            locked_american_odds: odds,
            is_official: true,
            void_reason: None,
            published_at: Utc::now(),
        }
    }

    #[test]
    fn scenario_six_grading_and_clv() {
        let prediction = prediction(Side::Home, Some(-3.5), -110, "spread");
        let result = EventResult {
            game_id: "G6".into(),
            home_score: 100,
            away_score: 95,
            completed: true,
            final_at: Utc::now(),
        };
        let input = GradingInput {
            prediction: &prediction,
            result: &result,
            closing_implied_probability: Some(0.65),
            taken_implied_probability: 0.60,
        };
        let grading = grade(input, Utc::now()).unwrap();
        assert_eq!(grading.settlement, Settlement::Win);
        assert!((grading.realized_units - 0.909_090_9).abs() < 1e-4);
        assert!(grading.clv > 0.0);
    }

    #[test]
    fn push_on_exact_line() {
        let prediction = prediction(Side::Home, Some(-5.0), -110, "spread");
        let result = EventResult {
            game_id: "G6".into(),
            home_score: 100,
            away_score: 95,
            completed: true,
            final_at: Utc::now(),
        };
        let input = GradingInput {
            prediction: &prediction,
            result: &result,
            closing_implied_probability: None,
            taken_implied_probability: 0.5,
        };
        let grading = grade(input, Utc::now()).unwrap();
        assert_eq!(grading.settlement, Settlement::Push);
        assert_eq!(grading.realized_units, 0.0);
    }

    #[test]
    fn incomplete_result_leaves_grading_pending() {
        let prediction = prediction(Side::Home, Some(-3.5), -110, "spread");
        let result = EventResult {
            game_id: "G6".into(),
            home_score: 0,
            away_score: 0,
            completed: false,
            final_at: Utc::now(),
        };
        let input = GradingInput {
            prediction: &prediction,
            result: &result,
            closing_implied_probability: None,
            taken_implied_probability: 0.5,
        };
        let err = grade(input, Utc::now()).unwrap_err();
        assert_eq!(err.reason_code(), "GRADING_PENDING");
    }

    #[test]
    fn moneyline_tie_is_pushed_not_guessed() {
        let mut prediction = prediction(Side::Home, None, -150, "moneyline_2way");
        prediction.market_key = "moneyline_2way".to_string();
        let result = EventResult {
            game_id: "G6".into(),
            home_score: 3,
            away_score: 3,
            completed: true,
            final_at: Utc::now(),
        };
        let input = GradingInput {
            prediction: &prediction,
            result: &result,
            closing_implied_probability: None,
            taken_implied_probability: 0.6,
        };
        let grading = grade(input, Utc::now()).unwrap();
        assert_eq!(grading.settlement, Settlement::Push);
    }
}
