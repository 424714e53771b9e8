//! Calibration Engine (§4.F). Applies, in order: market-anchor penalty,
//! variance gating, probability compression, league baseline clamp.
//! Every numeric threshold comes from `SportConfig`; this module contains
//! no sport-specific branches.

use crate::sport::SportConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EliteOverrideCheck {
    pub probability_ok: bool,
    pub z_variance_ok: bool,
    pub data_quality_ok: bool,
    pub injury_uncertainty_ok: bool,
}

impl EliteOverrideCheck {
    pub fn all_pass(self) -> bool {
        self.probability_ok && self.z_variance_ok && self.data_quality_ok && self.injury_uncertainty_ok
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaselineStats {
    pub bias_vs_actual: f64,
    pub bias_vs_market: f64,
    pub over_rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationInput {
    pub model_value: f64,
    pub market_value: f64,
    pub p_raw: f64,
    pub edge_raw: f64,

    pub model_probability: f64,
    pub current_sigma: f64,
    pub data_quality: f64,
    pub injury_uncertainty: f64,

    pub baseline: BaselineStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationOutput {
    pub p_adjusted: f64,
    pub edge_adjusted: f64,
    pub confidence_label: ConfidenceLabel,
    pub publish: bool,
    pub block_reasons: Vec<String>,
    pub applied_penalties: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLabel {
    High,
    Normal,
    Downgraded,
}

pub fn evaluate_elite_override(cfg: &SportConfig, input: &CalibrationInput) -> EliteOverrideCheck {
    let z_variance = input.current_sigma / cfg.soft_deviation.max(f64::EPSILON);
    EliteOverrideCheck {
        probability_ok: input.model_probability >= cfg.elite_override.min_probability,
        z_variance_ok: z_variance <= cfg.elite_override.max_z_variance,
        data_quality_ok: input.data_quality >= cfg.elite_override.min_data_quality,
        injury_uncertainty_ok: input.injury_uncertainty <= cfg.elite_override.max_injury_uncertainty,
    }
}

/// Runs the full 4-step calibration pipeline for one market.
pub fn calibrate(cfg: &SportConfig, input: CalibrationInput) -> CalibrationOutput {
    let mut block_reasons = Vec::new();
    let mut applied_penalties = BTreeMap::new();
    let mut edge = input.edge_raw;

    // 1. Market-anchor penalty.
    let d = (input.model_value - input.market_value).abs();
    if d > cfg.hard_deviation {
        let elite = evaluate_elite_override(cfg, &input);
        applied_penalties.insert("market_anchor_hard_deviation".to_string(), d);
        if !elite.all_pass() {
            block_reasons.push("MARKET_ANCHOR_HARD_DEVIATION".to_string());
        }
    } else if d > cfg.soft_deviation {
        let span = (cfg.hard_deviation - cfg.soft_deviation).max(f64::EPSILON);
        let penalty_fraction = (d - cfg.soft_deviation) / span;
        edge *= 1.0 - penalty_fraction;
        applied_penalties.insert("market_anchor_soft_penalty".to_string(), penalty_fraction);
    }

    // 2. Variance gating.
    let z_variance = input.current_sigma / cfg.soft_deviation.max(f64::EPSILON);
    let bands = &cfg.variance_bands;
    let (damp, confidence_label) = if z_variance > bands.extreme_z {
        (0.25, ConfidenceLabel::Downgraded)
    } else if z_variance > bands.high_z {
        (0.55, ConfidenceLabel::Downgraded)
    } else if z_variance > bands.normal_z {
        (0.85, ConfidenceLabel::Normal)
    } else {
        (1.0, ConfidenceLabel::High)
    };
    edge *= damp;
    applied_penalties.insert("variance_gating_damp".to_string(), damp);
    if z_variance > bands.extreme_z {
        block_reasons.push("EXTREME_VARIANCE".to_string());
    }

    // 3. Probability compression.
    let p_compressed = 0.5 + (input.p_raw - 0.5) * cfg.compression_factor;
    applied_penalties.insert("compression_factor".to_string(), cfg.compression_factor);

    // 4. League baseline clamp.
    let clamp = &cfg.baseline_clamp;
    let baseline_exceeded = input.baseline.bias_vs_actual.abs() > clamp.max_bias_vs_actual
        || input.baseline.bias_vs_market.abs() > clamp.max_bias_vs_market
        || input.baseline.over_rate > clamp.max_over_rate;
    let p_adjusted = if baseline_exceeded {
        const DAILY_DAMP_FACTOR: f64 = 0.7;
        applied_penalties.insert("baseline_daily_damp".to_string(), DAILY_DAMP_FACTOR);
        block_reasons.push("BASELINE_DRIFT_EXCEEDED".to_string());
        0.5 + (p_compressed - 0.5) * DAILY_DAMP_FACTOR
    } else {
        p_compressed
    };

    let publish = block_reasons.is_empty();

    CalibrationOutput {
        p_adjusted,
        edge_adjusted: edge,
        confidence_label,
        publish,
        block_reasons,
        applied_penalties,
    }
}
