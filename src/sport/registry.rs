use super::{
    BaselineClampLimits, DistributionSanityRules, EliteOverrideThresholds, MarketSettlement,
    MarketType, Sport, SportConfig, VarianceBands,
};
use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;

/// Pure lookup by sport key, built once at boot from the locked table below
/// and shared read-only for the lifetime of the process.
pub struct SportConfigRegistry {
    configs: HashMap<Sport, SportConfig>,
}

impl SportConfigRegistry {
    /// Builds the registry from the locked institutional-grade constants.
    /// These are the same numbers carried by the original service's
    /// `SPORT_CONFIGS` table; sport-specific env overrides, if any, are
    /// applied on top by the caller before wrapping this in an `Arc`.
    pub fn locked() -> Self {
        let mut configs = HashMap::new();
        for cfg in [
            nfl(),
            ncaaf(),
            nba(),
            ncaab(),
            mlb(),
            nhl(),
        ] {
            configs.insert(cfg.sport, cfg);
        }
        Self { configs }
    }

    pub fn config_for(&self, sport: Sport) -> &SportConfig {
        self.configs
            .get(&sport)
            .expect("locked registry covers every Sport variant")
    }

    pub fn try_config_for(&self, sport_key: &str) -> EngineResult<&SportConfig> {
        let sport =
            Sport::from_sport_key(sport_key).ok_or_else(|| EngineError::UnknownSport(sport_key.to_string()))?;
        Ok(self.config_for(sport))
    }

    /// Fails with `MARKET_CONTRACT_MISMATCH` when the (sport, market_type,
    /// settlement) tuple is not a legal combination for this sport.
    pub fn validate_market_contract(
        &self,
        sport: Sport,
        market_type: MarketType,
        settlement: MarketSettlement,
    ) -> EngineResult<()> {
        let cfg = self.config_for(sport);
        if cfg
            .supported_markets
            .iter()
            .any(|(mt, s)| *mt == market_type && *s == settlement)
        {
            Ok(())
        } else {
            Err(EngineError::MarketContractMismatch {
                sport: sport.to_string(),
                market_type: market_type.to_string(),
                settlement: settlement.to_string(),
            })
        }
    }

    /// Key numbers used by the classifier's key-number protection (NFL,
    /// NCAAF, NCAAB spreads cluster around these values).
    pub fn key_numbers_for(&self, sport: Sport) -> &[i32] {
        &self.config_for(sport).distribution_sanity.key_numbers
    }
}

fn full_and_regulation(market_types: &[MarketType]) -> Vec<(MarketType, MarketSettlement)> {
    market_types
        .iter()
        .flat_map(|mt| {
            [
                (*mt, MarketSettlement::FullGame),
                (*mt, MarketSettlement::Regulation),
            ]
        })
        .collect()
}

fn nfl() -> SportConfig {
    SportConfig {
        sport: Sport::Nfl,
        soft_deviation: 4.5,
        hard_deviation: 7.5,
        min_publish_probability: 0.58,
        min_ev_vs_vig_pct: 2.0,
        min_model_vegas_diff: 2.5,
        variance_bands: VarianceBands {
            normal_z: 1.05,
            high_z: 1.25,
            extreme_z: 1.40,
        },
        elite_override: EliteOverrideThresholds {
            min_probability: 0.62,
            max_z_variance: 1.15,
            min_data_quality: 0.95,
            max_injury_uncertainty: 0.15,
        },
        baseline_clamp: BaselineClampLimits {
            max_bias_vs_actual: 1.5,
            max_bias_vs_market: 1.0,
            max_over_rate: 0.62,
            calibration_window_days: 28,
        },
        edge_min_prob: 0.05,
        edge_min_ev_pct: 0.0,
        lean_min_prob: 0.025,
        lean_min_ev_pct: -0.5,
        aligned_tol_points: 0.5,
        aligned_tol_prob: 0.01,
        primary_market: MarketType::Spread,
        compression_factor: 1.0,
        volatility_ceiling: 1.40,
        distribution_sanity: DistributionSanityRules {
            max_ot_frequency: None,
            max_one_goal_game_frequency: None,
            key_numbers: vec![3, 7, 10],
            key_number_buffer: 1.0,
        },
        supported_markets: full_and_regulation(&[MarketType::Spread, MarketType::Moneyline2Way, MarketType::Total]),
        max_odds_age_hours: 72.0,
        live_market_max_age_minutes: 10.0,
        line_validity_range: (30.0, 70.0),
        confirmation_n: 2,
        confirmation_m: 3,
    }
}

fn ncaaf() -> SportConfig {
    SportConfig {
        sport: Sport::Ncaaf,
        soft_deviation: 6.5,
        hard_deviation: 10.5,
        min_publish_probability: 0.57,
        min_ev_vs_vig_pct: 1.5,
        min_model_vegas_diff: 3.0,
        variance_bands: VarianceBands {
            normal_z: 1.05,
            high_z: 1.25,
            extreme_z: 1.40,
        },
        elite_override: EliteOverrideThresholds {
            min_probability: 0.61,
            max_z_variance: 1.15,
            min_data_quality: 0.95,
            max_injury_uncertainty: 0.20,
        },
        baseline_clamp: BaselineClampLimits {
            max_bias_vs_actual: 1.5,
            max_bias_vs_market: 1.0,
            max_over_rate: 0.62,
            calibration_window_days: 28,
        },
        edge_min_prob: 0.05,
        edge_min_ev_pct: 0.0,
        lean_min_prob: 0.025,
        lean_min_ev_pct: -0.5,
        aligned_tol_points: 0.5,
        aligned_tol_prob: 0.01,
        primary_market: MarketType::Spread,
        compression_factor: 1.0,
        volatility_ceiling: 1.40,
        distribution_sanity: DistributionSanityRules {
            max_ot_frequency: None,
            max_one_goal_game_frequency: None,
            key_numbers: vec![3, 7, 10],
            key_number_buffer: 1.0,
        },
        supported_markets: full_and_regulation(&[MarketType::Spread, MarketType::Moneyline2Way, MarketType::Total]),
        max_odds_age_hours: 72.0,
        live_market_max_age_minutes: 10.0,
        line_validity_range: (35.0, 85.0),
        confirmation_n: 2,
        confirmation_m: 3,
    }
}

fn nba() -> SportConfig {
    SportConfig {
        sport: Sport::Nba,
        soft_deviation: 6.0,
        hard_deviation: 9.5,
        min_publish_probability: 0.57,
        min_ev_vs_vig_pct: 1.5,
        min_model_vegas_diff: 3.0,
        variance_bands: VarianceBands {
            normal_z: 1.05,
            high_z: 1.25,
            extreme_z: 1.40,
        },
        elite_override: EliteOverrideThresholds {
            min_probability: 0.61,
            max_z_variance: 1.15,
            min_data_quality: 0.95,
            max_injury_uncertainty: 0.15,
        },
        baseline_clamp: BaselineClampLimits {
            max_bias_vs_actual: 1.5,
            max_bias_vs_market: 1.0,
            max_over_rate: 0.62,
            calibration_window_days: 28,
        },
        edge_min_prob: 0.05,
        edge_min_ev_pct: 0.0,
        lean_min_prob: 0.025,
        lean_min_ev_pct: -0.5,
        aligned_tol_points: 0.5,
        aligned_tol_prob: 0.01,
        primary_market: MarketType::Spread,
        compression_factor: 1.0,
        volatility_ceiling: 1.40,
        distribution_sanity: DistributionSanityRules {
            max_ot_frequency: None,
            max_one_goal_game_frequency: None,
            key_numbers: vec![],
            key_number_buffer: 0.0,
        },
        supported_markets: full_and_regulation(&[MarketType::Spread, MarketType::Moneyline2Way, MarketType::Total]),
        max_odds_age_hours: 24.0,
        live_market_max_age_minutes: 10.0,
        line_validity_range: (180.0, 260.0),
        confirmation_n: 2,
        confirmation_m: 3,
    }
}

fn ncaab() -> SportConfig {
    SportConfig {
        sport: Sport::Ncaab,
        soft_deviation: 5.5,
        hard_deviation: 9.0,
        min_publish_probability: 0.565,
        min_ev_vs_vig_pct: 1.25,
        min_model_vegas_diff: 2.5,
        variance_bands: VarianceBands {
            normal_z: 1.05,
            high_z: 1.25,
            extreme_z: 1.40,
        },
        elite_override: EliteOverrideThresholds {
            min_probability: 0.605,
            max_z_variance: 1.15,
            min_data_quality: 0.95,
            max_injury_uncertainty: 0.20,
        },
        baseline_clamp: BaselineClampLimits {
            max_bias_vs_actual: 1.5,
            max_bias_vs_market: 1.0,
            max_over_rate: 0.62,
            calibration_window_days: 28,
        },
        edge_min_prob: 0.05,
        edge_min_ev_pct: 0.0,
        lean_min_prob: 0.025,
        lean_min_ev_pct: -0.5,
        aligned_tol_points: 0.5,
        aligned_tol_prob: 0.01,
        primary_market: MarketType::Spread,
        compression_factor: 1.0,
        volatility_ceiling: 1.40,
        distribution_sanity: DistributionSanityRules {
            max_ot_frequency: None,
            max_one_goal_game_frequency: None,
            key_numbers: vec![3],
            key_number_buffer: 0.5,
        },
        supported_markets: full_and_regulation(&[MarketType::Spread, MarketType::Moneyline2Way, MarketType::Total]),
        max_odds_age_hours: 36.0,
        live_market_max_age_minutes: 10.0,
        line_validity_range: (110.0, 180.0),
        confirmation_n: 2,
        confirmation_m: 3,
    }
}

fn mlb() -> SportConfig {
    SportConfig {
        sport: Sport::Mlb,
        soft_deviation: 0.9,
        hard_deviation: 1.5,
        min_publish_probability: 0.56,
        min_ev_vs_vig_pct: 1.25,
        min_model_vegas_diff: 0.6,
        variance_bands: VarianceBands {
            normal_z: 1.05,
            high_z: 1.25,
            extreme_z: 1.35,
        },
        elite_override: EliteOverrideThresholds {
            min_probability: 0.60,
            max_z_variance: 1.10,
            min_data_quality: 0.95,
            max_injury_uncertainty: 0.10,
        },
        baseline_clamp: BaselineClampLimits {
            max_bias_vs_actual: 0.25,
            max_bias_vs_market: 0.15,
            max_over_rate: 0.62,
            calibration_window_days: 28,
        },
        edge_min_prob: 0.05,
        edge_min_ev_pct: 0.0,
        lean_min_prob: 0.025,
        lean_min_ev_pct: -0.5,
        aligned_tol_points: 0.3,
        aligned_tol_prob: 0.01,
        primary_market: MarketType::Moneyline2Way,
        compression_factor: 0.7,
        volatility_ceiling: 1.35,
        distribution_sanity: DistributionSanityRules {
            max_ot_frequency: None,
            max_one_goal_game_frequency: None,
            key_numbers: vec![],
            key_number_buffer: 0.0,
        },
        supported_markets: full_and_regulation(&[MarketType::Moneyline2Way, MarketType::Total, MarketType::Spread]),
        max_odds_age_hours: 48.0,
        live_market_max_age_minutes: 10.0,
        line_validity_range: (5.0, 14.0),
        confirmation_n: 2,
        confirmation_m: 3,
    }
}

fn nhl() -> SportConfig {
    SportConfig {
        sport: Sport::Nhl,
        soft_deviation: 0.8,
        hard_deviation: 1.3,
        min_publish_probability: 0.56,
        min_ev_vs_vig_pct: 1.25,
        min_model_vegas_diff: 0.6,
        variance_bands: VarianceBands {
            normal_z: 1.05,
            high_z: 1.25,
            extreme_z: 1.35,
        },
        elite_override: EliteOverrideThresholds {
            min_probability: 0.60,
            max_z_variance: 1.10,
            min_data_quality: 0.95,
            max_injury_uncertainty: 0.10,
        },
        baseline_clamp: BaselineClampLimits {
            max_bias_vs_actual: 0.20,
            max_bias_vs_market: 0.15,
            max_over_rate: 0.62,
            calibration_window_days: 28,
        },
        edge_min_prob: 0.05,
        edge_min_ev_pct: 0.0,
        lean_min_prob: 0.025,
        lean_min_ev_pct: -0.5,
        aligned_tol_points: 0.3,
        aligned_tol_prob: 0.01,
        primary_market: MarketType::Moneyline2Way,
        // NHL markets are highly efficient; compress probabilities harder.
        compression_factor: 0.6,
        volatility_ceiling: 1.35,
        distribution_sanity: DistributionSanityRules {
            max_ot_frequency: Some(0.65),
            max_one_goal_game_frequency: Some(0.75),
            key_numbers: vec![],
            key_number_buffer: 0.0,
        },
        supported_markets: full_and_regulation(&[MarketType::Moneyline2Way, MarketType::Total, MarketType::Spread]),
        max_odds_age_hours: 48.0,
        live_market_max_age_minutes: 10.0,
        line_validity_range: (4.0, 9.0),
        confirmation_n: 2,
        confirmation_m: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_sport() {
        let registry = SportConfigRegistry::locked();
        for sport in Sport::ALL {
            let cfg = registry.config_for(sport);
            assert_eq!(cfg.sport, sport);
        }
    }

    #[test]
    fn legal_contract_passes() {
        let registry = SportConfigRegistry::locked();
        assert!(registry
            .validate_market_contract(Sport::Nfl, MarketType::Spread, MarketSettlement::FullGame)
            .is_ok());
    }

    #[test]
    fn illegal_contract_fails_with_mismatch() {
        let registry = SportConfigRegistry::locked();
        let err = registry
            .validate_market_contract(Sport::Nhl, MarketType::Moneyline3Way, MarketSettlement::FullGame)
            .unwrap_err();
        assert_eq!(err.reason_code(), "MARKET_CONTRACT_MISMATCH");
    }

    #[test]
    fn nfl_key_numbers_include_three_seven_ten() {
        let registry = SportConfigRegistry::locked();
        assert_eq!(registry.key_numbers_for(Sport::Nfl), &[3, 7, 10]);
    }
}
