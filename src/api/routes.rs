//! Produced HTTP interfaces (§6 "Produced interfaces"): the game_decisions
//! bundle, the market_state_registry visibility contract, and the meta
//! endpoint. Every handler fails closed — a missing or incomplete decision
//! never falls back to a guess, it returns 503.

use axum::{
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::publisher::{tier_visibility, TierVisibility, MARKET_STATE_REGISTRY};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GameDecisionsQuery {
    pub league: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn service_unavailable(message: impl Into<String>) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody { error: "SERVICE_UNAVAILABLE", message: message.into() }),
    )
        .into_response()
}

/// `GET /api/v1/games/{game_id}/decisions?league={sport_key}` (§6).
/// Unknown league is a 409-shaped contract error; a known league with no
/// stored decisions yet is fail-closed 503, never a guessed prediction.
pub async fn get_game_decisions(
    Path(game_id): Path<String>,
    Query(params): Query<GameDecisionsQuery>,
    AxumState(state): AxumState<AppState>,
) -> Response {
    if state.sport_registry.try_config_for(&params.league).is_err() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorBody {
                error: "MARKET_CONTRACT_MISMATCH",
                message: format!("unknown league {}", params.league),
            }),
        )
            .into_response();
    }

    match state.decision_store.get_game_decisions(&game_id) {
        Ok(Some(decisions)) => Json(decisions).into_response(),
        Ok(None) => service_unavailable(format!("no decisions computed yet for {game_id}")),
        Err(err) => service_unavailable(err.to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct MarketStateRegistryResponse {
    pub tiers: Vec<TierVisibility>,
}

/// `GET /api/v1/market_state_registry` (§6): the authoritative per-tier
/// visibility contract, independent of any single game's decisions.
pub async fn get_market_state_registry() -> Json<MarketStateRegistryResponse> {
    Json(MarketStateRegistryResponse {
        tiers: MARKET_STATE_REGISTRY.iter().copied().map(tier_visibility).collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub engine_build_id: String,
    pub sim_version: String,
    pub deployed_at: String,
    pub environment: String,
    pub status: &'static str,
}

/// `GET /meta` (§6 "Meta endpoint contract").
pub async fn get_meta(AxumState(state): AxumState<AppState>) -> Json<MetaResponse> {
    Json(MetaResponse {
        engine_build_id: state.config.engine_build_id.clone(),
        sim_version: state.config.current_sim_version.clone(),
        deployed_at: state.config.deployed_at.clone(),
        environment: state.config.environment.clone(),
        status: "ok",
    })
}

pub async fn get_healthz() -> &'static str {
    "ok"
}
