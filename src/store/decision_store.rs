use crate::error::{EngineError, EngineResult};
use crate::model::{
    CalibrationVersion, Channel, EventResult, GameDecisions, Grading, MarketDecision,
    PublishedPrediction, Signal,
};
use crate::sport::MarketType;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

/// MarketDecision / Signal / PublishedPrediction / Grading collections,
/// owned by the decision pipeline (§3). All writes are insert-only and
/// idempotent; contention is resolved by unique keys, never locks.
pub struct DecisionStore {
    conn: Arc<Mutex<Connection>>,
}

impl DecisionStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Team display names are keyed by game_id, not market_type, so a
    /// single row covers every market — refreshed on every pipeline run
    /// rather than threaded through MarketDecision itself.
    pub fn put_game_meta(&self, game_id: &str, home_team_name: &str, away_team_name: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO game_meta (game_id, home_team_name, away_team_name, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![game_id, home_team_name, away_team_name, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn put_market_decision(&self, decision: &MarketDecision) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO market_decisions
             (game_id, market_type, context_hash, decision_version, computed_at, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                decision.game_id,
                decision.market_type.to_string(),
                decision.context_hash,
                decision.decision_version,
                decision.computed_at.to_rfc3339(),
                serde_json::to_string(decision)?,
            ],
        )?;
        Ok(())
    }

    /// Last `limit` decisions for (game, market_type), oldest first — the
    /// "strict prefix on the immutable sim result log" the confirmation
    /// window is evaluated over (§4.I). Each distinct context_hash a market
    /// has been decided under is its own row, so this reads the full
    /// cross-sim history rather than anything signal-chain-specific.
    pub fn recent_market_decisions(
        &self,
        game_id: &str,
        market_type: MarketType,
        limit: u32,
    ) -> EngineResult<Vec<MarketDecision>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT body_json FROM market_decisions WHERE game_id = ?1 AND market_type = ?2
             ORDER BY computed_at DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![game_id, market_type.to_string(), limit], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut decisions = rows
            .into_iter()
            .map(|b| serde_json::from_str::<MarketDecision>(&b).map_err(EngineError::from))
            .collect::<EngineResult<Vec<_>>>()?;
        decisions.reverse();
        Ok(decisions)
    }

    pub fn get_game_decisions(&self, game_id: &str) -> EngineResult<Option<GameDecisions>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT body_json FROM market_decisions WHERE game_id = ?1
             ORDER BY computed_at DESC",
        )?;
        let mut spread = None;
        let mut moneyline = None;
        let mut total = None;
        let rows = stmt
            .query_map([game_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for body in rows {
            let decision: MarketDecision = serde_json::from_str(&body)?;
            match decision.market_type {
                MarketType::Spread if spread.is_none() => spread = Some(decision),
                MarketType::Moneyline2Way | MarketType::Moneyline3Way if moneyline.is_none() => {
                    moneyline = Some(decision)
                }
                MarketType::Total if total.is_none() => total = Some(decision),
                _ => {}
            }
        }
        if spread.is_none() && moneyline.is_none() && total.is_none() {
            return Ok(None);
        }
        let any = spread.as_ref().or(moneyline.as_ref()).or(total.as_ref()).unwrap();
        let (home_team_name, away_team_name) = conn
            .query_row(
                "SELECT home_team_name, away_team_name FROM game_meta WHERE game_id = ?1",
                [game_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .unwrap_or_default();
        Ok(Some(GameDecisions {
            game_id: game_id.to_string(),
            home_team_name,
            away_team_name,
            inputs_hash: any.inputs_hash.clone(),
            decision_version: any.decision_version,
            computed_at: any.computed_at,
            spread,
            moneyline,
            total,
        }))
    }

    pub fn put_signal(&self, signal: &Signal) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO signals
             (signal_id, previous_signal_id, game_id, market_type, state, created_at, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                signal.signal_id.to_string(),
                signal.previous_signal_id.map(|u| u.to_string()),
                signal.game_id,
                signal.market_type.to_string(),
                format!("{:?}", signal.state),
                signal.created_at.to_rfc3339(),
                serde_json::to_string(signal)?,
            ],
        )?;
        Ok(())
    }

    /// The current chain for (game, market_type): every record, oldest
    /// first, so callers can fold to the latest state or walk history.
    pub fn get_signal_chain(
        &self,
        game_id: &str,
        market_type: MarketType,
    ) -> EngineResult<Vec<Signal>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT body_json FROM signals WHERE game_id = ?1 AND market_type = ?2
             ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![game_id, market_type.to_string()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|b| serde_json::from_str(&b).map_err(Into::into))
            .collect()
    }

    /// Idempotent per (prediction_id, channel): a second publish with the
    /// same key returns the existing record rather than inserting again.
    pub fn publish(&self, prediction: &PublishedPrediction) -> EngineResult<PublishedPrediction> {
        let conn = self.conn.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT body_json FROM published_predictions WHERE prediction_id = ?1 AND channel = ?2",
                params![prediction.prediction_id.to_string(), format!("{:?}", prediction.channel).to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(body) = existing {
            return Ok(serde_json::from_str(&body)?);
        }
        conn.execute(
            "INSERT INTO published_predictions (prediction_id, channel, is_official, published_at, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                prediction.prediction_id.to_string(),
                format!("{:?}", prediction.channel).to_lowercase(),
                prediction.is_official as i64,
                prediction.published_at.to_rfc3339(),
                serde_json::to_string(prediction)?,
            ],
        )?;
        Ok(prediction.clone())
    }

    pub fn void_publish(&self, prediction_id: &str, channel: Channel, reason: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM published_predictions WHERE prediction_id = ?1 AND channel = ?2",
                params![prediction_id, format!("{channel:?}").to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(body) = body {
            let mut record: PublishedPrediction = serde_json::from_str(&body)?;
            record.is_official = false;
            record.void_reason = Some(reason.to_string());
            conn.execute(
                "UPDATE published_predictions SET is_official = 0, body_json = ?3
                 WHERE prediction_id = ?1 AND channel = ?2",
                params![
                    prediction_id,
                    format!("{channel:?}").to_lowercase(),
                    serde_json::to_string(&record)?,
                ],
            )?;
        }
        Ok(())
    }

    /// Every official, currently-published prediction for a game, across
    /// channels — the grading job's entry point into §4.K step 1.
    pub fn published_predictions_for_game(&self, game_id: &str) -> EngineResult<Vec<PublishedPrediction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT body_json FROM published_predictions WHERE is_official = 1")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
        let all: Vec<PublishedPrediction> = rows
            .into_iter()
            .map(|b| serde_json::from_str(&b).map_err(EngineError::from))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(all.into_iter().filter(|p| p.game_id == game_id).collect())
    }

    pub fn put_event_result(&self, result: &EventResult) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO event_results (game_id, body_json) VALUES (?1, ?2)",
            params![result.game_id, serde_json::to_string(result)?],
        )?;
        Ok(())
    }

    pub fn get_event_result(&self, game_id: &str) -> EngineResult<Option<EventResult>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM event_results WHERE game_id = ?1",
                [game_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    pub fn put_grading(&self, grading: &Grading) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO gradings (prediction_id, game_id, graded_at, body_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                grading.prediction_id.to_string(),
                grading.game_id,
                grading.graded_at.to_rfc3339(),
                serde_json::to_string(grading)?,
            ],
        )?;
        Ok(())
    }

    pub fn gradings_for_sport_since(
        &self,
        since: chrono::DateTime<chrono::Utc>,
    ) -> EngineResult<Vec<Grading>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT body_json FROM gradings WHERE graded_at >= ?1")?;
        let rows = stmt
            .query_map([since.to_rfc3339()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|b| serde_json::from_str(&b).map_err(Into::into))
            .collect()
    }

    pub fn put_calibration_version(&self, version: &CalibrationVersion) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO calibration_versions (version, fitted_at, promoted_at, body_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                version.version,
                version.fitted_at.to_rfc3339(),
                version.promoted_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(version)?,
            ],
        )?;
        Ok(())
    }
}
