use crate::error::{EngineError, EngineResult};
use crate::hash::canonical_json_hash;
use crate::model::{InjurySnapshot, OddsSnapshot, SimulationContext, SimulationResult};
use crate::sport::MarketType;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::debug;

/// Snapshot & Context Store (§4.B). Writes are idempotent: identical
/// canonical inputs yield identical content hashes, and a second insert of
/// the same content is a no-op.
pub struct ContentStore {
    conn: Arc<Mutex<Connection>>,
}

impl ContentStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn put_odds_snapshot(&self, mut snapshot: OddsSnapshot) -> EngineResult<String> {
        snapshot.content_hash = canonical_json_hash(&HashableOdds(&snapshot));
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO odds_snapshots (content_hash, game_id, sport, captured_at, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.content_hash,
                snapshot.game_id,
                snapshot.sport.to_string(),
                snapshot.captured_at.to_rfc3339(),
                serde_json::to_string(&snapshot)?,
            ],
        )?;
        debug!(content_hash = %snapshot.content_hash, "odds snapshot recorded");
        Ok(snapshot.content_hash)
    }

    pub fn get_odds_snapshot(&self, content_hash: &str) -> EngineResult<Option<OddsSnapshot>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM odds_snapshots WHERE content_hash = ?1",
                [content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    pub fn put_injury_snapshot(&self, mut snapshot: InjurySnapshot) -> EngineResult<String> {
        snapshot.content_hash = canonical_json_hash(&HashableInjury(&snapshot));
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO injury_snapshots (content_hash, team_key, sport, captured_at, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.content_hash,
                snapshot.team_key,
                snapshot.sport.to_string(),
                snapshot.captured_at.to_rfc3339(),
                serde_json::to_string(&snapshot)?,
            ],
        )?;
        Ok(snapshot.content_hash)
    }

    pub fn get_injury_snapshot(&self, content_hash: &str) -> EngineResult<Option<InjurySnapshot>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM injury_snapshots WHERE content_hash = ?1",
                [content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    pub fn put_sim_context(&self, mut context: SimulationContext) -> EngineResult<String> {
        context.context_hash = canonical_json_hash(&context.canonical_fields());
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO sim_contexts (context_hash, game_id, sport, created_at, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                context.context_hash,
                context.game_id,
                context.sport.to_string(),
                context.created_at.to_rfc3339(),
                serde_json::to_string(&context)?,
            ],
        )?;
        Ok(context.context_hash)
    }

    pub fn get_sim_context(&self, context_hash: &str) -> EngineResult<Option<SimulationContext>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM sim_contexts WHERE context_hash = ?1",
                [context_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    /// Rejects a result referencing an unknown context_hash — the
    /// "references an existing context_hash" contract check in §4.D.
    pub fn put_sim_result(&self, result: SimulationResult) -> EngineResult<()> {
        if self.get_sim_context(&result.context_hash)?.is_none() {
            return Err(EngineError::ContextMismatch {
                expected: result.context_hash.clone(),
                actual: "none".to_string(),
            });
        }
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO sim_results (context_hash, market_type, selection_id, created_at_utc, body_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.context_hash,
                result.market_type.to_string(),
                result.selection_id,
                result.created_at_utc.to_rfc3339(),
                serde_json::to_string(&result)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_sim_results_for_context(
        &self,
        context_hash: &str,
        market_type: MarketType,
    ) -> EngineResult<Vec<SimulationResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT body_json FROM sim_results WHERE context_hash = ?1 AND market_type = ?2",
        )?;
        let rows = stmt
            .query_map(params![context_hash, market_type.to_string()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|b| serde_json::from_str(&b).map_err(EngineError::from))
            .collect()
    }
}

/// Wrapper excluding `content_hash` from the hashed representation — the
/// hash must be computed before it's known, not self-referential.
struct HashableOdds<'a>(&'a OddsSnapshot);
impl serde::Serialize for HashableOdds<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("OddsSnapshot", 7)?;
        s.serialize_field("game_id", &self.0.game_id)?;
        s.serialize_field("sport", &self.0.sport)?;
        s.serialize_field("captured_at", &self.0.captured_at)?;
        s.serialize_field("bookmaker_key", &self.0.bookmaker_key)?;
        s.serialize_field("markets", &self.0.markets)?;
        s.serialize_field("home_team_key", &self.0.home_team_key)?;
        s.serialize_field("away_team_key", &self.0.away_team_key)?;
        s.end()
    }
}

struct HashableInjury<'a>(&'a InjurySnapshot);
impl serde::Serialize for HashableInjury<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("InjurySnapshot", 4)?;
        s.serialize_field("team_key", &self.0.team_key)?;
        s.serialize_field("sport", &self.0.sport)?;
        s.serialize_field("captured_at", &self.0.captured_at)?;
        s.serialize_field("entries", &self.0.entries)?;
        s.end()
    }
}
