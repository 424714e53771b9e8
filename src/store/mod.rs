//! Storage layer: document-style SQLite collections with unique indexes on
//! content hashes, event_id, and (prediction_id, channel); an append-only
//! audit collection with a restricted-privilege writer (§4.B, §4.L, §6).
//!
//! Grounded on the teacher's `signals/db_storage.rs`: WAL pragmas, a
//! `Connection` behind `parking_lot::Mutex`, `execute_batch` schema
//! bootstrap, `prepare_cached` query paths.

mod audit_store;
mod content_store;
mod decision_store;

pub use audit_store::AuditStore;
pub use content_store::ContentStore;
pub use decision_store::DecisionStore;

use rusqlite::{Connection, OpenFlags};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS odds_snapshots (
    content_hash TEXT PRIMARY KEY,
    game_id TEXT NOT NULL,
    sport TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    body_json TEXT NOT NULL
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_odds_game ON odds_snapshots(game_id, captured_at);

CREATE TABLE IF NOT EXISTS injury_snapshots (
    content_hash TEXT PRIMARY KEY,
    team_key TEXT NOT NULL,
    sport TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    body_json TEXT NOT NULL
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_injury_team ON injury_snapshots(team_key, captured_at);

CREATE TABLE IF NOT EXISTS sim_contexts (
    context_hash TEXT PRIMARY KEY,
    game_id TEXT NOT NULL,
    sport TEXT NOT NULL,
    created_at TEXT NOT NULL,
    body_json TEXT NOT NULL
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_context_game ON sim_contexts(game_id, created_at);

CREATE TABLE IF NOT EXISTS sim_results (
    context_hash TEXT NOT NULL,
    market_type TEXT NOT NULL,
    selection_id TEXT NOT NULL,
    created_at_utc TEXT NOT NULL,
    body_json TEXT NOT NULL,
    PRIMARY KEY (context_hash, market_type, selection_id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS game_meta (
    game_id TEXT PRIMARY KEY,
    home_team_name TEXT NOT NULL,
    away_team_name TEXT NOT NULL,
    updated_at TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS market_decisions (
    game_id TEXT NOT NULL,
    market_type TEXT NOT NULL,
    context_hash TEXT NOT NULL,
    decision_version INTEGER NOT NULL,
    computed_at TEXT NOT NULL,
    body_json TEXT NOT NULL,
    PRIMARY KEY (game_id, market_type, context_hash)
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_decisions_game ON market_decisions(game_id, computed_at DESC);

CREATE TABLE IF NOT EXISTS signals (
    signal_id TEXT PRIMARY KEY,
    previous_signal_id TEXT,
    game_id TEXT NOT NULL,
    market_type TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    body_json TEXT NOT NULL
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_signals_chain ON signals(game_id, market_type, created_at DESC);

CREATE TABLE IF NOT EXISTS published_predictions (
    prediction_id TEXT NOT NULL,
    channel TEXT NOT NULL,
    is_official INTEGER NOT NULL,
    published_at TEXT NOT NULL,
    body_json TEXT NOT NULL,
    PRIMARY KEY (prediction_id, channel)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS event_results (
    game_id TEXT PRIMARY KEY,
    body_json TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS gradings (
    prediction_id TEXT PRIMARY KEY,
    game_id TEXT NOT NULL,
    graded_at TEXT NOT NULL,
    body_json TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS calibration_versions (
    version TEXT PRIMARY KEY,
    fitted_at TEXT NOT NULL,
    promoted_at TEXT,
    body_json TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS audit_log (
    event_id TEXT PRIMARY KEY,
    logged_at TEXT NOT NULL,
    retention_expires_at TEXT NOT NULL,
    body_json TEXT NOT NULL
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_audit_logged_at ON audit_log(logged_at);
"#;

/// Opens the database file, applies pragmas/schema once, and returns a raw
/// connection. Callers wrap this in the collection-specific store types;
/// `AuditStore` revokes UPDATE/DELETE on its own connection afterward.
pub fn open(db_path: &str) -> rusqlite::Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(db_path, flags)?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(conn)
}
