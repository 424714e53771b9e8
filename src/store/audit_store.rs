use crate::error::{EngineError, EngineResult};
use crate::model::AuditLogRecord;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::error;

/// The append-only audit collection (§3, §4.L, §7). The writer role has
/// only {insert, find}; this is enforced by revoking UPDATE/DELETE on the
/// connection's `audit_log` table with a SQLite trigger rather than merely
/// omitting those methods from the Rust API, so a stray raw SQL statement
/// against this connection is refused at the storage layer too.
///
/// Triggers live on the table, not the connection, so an unconditional
/// `BEFORE DELETE` trigger would also lock out the privileged retention
/// purge (§4.L "deletion is performed by a privileged out-of-band job
/// only") — there would be no connection left that could ever delete a
/// row. Instead the trigger only fires while `audit_purge_unlock` is
/// empty; `purge_expired` is the sole caller that inserts and removes the
/// unlock row, both inside the same transaction as the delete, so the
/// window where deletion is permitted never outlives one purge call.
pub struct AuditStore {
    conn: Arc<Mutex<Connection>>,
}

const ENFORCE_APPEND_ONLY_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS audit_purge_unlock (token TEXT PRIMARY KEY);

CREATE TRIGGER IF NOT EXISTS audit_log_no_update
BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only: UPDATE refused');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
BEFORE DELETE ON audit_log
WHEN NOT EXISTS (SELECT 1 FROM audit_purge_unlock)
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only: DELETE refused outside a privileged purge');
END;
"#;

impl AuditStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> EngineResult<Self> {
        conn.lock().execute_batch(ENFORCE_APPEND_ONLY_SQL)?;
        Ok(Self { conn })
    }

    /// Inserts one record per produced MarketDecision. Callers must treat a
    /// failure here as a hard failure of the decision itself (§4.L, §7):
    /// no decision is emitted without an audit trail.
    pub fn insert(&self, mut record: AuditLogRecord) -> EngineResult<()> {
        record.retention_expires_at =
            record.logged_at + Duration::days(365 * AuditLogRecord::RETENTION_YEARS);
        let conn = self.conn.lock();
        let body = serde_json::to_string(&record)?;
        conn.execute(
            "INSERT INTO audit_log (event_id, logged_at, retention_expires_at, body_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.event_id.to_string(),
                record.logged_at.to_rfc3339(),
                record.retention_expires_at.to_rfc3339(),
                body,
            ],
        )
        .map_err(|e| {
            error!(error = %e, "audit insert failed");
            EngineError::AuditInsertFailed(e.to_string())
        })?;
        Ok(())
    }

    pub fn find(&self, event_id: &str) -> EngineResult<Option<AuditLogRecord>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM audit_log WHERE event_id = ?1",
                [event_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    /// Privileged out-of-band retention purge; not exposed by the normal
    /// application API surface, only by the retention job binary. Briefly
    /// unlocks the append-only trigger for the duration of one transaction
    /// so this is the only path by which `audit_log` rows are ever removed.
    pub fn purge_expired(&self, now: chrono::DateTime<Utc>) -> EngineResult<u64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| EngineError::AuditMutationRefused(e.to_string()))?;
        tx.execute("INSERT INTO audit_purge_unlock (token) VALUES ('retention-job')", [])
            .map_err(|e| EngineError::AuditMutationRefused(e.to_string()))?;
        let changed = tx.execute(
            "DELETE FROM audit_log WHERE retention_expires_at < ?1",
            params![now.to_rfc3339()],
        );
        let changed = match changed {
            Ok(n) => n as u64,
            Err(e) => return Err(EngineError::AuditMutationRefused(e.to_string())),
        };
        tx.execute("DELETE FROM audit_purge_unlock WHERE token = 'retention-job'", [])
            .map_err(|e| EngineError::AuditMutationRefused(e.to_string()))?;
        tx.commit().map_err(|e| EngineError::AuditMutationRefused(e.to_string()))?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sport::{MarketType, Sport};
    use chrono::Utc;
    use parking_lot::Mutex;
    use uuid::Uuid;

    fn sample_record() -> AuditLogRecord {
        AuditLogRecord {
            event_id: Uuid::new_v4(),
            inputs_hash: "abc".into(),
            decision_version: 1,
            classification: "EDGE".into(),
            release_status: "APPROVED".into(),
            edge_points: 1.0,
            model_prob: 0.6,
            trace_id: "t1".into(),
            engine_version: "1".into(),
            market_type: MarketType::Spread,
            league: Sport::Nba,
            logged_at: Utc::now(),
            retention_expires_at: Utc::now(),
        }
    }

    #[test]
    fn update_and_delete_are_refused() {
        let conn = Arc::new(Mutex::new(crate::store::open(":memory:").unwrap()));
        let store = AuditStore::new(conn.clone()).unwrap();
        let record = sample_record();
        store.insert(record.clone()).unwrap();

        let update_result = conn.lock().execute(
            "UPDATE audit_log SET classification = 'BLOCKED' WHERE event_id = ?1",
            params![record.event_id.to_string()],
        );
        assert!(update_result.is_err());

        let delete_result = conn.lock().execute(
            "DELETE FROM audit_log WHERE event_id = ?1",
            params![record.event_id.to_string()],
        );
        assert!(delete_result.is_err());

        assert!(store.find(&record.event_id.to_string()).unwrap().is_some());
    }

    #[test]
    fn purge_expired_removes_only_retention_lapsed_rows_and_relocks_after() {
        let conn = Arc::new(Mutex::new(crate::store::open(":memory:").unwrap()));
        let store = AuditStore::new(conn.clone()).unwrap();

        let mut expired = sample_record();
        expired.logged_at = Utc::now() - chrono::Duration::days(365 * 8);
        store.insert(expired.clone()).unwrap();

        let fresh = sample_record();
        store.insert(fresh.clone()).unwrap();

        let purged = store.purge_expired(Utc::now()).unwrap();
        assert_eq!(purged, 1);
        assert!(store.find(&expired.event_id.to_string()).unwrap().is_none());
        assert!(store.find(&fresh.event_id.to_string()).unwrap().is_some());

        // The unlock window closes with the purge transaction; ordinary
        // deletes are refused again immediately afterward.
        let delete_result = conn.lock().execute(
            "DELETE FROM audit_log WHERE event_id = ?1",
            params![fresh.event_id.to_string()],
        );
        assert!(delete_result.is_err());
    }
}
