//! linewatch-grade — the standalone Grading & Calibration Loop job (§4.K).
//!
//! Run after a game goes final: settle every official PublishedPrediction
//! against the EventResult, persist the Gradings, and (on demand) promote a
//! pre-fitted CalibrationVersion with an explicit, audited pointer swap.
//! Fitting new calibration segments from the graded history is a
//! collaborator concern (§3 "CalibrationSegment... fitting method is a
//! collaborator concern; the engine only applies them") — this job applies
//! and records the promotion, it does not fit.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use linewatch_core::config::{init_tracing, load_env, Config};
use linewatch_core::grading::{grade, GradingInput};
use linewatch_core::model::{AuditLogRecord, CalibrationVersion, EventResult};
use linewatch_core::store::{self as store_mod, AuditStore, DecisionStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "linewatch-grade", about = "Settle published predictions and promote calibration versions")]
struct Cli {
    /// Overrides Config::database_path (defaults to DATABASE_PATH / linewatch.db).
    #[arg(long, env = "DATABASE_PATH")]
    database_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Settle every official published prediction for one game against its
    /// final score (§4.K steps 1-2).
    Grade {
        #[arg(long)]
        game_id: String,
        #[arg(long)]
        home_score: i32,
        #[arg(long)]
        away_score: i32,
        /// Closing-line implied probability captured at game start, used
        /// for CLV; omit if unavailable (CLV recorded as 0.0, §4.K step 2).
        #[arg(long)]
        closing_implied_probability: Option<f64>,
    },
    /// Promote a pre-fitted CalibrationVersion from a JSON file, stamping
    /// `promoted_at` and writing one audit record per segment (§4.K step 3).
    PromoteCalibration {
        #[arg(long)]
        version_file: PathBuf,
    },
}

fn main() -> Result<()> {
    load_env();
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.database_path.clone() {
        config.database_path = path;
    }

    let conn = Arc::new(parking_lot::Mutex::new(
        store_mod::open(&config.database_path).context("failed to open linewatch database")?,
    ));
    let decision_store = DecisionStore::new(conn.clone());
    let audit_store = AuditStore::new(conn.clone()).context("failed to bootstrap audit store")?;

    match cli.command {
        Command::Grade { game_id, home_score, away_score, closing_implied_probability } => {
            run_grade(&decision_store, &game_id, home_score, away_score, closing_implied_probability)
        }
        Command::PromoteCalibration { version_file } => {
            run_promote(&decision_store, &audit_store, &version_file)
        }
    }
}

fn run_grade(
    decision_store: &DecisionStore,
    game_id: &str,
    home_score: i32,
    away_score: i32,
    closing_implied_probability: Option<f64>,
) -> Result<()> {
    let result = EventResult { game_id: game_id.to_string(), home_score, away_score, completed: true, final_at: Utc::now() };
    decision_store.put_event_result(&result).context("failed to persist event result")?;

    let predictions = decision_store
        .published_predictions_for_game(game_id)
        .context("failed to load published predictions")?;
    if predictions.is_empty() {
        warn!(game_id, "no official published predictions found for this game");
        return Ok(());
    }

    let mut graded = 0usize;
    let mut pending = 0usize;
    for prediction in &predictions {
        let input = GradingInput {
            prediction,
            result: &result,
            closing_implied_probability,
            taken_implied_probability: prediction.p_calibrated,
        };
        match grade(input, Utc::now()) {
            Ok(grading) => {
                decision_store.put_grading(&grading).context("failed to persist grading")?;
                info!(
                    prediction_id = %grading.prediction_id,
                    settlement = ?grading.settlement,
                    realized_units = grading.realized_units,
                    clv = grading.clv,
                    "graded prediction"
                );
                graded += 1;
            }
            Err(err) if err.reason_code() == "GRADING_PENDING" => {
                pending += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!(game_id, graded, pending, "grading pass complete");
    Ok(())
}

fn run_promote(decision_store: &DecisionStore, audit_store: &AuditStore, version_file: &PathBuf) -> Result<()> {
    let body = fs::read_to_string(version_file)
        .with_context(|| format!("failed to read calibration version file {}", version_file.display()))?;
    let mut version: CalibrationVersion =
        serde_json::from_str(&body).context("calibration version file is not valid JSON")?;

    let promoted_at = Utc::now();
    version.promoted_at = Some(promoted_at);
    decision_store.put_calibration_version(&version).context("failed to persist calibration version")?;

    for segment in &version.segments {
        audit_store.insert(AuditLogRecord {
            event_id: Uuid::new_v4(),
            inputs_hash: version.version.clone(),
            decision_version: 0,
            classification: "CALIBRATION_PROMOTED".to_string(),
            release_status: "APPROVED".to_string(),
            edge_points: 0.0,
            model_prob: 0.0,
            trace_id: version.version.clone(),
            engine_version: "linewatch-grade".to_string(),
            market_type: segment.market_type,
            league: segment.sport,
            logged_at: promoted_at,
            retention_expires_at: promoted_at,
        })?;
    }

    info!(version = %version.version, segments = version.segments.len(), "calibration version promoted");
    Ok(())
}
