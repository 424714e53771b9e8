//! Process configuration (§6 "Config/env", SPEC_FULL.md §10.3). Loaded once
//! at boot via `dotenv` + `std::env::var`, mirroring the teacher's
//! `models::Config::from_env` pattern: safe fallbacks for non-critical
//! knobs, hard values only where the engine truly cannot run without them.

use std::env;
use std::path::{Path, PathBuf};

/// Build/version identity surfaced by the meta endpoint (§6 "Meta endpoint
/// contract") and stamped onto every SimulationContext/PublishedPrediction.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine_build_id: String,
    pub current_sim_version: String,
    pub deployed_at: String,
    pub environment: String,
    pub database_path: String,
    pub port: u16,
    /// Backpressure ceiling per sport (§5): ticks beyond this queue depth
    /// are dropped with `BACKPRESSURE_DROPPED` rather than blocking.
    pub per_sport_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            engine_build_id: env::var("ENGINE_BUILD_ID").unwrap_or_else(|_| "dev".to_string()),
            current_sim_version: env::var("CURRENT_SIM_VERSION").unwrap_or_else(|_| "unversioned".to_string()),
            deployed_at: env::var("DEPLOYED_AT").unwrap_or_else(|_| "unknown".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_path: resolve_data_path(env::var("DATABASE_PATH").ok(), "linewatch.db"),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            per_sport_queue_capacity: env::var("PER_SPORT_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),
        }
    }
}

fn default_data_path(filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    base.join(filename).to_string_lossy().to_string()
}

/// Relative paths are anchored to the crate directory, not the caller's
/// cwd, so the daemon and the grading job agree on the same database file
/// regardless of where each binary is invoked from.
fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }
    base.join(p).to_string_lossy().to_string()
}

pub fn load_env() {
    let _ = dotenv::dotenv();
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for p in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linewatch_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
