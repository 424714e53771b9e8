//! Orchestrator (§4.M, §5, §6). Schedules ingest -> simulate -> decide ->
//! publish -> grade per game. Collaborators (odds provider, simulation
//! worker, roster/injury feed, league stats feed, event results feed) are
//! reached only through the trait contracts below (§6) — the orchestrator
//! never knows their transport.
//!
//! Grounded on the teacher's `scrapers` polling-loop shape
//! (`parallel_data_collection`'s `tokio::time::interval` + per-source
//! kill-switch) generalized to "one bounded worker pool per sport with a
//! single orchestrator task per game" (§9 re-architecture notes).

mod pipeline;

pub use pipeline::{GamePipeline, MarketPipelineInput, PipelineOutcome};

use crate::calibration::BaselineStats;
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::hash::sha256_hex;
use crate::ingest::ProposedSimulationResult;
use crate::model::{EventResult, InjurySnapshot, OddsSnapshot, SimulationContext};
use crate::sport::{MarketType, Sport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// §6 "Odds provider": `list_sports`/`list_events`, already normalized to
/// an `OddsSnapshot` by the implementation (the HTTP client itself is out
/// of core scope per spec.md §1).
#[async_trait]
pub trait OddsProvider: Send + Sync {
    async fn latest_odds(&self, sport: Sport, game_id: &str) -> EngineResult<OddsSnapshot>;
}

/// §6 "Simulation worker": `run(sim_context) -> SimulationResult`, one
/// call per market_type the sport supports. Must be deterministic given
/// (context_hash, seed_base) — the orchestrator relies on this for the
/// idempotency collapse on duplicate starts (§5). Returns the wire-shaped
/// `ProposedSimulationResult` (canonical result plus the raw team keys and
/// two/three-way probabilities §4.D's contract check needs) rather than
/// the already-validated `SimulationResult` — the pipeline is the only
/// thing allowed to promote a proposal to a persisted, trusted record.
#[async_trait]
pub trait SimulationWorker: Send + Sync {
    async fn run(&self, context: &SimulationContext) -> EngineResult<Vec<ProposedSimulationResult>>;
}

/// §6 "Roster/Injury feed". A missing roster blocks simulation with
/// `ROSTER_UNAVAILABLE` (§4.D, §7).
#[async_trait]
pub trait RosterFeed: Send + Sync {
    async fn get_injuries(&self, team_key: &str, sport: Sport) -> EngineResult<InjurySnapshot>;
}

/// §6 "Event results feed": completed games only.
#[async_trait]
pub trait EventResultsFeed: Send + Sync {
    async fn get_results(&self, sport: Sport, since: chrono::DateTime<chrono::Utc>) -> EngineResult<Vec<EventResult>>;
}

/// The league historical stats the Reality Check Layer and calibration
/// engine's baseline clamp consume (§4.E, §4.F step 4) — sourced outside
/// core, same as odds and rosters.
#[async_trait]
pub trait LeagueStatsFeed: Send + Sync {
    async fn totals_distribution(&self, sport: Sport) -> EngineResult<(f64, f64)>;
    async fn rolling_baseline(&self, sport: Sport, market_type: MarketType) -> EngineResult<BaselineStats>;
}

/// Per-sport cadence (§4.M "loops at a sport-derived cadence: base
/// interval, aggressive near tip-off, live interval during play").
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub base: Duration,
    pub pre_tipoff: Duration,
    pub live: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(300),
            pre_tipoff: Duration::from_secs(60),
            live: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    PreGame,
    NearTipoff,
    Live,
}

impl Cadence {
    pub fn interval_for(&self, phase: GamePhase) -> Duration {
        match phase {
            GamePhase::PreGame => self.base,
            GamePhase::NearTipoff => self.pre_tipoff,
            GamePhase::Live => self.live,
        }
    }
}

/// One scheduled tick for one game. Ticks are the unit dropped under
/// backpressure (§5 "new tick events are dropped for that sport with an
/// explicit BACKPRESSURE_DROPPED audit reason").
#[derive(Debug, Clone)]
pub struct Tick {
    pub game_id: String,
    pub sport: Sport,
    pub phase: GamePhase,
    pub deadline: Instant,
}

/// Bounded, per-sport work queue (§5 "each stage is a bounded work
/// queue"). Live games preempt pre-game queues by being enqueued onto a
/// separate higher-priority channel that is always drained first.
pub struct SportQueue {
    pregame_tx: mpsc::Sender<Tick>,
    pregame_rx: mpsc::Receiver<Tick>,
    live_tx: mpsc::Sender<Tick>,
    live_rx: mpsc::Receiver<Tick>,
}

impl SportQueue {
    pub fn new(capacity: usize) -> Self {
        let (pregame_tx, pregame_rx) = mpsc::channel(capacity);
        let (live_tx, live_rx) = mpsc::channel(capacity);
        Self { pregame_tx, pregame_rx, live_tx, live_rx }
    }

    /// Enqueues a tick, returning `false` (and logging
    /// `BACKPRESSURE_DROPPED`) if the relevant queue is at capacity.
    pub fn try_enqueue(&self, tick: Tick) -> bool {
        let tx = if tick.phase == GamePhase::Live { &self.live_tx } else { &self.pregame_tx };
        match tx.try_send(tick.clone()) {
            Ok(()) => true,
            Err(_) => {
                warn!(game_id = %tick.game_id, sport = %tick.sport, "BACKPRESSURE_DROPPED");
                false
            }
        }
    }

    /// Pulls the next tick, preferring live games over pre-game ones.
    pub async fn next(&mut self) -> Option<Tick> {
        if let Ok(tick) = self.live_rx.try_recv() {
            return Some(tick);
        }
        tokio::select! {
            biased;
            Some(tick) = self.live_rx.recv() => Some(tick),
            Some(tick) = self.pregame_rx.recv() => Some(tick),
            else => None,
        }
    }
}

/// Tracks in-flight context_hashes to collapse duplicate starts (§5
/// "Exactly one pipeline pass per (game, context_hash) may run at a
/// time; duplicate starts collapse on the context_hash").
#[derive(Default)]
pub struct InFlightGuard {
    active: parking_lot::Mutex<HashMap<String, ()>>,
}

impl InFlightGuard {
    /// Returns `true` if this call acquired the slot (no other pass for
    /// this context_hash is running); the caller must call `release` when
    /// done, success or failure.
    pub fn try_acquire(&self, context_hash: &str) -> bool {
        let mut active = self.active.lock();
        if active.contains_key(context_hash) {
            false
        } else {
            active.insert(context_hash.to_string(), ());
            true
        }
    }

    pub fn release(&self, context_hash: &str) {
        self.active.lock().remove(context_hash);
    }
}

/// Every sport the registry supports uses the home side's posted line/odds
/// as the market's anchor; the mirrored side is derived by the selection
/// generator, not re-read from the snapshot.
fn anchor_side_key(market_type: MarketType) -> &'static str {
    match market_type {
        MarketType::Total => "over",
        _ => "home",
    }
}

/// Builds the per-market external facts the pipeline needs from one
/// OddsSnapshot plus the league stats feed, for every market the sport
/// supports (§4.M "fan the fetched snapshot out to the markets the sport
/// configures").
async fn build_market_inputs<L: LeagueStatsFeed + ?Sized>(
    odds: &OddsSnapshot,
    sport_cfg: &crate::sport::SportConfig,
    league_stats: &L,
    injury_uncertainty: f64,
    data_quality: f64,
    decision_version: u32,
) -> EngineResult<HashMap<MarketType, MarketPipelineInput>> {
    let mut inputs = HashMap::new();
    for (market_type, _settlement) in sport_cfg.supported_markets.iter().copied() {
        let Some(side_quotes) = odds.markets.get(&market_type) else { continue };
        let Some(quote) = side_quotes.get(anchor_side_key(market_type)) else { continue };

        let (league_mean, league_std_dev) = league_stats.totals_distribution(sport_cfg.sport).await?;
        let baseline = league_stats.rolling_baseline(sport_cfg.sport, market_type).await?;

        inputs.insert(
            market_type,
            MarketPipelineInput {
                market_line: quote.line,
                market_american_odds: quote.american_odds,
                book_key: odds.bookmaker_key.clone(),
                home_team_name: odds.home_team_name.clone(),
                away_team_name: odds.away_team_name.clone(),
                league_mean,
                league_std_dev,
                live: None,
                data_quality,
                injury_uncertainty,
                baseline,
                calibration_version: None,
                decision_version,
            },
        );
    }
    Ok(inputs)
}

/// Ties the collaborator traits, the pipeline, and the bounded queues
/// together into one schedulable unit per game (§4.M flow).
pub struct Orchestrator<O, S, R, F, L> {
    pub odds_provider: Arc<O>,
    pub simulation_worker: Arc<S>,
    pub roster_feed: Arc<R>,
    pub results_feed: Arc<F>,
    pub league_stats: Arc<L>,
    pub pipeline: Arc<GamePipeline>,
    pub in_flight: Arc<InFlightGuard>,
    pub config: Arc<Config>,
}

impl<O, S, R, F, L> Orchestrator<O, S, R, F, L>
where
    O: OddsProvider + 'static,
    S: SimulationWorker + 'static,
    R: RosterFeed + 'static,
    F: EventResultsFeed + 'static,
    L: LeagueStatsFeed + 'static,
{
    /// Runs a single tick: fetch odds, bind a SimulationContext to the
    /// current odds/injury snapshots, request simulation, run the
    /// pipeline (§4.M). A cancelled pass (deadline elapsed) never writes a
    /// partial decision and never voids an existing signal (§5).
    pub async fn run_tick(&self, tick: Tick) -> EngineResult<()> {
        let remaining = tick.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            info!(game_id = %tick.game_id, "tick deadline already elapsed, skipping");
            return Ok(());
        }

        let odds = tokio::time::timeout(remaining, self.odds_provider.latest_odds(tick.sport, &tick.game_id))
            .await
            .map_err(|_| EngineError::OddsProviderUnavailable("timed out".to_string()))??;

        let remaining = tick.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        let (home_injuries, away_injuries) = tokio::time::timeout(remaining, async {
            tokio::try_join!(
                self.roster_feed.get_injuries(&odds.home_team_key, tick.sport),
                self.roster_feed.get_injuries(&odds.away_team_key, tick.sport),
            )
        })
        .await
        .map_err(|_| EngineError::RosterUnavailable {
            team_key: odds.home_team_key.clone(),
            sport: tick.sport.to_string(),
        })??;

        let injury_uncertainty = home_injuries.max_relevant_impact().max(away_injuries.max_relevant_impact());

        let odds_snapshot_hash = self.pipeline.content_store.put_odds_snapshot(odds.clone())?;
        let home_injury_hash = self.pipeline.content_store.put_injury_snapshot(home_injuries)?;
        let away_injury_hash = self.pipeline.content_store.put_injury_snapshot(away_injuries)?;

        let seed_base = {
            let digest = sha256_hex(tick.game_id.as_bytes());
            u64::from_str_radix(&digest[..16], 16).unwrap_or(0)
        };

        let mut context = SimulationContext {
            context_hash: String::new(),
            game_id: tick.game_id.clone(),
            sport: tick.sport,
            model_version: self.config.current_sim_version.clone(),
            engine_version: self.config.engine_build_id.clone(),
            data_feed_version: "odds-provider-v1".to_string(),
            odds_snapshot_hash,
            injury_snapshot_hashes: vec![home_injury_hash, away_injury_hash],
            pace_factor: 1.0,
            fatigue_factor: 1.0,
            iteration_count: 20_000,
            seed_base,
            created_at: chrono::Utc::now(),
        };
        context.context_hash = self.pipeline.content_store.put_sim_context(context.clone())?;

        let sport_cfg = self.pipeline.sport_registry.config_for(tick.sport);
        let market_inputs = build_market_inputs(&odds, sport_cfg, self.league_stats.as_ref(), injury_uncertainty, 1.0, 1)
            .await?;

        self.run_pipeline_for_context(&context, &market_inputs, tick.deadline).await?;
        Ok(())
    }

    /// Runs the full pipeline for an already-bound SimulationContext,
    /// collapsing duplicate concurrent starts on its context_hash (§5).
    pub async fn run_pipeline_for_context(
        &self,
        context: &SimulationContext,
        market_inputs: &HashMap<MarketType, MarketPipelineInput>,
        deadline: Instant,
    ) -> EngineResult<Option<PipelineOutcome>> {
        if !self.in_flight.try_acquire(&context.context_hash) {
            info!(context_hash = %context.context_hash, "duplicate pipeline start collapsed");
            return Ok(None);
        }
        let result = self.run_pipeline_inner(context, market_inputs, deadline).await;
        self.in_flight.release(&context.context_hash);
        result
    }

    async fn run_pipeline_inner(
        &self,
        context: &SimulationContext,
        market_inputs: &HashMap<MarketType, MarketPipelineInput>,
        deadline: Instant,
    ) -> EngineResult<Option<PipelineOutcome>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        let sim_results = tokio::time::timeout(remaining, self.simulation_worker.run(context))
            .await
            .map_err(|_| EngineError::SimulationTimeout(remaining))??;

        if Instant::now() >= deadline {
            // Cancelled between sim completion and pipeline execution: no
            // partial decision is written (§5).
            return Ok(None);
        }

        let outcome = self.pipeline.run(context, sim_results, market_inputs)?;
        Ok(Some(outcome))
    }
}
