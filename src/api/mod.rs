pub mod routes;

pub use routes::{get_game_decisions, get_healthz, get_market_state_registry, get_meta};
