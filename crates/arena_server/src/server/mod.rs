//! HTTP and WebSocket front door.

pub mod api;
pub mod core;

pub use self::core::GameServer;

use crate::config::{ServerConfig, SiteInfoConfig};
use crate::game::GameFactory;
use crate::gateway::Gateway;
use crate::matchmaking::RegionTable;
use crate::pool::{GamePool, SharedPool};
use std::sync::Arc;

/// State shared by every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SharedPool,
    pub gateway: Arc<Gateway>,
    pub regions: Arc<RegionTable>,
    pub site: Arc<SiteInfoConfig>,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Builds an empty pool and the services around it.
    pub fn new(config: &ServerConfig, factory: Arc<dyn GameFactory>) -> Self {
        let pool = GamePool::new(config.max_games, config.max_players_per_game, factory)
            .into_shared();
        let gateway = Gateway::new(pool.clone(), config.max_games, config.idle_timeout());

        Self {
            pool,
            gateway: Arc::new(gateway),
            regions: Arc::new(RegionTable::new(
                config.regions.clone(),
                config.default_region.clone(),
            )),
            site: Arc::new(config.site.clone()),
            max_body_bytes: config.max_body_bytes,
        }
    }
}
