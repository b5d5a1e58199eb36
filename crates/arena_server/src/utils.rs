//! Convenience constructors for [`GameServer`].

use crate::config::ServerConfig;
use crate::server::GameServer;

/// Creates a relay-game server with the default configuration.
pub fn create_server() -> GameServer {
    create_server_with_config(ServerConfig::default())
}

pub fn create_server_with_config(config: ServerConfig) -> GameServer {
    GameServer::new(config)
}
