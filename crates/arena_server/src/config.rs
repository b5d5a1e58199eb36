//! Server configuration types and defaults.
//!
//! This module contains the runtime configuration consumed by the server.
//! Loading it from disk is the binary's job; everything here is plain data.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Number of slots in the game pool
    pub max_games: usize,

    /// Alive players a game may hold before it stops taking joiners
    pub max_players_per_game: usize,

    /// Regions clients may ask for, keyed by name
    pub regions: BTreeMap<String, RegionConfig>,

    /// Region used when the requested one is unknown
    pub default_region: Option<String>,

    /// Idle timeout for game connections in seconds (0 disables it)
    pub connection_timeout: u64,

    /// Interval between game ticks in milliseconds (0 disables ticking)
    pub tick_interval_ms: u64,

    /// Largest accepted matchmaking request body
    pub max_body_bytes: usize,

    /// Length of a match for the built-in relay game in seconds (0 = endless)
    pub match_duration_secs: u64,

    /// Static fields of the site info endpoint
    pub site: SiteInfoConfig,
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.connection_timeout > 0).then(|| Duration::from_secs(self.connection_timeout))
    }

    pub fn match_duration(&self) -> Option<Duration> {
        (self.match_duration_secs > 0).then(|| Duration::from_secs(self.match_duration_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(
            "local".to_string(),
            RegionConfig {
                address: "127.0.0.1:8080".to_string(),
                https: false,
            },
        );

        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_games: 5,
            max_players_per_game: 80,
            regions,
            default_region: Some("local".to_string()),
            connection_timeout: 60,
            tick_interval_ms: 50,
            max_body_bytes: 64 * 1024,
            match_duration_secs: 0,
            site: SiteInfoConfig::default(),
        }
    }
}

/// Address clients use to reach a region's game servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    /// `host:port` of the region
    pub address: String,

    /// Whether clients should use `https`/`wss`
    pub https: bool,
}

/// Static content of `/api/site_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteInfoConfig {
    pub modes: Vec<GameModeConfig>,
    pub youtube: YoutubeConfig,
    pub twitch: Vec<TwitchStreamConfig>,
    pub prompt_consent: bool,
    pub country: String,
}

impl Default for SiteInfoConfig {
    fn default() -> Self {
        Self {
            modes: vec![
                GameModeConfig::new("main", 1),
                GameModeConfig::new("main", 2),
                GameModeConfig::new("main", 4),
            ],
            youtube: YoutubeConfig::default(),
            twitch: Vec::new(),
            prompt_consent: false,
            country: "US".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameModeConfig {
    pub map_name: String,
    pub team_mode: u8,
}

impl GameModeConfig {
    pub fn new(map_name: &str, team_mode: u8) -> Self {
        Self {
            map_name: map_name.to_string(),
            team_mode,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YoutubeConfig {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchStreamConfig {
    pub name: String,
    pub viewers: u32,
    pub url: String,
    pub img: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_self_consistent() {
        let config = ServerConfig::default();
        let default_region = config.default_region.as_deref().unwrap();
        assert!(config.regions.contains_key(default_region));
        assert!(config.max_games > 0);
        assert!(config.max_players_per_game > 0);
    }

    #[test]
    fn zero_durations_disable_timers() {
        let config = ServerConfig {
            connection_timeout: 0,
            match_duration_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.match_duration(), None);

        let config = ServerConfig {
            connection_timeout: 30,
            match_duration_secs: 300,
            ..Default::default()
        };
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.match_duration(), Some(Duration::from_secs(300)));
    }
}
