//! Configuration management for the arena server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use anyhow::Context;
use arena_server::config::{
    GameModeConfig, RegionConfig, SiteInfoConfig, TwitchStreamConfig, YoutubeConfig,
};
use arena_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network settings
    pub server: ServerSettings,
    /// Game pool sizing
    pub games: GameSettings,
    /// Regions handed out by matchmaking
    pub matchmaking: MatchmakingSettings,
    /// Static content of the site info endpoint
    #[serde(default)]
    pub site: SiteSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Idle timeout for game connections in seconds (0 to disable)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Server tick interval in milliseconds (0 to disable)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Largest accepted matchmaking request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

pub fn default_connection_timeout() -> u64 {
    60
}

fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    /// Number of game slots
    pub max_games: usize,
    /// Players a game holds before it stops taking joiners
    pub max_players_per_game: usize,
    /// Match length in seconds (0 means matches never end on their own)
    #[serde(default)]
    pub match_duration_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// Region used for unknown or missing region keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
    #[serde(default)]
    pub regions: BTreeMap<String, RegionSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    /// `host:port` clients connect to
    pub address: String,
    #[serde(default)]
    pub https: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default)]
    pub modes: Vec<ModeSettings>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub prompt_consent: bool,
    #[serde(default)]
    pub youtube: YoutubeSettings,
    #[serde(default)]
    pub twitch: Vec<TwitchSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeSettings {
    pub map_name: String,
    pub team_mode: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YoutubeSettings {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchSettings {
    pub name: String,
    #[serde(default)]
    pub viewers: u32,
    pub url: String,
    #[serde(default)]
    pub img: String,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        let site = SiteInfoConfig::default();
        Self {
            modes: site
                .modes
                .into_iter()
                .map(|mode| ModeSettings {
                    map_name: mode.map_name,
                    team_mode: mode.team_mode,
                })
                .collect(),
            country: site.country,
            prompt_consent: site.prompt_consent,
            youtube: YoutubeSettings {
                name: site.youtube.name,
                link: site.youtube.link,
            },
            twitch: Vec::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                bind_address: defaults.bind_address.to_string(),
                connection_timeout: defaults.connection_timeout,
                tick_interval_ms: defaults.tick_interval_ms,
                max_body_bytes: defaults.max_body_bytes,
            },
            games: GameSettings {
                max_games: defaults.max_games,
                max_players_per_game: defaults.max_players_per_game,
                match_duration_secs: defaults.match_duration_secs,
            },
            matchmaking: MatchmakingSettings {
                default_region: defaults.default_region,
                regions: defaults
                    .regions
                    .into_iter()
                    .map(|(key, region)| {
                        let region = RegionSettings {
                            address: region.address,
                            https: region.https,
                        };
                        (key, region)
                    })
                    .collect(),
            },
            site: SiteSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration. The flag is `true` when that file was written,
    /// so the caller can report it once logging is up.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<(Self, bool)> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok((config, false))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            Ok((default_config, true))
        }
    }

    /// Converts the application configuration to a game server configuration.
    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        let bind_address = self
            .server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?;

        Ok(ServerConfig {
            bind_address,
            max_games: self.games.max_games,
            max_players_per_game: self.games.max_players_per_game,
            regions: self
                .matchmaking
                .regions
                .iter()
                .map(|(key, region)| {
                    let region = RegionConfig {
                        address: region.address.clone(),
                        https: region.https,
                    };
                    (key.clone(), region)
                })
                .collect(),
            default_region: self.matchmaking.default_region.clone(),
            connection_timeout: self.server.connection_timeout,
            tick_interval_ms: self.server.tick_interval_ms,
            max_body_bytes: self.server.max_body_bytes,
            match_duration_secs: self.games.match_duration_secs,
            site: SiteInfoConfig {
                modes: self
                    .site
                    .modes
                    .iter()
                    .map(|mode| GameModeConfig::new(&mode.map_name, mode.team_mode))
                    .collect(),
                youtube: YoutubeConfig {
                    name: self.site.youtube.name.clone(),
                    link: self.site.youtube.link.clone(),
                },
                twitch: self
                    .site
                    .twitch
                    .iter()
                    .map(|stream| TwitchStreamConfig {
                        name: stream.name.clone(),
                        viewers: stream.viewers,
                        url: stream.url.clone(),
                        img: stream.img.clone(),
                    })
                    .collect(),
                prompt_consent: self.site.prompt_consent,
                country: self.site.country.clone(),
            },
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.games.max_games == 0 {
            return Err("games.max_games must be at least 1".to_string());
        }
        if self.games.max_players_per_game == 0 {
            return Err("games.max_players_per_game must be at least 1".to_string());
        }

        if let Some(default_region) = &self.matchmaking.default_region {
            if !self.matchmaking.regions.contains_key(default_region) {
                return Err(format!(
                    "Default region '{default_region}' is not listed in matchmaking.regions"
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
