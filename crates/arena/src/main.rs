//! Arena server binary.
//!
//! Loads the TOML configuration, applies command-line overrides, sets up
//! logging and runs the server until a shutdown signal arrives.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{anyhow, Result};
use arena_server::GameServer;
use cli::CliArgs;
use config::AppConfig;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

/// How long the server gets to close its connections after a signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct Application {
    config: AppConfig,
    server: Arc<GameServer>,
}

impl Application {
    async fn new(args: CliArgs) -> Result<Self> {
        let (mut config, created) = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;

        logging::setup_logging(&config.logging)?;
        info!("🔧 Logging initialized with level: {}", config.logging.level);
        if created {
            info!(
                "📝 Created default configuration file: {}",
                args.config_path.display()
            );
        }
        info!("📂 Config: {}", args.config_path.display());

        let server = GameServer::new(config.to_server_config()?);
        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    async fn run(self) -> Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!(
            "  🎮 Games: {} x {} players",
            self.config.games.max_games, self.config.games.max_players_per_game
        );
        info!(
            "  🗺️ Regions: {:?} (default: {:?})",
            self.config.matchmaking.regions.keys().collect::<Vec<_>>(),
            self.config.matchmaking.default_region
        );
        info!(
            "  ⏱️ Connection timeout: {}s",
            self.config.server.connection_timeout
        );

        let mut server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move { server.start().await })
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");

        tokio::select! {
            signal = signals::wait_for_shutdown_signal() => {
                signal?;
                info!("🛑 Shutdown signal received, initiating graceful shutdown...");
            }
            finished = &mut server_handle => {
                // The server only returns on its own when it failed.
                return match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(e.into()),
                };
            }
        }

        self.server.shutdown().await?;

        match timeout(SHUTDOWN_GRACE, server_handle).await {
            Ok(Ok(Ok(()))) => info!("✅ Arena server shutdown complete"),
            Ok(Ok(Err(e))) => error!("❌ Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Server task failed: {}", e),
            Err(_) => warn!("⏳ Server did not stop within {:?}", SHUTDOWN_GRACE),
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let app = Application::new(args).await?;
    app.run().await
}
