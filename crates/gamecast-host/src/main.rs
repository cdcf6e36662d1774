//! Simulated game host for Gamecast.
//!
//! Stands in for the game process the plugin is embedded in: it loads
//! the plugin, runs a fixed-rate update loop over a [`SimulatedMatch`],
//! and calls the plugin's fixed-update hook once per player per tick,
//! exactly as a game engine would.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `gamecast.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Load the plugin, which starts the broadcast server
//! 4. Run the host tick loop until Ctrl-C or the server closes
//! 5. Unload the plugin

mod error;
mod plugin;
mod simulation;

use std::path::Path;

use gamecast_core::config::GamecastConfig;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::HostError;
use crate::plugin::GamecastPlugin;
use crate::simulation::SimulatedMatch;

const CONFIG_PATH: &str = "gamecast.yaml";

/// Seconds between host status lines.
const STATUS_EVERY_SECS: u64 = 10;

enum HostEvent {
    Tick,
    Interrupted(std::io::Result<()>),
    ServerClosed,
}

/// Application entry point for the simulated host.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the server cannot bind,
/// or the server shuts down on its own.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!(
        from_file,
        host = config.server.host,
        port = config.server.port,
        broadcast_interval_ms = config.server.broadcast_interval_ms,
        tick_rate_hz = config.host.tick_rate_hz,
        players = config.host.players,
        seed = config.host.seed,
        "gamecast-host starting"
    );

    // 3. Load the plugin.
    let simulation = SimulatedMatch::new(&config.host);
    let mut plugin = GamecastPlugin::load(&config, simulation).await?;

    // 4. Host tick loop.
    let status_every = u64::from(config.host.tick_rate_hz).saturating_mul(STATUS_EVERY_SECS);
    let mut ticker = tokio::time::interval(config.host.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result = loop {
        let event = tokio::select! {
            _ = ticker.tick() => HostEvent::Tick,
            signal = tokio::signal::ctrl_c() => HostEvent::Interrupted(signal),
            () = plugin.server().closed() => HostEvent::ServerClosed,
        };

        match event {
            HostEvent::Tick => {
                run_host_tick(&mut plugin);

                let ticks = plugin.source().ticks();
                if ticks.checked_rem(status_every) == Some(0) {
                    let state = plugin.source().state();
                    info!(
                        ticks,
                        phase = ?state.game_state,
                        game_code = state.game_code,
                        alive = state.alive_players(),
                        clients = plugin.server().client_count(),
                        published = plugin.stats().published,
                        "Host status"
                    );
                }
            }
            HostEvent::Interrupted(signal) => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
                } else {
                    info!("Ctrl-C received, shutting down");
                }
                break Ok(());
            }
            HostEvent::ServerClosed => {
                warn!("Broadcast server closed, shutting down");
                break Err(plugin
                    .server()
                    .failure()
                    .map_or(HostError::ServerClosed, HostError::from));
            }
        }
    };

    // 5. Unload.
    let ticks = plugin.source().ticks();
    let outcome = plugin.unload().await;
    info!(?outcome, ticks, "gamecast-host shutdown complete");

    result.map_err(Into::into)
}

/// One host tick: advance the match, then run every player's fixed update.
fn run_host_tick(plugin: &mut GamecastPlugin<SimulatedMatch>) {
    plugin.source_mut().advance();

    let roster = plugin.source().state().players.len();
    let local = plugin.source().local_index();
    for idx in 0..roster {
        plugin.on_fixed_update(local == Some(idx));
    }
}

/// Load `gamecast.yaml` from the working directory, falling back to
/// defaults (environment overrides still apply).
fn load_config() -> Result<(GamecastConfig, bool), HostError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok((GamecastConfig::from_file(path)?, true))
    } else {
        Ok((GamecastConfig::parse("")?, false))
    }
}
