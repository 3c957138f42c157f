//! Command line driver for the fishbowl simulation.

mod database;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use fishbowl_core::{load_simulation_config, read_simulation_config, SimulationConfig, SimulationId};
use fishbowl_world::Engine;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fishbowl", version, about = "Run a fish and shark predator-prey simulation")]
struct Cli {
    /// Name of the configuration file (without `.json`) inside `--config-dir`.
    #[arg(long, default_value = "simulation_config_1")]
    config_name: String,

    /// Directory holding named configuration files.
    #[arg(long, env = "FISHBOWL_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Explicit configuration file; takes precedence over name and directory.
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Override the configured number of turns.
    #[arg(long)]
    max_turns: Option<u32>,

    /// Seed for the simulation RNG. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// SQLite database file for results.
    #[arg(long, env = "FISHBOWL_DATABASE", default_value = "data/fishbowl.db")]
    database: String,

    /// Skip persistence entirely.
    #[arg(long)]
    no_persist: bool,

    /// Store the rendered grid of every turn.
    #[arg(long)]
    record_grids: bool,

    /// Log the grid after every turn.
    #[arg(long)]
    display: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn load_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config_path {
            Some(path) => load_simulation_config(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => read_simulation_config(&self.config_dir, &self.config_name).with_context(|| {
                format!(
                    "loading configuration {} from {}",
                    self.config_name,
                    self.config_dir.display()
                )
            })?,
        };

        if let Some(max_turns) = self.max_turns {
            config.max_turns = max_turns;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.log_json)?;

    let config = cli.load_config()?;
    let seed = cli.seed.unwrap_or_else(rand::random);

    let db = if cli.no_persist {
        info!("Persistence disabled");
        None
    } else {
        let db = database::Database::new(&cli.database).await?;
        db.migrate().await?;
        Some(db)
    };

    let simulation_id = match &db {
        Some(db) => db.create_simulation(&config).await?,
        None => SimulationId(0),
    };

    info!(
        simulation_id = %simulation_id,
        seed,
        grid_size = config.grid_size,
        max_turns = config.max_turns,
        "Starting simulation"
    );

    let mut engine = Engine::new(simulation_id, config, seed)?;
    if cli.display {
        info!("Initial tank:\n{}", engine.tank());
    }

    let started = Instant::now();
    let mut failure = None;

    while !engine.is_ended() {
        let turn_started = Instant::now();
        match engine.play_turn() {
            Ok(summary) => {
                debug!(
                    turn = summary.turn,
                    elapsed_ms = turn_started.elapsed().as_secs_f64() * 1000.0,
                    fish = summary.fish_remaining,
                    sharks = summary.sharks_remaining,
                    "Turn played"
                );

                if cli.display {
                    info!(turn = summary.turn, "Tank:\n{}", engine.tank());
                }

                if cli.record_grids {
                    if let Some(db) = &db {
                        let grid = engine.tank().render();
                        if let Err(e) = db.save_tank_grid(simulation_id, summary.turn, &grid).await {
                            warn!(turn = summary.turn, "Failed to record tank grid: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                error!(turn = engine.current_turn(), "Turn failed, stopping: {}", e);
                failure = Some(e);
                break;
            }
        }
    }

    let stats = engine.stats();
    info!(
        simulation_id = %simulation_id,
        turns = engine.current_turn(),
        duration_ms = started.elapsed().as_millis() as u64,
        end_reason = engine.end_reason().map(|reason| reason.as_str()),
        fish_eaten = stats.fish_eaten,
        fish_bred = stats.fish_bred,
        sharks_bred = stats.sharks_bred,
        sharks_starved = stats.sharks_starved,
        "Simulation finished"
    );

    if let Some(db) = &db {
        let report = engine.report();
        if let Err(e) = db.save_report(&report).await {
            error!(simulation_id = %simulation_id, "Failed to persist simulation: {}", e);
            return Err(e.into());
        }
    }

    match failure {
        Some(e) => Err(e).with_context(|| format!("simulation {} failed", simulation_id)),
        None => Ok(()),
    }
}
