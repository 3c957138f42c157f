//! Configuration types for the simulation.

use crate::error::{Error, Result};
use crate::types::Topology;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Simulation parameters, immutable for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Side length of the square grid
    pub grid_size: u32,
    /// Fish spawned at turn 0
    pub init_nb_fish: u32,
    /// Turns since spawn before a fish may breed
    pub fish_breed_maturity: u32,
    /// Breeding chance in percent (0 to 100)
    pub fish_breed_probability: u32,
    /// Reserved, only validated
    pub fish_speed: u32,
    /// Sharks spawned at turn 0
    pub init_nb_shark: u32,
    /// Turns since spawn before a shark may breed
    pub shark_breed_maturity: u32,
    /// Breeding chance in percent (0 to 100)
    pub shark_breed_probability: u32,
    /// Reserved, only validated
    pub shark_speed: u32,
    /// Turns a shark may go unfed before it is removed
    pub shark_starving: u32,
    /// Turn at which the simulation ends
    pub max_turns: u32,
    /// Edge policy of the grid
    #[serde(default)]
    pub topology: Topology,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_size: 10,
            init_nb_fish: 50,
            fish_breed_maturity: 3,
            fish_breed_probability: 80,
            fish_speed: 2,
            init_nb_shark: 5,
            shark_breed_maturity: 5,
            shark_breed_probability: 100,
            shark_speed: 4,
            shark_starving: 4,
            max_turns: 100,
            topology: Topology::Bounded,
        }
    }
}

impl SimulationConfig {
    /// Check every parameter and report all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let positive = [
            ("grid_size", self.grid_size),
            ("fish_breed_maturity", self.fish_breed_maturity),
            ("fish_speed", self.fish_speed),
            ("shark_breed_maturity", self.shark_breed_maturity),
            ("shark_speed", self.shark_speed),
            ("shark_starving", self.shark_starving),
        ];
        for (name, value) in positive {
            if value == 0 {
                problems.push(format!("{} must be positive", name));
            }
        }

        let probabilities = [
            ("fish_breed_probability", self.fish_breed_probability),
            ("shark_breed_probability", self.shark_breed_probability),
        ];
        for (name, value) in probabilities {
            if value > 100 {
                problems.push(format!("{} must be between 0 and 100, got {}", name, value));
            }
        }

        let cells = u64::from(self.grid_size) * u64::from(self.grid_size);
        let animals = u64::from(self.init_nb_fish) + u64::from(self.init_nb_shark);
        if cells < animals {
            problems.push(format!(
                "initial number of animals ({}) bigger than grid ({} cells)",
                animals, cells
            ));
        }

        if self.grid_size > i32::MAX as u32 {
            problems.push(format!("grid_size {} does not fit a coordinate", self.grid_size));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(problems.join("; ")))
        }
    }

    /// Number of cells in the grid
    pub fn cell_count(&self) -> usize {
        (self.grid_size as usize) * (self.grid_size as usize)
    }
}

/// Path of a named configuration inside `dir`
pub fn config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

/// Load and validate a configuration file.
pub fn load_simulation_config(path: &Path) -> Result<SimulationConfig> {
    debug!(path = %path.display(), "Loading simulation config");
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            Error::NotFound(format!("configuration file {}", path.display()))
        }
        _ => Error::Io(e),
    })?;
    let config: SimulationConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration called `name` from `dir`.
pub fn read_simulation_config(dir: &Path, name: &str) -> Result<SimulationConfig> {
    load_simulation_config(&config_path(dir, name))
}

/// Save `config` as `name` in `dir`, refusing to clobber unless `overwrite`.
pub fn save_simulation_config(
    config: &SimulationConfig,
    dir: &Path,
    name: &str,
    overwrite: bool,
) -> Result<PathBuf> {
    config.validate()?;

    let path = config_path(dir, name);
    if path.exists() && !overwrite {
        return Err(Error::AlreadyExists(format!(
            "configuration file {}",
            path.display()
        )));
    }

    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&path, json)?;

    info!(path = %path.display(), "Saved simulation config");
    Ok(path)
}
