//! Database layer for persisting finished simulations.

use fishbowl_core::{
    AnimalId, AnimalKind, Coord, Error, Fate, Result, SimulationConfig, SimulationId,
    SimulationStats,
};
use fishbowl_world::{AnimalRecord, SimulationReport};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Aggregate counters as stored for one simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStats {
    pub stats: SimulationStats,
    pub turns_played: u32,
    pub end_reason: Option<String>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Database(format!("Failed to create database directory: {}", e))
            })?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path))
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS simulations (
                sim_id INTEGER PRIMARY KEY AUTOINCREMENT,
                config_data TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS animals (
                sim_id INTEGER NOT NULL,
                animal_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                spawn_turn INTEGER NOT NULL,
                breed_count INTEGER NOT NULL,
                last_breed_turn INTEGER NOT NULL,
                last_fed_turn INTEGER,
                alive INTEGER NOT NULL,
                fate TEXT NOT NULL,
                coord_x INTEGER NOT NULL,
                coord_y INTEGER NOT NULL,
                PRIMARY KEY (sim_id, animal_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS simulation_stats (
                sim_id INTEGER PRIMARY KEY,
                fish_eaten INTEGER NOT NULL,
                fish_bred INTEGER NOT NULL,
                sharks_bred INTEGER NOT NULL,
                sharks_starved INTEGER NOT NULL,
                turns_played INTEGER NOT NULL,
                end_reason TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tank_grids (
                tank_grid_id INTEGER PRIMARY KEY AUTOINCREMENT,
                sim_id INTEGER NOT NULL,
                sim_turn INTEGER NOT NULL,
                grid TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Store the configuration of a new run and assign its id.
    pub async fn create_simulation(&self, config: &SimulationConfig) -> Result<SimulationId> {
        let config_data = serde_json::to_string(config)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO simulations (config_data, created_at)
            VALUES (?1, ?2)
            "#,
        )
        .bind(&config_data)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to store simulation config: {}", e)))?;

        let simulation_id = SimulationId(result.last_insert_rowid() as u64);
        debug!(simulation_id = %simulation_id, "Stored simulation config");
        Ok(simulation_id)
    }

    pub async fn get_simulation_config(&self, simulation_id: SimulationId) -> Result<Option<SimulationConfig>> {
        let row = sqlx::query("SELECT config_data FROM simulations WHERE sim_id = ?1")
            .bind(simulation_id.0 as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to get simulation config: {}", e)))?;

        match row {
            Some(row) => {
                let config_data: String = row.get("config_data");
                Ok(Some(serde_json::from_str(&config_data)?))
            }
            None => Ok(None),
        }
    }

    pub async fn save_animal(&self, record: &AnimalRecord) -> Result<()> {
        insert_animal(record)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to store animal {}: {}", record.id, e)))?;
        Ok(())
    }

    pub async fn get_animal(&self, simulation_id: SimulationId, animal_id: AnimalId) -> Result<Option<AnimalRecord>> {
        let row = sqlx::query("SELECT * FROM animals WHERE sim_id = ?1 AND animal_id = ?2")
            .bind(simulation_id.0 as i64)
            .bind(i64::from(animal_id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to get animal: {}", e)))?;

        row.map(|row| animal_from_row(&row)).transpose()
    }

    pub async fn list_animals(&self, simulation_id: SimulationId) -> Result<Vec<AnimalRecord>> {
        let rows = sqlx::query("SELECT * FROM animals WHERE sim_id = ?1 ORDER BY animal_id")
            .bind(simulation_id.0 as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list animals: {}", e)))?;

        rows.iter().map(animal_from_row).collect()
    }

    pub async fn save_stats(
        &self,
        simulation_id: SimulationId,
        stats: &SimulationStats,
        turns_played: u32,
        end_reason: Option<&str>,
    ) -> Result<()> {
        insert_stats(simulation_id, stats, turns_played, end_reason)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to store stats: {}", e)))?;
        Ok(())
    }

    pub async fn get_stats(&self, simulation_id: SimulationId) -> Result<Option<StoredStats>> {
        let row = sqlx::query("SELECT * FROM simulation_stats WHERE sim_id = ?1")
            .bind(simulation_id.0 as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to get stats: {}", e)))?;

        Ok(row.map(|row| StoredStats {
            stats: SimulationStats {
                fish_eaten: row.get::<i64, _>("fish_eaten") as u64,
                fish_bred: row.get::<i64, _>("fish_bred") as u64,
                sharks_bred: row.get::<i64, _>("sharks_bred") as u64,
                sharks_starved: row.get::<i64, _>("sharks_starved") as u64,
            },
            turns_played: row.get::<i64, _>("turns_played") as u32,
            end_reason: row.get("end_reason"),
        }))
    }

    /// Write every animal and the aggregate stats of a finished run in one
    /// transaction.
    pub async fn save_report(&self, report: &SimulationReport) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        for record in &report.animals {
            insert_animal(record)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Database(format!("Failed to store animal {}: {}", record.id, e)))?;
        }

        insert_stats(
            report.simulation_id,
            &report.stats,
            report.turns_played,
            report.end_reason.map(|reason| reason.as_str()),
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to store stats: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit report: {}", e)))?;

        info!(
            simulation_id = %report.simulation_id,
            animals = report.animals.len(),
            "Stored simulation report"
        );
        Ok(())
    }

    pub async fn save_tank_grid(&self, simulation_id: SimulationId, turn: u32, grid: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tank_grids (sim_id, sim_turn, grid)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(simulation_id.0 as i64)
        .bind(i64::from(turn))
        .bind(grid)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to store tank grid: {}", e)))?;

        Ok(())
    }

    pub async fn get_tank_grid(&self, simulation_id: SimulationId, turn: u32) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT grid FROM tank_grids WHERE sim_id = ?1 AND sim_turn = ?2 ORDER BY tank_grid_id DESC LIMIT 1",
        )
        .bind(simulation_id.0 as i64)
        .bind(i64::from(turn))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get tank grid: {}", e)))?;

        Ok(row.map(|r| r.get("grid")))
    }
}

fn insert_animal(record: &AnimalRecord) -> sqlx::query::Query<'static, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'static>> {
    sqlx::query(
        r#"
        INSERT INTO animals (
            sim_id, animal_id, kind, spawn_turn, breed_count, last_breed_turn,
            last_fed_turn, alive, fate, coord_x, coord_y
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(sim_id, animal_id) DO UPDATE SET
            breed_count = ?5,
            last_breed_turn = ?6,
            last_fed_turn = ?7,
            alive = ?8,
            fate = ?9,
            coord_x = ?10,
            coord_y = ?11
        "#,
    )
    .bind(record.simulation_id.0 as i64)
    .bind(i64::from(record.id.0))
    .bind(record.kind.as_str())
    .bind(i64::from(record.spawn_turn))
    .bind(i64::from(record.breed_count))
    .bind(i64::from(record.last_breed_turn))
    .bind(record.last_fed_turn.map(i64::from))
    .bind(record.alive)
    .bind(record.fate.as_str())
    .bind(i64::from(record.coord.x))
    .bind(i64::from(record.coord.y))
}

fn insert_stats(
    simulation_id: SimulationId,
    stats: &SimulationStats,
    turns_played: u32,
    end_reason: Option<&str>,
) -> sqlx::query::Query<'static, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'static>> {
    sqlx::query(
        r#"
        INSERT INTO simulation_stats (
            sim_id, fish_eaten, fish_bred, sharks_bred, sharks_starved,
            turns_played, end_reason, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(sim_id) DO UPDATE SET
            fish_eaten = ?2,
            fish_bred = ?3,
            sharks_bred = ?4,
            sharks_starved = ?5,
            turns_played = ?6,
            end_reason = ?7
        "#,
    )
    .bind(simulation_id.0 as i64)
    .bind(stats.fish_eaten as i64)
    .bind(stats.fish_bred as i64)
    .bind(stats.sharks_bred as i64)
    .bind(stats.sharks_starved as i64)
    .bind(i64::from(turns_played))
    .bind(end_reason.map(str::to_string))
    .bind(chrono::Utc::now().timestamp())
}

fn animal_from_row(row: &SqliteRow) -> Result<AnimalRecord> {
    let kind: String = row.get("kind");
    let fate: String = row.get("fate");

    Ok(AnimalRecord {
        id: AnimalId(row.get::<i64, _>("animal_id") as u32),
        simulation_id: SimulationId(row.get::<i64, _>("sim_id") as u64),
        kind: kind.parse::<AnimalKind>()?,
        spawn_turn: row.get::<i64, _>("spawn_turn") as u32,
        breed_count: row.get::<i64, _>("breed_count") as u32,
        last_breed_turn: row.get::<i64, _>("last_breed_turn") as u32,
        last_fed_turn: row.get::<Option<i64>, _>("last_fed_turn").map(|turn| turn as u32),
        alive: row.get("alive"),
        fate: fate.parse::<Fate>()?,
        coord: Coord::new(
            row.get::<i64, _>("coord_x") as i32,
            row.get::<i64, _>("coord_y") as i32,
        ),
    })
}
