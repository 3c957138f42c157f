//! Turn engine for running one fish tank simulation.

use crate::animal::{AnimalRecord, IdAllocator, FIRST_ANIMAL_ID};
use crate::tank::Tank;
use fishbowl_core::{
    AnimalId, AnimalKind, Coord, Error, Fate, Result, SimulationConfig, SimulationId,
    SimulationStats,
};
use rand::seq::index;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, event, info, instrument, trace, Level};

/// Animals that already moved this turn, mapped to the cell they left
type ActedThisTurn = HashMap<AnimalId, Coord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Running,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    MaxTurns,
    NoSharks,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::MaxTurns => "max_turns",
            EndReason::NoSharks => "no_sharks",
        }
    }
}

/// What happened during one call to [`Engine::play_turn`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub turn: u32,
    pub sharks_starved: usize,
    pub fish_eaten: usize,
    pub sharks_bred: usize,
    pub fish_bred: usize,
    pub moved: usize,
    pub fish_remaining: usize,
    pub sharks_remaining: usize,
    pub ended: bool,
}

/// Everything persistence needs once a run is over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub simulation_id: SimulationId,
    pub config: SimulationConfig,
    pub stats: SimulationStats,
    pub turns_played: u32,
    pub end_reason: Option<EndReason>,
    pub animals: Vec<AnimalRecord>,
}

pub struct Engine {
    simulation_id: SimulationId,
    config: SimulationConfig,
    tank: Tank,
    ids: IdAllocator,
    rng: ChaCha8Rng,
    turn: u32,
    stats: SimulationStats,
    state: EngineState,
    end_reason: Option<EndReason>,
    // Eaten and starved animals, with the cell they were last seen in
    departed: Vec<AnimalRecord>,
}

impl Engine {
    /// Validate `config`, then spawn the initial population from `seed`.
    pub fn new(simulation_id: SimulationId, config: SimulationConfig, seed: u64) -> Result<Self> {
        Self::with_rng(simulation_id, config, ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(
        simulation_id: SimulationId,
        config: SimulationConfig,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        config.validate()?;
        let tank = Tank::new(config.grid_size, config.topology);

        let mut engine = Self::assemble(simulation_id, config, tank, IdAllocator::new(), rng);
        engine.spawn()?;
        engine.check_initial_state();

        info!(
            event = "simulation_created",
            simulation_id = %engine.simulation_id,
            grid_size = engine.config.grid_size,
            topology = ?engine.config.topology,
            fish = engine.tank.count(AnimalKind::Fish),
            sharks = engine.tank.count(AnimalKind::Shark),
            max_turns = engine.config.max_turns,
            "Simulation created"
        );
        Ok(engine)
    }

    /// Start from an already populated tank instead of a random spawn.
    ///
    /// Ids for newborns continue after the highest id already present.
    pub fn with_tank(
        simulation_id: SimulationId,
        config: SimulationConfig,
        tank: Tank,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        if tank.grid_size() != config.grid_size || tank.topology() != config.topology {
            return Err(Error::Configuration(format!(
                "tank is {}x{} {:?} but config asks for {}x{} {:?}",
                tank.grid_size(),
                tank.grid_size(),
                tank.topology(),
                config.grid_size,
                config.grid_size,
                config.topology
            )));
        }

        let next_id = tank
            .iter()
            .map(|(_, animal)| animal.id.0 + 1)
            .max()
            .unwrap_or(FIRST_ANIMAL_ID)
            .max(FIRST_ANIMAL_ID);
        let ids = IdAllocator::starting_at(next_id);

        let mut engine = Self::assemble(
            simulation_id,
            config,
            tank,
            ids,
            ChaCha8Rng::seed_from_u64(seed),
        );
        engine.check_initial_state();
        Ok(engine)
    }

    fn assemble(
        simulation_id: SimulationId,
        config: SimulationConfig,
        tank: Tank,
        ids: IdAllocator,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            simulation_id,
            config,
            tank,
            ids,
            rng,
            turn: 0,
            stats: SimulationStats::new(),
            state: EngineState::Running,
            end_reason: None,
            departed: Vec::new(),
        }
    }

    fn check_initial_state(&mut self) {
        if self.config.max_turns == 0 {
            info!(simulation_id = %self.simulation_id, "Simulation completed. Max turns: 0");
            self.state = EngineState::Ended;
            self.end_reason = Some(EndReason::MaxTurns);
        }
    }

    /// Scatter the initial fish, then sharks, over distinct random cells.
    fn spawn(&mut self) -> Result<()> {
        let size = self.config.grid_size as usize;
        let fish = self.config.init_nb_fish as usize;
        let sharks = self.config.init_nb_shark as usize;

        // Draws only the cells it needs; the grid may be far larger
        let cells = index::sample(&mut self.rng, self.config.cell_count(), fish + sharks);
        for (i, cell) in cells.into_iter().enumerate() {
            let kind = if i < fish {
                AnimalKind::Fish
            } else {
                AnimalKind::Shark
            };
            let coord = Coord::new((cell / size) as i32, (cell % size) as i32);
            let animal = self.ids.spawn(kind, self.simulation_id, 0);
            self.tank.place(coord, animal)?;
        }
        Ok(())
    }

    pub fn simulation_id(&self) -> SimulationId {
        self.simulation_id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tank(&self) -> &Tank {
        &self.tank
    }

    pub fn current_turn(&self) -> u32 {
        self.turn
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == EngineState::Ended
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Play turns until the simulation ends.
    pub fn run(&mut self) -> Result<SimulationReport> {
        while !self.is_ended() {
            self.play_turn()?;
        }
        Ok(self.report())
    }

    /// Resolve one turn: starvation, feeding, breeding, then movement.
    ///
    /// Fails with [`Error::InvalidState`] once the simulation has ended. An
    /// error part way through leaves the mutations made so far in place.
    #[instrument(skip(self), fields(simulation_id = %self.simulation_id, turn = self.turn + 1))]
    pub fn play_turn(&mut self) -> Result<TurnSummary> {
        if self.is_ended() {
            return Err(Error::InvalidState(format!(
                "simulation {} already ended at turn {}",
                self.simulation_id, self.turn
            )));
        }

        self.turn += 1;
        debug!("******************** TURN: {:<3} ********************", self.turn);

        let mut summary = TurnSummary {
            turn: self.turn,
            ..Default::default()
        };

        summary.sharks_starved = self.remove_starved_sharks();
        let mut acted = self.feed_sharks(&mut summary)?;
        self.breed_sharks(&mut acted, &mut summary)?;
        self.breed_fish(&mut acted, &mut summary)?;
        summary.moved = self.move_remaining_animals(&acted)?;

        summary.fish_remaining = self.tank.count(AnimalKind::Fish);
        summary.sharks_remaining = self.tank.count(AnimalKind::Shark);

        if let Some(reason) = self.check_simulation_ends(summary.sharks_remaining) {
            self.state = EngineState::Ended;
            self.end_reason = Some(reason);
            self.emit_final_summary();
        }
        summary.ended = self.is_ended();

        debug!(
            event = "turn_complete",
            fish = summary.fish_remaining,
            sharks = summary.sharks_remaining,
            eaten = summary.fish_eaten,
            starved = summary.sharks_starved,
            fish_bred = summary.fish_bred,
            sharks_bred = summary.sharks_bred,
            moved = summary.moved,
            "******************** END TURN: {:<3} ****************",
            self.turn
        );

        Ok(summary)
    }

    fn check_simulation_ends(&self, sharks_remaining: usize) -> Option<EndReason> {
        if self.turn >= self.config.max_turns {
            info!(
                max_turns = self.config.max_turns,
                "Simulation completed. Max turns: {}", self.config.max_turns
            );
            Some(EndReason::MaxTurns)
        } else if sharks_remaining == 0 {
            info!(turn = self.turn, "Simulation completed. No sharks remaining");
            Some(EndReason::NoSharks)
        } else {
            None
        }
    }

    fn remove_starved_sharks(&mut self) -> usize {
        let starved = self
            .tank
            .remove_starved(self.turn, self.config.shark_starving);

        for (coord, shark) in &starved {
            debug!(
                event = "shark_starved",
                shark_id = %shark.id,
                last_fed_turn = ?shark.last_fed_turn,
                x = coord.x,
                y = coord.y,
                "Shark starved"
            );
            self.departed
                .push(AnimalRecord::new(shark, *coord, Fate::Starved));
        }

        if !starved.is_empty() {
            event!(
                Level::DEBUG,
                counter_name = "sharks_starved",
                counter_value = starved.len(),
                turn = self.turn,
                "Starvation metric"
            );
        }
        self.stats.record_sharks_starved(starved.len());
        starved.len()
    }

    fn feed_sharks(&mut self, summary: &mut TurnSummary) -> Result<ActedThisTurn> {
        let mut acted = ActedThisTurn::new();

        for (shark_coord, shark_id) in self.tank.list(AnimalKind::Shark) {
            if !self.tank.holds(shark_coord, shark_id) {
                continue;
            }
            trace!(shark_id = %shark_id, "Looking for fish around shark at {}", shark_coord);

            let Some((fish_coord, fish_id)) = self.tank.find_prey(shark_coord) else {
                continue;
            };

            let fish = self.tank.eat(self.turn, shark_coord, fish_coord)?;
            self.departed
                .push(AnimalRecord::new(&fish, fish_coord, Fate::Eaten));
            acted.insert(shark_id, shark_coord);
            self.stats.record_fish_eaten();
            summary.fish_eaten += 1;

            debug!(
                event = "fish_eaten",
                shark_id = %shark_id,
                fish_id = %fish_id,
                from = %shark_coord,
                to = %fish_coord,
                "Shark ate fish"
            );
        }

        Ok(acted)
    }

    /// Breeding draw: uniform in [0, 100], success when at most `probability`
    fn roll_breeding(&mut self, probability: u32) -> bool {
        self.rng.gen_range(0..=100u32) <= probability
    }

    /// Whether the animal `id` at `coord` is old enough to breed.
    /// `None` when the cell no longer holds it.
    fn mature_at(&self, coord: Coord, id: AnimalId, maturity: u32) -> Option<bool> {
        self.tank
            .occupant(coord)
            .filter(|animal| animal.id == id)
            .map(|animal| animal.is_mature(self.turn, maturity))
    }

    /// Move the parent at `coord` into its first free neighbour and return
    /// the cell it vacated, or `None` when it is boxed in.
    fn make_room(&mut self, coord: Coord, id: AnimalId, acted: &mut ActedThisTurn) -> Result<Option<Coord>> {
        let free = self.tank.find_free_neighbors(coord, &mut self.rng, true);
        let Some(&target) = free.first() else {
            trace!(animal_id = %id, x = coord.x, y = coord.y, "No room to breed");
            return Ok(None);
        };
        self.tank.move_animal(coord, id, target)?;
        acted.insert(id, coord);
        trace!(animal_id = %id, "Moved parent to {}", target);
        Ok(Some(target))
    }

    fn record_parent_breeding(&mut self, coord: Coord, id: AnimalId) -> Result<()> {
        let turn = self.turn;
        match self.tank.occupant_mut(coord) {
            Some(parent) if parent.id == id => {
                parent.record_breeding(turn);
                Ok(())
            }
            _ => Err(Error::InvariantViolation(format!(
                "parent {} missing from {} after breeding",
                id, coord
            ))),
        }
    }

    fn breed_sharks(&mut self, acted: &mut ActedThisTurn, summary: &mut TurnSummary) -> Result<()> {
        let maturity = self.config.shark_breed_maturity;
        let probability = self.config.shark_breed_probability;

        for (coord, id) in self.tank.list(AnimalKind::Shark) {
            match self.mature_at(coord, id, maturity) {
                Some(true) => {}
                _ => continue,
            }
            if !self.roll_breeding(probability) {
                continue;
            }

            // A shark that fed already left a cell behind; its pup goes there
            let (parent_coord, nursery) = match acted.get(&id).copied() {
                Some(origin) => {
                    if !self.tank.is_free(origin) {
                        debug!(shark_id = %id, "Vacated cell {} was taken, no breeding", origin);
                        continue;
                    }
                    (coord, origin)
                }
                None => match self.make_room(coord, id, acted)? {
                    Some(target) => (target, coord),
                    None => continue,
                },
            };

            let pup = self.ids.spawn(AnimalKind::Shark, self.simulation_id, self.turn);
            let pup_id = pup.id;
            self.tank.place(nursery, pup)?;
            self.record_parent_breeding(parent_coord, id)?;
            self.stats.record_shark_bred();
            summary.sharks_bred += 1;

            debug!(
                event = "shark_bred",
                parent_id = %id,
                pup_id = %pup_id,
                parent = %parent_coord,
                pup = %nursery,
                "New shark"
            );
        }

        Ok(())
    }

    fn breed_fish(&mut self, acted: &mut ActedThisTurn, summary: &mut TurnSummary) -> Result<()> {
        let maturity = self.config.fish_breed_maturity;
        let probability = self.config.fish_breed_probability;

        for (coord, id) in self.tank.list(AnimalKind::Fish) {
            match self.mature_at(coord, id, maturity) {
                Some(true) => {}
                _ => continue,
            }
            if !self.roll_breeding(probability) {
                continue;
            }
            let Some(parent_coord) = self.make_room(coord, id, acted)? else {
                continue;
            };

            let fry = self.ids.spawn(AnimalKind::Fish, self.simulation_id, self.turn);
            let fry_id = fry.id;
            self.tank.place(coord, fry)?;
            self.record_parent_breeding(parent_coord, id)?;
            self.stats.record_fish_bred();
            summary.fish_bred += 1;

            debug!(
                event = "fish_bred",
                parent_id = %id,
                fry_id = %fry_id,
                parent = %parent_coord,
                fry = %coord,
                "New fish"
            );
        }

        Ok(())
    }

    /// Every animal that has not acted yet steps into a random free
    /// neighbour, if it has one.
    fn move_remaining_animals(&mut self, acted: &ActedThisTurn) -> Result<usize> {
        let mut moved = 0;

        for (coord, id) in self.tank.snapshot() {
            if acted.contains_key(&id) || !self.tank.holds(coord, id) {
                continue;
            }
            let free = self.tank.find_free_neighbors(coord, &mut self.rng, true);
            if let Some(&target) = free.first() {
                self.tank.move_animal(coord, id, target)?;
                moved += 1;
            }
        }

        Ok(moved)
    }

    fn emit_final_summary(&self) {
        info!(
            event = "simulation_summary",
            simulation_id = %self.simulation_id,
            turns = self.turn,
            end_reason = ?self.end_reason,
            fish_remaining = self.tank.count(AnimalKind::Fish),
            sharks_remaining = self.tank.count(AnimalKind::Shark),
            fish_eaten = self.stats.fish_eaten,
            fish_bred = self.stats.fish_bred,
            sharks_bred = self.stats.sharks_bred,
            sharks_starved = self.stats.sharks_starved,
            "Simulation ended"
        );

        event!(
            Level::INFO,
            gauge_name = "final_population",
            gauge_value = self.tank.len(),
            "Final population gauge"
        );
    }

    /// Final state of every animal that ever lived in this run: those still
    /// in the tank first, then the eaten and starved in the order they left.
    pub fn report(&self) -> SimulationReport {
        let mut animals: Vec<AnimalRecord> = self
            .tank
            .iter()
            .map(|(coord, animal)| AnimalRecord::new(animal, coord, Fate::Alive))
            .collect();
        animals.extend(self.departed.iter().cloned());

        SimulationReport {
            simulation_id: self.simulation_id,
            config: self.config.clone(),
            stats: self.stats,
            turns_played: self.turn,
            end_reason: self.end_reason,
            animals,
        }
    }
}
