//! Animal state and identity allocation.

use fishbowl_core::{AnimalId, AnimalKind, Coord, Fate, SimulationId};
use serde::{Deserialize, Serialize};

/// First id handed out in a run
pub const FIRST_ANIMAL_ID: u32 = 1000;

/// A fish or a shark. Position lives in the tank, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub simulation_id: SimulationId,
    pub kind: AnimalKind,
    pub spawn_turn: u32,
    pub breed_count: u32,
    pub last_breed_turn: u32,
    /// Sharks only; starts at the spawn turn
    pub last_fed_turn: Option<u32>,
    pub alive: bool,
}

impl Animal {
    pub fn fish(id: AnimalId, simulation_id: SimulationId, spawn_turn: u32) -> Self {
        Self {
            id,
            simulation_id,
            kind: AnimalKind::Fish,
            spawn_turn,
            breed_count: 0,
            last_breed_turn: 0,
            last_fed_turn: None,
            alive: true,
        }
    }

    pub fn shark(id: AnimalId, simulation_id: SimulationId, spawn_turn: u32) -> Self {
        Self {
            id,
            simulation_id,
            kind: AnimalKind::Shark,
            spawn_turn,
            breed_count: 0,
            last_breed_turn: 0,
            last_fed_turn: Some(spawn_turn),
            alive: true,
        }
    }

    pub fn is_shark(&self) -> bool {
        self.kind == AnimalKind::Shark
    }

    pub fn is_fish(&self) -> bool {
        self.kind == AnimalKind::Fish
    }

    /// Turns elapsed since spawn; zero if `current_turn` predates it
    pub fn age(&self, current_turn: u32) -> u32 {
        current_turn.saturating_sub(self.spawn_turn)
    }

    pub fn is_mature(&self, current_turn: u32, maturity: u32) -> bool {
        self.age(current_turn) >= maturity
    }

    /// True when a shark has gone unfed for longer than `threshold` turns.
    /// Always false for fish.
    pub fn is_starving(&self, current_turn: u32, threshold: u32) -> bool {
        match self.last_fed_turn {
            Some(last_fed) => current_turn.saturating_sub(last_fed) > threshold,
            None => false,
        }
    }

    pub fn record_feeding(&mut self, turn: u32) {
        self.last_fed_turn = Some(turn);
    }

    pub fn record_breeding(&mut self, turn: u32) {
        self.breed_count += 1;
        self.last_breed_turn = turn;
    }

    pub fn mark_eaten(&mut self) {
        self.alive = false;
    }
}

/// Hands out ids for one simulation run.
///
/// Fish and sharks draw from the same counter, so an id names exactly one
/// animal whatever its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(FIRST_ANIMAL_ID)
    }

    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    pub fn allocate(&mut self) -> AnimalId {
        let id = AnimalId(self.next);
        self.next += 1;
        id
    }

    /// Allocate an id and build a fresh animal of `kind`.
    pub fn spawn(&mut self, kind: AnimalKind, simulation_id: SimulationId, turn: u32) -> Animal {
        let id = self.allocate();
        match kind {
            AnimalKind::Fish => Animal::fish(id, simulation_id, turn),
            AnimalKind::Shark => Animal::shark(id, simulation_id, turn),
        }
    }
}

/// Final state of one animal, as handed to persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalRecord {
    pub id: AnimalId,
    pub simulation_id: SimulationId,
    pub kind: AnimalKind,
    pub spawn_turn: u32,
    pub breed_count: u32,
    pub last_breed_turn: u32,
    pub last_fed_turn: Option<u32>,
    pub alive: bool,
    pub fate: Fate,
    /// Current cell for live animals, last known cell otherwise
    pub coord: Coord,
}

impl AnimalRecord {
    pub fn new(animal: &Animal, coord: Coord, fate: Fate) -> Self {
        Self {
            id: animal.id,
            simulation_id: animal.simulation_id,
            kind: animal.kind,
            spawn_turn: animal.spawn_turn,
            breed_count: animal.breed_count,
            last_breed_turn: animal.last_breed_turn,
            last_fed_turn: animal.last_fed_turn,
            alive: animal.alive,
            fate,
            coord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIM: SimulationId = SimulationId(1);

    #[test]
    fn test_allocator_shares_one_counter_across_kinds() {
        let mut ids = IdAllocator::new();
        let fish = ids.spawn(AnimalKind::Fish, SIM, 0);
        let shark = ids.spawn(AnimalKind::Shark, SIM, 0);
        let next_fish = ids.spawn(AnimalKind::Fish, SIM, 1);

        assert_eq!(fish.id, AnimalId(1000));
        assert_eq!(shark.id, AnimalId(1001));
        assert_eq!(next_fish.id, AnimalId(1002));
    }

    #[test]
    fn test_allocator_never_repeats_after_many_births() {
        let mut ids = IdAllocator::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..3000 {
            let kind = if i % 7 == 0 { AnimalKind::Shark } else { AnimalKind::Fish };
            assert!(seen.insert(ids.spawn(kind, SIM, 0).id));
        }
    }

    #[test]
    fn test_separate_allocators_do_not_share_state() {
        let mut first = IdAllocator::new();
        let mut second = IdAllocator::new();
        first.allocate();
        assert_eq!(second.allocate(), AnimalId(1000));
    }

    #[test]
    fn test_shark_starts_fed_at_spawn() {
        let mut ids = IdAllocator::new();
        let shark = ids.spawn(AnimalKind::Shark, SIM, 3);
        assert_eq!(shark.last_fed_turn, Some(3));
        assert!(shark.alive);

        let fish = ids.spawn(AnimalKind::Fish, SIM, 3);
        assert_eq!(fish.last_fed_turn, None);
    }

    #[test]
    fn test_starvation_threshold_is_strict() {
        let shark = Animal::shark(AnimalId(2000), SIM, 0);
        assert!(!shark.is_starving(1, 1));
        assert!(shark.is_starving(2, 1));

        let fish = Animal::fish(AnimalId(1000), SIM, 0);
        assert!(!fish.is_starving(100, 1));
    }

    #[test]
    fn test_maturity() {
        let fish = Animal::fish(AnimalId(1000), SIM, 2);
        assert!(!fish.is_mature(4, 3));
        assert!(fish.is_mature(5, 3));
        assert_eq!(fish.age(1), 0);
    }

    #[test]
    fn test_record_breeding_and_feeding() {
        let mut shark = Animal::shark(AnimalId(2000), SIM, 0);
        shark.record_breeding(6);
        shark.record_feeding(6);
        assert_eq!(shark.breed_count, 1);
        assert_eq!(shark.last_breed_turn, 6);
        assert_eq!(shark.last_fed_turn, Some(6));
    }

    #[test]
    fn test_record_captures_fate_and_coord() {
        let mut fish = Animal::fish(AnimalId(1000), SIM, 0);
        fish.mark_eaten();
        let record = AnimalRecord::new(&fish, Coord::new(2, 3), Fate::Eaten);
        assert!(!record.alive);
        assert_eq!(record.fate, Fate::Eaten);
        assert_eq!(record.coord, Coord::new(2, 3));
    }
}
