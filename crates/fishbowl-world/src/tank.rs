//! The fish tank: authoritative cell occupancy for one simulation.

use crate::animal::Animal;
use crate::topology;
use fishbowl_core::{AnimalId, AnimalKind, Coord, Error, Result, Topology};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// Placeholder rendered for an empty cell
pub const EMPTY_CELL: &str = "0000";

/// A square grid mapping coordinates to the animal occupying them.
///
/// Iteration is in coordinate order, so passes over the tank are
/// deterministic for a given random seed.
#[derive(Debug, Clone)]
pub struct Tank {
    grid_size: u32,
    topology: Topology,
    cells: BTreeMap<Coord, Animal>,
}

impl Tank {
    pub fn new(grid_size: u32, topology: Topology) -> Self {
        Self {
            grid_size,
            topology,
            cells: BTreeMap::new(),
        }
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Number of occupied cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Put `animal` at `coord`, replacing any occupant.
    pub fn place(&mut self, coord: Coord, animal: Animal) -> Result<()> {
        Topology::validate(coord, self.grid_size)?;
        trace!(animal_id = %animal.id, x = coord.x, y = coord.y, "Placing animal");
        self.cells.insert(coord, animal);
        Ok(())
    }

    /// Move the animal `id` from `from` to `to`.
    ///
    /// Fails without touching the grid if `from` does not hold `id`. The
    /// destination is not checked for an occupant.
    pub fn move_animal(&mut self, from: Coord, id: AnimalId, to: Coord) -> Result<()> {
        Topology::validate(to, self.grid_size)?;
        match self.cells.get(&from) {
            Some(occupant) if occupant.id == id => {}
            Some(occupant) => {
                return Err(Error::InvariantViolation(format!(
                    "cannot move {} from {}: cell holds {}",
                    id, from, occupant.id
                )));
            }
            None => {
                return Err(Error::InvariantViolation(format!(
                    "cannot move {} from {}: cell is empty",
                    id, from
                )));
            }
        }

        if let Some(animal) = self.cells.remove(&from) {
            trace!(animal_id = %id, from = %from, to = %to, "Moving animal");
            self.cells.insert(to, animal);
        }
        Ok(())
    }

    pub fn occupant(&self, coord: Coord) -> Option<&Animal> {
        self.cells.get(&coord)
    }

    pub fn occupant_mut(&mut self, coord: Coord) -> Option<&mut Animal> {
        self.cells.get_mut(&coord)
    }

    /// True when `coord` is on the grid and unoccupied
    pub fn is_free(&self, coord: Coord) -> bool {
        Topology::is_valid(coord, self.grid_size) && !self.cells.contains_key(&coord)
    }

    /// True when `coord` currently holds the animal `id`
    pub fn holds(&self, coord: Coord, id: AnimalId) -> bool {
        self.cells.get(&coord).is_some_and(|animal| animal.id == id)
    }

    /// Cell of animal `id`, by linear scan
    pub fn locate(&self, id: AnimalId) -> Option<Coord> {
        self.cells
            .iter()
            .find(|(_, animal)| animal.id == id)
            .map(|(coord, _)| *coord)
    }

    pub fn count(&self, kind: AnimalKind) -> usize {
        self.cells.values().filter(|animal| animal.kind == kind).count()
    }

    /// Snapshot of every animal of `kind`, detached from the grid
    pub fn list(&self, kind: AnimalKind) -> Vec<(Coord, AnimalId)> {
        self.cells
            .iter()
            .filter(|(_, animal)| animal.kind == kind)
            .map(|(coord, animal)| (*coord, animal.id))
            .collect()
    }

    /// Snapshot of every animal, detached from the grid
    pub fn snapshot(&self) -> Vec<(Coord, AnimalId)> {
        self.cells
            .iter()
            .map(|(coord, animal)| (*coord, animal.id))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, &Animal)> + '_ {
        self.cells.iter().map(|(coord, animal)| (*coord, animal))
    }

    /// Remove every shark unfed for more than `threshold` turns and return
    /// them. Their `alive` flag is left as is.
    pub fn remove_starved(&mut self, current_turn: u32, threshold: u32) -> Vec<(Coord, Animal)> {
        let starved: Vec<Coord> = self
            .cells
            .iter()
            .filter(|(_, animal)| animal.is_starving(current_turn, threshold))
            .map(|(coord, _)| *coord)
            .collect();

        starved
            .into_iter()
            .filter_map(|coord| self.cells.remove(&coord).map(|shark| (coord, shark)))
            .collect()
    }

    /// First neighbour of `coord`, in offset order, that holds a fish.
    pub fn find_prey(&self, coord: Coord) -> Option<(Coord, AnimalId)> {
        topology::neighbors(self.topology, coord, self.grid_size)
            .into_iter()
            .find_map(|neighbor| {
                self.cells
                    .get(&neighbor)
                    .filter(|animal| animal.is_fish())
                    .map(|fish| (neighbor, fish.id))
            })
    }

    /// Every unoccupied neighbour of `coord`, uniformly shuffled when
    /// `shuffle` is set.
    pub fn find_free_neighbors<R: Rng + ?Sized>(
        &self,
        coord: Coord,
        rng: &mut R,
        shuffle: bool,
    ) -> Vec<Coord> {
        let mut free: Vec<Coord> = topology::neighbors(self.topology, coord, self.grid_size)
            .into_iter()
            .filter(|neighbor| !self.cells.contains_key(neighbor))
            .collect();
        if shuffle {
            free.shuffle(rng);
        }
        free
    }

    /// The predator at `predator_coord` eats the fish at `prey_coord` and
    /// moves into its cell. Returns the dead fish.
    pub fn eat(&mut self, current_turn: u32, predator_coord: Coord, prey_coord: Coord) -> Result<Animal> {
        if predator_coord == prey_coord {
            return Err(Error::InvariantViolation(format!(
                "predator and prey share cell {}",
                prey_coord
            )));
        }
        match self.cells.get(&predator_coord) {
            Some(predator) if predator.is_shark() => {}
            Some(other) => {
                return Err(Error::InvariantViolation(format!(
                    "{} at {} is not a predator",
                    other.id, predator_coord
                )));
            }
            None => {
                return Err(Error::InvariantViolation(format!(
                    "no predator at {}",
                    predator_coord
                )));
            }
        }
        match self.cells.get(&prey_coord) {
            Some(prey) if prey.is_fish() => {}
            Some(other) => {
                return Err(Error::InvariantViolation(format!(
                    "{} at {} is not prey",
                    other.id, prey_coord
                )));
            }
            None => {
                return Err(Error::InvariantViolation(format!(
                    "no prey at {}",
                    prey_coord
                )));
            }
        }

        let mut prey = self
            .cells
            .remove(&prey_coord)
            .ok_or_else(|| Error::InvariantViolation(format!("no prey at {}", prey_coord)))?;
        let mut predator = self.cells.remove(&predator_coord).ok_or_else(|| {
            Error::InvariantViolation(format!("no predator at {}", predator_coord))
        })?;

        prey.mark_eaten();
        predator.record_feeding(current_turn);
        self.cells.insert(prey_coord, predator);
        Ok(prey)
    }

    /// Cell strings, one inner vector per `x`
    pub fn rows(&self) -> Vec<Vec<String>> {
        let size = self.grid_size as i32;
        (0..size)
            .map(|x| {
                (0..size)
                    .map(|y| match self.cells.get(&Coord::new(x, y)) {
                        Some(animal) => animal.id.to_string(),
                        None => EMPTY_CELL.to_string(),
                    })
                    .collect()
            })
            .collect()
    }

    /// Fixed-width text rendering, one row per line
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Tank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fishbowl_core::{SimulationId, Topology};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SIM: SimulationId = SimulationId(1);

    fn fish(id: u32) -> Animal {
        Animal::fish(AnimalId(id), SIM, 0)
    }

    fn shark(id: u32) -> Animal {
        Animal::shark(AnimalId(id), SIM, 0)
    }

    #[test]
    fn test_insert_and_get() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(0, 1), fish(1012)).unwrap();
        tank.place(Coord::new(1, 1), fish(1014)).unwrap();

        tank.move_animal(Coord::new(1, 1), AnimalId(1014), Coord::new(2, 2))
            .unwrap();

        assert!(tank.occupant(Coord::new(1, 1)).is_none());
        assert_eq!(tank.occupant(Coord::new(2, 2)).unwrap().id, AnimalId(1014));
        assert_eq!(tank.len(), 2);
    }

    #[test]
    fn test_place_overwrites() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(3, 3), fish(1000)).unwrap();
        tank.place(Coord::new(3, 3), shark(2000)).unwrap();
        assert_eq!(tank.len(), 1);
        assert!(tank.occupant(Coord::new(3, 3)).unwrap().is_shark());
    }

    #[test]
    fn test_place_rejects_off_grid() {
        let mut tank = Tank::new(10, Topology::Bounded);
        let err = tank.place(Coord::new(10, -1), fish(1000)).unwrap_err();
        assert!(matches!(err, Error::Topology(ref e) if e.violations.len() == 2));
        assert!(tank.is_empty());
    }

    #[test]
    fn test_move_identity_guard_leaves_grid_unchanged() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(4, 4), fish(1000)).unwrap();
        let before = tank.snapshot();

        let err = tank
            .move_animal(Coord::new(4, 4), AnimalId(1001), Coord::new(4, 5))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(tank.snapshot(), before);

        let err = tank
            .move_animal(Coord::new(0, 0), AnimalId(1000), Coord::new(0, 1))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(tank.snapshot(), before);
    }

    #[test]
    fn test_count_and_list() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(0, 0), shark(2000)).unwrap();
        tank.place(Coord::new(0, 1), fish(1000)).unwrap();
        tank.place(Coord::new(5, 5), shark(2001)).unwrap();

        assert_eq!(tank.count(AnimalKind::Shark), 2);
        assert_eq!(tank.count(AnimalKind::Fish), 1);

        let sharks = tank.list(AnimalKind::Shark);
        assert_eq!(
            sharks,
            vec![
                (Coord::new(0, 0), AnimalId(2000)),
                (Coord::new(5, 5), AnimalId(2001))
            ]
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(0, 0), fish(1000)).unwrap();
        let snapshot = tank.snapshot();
        tank.move_animal(Coord::new(0, 0), AnimalId(1000), Coord::new(1, 1))
            .unwrap();
        assert_eq!(snapshot, vec![(Coord::new(0, 0), AnimalId(1000))]);
    }

    #[test]
    fn test_neighbor_count_by_position() {
        let tank = Tank::new(10, Topology::Bounded);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        assert_eq!(tank.find_free_neighbors(Coord::new(0, 0), &mut rng, true).len(), 3);
        assert_eq!(tank.find_free_neighbors(Coord::new(1, 0), &mut rng, true).len(), 5);
        assert_eq!(tank.find_free_neighbors(Coord::new(9, 0), &mut rng, true).len(), 3);
    }

    #[test]
    fn test_free_neighbors_skip_occupied() {
        let mut tank = Tank::new(10, Topology::Bounded);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        tank.place(Coord::new(5, 5), fish(1000)).unwrap();
        tank.place(Coord::new(4, 5), fish(1001)).unwrap();
        tank.place(Coord::new(6, 6), shark(2000)).unwrap();

        let free = tank.find_free_neighbors(Coord::new(5, 5), &mut rng, false);
        assert_eq!(free.len(), 6);
        assert!(!free.contains(&Coord::new(4, 5)));
        assert!(!free.contains(&Coord::new(6, 6)));
    }

    #[test]
    fn test_shuffle_keeps_same_cells() {
        let tank = Tank::new(10, Topology::Bounded);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut ordered = tank.find_free_neighbors(Coord::new(5, 5), &mut rng, false);
        let mut shuffled = tank.find_free_neighbors(Coord::new(5, 5), &mut rng, true);
        ordered.sort();
        shuffled.sort();
        assert_eq!(ordered, shuffled);
    }

    #[test]
    fn test_find_prey_first_match() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(5, 5), shark(2000)).unwrap();
        tank.place(Coord::new(6, 6), fish(1000)).unwrap();
        tank.place(Coord::new(6, 5), fish(1001)).unwrap();
        tank.place(Coord::new(4, 5), shark(2001)).unwrap();

        // (6, 5) comes before (6, 6) in offset order; the shark at (4, 5) is skipped
        assert_eq!(
            tank.find_prey(Coord::new(5, 5)),
            Some((Coord::new(6, 5), AnimalId(1001)))
        );
        assert_eq!(tank.find_prey(Coord::new(0, 0)), None);
    }

    #[test]
    fn test_wrapping_prey_lookup() {
        let mut tank = Tank::new(10, Topology::Wrapping);
        tank.place(Coord::new(0, 9), shark(2000)).unwrap();
        tank.place(Coord::new(0, 0), fish(1000)).unwrap();

        assert_eq!(
            tank.find_prey(Coord::new(0, 9)),
            Some((Coord::new(0, 0), AnimalId(1000)))
        );
    }

    #[test]
    fn test_bounded_prey_does_not_wrap() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(0, 9), shark(2000)).unwrap();
        tank.place(Coord::new(0, 0), fish(1000)).unwrap();
        assert_eq!(tank.find_prey(Coord::new(0, 9)), None);
    }

    #[test]
    fn test_feeding_updates_state() {
        let mut tank = Tank::new(10, Topology::Bounded);
        let predator_coord = Coord::new(3, 3);
        let prey_coord = Coord::new(3, 4);
        tank.place(predator_coord, shark(2000)).unwrap();
        tank.place(prey_coord, fish(1000)).unwrap();

        let prey = tank.eat(1, predator_coord, prey_coord).unwrap();

        assert!(!prey.alive);
        assert_eq!(prey.id, AnimalId(1000));
        assert_eq!(tank.locate(AnimalId(1000)), None);
        assert!(tank.occupant(predator_coord).is_none());
        let predator = tank.occupant(prey_coord).unwrap();
        assert_eq!(predator.id, AnimalId(2000));
        assert_eq!(predator.last_fed_turn, Some(1));
    }

    #[test]
    fn test_eat_requires_both_occupants() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(3, 3), shark(2000)).unwrap();
        let before = tank.snapshot();

        let err = tank.eat(1, Coord::new(3, 3), Coord::new(3, 4)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        let err = tank.eat(1, Coord::new(0, 0), Coord::new(3, 3)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(tank.snapshot(), before);
    }

    #[test]
    fn test_starvation_removal() {
        let mut tank = Tank::new(10, Topology::Bounded);
        tank.place(Coord::new(1, 1), shark(2000)).unwrap();
        let mut fed = shark(2001);
        fed.record_feeding(2);
        tank.place(Coord::new(2, 2), fed).unwrap();
        tank.place(Coord::new(3, 3), fish(1000)).unwrap();

        let removed = tank.remove_starved(2, 1);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, Coord::new(1, 1));
        assert!(removed[0].1.alive);
        assert!(tank.occupant(Coord::new(1, 1)).is_none());
        assert!(tank.occupant(Coord::new(2, 2)).is_some());
        assert!(tank.occupant(Coord::new(3, 3)).is_some());
    }

    #[test]
    fn test_render() {
        let mut tank = Tank::new(3, Topology::Bounded);
        tank.place(Coord::new(0, 1), fish(1012)).unwrap();
        tank.place(Coord::new(2, 2), shark(2001)).unwrap();

        assert_eq!(
            tank.render(),
            "0000 1012 0000\n0000 0000 0000\n0000 0000 2001"
        );
        assert_eq!(tank.rows()[0][1], "1012");
    }
}
