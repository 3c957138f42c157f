//! Core type definitions for the simulation.

use crate::error::{BoundViolation, Error, TopologyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one simulation run, assigned by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimulationId(pub u64);

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an animal, unique within its simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimalId(pub u32);

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Cell coordinate. Signed so that bounded-topology candidates can step
/// outside the grid before they are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, (dx, dy): (i32, i32)) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Species of an animal; fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimalKind {
    Fish,
    Shark,
}

impl AnimalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimalKind::Fish => "fish",
            AnimalKind::Shark => "shark",
        }
    }
}

impl fmt::Display for AnimalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimalKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fish" => Ok(AnimalKind::Fish),
            "shark" => Ok(AnimalKind::Shark),
            other => Err(Error::Serialization(format!("unknown animal kind: {}", other))),
        }
    }
}

/// How an animal left the tank, if it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fate {
    Alive,
    Eaten,
    Starved,
}

impl Fate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fate::Alive => "alive",
            Fate::Eaten => "eaten",
            Fate::Starved => "starved",
        }
    }
}

impl fmt::Display for Fate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(Fate::Alive),
            "eaten" => Ok(Fate::Eaten),
            "starved" => Ok(Fate::Starved),
            other => Err(Error::Serialization(format!("unknown fate: {}", other))),
        }
    }
}

/// Edge policy of the square grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Neighbours past the edge do not exist
    #[default]
    Bounded,
    /// Each axis wraps around (torus)
    Wrapping,
}

impl Topology {
    /// Candidate coordinate one step from `start`.
    ///
    /// Wrapping only corrects a single step of overflow, which is all the
    /// neighbour offsets can produce.
    pub fn resolve(&self, start: Coord, offset: (i32, i32), grid_size: u32) -> Coord {
        let candidate = start.offset(offset);
        match self {
            Topology::Bounded => candidate,
            Topology::Wrapping => {
                let size = grid_size as i32;
                Coord::new(wrap_axis(candidate.x, size), wrap_axis(candidate.y, size))
            }
        }
    }

    pub fn is_valid(coord: Coord, grid_size: u32) -> bool {
        let size = grid_size as i32;
        coord.x >= 0 && coord.y >= 0 && coord.x < size && coord.y < size
    }

    /// Like [`Topology::is_valid`] but reports every violated bound.
    pub fn validate(coord: Coord, grid_size: u32) -> Result<(), TopologyError> {
        let size = grid_size as i32;
        let mut violations = Vec::new();
        if coord.x < 0 {
            violations.push(BoundViolation::XNegative);
        }
        if coord.y < 0 {
            violations.push(BoundViolation::YNegative);
        }
        if coord.x >= size {
            violations.push(BoundViolation::XTooLarge);
        }
        if coord.y >= size {
            violations.push(BoundViolation::YTooLarge);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(TopologyError {
                coord,
                grid_size,
                violations,
            })
        }
    }
}

fn wrap_axis(value: i32, size: i32) -> i32 {
    if value < 0 {
        size - 1
    } else if value >= size {
        value - size
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_resolve_is_plain_addition() {
        let coord = Topology::Bounded.resolve(Coord::new(0, 0), (-1, -1), 10);
        assert_eq!(coord, Coord::new(-1, -1));
        assert!(!Topology::is_valid(coord, 10));
    }

    #[test]
    fn test_wrapping_resolve() {
        let topology = Topology::Wrapping;
        assert_eq!(topology.resolve(Coord::new(0, 9), (0, 1), 10), Coord::new(0, 0));
        assert_eq!(topology.resolve(Coord::new(0, 0), (-1, -1), 10), Coord::new(9, 9));
        assert_eq!(topology.resolve(Coord::new(9, 5), (1, 0), 10), Coord::new(0, 5));
        assert_eq!(topology.resolve(Coord::new(4, 5), (1, 1), 10), Coord::new(5, 6));
    }

    #[test]
    fn test_validate_reports_all_violations() {
        let err = Topology::validate(Coord::new(-1, -3), 10).unwrap_err();
        assert_eq!(
            err.violations,
            vec![BoundViolation::XNegative, BoundViolation::YNegative]
        );

        let err = Topology::validate(Coord::new(10, 11), 10).unwrap_err();
        assert_eq!(
            err.violations,
            vec![BoundViolation::XTooLarge, BoundViolation::YTooLarge]
        );

        assert!(Topology::validate(Coord::new(9, 0), 10).is_ok());
    }

    #[test]
    fn test_animal_id_display_is_fixed_width() {
        assert_eq!(AnimalId(7).to_string(), "0007");
        assert_eq!(AnimalId(2001).to_string(), "2001");
    }

    #[test]
    fn test_kind_and_fate_round_trip_through_str() {
        assert_eq!("shark".parse::<AnimalKind>().unwrap(), AnimalKind::Shark);
        assert_eq!(Fate::Starved.as_str().parse::<Fate>().unwrap(), Fate::Starved);
        assert!("whale".parse::<AnimalKind>().is_err());
    }

    #[test]
    fn test_topology_serializes_lowercase() {
        let json = serde_json::to_string(&Topology::Wrapping).unwrap();
        assert_eq!(json, "\"wrapping\"");
    }
}
