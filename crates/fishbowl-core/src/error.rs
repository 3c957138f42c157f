//! Error types for the simulation.

use crate::types::Coord;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// A single bound a coordinate failed to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundViolation {
    XNegative,
    YNegative,
    XTooLarge,
    YTooLarge,
}

impl fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundViolation::XNegative => write!(f, "x is negative"),
            BoundViolation::YNegative => write!(f, "y is negative"),
            BoundViolation::XTooLarge => write!(f, "x exceeds grid size"),
            BoundViolation::YTooLarge => write!(f, "y exceeds grid size"),
        }
    }
}

/// A coordinate rejected by the bounded topology, with every violated bound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("coordinate {coord} invalid for grid size {grid_size}: {}", join_violations(.violations))]
pub struct TopologyError {
    pub coord: Coord,
    pub grid_size: u32,
    pub violations: Vec<BoundViolation>,
}

fn join_violations(violations: &[BoundViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
