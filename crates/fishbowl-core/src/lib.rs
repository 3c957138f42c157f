//! Core types and utilities for the fishbowl predator-prey simulation.

pub mod types;
pub mod config;
pub mod error;
pub mod stats;

pub use error::{BoundViolation, Error, Result, TopologyError};
pub use types::*;
pub use config::*;
pub use stats::*;
