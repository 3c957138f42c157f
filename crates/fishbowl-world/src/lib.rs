//! Fish tank world: topology, animals, the tank grid and the turn engine.

pub mod animal;
pub mod engine;
pub mod tank;
pub mod topology;

pub use animal::{Animal, AnimalRecord, IdAllocator};
pub use engine::{EndReason, Engine, EngineState, SimulationReport, TurnSummary};
pub use tank::Tank;
