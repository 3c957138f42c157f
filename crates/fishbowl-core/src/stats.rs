//! Simulation-level counters.

use serde::{Deserialize, Serialize};

/// Cumulative counters for one simulation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Fish removed by feeding sharks
    pub fish_eaten: u64,
    /// Fish born from breeding
    pub fish_bred: u64,
    /// Sharks born from breeding
    pub sharks_bred: u64,
    /// Sharks removed by starvation
    pub sharks_starved: u64,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fish_eaten(&mut self) {
        self.fish_eaten += 1;
    }

    pub fn record_fish_bred(&mut self) {
        self.fish_bred += 1;
    }

    pub fn record_shark_bred(&mut self) {
        self.sharks_bred += 1;
    }

    pub fn record_sharks_starved(&mut self, count: usize) {
        self.sharks_starved += count as u64;
    }

    pub fn total_births(&self) -> u64 {
        self.fish_bred + self.sharks_bred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut stats = SimulationStats::new();
        stats.record_fish_eaten();
        stats.record_fish_eaten();
        stats.record_fish_bred();
        stats.record_shark_bred();
        stats.record_sharks_starved(3);

        assert_eq!(stats.fish_eaten, 2);
        assert_eq!(stats.sharks_starved, 3);
        assert_eq!(stats.total_births(), 2);
    }
}
