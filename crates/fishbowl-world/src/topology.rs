//! Neighbourhood enumeration on the square grid.

use fishbowl_core::{Coord, Topology};

/// Moore neighbourhood: W, E, N, S, then the diagonals.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

pub fn neighbor_offsets() -> &'static [(i32, i32); 8] {
    &NEIGHBOR_OFFSETS
}

/// Valid neighbours of `coord`, in offset order.
///
/// The origin and repeated cells are dropped, which only matters on
/// wrapping grids smaller than 3x3.
pub fn neighbors(topology: Topology, coord: Coord, grid_size: u32) -> Vec<Coord> {
    let mut result = Vec::with_capacity(NEIGHBOR_OFFSETS.len());
    for offset in NEIGHBOR_OFFSETS {
        let candidate = topology.resolve(coord, offset, grid_size);
        if candidate == coord || !Topology::is_valid(candidate, grid_size) {
            continue;
        }
        if !result.contains(&candidate) {
            result.push(candidate);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_exclude_origin() {
        assert!(!neighbor_offsets().contains(&(0, 0)));
        assert_eq!(neighbor_offsets().len(), 8);
    }

    #[test]
    fn test_bounded_neighbor_counts() {
        assert_eq!(neighbors(Topology::Bounded, Coord::new(0, 0), 10).len(), 3);
        assert_eq!(neighbors(Topology::Bounded, Coord::new(1, 0), 10).len(), 5);
        assert_eq!(neighbors(Topology::Bounded, Coord::new(9, 0), 10).len(), 3);
        assert_eq!(neighbors(Topology::Bounded, Coord::new(5, 5), 10).len(), 8);
    }

    #[test]
    fn test_wrapping_corner_has_eight_neighbors() {
        let result = neighbors(Topology::Wrapping, Coord::new(0, 9), 10);
        assert_eq!(result.len(), 8);
        assert!(result.contains(&Coord::new(0, 0)));
        assert!(result.contains(&Coord::new(9, 8)));
    }

    #[test]
    fn test_tiny_wrapping_grid_deduplicates() {
        assert!(neighbors(Topology::Wrapping, Coord::new(0, 0), 1).is_empty());
        let result = neighbors(Topology::Wrapping, Coord::new(0, 0), 2);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_neighbors_follow_offset_order() {
        let result = neighbors(Topology::Bounded, Coord::new(5, 5), 10);
        assert_eq!(result[0], Coord::new(4, 5));
        assert_eq!(result[1], Coord::new(6, 5));
        assert_eq!(result[7], Coord::new(6, 6));
    }
}
