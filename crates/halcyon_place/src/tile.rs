//! Per-tile occupancy tracking.
//!
//! The tracker mirrors the bel↔cell bindings, grouped by tile, so that the
//! validity predicate can look at exactly one tile's worth of cells. It is
//! maintained incrementally from the architecture's `on_bel_change` hook.

use halcyon_common::Ident;
use std::collections::{BTreeMap, HashMap};

/// The cells currently bound at one tile, keyed by absolute z.
pub type TileCells = BTreeMap<i32, Ident>;

/// Occupancy of all logic tiles, keyed by (x, y).
#[derive(Clone, Debug, Default)]
pub struct TileStatusTracker {
    tiles: HashMap<(i32, i32), TileCells>,
}

impl TileStatusTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the slot at `(x, y, z)` now holds `cell` (or nothing).
    pub fn set_cell(&mut self, x: i32, y: i32, z: i32, cell: Option<Ident>) {
        match cell {
            Some(c) => {
                self.tiles.entry((x, y)).or_default().insert(z, c);
            }
            None => {
                if let Some(tile) = self.tiles.get_mut(&(x, y)) {
                    tile.remove(&z);
                    if tile.is_empty() {
                        self.tiles.remove(&(x, y));
                    }
                }
            }
        }
    }

    /// Returns the occupancy of the tile at `(x, y)`.
    pub fn tile(&self, x: i32, y: i32) -> Option<&TileCells> {
        self.tiles.get(&(x, y))
    }

    /// Returns the cell at one slot, if bound.
    pub fn cell_at(&self, x: i32, y: i32, z: i32) -> Option<Ident> {
        self.tiles.get(&(x, y)).and_then(|t| t.get(&z)).copied()
    }

    /// Returns the number of occupied tiles.
    pub fn occupied_tile_count(&self) -> usize {
        self.tiles.len()
    }
}
