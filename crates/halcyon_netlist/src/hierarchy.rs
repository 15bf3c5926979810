//! Design hierarchy records and placement regions.
//!
//! The netlist itself is flat; hierarchy is preserved alongside it as
//! name-mapping records so that constraints written against hierarchical
//! paths can still be resolved after flattening.

use halcyon_common::{Ident, IdentList};
use halcyon_device::BelId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A non-leaf module instance in the original design hierarchy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HierCell {
    /// Full hierarchical path of this instance.
    pub path: IdentList,
    /// Module type name.
    pub cell_type: Ident,
    /// Local leaf-cell name → flat netlist cell name.
    pub leaf_cells: BTreeMap<Ident, Ident>,
    /// Local net name → flat netlist net name.
    pub nets: BTreeMap<Ident, Ident>,
    /// Module port name → flat net bound to it.
    pub ports: BTreeMap<Ident, Ident>,
    /// Local child instance name → child's full path.
    pub children: BTreeMap<Ident, IdentList>,
}

impl HierCell {
    /// Creates an empty hierarchy record.
    pub fn new(path: IdentList, cell_type: Ident) -> Self {
        Self {
            path,
            cell_type,
            leaf_cells: BTreeMap::new(),
            nets: BTreeMap::new(),
            ports: BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }
}

/// A named fabric subset cells can be constrained into.
///
/// A region is a rectangle in tile coordinates, optionally refined to an
/// explicit bel set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Region {
    /// Region name.
    pub name: Ident,
    /// Inclusive lower-left corner (x, y).
    pub min: (i32, i32),
    /// Inclusive upper-right corner (x, y).
    pub max: (i32, i32),
    /// When non-empty, restricts the region to exactly these bels.
    pub bels: BTreeSet<BelId>,
}

impl Region {
    /// Creates a rectangular region.
    pub fn rect(name: Ident, min: (i32, i32), max: (i32, i32)) -> Self {
        Self {
            name,
            min,
            max,
            bels: BTreeSet::new(),
        }
    }

    /// Returns whether a tile coordinate falls inside the rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min.0 && x <= self.max.0 && y >= self.min.1 && y <= self.max.1
    }

    /// Returns whether `bel` at `(x, y)` satisfies the region constraint.
    pub fn allows(&self, bel: BelId, x: i32, y: i32) -> bool {
        if !self.bels.is_empty() {
            return self.bels.contains(&bel);
        }
        self.contains(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_containment() {
        let r = Region::rect(Ident::from_raw(1), (2, 2), (4, 6));
        assert!(r.contains(2, 2));
        assert!(r.contains(4, 6));
        assert!(r.contains(3, 4));
        assert!(!r.contains(1, 3));
        assert!(!r.contains(5, 3));
    }

    #[test]
    fn explicit_bel_set_overrides_rect() {
        let mut r = Region::rect(Ident::from_raw(1), (0, 0), (10, 10));
        r.bels.insert(BelId::from_raw(7));
        assert!(r.allows(BelId::from_raw(7), 99, 99));
        assert!(!r.allows(BelId::from_raw(8), 5, 5));
    }

    #[test]
    fn hier_cell_maps() {
        let interner = halcyon_common::Interner::new();
        let top = interner.intern("top");
        let sub = interner.intern("u_sub");
        let mut h = HierCell::new(IdentList::single(top), interner.intern("top_mod"));
        h.children
            .insert(sub, IdentList::from_parts(vec![top, sub]));
        h.leaf_cells
            .insert(interner.intern("ff"), interner.intern("u_sub.ff"));
        assert_eq!(h.children.len(), 1);
        assert_eq!(
            h.leaf_cells[&interner.intern("ff")],
            interner.intern("u_sub.ff")
        );
    }
}
