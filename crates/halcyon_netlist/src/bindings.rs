//! The bidirectional binding tables between netlist and device entities.
//!
//! The forward directions (cell→bel, net→wires) live on the netlist
//! entities themselves; this struct holds the reverse maps. The two are
//! only ever updated together, through the binding methods on
//! [`Context`](crate::Context).

use halcyon_common::Ident;
use halcyon_device::{BelId, PipId, WireId};
use std::collections::HashMap;

/// Reverse lookup tables: which cell occupies a bel, which net owns a wire
/// or pip.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    pub(crate) bel_to_cell: HashMap<BelId, Ident>,
    pub(crate) wire_to_net: HashMap<WireId, Ident>,
    pub(crate) pip_to_net: HashMap<PipId, Ident>,
}

impl Bindings {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell bound to `bel`, if any.
    pub fn cell_at(&self, bel: BelId) -> Option<Ident> {
        self.bel_to_cell.get(&bel).copied()
    }

    /// Returns the net bound to `wire`, if any.
    pub fn net_on_wire(&self, wire: WireId) -> Option<Ident> {
        self.wire_to_net.get(&wire).copied()
    }

    /// Returns the net using `pip`, if any.
    pub fn net_on_pip(&self, pip: PipId) -> Option<Ident> {
        self.pip_to_net.get(&pip).copied()
    }

    /// Returns the number of bound bels.
    pub fn bound_bel_count(&self) -> usize {
        self.bel_to_cell.len()
    }

    /// Returns the number of bound wires.
    pub fn bound_wire_count(&self) -> usize {
        self.wire_to_net.len()
    }
}
