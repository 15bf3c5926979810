//! The place-and-route context.
//!
//! One [`Context`] exists per run. It owns the string interner and constids,
//! a snapshot of the immutable device graph, the mutable netlist, the
//! binding tables, the deterministic RNG, and the worker/observer locks.
//! Binding mutations keep the forward (on-entity) and reverse (table) maps
//! consistent; [`verify_bindings`](Context::verify_bindings) re-checks the
//! full set of invariants and is used liberally in tests.

use crate::bindings::Bindings;
use crate::cell::{Cell, PlaceStrength};
use crate::lock::ContextLock;
use crate::net::{Net, WireBinding};
use crate::netlist::{Netlist, NetlistError};
use halcyon_common::{ConstIds, CoreResult, DeterministicRng, Ident, InternalError, Interner};
use halcyon_device::{BelId, DeviceGraph, PipId, WireId};
use std::collections::HashSet;
use std::sync::Arc;

/// The single stateful object threaded through pack, place, and route.
pub struct Context {
    /// The string pool. All identifiers in this context come from here.
    pub interner: Interner,
    /// Well-known handles, interned first.
    pub ids: ConstIds,
    /// The immutable device graph snapshot.
    pub device: Arc<DeviceGraph>,
    /// The mutable netlist.
    pub netlist: Netlist,
    /// Reverse binding tables.
    pub bindings: Bindings,
    /// The deterministic RNG used for all tie-breaking.
    pub rng: DeterministicRng,
    /// Worker/observer lock discipline.
    pub lock: ContextLock,
}

impl Context {
    /// Creates a context from an interner, its constids, and the device
    /// graph built against that interner.
    ///
    /// Architecture families construct all three together (the device
    /// graph's handles must come from this interner) and hand them over
    /// here; see the fabric family for the usual sequence.
    pub fn from_parts(interner: Interner, ids: ConstIds, device: Arc<DeviceGraph>) -> Self {
        Self {
            interner,
            ids,
            device,
            netlist: Netlist::new(),
            bindings: Bindings::new(),
            rng: DeterministicRng::new(),
            lock: ContextLock::new(),
        }
    }

    /// Interns a string in this context's pool.
    pub fn id(&self, s: &str) -> Ident {
        self.interner.intern(s)
    }

    /// Resolves a handle back to its string.
    pub fn name_of(&self, ident: Ident) -> &str {
        self.interner.resolve(ident)
    }

    /// Shorthand for `netlist.cell`.
    pub fn cell(&self, name: Ident) -> Result<&Cell, NetlistError> {
        self.netlist.cell(name)
    }

    /// Shorthand for `netlist.net`.
    pub fn net(&self, name: Ident) -> Result<&Net, NetlistError> {
        self.netlist.net(name)
    }

    // --- Bel bindings ---

    /// Binds `bel` to `cell` with `strength`.
    pub fn bind_bel(&mut self, bel: BelId, cell: Ident, strength: PlaceStrength) -> CoreResult<()> {
        if let Some(existing) = self.bindings.cell_at(bel) {
            return Err(InternalError::new(format!(
                "bel {} already bound to '{}'",
                bel,
                self.name_of(existing)
            )));
        }
        let c = self
            .netlist
            .cells
            .get_mut(&cell)
            .ok_or_else(|| InternalError::new("bind_bel: unknown cell"))?;
        if c.bel.is_some() {
            return Err(InternalError::new(format!(
                "cell '{}' is already placed",
                self.interner.resolve(cell)
            )));
        }
        c.bel = Some(bel);
        c.bel_strength = strength;
        self.bindings.bel_to_cell.insert(bel, cell);
        Ok(())
    }

    /// Unbinds whatever cell occupies `bel`.
    pub fn unbind_bel(&mut self, bel: BelId) -> CoreResult<()> {
        let cell = self
            .bindings
            .bel_to_cell
            .remove(&bel)
            .ok_or_else(|| InternalError::new(format!("bel {bel} is not bound")))?;
        let c = self
            .netlist
            .cells
            .get_mut(&cell)
            .ok_or_else(|| InternalError::new("unbind_bel: table points at missing cell"))?;
        c.bel = None;
        c.bel_strength = PlaceStrength::None;
        Ok(())
    }

    // --- Wire/pip bindings ---

    /// Binds a source wire to `net` with no incoming pip.
    pub fn bind_wire(&mut self, wire: WireId, net: Ident, strength: PlaceStrength) -> CoreResult<()> {
        if let Some(existing) = self.bindings.net_on_wire(wire) {
            return Err(InternalError::new(format!(
                "wire {} already bound to net '{}'",
                wire,
                self.name_of(existing)
            )));
        }
        let n = self
            .netlist
            .nets
            .get_mut(&net)
            .ok_or_else(|| InternalError::new("bind_wire: unknown net"))?;
        n.wires.insert(
            wire,
            WireBinding {
                pip: None,
                strength,
            },
        );
        self.bindings.wire_to_net.insert(wire, net);
        Ok(())
    }

    /// Binds `pip` for `net`: the pip's destination wire joins the net's
    /// routing tree with `pip` recorded as its uphill driver.
    pub fn bind_pip(&mut self, pip: PipId, net: Ident, strength: PlaceStrength) -> CoreResult<()> {
        let dst = self.device.pip(pip).dst;
        if let Some(existing) = self.bindings.net_on_pip(pip) {
            return Err(InternalError::new(format!(
                "pip {} already bound to net '{}'",
                pip,
                self.name_of(existing)
            )));
        }
        if let Some(existing) = self.bindings.net_on_wire(dst) {
            return Err(InternalError::new(format!(
                "pip {} destination wire already bound to net '{}'",
                pip,
                self.name_of(existing)
            )));
        }
        let n = self
            .netlist
            .nets
            .get_mut(&net)
            .ok_or_else(|| InternalError::new("bind_pip: unknown net"))?;
        n.wires.insert(
            dst,
            WireBinding {
                pip: Some(pip),
                strength,
            },
        );
        self.bindings.wire_to_net.insert(dst, net);
        self.bindings.pip_to_net.insert(pip, net);
        Ok(())
    }

    /// Removes `wire` (and its incoming pip, if any) from its net's tree.
    pub fn unbind_wire(&mut self, wire: WireId) -> CoreResult<()> {
        let net = self
            .bindings
            .wire_to_net
            .remove(&wire)
            .ok_or_else(|| InternalError::new(format!("wire {wire} is not bound")))?;
        let n = self
            .netlist
            .nets
            .get_mut(&net)
            .ok_or_else(|| InternalError::new("unbind_wire: table points at missing net"))?;
        if let Some(binding) = n.wires.remove(&wire) {
            if let Some(pip) = binding.pip {
                self.bindings.pip_to_net.remove(&pip);
            }
        }
        Ok(())
    }

    /// Removes `pip` and its destination wire from the owning net's tree.
    pub fn unbind_pip(&mut self, pip: PipId) -> CoreResult<()> {
        if self.bindings.net_on_pip(pip).is_none() {
            return Err(InternalError::new(format!("pip {pip} is not bound")));
        }
        let dst = self.device.pip(pip).dst;
        self.unbind_wire(dst)
    }

    /// Rips up every wire of `net` bound below [`PlaceStrength::Locked`].
    pub fn rip_up_net(&mut self, net: Ident) -> CoreResult<()> {
        let n = self
            .netlist
            .nets
            .get(&net)
            .ok_or_else(|| InternalError::new("rip_up_net: unknown net"))?;
        let loose: Vec<WireId> = n
            .wires
            .iter()
            .filter(|(_, b)| b.strength < PlaceStrength::Locked)
            .map(|(w, _)| *w)
            .collect();
        for wire in loose {
            self.unbind_wire(wire)?;
        }
        Ok(())
    }

    /// Checks every binding invariant.
    ///
    /// 1. cell↔bel agree in both directions.
    /// 2. Every wire of every net's tree appears in `wire_to_net`, and the
    ///    table points back at that net (and nothing else).
    /// 3. Every tree wire with an incoming pip has the pip's source wire in
    ///    the same tree, and following source pointers terminates at the
    ///    net's source wire without a cycle.
    pub fn verify_bindings(&self) -> CoreResult<()> {
        for (name, cell) in &self.netlist.cells {
            if let Some(bel) = cell.bel {
                if self.bindings.cell_at(bel) != Some(*name) {
                    return Err(InternalError::new(format!(
                        "cell '{}' claims bel {} but the table disagrees",
                        self.name_of(*name),
                        bel
                    )));
                }
            }
        }
        for (bel, cell) in &self.bindings.bel_to_cell {
            let c = self.netlist.cells.get(cell).ok_or_else(|| {
                InternalError::new(format!("bel {bel} bound to a missing cell"))
            })?;
            if c.bel != Some(*bel) {
                return Err(InternalError::new(format!(
                    "bel {bel} bound to cell '{}' which claims a different bel",
                    self.name_of(*cell)
                )));
            }
        }

        for (name, net) in &self.netlist.nets {
            for (wire, binding) in &net.wires {
                if self.bindings.net_on_wire(*wire) != Some(*name) {
                    return Err(InternalError::new(format!(
                        "net '{}' tree wire {} missing from the wire table",
                        self.name_of(*name),
                        wire
                    )));
                }
                if let Some(pip) = binding.pip {
                    let p = self.device.pip(pip);
                    if p.dst != *wire {
                        return Err(InternalError::new(format!(
                            "net '{}' wire {} recorded pip {} does not end there",
                            self.name_of(*name),
                            wire,
                            pip
                        )));
                    }
                    if !net.wires.contains_key(&p.src) {
                        return Err(InternalError::new(format!(
                            "net '{}' wire {} has an uphill pip from outside the tree",
                            self.name_of(*name),
                            wire
                        )));
                    }
                }
            }
            // Walk each wire back to the source; a cycle or a dead end is
            // an inconsistency.
            for start in net.wires.keys() {
                let mut cursor = *start;
                let mut seen = HashSet::new();
                loop {
                    if !seen.insert(cursor) {
                        return Err(InternalError::new(format!(
                            "net '{}' routing tree contains a cycle through wire {}",
                            self.name_of(*name),
                            cursor
                        )));
                    }
                    match net.wires.get(&cursor).and_then(|b| b.pip) {
                        Some(pip) => cursor = self.device.pip(pip).src,
                        None => break,
                    }
                }
            }
        }

        for (wire, net) in &self.bindings.wire_to_net {
            let n = self.netlist.nets.get(net).ok_or_else(|| {
                InternalError::new(format!("wire {wire} bound to a missing net"))
            })?;
            if !n.wires.contains_key(wire) {
                return Err(InternalError::new(format!(
                    "wire {} bound to net '{}' which does not list it",
                    wire,
                    self.name_of(*net)
                )));
            }
        }
        Ok(())
    }
}
