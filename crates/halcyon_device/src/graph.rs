//! The device graph: arenas of bels, wires, and pips with consistent
//! two-way incidence.
//!
//! The graph is append-only while an architecture family builds it; the
//! builder methods keep the incidence lists on wires and the endpoints on
//! pips in agreement, and [`DeviceGraph::validate`] re-checks the whole
//! structure after a load from binary.

use crate::ids::{BelId, PipId, WireId};
use crate::types::{Bel, BelPin, Delay, Loc, Pip, PortDir, PseudoPipTag, Wire, WireCategory};
use halcyon_common::Ident;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A structural inconsistency found by [`DeviceGraph::validate`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceGraphError {
    /// A pip references a wire index outside the wire arena.
    #[error("pip {pip} references out-of-range wire {wire}")]
    DanglingPipWire {
        /// The offending pip.
        pip: PipId,
        /// The out-of-range wire index.
        wire: WireId,
    },
    /// A bel pin references a wire index outside the wire arena.
    #[error("bel {bel} pin references out-of-range wire {wire}")]
    DanglingBelPinWire {
        /// The offending bel.
        bel: BelId,
        /// The out-of-range wire index.
        wire: WireId,
    },
    /// A wire's uphill/downhill list disagrees with the pip endpoints.
    #[error("wire {wire} incidence list disagrees with pip {pip} endpoints")]
    IncidenceMismatch {
        /// The wire whose list is wrong.
        wire: WireId,
        /// The pip in disagreement.
        pip: PipId,
    },
    /// A wire's bel-pin list disagrees with the bel's own pins.
    #[error("wire {wire} bel-pin list disagrees with bel {bel}")]
    BelPinMismatch {
        /// The wire whose list is wrong.
        wire: WireId,
        /// The bel in disagreement.
        bel: BelId,
    },
}

/// The immutable description of one device: bels, wires, pips, and indices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceGraph {
    /// Device name (e.g. the part number).
    pub name: String,
    /// Grid width in tiles.
    pub width: i32,
    /// Grid height in tiles.
    pub height: i32,
    /// Number of global buffer resources available to the packer.
    pub global_buffers: u32,
    bels: Vec<Bel>,
    wires: Vec<Wire>,
    pips: Vec<Pip>,
    #[serde(skip)]
    bel_by_name: HashMap<Ident, BelId>,
    #[serde(skip)]
    wire_by_name: HashMap<Ident, WireId>,
    #[serde(skip)]
    bel_by_loc: HashMap<Loc, BelId>,
    #[serde(skip)]
    pip_by_endpoints: HashMap<(WireId, WireId), PipId>,
}

impl DeviceGraph {
    /// Creates an empty device graph.
    pub fn new(name: impl Into<String>, width: i32, height: i32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            global_buffers: 0,
            bels: Vec::new(),
            wires: Vec::new(),
            pips: Vec::new(),
            bel_by_name: HashMap::new(),
            wire_by_name: HashMap::new(),
            bel_by_loc: HashMap::new(),
            pip_by_endpoints: HashMap::new(),
        }
    }

    // --- Builder operations ---

    /// Adds a wire and returns its ID.
    pub fn add_wire(
        &mut self,
        name: Ident,
        wire_type: Ident,
        category: WireCategory,
        x: i32,
        y: i32,
        delay: Delay,
    ) -> WireId {
        let id = WireId::from_raw(self.wires.len() as u32);
        self.wires.push(Wire {
            name,
            wire_type,
            category,
            x,
            y,
            delay,
            bel_pins: Vec::new(),
            uphill: Vec::new(),
            downhill: Vec::new(),
        });
        self.wire_by_name.insert(name, id);
        id
    }

    /// Adds a bel with no pins and returns its ID.
    pub fn add_bel(
        &mut self,
        name: Ident,
        bel_type: Ident,
        loc: Loc,
        hidden: bool,
        bucket: Ident,
    ) -> BelId {
        let id = BelId::from_raw(self.bels.len() as u32);
        self.bels.push(Bel {
            name,
            bel_type,
            loc,
            pins: Vec::new(),
            hidden,
            bucket,
        });
        self.bel_by_name.insert(name, id);
        self.bel_by_loc.insert(loc, id);
        id
    }

    /// Adds a pin to `bel`, wiring it to `wire` in both directions.
    ///
    /// # Panics
    ///
    /// Panics if `bel` or `wire` is out of range.
    pub fn add_bel_pin(&mut self, bel: BelId, pin: Ident, dir: PortDir, wire: WireId) {
        assert!(wire.index() < self.wires.len(), "bel pin on unknown wire");
        self.bels[bel.index()].pins.push(BelPin {
            name: pin,
            dir,
            wire,
        });
        self.wires[wire.index()].bel_pins.push((bel, pin));
    }

    /// Adds a pip from `src` to `dst`, updating both incidence lists.
    ///
    /// # Panics
    ///
    /// Panics if either wire is out of range.
    pub fn add_pip(
        &mut self,
        src: WireId,
        dst: WireId,
        loc: Loc,
        pip_type: Ident,
        delay: Delay,
        pseudo: Option<PseudoPipTag>,
    ) -> PipId {
        assert!(src.index() < self.wires.len(), "pip source wire unknown");
        assert!(dst.index() < self.wires.len(), "pip destination wire unknown");
        let id = PipId::from_raw(self.pips.len() as u32);
        self.pips.push(Pip {
            src,
            dst,
            loc,
            pip_type,
            delay,
            pseudo,
        });
        self.wires[src.index()].downhill.push(id);
        self.wires[dst.index()].uphill.push(id);
        self.pip_by_endpoints.insert((src, dst), id);
        id
    }

    // --- Accessors ---

    /// Returns the bel with the given ID.
    pub fn bel(&self, id: BelId) -> &Bel {
        &self.bels[id.index()]
    }

    /// Returns the wire with the given ID.
    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.index()]
    }

    /// Returns the pip with the given ID.
    pub fn pip(&self, id: PipId) -> &Pip {
        &self.pips[id.index()]
    }

    /// Returns the number of bels.
    pub fn bel_count(&self) -> usize {
        self.bels.len()
    }

    /// Returns the number of wires.
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// Returns the number of pips.
    pub fn pip_count(&self) -> usize {
        self.pips.len()
    }

    /// Iterates over all bel IDs in index order.
    pub fn bels(&self) -> impl Iterator<Item = BelId> + '_ {
        (0..self.bels.len() as u32).map(BelId::from_raw)
    }

    /// Iterates over all wire IDs in index order.
    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        (0..self.wires.len() as u32).map(WireId::from_raw)
    }

    /// Iterates over all pip IDs in index order.
    pub fn pips(&self) -> impl Iterator<Item = PipId> + '_ {
        (0..self.pips.len() as u32).map(PipId::from_raw)
    }

    /// Looks up a bel by name.
    pub fn bel_by_name(&self, name: Ident) -> Option<BelId> {
        self.bel_by_name.get(&name).copied()
    }

    /// Looks up a wire by name.
    pub fn wire_by_name(&self, name: Ident) -> Option<WireId> {
        self.wire_by_name.get(&name).copied()
    }

    /// Looks up a bel by grid location.
    pub fn bel_at(&self, loc: Loc) -> Option<BelId> {
        self.bel_by_loc.get(&loc).copied()
    }

    /// Looks up the pip between two wires, if one exists.
    pub fn pip_between(&self, src: WireId, dst: WireId) -> Option<PipId> {
        self.pip_by_endpoints.get(&(src, dst)).copied()
    }

    /// Returns the wire a bel pin connects to.
    pub fn bel_pin_wire(&self, bel: BelId, pin: Ident) -> Option<WireId> {
        self.bel(bel).pin(pin).map(|p| p.wire)
    }

    /// Rebuilds the name/location indices after deserialization.
    pub fn rebuild_indices(&mut self) {
        self.bel_by_name.clear();
        self.bel_by_loc.clear();
        for (i, bel) in self.bels.iter().enumerate() {
            let id = BelId::from_raw(i as u32);
            self.bel_by_name.insert(bel.name, id);
            self.bel_by_loc.insert(bel.loc, id);
        }
        self.wire_by_name.clear();
        for (i, wire) in self.wires.iter().enumerate() {
            self.wire_by_name.insert(wire.name, WireId::from_raw(i as u32));
        }
        self.pip_by_endpoints.clear();
        for (i, pip) in self.pips.iter().enumerate() {
            self.pip_by_endpoints
                .insert((pip.src, pip.dst), PipId::from_raw(i as u32));
        }
    }

    /// Checks the structural invariants: pip endpoints and wire incidence
    /// lists agree in both directions, and every bel pin references a real
    /// wire that lists it back.
    pub fn validate(&self) -> Result<(), DeviceGraphError> {
        for (i, pip) in self.pips.iter().enumerate() {
            let id = PipId::from_raw(i as u32);
            for wire in [pip.src, pip.dst] {
                if wire.index() >= self.wires.len() {
                    return Err(DeviceGraphError::DanglingPipWire { pip: id, wire });
                }
            }
            if !self.wires[pip.src.index()].downhill.contains(&id) {
                return Err(DeviceGraphError::IncidenceMismatch { wire: pip.src, pip: id });
            }
            if !self.wires[pip.dst.index()].uphill.contains(&id) {
                return Err(DeviceGraphError::IncidenceMismatch { wire: pip.dst, pip: id });
            }
        }
        for (i, wire) in self.wires.iter().enumerate() {
            let wid = WireId::from_raw(i as u32);
            for &pip in wire.uphill.iter() {
                if self.pips[pip.index()].dst != wid {
                    return Err(DeviceGraphError::IncidenceMismatch { wire: wid, pip });
                }
            }
            for &pip in wire.downhill.iter() {
                if self.pips[pip.index()].src != wid {
                    return Err(DeviceGraphError::IncidenceMismatch { wire: wid, pip });
                }
            }
        }
        for (i, bel) in self.bels.iter().enumerate() {
            let bid = BelId::from_raw(i as u32);
            for pin in &bel.pins {
                if pin.wire.index() >= self.wires.len() {
                    return Err(DeviceGraphError::DanglingBelPinWire {
                        bel: bid,
                        wire: pin.wire,
                    });
                }
                let listed = self.wires[pin.wire.index()]
                    .bel_pins
                    .iter()
                    .any(|&(b, p)| b == bid && p == pin.name);
                if !listed {
                    return Err(DeviceGraphError::BelPinMismatch {
                        wire: pin.wire,
                        bel: bid,
                    });
                }
            }
        }
        Ok(())
    }

    /// Visits every [`Ident`] stored in the graph, allowing the binary
    /// loader to remap handles into a different interner.
    pub(crate) fn visit_idents(&mut self, f: &mut impl FnMut(&mut Ident)) {
        for bel in &mut self.bels {
            f(&mut bel.name);
            f(&mut bel.bel_type);
            f(&mut bel.bucket);
            for pin in &mut bel.pins {
                f(&mut pin.name);
            }
        }
        for wire in &mut self.wires {
            f(&mut wire.name);
            f(&mut wire.wire_type);
            for (_, pin) in &mut wire.bel_pins {
                f(pin);
            }
        }
        for pip in &mut self.pips {
            f(&mut pip.pip_type);
        }
    }

    /// Read-only iteration over every [`Ident`] in the graph.
    pub(crate) fn for_each_ident(&self, f: &mut impl FnMut(Ident)) {
        for bel in &self.bels {
            f(bel.name);
            f(bel.bel_type);
            f(bel.bucket);
            for pin in &bel.pins {
                f(pin.name);
            }
        }
        for wire in &self.wires {
            f(wire.name);
            f(wire.wire_type);
            for &(_, pin) in &wire.bel_pins {
                f(pin);
            }
        }
        for pip in &self.pips {
            f(pip.pip_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_common::Interner;

    fn tiny_graph(interner: &Interner) -> DeviceGraph {
        let mut g = DeviceGraph::new("tiny", 2, 2);
        let w0 = g.add_wire(
            interner.intern("w0"),
            interner.intern("LOCAL"),
            WireCategory::General,
            0,
            0,
            Delay::flat(0.1),
        );
        let w1 = g.add_wire(
            interner.intern("w1"),
            interner.intern("LOCAL"),
            WireCategory::General,
            1,
            0,
            Delay::flat(0.1),
        );
        g.add_pip(
            w0,
            w1,
            Loc::new(0, 0, 0),
            interner.intern("SPAN"),
            Delay::flat(0.05),
            None,
        );
        let bel = g.add_bel(
            interner.intern("bel0"),
            interner.intern("SLICE_COMB"),
            Loc::new(0, 0, 0),
            false,
            interner.intern("SLICE"),
        );
        g.add_bel_pin(bel, interner.intern("F"), PortDir::Output, w0);
        g
    }

    #[test]
    fn builder_maintains_incidence() {
        let interner = Interner::new();
        let g = tiny_graph(&interner);
        let w0 = g.wire_by_name(interner.intern("w0")).unwrap();
        let w1 = g.wire_by_name(interner.intern("w1")).unwrap();
        assert_eq!(g.wire(w0).downhill.len(), 1);
        assert_eq!(g.wire(w1).uphill.len(), 1);
        let pip = g.wire(w0).downhill[0];
        assert_eq!(g.pip(pip).src, w0);
        assert_eq!(g.pip(pip).dst, w1);
        assert!(g.validate().is_ok());
    }

    #[test]
    fn bel_pin_wire_lookup() {
        let interner = Interner::new();
        let g = tiny_graph(&interner);
        let bel = g.bel_by_name(interner.intern("bel0")).unwrap();
        let wire = g.bel_pin_wire(bel, interner.intern("F")).unwrap();
        assert_eq!(g.wire(wire).bel_pins, vec![(bel, interner.intern("F"))]);
    }

    #[test]
    fn loc_lookup() {
        let interner = Interner::new();
        let g = tiny_graph(&interner);
        let bel = g.bel_at(Loc::new(0, 0, 0)).unwrap();
        assert_eq!(g.bel(bel).name, interner.intern("bel0"));
        assert!(g.bel_at(Loc::new(5, 5, 0)).is_none());
    }

    #[test]
    fn pip_between_lookup() {
        let interner = Interner::new();
        let g = tiny_graph(&interner);
        let w0 = g.wire_by_name(interner.intern("w0")).unwrap();
        let w1 = g.wire_by_name(interner.intern("w1")).unwrap();
        assert!(g.pip_between(w0, w1).is_some());
        assert!(g.pip_between(w1, w0).is_none());
    }

    #[test]
    fn rebuild_indices_restores_lookups() {
        let interner = Interner::new();
        let mut g = tiny_graph(&interner);
        g.bel_by_name.clear();
        g.wire_by_name.clear();
        g.pip_by_endpoints.clear();
        g.rebuild_indices();
        assert!(g.bel_by_name(interner.intern("bel0")).is_some());
        assert!(g.wire_by_name(interner.intern("w1")).is_some());
    }

    #[test]
    fn validate_catches_broken_incidence() {
        let interner = Interner::new();
        let mut g = tiny_graph(&interner);
        let w0 = g.wire_by_name(interner.intern("w0")).unwrap();
        g.wires[w0.index()].downhill.clear();
        assert!(g.validate().is_err());
    }

    #[test]
    fn iterators_cover_arena() {
        let interner = Interner::new();
        let g = tiny_graph(&interner);
        assert_eq!(g.bels().count(), g.bel_count());
        assert_eq!(g.wires().count(), g.wire_count());
        assert_eq!(g.pips().count(), g.pip_count());
    }
}
