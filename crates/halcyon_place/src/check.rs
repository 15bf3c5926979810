//! The logic-tile validity predicate.
//!
//! Given one tile's occupancy, checks every architecture packing rule the
//! placer must honor: slice-level LUT/FF pairing, shared LUT input muxes,
//! carry pairing, wide-mux placement, distributed-RAM exclusivity, and
//! half-tile FF control sets.

use crate::control_set::FfControlSet;
use crate::tile::TileCells;
use crate::zloc;
use halcyon_common::{ConstIds, Ident};
use halcyon_netlist::{Cell, Netlist};
use std::collections::BTreeSet;

/// The verdict of a validity query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    /// Whether the location is legal.
    pub ok: bool,
    /// A human explanation, present only when the caller asked for one.
    pub explanation: Option<String>,
}

impl Validity {
    /// A passing verdict.
    pub fn valid() -> Self {
        Self {
            ok: true,
            explanation: None,
        }
    }

    fn invalid(explain: bool, msg: impl FnOnce() -> String) -> Self {
        Self {
            ok: false,
            explanation: explain.then(msg),
        }
    }
}

/// Family parameters of the logic-tile rules.
#[derive(Clone, Copy, Debug)]
pub struct LogicRules {
    /// Maximum distinct input nets across the two LUTs of a slice.
    pub shared_input_width: usize,
    /// Maximum combined INIT storage bits per slice.
    pub init_bit_budget: usize,
}

impl Default for LogicRules {
    fn default() -> Self {
        Self {
            shared_input_width: 6,
            init_bit_budget: 32,
        }
    }
}

struct CombInfo {
    carry: bool,
    dpram: bool,
    mux2: bool,
    f_net: Option<Ident>,
    ofx_net: Option<Ident>,
    input_nets: Vec<Ident>,
    init_bits: usize,
}

fn comb_info(cell: &Cell, ids: &ConstIds) -> CombInfo {
    let mode = cell.param_str(ids.mode, "LOGIC");
    CombInfo {
        carry: mode == "CCU2",
        dpram: mode == "DPRAM",
        mux2: cell.port_net(ids.ofx).is_some(),
        f_net: cell.port_net(ids.f),
        ofx_net: cell.port_net(ids.ofx),
        input_nets: [ids.a, ids.b, ids.c, ids.d]
            .iter()
            .filter_map(|&p| cell.port_net(p))
            .collect(),
        init_bits: cell.params.get(&ids.init).map_or(16, |p| p.size()),
    }
}

struct FfInfo {
    di_net: Option<Ident>,
    m_net: Option<Ident>,
    ctrlset: FfControlSet,
}

fn ff_info(cell: &Cell, ids: &ConstIds) -> FfInfo {
    FfInfo {
        di_net: cell.port_net(ids.di),
        m_net: cell.port_net(ids.m),
        ctrlset: FfControlSet::from_cell(cell, ids),
    }
}

fn cell_at<'a>(netlist: &'a Netlist, tile: &TileCells, z: i32) -> Option<&'a Cell> {
    tile.get(&z).and_then(|name| netlist.cells.get(name))
}

/// Checks every packing rule for one logic tile.
///
/// `explain` requests a human-readable reason on failure; without it the
/// check allocates nothing on the failure path either.
pub fn check_logic_tile(
    netlist: &Netlist,
    ids: &ConstIds,
    tile: &TileCells,
    rules: &LogicRules,
    explain: bool,
) -> Validity {
    for s in 0..zloc::SLICES_PER_TILE {
        let lut0 = cell_at(netlist, tile, zloc::slice_z(s, zloc::LUT0));
        let lut1 = cell_at(netlist, tile, zloc::slice_z(s, zloc::LUT1));
        let ff0 = cell_at(netlist, tile, zloc::slice_z(s, zloc::FF0));
        let ff1 = cell_at(netlist, tile, zloc::slice_z(s, zloc::FF1));

        let lut0_info = lut0.map(|c| comb_info(c, ids));
        let lut1_info = lut1.map(|c| comb_info(c, ids));
        let ff0_info = ff0.map(|c| ff_info(c, ids));
        let ff1_info = ff1.map(|c| ff_info(c, ids));

        // Distributed RAM holds slice 2 exclusively.
        if s == zloc::RAMW_SLICE {
            let ramw = cell_at(netlist, tile, zloc::slice_z(s, zloc::RAMW));
            if ramw.is_some()
                && (lut0.is_some() || lut1.is_some() || ff0.is_some() || ff1.is_some())
            {
                return Validity::invalid(explain, || {
                    "RAM write control excludes all other cells from slice 2".into()
                });
            }
        }

        if let Some(l0) = &lut0_info {
            // DPRAM-mode LUTs require the write-control bel in this tile.
            if l0.dpram
                && cell_at(
                    netlist,
                    tile,
                    zloc::slice_z(zloc::RAMW_SLICE, zloc::RAMW),
                )
                .is_none()
            {
                return Validity::invalid(explain, || {
                    "distributed RAM LUT placed without its write control".into()
                });
            }
            // The wide-mux output shares the slice M path with FF0.
            if l0.mux2 {
                if let Some(f0) = &ff0_info {
                    if f0.m_net.is_some() {
                        return Validity::invalid(explain, || {
                            format!("slice {s}: MUX2 output and FF0 M input both in use")
                        });
                    }
                }
            }
        }

        if let Some(l1) = &lut1_info {
            // Only the first LUT of a slice can host a wide mux.
            if l1.mux2 {
                return Validity::invalid(explain, || {
                    format!("slice {s}: second LUT cannot host a MUX2")
                });
            }
            // Carry LUTs pair up within a slice.
            let l0_carry = lut0_info.as_ref().is_some_and(|l| l.carry);
            if l1.carry && !l0_carry {
                return Validity::invalid(explain, || {
                    format!("slice {s}: carry in second LUT without carry in first")
                });
            }
            if !l1.carry && l0_carry {
                return Validity::invalid(explain, || {
                    format!("slice {s}: carry in first LUT without carry in second")
                });
            }
        }

        // FF data inputs: DI must come from the paired LUT, and never
        // together with M.
        if let Some(f0) = &ff0_info {
            if f0.di_net.is_some() && f0.m_net.is_some() {
                return Validity::invalid(explain, || {
                    format!("slice {s}: FF0 drives both DI and M")
                });
            }
            if let Some(di) = f0.di_net {
                let feeds = lut0_info
                    .as_ref()
                    .is_some_and(|l| l.f_net == Some(di) || l.ofx_net == Some(di));
                if !feeds {
                    return Validity::invalid(explain, || {
                        format!("slice {s}: FF0 DI is not the paired LUT output")
                    });
                }
            }
        }
        if let Some(f1) = &ff1_info {
            if f1.di_net.is_some() && f1.m_net.is_some() {
                return Validity::invalid(explain, || {
                    format!("slice {s}: FF1 drives both DI and M")
                });
            }
            if let Some(di) = f1.di_net {
                let feeds = lut1_info.as_ref().is_some_and(|l| l.f_net == Some(di));
                if !feeds {
                    return Validity::invalid(explain, || {
                        format!("slice {s}: FF1 DI is not the paired LUT output")
                    });
                }
            }
        }

        // Shared input mux and INIT storage budget.
        if let (Some(l0), Some(l1)) = (&lut0_info, &lut1_info) {
            let distinct: BTreeSet<Ident> = l0
                .input_nets
                .iter()
                .chain(l1.input_nets.iter())
                .copied()
                .collect();
            if distinct.len() > rules.shared_input_width {
                return Validity::invalid(explain, || {
                    format!(
                        "slice {s}: {} distinct LUT inputs exceed the {}-wide input mux",
                        distinct.len(),
                        rules.shared_input_width
                    )
                });
            }
            if l0.init_bits + l1.init_bits > rules.init_bit_budget {
                return Validity::invalid(explain, || {
                    format!("slice {s}: combined INIT storage exceeds the slice budget")
                });
            }
        }
    }

    // FF control sets agree within each half-tile region.
    for h in 0..2 {
        let mut found: Option<FfControlSet> = None;
        for s in [h * 2, h * 2 + 1] {
            let mut slots = vec![zloc::FF0, zloc::FF1];
            if s == zloc::RAMW_SLICE {
                slots.push(zloc::RAMW);
            }
            for slot in slots {
                let Some(cell) = cell_at(netlist, tile, zloc::slice_z(s, slot)) else {
                    continue;
                };
                let ctrlset = FfControlSet::from_cell(cell, ids);
                match &found {
                    None => found = Some(ctrlset),
                    Some(existing) => {
                        if *existing != ctrlset {
                            return Validity::invalid(explain, || {
                                format!("half {h}: mismatched FF control sets")
                            });
                        }
                    }
                }
            }
        }
    }

    Validity::valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_common::Interner;
    use halcyon_device::PortDir;
    use halcyon_netlist::Property;

    struct Fx {
        interner: Interner,
        ids: ConstIds,
        nl: Netlist,
        tile: TileCells,
    }

    impl Fx {
        fn new() -> Self {
            let interner = Interner::new();
            let ids = ConstIds::new(&interner);
            Self {
                interner,
                ids,
                nl: Netlist::new(),
                tile: TileCells::new(),
            }
        }

        fn add_comb(&mut self, name: &str, z: i32, mode: &str) -> Ident {
            let id = self.interner.intern(name);
            self.nl.create_cell(id, self.ids.slice_comb).unwrap();
            if mode != "LOGIC" {
                self.nl.cell_mut(id).unwrap().params.insert(
                    self.ids.mode,
                    Property::from_str_value(mode),
                );
            }
            self.tile.insert(z, id);
            id
        }

        fn add_ff(&mut self, name: &str, z: i32, clk: &str) -> Ident {
            let id = self.interner.intern(name);
            let clk_net = self.interner.intern(clk);
            self.nl.create_cell(id, self.ids.slice_ff).unwrap();
            let _ = self.nl.create_net(clk_net);
            self.nl.add_port(id, self.ids.clk, PortDir::Input).unwrap();
            self.nl.connect_port(id, self.ids.clk, clk_net).unwrap();
            self.tile.insert(z, id);
            id
        }

        fn connect(&mut self, cell: Ident, port: Ident, net: &str, dir: PortDir) {
            let net = self.interner.intern(net);
            let _ = self.nl.create_net(net);
            self.nl.add_port(cell, port, dir).unwrap();
            self.nl.connect_port(cell, port, net).unwrap();
        }

        fn check(&self) -> Validity {
            check_logic_tile(&self.nl, &self.ids, &self.tile, &LogicRules::default(), true)
        }
    }

    #[test]
    fn empty_tile_is_valid() {
        let fx = Fx::new();
        assert!(fx.check().ok);
    }

    #[test]
    fn plain_lut_ff_pair_is_valid() {
        let mut fx = Fx::new();
        let lut = fx.add_comb("lut", zloc::slice_z(0, zloc::LUT0), "LOGIC");
        let ff = fx.add_ff("ff", zloc::slice_z(0, zloc::FF0), "clk");
        fx.connect(lut, fx.ids.f, "d", PortDir::Output);
        fx.connect(ff, fx.ids.di, "d", PortDir::Input);
        assert!(fx.check().ok);
    }

    #[test]
    fn ff_di_from_wrong_net_is_invalid() {
        let mut fx = Fx::new();
        let lut = fx.add_comb("lut", zloc::slice_z(0, zloc::LUT0), "LOGIC");
        let ff = fx.add_ff("ff", zloc::slice_z(0, zloc::FF0), "clk");
        fx.connect(lut, fx.ids.f, "d", PortDir::Output);
        fx.connect(ff, fx.ids.di, "other", PortDir::Input);
        let v = fx.check();
        assert!(!v.ok);
        assert!(v.explanation.unwrap().contains("DI"));
    }

    #[test]
    fn ff_di_without_lut_is_invalid() {
        let mut fx = Fx::new();
        let ff = fx.add_ff("ff", zloc::slice_z(1, zloc::FF0), "clk");
        fx.connect(ff, fx.ids.di, "d", PortDir::Input);
        assert!(!fx.check().ok);
    }

    #[test]
    fn ff_with_di_and_m_is_invalid() {
        let mut fx = Fx::new();
        let lut = fx.add_comb("lut", zloc::slice_z(0, zloc::LUT0), "LOGIC");
        let ff = fx.add_ff("ff", zloc::slice_z(0, zloc::FF0), "clk");
        fx.connect(lut, fx.ids.f, "d", PortDir::Output);
        fx.connect(ff, fx.ids.di, "d", PortDir::Input);
        fx.connect(ff, fx.ids.m, "m", PortDir::Input);
        assert!(!fx.check().ok);
    }

    #[test]
    fn carry_must_pair() {
        let mut fx = Fx::new();
        fx.add_comb("c0", zloc::slice_z(0, zloc::LUT0), "CCU2");
        fx.add_comb("c1", zloc::slice_z(0, zloc::LUT1), "LOGIC");
        let v = fx.check();
        assert!(!v.ok);
        assert!(v.explanation.unwrap().contains("carry"));
    }

    #[test]
    fn carry_pair_is_valid() {
        let mut fx = Fx::new();
        fx.add_comb("c0", zloc::slice_z(0, zloc::LUT0), "CCU2");
        fx.add_comb("c1", zloc::slice_z(0, zloc::LUT1), "CCU2");
        assert!(fx.check().ok);
    }

    #[test]
    fn control_sets_must_match_within_half() {
        let mut fx = Fx::new();
        fx.add_ff("ff_a", zloc::slice_z(0, zloc::FF0), "clk_a");
        fx.add_ff("ff_b", zloc::slice_z(1, zloc::FF0), "clk_b");
        let v = fx.check();
        assert!(!v.ok);
        assert!(v.explanation.unwrap().contains("control set"));
    }

    #[test]
    fn control_sets_independent_across_halves() {
        let mut fx = Fx::new();
        fx.add_ff("ff_a", zloc::slice_z(0, zloc::FF0), "clk_a");
        fx.add_ff("ff_b", zloc::slice_z(3, zloc::FF0), "clk_b");
        assert!(fx.check().ok);
    }

    #[test]
    fn ramw_excludes_slice_2() {
        let mut fx = Fx::new();
        let ramw = fx.interner.intern("ramw");
        fx.nl.create_cell(ramw, fx.ids.ramw).unwrap();
        fx.tile.insert(zloc::slice_z(2, zloc::RAMW), ramw);
        fx.add_comb("lut", zloc::slice_z(2, zloc::LUT0), "DPRAM");
        let v = fx.check();
        assert!(!v.ok);
        assert!(v.explanation.unwrap().contains("slice 2"));
    }

    #[test]
    fn dpram_lut_requires_ramw() {
        let mut fx = Fx::new();
        fx.add_comb("lut", zloc::slice_z(0, zloc::LUT0), "DPRAM");
        assert!(!fx.check().ok);
    }

    #[test]
    fn dpram_with_ramw_is_valid() {
        let mut fx = Fx::new();
        let ramw = fx.interner.intern("ramw");
        fx.nl.create_cell(ramw, fx.ids.ramw).unwrap();
        fx.tile.insert(zloc::slice_z(2, zloc::RAMW), ramw);
        fx.add_comb("lut", zloc::slice_z(0, zloc::LUT0), "DPRAM");
        assert!(fx.check().ok);
    }

    #[test]
    fn mux2_only_in_first_lut() {
        let mut fx = Fx::new();
        let lut1 = fx.add_comb("lut1", zloc::slice_z(0, zloc::LUT1), "LOGIC");
        fx.connect(lut1, fx.ids.ofx, "muxed", PortDir::Output);
        assert!(!fx.check().ok);
    }

    #[test]
    fn mux2_conflicts_with_ff_m() {
        let mut fx = Fx::new();
        let lut0 = fx.add_comb("lut0", zloc::slice_z(0, zloc::LUT0), "LOGIC");
        fx.connect(lut0, fx.ids.ofx, "muxed", PortDir::Output);
        let ff = fx.add_ff("ff", zloc::slice_z(0, zloc::FF0), "clk");
        fx.connect(ff, fx.ids.m, "m", PortDir::Input);
        assert!(!fx.check().ok);
    }

    #[test]
    fn shared_input_mux_budget() {
        let mut fx = Fx::new();
        let l0 = fx.add_comb("l0", zloc::slice_z(0, zloc::LUT0), "LOGIC");
        let l1 = fx.add_comb("l1", zloc::slice_z(0, zloc::LUT1), "LOGIC");
        for (i, port) in [fx.ids.a, fx.ids.b, fx.ids.c, fx.ids.d].into_iter().enumerate() {
            fx.connect(l0, port, &format!("n{i}"), PortDir::Input);
        }
        for (i, port) in [fx.ids.a, fx.ids.b, fx.ids.c, fx.ids.d].into_iter().enumerate() {
            fx.connect(l1, port, &format!("n{}", i + 4), PortDir::Input);
        }
        // 8 distinct nets > 6-wide mux.
        let v = fx.check();
        assert!(!v.ok);
        assert!(v.explanation.unwrap().contains("input"));
    }

    #[test]
    fn shared_inputs_within_budget() {
        let mut fx = Fx::new();
        let l0 = fx.add_comb("l0", zloc::slice_z(0, zloc::LUT0), "LOGIC");
        let l1 = fx.add_comb("l1", zloc::slice_z(0, zloc::LUT1), "LOGIC");
        for (i, port) in [fx.ids.a, fx.ids.b, fx.ids.c, fx.ids.d].into_iter().enumerate() {
            fx.connect(l0, port, &format!("n{i}"), PortDir::Input);
        }
        // Same four nets, permuted.
        fx.connect(l1, fx.ids.a, "n3", PortDir::Input);
        fx.connect(l1, fx.ids.b, "n2", PortDir::Input);
        fx.connect(l1, fx.ids.c, "n1", PortDir::Input);
        fx.connect(l1, fx.ids.d, "n0", PortDir::Input);
        assert!(fx.check().ok);
    }
}
