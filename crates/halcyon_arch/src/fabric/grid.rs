//! Programmatic construction of the fabric device graph.
//!
//! The fabric is a rectangular grid. Interior tiles are logic tiles with
//! four slices of two LUT/FF pairs, a RAM write-control bel in slice 2,
//! dedicated carry and LUT→FF paths, and general-purpose local/span
//! interconnect. Perimeter tiles (minus corners) carry two IO bels each.
//! A configurable number of global buffers sit beside the grid, fed from
//! pad clock taps over dedicated routing and driving per-buffer global
//! spines that tap into every logic tile's clock wire.

use halcyon_common::{ConstIds, Ident, Interner};
use halcyon_device::{BelId, Delay, DeviceGraph, Loc, PortDir, PseudoPipTag, WireCategory, WireId};
use std::collections::HashMap;

/// Locals per logic tile.
const LOGIC_LOCALS: i32 = 6;
/// Locals per IO tile.
const IO_LOCALS: i32 = 4;
/// Span wires per direction.
const SPANS: i32 = 2;

/// The result of grid construction.
pub struct GridOutput {
    /// The finished device graph.
    pub graph: DeviceGraph,
    /// Package pin name → IO bel.
    pub pkg_pins: HashMap<String, BelId>,
}

struct GridBuilder<'a> {
    interner: &'a Interner,
    ids: &'a ConstIds,
    graph: DeviceGraph,
    width: i32,
    height: i32,
    pkg_pins: HashMap<String, BelId>,
}

impl<'a> GridBuilder<'a> {
    fn id(&self, s: &str) -> Ident {
        self.interner.intern(s)
    }

    fn has_logic(&self, x: i32, y: i32) -> bool {
        x >= 1 && x < self.width - 1 && y >= 1 && y < self.height - 1
    }

    fn has_io(&self, x: i32, y: i32) -> bool {
        let edge_x = x == 0 || x == self.width - 1;
        let edge_y = y == 0 || y == self.height - 1;
        (edge_x != edge_y) && x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    fn has_tile(&self, x: i32, y: i32) -> bool {
        self.has_logic(x, y) || self.has_io(x, y)
    }

    /// Returns the wire named `R{y}C{x}_{suffix}`, creating it on first use.
    fn wire_or(
        &mut self,
        x: i32,
        y: i32,
        suffix: &str,
        wire_type: &str,
        category: WireCategory,
        delay: Delay,
    ) -> WireId {
        let name = self.id(&format!("R{y}C{x}_{suffix}"));
        if let Some(w) = self.graph.wire_by_name(name) {
            return w;
        }
        let ty = self.id(wire_type);
        self.graph.add_wire(name, ty, category, x, y, delay)
    }

    fn local(&mut self, x: i32, y: i32, i: i32) -> WireId {
        self.wire_or(x, y, &format!("LOCAL{i}"), "LOCAL", WireCategory::General, Delay::flat(0.05))
    }

    fn span(&mut self, x: i32, y: i32, dir: char, k: i32) -> WireId {
        self.wire_or(
            x,
            y,
            &format!("SPAN_{dir}{k}"),
            "SPAN",
            WireCategory::General,
            Delay::flat(0.08),
        )
    }

    fn pip(&mut self, src: WireId, dst: WireId, x: i32, y: i32, ty: &str, delay: f64) {
        let pt = self.id(ty);
        self.graph
            .add_pip(src, dst, Loc::new(x, y, 0), pt, Delay::flat(delay), None);
    }

    /// The general interconnect common to logic and IO tiles: locals fed
    /// from the four neighbors' spans, own spans fed from locals.
    fn build_interconnect(&mut self, x: i32, y: i32, locals: i32) {
        for i in 0..locals {
            let dst = self.local(x, y, i);
            let k = i % SPANS;
            // A tile's outgoing span in direction D lands in the
            // neighbor's locals on the far side.
            for (nx, ny, dir) in [
                (x - 1, y, 'E'),
                (x + 1, y, 'W'),
                (x, y - 1, 'N'),
                (x, y + 1, 'S'),
            ] {
                if self.has_tile(nx, ny) {
                    let src = self.span(nx, ny, dir, k);
                    self.pip(src, dst, x, y, "SPAN_TO_LOCAL", 0.15);
                }
            }
        }
        for dir in ['E', 'W', 'N', 'S'] {
            for k in 0..SPANS {
                let dst = self.span(x, y, dir, k);
                for j in 0..locals / SPANS {
                    let src = self.local(x, y, k + j * SPANS);
                    self.pip(src, dst, x, y, "LOCAL_TO_SPAN", 0.15);
                }
            }
        }
    }

    fn build_logic_tile(&mut self, x: i32, y: i32) {
        self.build_interconnect(x, y, LOGIC_LOCALS);

        let clk = self.wire_or(x, y, "CLK", "TILE_CTRL", WireCategory::General, Delay::flat(0.03));
        let ce = self.wire_or(x, y, "CE", "TILE_CTRL", WireCategory::General, Delay::flat(0.03));
        let lsr = self.wire_or(x, y, "LSR", "TILE_CTRL", WireCategory::General, Delay::flat(0.03));
        for (i, ctrl) in [(0, clk), (2, ce), (4, lsr)] {
            for j in 0..2 {
                let src = self.local(x, y, i + j);
                self.pip(src, ctrl, x, y, "LOCAL_TO_CTRL", 0.12);
            }
        }

        // Distributed RAM write distribution, shared across the tile.
        let wck = self.wire_or(x, y, "WCK", "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.02));
        let wre = self.wire_or(x, y, "WRE", "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.02));
        let wads: Vec<WireId> = (0..4)
            .map(|i| {
                self.wire_or(
                    x,
                    y,
                    &format!("WAD{i}"),
                    "RAMW_OUT",
                    WireCategory::Dedicated,
                    Delay::flat(0.02),
                )
            })
            .collect();

        for pos in 0..8 {
            self.build_comb_ff_pair(x, y, pos, clk, ce, lsr, wck, wre, &wads);
        }

        self.build_ramw(x, y, wck, wre, &wads);
    }

    #[allow(clippy::too_many_arguments)]
    fn build_comb_ff_pair(
        &mut self,
        x: i32,
        y: i32,
        pos: i32,
        clk: WireId,
        ce: WireId,
        lsr: WireId,
        wck: WireId,
        wre: WireId,
        wads: &[WireId],
    ) {
        let (s, h) = (pos / 2, pos % 2);
        let p = |suffix: &str| format!("S{s}{h}_{suffix}");

        let comb_in: Vec<WireId> = ["A", "B", "C", "D"]
            .iter()
            .map(|pin| self.wire_or(x, y, &p(pin), "BEL_IN", WireCategory::General, Delay::flat(0.02)))
            .collect();
        let f = self.wire_or(x, y, &p("F"), "BEL_OUT", WireCategory::General, Delay::flat(0.02));
        let m = self.wire_or(x, y, &p("M"), "BEL_IN", WireCategory::General, Delay::flat(0.02));
        let di = self.wire_or(x, y, &p("DI"), "LUT_FF", WireCategory::Dedicated, Delay::flat(0.01));
        let q = self.wire_or(x, y, &p("Q"), "BEL_OUT", WireCategory::General, Delay::flat(0.02));
        let fci = self.wire_or(x, y, &p("FCI"), "CARRY", WireCategory::Dedicated, Delay::flat(0.01));
        let fco = self.wire_or(x, y, &p("FCO"), "CARRY", WireCategory::Dedicated, Delay::flat(0.01));

        // Bel inputs from the locals; outputs back onto them.
        for (i, &w) in comb_in.iter().enumerate() {
            for j in 0..2 {
                let src = self.local(x, y, (pos + i as i32 + 3 * j) % LOGIC_LOCALS);
                self.pip(src, w, x, y, "LOCAL_TO_IN", 0.12);
            }
        }
        for j in 0..2 {
            let src = self.local(x, y, (pos + 1 + 3 * j) % LOGIC_LOCALS);
            self.pip(src, m, x, y, "LOCAL_TO_IN", 0.12);
        }
        for j in 0..2 {
            let dst = self.local(x, y, (pos + 2 + 3 * j) % LOGIC_LOCALS);
            self.pip(f, dst, x, y, "OUT_TO_LOCAL", 0.12);
            let dst_q = self.local(x, y, (pos + 4 + 3 * j) % LOGIC_LOCALS);
            self.pip(q, dst_q, x, y, "OUT_TO_LOCAL", 0.12);
        }
        // The direct LUT→FF path.
        self.pip(f, di, x, y, "F_TO_DI", 0.02);

        // Carry chaining: within the tile, position to position; the tile's
        // last FCO continues into the next tile's first FCI.
        if pos < 7 {
            let next = self.wire_or(
                x,
                y,
                &format!("S{}{}_FCI", (pos + 1) / 2, (pos + 1) % 2),
                "CARRY",
                WireCategory::Dedicated,
                Delay::flat(0.01),
            );
            self.pip(fco, next, x, y, "CARRY_CHAIN", 0.02);
        } else if self.has_logic(x + 1, y) {
            let next = self.wire_or(x + 1, y, "S00_FCI", "CARRY", WireCategory::Dedicated, Delay::flat(0.01));
            self.pip(fco, next, x, y, "CARRY_CHAIN", 0.04);
        }

        let comb = self.graph.add_bel(
            self.id(&format!("R{y}C{x}_SLICE{s}_LUT{h}")),
            self.ids.slice_comb,
            Loc::new(x, y, (s << 3) | h),
            false,
            self.ids.slice_comb,
        );
        for (i, pin) in [self.ids.a, self.ids.b, self.ids.c, self.ids.d].into_iter().enumerate() {
            self.graph.add_bel_pin(comb, pin, PortDir::Input, comb_in[i]);
        }
        self.graph.add_bel_pin(comb, self.ids.f, PortDir::Output, f);
        self.graph.add_bel_pin(comb, self.ids.fci, PortDir::Input, fci);
        self.graph.add_bel_pin(comb, self.ids.fco, PortDir::Output, fco);

        // An unused LUT can pass its A input straight through to F. The
        // pip has no configuration bit of its own; the LUT mask realizes
        // it, so it is only usable while the bel is free.
        let thru_type = self.id("LUT_THRU");
        self.graph.add_pip(
            comb_in[0],
            f,
            Loc::new(x, y, (s << 3) | h),
            thru_type,
            Delay::flat(0.35),
            Some(PseudoPipTag::LutThru { bel: comb }),
        );

        // Wide-function and write-port plumbing.
        if h == 0 {
            let ofx = self.wire_or(x, y, &p("OFX"), "BEL_OUT", WireCategory::General, Delay::flat(0.02));
            let f1 = self.wire_or(x, y, &p("F1"), "LUT_FF", WireCategory::Dedicated, Delay::flat(0.01));
            let sel = self.wire_or(x, y, &p("SEL"), "BEL_IN", WireCategory::General, Delay::flat(0.02));
            let other_f = self.wire_or(x, y, &format!("S{s}1_F"), "BEL_OUT", WireCategory::General, Delay::flat(0.02));
            self.pip(other_f, f1, x, y, "F_TO_F1", 0.02);
            for j in 0..2 {
                let src = self.local(x, y, (pos + 5 + 3 * j) % LOGIC_LOCALS);
                self.pip(src, sel, x, y, "LOCAL_TO_IN", 0.12);
                let dst = self.local(x, y, (pos + 3 * j) % LOGIC_LOCALS);
                self.pip(ofx, dst, x, y, "OUT_TO_LOCAL", 0.12);
            }
            self.graph.add_bel_pin(comb, self.ids.ofx, PortDir::Output, ofx);
            self.graph.add_bel_pin(comb, self.ids.f1, PortDir::Input, f1);
            self.graph.add_bel_pin(comb, self.ids.sel, PortDir::Input, sel);
        }
        if s < 2 {
            let wdi = self.wire_or(x, y, &format!("WDI{pos}"), "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.02));
            self.graph.add_bel_pin(comb, self.ids.wdi, PortDir::Input, wdi);
            self.graph.add_bel_pin(comb, self.ids.wck, PortDir::Input, wck);
            self.graph.add_bel_pin(comb, self.ids.wre, PortDir::Input, wre);
            for (i, &wad) in wads.iter().enumerate() {
                self.graph
                    .add_bel_pin(comb, self.id(&format!("WAD{i}")), PortDir::Input, wad);
            }
        }

        let ff = self.graph.add_bel(
            self.id(&format!("R{y}C{x}_SLICE{s}_FF{h}")),
            self.ids.slice_ff,
            Loc::new(x, y, (s << 3) | (2 + h)),
            false,
            self.ids.slice_ff,
        );
        self.graph.add_bel_pin(ff, self.ids.clk, PortDir::Input, clk);
        self.graph.add_bel_pin(ff, self.ids.ce, PortDir::Input, ce);
        self.graph.add_bel_pin(ff, self.ids.lsr, PortDir::Input, lsr);
        self.graph.add_bel_pin(ff, self.ids.m, PortDir::Input, m);
        self.graph.add_bel_pin(ff, self.ids.di, PortDir::Input, di);
        self.graph.add_bel_pin(ff, self.ids.q, PortDir::Output, q);
    }

    fn build_ramw(&mut self, x: i32, y: i32, wck: WireId, wre: WireId, wads: &[WireId]) {
        let clk = self.wire_or(x, y, "CLK", "TILE_CTRL", WireCategory::General, Delay::flat(0.03));
        let lsr = self.wire_or(x, y, "LSR", "TILE_CTRL", WireCategory::General, Delay::flat(0.03));

        let ramw = self.graph.add_bel(
            self.id(&format!("R{y}C{x}_RAMW")),
            self.ids.ramw,
            Loc::new(x, y, (2 << 3) | 4),
            false,
            self.ids.ramw,
        );
        self.graph.add_bel_pin(ramw, self.ids.clk, PortDir::Input, clk);
        self.graph.add_bel_pin(ramw, self.ids.lsr, PortDir::Input, lsr);

        // Write data and address inputs arrive over general routing.
        for (i, pin) in ["D1", "C1", "A1", "B1", "D0", "B0", "C0", "A0"].iter().enumerate() {
            let w = self.wire_or(x, y, &format!("RW_{pin}"), "BEL_IN", WireCategory::General, Delay::flat(0.02));
            for j in 0..2 {
                let src = self.local(x, y, (i as i32 + j * 3) % LOGIC_LOCALS);
                self.pip(src, w, x, y, "LOCAL_TO_IN", 0.12);
            }
            self.graph.add_bel_pin(ramw, self.id(pin), PortDir::Input, w);
        }

        // Distribution outputs over the tile's dedicated write wires.
        let wcko = self.wire_or(x, y, "WCKO", "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.01));
        let wreo = self.wire_or(x, y, "WREO", "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.01));
        self.pip(wcko, wck, x, y, "RAMW_DIST", 0.02);
        self.pip(wreo, wre, x, y, "RAMW_DIST", 0.02);
        self.graph.add_bel_pin(ramw, self.ids.wcko, PortDir::Output, wcko);
        self.graph.add_bel_pin(ramw, self.ids.wreo, PortDir::Output, wreo);
        for i in 0..4 {
            let wado = self.wire_or(x, y, &format!("WADO{i}"), "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.01));
            self.pip(wado, wads[i as usize], x, y, "RAMW_DIST", 0.02);
            self.graph
                .add_bel_pin(ramw, self.id(&format!("WADO{i}")), PortDir::Output, wado);
            let wdo = self.wire_or(x, y, &format!("WDO{i}"), "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.01));
            let wdi = self.wire_or(x, y, &format!("WDI{i}"), "RAMW_OUT", WireCategory::Dedicated, Delay::flat(0.02));
            self.pip(wdo, wdi, x, y, "RAMW_DIST", 0.02);
            self.graph
                .add_bel_pin(ramw, self.id(&format!("WDO{i}")), PortDir::Output, wdo);
        }
    }

    /// Hidden single-instance bels that exist so every packable cell type
    /// has a reference bel for port auto-creation, even when the fabric
    /// has no routable site for it yet.
    fn build_macro_bels(&mut self) {
        let macros: [(&str, &[&str]); 10] = [
            ("EBR_CORE", &["CLKA", "CLKB", "CEA", "CEB", "RSTA", "RSTB", "WEA"]),
            ("PREADD9_CORE", &["CLK", "CEB", "RSTB"]),
            ("MULT9_CORE", &["CLK", "CEA", "RSTA"]),
            ("MULT18_CORE", &["CLK"]),
            ("MULT18X36_CORE", &["CLK"]),
            ("REG18_CORE", &["CLK", "CEP", "RSTP"]),
            ("ACC54_CORE", &["CLK"]),
            ("DCS", &["CLK0", "CLK1", "SEL"]),
            ("PLL_CORE", &["REFCK"]),
            ("OSC_CORE", &[]),
        ];
        for (k, (ty, pins)) in macros.into_iter().enumerate() {
            let stub = self.wire_or(
                0,
                0,
                &format!("MACRO{k}_STUB"),
                "MACRO_STUB",
                WireCategory::Dedicated,
                Delay::ZERO,
            );
            let ty_id = self.id(ty);
            let bel = self.graph.add_bel(
                self.id(&format!("MACRO_{ty}")),
                ty_id,
                Loc::new(0, 0, 32 + k as i32),
                true,
                ty_id,
            );
            for pin in pins {
                self.graph.add_bel_pin(bel, self.id(pin), PortDir::Input, stub);
            }
        }
    }

    fn build_io_tile(&mut self, x: i32, y: i32, side: char, pin_index: &mut u32) {
        self.build_interconnect(x, y, IO_LOCALS);

        let gclk = self.wire_or(x, y, "GCLK", "PAD_CLK", WireCategory::Dedicated, Delay::flat(0.02));

        for z in 0..2 {
            let i_wire = self.wire_or(x, y, &format!("IOB{z}_I"), "BEL_IN", WireCategory::General, Delay::flat(0.02));
            let o_wire = self.wire_or(x, y, &format!("IOB{z}_O"), "BEL_OUT", WireCategory::General, Delay::flat(0.02));
            let t_wire = self.wire_or(x, y, &format!("IOB{z}_T"), "BEL_IN", WireCategory::General, Delay::flat(0.02));
            for j in 0..IO_LOCALS {
                if j % 2 == z {
                    let src = self.local(x, y, j);
                    self.pip(src, i_wire, x, y, "LOCAL_TO_IN", 0.12);
                    self.pip(src, t_wire, x, y, "LOCAL_TO_IN", 0.12);
                } else {
                    let dst = self.local(x, y, j);
                    self.pip(o_wire, dst, x, y, "OUT_TO_LOCAL", 0.12);
                }
            }
            if z == 0 {
                self.pip(o_wire, gclk, x, y, "PAD_CLK_TAP", 0.02);
            }

            let pad = self.wire_or(x, y, &format!("IOB{z}_PAD"), "PAD", WireCategory::Dedicated, Delay::ZERO);
            let bel = self.graph.add_bel(
                self.id(&format!("R{y}C{x}_IOB{z}")),
                self.ids.iob_core,
                Loc::new(x, y, z),
                false,
                self.ids.iob_core,
            );
            self.graph.add_bel_pin(bel, self.ids.i, PortDir::Input, i_wire);
            self.graph.add_bel_pin(bel, self.ids.o, PortDir::Output, o_wire);
            self.graph.add_bel_pin(bel, self.ids.t, PortDir::Input, t_wire);
            self.graph.add_bel_pin(bel, self.ids.b, PortDir::Inout, pad);

            *pin_index += 1;
            self.pkg_pins.insert(format!("{side}{pin_index}"), bel);

            self.build_iologic(x, y, z, o_wire, i_wire, t_wire);
        }
    }

    /// One IO-logic bel per pad, at z = pad_z + 3, joined to the pad's
    /// buffer over dedicated paths.
    fn build_iologic(&mut self, x: i32, y: i32, z: i32, pad_o: WireId, pad_i: WireId, pad_t: WireId) {
        let p = |suffix: &str| format!("IOL{z}_{suffix}");
        let di = self.wire_or(x, y, &p("DI"), "IOL", WireCategory::Dedicated, Delay::flat(0.01));
        let dout = self.wire_or(x, y, &p("DOUT"), "IOL", WireCategory::Dedicated, Delay::flat(0.01));
        let tout = self.wire_or(x, y, &p("TOUT"), "IOL", WireCategory::Dedicated, Delay::flat(0.01));
        self.pip(pad_o, di, x, y, "PAD_TO_IOL", 0.02);
        self.pip(dout, pad_i, x, y, "IOL_TO_PAD", 0.02);
        self.pip(tout, pad_t, x, y, "IOL_TO_PAD", 0.02);

        let bel = self.graph.add_bel(
            self.id(&format!("R{y}C{x}_IOL{z}")),
            self.ids.iologic,
            Loc::new(x, y, z + 3),
            false,
            self.ids.iologic,
        );
        self.graph.add_bel_pin(bel, self.id("DI"), PortDir::Input, di);
        self.graph.add_bel_pin(bel, self.id("DOUT"), PortDir::Output, dout);
        self.graph.add_bel_pin(bel, self.id("TOUT"), PortDir::Output, tout);

        for pin in ["SCLKIN", "SCLKOUT", "LSRIN", "LSROUT", "TXDATA0", "TXDATA1", "TSDATA0"] {
            let w = self.wire_or(x, y, &p(pin), "IOL", WireCategory::General, Delay::flat(0.02));
            for j in 0..IO_LOCALS {
                if j % 2 == z {
                    let src = self.local(x, y, j);
                    self.pip(src, w, x, y, "LOCAL_TO_IN", 0.12);
                }
            }
            self.graph.add_bel_pin(bel, self.id(pin), PortDir::Input, w);
        }
        for pin in ["RXDATA0", "RXDATA1"] {
            let w = self.wire_or(x, y, &p(pin), "IOL", WireCategory::General, Delay::flat(0.02));
            for j in 0..IO_LOCALS {
                if j % 2 != z {
                    let dst = self.local(x, y, j);
                    self.pip(w, dst, x, y, "OUT_TO_LOCAL", 0.12);
                }
            }
            self.graph.add_bel_pin(bel, self.id(pin), PortDir::Output, w);
        }
    }

    fn build_globals(&mut self, globals: u32) {
        // Collect every pad clock tap first.
        let mut gclk_taps = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.has_io(x, y) {
                    gclk_taps.push(self.wire_or(x, y, "GCLK", "PAD_CLK", WireCategory::Dedicated, Delay::flat(0.02)));
                }
            }
        }

        for g in 0..globals as i32 {
            let clki = self.wire_or(0, 0, &format!("GB{g}_CLKI"), "GLB_IN", WireCategory::Dedicated, Delay::flat(0.02));
            let clko = self.wire_or(0, 0, &format!("GB{g}_CLKO"), "GLB_OUT", WireCategory::Global, Delay::flat(0.02));
            let spine = self.wire_or(0, 0, &format!("GLB{g}"), "GLB_SPINE", WireCategory::Global, Delay::flat(0.1));
            self.pip(clko, spine, 0, 0, "GLB_DRIVE", 0.05);

            for &tap in &gclk_taps {
                let pt = self.id("PAD_TO_GLB");
                self.graph
                    .add_pip(tap, clki, Loc::new(0, 0, g), pt, Delay::flat(0.05), None);
            }

            let bel = self.graph.add_bel(
                self.id(&format!("GBUF{g}")),
                self.ids.dcc,
                Loc::new(0, 0, g),
                false,
                self.ids.dcc,
            );
            self.graph.add_bel_pin(bel, self.ids.clki, PortDir::Input, clki);
            self.graph.add_bel_pin(bel, self.ids.clko, PortDir::Output, clko);
        }

        // Spine taps into every logic tile's clock wire.
        for y in 0..self.height {
            for x in 0..self.width {
                if self.has_logic(x, y) {
                    let clk = self.wire_or(x, y, "CLK", "TILE_CTRL", WireCategory::General, Delay::flat(0.03));
                    for g in 0..globals as i32 {
                        let spine = self.wire_or(0, 0, &format!("GLB{g}"), "GLB_SPINE", WireCategory::Global, Delay::flat(0.1));
                        self.pip(spine, clk, x, y, "GLB_TAP", 0.05);
                    }
                }
            }
        }
    }
}

/// Builds the device graph of a `width`×`height` fabric with `globals`
/// global buffers.
pub fn build_grid(
    interner: &Interner,
    ids: &ConstIds,
    name: &str,
    width: i32,
    height: i32,
    globals: u32,
) -> GridOutput {
    assert!(width >= 3 && height >= 3, "fabric needs an interior");
    let mut b = GridBuilder {
        interner,
        ids,
        graph: DeviceGraph::new(name, width, height),
        width,
        height,
        pkg_pins: HashMap::new(),
    };
    b.graph.global_buffers = globals;

    for y in 0..height {
        for x in 0..width {
            if b.has_logic(x, y) {
                b.build_logic_tile(x, y);
            }
        }
    }
    // IO tiles, one package pin letter per side.
    let mut south = 0;
    let mut north = 0;
    let mut west = 0;
    let mut east = 0;
    for x in 1..width - 1 {
        b.build_io_tile(x, 0, 'A', &mut south);
        b.build_io_tile(x, height - 1, 'C', &mut north);
    }
    for y in 1..height - 1 {
        b.build_io_tile(0, y, 'D', &mut west);
        b.build_io_tile(width - 1, y, 'B', &mut east);
    }

    b.build_globals(globals);
    b.build_macro_bels();

    debug_assert!(b.graph.validate().is_ok());
    GridOutput {
        graph: b.graph,
        pkg_pins: b.pkg_pins,
    }
}
