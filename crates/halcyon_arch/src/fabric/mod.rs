//! The built-in demo family: a programmatically generated fabric.
//!
//! The fabric family exists so that every generic algorithm in Halcyon has
//! a real device to run against without an external database: a grid of
//! logic tiles (four slices of paired LUT/FF bels plus a RAM write
//! control), perimeter IO, dedicated carry/LUT→FF/write paths, and global
//! clock buffers with their own spines. Devices are named `fab-<W>x<H>`.

mod grid;

pub use grid::{build_grid, GridOutput};

use crate::pin_style::{PinStyle, STYLE_CE, STYLE_CLK, STYLE_LSR, STYLE_LUT_IN};
use crate::Architecture;
use halcyon_common::{ConstIds, Ident, Interner, PnrError, PnrResult};
use halcyon_device::{BelId, Delay, DeviceGraph, PipId, PseudoPipTag};
use halcyon_netlist::{Cell, Context};
use halcyon_place::{check_logic_tile, LogicRules, TileStatusTracker, Validity};
use std::collections::HashMap;
use std::sync::Arc;

/// Construction parameters of one fabric device.
#[derive(Clone, Debug)]
pub struct FabricConfig {
    /// Device name (also the graph name).
    pub name: String,
    /// Grid width in tiles.
    pub width: i32,
    /// Grid height in tiles.
    pub height: i32,
    /// Number of global clock buffers.
    pub global_buffers: u32,
}

impl FabricConfig {
    /// Parses a device name of the form `fab-<W>x<H>`.
    pub fn parse(device: &str) -> PnrResult<Self> {
        let dims = device
            .strip_prefix("fab-")
            .ok_or_else(|| PnrError::user(format!("unknown fabric device '{device}'")))?;
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| PnrError::user(format!("unknown fabric device '{device}'")))?;
        let width: i32 = w
            .parse()
            .map_err(|_| PnrError::user(format!("bad fabric width in '{device}'")))?;
        let height: i32 = h
            .parse()
            .map_err(|_| PnrError::user(format!("bad fabric height in '{device}'")))?;
        if width < 3 || height < 3 {
            return Err(PnrError::user(format!(
                "fabric device '{device}' is too small; minimum is 3x3"
            )));
        }
        Ok(Self {
            name: device.to_string(),
            width,
            height,
            global_buffers: 16,
        })
    }
}

/// Architecture implementation of the fabric family.
pub struct FabricArch {
    device: Arc<DeviceGraph>,
    device_name: String,
    ids: ConstIds,
    pkg_pins: HashMap<String, BelId>,
    tracker: TileStatusTracker,
    rules: LogicRules,
    clk_style_ports: Vec<Ident>,
}

/// Creates a context and fabric architecture for `device`.
pub fn create(device: &str) -> PnrResult<(Context, FabricArch)> {
    let config = FabricConfig::parse(device)?;
    let interner = Interner::new();
    let ids = ConstIds::new(&interner);
    let out = build_grid(
        &interner,
        &ids,
        &config.name,
        config.width,
        config.height,
        config.global_buffers,
    );
    let clk_style_ports = vec![
        interner.intern("CLKA"),
        interner.intern("CLKB"),
        interner.intern("SCLKIN"),
        interner.intern("SCLKOUT"),
    ];
    let device_graph = Arc::new(out.graph);
    let arch = FabricArch {
        device: Arc::clone(&device_graph),
        device_name: config.name,
        ids: ids.clone(),
        pkg_pins: out.pkg_pins,
        tracker: TileStatusTracker::new(),
        rules: LogicRules::default(),
        clk_style_ports,
    };
    let ctx = Context::from_parts(interner, ids, device_graph);
    Ok((ctx, arch))
}

/// Registry adapter returning the architecture boxed.
pub fn create_boxed(device: &str) -> PnrResult<(Context, Box<dyn Architecture>)> {
    let (ctx, arch) = create(device)?;
    Ok((ctx, Box::new(arch)))
}

impl FabricArch {
    fn is_logic_slot_type(&self, ty: Ident) -> bool {
        ty == self.ids.slice_comb || ty == self.ids.slice_ff || ty == self.ids.ramw
    }

    fn is_ff_like(&self, ty: Ident) -> bool {
        ty == self.ids.slice_ff
            || ty == self.ids.fd1p3bx
            || ty == self.ids.fd1p3dx
            || ty == self.ids.fd1p3ix
            || ty == self.ids.fd1p3jx
    }
}

impl Architecture for FabricArch {
    fn family_name(&self) -> &str {
        "fabric"
    }

    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn device(&self) -> &DeviceGraph {
        &self.device
    }

    fn cell_delay(&self, cell: &Cell, from_port: Ident, to_port: Ident) -> Option<Delay> {
        let ids = &self.ids;
        if cell.cell_type == ids.slice_comb || cell.cell_type == ids.lut4 {
            let is_lut_in = [ids.a, ids.b, ids.c, ids.d].contains(&from_port);
            return match (is_lut_in, from_port, to_port) {
                (true, _, t) if t == ids.f => Some(Delay::flat(0.35)),
                (true, _, t) if t == ids.ofx => Some(Delay::flat(0.45)),
                (true, _, t) if t == ids.fco => Some(Delay::flat(0.40)),
                (_, f, t) if f == ids.fci && t == ids.fco => Some(Delay::flat(0.07)),
                (_, f, t) if f == ids.fci && t == ids.f => Some(Delay::flat(0.20)),
                (_, f, t) if f == ids.f1 && t == ids.ofx => Some(Delay::flat(0.10)),
                (_, f, t) if f == ids.sel && t == ids.ofx => Some(Delay::flat(0.30)),
                _ => None,
            };
        }
        if cell.cell_type == ids.dcc && from_port == ids.clki && to_port == ids.clko {
            return Some(Delay::flat(0.05));
        }
        if cell.cell_type == ids.iob_core {
            // Pad-side arcs are modeled as zero-cost; IO timing belongs to
            // the board, not the fabric.
            return Some(Delay::ZERO);
        }
        None
    }

    fn setup_time(&self, cell: &Cell, _port: Ident, _clock_port: Ident) -> Delay {
        if self.is_ff_like(cell.cell_type) || cell.cell_type == self.ids.ramw {
            Delay::flat(0.12)
        } else if cell.cell_type == self.ids.ebr_core {
            Delay::flat(0.20)
        } else {
            Delay::ZERO
        }
    }

    fn hold_time(&self, cell: &Cell, _port: Ident, _clock_port: Ident) -> Delay {
        if self.is_ff_like(cell.cell_type) {
            Delay::flat(0.03)
        } else {
            Delay::ZERO
        }
    }

    fn clock_to_out(&self, cell: &Cell, _port: Ident, _clock_port: Ident) -> Delay {
        if self.is_ff_like(cell.cell_type) {
            Delay::flat(0.25)
        } else if cell.cell_type == self.ids.ebr_core {
            Delay::flat(0.60)
        } else {
            Delay::ZERO
        }
    }

    fn pip_available(&self, ctx: &Context, pip: PipId) -> bool {
        if let Some(PseudoPipTag::LutThru { bel }) = &self.device.pip(pip).pseudo {
            if ctx.bindings.cell_at(*bel).is_some() {
                return false;
            }
        }
        ctx.bindings.net_on_pip(pip).is_none()
            && self.wire_available(ctx, self.device.pip(pip).dst)
    }

    fn pip_available_for_net(&self, ctx: &Context, pip: PipId, net: Ident) -> bool {
        if let Some(PseudoPipTag::LutThru { bel }) = &self.device.pip(pip).pseudo {
            if ctx.bindings.cell_at(*bel).is_some() {
                return false;
            }
        }
        match ctx.bindings.net_on_pip(pip) {
            Some(owner) => owner == net,
            None => match ctx.bindings.net_on_wire(self.device.pip(pip).dst) {
                Some(owner) => owner == net,
                None => true,
            },
        }
    }

    fn bel_location_valid(&self, ctx: &Context, bel: BelId, explain: bool) -> Validity {
        let b = self.device.bel(bel);
        if !self.is_logic_slot_type(b.bel_type) {
            return Validity::valid();
        }
        match self.tracker.tile(b.loc.x, b.loc.y) {
            Some(tile) => check_logic_tile(&ctx.netlist, &ctx.ids, tile, &self.rules, explain),
            None => Validity::valid(),
        }
    }

    fn on_bel_change(&mut self, ctx: &Context, bel: BelId) {
        let b = self.device.bel(bel);
        if self.is_logic_slot_type(b.bel_type) {
            self.tracker
                .set_cell(b.loc.x, b.loc.y, b.loc.z, ctx.bindings.cell_at(bel));
        }
    }

    fn cell_pin_style(&self, cell_type: Ident, port: Ident) -> PinStyle {
        let ids = &self.ids;
        if self.is_ff_like(cell_type) || cell_type == ids.ramw {
            if port == ids.clk || port == ids.ck {
                return STYLE_CLK;
            }
            if port == ids.ce || port == ids.sp {
                return STYLE_CE;
            }
            if port == ids.lsr || port == ids.cd || port == ids.pd {
                return STYLE_LSR;
            }
            return PinStyle::NONE;
        }
        if cell_type == ids.slice_comb || cell_type == ids.lut4 {
            if [ids.a, ids.b, ids.c, ids.d].contains(&port) {
                return STYLE_LUT_IN;
            }
            return PinStyle::NONE;
        }
        if cell_type == ids.dcc && port == ids.clki {
            return STYLE_CLK;
        }
        if cell_type == ids.dcs && (port == ids.clk0 || port == ids.clk1) {
            return STYLE_CLK;
        }
        if (cell_type == ids.ebr_core || cell_type == ids.iologic)
            && self.clk_style_ports.contains(&port)
        {
            return STYLE_CLK;
        }
        PinStyle::NONE
    }

    fn package_pin_bel(&self, pin: &str) -> Option<BelId> {
        self.pkg_pins.get(pin).copied()
    }
}

impl FabricArch {
    /// The package pin names of this device, for tests and constraint
    /// tooling.
    pub fn package_pins(&self) -> impl Iterator<Item = (&str, BelId)> {
        self.pkg_pins.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
