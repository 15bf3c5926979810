//! The architecture capability interface.
//!
//! [`Architecture`] is the narrow contract every generic algorithm targets:
//! queries against the immutable device graph, thin wrappers over the
//! binding tables, delay and estimator queries, validity checks, and the
//! mutation hooks that let a family maintain incremental side tables.
//! A new device family implements this trait plus a pack flow; nothing in
//! the packer, router, or timing analyzer knows which family it runs on.
//!
//! The [`fabric`] module provides the built-in demo family, a
//! programmatically generated grid used throughout the test suite.

#![warn(missing_docs)]

pub mod fabric;
pub mod pin_style;

pub use halcyon_place::Validity;
pub use pin_style::PinStyle;

use halcyon_common::{Ident, PnrError, PnrResult};
use halcyon_device::{BelId, Delay, DeviceGraph, PipId, WireId};
use halcyon_netlist::{Cell, Context};

/// An inclusive rectangle used to prune routing search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    /// Left edge.
    pub x0: i32,
    /// Bottom edge.
    pub y0: i32,
    /// Right edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
}

impl BoundingBox {
    /// Returns whether `(x, y)` lies inside the box.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Grows the box by `margin` on every side.
    pub fn grown(&self, margin: i32) -> Self {
        Self {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }
}

/// The capability contract of one device family.
///
/// Query methods take `&self`; the mutation hooks take `&mut self` so a
/// family can keep incremental side tables (tile occupancy, congestion
/// overlays) without interior mutability. Generic algorithms hold
/// `&mut A` while they bind and `&A` while they only read.
pub trait Architecture {
    /// The canonical family name (e.g. `"fabric"`).
    fn family_name(&self) -> &str;

    /// The device name within the family.
    fn device_name(&self) -> &str;

    /// The immutable device graph.
    fn device(&self) -> &DeviceGraph;

    // --- Availability ---

    /// Whether `bel` can accept a binding right now.
    fn bel_available(&self, ctx: &Context, bel: BelId) -> bool {
        ctx.bindings.cell_at(bel).is_none()
    }

    /// Whether `wire` can accept a binding right now.
    fn wire_available(&self, ctx: &Context, wire: WireId) -> bool {
        ctx.bindings.net_on_wire(wire).is_none()
    }

    /// Whether `pip` can be enabled right now.
    fn pip_available(&self, ctx: &Context, pip: PipId) -> bool {
        ctx.bindings.net_on_pip(pip).is_none()
            && self.wire_available(ctx, self.device().pip(pip).dst)
    }

    /// Whether `pip` can be enabled for `net`. True also when the pip or
    /// its destination wire is already owned by that same net.
    fn pip_available_for_net(&self, ctx: &Context, pip: PipId, net: Ident) -> bool {
        match ctx.bindings.net_on_pip(pip) {
            Some(owner) => owner == net,
            None => match ctx.bindings.net_on_wire(self.device().pip(pip).dst) {
                Some(owner) => owner == net,
                None => true,
            },
        }
    }

    // --- Delays ---

    /// Delay through a pip.
    fn pip_delay(&self, pip: PipId) -> Delay {
        self.device().pip(pip).delay
    }

    /// Intrinsic delay of a wire.
    fn wire_delay(&self, wire: WireId) -> Delay {
        self.device().wire(wire).delay
    }

    /// Combinational delay through `cell` from `from_port` to `to_port`,
    /// or `None` when no combinational arc exists between them.
    fn cell_delay(&self, cell: &Cell, from_port: Ident, to_port: Ident) -> Option<Delay>;

    /// Setup requirement of `port` on `cell` against `clock_port`.
    fn setup_time(&self, cell: &Cell, port: Ident, clock_port: Ident) -> Delay;

    /// Hold requirement of `port` on `cell` against `clock_port`.
    fn hold_time(&self, cell: &Cell, port: Ident, clock_port: Ident) -> Delay;

    /// Clock-to-output delay of `port` on `cell` against `clock_port`.
    fn clock_to_out(&self, cell: &Cell, port: Ident, clock_port: Ident) -> Delay;

    // --- Estimators ---

    /// The per-tile delay scale of the estimators.
    fn grid_delay_ns(&self) -> f64 {
        0.1
    }

    /// A monotone lower bound on the routing delay from `src` to `dst`,
    /// usable as an A* heuristic.
    fn estimate_delay(&self, src: WireId, dst: WireId) -> f64 {
        let ws = self.device().wire(src);
        let wd = self.device().wire(dst);
        ((ws.x - wd.x).abs() + (ws.y - wd.y).abs()) as f64 * self.grid_delay_ns()
    }

    /// A placement-time estimate of the delay between two bel pins.
    fn predict_delay(
        &self,
        src_bel: BelId,
        _src_pin: Ident,
        dst_bel: BelId,
        _dst_pin: Ident,
    ) -> f64 {
        let a = self.device().bel(src_bel).loc;
        let b = self.device().bel(dst_bel).loc;
        a.manhattan(&b) as f64 * self.grid_delay_ns()
    }

    /// The search rectangle for routing an arc from `src` to `dst`.
    fn route_bounding_box(&self, src: WireId, dst: WireId) -> BoundingBox {
        let ws = self.device().wire(src);
        let wd = self.device().wire(dst);
        BoundingBox {
            x0: ws.x.min(wd.x),
            y0: ws.y.min(wd.y),
            x1: ws.x.max(wd.x),
            y1: ws.y.max(wd.y),
        }
        .grown(2)
    }

    // --- Validity ---

    /// Whether a cell of `cell_type` can ever bind to `bel`.
    fn bel_valid_for_cell_type(&self, cell_type: Ident, bel: BelId) -> bool {
        self.device().bel(bel).bel_type == cell_type
    }

    /// Whether the current binding at `bel`'s location satisfies the
    /// family's co-location rules. Called after every trial placement.
    fn bel_location_valid(&self, _ctx: &Context, _bel: BelId, _explain: bool) -> Validity {
        Validity::valid()
    }

    // --- Mutation hooks ---

    /// Called after the binding at `bel` changed.
    fn on_bel_change(&mut self, _ctx: &Context, _bel: BelId) {}

    /// Called after the binding at `wire` changed.
    fn on_wire_change(&mut self, _ctx: &Context, _wire: WireId) {}

    /// Called after the binding at `pip` changed.
    fn on_pip_change(&mut self, _ctx: &Context, _pip: PipId) {}

    // --- Pin capabilities ---

    /// The capability flags of `port` on cells of `cell_type`.
    fn cell_pin_style(&self, _cell_type: Ident, _port: Ident) -> PinStyle {
        PinStyle::NONE
    }

    // --- Package and globals ---

    /// Resolves a package pin name to its IO bel.
    fn package_pin_bel(&self, _pin: &str) -> Option<BelId> {
        None
    }

    /// The number of global buffer resources.
    fn global_buffer_count(&self) -> u32 {
        self.device().global_buffers
    }
}

/// Factory signature for one registered family.
pub type ArchFactory = fn(device: &str) -> PnrResult<(Context, Box<dyn Architecture>)>;

/// The explicit registry of device families.
///
/// Families are registered at construction and looked up by name; there is
/// no process-wide self-registration list.
pub struct ArchRegistry {
    entries: Vec<(String, ArchFactory)>,
}

impl ArchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates a registry with the built-in families registered.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("fabric", fabric::create_boxed);
        reg
    }

    /// Registers a family factory under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ArchFactory) {
        self.entries.push((name.into(), factory));
    }

    /// Creates a context and architecture for `family`/`device`.
    pub fn create(&self, family: &str, device: &str) -> PnrResult<(Context, Box<dyn Architecture>)> {
        for (name, factory) in &self.entries {
            if name.eq_ignore_ascii_case(family) {
                return factory(device);
            }
        }
        let known: Vec<&str> = self.entries.iter().map(|(n, _)| n.as_str()).collect();
        Err(PnrError::user(format!(
            "unknown device family '{family}'. Registered families: {}",
            known.join(", ")
        )))
    }
}

impl Default for ArchRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
