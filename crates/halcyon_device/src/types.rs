//! Structural elements of the device graph.
//!
//! Bels, wires, and pips are the three entity kinds of an FPGA fabric.
//! A bel is a site a cell can be bound to; a wire is a named electrical
//! node; a pip is a directed switch between two wires. Pseudo-pips model
//! routability of configuration states (constant drivers, input
//! permutations) without a bitstream bit of their own.

use crate::ids::{BelId, PipId, WireId};
use halcyon_common::Ident;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical location on the fabric grid.
///
/// `x`/`y` address a tile; `z` distinguishes co-located bels (slice and
/// half-slice positions within a logic tile, A/B pads of an IO pair).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Loc {
    /// Column, left to right.
    pub x: i32,
    /// Row, bottom to top.
    pub y: i32,
    /// Sub-tile index.
    pub z: i32,
}

impl Loc {
    /// Creates a location from its components.
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Manhattan distance to `other`, ignoring `z`.
    pub fn manhattan(&self, other: &Loc) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X{}/Y{}/Z{}", self.x, self.y, self.z)
    }
}

/// Direction of a bel pin or cell port.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PortDir {
    /// Signal flows into the bel/cell.
    Input,
    /// Signal flows out of the bel/cell.
    Output,
    /// Bidirectional (IO pads).
    Inout,
}

/// A timing delay with min/typical/max corners, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delay {
    /// Minimum delay (fast corner).
    pub min_ns: f64,
    /// Typical delay (nominal corner).
    pub typ_ns: f64,
    /// Maximum delay (slow corner).
    pub max_ns: f64,
}

impl Delay {
    /// A zero delay.
    pub const ZERO: Self = Self {
        min_ns: 0.0,
        typ_ns: 0.0,
        max_ns: 0.0,
    };

    /// Creates a new delay with the given corners.
    pub fn new(min_ns: f64, typ_ns: f64, max_ns: f64) -> Self {
        Self {
            min_ns,
            typ_ns,
            max_ns,
        }
    }

    /// Creates a delay with all corners equal.
    pub fn flat(ns: f64) -> Self {
        Self::new(ns, ns, ns)
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::ZERO
    }
}

/// The routing class of a wire.
///
/// The dedicated global router only explores wires whose category is not
/// [`General`](WireCategory::General); the main router explores everything.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum WireCategory {
    /// General-purpose interconnect.
    #[default]
    General,
    /// Dedicated routing (carry chains, cascade paths, pad-adjacent links).
    Dedicated,
    /// Global distribution (clock spines and taps).
    Global,
}

/// A tag carried by a pseudo-pip for the bitstream writer's benefit.
///
/// Pseudo-pips have no configuration bit of their own; they describe a
/// routability consequence of some other configuration state.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PseudoPipTag {
    /// A LUT acting as a route-through or constant driver.
    LutThru {
        /// The bel whose LUT mask realizes the route-through.
        bel: BelId,
    },
    /// A post-route LUT input permutation.
    LutPermutation {
        /// The input index the permutation maps onto.
        index: u8,
    },
}

/// A pin on a bel: a named connection point incident to exactly one wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BelPin {
    /// Pin name (e.g. `A`, `CLK`, `F`).
    pub name: Ident,
    /// Signal direction relative to the bel.
    pub dir: PortDir,
    /// The wire this pin connects to.
    pub wire: WireId,
}

/// A basic element of logic: a single placeable site.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bel {
    /// The bel's hierarchical name.
    pub name: Ident,
    /// The cell type this bel hosts (e.g. `SLICE_COMB`, `SLICE_FF`).
    pub bel_type: Ident,
    /// Grid location.
    pub loc: Loc,
    /// Pins in declaration order.
    pub pins: Vec<BelPin>,
    /// Hidden bels are excluded from utilization counts.
    pub hidden: bool,
    /// The placer bucket grouping compatible bels.
    pub bucket: Ident,
}

impl Bel {
    /// Returns the pin with the given name, if present.
    pub fn pin(&self, name: Ident) -> Option<&BelPin> {
        self.pins.iter().find(|p| p.name == name)
    }
}

/// A routing node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wire {
    /// The wire's name.
    pub name: Ident,
    /// The wire's type (family-specific classification).
    pub wire_type: Ident,
    /// Routing class, consulted by the dedicated global router.
    pub category: WireCategory,
    /// Grid footprint.
    pub x: i32,
    /// Grid footprint.
    pub y: i32,
    /// Intrinsic wire delay.
    pub delay: Delay,
    /// Bel pins touching this wire, as (bel, pin name) pairs.
    pub bel_pins: Vec<(BelId, Ident)>,
    /// Pips whose destination is this wire.
    pub uphill: Vec<PipId>,
    /// Pips whose source is this wire.
    pub downhill: Vec<PipId>,
}

/// A directed programmable switch between two wires.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pip {
    /// Source wire.
    pub src: WireId,
    /// Destination wire.
    pub dst: WireId,
    /// Grid location (for display and bounding-box checks).
    pub loc: Loc,
    /// The pip's type (family-specific classification).
    pub pip_type: Ident,
    /// Delay through the switch.
    pub delay: Delay,
    /// Present when the pip has no bitstream bit of its own.
    pub pseudo: Option<PseudoPipTag>,
}

impl Pip {
    /// Returns whether this is a pseudo-pip.
    pub fn is_pseudo(&self) -> bool {
        self.pseudo.is_some()
    }
}
