//! Cells: instances of primitives placed onto bels.

use crate::property::Property;
use halcyon_common::Ident;
use halcyon_device::{BelId, PortDir};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The strength of a placement or routing binding.
///
/// Bindings below [`Locked`](PlaceStrength::Locked) may be ripped up by the
/// router's negotiation loop; [`User`](PlaceStrength::User) marks
/// constraints that came directly from the user and must never move.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub enum PlaceStrength {
    /// Not bound.
    #[default]
    None,
    /// Freely movable (placer trial moves).
    Weak,
    /// Bound by an optimization pass; movable with cause.
    Strong,
    /// Fixed by a tool decision (packer pre-placement).
    Fixed,
    /// Never ripped up by the router.
    Locked,
    /// Pinned by an explicit user constraint.
    User,
}

/// The configured source of a cell input pin.
///
/// Set by the packer's constant legalization when a pin has a hard
/// inverter or hard constant option instead of a routed signal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum PinMux {
    /// The pin follows its routed signal.
    #[default]
    Signal,
    /// The pin uses its hard inverter on the routed signal.
    Inverted,
    /// The pin is tied to constant 0.
    Const0,
    /// The pin is tied to constant 1.
    Const1,
}

/// A typed connection point on a cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Port {
    /// Port name.
    pub name: Ident,
    /// Signal direction relative to the cell.
    pub dir: PortDir,
    /// The connected net, if any.
    pub net: Option<Ident>,
    /// For input ports: the stable index into the net's user list.
    pub user_idx: Option<usize>,
}

/// An instance of a primitive in the netlist.
///
/// A cell may carry a current bel binding with a strength, cluster
/// membership with relative placement constraints for macros, and an
/// optional region constraint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cell {
    /// Cell name (unique within the netlist).
    pub name: Ident,
    /// Primitive type (e.g. `LUT4`, `SLICE_FF`, `EBR_CORE`).
    pub cell_type: Ident,
    /// Free-form attributes (`BEL`, `LOC`, `IO_TYPE`, ...).
    pub attrs: BTreeMap<Ident, Property>,
    /// Primitive parameters (`INIT`, `MODE`, ...).
    pub params: BTreeMap<Ident, Property>,
    /// Ports by name.
    pub ports: BTreeMap<Ident, Port>,
    /// Current bel binding, if placed.
    pub bel: Option<BelId>,
    /// Strength of the bel binding.
    pub bel_strength: PlaceStrength,
    /// The name of this cell's cluster root, when clustered.
    pub cluster: Option<Ident>,
    /// Relative x offset from the cluster root.
    pub constr_dx: i32,
    /// Relative y offset from the cluster root.
    pub constr_dy: i32,
    /// z offset: relative to the root, or absolute when `constr_abs_z`.
    pub constr_dz: i32,
    /// Whether `constr_dz` is an absolute sub-tile index.
    pub constr_abs_z: bool,
    /// Cells constrained relative to this one (cluster root only).
    pub constr_children: Vec<Ident>,
    /// Region constraint, if the cell is pinned to a fabric subset.
    pub region: Option<Ident>,
    /// Pin mux settings produced by constant legalization.
    pub pin_muxes: BTreeMap<Ident, PinMux>,
}

impl Cell {
    /// Creates an unplaced cell with no ports.
    pub fn new(name: Ident, cell_type: Ident) -> Self {
        Self {
            name,
            cell_type,
            attrs: BTreeMap::new(),
            params: BTreeMap::new(),
            ports: BTreeMap::new(),
            bel: None,
            bel_strength: PlaceStrength::None,
            cluster: None,
            constr_dx: 0,
            constr_dy: 0,
            constr_dz: 0,
            constr_abs_z: false,
            constr_children: Vec::new(),
            region: None,
            pin_muxes: BTreeMap::new(),
        }
    }

    /// Returns the net connected to `port`, if any.
    pub fn port_net(&self, port: Ident) -> Option<Ident> {
        self.ports.get(&port).and_then(|p| p.net)
    }

    /// Returns the pin mux setting for `port` (defaults to `Signal`).
    pub fn pin_mux(&self, port: Ident) -> PinMux {
        self.pin_muxes.get(&port).copied().unwrap_or_default()
    }

    /// Returns whether this cell belongs to a cluster.
    pub fn is_clustered(&self) -> bool {
        self.cluster.is_some()
    }

    /// Returns a parameter as a string, or `default` when absent.
    pub fn param_str(&self, key: Ident, default: &str) -> String {
        self.params
            .get(&key)
            .map(|p| p.as_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// Returns a parameter's integer view, or `default` when absent.
    pub fn param_int(&self, key: Ident, default: u64) -> u64 {
        self.params.get(&key).map(|p| p.as_int64()).unwrap_or(default)
    }
}
