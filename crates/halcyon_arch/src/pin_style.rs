//! Per-pin capability flags consulted by the packer.
//!
//! A pin style describes what a cell input pin can do beyond carrying a
//! routed signal: whether it has a hard inverter, hard constant options,
//! what it defaults to when left disconnected, and whether it is a clock
//! input eligible for global promotion.

use serde::{Deserialize, Serialize};

/// A bit set of pin capabilities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct PinStyle(u32);

impl PinStyle {
    /// No capabilities: a plain signal pin with no disconnect default.
    pub const NONE: PinStyle = PinStyle(0);
    /// The pin has a hard constant-0 option.
    pub const OPT_LO: PinStyle = PinStyle(1 << 0);
    /// The pin has a hard constant-1 option.
    pub const OPT_HI: PinStyle = PinStyle(1 << 1);
    /// The pin has a hard inverter.
    pub const OPT_INV: PinStyle = PinStyle(1 << 2);
    /// Disconnected pins default to constant 0.
    pub const DEF_0: PinStyle = PinStyle(1 << 4);
    /// Disconnected pins default to constant 1.
    pub const DEF_1: PinStyle = PinStyle(1 << 5);
    /// The pin is a clock input; nets driving it count toward global
    /// promotion fanout.
    pub const GLB_CLK: PinStyle = PinStyle(1 << 8);

    /// Returns whether every flag in `other` is set in `self`.
    pub fn has(self, other: PinStyle) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two styles.
    pub const fn union(self, other: PinStyle) -> PinStyle {
        PinStyle(self.0 | other.0)
    }
}

impl std::ops::BitOr for PinStyle {
    type Output = PinStyle;

    fn bitor(self, rhs: PinStyle) -> PinStyle {
        self.union(rhs)
    }
}

/// The conventional style of an FF clock pin.
pub const STYLE_CLK: PinStyle = PinStyle::OPT_INV.union(PinStyle::DEF_0).union(PinStyle::GLB_CLK);
/// The conventional style of an FF clock-enable pin.
pub const STYLE_CE: PinStyle = PinStyle::OPT_INV.union(PinStyle::DEF_1);
/// The conventional style of an FF set/reset pin.
pub const STYLE_LSR: PinStyle = PinStyle::OPT_INV.union(PinStyle::DEF_0);
/// The conventional style of a LUT data input.
pub const STYLE_LUT_IN: PinStyle = PinStyle::OPT_LO.union(PinStyle::OPT_HI).union(PinStyle::DEF_1);
