//! FF control sets.
//!
//! All flip-flops sharing a control-set region of a tile must agree on the
//! whole tuple (clock, clock polarity, enable, enable polarity, set/reset,
//! set/reset polarity, sync/async). The tuple is extracted once per cell
//! from its ports and mux-select parameters.

use halcyon_common::{ConstIds, Ident};
use halcyon_netlist::Cell;
use serde::{Deserialize, Serialize};

/// The control-set fingerprint of a flip-flop (or RAM write port).
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct FfControlSet {
    /// The clock net.
    pub clk: Option<Ident>,
    /// Whether the clock is used inverted (`CLKMUX == "INV"`).
    pub clk_inverted: bool,
    /// The clock-enable net.
    pub ce: Option<Ident>,
    /// Whether the enable is used inverted (`CEMUX == "INV"`).
    pub ce_inverted: bool,
    /// The set/reset net.
    pub lsr: Option<Ident>,
    /// Whether the set/reset is used inverted (`LSRMUX == "INV"`).
    pub lsr_inverted: bool,
    /// Whether the set/reset acts asynchronously (`SRMODE == "ASYNC"`).
    pub async_sr: bool,
    /// Whether the register sets rather than resets (`REGSET == "SET"`).
    pub regset: bool,
}

impl FfControlSet {
    /// Extracts the control set of a normalized FF (or RAMW) cell.
    pub fn from_cell(cell: &Cell, ids: &ConstIds) -> Self {
        let mux_inverted = |key| cell.param_str(key, "SIG") == "INV";
        Self {
            clk: cell.port_net(ids.clk),
            clk_inverted: mux_inverted(ids.clkmux),
            ce: cell.port_net(ids.ce),
            ce_inverted: mux_inverted(ids.cemux),
            lsr: cell.port_net(ids.lsr),
            lsr_inverted: mux_inverted(ids.lsrmux),
            async_sr: cell.param_str(ids.srmode, "LSR_OVER_CE") == "ASYNC",
            regset: cell.param_str(ids.regset, "RESET") == "SET",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_common::Interner;
    use halcyon_netlist::Property;

    fn ids() -> (Interner, ConstIds) {
        let interner = Interner::new();
        let ids = ConstIds::new(&interner);
        (interner, ids)
    }

    fn ff_with_clk(interner: &Interner, ids: &ConstIds, clk_net: &str) -> Cell {
        let mut cell = Cell::new(interner.intern("ff"), ids.slice_ff);
        cell.ports.insert(
            ids.clk,
            halcyon_netlist::Port {
                name: ids.clk,
                dir: halcyon_device::PortDir::Input,
                net: Some(interner.intern(clk_net)),
                user_idx: None,
            },
        );
        cell
    }

    #[test]
    fn same_wiring_same_set() {
        let (interner, ids) = ids();
        let a = ff_with_clk(&interner, &ids, "clk");
        let b = ff_with_clk(&interner, &ids, "clk");
        assert_eq!(
            FfControlSet::from_cell(&a, &ids),
            FfControlSet::from_cell(&b, &ids)
        );
    }

    #[test]
    fn different_clock_different_set() {
        let (interner, ids) = ids();
        let a = ff_with_clk(&interner, &ids, "clk_a");
        let b = ff_with_clk(&interner, &ids, "clk_b");
        assert_ne!(
            FfControlSet::from_cell(&a, &ids),
            FfControlSet::from_cell(&b, &ids)
        );
    }

    #[test]
    fn polarity_is_part_of_the_set() {
        let (interner, ids) = ids();
        let a = ff_with_clk(&interner, &ids, "clk");
        let mut b = ff_with_clk(&interner, &ids, "clk");
        b.params.insert(ids.clkmux, Property::from_str_value("INV"));
        assert_ne!(
            FfControlSet::from_cell(&a, &ids),
            FfControlSet::from_cell(&b, &ids)
        );
    }

    #[test]
    fn srmode_is_part_of_the_set() {
        let (interner, ids) = ids();
        let a = ff_with_clk(&interner, &ids, "clk");
        let mut b = ff_with_clk(&interner, &ids, "clk");
        b.params.insert(ids.srmode, Property::from_str_value("ASYNC"));
        let sa = FfControlSet::from_cell(&a, &ids);
        let sb = FfControlSet::from_cell(&b, &ids);
        assert!(!sa.async_sr);
        assert!(sb.async_sr);
        assert_ne!(sa, sb);
    }
}
