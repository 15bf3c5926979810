//! The arc model: one routable driver→sink connection per net user.

use halcyon_common::{Ident, PnrError, PnrResult};
use halcyon_device::WireId;
use halcyon_netlist::{Context, PortRef};

/// One driver-pin to sink-pin connection of a net.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arc {
    /// The wire on the driver's bel pin.
    pub src_wire: WireId,
    /// The wire on the sink's bel pin.
    pub dst_wire: WireId,
    /// The sink endpoint, for reporting.
    pub sink: PortRef,
}

/// A net together with its arcs.
#[derive(Clone, Debug)]
pub struct NetArcs {
    /// The net's name.
    pub net: Ident,
    /// The wire its driver pin sits on.
    pub src_wire: WireId,
    /// One arc per routable sink.
    pub arcs: Vec<Arc>,
}

/// Resolves the physical wire under a cell port, if the cell is placed and
/// its bel has a pin of that name.
pub fn pin_wire(ctx: &Context, cell: Ident, port: Ident) -> Option<WireId> {
    let bel = ctx.cell(cell).ok()?.bel?;
    ctx.device.bel_pin_wire(bel, port)
}

/// Builds the arc lists for every driven net.
///
/// Nets whose driver has no placed bel pin (pad-side connections) produce
/// no arcs. A placed driver with unplaced sinks is a user error: routing
/// runs after placement, so every cell that matters must have a bel.
pub fn collect_arcs(ctx: &Context) -> PnrResult<Vec<NetArcs>> {
    let mut out = Vec::new();
    for (&name, net) in &ctx.netlist.nets {
        let Some(driver) = net.driver else {
            continue;
        };
        let Some(src_wire) = pin_wire(ctx, driver.cell, driver.port) else {
            continue;
        };
        let mut arcs = Vec::new();
        for user in net.users() {
            let Ok(cell) = ctx.cell(user.cell) else {
                continue;
            };
            if cell.bel.is_none() {
                return Err(PnrError::user(format!(
                    "cell '{}' is not placed but net '{}' needs routing to it",
                    ctx.name_of(user.cell),
                    ctx.name_of(name)
                )));
            }
            let Some(dst_wire) = pin_wire(ctx, user.cell, user.port) else {
                // No bel pin for this logical port (hard pin-mux inputs,
                // pad-side ports): nothing to route.
                continue;
            };
            arcs.push(Arc {
                src_wire,
                dst_wire,
                sink: user,
            });
        }
        out.push(NetArcs {
            net: name,
            src_wire,
            arcs,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;
    use halcyon_device::PortDir;
    use halcyon_netlist::PlaceStrength;

    #[test]
    fn arcs_follow_placed_pins() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let lut = ctx.id("l0");
        let ff = ctx.id("f0");
        let n = ctx.id("n");
        ctx.netlist.create_net(n).unwrap();
        ctx.netlist.create_cell(lut, ctx.ids.slice_comb).unwrap();
        ctx.netlist.create_cell(ff, ctx.ids.slice_ff).unwrap();
        ctx.netlist.add_port(lut, ctx.ids.f, PortDir::Output).unwrap();
        ctx.netlist.add_port(ff, ctx.ids.di, PortDir::Input).unwrap();
        ctx.netlist.connect_port(lut, ctx.ids.f, n).unwrap();
        ctx.netlist.connect_port(ff, ctx.ids.di, n).unwrap();

        let lut_bel = ctx.device.bel_by_name(ctx.id("R1C1_SLICE0_LUT0")).unwrap();
        let ff_bel = ctx.device.bel_by_name(ctx.id("R1C1_SLICE0_FF0")).unwrap();
        ctx.bind_bel(lut_bel, lut, PlaceStrength::Strong).unwrap();
        ctx.bind_bel(ff_bel, ff, PlaceStrength::Strong).unwrap();

        let nets = collect_arcs(&ctx).unwrap();
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].arcs.len(), 1);
        let f_wire = ctx.device.wire_by_name(ctx.id("R1C1_S00_F")).unwrap();
        let di_wire = ctx.device.wire_by_name(ctx.id("R1C1_S00_DI")).unwrap();
        assert_eq!(nets[0].src_wire, f_wire);
        assert_eq!(nets[0].arcs[0].dst_wire, di_wire);
    }

    #[test]
    fn unplaced_sink_is_a_user_error() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let lut = ctx.id("l0");
        let ff = ctx.id("f0");
        let n = ctx.id("n");
        ctx.netlist.create_net(n).unwrap();
        ctx.netlist.create_cell(lut, ctx.ids.slice_comb).unwrap();
        ctx.netlist.create_cell(ff, ctx.ids.slice_ff).unwrap();
        ctx.netlist.add_port(lut, ctx.ids.f, PortDir::Output).unwrap();
        ctx.netlist.add_port(ff, ctx.ids.di, PortDir::Input).unwrap();
        ctx.netlist.connect_port(lut, ctx.ids.f, n).unwrap();
        ctx.netlist.connect_port(ff, ctx.ids.di, n).unwrap();
        let lut_bel = ctx.device.bel_by_name(ctx.id("R1C1_SLICE0_LUT0")).unwrap();
        ctx.bind_bel(lut_bel, lut, PlaceStrength::Strong).unwrap();

        assert!(collect_arcs(&ctx).is_err());
    }

    #[test]
    fn undriven_nets_produce_no_arcs() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let n = ctx.id("floating");
        ctx.netlist.create_net(n).unwrap();
        let nets = collect_arcs(&ctx).unwrap();
        assert!(nets.is_empty());
    }
}
