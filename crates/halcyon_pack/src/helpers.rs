//! Shared packer utilities: BEL attributes, constant nets, reference-bel
//! port creation, routeability searches, and buffer insertion.

use halcyon_arch::Architecture;
use halcyon_common::{Ident, PnrError, PnrResult};
use halcyon_device::{BelId, PortDir, WireId};
use halcyon_netlist::{Context, PortRef, Property};
use std::collections::{HashMap, HashSet, VecDeque};

/// Returns the names of all cells of the given type.
pub fn cells_of_type(ctx: &Context, ty: Ident) -> Vec<Ident> {
    ctx.netlist
        .cells
        .iter()
        .filter(|(_, c)| c.cell_type == ty)
        .map(|(&n, _)| n)
        .collect()
}

/// Resolves a cell's `BEL` attribute to a bel, if set and valid.
pub fn bel_attr(ctx: &Context, cell: Ident) -> Option<BelId> {
    let c = ctx.cell(cell).ok()?;
    let name = c.attrs.get(&ctx.ids.bel)?.as_string();
    ctx.device.bel_by_name(ctx.interner.get(&name)?)
}

/// Records a bel constraint on a cell via its `BEL` attribute.
pub fn set_bel_attr(ctx: &mut Context, cell: Ident, bel: BelId) {
    let name = ctx.name_of(ctx.device.bel(bel).name).to_string();
    let key = ctx.ids.bel;
    ctx.netlist
        .cell_mut(cell)
        .expect("cell exists")
        .attrs
        .insert(key, Property::from_str_value(name));
}

/// Returns the constant net driven by a `VHI` or `VLO` cell, creating the
/// driver and net on first use.
pub fn get_const_net(ctx: &mut Context, ty: Ident) -> Ident {
    for (name, cell) in &ctx.netlist.cells {
        if cell.cell_type != ty {
            continue;
        }
        if let Some(z) = cell.port_net(ctx.ids.z) {
            let _ = name;
            return z;
        }
    }
    let net = ctx.id(&format!("$CONST_{}_NET_", ctx.name_of(ty)));
    let drv = ctx.id(&format!("$CONST_{}_DRV_", ctx.name_of(ty)));
    ctx.netlist.create_net(net).expect("fresh const net");
    ctx.netlist.create_cell(drv, ty).expect("fresh const driver");
    ctx.netlist.add_port(drv, ctx.ids.z, PortDir::Output).unwrap();
    ctx.netlist.connect_port(drv, ctx.ids.z, net).unwrap();
    net
}

/// Creates any missing input ports of `cell` from a reference bel of its
/// type, so constant legalization can tie them.
///
/// Cell types with no bel anywhere on the device are a fatal user error.
/// `SEL` on combinational slices is skipped; it does not always exist.
pub fn autocreate_ports(
    ctx: &mut Context,
    reference_bels: &mut HashMap<Ident, BelId>,
    cell: Ident,
) -> PnrResult<()> {
    let cell_type = ctx.cell(cell).map_err(|_| PnrError::user("missing cell"))?.cell_type;
    let ref_bel = match reference_bels.get(&cell_type) {
        Some(&b) => b,
        None => {
            let found = ctx
                .device
                .bels()
                .find(|&b| ctx.device.bel(b).bel_type == cell_type)
                .ok_or_else(|| {
                    PnrError::user(format!(
                        "cell type '{}' instantiated as '{}' is not supported by this device",
                        ctx.name_of(cell_type),
                        ctx.name_of(cell)
                    ))
                })?;
            reference_bels.insert(cell_type, found);
            found
        }
    };

    let pins: Vec<Ident> = ctx
        .device
        .bel(ref_bel)
        .pins
        .iter()
        .filter(|p| p.dir == PortDir::Input)
        .map(|p| p.name)
        .collect();
    for pin in pins {
        if cell_type == ctx.ids.slice_comb && pin == ctx.ids.sel {
            continue;
        }
        if ctx.cell(cell).unwrap().ports.contains_key(&pin) {
            continue;
        }
        ctx.netlist.add_port(cell, pin, PortDir::Input).unwrap();
    }
    Ok(())
}

/// Breadth-first search for bels of `dest_type` connected to a cell pin
/// through available routing, up to `iter_limit` wire visits.
///
/// The direction follows the pin: downstream of outputs, upstream of
/// inputs. Pass `dest_pin` to require arrival on a specific pin.
pub fn find_connected_bels<A: Architecture + ?Sized>(
    ctx: &Context,
    arch: &A,
    cell: Ident,
    port: Ident,
    dest_type: Ident,
    dest_pin: Option<Ident>,
    iter_limit: usize,
) -> Vec<BelId> {
    let mut candidates = Vec::new();
    let Some(bel) = bel_attr(ctx, cell) else {
        return candidates;
    };
    let Some(pin) = ctx.device.bel(bel).pin(port) else {
        return candidates;
    };
    let dir = pin.dir;
    let start = pin.wire;

    let mut seen_wires: HashSet<WireId> = HashSet::from([start]);
    let mut seen_bels: HashSet<BelId> = HashSet::new();
    let mut queue = VecDeque::from([start]);
    let mut iters = 0;

    while let Some(cursor) = queue.pop_front() {
        iters += 1;
        if iters > iter_limit {
            break;
        }
        for &(bp_bel, bp_pin) in &ctx.device.wire(cursor).bel_pins {
            if ctx.device.bel(bp_bel).bel_type != dest_type {
                continue;
            }
            if let Some(want) = dest_pin {
                if bp_pin != want {
                    continue;
                }
            }
            if seen_bels.insert(bp_bel) {
                candidates.push(bp_bel);
            }
        }
        let next: Vec<WireId> = match dir {
            PortDir::Output => ctx
                .device
                .wire(cursor)
                .downhill
                .iter()
                .filter(|&&p| arch.pip_available(ctx, p))
                .map(|&p| ctx.device.pip(p).dst)
                .collect(),
            _ => ctx
                .device
                .wire(cursor)
                .uphill
                .iter()
                .filter(|&&p| arch.pip_available(ctx, p))
                .map(|&p| ctx.device.pip(p).src)
                .collect(),
        };
        for w in next {
            if seen_wires.insert(w) {
                queue.push_back(w);
            }
        }
    }
    candidates
}

/// Returns the nearest bel of `dest_type` accepted by `pred`, by Manhattan
/// distance from `cell`'s constrained bel.
pub fn find_nearest_bel(
    ctx: &Context,
    cell: Ident,
    dest_type: Ident,
    mut pred: impl FnMut(BelId) -> bool,
) -> Option<BelId> {
    let origin = bel_attr(ctx, cell)?;
    let origin_loc = ctx.device.bel(origin).loc;
    let mut best: Option<(i32, BelId)> = None;
    for bel in ctx.device.bels() {
        if ctx.device.bel(bel).bel_type != dest_type || !pred(bel) {
            continue;
        }
        let dist = origin_loc.manhattan(&ctx.device.bel(bel).loc);
        if best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, bel));
        }
    }
    best.map(|(_, b)| b)
}

/// Inserts a buffer cell into `net`, moving every user accepted by `pred`
/// behind it. Returns the buffer cell's name.
pub fn insert_buffer(
    ctx: &mut Context,
    net: Ident,
    buffer_type: Ident,
    name_postfix: &str,
    input: Ident,
    output: Ident,
    mut pred: impl FnMut(&Context, PortRef) -> bool,
) -> Ident {
    let buffered_net = ctx.id(&format!("{}${}", ctx.name_of(net), name_postfix));
    let buffer = ctx.id(&format!(
        "{}$drv_{}",
        ctx.name_of(buffered_net),
        ctx.name_of(buffer_type)
    ));
    ctx.netlist.create_net(buffered_net).expect("fresh buffer net");
    ctx.netlist.create_cell(buffer, buffer_type).expect("fresh buffer cell");
    ctx.netlist.add_port(buffer, input, PortDir::Input).unwrap();
    ctx.netlist.add_port(buffer, output, PortDir::Output).unwrap();
    ctx.netlist.connect_port(buffer, output, buffered_net).unwrap();

    let movers: Vec<PortRef> = {
        let users: Vec<PortRef> = ctx.net(net).unwrap().users().collect();
        users.into_iter().filter(|&u| pred(ctx, u)).collect()
    };
    for user in movers {
        ctx.netlist.disconnect_port(user.cell, user.port).unwrap();
        ctx.netlist
            .connect_port(user.cell, user.port, buffered_net)
            .unwrap();
    }

    ctx.netlist.connect_port(buffer, input, net).unwrap();
    buffer
}

/// Formats a bracketed bus pin name, `base[i]`.
pub fn bus(ctx: &Context, base: &str, index: usize) -> Ident {
    ctx.id(&format!("{base}[{index}]"))
}

/// Formats a flat bus pin name, `base<i>` without brackets.
pub fn bus_flat(ctx: &Context, base: &str, index: usize) -> Ident {
    ctx.id(&format!("{base}{index}"))
}

/// Copies a slice of a source bus onto a destination bus, port by port.
///
/// Missing source pins are skipped. `src_bracketed`/`dst_bracketed` choose
/// between `X[i]` and `Xi` pin naming.
#[allow(clippy::too_many_arguments)]
pub fn copy_port_bus(
    ctx: &mut Context,
    cell: Ident,
    src_base: &str,
    src_offset: usize,
    src_bracketed: bool,
    dst_cell: Ident,
    dst_base: &str,
    dst_offset: usize,
    dst_bracketed: bool,
    width: usize,
) -> PnrResult<()> {
    for i in 0..width {
        let src = if src_bracketed {
            bus(ctx, src_base, src_offset + i)
        } else {
            bus_flat(ctx, src_base, src_offset + i)
        };
        let dst = if dst_bracketed {
            bus(ctx, dst_base, dst_offset + i)
        } else {
            bus_flat(ctx, dst_base, dst_offset + i)
        };
        if matches!(ctx.cell(cell).map(|c| c.ports.contains_key(&src)), Ok(true)) {
            ctx.netlist
                .copy_port_to(cell, src, dst_cell, dst)
                .map_err(|e| PnrError::user(format!("bus copy failed: {e}")))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;

    #[test]
    fn const_net_is_created_once() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let vhi_id = ctx.ids.vhi;
        let a = get_const_net(&mut ctx, vhi_id);
        let b = get_const_net(&mut ctx, vhi_id);
        assert_eq!(a, b);
        let vlo_id = ctx.ids.vlo;
        let gnd = get_const_net(&mut ctx, vlo_id);
        assert_ne!(a, gnd);
        assert!(ctx.net(a).unwrap().driver.is_some());
    }

    #[test]
    fn bel_attr_roundtrip() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let cell = ctx.id("c0");
        ctx.netlist.create_cell(cell, ctx.ids.slice_comb).unwrap();
        assert!(bel_attr(&ctx, cell).is_none());
        let bel = ctx.device.bel_by_name(ctx.id("R1C1_SLICE0_LUT0")).unwrap();
        set_bel_attr(&mut ctx, cell, bel);
        assert_eq!(bel_attr(&ctx, cell), Some(bel));
    }

    #[test]
    fn autocreate_adds_missing_inputs() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let cell = ctx.id("ff0");
        ctx.netlist.create_cell(cell, ctx.ids.slice_ff).unwrap();
        let mut refs = HashMap::new();
        autocreate_ports(&mut ctx, &mut refs, cell).unwrap();
        let c = ctx.cell(cell).unwrap();
        for pin in [ctx.ids.clk, ctx.ids.ce, ctx.ids.lsr, ctx.ids.m, ctx.ids.di] {
            assert!(c.ports.contains_key(&pin), "missing autocreated pin");
        }
        // Outputs are not created.
        assert!(!c.ports.contains_key(&ctx.ids.q));
    }

    #[test]
    fn autocreate_rejects_unknown_type() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let cell = ctx.id("weird");
        let ty = ctx.id("NOT_A_PRIMITIVE");
        ctx.netlist.create_cell(cell, ty).unwrap();
        let mut refs = HashMap::new();
        assert!(autocreate_ports(&mut ctx, &mut refs, cell).is_err());
    }

    #[test]
    fn insert_buffer_moves_selected_users() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let net = ctx.id("clk");
        ctx.netlist.create_net(net).unwrap();
        let ff_a = ctx.id("ff_a");
        let ff_b = ctx.id("ff_b");
        for ff in [ff_a, ff_b] {
            ctx.netlist.create_cell(ff, ctx.ids.slice_ff).unwrap();
            ctx.netlist.add_port(ff, ctx.ids.clk, PortDir::Input).unwrap();
            ctx.netlist.connect_port(ff, ctx.ids.clk, net).unwrap();
        }

        let only_a = ff_a;
        let dcc_id = ctx.ids.dcc;
        let clki_id = ctx.ids.clki;
        let clko_id = ctx.ids.clko;
        let buffer = insert_buffer(
            &mut ctx,
            net,
            dcc_id,
            "glb_clk",
            clki_id,
            clko_id,
            |_, u| u.cell == only_a,
        );

        let buffered = ctx.cell(buffer).unwrap().port_net(ctx.ids.clko).unwrap();
        assert_eq!(ctx.cell(ff_a).unwrap().port_net(ctx.ids.clk), Some(buffered));
        assert_eq!(ctx.cell(ff_b).unwrap().port_net(ctx.ids.clk), Some(net));
        // The buffer input joins the original net's users.
        assert!(ctx.net(net).unwrap().users().any(|u| u.cell == buffer));
    }

    #[test]
    fn find_nearest_prefers_close_bels() {
        let (mut ctx, _) = fabric::create("fab-5x5").unwrap();
        let cell = ctx.id("c0");
        ctx.netlist.create_cell(cell, ctx.ids.slice_comb).unwrap();
        let origin = ctx.device.bel_by_name(ctx.id("R1C1_SLICE0_LUT0")).unwrap();
        set_bel_attr(&mut ctx, cell, origin);

        let nearest = find_nearest_bel(&ctx, cell, ctx.ids.slice_ff, |_| true).unwrap();
        assert_eq!(ctx.device.bel(nearest).loc.x, 1);
        assert_eq!(ctx.device.bel(nearest).loc.y, 1);
    }

    #[test]
    fn find_connected_follows_dedicated_fanout() {
        let (mut ctx, arch) = fabric::create("fab-5x5").unwrap();
        // An IOB output pin reaches the global buffers over the pad clock
        // tap, which is exactly what global placement relies on.
        let pad = arch.package_pin_bel("A1").unwrap();
        let cell = ctx.id("clk_pad");
        ctx.netlist.create_cell(cell, ctx.ids.iob_core).unwrap();
        set_bel_attr(&mut ctx, cell, pad);

        let found = find_connected_bels(
            &ctx,
            &arch,
            cell,
            ctx.ids.o,
            ctx.ids.dcc,
            Some(ctx.ids.clki),
            25_000,
        );
        // Pad A1 is IOB z=0 of its tile, which carries the clock tap.
        assert!(!found.is_empty(), "pad clock should reach global buffers");
    }
}
