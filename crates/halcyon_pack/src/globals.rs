//! Global buffer promotion and placement.
//!
//! Promotion counts, per net, the sinks whose pin style marks them as
//! clock inputs, then inserts a `DCC` buffer on the highest-fanout clock
//! nets, bounded by the device's global-buffer budget minus any buffers
//! the design already instantiates. Placement topologically sorts the
//! global-resource cells along their clock-path dependencies and
//! constrains each to a bel whose input is reachable from its driver over
//! dedicated routing, falling back to the Manhattan-nearest free bel.

use crate::helpers::{
    bel_attr, find_connected_bels, find_nearest_bel, insert_buffer, set_bel_attr,
};
use halcyon_arch::{Architecture, PinStyle};
use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::Context;
use std::collections::{BTreeMap, HashSet};

/// The wire-visit budget of the routeability search.
const PREPLACE_ITER_LIMIT: usize = 25_000;

/// Inserts `DCC` buffers on the highest-fanout clock nets.
pub fn promote_globals<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    sink: &DiagnosticSink,
) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let mut available = arch.global_buffer_count() as i64;

    let mut clk_fanout: Vec<(usize, Ident)> = Vec::new();
    for (&name, net) in &ctx.netlist.nets {
        let Some(driver) = net.driver else {
            continue;
        };
        let drv_type = match ctx.cell(driver.cell) {
            Ok(c) => c.cell_type,
            Err(_) => continue,
        };
        if drv_type == ids.dcs {
            continue;
        }
        if drv_type == ids.dcc {
            available -= 1;
            continue;
        }
        let clk_count = net
            .users()
            .filter(|u| {
                let ty = ctx.cell(u.cell).map(|c| c.cell_type).unwrap_or(Ident::EMPTY);
                arch.cell_pin_style(ty, u.port).has(PinStyle::GLB_CLK)
            })
            .count();
        if clk_count > 0 {
            clk_fanout.push((clk_count, name));
        }
    }
    if available <= 0 {
        return Ok(());
    }

    // Highest fanout first; net name breaks ties deterministically.
    clk_fanout.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    for &(fanout, net) in clk_fanout.iter().take(available as usize) {
        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 20),
            format!(
                "promoting clock net '{}' ({fanout} clock sinks)",
                ctx.name_of(net)
            ),
        ));
        let dcc = ids.dcc;
        insert_buffer(ctx, net, dcc, "glb_clk", ids.clki, ids.clko, |ctx, user| {
            ctx.cell(user.cell)
                .map(|c| c.cell_type != dcc)
                .unwrap_or(false)
        });
    }
    Ok(())
}

fn is_global_cell(ctx: &Context, cell: Ident) -> bool {
    let Ok(c) = ctx.cell(cell) else {
        return false;
    };
    let ids = &ctx.ids;
    c.cell_type == ids.osc_core
        || c.cell_type == ids.dcc
        || c.cell_type == ids.pll_core
        || c.cell_type == ids.dcs
}

/// Topologically sorts the global cells by clock-path dependency
/// (PLL feeds DCC feeds DCS and so on).
fn topo_sort_globals(ctx: &Context) -> Vec<Ident> {
    let ids = &ctx.ids;
    let nodes: Vec<Ident> = ctx
        .netlist
        .cells
        .keys()
        .copied()
        .filter(|&n| is_global_cell(ctx, n))
        .collect();

    let mut in_degree: BTreeMap<Ident, usize> = nodes.iter().map(|&n| (n, 0)).collect();
    let mut edges: BTreeMap<Ident, Vec<Ident>> = BTreeMap::new();
    for &node in &nodes {
        let c = ctx.cell(node).unwrap();
        let dep_pins: &[Ident] = if c.cell_type == ids.pll_core {
            &[ids.refck]
        } else if c.cell_type == ids.dcc {
            &[ids.clki]
        } else if c.cell_type == ids.dcs {
            &[ids.clk0, ids.clk1]
        } else {
            &[]
        };
        for &pin in dep_pins {
            let Some(net) = c.port_net(pin) else { continue };
            let Some(driver) = ctx.net(net).unwrap().driver else {
                continue;
            };
            if is_global_cell(ctx, driver.cell) {
                edges.entry(driver.cell).or_default().push(node);
                *in_degree.get_mut(&node).unwrap() += 1;
            }
        }
    }

    let mut ready: Vec<Ident> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&n, _)| n)
        .collect();
    let mut sorted = Vec::with_capacity(nodes.len());
    while let Some(node) = ready.pop() {
        sorted.push(node);
        for &next in edges.get(&node).map(|v| v.as_slice()).unwrap_or(&[]) {
            let d = in_degree.get_mut(&next).unwrap();
            *d -= 1;
            if *d == 0 {
                ready.push(next);
            }
        }
    }
    sorted
}

/// Constrains one global cell near its upstream driver, preferring bels
/// reachable over dedicated routing.
fn preplace_prim<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    sink: &DiagnosticSink,
    used_bels: &mut HashSet<halcyon_device::BelId>,
    cell: Ident,
    pin: Ident,
) -> bool {
    if bel_attr(ctx, cell).is_some() {
        return false;
    }
    let cell_type = ctx.cell(cell).unwrap().cell_type;
    let Some(pin_net) = ctx.cell(cell).unwrap().port_net(pin) else {
        return false;
    };
    let Some(driver) = ctx.net(pin_net).unwrap().driver else {
        return false;
    };

    let candidates = find_connected_bels(
        ctx,
        arch,
        driver.cell,
        driver.port,
        cell_type,
        Some(pin),
        PREPLACE_ITER_LIMIT,
    );
    for cand in candidates {
        if used_bels.contains(&cand) {
            continue;
        }
        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 21),
            format!(
                "constraining '{}' to bel '{}' based on dedicated routing",
                ctx.name_of(cell),
                ctx.name_of(ctx.device.bel(cand).name)
            ),
        ));
        set_bel_attr(ctx, cell, cand);
        used_bels.insert(cand);
        return true;
    }

    if let Some(nearest) = find_nearest_bel(ctx, driver.cell, cell_type, |b| !used_bels.contains(&b))
    {
        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 21),
            format!(
                "constraining '{}' to bel '{}'",
                ctx.name_of(cell),
                ctx.name_of(ctx.device.bel(nearest).name)
            ),
        ));
        set_bel_attr(ctx, cell, nearest);
        used_bels.insert(nearest);
        return true;
    }
    false
}

/// Constrains a singleton resource (an oscillator) to its unique bel.
fn preplace_singleton(
    ctx: &mut Context,
    sink: &DiagnosticSink,
    used_bels: &mut HashSet<halcyon_device::BelId>,
    cell: Ident,
) -> bool {
    if bel_attr(ctx, cell).is_some() {
        return false;
    }
    let cell_type = ctx.cell(cell).unwrap().cell_type;
    let Some(bel) = ctx
        .device
        .bels()
        .find(|&b| ctx.device.bel(b).bel_type == cell_type && !used_bels.contains(&b))
    else {
        return false;
    };
    sink.emit(Diagnostic::info(
        DiagnosticCode::new(Category::Pack, 21),
        format!(
            "constraining '{}' to bel '{}'",
            ctx.name_of(cell),
            ctx.name_of(ctx.device.bel(bel).name)
        ),
    ));
    set_bel_attr(ctx, cell, bel);
    used_bels.insert(bel);
    true
}

/// Places all global-resource cells along their dependency order.
pub fn place_globals<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    sink: &DiagnosticSink,
) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let mut used_bels: HashSet<halcyon_device::BelId> = ctx
        .netlist
        .cells
        .keys()
        .copied()
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|n| bel_attr(ctx, n))
        .collect();

    for cell in topo_sort_globals(ctx) {
        let ty = ctx.cell(cell).unwrap().cell_type;
        if ty == ids.osc_core {
            preplace_singleton(ctx, sink, &mut used_bels, cell);
        } else if ty == ids.dcc {
            preplace_prim(ctx, arch, sink, &mut used_bels, cell, ids.clki);
        } else if ty == ids.pll_core {
            preplace_prim(ctx, arch, sink, &mut used_bels, cell, ids.refck);
        } else if ty == ids.dcs {
            preplace_prim(ctx, arch, sink, &mut used_bels, cell, ids.clk0);
        }
    }
    Ok(())
}
