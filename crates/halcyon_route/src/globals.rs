//! Dedicated routing for global clock nets.
//!
//! Nets driven by a global buffer or clock select run before the main
//! router, over a backwards breadth-first search restricted to wires whose
//! category is not general routing. The search minimizes hop count first
//! and prefers more global-resource hops second, within a hop budget.
//! Successful routes bind with `Locked` strength so the negotiation loop
//! never rips them up; failures fall back to the main router with a
//! warning.

use crate::arcs::pin_wire;
use halcyon_arch::Architecture;
use halcyon_common::{Ident, PnrResult};
use halcyon_device::{PipId, WireCategory, WireId};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, PlaceStrength};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Visit {
    total_hops: usize,
    /// Count of hops over non-global wires; fewer is better, which makes
    /// the search prefer the dedicated clock trees.
    general_deficit: usize,
}

/// Routes one sink of a global net backwards from `dst` to `src` or to
/// the net's existing routing; binds the result with `Locked` strength.
fn route_global_arc<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    net: Ident,
    src: WireId,
    dst: WireId,
    max_hops: usize,
) -> bool {
    if ctx.bindings.net_on_wire(dst) == Some(net) {
        return true;
    }

    let mut queue: BinaryHeap<(Reverse<Visit>, WireId)> = BinaryHeap::new();
    let mut visits: HashMap<WireId, (Visit, Option<PipId>)> = HashMap::new();
    let start = Visit {
        total_hops: 0,
        general_deficit: 0,
    };
    visits.insert(dst, (start, None));
    queue.push((Reverse(start), dst));

    let mut endpoint: Option<WireId> = None;
    while let Some((Reverse(visit), cursor)) = queue.pop() {
        if visits[&cursor].0 < visit {
            continue;
        }
        if cursor == src || ctx.bindings.net_on_wire(cursor) == Some(net) {
            endpoint = Some(cursor);
            break;
        }
        if visit.total_hops >= max_hops {
            continue;
        }
        for &pip in &ctx.device.wire(cursor).uphill {
            if !arch.pip_available_for_net(ctx, pip, net) {
                continue;
            }
            let prev = ctx.device.pip(pip).src;
            // Intermediate wires must stay off general routing; the
            // endpoints themselves may be ordinary bel-pin wires.
            if prev != src && ctx.device.wire(prev).category == WireCategory::General {
                continue;
            }
            let next = Visit {
                total_hops: visit.total_hops + 1,
                general_deficit: visit.general_deficit
                    + usize::from(ctx.device.wire(prev).category != WireCategory::Global),
            };
            let better = match visits.get(&prev) {
                None => true,
                Some((existing, _)) => next < *existing,
            };
            if better {
                visits.insert(prev, (next, Some(pip)));
                queue.push((Reverse(next), prev));
            }
        }
    }

    let Some(endpoint) = endpoint else {
        return false;
    };
    // Bind the path from the endpoint down to the sink. Each visited wire
    // recorded the pip that leads from it toward the sink.
    if endpoint == src && ctx.bindings.net_on_wire(src).is_none() {
        ctx.bind_wire(src, net, PlaceStrength::Locked)
            .expect("source wire free");
    }
    let mut cursor = endpoint;
    while cursor != dst {
        let pip = visits[&cursor].1.expect("interior wires carry their pip");
        let next = ctx.device.pip(pip).dst;
        if ctx.bindings.net_on_wire(next) != Some(net) {
            ctx.bind_pip(pip, net, PlaceStrength::Locked)
                .expect("dedicated wire free");
        }
        cursor = next;
    }
    true
}

/// Pre-routes every net driven by a global clock cell output.
pub fn route_globals<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &mut A,
    sink: &DiagnosticSink,
    max_hops: usize,
) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let global_nets: Vec<Ident> = ctx
        .netlist
        .nets
        .iter()
        .filter(|(_, n)| {
            n.driver.map_or(false, |d| {
                let ty = ctx
                    .cell(d.cell)
                    .map(|c| c.cell_type)
                    .unwrap_or(Ident::EMPTY);
                (ty == ids.dcc && d.port == ids.clko)
                    || (ty == ids.dcs && d.port == ids.dcsout)
            })
        })
        .map(|(&n, _)| n)
        .collect();

    for net in global_nets {
        let driver = ctx.net(net).unwrap().driver.unwrap();
        let Some(src) = pin_wire(ctx, driver.cell, driver.port) else {
            continue;
        };
        let users: Vec<_> = ctx.net(net).unwrap().users().collect();
        for user in users {
            let Some(dst) = pin_wire(ctx, user.cell, user.port) else {
                continue;
            };
            if route_global_arc(ctx, arch, net, src, dst, max_hops) {
                arch.on_wire_change(ctx, dst);
            } else {
                sink.emit(Diagnostic::warning(
                    DiagnosticCode::new(Category::Route, 10),
                    format!(
                        "no dedicated clock path for net '{}' to '{}.{}'; leaving it to general routing",
                        ctx.name_of(net),
                        ctx.name_of(user.cell),
                        ctx.name_of(user.port)
                    ),
                ));
            }
        }
    }
    Ok(())
}
