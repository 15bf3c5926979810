//! The negotiated-congestion iteration loop.
//!
//! Each iteration rips up every arc bound below `Locked`, re-routes all
//! arcs against the shared scoreboard, then counts congestion. Overused
//! wires gain history cost and the present-congestion pressure rises, so
//! contended wires become progressively less attractive until every wire
//! has a single owner. The finished, conflict-free trees are committed to
//! the context bindings in one pass at the end, which keeps the binding
//! invariants intact at every suspension point.

use crate::arcs::collect_arcs;
use crate::astar::route_arc;
use crate::scoreboard::Scoreboard;
use crate::RouterConfig;
use halcyon_arch::Architecture;
use halcyon_common::{PnrError, PnrResult};
use halcyon_device::{PipId, WireId};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, PlaceStrength};
use std::collections::{BTreeMap, BTreeSet};

/// Summary of a routing run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteStats {
    /// Iterations performed (at least one).
    pub iterations: usize,
    /// Arcs routed in the final iteration.
    pub routed_arcs: usize,
}

/// Routes every net with arcs; commits the trees on success.
pub fn route_nets<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &mut A,
    sink: &DiagnosticSink,
    config: &RouterConfig,
) -> PnrResult<RouteStats> {
    let net_arcs = collect_arcs(ctx)?;

    // Deterministic seed-dependent net order: sorted, then shuffled by the
    // context RNG.
    let mut order: Vec<usize> = (0..net_arcs.len()).collect();
    order.sort_by_key(|&i| net_arcs[i].net);
    ctx.rng.shuffle(&mut order);

    let mut scoreboard = Scoreboard::new(ctx.device.wire_count());
    // Router-local trees: wire → driving pip. Wires already bound in the
    // context (dedicated global routing) are locked against rip-up.
    let mut trees: Vec<BTreeMap<WireId, Option<PipId>>> = Vec::with_capacity(net_arcs.len());
    let mut locked: Vec<BTreeSet<WireId>> = Vec::with_capacity(net_arcs.len());
    for na in &net_arcs {
        let mut tree = BTreeMap::new();
        let mut lock = BTreeSet::new();
        for (&wire, binding) in &ctx.net(na.net).unwrap().wires {
            tree.insert(wire, binding.pip);
            if binding.strength >= PlaceStrength::Locked {
                lock.insert(wire);
            }
            scoreboard.acquire(wire);
        }
        trees.push(tree);
        locked.push(lock);
    }

    let mut pressure = config.initial_pressure;
    let mut iterations = 0;
    loop {
        iterations += 1;
        let mut failed_arcs = 0usize;
        let mut routed_arcs = 0usize;

        for &i in &order {
            let na = &net_arcs[i];
            if na.arcs.is_empty() {
                continue;
            }

            // Rip up everything below locked strength.
            let loose: Vec<WireId> = trees[i]
                .keys()
                .copied()
                .filter(|w| !locked[i].contains(w))
                .collect();
            for wire in loose {
                trees[i].remove(&wire);
                scoreboard.release(wire);
            }

            // The source wire roots the tree.
            if !trees[i].contains_key(&na.src_wire) {
                trees[i].insert(na.src_wire, None);
                scoreboard.acquire(na.src_wire);
            }

            for arc in &na.arcs {
                let tree = &trees[i];
                let segment = route_arc(
                    ctx,
                    arch,
                    &scoreboard,
                    na.net,
                    &|w| tree.contains_key(&w),
                    na.src_wire,
                    arc.dst_wire,
                    pressure,
                    &arch.route_bounding_box(na.src_wire, arc.dst_wire),
                );
                match segment {
                    Some(segment) => {
                        routed_arcs += 1;
                        for (wire, pip) in segment {
                            if trees[i].insert(wire, Some(pip)).is_none() {
                                scoreboard.acquire(wire);
                            }
                        }
                    }
                    None => failed_arcs += 1,
                }
            }
        }

        let congested = scoreboard.congested_count();
        if failed_arcs == 0 && congested == 0 {
            commit(ctx, arch, &net_arcs, &trees)?;
            sink.emit(Diagnostic::info(
                DiagnosticCode::new(Category::Route, 1),
                format!("routing converged after {iterations} iteration(s)"),
            ));
            return Ok(RouteStats {
                iterations,
                routed_arcs,
            });
        }
        if iterations >= config.max_iterations {
            return Err(PnrError::RoutingFailed {
                congested_wires: congested + failed_arcs,
                iterations,
            });
        }

        scoreboard.bump_history(config.history_step);
        pressure += config.pressure_step;
    }
}

fn commit<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &mut A,
    net_arcs: &[crate::arcs::NetArcs],
    trees: &[BTreeMap<WireId, Option<PipId>>],
) -> PnrResult<()> {
    for (na, tree) in net_arcs.iter().zip(trees) {
        for (&wire, &pip) in tree {
            if ctx.bindings.net_on_wire(wire) == Some(na.net) {
                continue; // locked dedicated routing, already bound
            }
            match pip {
                None => ctx
                    .bind_wire(wire, na.net, PlaceStrength::Strong)
                    .map_err(|e| PnrError::user(e.to_string()))?,
                Some(pip) => ctx
                    .bind_pip(pip, na.net, PlaceStrength::Strong)
                    .map_err(|e| PnrError::user(e.to_string()))?,
            }
            arch.on_wire_change(ctx, wire);
            if let Some(pip) = pip {
                arch.on_pip_change(ctx, pip);
            }
        }
    }
    Ok(())
}
