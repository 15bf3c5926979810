//! A* search for one arc.
//!
//! The search runs backwards from the sink over uphill pips: the goal is
//! either the arc's source wire or any wire the net already owns, which
//! is what lets later arcs of a net reuse its earlier routing at no cost.
//! Edge costs combine the pip's base delay with the destination wire's
//! present congestion and history; the heuristic is the architecture's
//! monotone `estimate_delay` lower bound; a per-net bounding box prunes
//! the exploration.

use crate::scoreboard::Scoreboard;
use halcyon_arch::{Architecture, BoundingBox};
use halcyon_common::Ident;
use halcyon_device::{PipId, WireId};
use halcyon_netlist::Context;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A search state in the priority queue.
#[derive(Debug, Clone, Copy)]
struct SearchState {
    wire: WireId,
    cost: f64,
    estimated_total: f64,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.estimated_total == other.estimated_total
    }
}

impl Eq for SearchState {}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order turns the max-heap into a min-heap; wire index
        // breaks ties deterministically.
        other
            .estimated_total
            .partial_cmp(&self.estimated_total)
            .unwrap_or(Ordering::Equal)
            .then(other.wire.cmp(&self.wire))
    }
}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Routes one arc against the current congestion state.
///
/// Returns the new tree segment as `(wire, driving pip)` pairs ordered
/// from the join point toward the sink, or `None` when the queue runs dry.
/// The segment stops at the first wire that is already in `tree`.
#[allow(clippy::too_many_arguments)]
pub fn route_arc<A: Architecture + ?Sized>(
    ctx: &Context,
    arch: &A,
    scoreboard: &Scoreboard,
    net: Ident,
    tree: &impl Fn(WireId) -> bool,
    src_wire: WireId,
    dst_wire: WireId,
    pressure: f64,
    bbox: &BoundingBox,
) -> Option<Vec<(WireId, PipId)>> {
    if tree(dst_wire) || dst_wire == src_wire {
        return Some(Vec::new());
    }

    let mut open = BinaryHeap::new();
    let mut best: HashMap<WireId, f64> = HashMap::new();
    let mut came_by: HashMap<WireId, PipId> = HashMap::new();
    let mut closed: HashSet<WireId> = HashSet::new();

    best.insert(dst_wire, 0.0);
    open.push(SearchState {
        wire: dst_wire,
        cost: 0.0,
        estimated_total: arch.estimate_delay(src_wire, dst_wire),
    });

    let mut join: Option<WireId> = None;
    while let Some(current) = open.pop() {
        if current.cost > *best.get(&current.wire).unwrap_or(&f64::INFINITY) {
            continue; // stale entry
        }
        if current.wire == src_wire || tree(current.wire) {
            join = Some(current.wire);
            break;
        }
        if !closed.insert(current.wire) {
            continue;
        }

        for &pip in &ctx.device.wire(current.wire).uphill {
            if !arch.pip_available_for_net(ctx, pip, net) {
                continue;
            }
            let prev = ctx.device.pip(pip).src;
            let pw = ctx.device.wire(prev);
            if !bbox.contains(pw.x, pw.y) {
                continue;
            }
            let edge = arch.pip_delay(pip).max_ns
                + arch.wire_delay(prev).max_ns
                + scoreboard.congestion_cost(prev, pressure);
            let tentative = current.cost + edge;
            if tentative < *best.get(&prev).unwrap_or(&f64::INFINITY) {
                best.insert(prev, tentative);
                came_by.insert(prev, pip);
                open.push(SearchState {
                    wire: prev,
                    cost: tentative,
                    estimated_total: tentative + arch.estimate_delay(src_wire, prev),
                });
            }
        }
    }

    let join = join?;
    // Walk forward from the join point to the sink, collecting the pips
    // that drive each newly claimed wire.
    let mut segment = Vec::new();
    let mut cursor = join;
    while cursor != dst_wire {
        let pip = came_by[&cursor];
        let next = ctx.device.pip(pip).dst;
        segment.push((next, pip));
        cursor = next;
    }
    Some(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;

    #[test]
    fn direct_pip_path_is_found() {
        let (ctx, arch) = fabric::create("fab-4x4").unwrap();
        let net = ctx.id("n");
        let f = ctx.device.wire_by_name(ctx.id("R1C1_S00_F")).unwrap();
        let di = ctx.device.wire_by_name(ctx.id("R1C1_S00_DI")).unwrap();
        let sb = Scoreboard::new(ctx.device.wire_count());
        let bbox = arch.route_bounding_box(f, di);

        let path = route_arc(&ctx, &arch, &sb, net, &|_| false, f, di, 0.5, &bbox).unwrap();
        assert_eq!(path.len(), 1, "one dedicated pip");
        assert_eq!(path[0].0, di);
        assert_eq!(ctx.device.pip(path[0].1).src, f);
    }

    #[test]
    fn sink_already_in_tree_is_free() {
        let (ctx, arch) = fabric::create("fab-4x4").unwrap();
        let net = ctx.id("n");
        let f = ctx.device.wire_by_name(ctx.id("R1C1_S00_F")).unwrap();
        let di = ctx.device.wire_by_name(ctx.id("R1C1_S00_DI")).unwrap();
        let sb = Scoreboard::new(ctx.device.wire_count());
        let bbox = arch.route_bounding_box(f, di);

        let path = route_arc(&ctx, &arch, &sb, net, &|w| w == di, f, di, 0.5, &bbox).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn cross_tile_route_exists() {
        let (ctx, arch) = fabric::create("fab-5x5").unwrap();
        let net = ctx.id("n");
        let f = ctx.device.wire_by_name(ctx.id("R1C1_S00_F")).unwrap();
        let a = ctx.device.wire_by_name(ctx.id("R2C2_S00_A")).unwrap();
        let sb = Scoreboard::new(ctx.device.wire_count());
        let bbox = arch.route_bounding_box(f, a);

        let path = route_arc(&ctx, &arch, &sb, net, &|_| false, f, a, 0.5, &bbox).unwrap();
        assert!(path.len() >= 3, "several hops across tiles");
        // The segment ends at the sink and chains pip-to-pip.
        assert_eq!(path.last().unwrap().0, a);
        for pair in path.windows(2) {
            assert_eq!(ctx.device.pip(pair[1].1).src, pair[0].0);
        }
        assert_eq!(ctx.device.pip(path[0].1).src, f);
    }

    #[test]
    fn unreachable_target_returns_none() {
        let (ctx, arch) = fabric::create("fab-4x4").unwrap();
        let net = ctx.id("n");
        // A carry FCI wire cannot be reached from an FF Q output.
        let q = ctx.device.wire_by_name(ctx.id("R1C1_S00_Q")).unwrap();
        let fci = ctx.device.wire_by_name(ctx.id("R1C1_S00_FCI")).unwrap();
        let sb = Scoreboard::new(ctx.device.wire_count());
        let bbox = arch.route_bounding_box(q, fci);
        assert!(route_arc(&ctx, &arch, &sb, net, &|_| false, q, fci, 0.5, &bbox).is_none());
    }
}
