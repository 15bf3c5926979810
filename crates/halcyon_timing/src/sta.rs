//! Longest-path propagation and critical path extraction.
//!
//! For every launch domain (each clock, plus the async sources) arrival
//! times propagate forward through the edge list by iterative relaxation;
//! at every capture endpoint the data delay plus setup closes a path. The
//! worst in-domain path fixes the domain's achievable period; the worst
//! pair-wise path between different domains becomes a cross-domain
//! report.

use crate::graph::{build_timing_graph, EdgeKind, NodeRole, TimingGraph};
use crate::result::{
    ClockEvent, CriticalPath, DomainTiming, NetTiming, PathSegment, SegmentKind, TimingResult,
};
use halcyon_arch::Architecture;
use halcyon_common::Ident;
use halcyon_netlist::{Context, PortRef};
use std::collections::BTreeSet;

/// Smallest representable period, keeping f_max finite in reports.
const MIN_PERIOD_NS: f64 = 1e-3;

struct Propagation {
    arrival: Vec<f64>,
    prev_edge: Vec<Option<usize>>,
}

fn propagate(graph: &TimingGraph, launch: &[Option<f64>]) -> Propagation {
    let n = graph.node_count();
    let mut arrival: Vec<f64> = launch
        .iter()
        .map(|l| l.unwrap_or(f64::NEG_INFINITY))
        .collect();
    let mut prev_edge: Vec<Option<usize>> = vec![None; n];

    // Iterative relaxation; the graph is a DAG so this settles in at most
    // `n` rounds, usually far fewer.
    for _ in 0..n {
        let mut changed = false;
        for (idx, edge) in graph.edges.iter().enumerate() {
            let from = edge.from.index();
            let to = edge.to.index();
            if arrival[from] == f64::NEG_INFINITY {
                continue;
            }
            // Capture pins terminate paths; nothing propagates through.
            if matches!(graph.nodes[from].role, NodeRole::Capture { .. }) {
                continue;
            }
            let candidate = arrival[from] + edge.delay_ns;
            if candidate > arrival[to] {
                arrival[to] = candidate;
                prev_edge[to] = Some(idx);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    Propagation {
        arrival,
        prev_edge,
    }
}

fn launch_event(graph: &TimingGraph, node: usize) -> ClockEvent {
    match graph.nodes[node].role {
        NodeRole::Launch { clock, falling, .. } => {
            if falling {
                ClockEvent::Negedge(clock)
            } else {
                ClockEvent::Posedge(clock)
            }
        }
        _ => ClockEvent::Async,
    }
}

fn build_path(
    ctx: &Context,
    graph: &TimingGraph,
    prop: &Propagation,
    capture: usize,
    setup: f64,
    from_event: ClockEvent,
    to_event: ClockEvent,
) -> CriticalPath {
    // Walk back to the launch point.
    let mut rev_edges = Vec::new();
    let mut cursor = capture;
    while let Some(edge_idx) = prop.prev_edge[cursor] {
        rev_edges.push(edge_idx);
        cursor = graph.edges[edge_idx].from.index();
    }
    let launch = cursor;

    let mut segments = Vec::new();
    let launch_pin = graph.nodes[launch].pin;
    match graph.nodes[launch].role {
        NodeRole::Launch { clk_to_q, .. } => segments.push(PathSegment {
            delay_ns: clk_to_q,
            from: PortRef::new(launch_pin.cell, ctx.ids.clk),
            to: launch_pin,
            kind: SegmentKind::ClkToQ,
        }),
        _ => segments.push(PathSegment {
            delay_ns: 0.0,
            from: launch_pin,
            to: launch_pin,
            kind: SegmentKind::Source,
        }),
    }
    for &edge_idx in rev_edges.iter().rev() {
        let edge = &graph.edges[edge_idx];
        segments.push(PathSegment {
            delay_ns: edge.delay_ns,
            from: graph.nodes[edge.from.index()].pin,
            to: graph.nodes[edge.to.index()].pin,
            kind: match edge.kind {
                EdgeKind::Routing(net) => SegmentKind::Routing(net),
                EdgeKind::Logic => SegmentKind::Logic,
            },
        });
    }
    let capture_pin = graph.nodes[capture].pin;
    segments.push(PathSegment {
        delay_ns: setup,
        from: capture_pin,
        to: PortRef::new(capture_pin.cell, ctx.ids.clk),
        kind: SegmentKind::Setup,
    });

    CriticalPath {
        from_event,
        to_event,
        delay_ns: prop.arrival[capture] + setup,
        segments,
    }
}

/// Analyzes the design's timing against the current bindings.
///
/// With `detailed`, per-net interconnect records are included.
pub fn analyze_timing<A: Architecture + ?Sized>(
    ctx: &Context,
    arch: &A,
    detailed: bool,
) -> TimingResult {
    let graph = build_timing_graph(ctx, arch);
    let mut result = TimingResult::default();
    if graph.node_count() == 0 {
        return result;
    }

    // Launch domains: every clock seen on a launch node, plus async.
    let mut domains: BTreeSet<Ident> = BTreeSet::new();
    for node in &graph.nodes {
        match node.role {
            NodeRole::Launch { clock, .. } | NodeRole::Capture { clock, .. } => {
                domains.insert(clock);
            }
            NodeRole::Combinational => {}
        }
    }

    // Async sources: drivers with no incoming edges and no launch role.
    let mut has_incoming = vec![false; graph.node_count()];
    for edge in &graph.edges {
        has_incoming[edge.to.index()] = true;
    }

    let mut launch_sets: Vec<(Option<Ident>, Vec<Option<f64>>)> = Vec::new();
    {
        let async_launch: Vec<Option<f64>> = (0..graph.node_count())
            .map(|i| {
                let is_source = !has_incoming[i]
                    && matches!(graph.nodes[i].role, NodeRole::Combinational);
                is_source.then_some(0.0)
            })
            .collect();
        launch_sets.push((None, async_launch));
    }
    for &domain in &domains {
        let launch: Vec<Option<f64>> = (0..graph.node_count())
            .map(|i| match graph.nodes[i].role {
                NodeRole::Launch { clock, clk_to_q, .. } if clock == domain => Some(clk_to_q),
                _ => None,
            })
            .collect();
        launch_sets.push((Some(domain), launch));
    }

    // Worst in-domain path per domain, worst cross path per domain pair.
    let mut domain_worst: Vec<(Ident, Option<CriticalPath>)> =
        domains.iter().map(|&d| (d, None)).collect();
    let mut xpaths: Vec<CriticalPath> = Vec::new();

    for (launch_domain, launch) in &launch_sets {
        if launch.iter().all(|l| l.is_none()) {
            continue;
        }
        let prop = propagate(&graph, launch);
        for capture in 0..graph.node_count() {
            let NodeRole::Capture { clock, falling, setup } = graph.nodes[capture].role else {
                continue;
            };
            if prop.arrival[capture] == f64::NEG_INFINITY {
                continue;
            }
            // A capture with no incoming path (its own launch seed) is
            // meaningless.
            if prop.prev_edge[capture].is_none() {
                continue;
            }
            let launch_node = {
                let mut cursor = capture;
                while let Some(e) = prop.prev_edge[cursor] {
                    cursor = graph.edges[e].from.index();
                }
                cursor
            };
            let from_event = match launch_domain {
                None => ClockEvent::Async,
                Some(_) => launch_event(&graph, launch_node),
            };
            let to_event = if falling {
                ClockEvent::Negedge(clock)
            } else {
                ClockEvent::Posedge(clock)
            };
            let path = build_path(ctx, &graph, &prop, capture, setup, from_event, to_event);

            if *launch_domain == Some(clock) {
                let slot = domain_worst
                    .iter_mut()
                    .find(|(d, _)| *d == clock)
                    .expect("domain registered");
                if slot.1.as_ref().map_or(true, |p| path.delay_ns > p.delay_ns) {
                    slot.1 = Some(path);
                }
            } else if xpaths
                .iter()
                .all(|p| (p.from_event, p.to_event) != (path.from_event, path.to_event))
                || xpaths
                    .iter()
                    .any(|p| {
                        (p.from_event, p.to_event) == (path.from_event, path.to_event)
                            && path.delay_ns > p.delay_ns
                    })
            {
                xpaths.retain(|p| (p.from_event, p.to_event) != (path.from_event, path.to_event));
                xpaths.push(path);
            }
        }
    }

    for (clock, worst) in domain_worst {
        let constraint = ctx
            .net(clock)
            .ok()
            .and_then(|n| n.clock_constraint);
        let achieved = worst
            .as_ref()
            .map(|p| p.delay_ns)
            .unwrap_or(MIN_PERIOD_NS)
            .max(MIN_PERIOD_NS);
        result.domains.push(DomainTiming {
            clock,
            achieved_period_ns: achieved,
            constraint_period_ns: constraint,
        });
        if let Some(path) = worst {
            result.clock_paths.push(path);
        }
    }
    result.xclock_paths = xpaths;

    if detailed {
        for (&net_name, net) in &ctx.netlist.nets {
            let Some(driver) = net.driver else { continue };
            if ctx.cell(driver.cell).is_err() {
                continue;
            }
            let sinks: Vec<(PortRef, f64)> = net
                .users()
                .filter(|u| ctx.cell(u.cell).is_ok())
                .map(|u| {
                    (
                        u,
                        crate::graph::net_sink_delay(ctx, arch, net_name, driver, u),
                    )
                })
                .collect();
            if !sinks.is_empty() {
                result.net_timings.push(NetTiming {
                    net: net_name,
                    driver,
                    sinks,
                });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;
    use halcyon_device::PortDir;
    use halcyon_netlist::{PlaceStrength, Property};

    /// FF → LUT → FF, one clock domain, placed in one tile.
    fn reg_to_reg() -> (Context, fabric::FabricArch) {
        let (mut ctx, arch) = fabric::create("fab-4x4").unwrap();
        let ff_a = ctx.id("ff_a");
        let lut = ctx.id("l0");
        let ff_b = ctx.id("ff_b");
        let clk = ctx.id("clk");
        let q_net = ctx.id("q_net");
        let d_net = ctx.id("d_net");
        for n in [clk, q_net, d_net] {
            ctx.netlist.create_net(n).unwrap();
        }
        ctx.netlist.create_cell(ff_a, ctx.ids.slice_ff).unwrap();
        ctx.netlist.create_cell(lut, ctx.ids.slice_comb).unwrap();
        ctx.netlist.create_cell(ff_b, ctx.ids.slice_ff).unwrap();
        for (c, p, n, d) in [
            (ff_a, ctx.ids.clk, clk, PortDir::Input),
            (ff_a, ctx.ids.q, q_net, PortDir::Output),
            (lut, ctx.ids.a, q_net, PortDir::Input),
            (lut, ctx.ids.f, d_net, PortDir::Output),
            (ff_b, ctx.ids.m, d_net, PortDir::Input),
            (ff_b, ctx.ids.clk, clk, PortDir::Input),
        ] {
            ctx.netlist.add_port(c, p, d).unwrap();
            ctx.netlist.connect_port(c, p, n).unwrap();
        }
        for (cell, bel) in [
            (ff_a, "R1C1_SLICE0_FF0"),
            (lut, "R1C1_SLICE1_LUT0"),
            (ff_b, "R1C1_SLICE1_FF0"),
        ] {
            let b = ctx.device.bel_by_name(ctx.id(bel)).unwrap();
            ctx.bind_bel(b, cell, PlaceStrength::Strong).unwrap();
        }
        (ctx, arch)
    }

    #[test]
    fn empty_design_is_empty_result() {
        let (ctx, arch) = fabric::create("fab-4x4").unwrap();
        let result = analyze_timing(&ctx, &arch, false);
        assert!(result.domains.is_empty());
        assert!(result.clock_paths.is_empty());
    }

    #[test]
    fn reg_to_reg_has_one_domain_path() {
        let (ctx, arch) = reg_to_reg();
        let result = analyze_timing(&ctx, &arch, false);
        assert_eq!(result.domains.len(), 1);
        assert_eq!(result.clock_paths.len(), 1);

        let path = &result.clock_paths[0];
        assert_eq!(path.from_event, ClockEvent::Posedge(ctx.id("clk")));
        assert_eq!(path.to_event, ClockEvent::Posedge(ctx.id("clk")));

        // clk-to-q + routing + logic + routing + setup
        let kinds: Vec<_> = path.segments.iter().map(|s| s.kind).collect();
        assert_eq!(kinds[0], SegmentKind::ClkToQ);
        assert!(matches!(kinds[1], SegmentKind::Routing(_)));
        assert_eq!(kinds[2], SegmentKind::Logic);
        assert!(matches!(kinds[3], SegmentKind::Routing(_)));
        assert_eq!(*kinds.last().unwrap(), SegmentKind::Setup);

        // Total equals the sum of segments.
        let sum: f64 = path.segments.iter().map(|s| s.delay_ns).sum();
        assert!((sum - path.delay_ns).abs() < 1e-9);
        // clk-to-q 0.25 + logic 0.35 + setup 0.12 + estimated routing 0.
        assert!((path.delay_ns - 0.72).abs() < 1e-9);
    }

    #[test]
    fn constraint_read_from_clock_net() {
        let (mut ctx, arch) = reg_to_reg();
        ctx.netlist
            .net_mut(ctx.id("clk"))
            .unwrap()
            .clock_constraint = Some(10.0);
        let result = analyze_timing(&ctx, &arch, false);
        let d = &result.domains[0];
        assert_eq!(d.constraint_period_ns, Some(10.0));
        assert!(d.met(), "sub-nanosecond path meets 100 MHz");
    }

    #[test]
    fn falling_edge_domain_reports_negedge() {
        let (mut ctx, arch) = reg_to_reg();
        for ff in ["ff_a", "ff_b"] {
            let cell = ctx.id(ff);
            ctx.netlist
                .cell_mut(cell)
                .unwrap()
                .params
                .insert(ctx.ids.clkmux, Property::from_str_value("INV"));
        }
        let result = analyze_timing(&ctx, &arch, false);
        let path = &result.clock_paths[0];
        assert_eq!(path.from_event, ClockEvent::Negedge(ctx.id("clk")));
        assert_eq!(path.to_event, ClockEvent::Negedge(ctx.id("clk")));
    }

    #[test]
    fn cross_domain_paths_are_separated() {
        let (mut ctx, arch) = reg_to_reg();
        // Retime the capture FF onto a second clock.
        let clk_b = ctx.id("clk_b");
        ctx.netlist.create_net(clk_b).unwrap();
        ctx.netlist.disconnect_port(ctx.id("ff_b"), ctx.ids.clk).unwrap();
        ctx.netlist
            .connect_port(ctx.id("ff_b"), ctx.ids.clk, clk_b)
            .unwrap();

        let result = analyze_timing(&ctx, &arch, false);
        assert!(result.clock_paths.is_empty(), "no in-domain path remains");
        assert_eq!(result.xclock_paths.len(), 1);
        let x = &result.xclock_paths[0];
        assert_eq!(x.from_event, ClockEvent::Posedge(ctx.id("clk")));
        assert_eq!(x.to_event, ClockEvent::Posedge(clk_b));
    }

    #[test]
    fn detailed_net_timings_cover_sinks() {
        let (ctx, arch) = reg_to_reg();
        let result = analyze_timing(&ctx, &arch, true);
        assert!(!result.net_timings.is_empty());
        let q = result
            .net_timings
            .iter()
            .find(|t| t.net == ctx.id("q_net"))
            .unwrap();
        assert_eq!(q.sinks.len(), 1);
    }
}
