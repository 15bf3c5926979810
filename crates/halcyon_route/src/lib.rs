//! The negotiated-congestion router.
//!
//! Every net is a set of arcs (driver pin → sink pin). Arcs route
//! independently by A* over the wire graph, sharing wires within their net
//! for free; across nets, shared wires accumulate present-pressure and
//! history costs each iteration until the contention clears. Nets driven
//! by global clock cells are routed first over the dedicated clock trees
//! by a separate hop-count search, and those bindings are locked against
//! rip-up.
//!
//! Per-arc failure is expected and feeds the next iteration; running out
//! of iterations with residual congestion is fatal.

#![warn(missing_docs)]

pub mod arcs;
pub mod astar;
pub mod globals;
pub mod pathfinder;
pub mod scoreboard;

pub use arcs::{collect_arcs, Arc, NetArcs};
pub use pathfinder::{route_nets, RouteStats};
pub use scoreboard::Scoreboard;

use halcyon_arch::Architecture;
use halcyon_common::PnrResult;
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::Context;

/// Router tunables.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Iteration cap before a congested result is fatal.
    pub max_iterations: usize,
    /// Present-congestion pressure of the first iteration.
    pub initial_pressure: f64,
    /// Pressure increase per iteration.
    pub pressure_step: f64,
    /// History cost added per unit of overuse per iteration.
    pub history_step: f64,
    /// Hop budget of the dedicated global router.
    pub global_max_hops: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            initial_pressure: 0.5,
            pressure_step: 0.25,
            history_step: 1.0,
            global_max_hops: 16,
        }
    }
}

/// Routes the whole design: dedicated globals first, then the negotiated
/// pathfinder over everything that remains.
pub fn route<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &mut A,
    sink: &DiagnosticSink,
    config: &RouterConfig,
) -> PnrResult<RouteStats> {
    globals::route_globals(ctx, arch, sink, config.global_max_hops)?;
    route_nets(ctx, arch, sink, config)
}
