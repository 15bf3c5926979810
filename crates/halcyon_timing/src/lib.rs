//! Static timing analysis over placed-and-routed bindings.
//!
//! The analyzer consumes the context's bindings plus the architecture's
//! delay queries and produces, per clock domain, the achieved period (and
//! so f_max), the top critical path, optional cross-domain paths, and
//! optional per-net detailed timing. Path segments are tagged clk-to-q,
//! source, logic, setup, or routing so the report writer can format them.

#![warn(missing_docs)]

pub mod graph;
pub mod ids;
pub mod result;
pub mod sta;

pub use graph::{build_timing_graph, TimingEdge, TimingGraph, TimingNode};
pub use ids::TimingNodeId;
pub use result::{
    ClockEvent, CriticalPath, DomainTiming, NetTiming, PathSegment, SegmentKind, TimingResult,
};
pub use sta::analyze_timing;
