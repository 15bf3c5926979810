//! Timing analysis results.

use halcyon_common::Ident;
use halcyon_netlist::PortRef;
use serde::{Deserialize, Serialize};

/// A clock edge, or the unclocked sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ClockEvent {
    /// Combinational or unconstrained endpoints.
    Async,
    /// The rising edge of a named clock net.
    Posedge(Ident),
    /// The falling edge of a named clock net.
    Negedge(Ident),
}

impl ClockEvent {
    /// The clock net, when there is one.
    pub fn clock(&self) -> Option<Ident> {
        match self {
            ClockEvent::Async => None,
            ClockEvent::Posedge(clk) | ClockEvent::Negedge(clk) => Some(*clk),
        }
    }
}

/// The flavor of one critical-path segment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Clock-to-output of the launching register.
    ClkToQ,
    /// A combinational launch point (input pad, unclocked driver).
    Source,
    /// Propagation through a cell.
    Logic,
    /// Setup requirement at the capturing register.
    Setup,
    /// Interconnect along the named net.
    Routing(Ident),
}

/// One hop of a critical path.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PathSegment {
    /// Delay contributed by this segment, in nanoseconds.
    pub delay_ns: f64,
    /// Where the segment starts.
    pub from: PortRef,
    /// Where the segment ends.
    pub to: PortRef,
    /// What the segment is.
    pub kind: SegmentKind,
}

/// A worst path between two clock events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CriticalPath {
    /// The launching clock event.
    pub from_event: ClockEvent,
    /// The capturing clock event.
    pub to_event: ClockEvent,
    /// Total data-path delay plus setup, in nanoseconds.
    pub delay_ns: f64,
    /// The segments, launch to capture.
    pub segments: Vec<PathSegment>,
}

/// Per-domain summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainTiming {
    /// The clock net of this domain.
    pub clock: Ident,
    /// The worst in-domain path delay (the achievable period), in ns.
    pub achieved_period_ns: f64,
    /// The user/derived constraint period, if any, in ns.
    pub constraint_period_ns: Option<f64>,
}

impl DomainTiming {
    /// Achieved f_max in MHz.
    pub fn achieved_fmax_mhz(&self) -> f64 {
        1000.0 / self.achieved_period_ns
    }

    /// Constrained f_max in MHz, if constrained.
    pub fn constraint_fmax_mhz(&self) -> Option<f64> {
        self.constraint_period_ns.map(|p| 1000.0 / p)
    }

    /// Whether the domain meets its constraint.
    pub fn met(&self) -> bool {
        match self.constraint_period_ns {
            Some(constraint) => self.achieved_period_ns <= constraint,
            None => true,
        }
    }
}

/// Detailed routing timing of one net.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetTiming {
    /// The net.
    pub net: Ident,
    /// Its driver endpoint.
    pub driver: PortRef,
    /// Per-sink interconnect delays, in ns.
    pub sinks: Vec<(PortRef, f64)>,
}

/// Everything the analyzer produces.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingResult {
    /// One summary per clock domain.
    pub domains: Vec<DomainTiming>,
    /// The top critical path of each domain.
    pub clock_paths: Vec<CriticalPath>,
    /// Worst paths crossing between domains.
    pub xclock_paths: Vec<CriticalPath>,
    /// Per-net interconnect detail, when requested.
    pub net_timings: Vec<NetTiming>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_event_accessors() {
        let clk = Ident::from_raw(3);
        assert_eq!(ClockEvent::Posedge(clk).clock(), Some(clk));
        assert_eq!(ClockEvent::Negedge(clk).clock(), Some(clk));
        assert_eq!(ClockEvent::Async.clock(), None);
    }

    #[test]
    fn fmax_conversion() {
        let d = DomainTiming {
            clock: Ident::from_raw(1),
            achieved_period_ns: 10.0,
            constraint_period_ns: Some(12.5),
        };
        assert_eq!(d.achieved_fmax_mhz(), 100.0);
        assert_eq!(d.constraint_fmax_mhz(), Some(80.0));
        assert!(d.met());
    }

    #[test]
    fn unmet_when_too_slow() {
        let d = DomainTiming {
            clock: Ident::from_raw(1),
            achieved_period_ns: 20.0,
            constraint_period_ns: Some(10.0),
        };
        assert!(!d.met());
    }

    #[test]
    fn unconstrained_is_met() {
        let d = DomainTiming {
            clock: Ident::from_raw(1),
            achieved_period_ns: 50.0,
            constraint_period_ns: None,
        };
        assert!(d.met());
    }
}
