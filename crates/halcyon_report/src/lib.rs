//! The JSON run report.
//!
//! One document with a fixed key set: `utilization` (per bel bucket),
//! `fmax` (per clock), `critical_paths`, and, only when requested,
//! `detailed_net_timings`. Delays are nanoseconds; frequencies are MHz;
//! locations are the bel locations of the referenced cells at report
//! time.

#![warn(missing_docs)]

use halcyon_arch::Architecture;
use halcyon_common::Ident;
use halcyon_netlist::{Context, PortRef};
use halcyon_timing::{ClockEvent, CriticalPath, SegmentKind, TimingResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// Used/available counts of one bel bucket.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct BucketUtilization {
    /// Cells bound (or bindable) to this bucket.
    pub used: u32,
    /// Non-hidden bels in the bucket.
    pub available: u32,
}

#[derive(Serialize)]
struct FmaxEntry {
    achieved: f64,
    constraint: f64,
}

#[derive(Serialize)]
struct Endpoint {
    cell: String,
    port: String,
    loc: [i32; 2],
}

#[derive(Serialize)]
struct Segment {
    delay: f64,
    from: Endpoint,
    to: Endpoint,
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    net: Option<String>,
}

#[derive(Serialize)]
struct PathEntry {
    from: String,
    to: String,
    path: Vec<Segment>,
}

#[derive(Serialize)]
struct NetTimingEntry {
    net: String,
    driver: EndpointRef,
    sinks: Vec<SinkTiming>,
}

#[derive(Serialize)]
struct EndpointRef {
    cell: String,
    port: String,
}

#[derive(Serialize)]
struct SinkTiming {
    cell: String,
    port: String,
    delay: f64,
}

#[derive(Serialize)]
struct Report {
    utilization: BTreeMap<String, BucketUtilization>,
    fmax: BTreeMap<String, FmaxEntry>,
    critical_paths: Vec<PathEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detailed_net_timings: Option<Vec<NetTimingEntry>>,
}

/// Renders a clock event the way constraint files spell them.
pub fn clock_event_name(ctx: &Context, event: ClockEvent) -> String {
    match event {
        ClockEvent::Async => "<async>".to_string(),
        ClockEvent::Posedge(clk) => format!("posedge {}", ctx.name_of(clk)),
        ClockEvent::Negedge(clk) => format!("negedge {}", ctx.name_of(clk)),
    }
}

fn endpoint(ctx: &Context, pin: PortRef) -> Endpoint {
    let loc = ctx
        .cell(pin.cell)
        .ok()
        .and_then(|c| c.bel)
        .map(|b| ctx.device.bel(b).loc)
        .map(|l| [l.x, l.y])
        .unwrap_or([0, 0]);
    Endpoint {
        cell: ctx.name_of(pin.cell).to_string(),
        port: ctx.name_of(pin.port).to_string(),
        loc,
    }
}

fn path_entry(ctx: &Context, path: &CriticalPath) -> PathEntry {
    let segments = path
        .segments
        .iter()
        .map(|seg| {
            let (kind, net) = match seg.kind {
                SegmentKind::ClkToQ => ("clk-to-q", None),
                SegmentKind::Source => ("source", None),
                SegmentKind::Logic => ("logic", None),
                SegmentKind::Setup => ("setup", None),
                SegmentKind::Routing(net) => ("routing", Some(ctx.name_of(net).to_string())),
            };
            Segment {
                delay: seg.delay_ns,
                from: endpoint(ctx, seg.from),
                to: endpoint(ctx, seg.to),
                kind: kind.to_string(),
                net,
            }
        })
        .collect();
    PathEntry {
        from: clock_event_name(ctx, path.from_event),
        to: clock_event_name(ctx, path.to_event),
        path: segments,
    }
}

/// Computes per-bucket utilization from the current bindings.
pub fn utilization<A: Architecture + ?Sized>(
    ctx: &Context,
    arch: &A,
) -> BTreeMap<String, BucketUtilization> {
    // Bucket for a cell type: the bucket of any bel hosting that type.
    let mut type_bucket: BTreeMap<Ident, Ident> = BTreeMap::new();
    for bel in arch.device().bels() {
        let b = arch.device().bel(bel);
        type_bucket.entry(b.bel_type).or_insert(b.bucket);
    }

    let mut result: BTreeMap<String, BucketUtilization> = BTreeMap::new();
    for cell in ctx.netlist.cells.values() {
        let bucket = type_bucket
            .get(&cell.cell_type)
            .copied()
            .unwrap_or(cell.cell_type);
        let entry = result
            .entry(ctx.name_of(bucket).to_string())
            .or_insert(BucketUtilization {
                used: 0,
                available: 0,
            });
        entry.used += 1;
    }
    for bel in arch.device().bels() {
        let b = arch.device().bel(bel);
        if b.hidden {
            continue;
        }
        let entry = result
            .entry(ctx.name_of(b.bucket).to_string())
            .or_insert(BucketUtilization {
                used: 0,
                available: 0,
            });
        entry.available += 1;
    }
    result
}

/// Produces the report as a JSON value.
pub fn report_json<A: Architecture + ?Sized>(
    ctx: &Context,
    arch: &A,
    timing: &TimingResult,
) -> serde_json::Value {
    let mut fmax = BTreeMap::new();
    for domain in &timing.domains {
        fmax.insert(
            ctx.name_of(domain.clock).to_string(),
            FmaxEntry {
                achieved: domain.achieved_fmax_mhz(),
                constraint: domain.constraint_fmax_mhz().unwrap_or(0.0),
            },
        );
    }

    let critical_paths = timing
        .clock_paths
        .iter()
        .chain(timing.xclock_paths.iter())
        .map(|p| path_entry(ctx, p))
        .collect();

    let detailed = (!timing.net_timings.is_empty()).then(|| {
        timing
            .net_timings
            .iter()
            .map(|t| NetTimingEntry {
                net: ctx.name_of(t.net).to_string(),
                driver: EndpointRef {
                    cell: ctx.name_of(t.driver.cell).to_string(),
                    port: ctx.name_of(t.driver.port).to_string(),
                },
                sinks: t
                    .sinks
                    .iter()
                    .map(|(pin, delay)| SinkTiming {
                        cell: ctx.name_of(pin.cell).to_string(),
                        port: ctx.name_of(pin.port).to_string(),
                        delay: *delay,
                    })
                    .collect(),
            })
            .collect()
    });

    let report = Report {
        utilization: utilization(ctx, arch),
        fmax,
        critical_paths,
        detailed_net_timings: detailed,
    };
    serde_json::to_value(&report).expect("report serializes")
}

/// Serializes the report to a pretty-printed JSON string.
pub fn report_string<A: Architecture + ?Sized>(
    ctx: &Context,
    arch: &A,
    timing: &TimingResult,
) -> String {
    serde_json::to_string_pretty(&report_json(ctx, arch, timing)).expect("report serializes")
}
