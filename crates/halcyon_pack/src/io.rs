//! IO preparation and packing.
//!
//! The front-end inserts placeholder buffers (`$halcyon_ibuf` and friends)
//! between top-level ports and the design's real IO buffer primitives.
//! Preparation matches each port to its real buffer, copies the port's
//! constraint attributes across, and removes the placeholder. Packing then
//! resolves each buffer's `LOC` package-pin constraint to a bel, applies
//! IO-standard and differential checks, and rewrites the buffer variants
//! onto the hardware IO cell with the right tristate pin mux.

use crate::helpers::set_bel_attr;
use halcyon_arch::Architecture;
use halcyon_common::{Ident, PnrError, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, PinMux, PortRef};

/// IO standards the fabric family accepts.
const SUPPORTED_IO_TYPES: [&str; 3] = ["LVCMOS33", "LVCMOS18", "LVDS"];

/// Matches top-level ports to their real IO buffers and removes the
/// placeholder buffers.
pub fn prepare_io(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let port_names: Vec<Ident> = ctx.netlist.ports.keys().copied().collect();

    for port in port_names {
        let Ok(ci) = ctx.cell(port) else {
            return Err(PnrError::user(format!(
                "port '{}' doesn't seem to have a corresponding top level IO",
                ctx.name_of(port)
            )));
        };
        let cell_type = ci.cell_type;
        let is_ibuf = cell_type == ids.npnr_ibuf || cell_type == ids.npnr_iobuf;
        let is_obuf = cell_type == ids.npnr_obuf || cell_type == ids.npnr_iobuf;
        if !is_ibuf && !is_obuf {
            return Err(PnrError::user(format!(
                "port '{}' doesn't seem to have a corresponding top level IO (cell type mismatch)",
                ctx.name_of(port)
            )));
        }

        let mut top_port: Option<PortRef> = None;
        if is_ibuf {
            if let Some(o_net) = ctx.cell(port).unwrap().port_net(ids.o) {
                let users: Vec<PortRef> = ctx.net(o_net).unwrap().users().collect();
                if users.len() > 1 {
                    return Err(PnrError::user(format!(
                        "top level pin '{}' has multiple input buffers",
                        ctx.name_of(port)
                    )));
                }
                top_port = users.first().copied();
            }
        }
        if is_obuf {
            if let Some(i_net) = ctx.cell(port).unwrap().port_net(ids.i) {
                if let Some(driver) = ctx.net(i_net).unwrap().driver {
                    if top_port.is_some() {
                        return Err(PnrError::user(format!(
                            "top level pin '{}' has multiple input/output buffers",
                            ctx.name_of(port)
                        )));
                    }
                    top_port = Some(driver);
                }
            }
        }

        match top_port {
            None => {
                sink.emit(Diagnostic::info(
                    DiagnosticCode::new(Category::Pack, 10),
                    format!("trimming port '{}' as it is unused", ctx.name_of(port)),
                ));
            }
            Some(real) => {
                // Copy constraint attributes onto the real buffer.
                let attrs = ctx.netlist.ports[&port].attrs.clone();
                ctx.netlist
                    .cell_mut(real.cell)
                    .unwrap()
                    .attrs
                    .extend(attrs);
                // The top-level net is whatever the real buffer drives or
                // consumes on its matched port.
                let net = ctx.cell(real.cell).unwrap().port_net(real.port);
                ctx.netlist.ports.get_mut(&port).unwrap().net = net;
            }
        }

        ctx.netlist.disconnect_port(port, ids.i).unwrap();
        ctx.netlist.disconnect_port(port, ids.o).unwrap();
        ctx.netlist.remove_cell(port).unwrap();
    }
    Ok(())
}

/// The IO packing pass: preparation, pin constraints, and buffer rewrite.
pub fn pack_io<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    sink: &DiagnosticSink,
) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    prepare_io(ctx, sink)?;

    let iob_types = [ids.ib, ids.ob, ids.obz, ids.bb, ids.iob_core];
    let iobs: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| iob_types.contains(&c.cell_type))
        .map(|(&n, _)| n)
        .collect();

    for ci in iobs {
        // Resolve the package-pin constraint.
        let loc = ctx
            .cell(ci)
            .unwrap()
            .attrs
            .get(&ids.loc)
            .map(|p| p.as_string())
            .ok_or_else(|| {
                PnrError::user(format!(
                    "found unconstrained IO '{}', these are currently unsupported",
                    ctx.name_of(ci)
                ))
            })?;
        let bel = arch.package_pin_bel(&loc).ok_or_else(|| {
            PnrError::user(format!(
                "IO '{}' is constrained to invalid pin '{}'",
                ctx.name_of(ci),
                loc
            ))
        })?;

        // IO standard checks.
        let io_type = ctx
            .cell(ci)
            .unwrap()
            .attrs
            .get(&ids.io_type)
            .map(|p| p.as_string())
            .unwrap_or_else(|| "LVCMOS33".to_string());
        if !SUPPORTED_IO_TYPES.contains(&io_type.as_str()) {
            return Err(PnrError::user(format!(
                "IO '{}' has an unsupported IO type '{}'",
                ctx.name_of(ci),
                io_type
            )));
        }
        if io_type == "LVDS" && ctx.device.bel(bel).loc.z != 0 {
            return Err(PnrError::arch(format!(
                "IO '{}' uses differential type '{}' but is placed on a 'B' side pin '{}'",
                ctx.name_of(ci),
                io_type,
                loc
            )));
        }

        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 11),
            format!(
                "constraining {} IO '{}' to pin {} (bel {})",
                io_type,
                ctx.name_of(ci),
                loc,
                ctx.name_of(ctx.device.bel(bel).name)
            ),
        ));
        set_bel_attr(ctx, ci, bel);

        // Rewrite the buffer variant onto the hardware cell.
        let cell_type = ctx.cell(ci).unwrap().cell_type;
        if cell_type == ids.ib {
            ctx.netlist
                .cell_mut(ci)
                .unwrap()
                .pin_muxes
                .insert(ids.t, PinMux::Const1);
            ctx.netlist.rename_port(ci, ids.i, ids.b).unwrap();
        } else if cell_type == ids.ob {
            ctx.netlist
                .cell_mut(ci)
                .unwrap()
                .pin_muxes
                .insert(ids.t, PinMux::Const0);
            ctx.netlist.rename_port(ci, ids.o, ids.b).unwrap();
        } else if cell_type == ids.obz {
            ctx.netlist.rename_port(ci, ids.o, ids.b).unwrap();
        }
        let hw_type = ctx.device.bel(bel).bel_type;
        ctx.netlist.cell_mut(ci).unwrap().cell_type = hw_type;
    }
    Ok(())
}
