//! Constant and inverter legalization.
//!
//! Every cell input is inspected against the architecture's pin style.
//! Disconnected pins with a disconnect default are tied to the matching
//! constant net; pins driven by an inverter fold into the pin's hard
//! inverter where one exists; pins driven by a constant use the pin's hard
//! constant select where one exists. Inverter and constant-driver cells
//! whose outputs become unused are trimmed afterwards.

use crate::helpers::{autocreate_ports, get_const_net};
use halcyon_arch::{Architecture, PinStyle};
use halcyon_common::{Ident, PnrResult};
use halcyon_device::PortDir;
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::{Context, PinMux};
use std::collections::HashMap;

fn pin_needed_mux<A: Architecture + ?Sized>(ctx: &Context, arch: &A, cell: Ident, port: Ident) -> PinMux {
    let c = ctx.cell(cell).expect("cell exists");
    let net = c.port_net(port);
    let driver = net
        .and_then(|n| ctx.net(n).ok())
        .and_then(|n| n.driver);
    let Some(driver) = driver else {
        // Disconnected: honour an existing mux setting, else the style's
        // disconnect default.
        let existing = c.pin_mux(port);
        if existing != PinMux::Signal {
            return existing;
        }
        let style = arch.cell_pin_style(c.cell_type, port);
        if style.has(PinStyle::DEF_0) {
            return PinMux::Const0;
        }
        if style.has(PinStyle::DEF_1) {
            return PinMux::Const1;
        }
        return PinMux::Signal;
    };
    let drv_type = ctx.cell(driver.cell).map(|d| d.cell_type).ok();
    match drv_type {
        Some(t) if t == ctx.ids.inv => PinMux::Inverted,
        Some(t) if t == ctx.ids.vlo => PinMux::Const0,
        Some(t) if t == ctx.ids.vhi => PinMux::Const1,
        _ => PinMux::Signal,
    }
}

/// Rewires `port` to the input of the inverter driving it.
fn uninvert_port(ctx: &mut Context, cell: Ident, port: Ident) {
    let net = ctx.cell(cell).unwrap().port_net(port).expect("port driven");
    let inv = ctx.net(net).unwrap().driver.expect("net driven").cell;
    debug_assert_eq!(ctx.cell(inv).unwrap().cell_type, ctx.ids.inv);
    ctx.netlist.disconnect_port(cell, port).unwrap();
    if let Some(inv_a) = ctx.cell(inv).unwrap().port_net(ctx.ids.a) {
        ctx.netlist.connect_port(cell, port, inv_a).unwrap();
    }
}

fn process_inv_constants<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    reference_bels: &mut HashMap<Ident, halcyon_device::BelId>,
    cell: Ident,
    gnd_net: Ident,
    vcc_net: Ident,
) -> PnrResult<()> {
    autocreate_ports(ctx, reference_bels, cell)?;

    let cell_type = ctx.cell(cell).unwrap().cell_type;
    let in_ports: Vec<Ident> = ctx
        .cell(cell)
        .unwrap()
        .ports
        .values()
        .filter(|p| p.dir == PortDir::Input)
        .map(|p| p.name)
        .collect();

    for port in in_ports {
        let req = pin_needed_mux(ctx, arch, cell, port);
        if req == PinMux::Signal {
            continue;
        }
        let style = arch.cell_pin_style(cell_type, port);
        match req {
            PinMux::Inverted => {
                if style.has(PinStyle::OPT_INV) {
                    uninvert_port(ctx, cell, port);
                    ctx.netlist
                        .cell_mut(cell)
                        .unwrap()
                        .pin_muxes
                        .insert(port, PinMux::Inverted);
                }
            }
            PinMux::Const0 | PinMux::Const1 => {
                let hard = if req == PinMux::Const0 {
                    style.has(PinStyle::OPT_LO)
                } else {
                    style.has(PinStyle::OPT_HI)
                };
                if hard {
                    ctx.netlist.disconnect_port(cell, port).unwrap();
                    ctx.netlist
                        .cell_mut(cell)
                        .unwrap()
                        .pin_muxes
                        .insert(port, req);
                } else if ctx.cell(cell).unwrap().port_net(port).is_none() {
                    let const_net = if req == PinMux::Const1 { vcc_net } else { gnd_net };
                    ctx.netlist.connect_port(cell, port, const_net).unwrap();
                }
            }
            PinMux::Signal => unreachable!(),
        }
    }
    Ok(())
}

/// Removes inverter and constant-driver cells whose outputs have no users.
pub fn trim_design(ctx: &mut Context) {
    let candidates: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| {
            c.cell_type == ctx.ids.inv
                || c.cell_type == ctx.ids.vhi
                || c.cell_type == ctx.ids.vlo
        })
        .map(|(&n, _)| n)
        .collect();

    for cell in candidates {
        let z_net = ctx.cell(cell).unwrap().port_net(ctx.ids.z);
        match z_net {
            None => {
                ctx.netlist.remove_cell(cell).unwrap();
            }
            Some(net) => {
                if ctx.net(net).unwrap().user_count() == 0 {
                    ctx.netlist.remove_cell(cell).unwrap();
                    ctx.netlist.remove_net(net).unwrap();
                }
            }
        }
    }
}

/// The constant-handling pass: ties defaults, folds inverters and
/// constants into pin muxes, and trims dead drivers.
pub fn pack_constants<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    _sink: &DiagnosticSink,
) -> PnrResult<()> {
    let vcc_net = get_const_net(ctx, ctx.ids.vhi);
    let gnd_net = get_const_net(ctx, ctx.ids.vlo);

    let mut reference_bels = HashMap::new();
    let skip = [ctx.ids.lut4, ctx.ids.inv, ctx.ids.vhi, ctx.ids.vlo];
    let cells: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| !skip.contains(&c.cell_type))
        .map(|(&n, _)| n)
        .collect();
    for cell in cells {
        process_inv_constants(ctx, arch, &mut reference_bels, cell, gnd_net, vcc_net)?;
    }

    trim_design(ctx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;

    fn setup() -> (Context, fabric::FabricArch, DiagnosticSink) {
        let (ctx, arch) = fabric::create("fab-4x4").unwrap();
        (ctx, arch, DiagnosticSink::new())
    }

    fn add_ff(ctx: &mut Context, name: &str) -> Ident {
        let ff = ctx.id(name);
        ctx.netlist.create_cell(ff, ctx.ids.slice_ff).unwrap();
        ff
    }

    #[test]
    fn inverter_absorbed_into_hard_pin() {
        // Net driven by INV feeds an FF CE input that supports hard
        // inversion: the INV goes away, CE retargets to the INV input, and
        // the pin mux records the inversion.
        let (mut ctx, arch, sink) = setup();

        let src = ctx.id("src_net");
        let inv_out = ctx.id("inv_out");
        ctx.netlist.create_net(src).unwrap();
        ctx.netlist.create_net(inv_out).unwrap();

        let inv = ctx.id("inv0");
        ctx.netlist.create_cell(inv, ctx.ids.inv).unwrap();
        ctx.netlist.add_port(inv, ctx.ids.a, PortDir::Input).unwrap();
        ctx.netlist.add_port(inv, ctx.ids.z, PortDir::Output).unwrap();
        ctx.netlist.connect_port(inv, ctx.ids.a, src).unwrap();
        ctx.netlist.connect_port(inv, ctx.ids.z, inv_out).unwrap();

        let ff = add_ff(&mut ctx, "ff0");
        ctx.netlist.add_port(ff, ctx.ids.ce, PortDir::Input).unwrap();
        ctx.netlist.connect_port(ff, ctx.ids.ce, inv_out).unwrap();

        pack_constants(&mut ctx, &arch, &sink).unwrap();

        let c = ctx.cell(ff).unwrap();
        assert_eq!(c.port_net(ctx.ids.ce), Some(src), "CE rewired to INV input");
        assert_eq!(c.pin_mux(ctx.ids.ce), PinMux::Inverted);
        assert!(ctx.cell(inv).is_err(), "inverter trimmed");
        assert!(ctx.net(inv_out).is_err(), "inverter output net trimmed");
    }

    #[test]
    fn disconnected_ce_defaults_to_vcc() {
        let (mut ctx, arch, sink) = setup();
        let ff = add_ff(&mut ctx, "ff0");
        pack_constants(&mut ctx, &arch, &sink).unwrap();

        // CE has DEF_1 but no hard constant-1, so it ties to the soft
        // constant net.
        let c = ctx.cell(ff).unwrap();
        let ce_net = c.port_net(ctx.ids.ce).expect("CE tied");
        assert!(ctx.name_of(ce_net).contains("VHI"));
        assert_eq!(c.pin_mux(ctx.ids.ce), PinMux::Signal);
    }

    #[test]
    fn lut_input_constants_use_hard_option() {
        let (mut ctx, arch, sink) = setup();
        let comb = ctx.id("comb0");
        ctx.netlist.create_cell(comb, ctx.ids.slice_comb).unwrap();
        let vhi_id = ctx.ids.vhi;
        let vcc = get_const_net(&mut ctx, vhi_id);
        ctx.netlist.add_port(comb, ctx.ids.a, PortDir::Input).unwrap();
        ctx.netlist.connect_port(comb, ctx.ids.a, vcc).unwrap();

        pack_constants(&mut ctx, &arch, &sink).unwrap();

        let c = ctx.cell(comb).unwrap();
        assert!(c.port_net(ctx.ids.a).is_none(), "hard constant disconnects");
        assert_eq!(c.pin_mux(ctx.ids.a), PinMux::Const1);
        // B/C/D were autocreated and also default to hard constant 1.
        assert_eq!(c.pin_mux(ctx.ids.b), PinMux::Const1);
    }

    #[test]
    fn used_constant_drivers_survive_trim() {
        let (mut ctx, arch, sink) = setup();
        // An FF whose CE was tied to soft Vcc keeps the VHI driver alive.
        add_ff(&mut ctx, "ff0");
        pack_constants(&mut ctx, &arch, &sink).unwrap();
        let vhi_cells: Vec<_> = ctx
            .netlist
            .cells
            .values()
            .filter(|c| c.cell_type == ctx.ids.vhi)
            .collect();
        assert_eq!(vhi_cells.len(), 1);
    }

    #[test]
    fn unused_constant_drivers_are_trimmed() {
        let (mut ctx, arch, sink) = setup();
        pack_constants(&mut ctx, &arch, &sink).unwrap();
        assert_eq!(ctx.netlist.cell_count(), 0);
        assert_eq!(ctx.netlist.net_count(), 0);
    }
}
