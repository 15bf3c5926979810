//! IO-logic packing.
//!
//! DDR input/output primitives become `IOLOGIC` cells; every IO-logic cell
//! sharing a pad merges into one, which is then constrained to the bel
//! adjacent to its pad (the pad's z plus 3). A flip-flop driving a pad's
//! tristate enable is absorbed into the merged cell's tristate register
//! when its clock and reset match the cell's output-side controls.

use crate::helpers::bel_attr;
use crate::rules::{generic_xform, XformRule};
use halcyon_common::{Ident, PnrError, PnrResult};
use halcyon_device::{Loc, PortDir};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_arch::Architecture;
use halcyon_netlist::{Context, Property};
use std::collections::BTreeMap;

fn transform_iologic(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let mode_key = ids.mode;
    let mut rules = BTreeMap::new();

    rules.insert(
        ids.iddrx1,
        XformRule::to(ids.iologic)
            .set_param(mode_key, Property::from_str_value("IDDRX1_ODDRX1"))
            .port(ctx.id("SCLK"), ctx.id("SCLKIN"))
            .port(ctx.id("RST"), ctx.id("LSRIN"))
            .port(ids.d, ctx.id("DI"))
            .port(ctx.id("Q0"), ctx.id("RXDATA0"))
            .port(ctx.id("Q1"), ctx.id("RXDATA1")),
    );
    rules.insert(
        ids.oddrx1,
        XformRule::to(ids.iologic)
            .set_param(mode_key, Property::from_str_value("IDDRX1_ODDRX1"))
            .set_param(
                ctx.id("IDDRX1_ODDRX1.OUTPUT"),
                Property::from_str_value("ENABLED"),
            )
            .port(ctx.id("SCLK"), ctx.id("SCLKOUT"))
            .port(ctx.id("RST"), ctx.id("LSROUT"))
            .port(ids.q, ctx.id("DOUT"))
            .port(ctx.id("D0"), ctx.id("TXDATA0"))
            .port(ctx.id("D1"), ctx.id("TXDATA1")),
    );

    generic_xform(ctx, &rules, sink, true)
}

/// Finds the IOB a given IOLOGIC cell serves, through its pad-side nets.
fn associated_iob(ctx: &Context, iol: Ident) -> PnrResult<Ident> {
    let c = ctx.cell(iol).unwrap();
    let mut iob = None;
    if let Some(di) = c.port_net(ctx.id("DI")) {
        if let Some(driver) = ctx.net(di).unwrap().driver {
            iob = Some(driver.cell);
        }
    }
    if let Some(dout) = c.port_net(ctx.id("DOUT")) {
        let users: Vec<_> = ctx.net(dout).unwrap().users().collect();
        if users.len() == 1 {
            iob = Some(users[0].cell);
        }
    }
    if let Some(tout) = c.port_net(ctx.id("TOUT")) {
        let users: Vec<_> = ctx.net(tout).unwrap().users().collect();
        if users.len() == 1 {
            iob = Some(users[0].cell);
        }
    }
    let iob = iob.filter(|&b| {
        ctx.cell(b)
            .map(|c| c.cell_type == ctx.ids.iob_core)
            .unwrap_or(false)
    });
    iob.ok_or_else(|| {
        PnrError::user(format!(
            "failed to find associated IOB for IOLOGIC '{}'",
            ctx.name_of(iol)
        ))
    })
}

fn merge_iol_cell(ctx: &mut Context, base: Ident, mergee: Ident) -> PnrResult<()> {
    let mode_key = ctx.ids.mode;
    let params: Vec<(Ident, Property)> = ctx
        .cell(mergee)
        .unwrap()
        .params
        .iter()
        .map(|(&k, v)| (k, v.clone()))
        .collect();
    for (key, value) in params {
        if key == mode_key
            && ctx.cell(base).unwrap().params.contains_key(&mode_key)
            && value.as_string() == "IREG_OREG"
        {
            // A plain-register mergee must not downgrade a DDR base mode.
            continue;
        }
        ctx.netlist.cell_mut(base).unwrap().params.insert(key, value);
    }
    let ports: Vec<Ident> = ctx.cell(mergee).unwrap().ports.keys().copied().collect();
    for port in ports {
        ctx.netlist.move_port_to(mergee, port, base, port).unwrap();
    }
    ctx.netlist.remove_cell(mergee).unwrap();
    Ok(())
}

fn constrain_merge_iol(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let iol_cells: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| c.cell_type == ids.iologic)
        .map(|(&n, _)| n)
        .collect();

    let mut by_iob: BTreeMap<Ident, Vec<Ident>> = BTreeMap::new();
    for iol in iol_cells {
        let iob = associated_iob(ctx, iol)?;
        by_iob.entry(iob).or_default().push(iol);
    }

    for (iob, group) in by_iob {
        let base = group[0];
        for &mergee in &group[1..] {
            merge_iol_cell(ctx, base, mergee)?;
        }

        let iob_bel = bel_attr(ctx, iob).ok_or_else(|| {
            PnrError::user(format!(
                "IOB '{}' serving IOLOGIC '{}' is not constrained",
                ctx.name_of(iob),
                ctx.name_of(base)
            ))
        })?;
        let mut loc = ctx.device.bel(iob_bel).loc;
        loc.z += 3;
        let iol_bel = ctx.device.bel_at(Loc::new(loc.x, loc.y, loc.z)).ok_or_else(|| {
            PnrError::arch(format!(
                "no IO-logic site beside pad for '{}'",
                ctx.name_of(base)
            ))
        })?;
        assert_eq!(ctx.device.bel(iol_bel).bel_type, ids.iologic);
        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 12),
            format!(
                "constraining IOLOGIC '{}' to bel '{}'",
                ctx.name_of(base),
                ctx.name_of(ctx.device.bel(iol_bel).name)
            ),
        ));
        crate::helpers::set_bel_attr(ctx, base, iol_bel);
    }
    Ok(())
}

/// Absorbs tristate-enable FFs into their pad's IO-logic register.
fn absorb_tristate_ffs(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let ff_types = [ids.fd1p3bx, ids.fd1p3dx, ids.fd1p3ix, ids.fd1p3jx];
    let tsdata = ctx.id("TSDATA0");
    let sclkout = ctx.id("SCLKOUT");
    let lsrout = ctx.id("LSROUT");
    let tout = ctx.id("TOUT");

    let iobs: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| c.cell_type == ids.iob_core)
        .map(|(&n, _)| n)
        .collect();

    for iob in iobs {
        // The tristate input must be the sole load of an FF's Q.
        let Some(t_net) = ctx.cell(iob).unwrap().port_net(ids.t) else {
            continue;
        };
        let Some(driver) = ctx.net(t_net).unwrap().driver else {
            continue;
        };
        if ctx.net(t_net).unwrap().user_count() != 1 {
            continue;
        }
        let ff = driver.cell;
        if !ff_types.contains(&ctx.cell(ff).unwrap().cell_type) {
            continue;
        }

        // Find the merged IOLOGIC on this pad, if any.
        let iol = ctx
            .netlist
            .cells
            .iter()
            .filter(|(_, c)| c.cell_type == ids.iologic)
            .find(|(&n, _)| associated_iob(ctx, n).ok() == Some(iob))
            .map(|(&n, _)| n);
        let Some(iol) = iol else {
            continue;
        };

        // Shared control check: the FF's clock and reset must match the
        // IOLOGIC output-side controls (or those must be absent).
        let ff_clk = ctx.cell(ff).unwrap().port_net(ids.ck);
        let ff_rst = ctx.cell(ff).unwrap().port_net(ids.cd);
        let iol_clk = ctx.cell(iol).unwrap().port_net(sclkout);
        let iol_rst = ctx.cell(iol).unwrap().port_net(lsrout);
        if iol_clk.is_some() && iol_clk != ff_clk {
            continue;
        }
        if iol_rst.is_some() && ff_rst.is_some() && iol_rst != ff_rst {
            continue;
        }

        // Absorb: data input becomes TSDATA0, TOUT takes over the pad's
        // tristate, and the FF disappears.
        ctx.netlist.move_port_to(ff, ids.d, iol, tsdata).unwrap();
        if iol_clk.is_none() {
            if let Some(clk) = ff_clk {
                ctx.netlist.add_port(iol, sclkout, PortDir::Input).unwrap();
                ctx.netlist.connect_port(iol, sclkout, clk).unwrap();
            }
        }
        if iol_rst.is_none() {
            if let Some(rst) = ff_rst {
                ctx.netlist.add_port(iol, lsrout, PortDir::Input).unwrap();
                ctx.netlist.connect_port(iol, lsrout, rst).unwrap();
            }
        }
        ctx.netlist.disconnect_port(iob, ids.t).unwrap();
        ctx.netlist.remove_cell(ff).unwrap();
        let _ = ctx.netlist.remove_net(t_net);

        let tout_net = ctx.id(&format!("{}$tsreg$", ctx.name_of(iol)));
        ctx.netlist.create_net(tout_net).unwrap();
        ctx.netlist.add_port(iol, tout, PortDir::Output).unwrap();
        ctx.netlist.connect_port(iol, tout, tout_net).unwrap();
        ctx.netlist.connect_port(iob, ids.t, tout_net).unwrap();
        let tsreg_regset = ctx.id("TSREG.REGSET");
        ctx.netlist
            .cell_mut(iol)
            .unwrap()
            .params
            .insert(tsreg_regset, Property::from_str_value("ENABLED"));

        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 13),
            format!(
                "absorbed tristate register into IOLOGIC '{}'",
                ctx.name_of(iol)
            ),
        ));
    }
    Ok(())
}

/// The IO-logic packing pass.
pub fn pack_iologic<A: Architecture + ?Sized>(
    ctx: &mut Context,
    _arch: &A,
    sink: &DiagnosticSink,
) -> PnrResult<()> {
    transform_iologic(ctx, sink)?;
    absorb_tristate_ffs(ctx, sink)?;
    constrain_merge_iol(ctx, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::set_bel_attr;
    use halcyon_arch::fabric;

    fn setup() -> (Context, fabric::FabricArch, DiagnosticSink) {
        let (ctx, arch) = fabric::create("fab-4x4").unwrap();
        (ctx, arch, DiagnosticSink::new())
    }

    /// An input pad IOB (already packed) plus an IDDRX1 reading from it.
    fn build_iddr(ctx: &mut Context, arch: &fabric::FabricArch) -> (Ident, Ident) {
        let iob = ctx.id("pad_in");
        ctx.netlist.create_cell(iob, ctx.ids.iob_core).unwrap();
        set_bel_attr(ctx, iob, arch.package_pin_bel("A1").unwrap());
        let pad_data = ctx.id("pad_data");
        ctx.netlist.create_net(pad_data).unwrap();
        ctx.netlist.add_port(iob, ctx.ids.o, PortDir::Output).unwrap();
        ctx.netlist.connect_port(iob, ctx.ids.o, pad_data).unwrap();

        let ddr = ctx.id("iddr0");
        ctx.netlist.create_cell(ddr, ctx.ids.iddrx1).unwrap();
        for (port, net, dir) in [
            ("D", "pad_data", PortDir::Input),
            ("SCLK", "sclk", PortDir::Input),
            ("RST", "rst", PortDir::Input),
            ("Q0", "q0", PortDir::Output),
            ("Q1", "q1", PortDir::Output),
        ] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            let _ = ctx.netlist.create_net(n);
            ctx.netlist.add_port(ddr, p, dir).unwrap();
            ctx.netlist.connect_port(ddr, p, n).unwrap();
        }
        (iob, ddr)
    }

    #[test]
    fn iddr_becomes_constrained_iologic() {
        let (mut ctx, arch, sink) = setup();
        let (_, ddr) = build_iddr(&mut ctx, &arch);
        pack_iologic(&mut ctx, &arch, &sink).unwrap();

        let c = ctx.cell(ddr).unwrap();
        assert_eq!(c.cell_type, ctx.ids.iologic);
        assert_eq!(c.param_str(ctx.ids.mode, ""), "IDDRX1_ODDRX1");
        assert_eq!(c.port_net(ctx.id("DI")), Some(ctx.id("pad_data")));
        assert_eq!(c.port_net(ctx.id("SCLKIN")), Some(ctx.id("sclk")));

        // Constrained to the IO-logic bel beside pad A1 (z 0 → 3).
        let bel = bel_attr(&ctx, ddr).unwrap();
        let pad = arch.package_pin_bel("A1").unwrap();
        assert_eq!(ctx.device.bel(bel).loc.x, ctx.device.bel(pad).loc.x);
        assert_eq!(ctx.device.bel(bel).loc.z, 3);
    }

    #[test]
    fn iologic_without_pad_is_fatal() {
        let (mut ctx, arch, sink) = setup();
        let ddr = ctx.id("iddr0");
        ctx.netlist.create_cell(ddr, ctx.ids.iddrx1).unwrap();
        assert!(pack_iologic(&mut ctx, &arch, &sink).is_err());
    }

    #[test]
    fn tristate_ff_absorbed_when_controls_match() {
        let (mut ctx, arch, sink) = setup();

        // Output pad with tristate driven by an FF, plus an ODDR on the
        // same pad sharing the FF's clock.
        let iob = ctx.id("pad_out");
        ctx.netlist.create_cell(iob, ctx.ids.iob_core).unwrap();
        set_bel_attr(&mut ctx, iob, arch.package_pin_bel("A1").unwrap());
        for (port, net, dir) in [
            ("I", "tx_data", PortDir::Input),
            ("T", "t_q", PortDir::Input),
        ] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            let _ = ctx.netlist.create_net(n);
            ctx.netlist.add_port(iob, p, dir).unwrap();
            ctx.netlist.connect_port(iob, p, n).unwrap();
        }

        let oddr = ctx.id("oddr0");
        ctx.netlist.create_cell(oddr, ctx.ids.oddrx1).unwrap();
        for (port, net, dir) in [
            ("Q", "tx_data", PortDir::Output),
            ("SCLK", "clk", PortDir::Input),
            ("D0", "d0", PortDir::Input),
        ] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            let _ = ctx.netlist.create_net(n);
            ctx.netlist.add_port(oddr, p, dir).unwrap();
            ctx.netlist.connect_port(oddr, p, n).unwrap();
        }

        let ff = ctx.id("t_ff");
        ctx.netlist.create_cell(ff, ctx.ids.fd1p3dx).unwrap();
        for (port, net, dir) in [
            ("CK", "clk", PortDir::Input),
            ("D", "t_en", PortDir::Input),
            ("Q", "t_q", PortDir::Output),
        ] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            let _ = ctx.netlist.create_net(n);
            ctx.netlist.add_port(ff, p, dir).unwrap();
            ctx.netlist.connect_port(ff, p, n).unwrap();
        }

        pack_iologic(&mut ctx, &arch, &sink).unwrap();

        assert!(ctx.cell(ff).is_err(), "tristate FF absorbed");
        let iol = ctx.cell(oddr).unwrap();
        assert_eq!(iol.port_net(ctx.id("TSDATA0")), Some(ctx.id("t_en")));
        // The pad's tristate now comes from the IO-logic TOUT.
        let t_net = ctx.cell(iob).unwrap().port_net(ctx.ids.t).unwrap();
        assert_eq!(
            ctx.net(t_net).unwrap().driver.map(|d| d.cell),
            Some(oddr)
        );
    }

    #[test]
    fn tristate_ff_kept_on_control_mismatch() {
        let (mut ctx, arch, sink) = setup();

        let iob = ctx.id("pad_out");
        ctx.netlist.create_cell(iob, ctx.ids.iob_core).unwrap();
        set_bel_attr(&mut ctx, iob, arch.package_pin_bel("A1").unwrap());
        for (port, net, dir) in [
            ("I", "tx_data", PortDir::Input),
            ("T", "t_q", PortDir::Input),
        ] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            let _ = ctx.netlist.create_net(n);
            ctx.netlist.add_port(iob, p, dir).unwrap();
            ctx.netlist.connect_port(iob, p, n).unwrap();
        }
        let oddr = ctx.id("oddr0");
        ctx.netlist.create_cell(oddr, ctx.ids.oddrx1).unwrap();
        for (port, net, dir) in [
            ("Q", "tx_data", PortDir::Output),
            ("SCLK", "clk_a", PortDir::Input),
        ] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            let _ = ctx.netlist.create_net(n);
            ctx.netlist.add_port(oddr, p, dir).unwrap();
            ctx.netlist.connect_port(oddr, p, n).unwrap();
        }
        let ff = ctx.id("t_ff");
        ctx.netlist.create_cell(ff, ctx.ids.fd1p3dx).unwrap();
        for (port, net, dir) in [
            ("CK", "clk_b", PortDir::Input),
            ("Q", "t_q", PortDir::Output),
        ] {
            let p = ctx.id(port);
            let n = ctx.id(net);
            let _ = ctx.netlist.create_net(n);
            ctx.netlist.add_port(ff, p, dir).unwrap();
            ctx.netlist.connect_port(ff, p, n).unwrap();
        }

        pack_iologic(&mut ctx, &arch, &sink).unwrap();
        assert!(ctx.cell(ff).is_ok(), "mismatched clock keeps the FF");
    }
}
