//! FF and LUT normalization onto the common slice cell types.
//!
//! Every family-specific flip-flop variant becomes a `SLICE_FF` with
//! explicit mux-select parameters; LUTs, inverters, and constant drivers
//! become `SLICE_COMB` cells with a parsed 16-bit INIT mask.

use crate::rules::{generic_xform, XformRule};
use halcyon_common::PnrResult;
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::{Context, Property};
use std::collections::BTreeMap;

/// Rewrites the four FF variants onto `SLICE_FF`.
///
/// The variants encode, in their type, async-preload (`FD1P3BX`),
/// async-clear (`FD1P3DX`), sync-preload (`FD1P3JX`), and sync-clear
/// (`FD1P3IX`); normalization moves that into `SRMODE`/`REGSET`
/// parameters. Data arrives on `M` at this stage; LUT+FF fusion may later
/// reroute it to `DI`.
pub fn pack_ffs(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let mut rules = BTreeMap::new();
    for ty in [ids.fd1p3bx, ids.fd1p3dx, ids.fd1p3ix, ids.fd1p3jx] {
        let rule = XformRule::to(ids.slice_ff)
            .port(ids.ck, ids.clk)
            .port(ids.d, ids.m)
            .port(ids.sp, ids.ce)
            .port(ids.q, ids.q)
            .default_param(ids.clkmux, Property::from_str_value("CLK"))
            .default_param(ids.cemux, Property::from_str_value("CE"))
            .default_param(ids.lsrmux, Property::from_str_value("LSR"))
            .set_param(ids.lsrmode, Property::from_str_value("LSR"));
        rules.insert(ty, rule);
    }
    // Async preload
    let r = rules.get_mut(&ids.fd1p3bx).unwrap();
    r.set_params.push((ids.srmode, Property::from_str_value("ASYNC")));
    r.set_params.push((ids.regset, Property::from_str_value("SET")));
    r.port_xform.insert(ids.pd, ids.lsr);
    // Async clear
    let r = rules.get_mut(&ids.fd1p3dx).unwrap();
    r.set_params.push((ids.srmode, Property::from_str_value("ASYNC")));
    r.set_params.push((ids.regset, Property::from_str_value("RESET")));
    r.port_xform.insert(ids.cd, ids.lsr);
    // Sync preload
    let r = rules.get_mut(&ids.fd1p3jx).unwrap();
    r.set_params.push((ids.srmode, Property::from_str_value("LSR_OVER_CE")));
    r.set_params.push((ids.regset, Property::from_str_value("SET")));
    r.port_xform.insert(ids.pd, ids.lsr);
    // Sync clear
    let r = rules.get_mut(&ids.fd1p3ix).unwrap();
    r.set_params.push((ids.srmode, Property::from_str_value("LSR_OVER_CE")));
    r.set_params.push((ids.regset, Property::from_str_value("RESET")));
    r.port_xform.insert(ids.cd, ids.lsr);

    generic_xform(ctx, &rules, sink, true)
}

/// Rewrites LUT4/INV/VHI/VLO onto `SLICE_COMB`.
///
/// Constant drivers get saturated INIT masks so a downstream bitstream
/// writer needs no special cases.
pub fn pack_luts(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let mut rules = BTreeMap::new();

    rules.insert(
        ids.lut4,
        XformRule::to(ids.slice_comb)
            .port(ids.z, ids.f)
            .parse_param(ids.init, ids.init, 16, 0),
    );
    rules.insert(
        ids.inv,
        XformRule::to(ids.slice_comb)
            .port(ids.z, ids.f)
            .port(ids.a, ids.a)
            .set_param(ids.init, Property::from_int(0x5555, 16)),
    );
    rules.insert(
        ids.vhi,
        XformRule::to(ids.slice_comb)
            .port(ids.z, ids.f)
            .set_param(ids.init, Property::from_int(0xFFFF, 16)),
    );
    rules.insert(
        ids.vlo,
        XformRule::to(ids.slice_comb)
            .port(ids.z, ids.f)
            .set_param(ids.init, Property::from_int(0x0000, 16)),
    );

    generic_xform(ctx, &rules, sink, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;
    use halcyon_device::PortDir;
    use halcyon_common::Ident;

    fn setup() -> (Context, DiagnosticSink) {
        (fabric::create("fab-4x4").unwrap().0, DiagnosticSink::new())
    }

    fn add_ff(ctx: &mut Context, name: &str, ty: Ident, sr_port: Ident) -> Ident {
        let ff = ctx.id(name);
        ctx.netlist.create_cell(ff, ty).unwrap();
        for (port, net) in [
            (ctx.ids.ck, "clk"),
            (ctx.ids.d, "d"),
            (ctx.ids.sp, "en"),
            (sr_port, "rst"),
        ] {
            let net = ctx.id(net);
            let _ = ctx.netlist.create_net(net);
            ctx.netlist.add_port(ff, port, PortDir::Input).unwrap();
            ctx.netlist.connect_port(ff, port, net).unwrap();
        }
        ff
    }

    #[test]
    fn async_clear_ff_normalizes() {
        let (mut ctx, sink) = setup();
        let fd1p3dx_id = ctx.ids.fd1p3dx;
        let cd_id = ctx.ids.cd;
        let ff = add_ff(&mut ctx, "ff0", fd1p3dx_id, cd_id);
        pack_ffs(&mut ctx, &sink).unwrap();

        let c = ctx.cell(ff).unwrap();
        assert_eq!(c.cell_type, ctx.ids.slice_ff);
        assert_eq!(c.port_net(ctx.ids.clk), Some(ctx.id("clk")));
        assert_eq!(c.port_net(ctx.ids.m), Some(ctx.id("d")), "D migrates to M");
        assert_eq!(c.port_net(ctx.ids.ce), Some(ctx.id("en")));
        assert_eq!(c.port_net(ctx.ids.lsr), Some(ctx.id("rst")));
        assert_eq!(c.param_str(ctx.ids.srmode, ""), "ASYNC");
        assert_eq!(c.param_str(ctx.ids.regset, ""), "RESET");
        assert_eq!(c.param_str(ctx.ids.clkmux, ""), "CLK");
    }

    #[test]
    fn sync_preload_ff_normalizes() {
        let (mut ctx, sink) = setup();
        let fd1p3jx_id = ctx.ids.fd1p3jx;
        let pd_id = ctx.ids.pd;
        let ff = add_ff(&mut ctx, "ff0", fd1p3jx_id, pd_id);
        pack_ffs(&mut ctx, &sink).unwrap();

        let c = ctx.cell(ff).unwrap();
        assert_eq!(c.param_str(ctx.ids.srmode, ""), "LSR_OVER_CE");
        assert_eq!(c.param_str(ctx.ids.regset, ""), "SET");
        assert_eq!(c.port_net(ctx.ids.lsr), Some(ctx.id("rst")));
    }

    #[test]
    fn lut_normalizes_with_parsed_init() {
        let (mut ctx, sink) = setup();
        let lut = ctx.id("lut0");
        let z = ctx.id("z");
        ctx.netlist.create_net(z).unwrap();
        ctx.netlist.create_cell(lut, ctx.ids.lut4).unwrap();
        ctx.netlist
            .cell_mut(lut)
            .unwrap()
            .params
            .insert(ctx.ids.init, Property::from_str_value("0x8000"));
        ctx.netlist.add_port(lut, ctx.ids.z, PortDir::Output).unwrap();
        ctx.netlist.connect_port(lut, ctx.ids.z, z).unwrap();

        pack_luts(&mut ctx, &sink).unwrap();
        let c = ctx.cell(lut).unwrap();
        assert_eq!(c.cell_type, ctx.ids.slice_comb);
        assert_eq!(c.port_net(ctx.ids.f), Some(z));
        assert_eq!(c.param_int(ctx.ids.init, 0), 0x8000);
    }

    #[test]
    fn constant_drivers_get_saturated_masks() {
        let (mut ctx, sink) = setup();
        for (name, ty) in [("hi", ctx.ids.vhi), ("lo", ctx.ids.vlo)] {
            let cell = ctx.id(name);
            ctx.netlist.create_cell(cell, ty).unwrap();
        }
        pack_luts(&mut ctx, &sink).unwrap();
        assert_eq!(ctx.cell(ctx.id("hi")).unwrap().param_int(ctx.ids.init, 0), 0xFFFF);
        assert_eq!(ctx.cell(ctx.id("lo")).unwrap().param_int(ctx.ids.init, 0), 0x0000);
    }

    #[test]
    fn inverter_becomes_a_lut() {
        let (mut ctx, sink) = setup();
        let inv = ctx.id("inv0");
        ctx.netlist.create_cell(inv, ctx.ids.inv).unwrap();
        pack_luts(&mut ctx, &sink).unwrap();
        let c = ctx.cell(inv).unwrap();
        assert_eq!(c.cell_type, ctx.ids.slice_comb);
        assert_eq!(c.param_int(ctx.ids.init, 0), 0x5555);
    }
}
