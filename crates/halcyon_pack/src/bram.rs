//! Block RAM packing.
//!
//! True-dual-port, pseudo-dual-port, and single-clock pseudo-dual-port
//! primitives all become one `EBR_CORE` hardware cell. The pseudo-dual
//! variants rename their read/write-centric pins onto the hardware's A/B
//! ports, splitting the 36-bit write data across `DIA`/`DIB` and crossing
//! the read data back. Chip-select decode masks are parsed so the timing
//! analyzer's key lookups always succeed, and every BRAM gets a unique
//! write-ID used as the bitstream memory instance key.

use crate::rules::{generic_xform, XformRule};
use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::{Context, Property};
use std::collections::BTreeMap;

fn add_bus_xform(
    ctx: &Context,
    rule: &mut XformRule,
    old: &str,
    new: &str,
    width: usize,
    old_offset: usize,
    new_offset: usize,
) {
    for i in 0..width {
        rule.port_xform.insert(
            ctx.id(&format!("{old}{}", i + old_offset)),
            ctx.id(&format!("{new}{}", i + new_offset)),
        );
    }
}

/// Rewrites all BRAM mode cells onto `EBR_CORE` and assigns write-IDs.
pub fn pack_bram(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let csdecode_a = ctx.id("CSDECODE_A");
    let csdecode_b = ctx.id("CSDECODE_B");
    let csdecode_r = ctx.id("CSDECODE_R");
    let csdecode_w = ctx.id("CSDECODE_W");
    let weamux = ctx.id("WEAMUX");

    let mut rules: BTreeMap<Ident, XformRule> = BTreeMap::new();

    // True dual port: pins already match the hardware.
    rules.insert(
        ids.dp16k_mode,
        XformRule::to(ids.ebr_core)
            .set_param(ids.mode, Property::from_str_value("DP16K"))
            .parse_param(csdecode_a, csdecode_a, 3, 7)
            .parse_param(csdecode_b, csdecode_b, 3, 7),
    );

    // Pseudo dual port: write side onto A, read side onto B.
    let mut pdp = XformRule::to(ids.ebr_core)
        .set_param(ids.mode, Property::from_str_value("PDP16K"))
        .set_param(weamux, Property::from_str_value("1"))
        .parse_param(csdecode_r, csdecode_r, 3, 7)
        .parse_param(csdecode_w, csdecode_w, 3, 7)
        .port(ctx.id("CLKW"), ctx.id("CLKA"))
        .port(ctx.id("CLKR"), ctx.id("CLKB"))
        .port(ctx.id("CEW"), ctx.id("CEA"))
        .port(ctx.id("CER"), ctx.id("CEB"))
        .multiport(ctx.id("RST"), vec![ctx.id("RSTA"), ctx.id("RSTB")]);
    add_bus_xform(ctx, &mut pdp, "ADW", "ADA", 14, 0, 0);
    add_bus_xform(ctx, &mut pdp, "ADR", "ADB", 14, 0, 0);
    add_bus_xform(ctx, &mut pdp, "CSW", "CSA", 3, 0, 0);
    add_bus_xform(ctx, &mut pdp, "CSR", "CSB", 3, 0, 0);
    add_bus_xform(ctx, &mut pdp, "DI", "DIA", 18, 0, 0);
    add_bus_xform(ctx, &mut pdp, "DI", "DIB", 18, 18, 0);
    add_bus_xform(ctx, &mut pdp, "DO", "DOB", 18, 0, 0);
    add_bus_xform(ctx, &mut pdp, "DO", "DOA", 18, 18, 0);

    // Single-clock pseudo dual port: as PDP but one clock fans out to both.
    let mut pdpsc = pdp.clone();
    pdpsc.set_params.clear();
    pdpsc
        .set_params
        .push((ids.mode, Property::from_str_value("PDPSC16K")));
    pdpsc.set_params.push((weamux, Property::from_str_value("1")));
    pdpsc.port_xform.remove(&ctx.id("CLKW"));
    pdpsc.port_xform.remove(&ctx.id("CLKR"));
    pdpsc
        .port_multixform
        .insert(ctx.id("CLK"), vec![ctx.id("CLKA"), ctx.id("CLKB")]);

    rules.insert(ids.pdp16k_mode, pdp);
    rules.insert(ids.pdpsc16k_mode, pdpsc);

    generic_xform(ctx, &rules, sink, true)?;

    // Unique memory instance keys for the bitstream writer; 0 and 1 are
    // reserved.
    let mut wid = 2u64;
    let ebr_cells: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| c.cell_type == ids.ebr_core && !c.params.contains_key(&ids.wid))
        .map(|(&n, _)| n)
        .collect();
    for cell in ebr_cells {
        ctx.netlist
            .cell_mut(cell)
            .unwrap()
            .params
            .insert(ids.wid, Property::from_int(wid, 16));
        wid += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;
    use halcyon_device::PortDir;

    fn setup() -> (Context, DiagnosticSink) {
        (fabric::create("fab-4x4").unwrap().0, DiagnosticSink::new())
    }

    fn connect_in(ctx: &mut Context, cell: Ident, port: &str, net: &str) {
        let p = ctx.id(port);
        let n = ctx.id(net);
        let _ = ctx.netlist.create_net(n);
        ctx.netlist.add_port(cell, p, PortDir::Input).unwrap();
        ctx.netlist.connect_port(cell, p, n).unwrap();
    }

    #[test]
    fn pdp_renames_onto_hardware_ports() {
        let (mut ctx, sink) = setup();
        let mem = ctx.id("mem0");
        ctx.netlist.create_cell(mem, ctx.ids.pdp16k_mode).unwrap();
        connect_in(&mut ctx, mem, "CLKW", "wclk");
        connect_in(&mut ctx, mem, "CLKR", "rclk");
        connect_in(&mut ctx, mem, "RST", "rst");
        connect_in(&mut ctx, mem, "ADW0", "aw0");
        connect_in(&mut ctx, mem, "DI0", "d0");
        connect_in(&mut ctx, mem, "DI18", "d18");

        pack_bram(&mut ctx, &sink).unwrap();

        let c = ctx.cell(mem).unwrap();
        assert_eq!(c.cell_type, ctx.ids.ebr_core);
        assert_eq!(c.port_net(ctx.id("CLKA")), Some(ctx.id("wclk")));
        assert_eq!(c.port_net(ctx.id("CLKB")), Some(ctx.id("rclk")));
        // RST fans out to both halves.
        assert_eq!(c.port_net(ctx.id("RSTA")), Some(ctx.id("rst")));
        assert_eq!(c.port_net(ctx.id("RSTB")), Some(ctx.id("rst")));
        // Write data low half on DIA, high half on DIB.
        assert_eq!(c.port_net(ctx.id("DIA0")), Some(ctx.id("d0")));
        assert_eq!(c.port_net(ctx.id("DIB0")), Some(ctx.id("d18")));
        assert_eq!(c.port_net(ctx.id("ADA0")), Some(ctx.id("aw0")));
        assert_eq!(c.param_str(ctx.ids.mode, ""), "PDP16K");
    }

    #[test]
    fn csdecode_defaults_are_parsed() {
        let (mut ctx, sink) = setup();
        let mem = ctx.id("mem0");
        ctx.netlist.create_cell(mem, ctx.ids.dp16k_mode).unwrap();
        pack_bram(&mut ctx, &sink).unwrap();

        let c = ctx.cell(mem).unwrap();
        let cs_a = &c.params[&ctx.id("CSDECODE_A")];
        assert_eq!(cs_a.as_int64(), 7);
        assert_eq!(cs_a.size(), 3);
        assert_eq!(c.param_str(ctx.ids.mode, ""), "DP16K");
    }

    #[test]
    fn single_clock_variant_fans_clk_to_both() {
        let (mut ctx, sink) = setup();
        let mem = ctx.id("mem0");
        ctx.netlist.create_cell(mem, ctx.ids.pdpsc16k_mode).unwrap();
        connect_in(&mut ctx, mem, "CLK", "clk");
        pack_bram(&mut ctx, &sink).unwrap();

        let c = ctx.cell(mem).unwrap();
        assert_eq!(c.port_net(ctx.id("CLKA")), Some(ctx.id("clk")));
        assert_eq!(c.port_net(ctx.id("CLKB")), Some(ctx.id("clk")));
        assert_eq!(c.param_str(ctx.ids.mode, ""), "PDPSC16K");
    }

    #[test]
    fn write_ids_are_unique_from_two() {
        let (mut ctx, sink) = setup();
        for i in 0..3 {
            let mem = ctx.id(&format!("mem{i}"));
            ctx.netlist.create_cell(mem, ctx.ids.dp16k_mode).unwrap();
        }
        pack_bram(&mut ctx, &sink).unwrap();

        let mut wids: Vec<u64> = ctx
            .netlist
            .cells
            .values()
            .map(|c| c.param_int(ctx.ids.wid, 0))
            .collect();
        wids.sort();
        assert_eq!(wids, vec![2, 3, 4]);
    }
}
