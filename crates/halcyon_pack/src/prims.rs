//! Primitive normalization.
//!
//! Family primitives are renamed to their core variants and all bracketed
//! bus pins are flattened (`DI[3]` → `DI3`), so that the later table-driven
//! rules match one uniform spelling.

use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::Context;
use std::collections::BTreeMap;

fn strip_brackets(name: &str) -> String {
    name.chars().filter(|&c| c != '[' && c != ']').collect()
}

/// Renames a cell to its core variant and flattens its bus pins.
pub fn prim_to_core(ctx: &mut Context, cell: Ident, new_type: Ident) -> PnrResult<()> {
    ctx.netlist.cell_mut(cell).unwrap().cell_type = new_type;
    let ports: Vec<Ident> = ctx.cell(cell).unwrap().ports.keys().copied().collect();
    for port in ports {
        let flat = ctx.id(&strip_brackets(ctx.name_of(port)));
        if flat != port {
            ctx.netlist.rename_port(cell, port, flat).unwrap();
        }
    }
    Ok(())
}

/// Converts every known primitive to its core variant.
pub fn convert_prims(ctx: &mut Context, _sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let prim_map: BTreeMap<Ident, Ident> = [
        (ids.dp16k, ids.dp16k_mode),
        (ids.pdp16k, ids.pdp16k_mode),
        (ids.pdpsc16k, ids.pdpsc16k_mode),
        (ids.pll, ids.pll_core),
        (ids.osca, ids.osc_core),
    ]
    .into_iter()
    .collect();

    let matching: Vec<(Ident, Ident)> = ctx
        .netlist
        .cells
        .iter()
        .filter_map(|(&n, c)| prim_map.get(&c.cell_type).map(|&t| (n, t)))
        .collect();
    for (cell, new_type) in matching {
        prim_to_core(ctx, cell, new_type)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;
    use halcyon_device::PortDir;

    #[test]
    fn bram_prim_renamed_and_flattened() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        let cell = ctx.id("mem0");
        let net = ctx.id("d3");
        ctx.netlist.create_net(net).unwrap();
        ctx.netlist.create_cell(cell, ctx.ids.pdp16k).unwrap();
        let bracketed = ctx.id("DI[3]");
        ctx.netlist.add_port(cell, bracketed, PortDir::Input).unwrap();
        ctx.netlist.connect_port(cell, bracketed, net).unwrap();

        convert_prims(&mut ctx, &sink).unwrap();

        let c = ctx.cell(cell).unwrap();
        assert_eq!(c.cell_type, ctx.ids.pdp16k_mode);
        assert_eq!(c.port_net(ctx.id("DI3")), Some(net));
        assert!(!c.ports.contains_key(&bracketed));
    }

    #[test]
    fn pll_becomes_core() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        let cell = ctx.id("pll0");
        ctx.netlist.create_cell(cell, ctx.ids.pll).unwrap();
        convert_prims(&mut ctx, &sink).unwrap();
        assert_eq!(ctx.cell(cell).unwrap().cell_type, ctx.ids.pll_core);
    }

    #[test]
    fn unrelated_cells_untouched() {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let sink = DiagnosticSink::new();
        let cell = ctx.id("lut0");
        ctx.netlist.create_cell(cell, ctx.ids.lut4).unwrap();
        convert_prims(&mut ctx, &sink).unwrap();
        assert_eq!(ctx.cell(cell).unwrap().cell_type, ctx.ids.lut4);
    }
}
