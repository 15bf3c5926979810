//! Wide-function split: a 2:1 mux over two 4-LUTs becomes a slice pair.
//!
//! The `WIDEFN9` primitive holds two LUT functions and a select. It splits
//! into two `SLICE_COMB` cells: the low half keeps the select (`SEL`) and
//! the mux output (`OFX`), the high half's `F` feeds the low half's `F1`
//! over the dedicated path, and both halves are constrained into one
//! cluster one z apart.

use crate::helpers::cells_of_type;
use crate::rules::parse_param_bits;
use halcyon_common::{Ident, PnrResult};
use halcyon_device::PortDir;
use halcyon_diagnostics::DiagnosticSink;
use halcyon_netlist::Context;

/// Splits every `WIDEFN9` into a constrained `SLICE_COMB` pair.
pub fn pack_widefn(ctx: &mut Context, _sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    for ci in cells_of_type(ctx, ids.widefn9) {
        let mut combs = [Ident::EMPTY; 2];
        for (half, slot) in combs.iter_mut().enumerate() {
            let name = ctx.id(&format!("{}$widefn_comb[{half}]$", ctx.name_of(ci)));
            ctx.netlist.create_cell(name, ids.slice_comb).unwrap();
            *slot = name;
        }

        for (half, comb) in combs.iter().enumerate() {
            for base in ["A", "B", "C", "D"] {
                let src = ctx.id(&format!("{base}{half}"));
                ctx.netlist.move_port_to(ci, src, *comb, ctx.id(base)).unwrap();
            }
        }
        ctx.netlist.move_port_to(ci, ids.sel, combs[0], ids.sel).unwrap();
        ctx.netlist.move_port_to(ci, ids.z, combs[0], ids.ofx).unwrap();

        // The upper LUT's output enters the mux over F1.
        let f1 = ctx.id(&format!("{}$widefn_f1$", ctx.name_of(ci)));
        ctx.netlist.create_net(f1).unwrap();
        ctx.netlist.add_port(combs[0], ids.f1, PortDir::Input).unwrap();
        ctx.netlist.add_port(combs[1], ids.f, PortDir::Output).unwrap();
        ctx.netlist.connect_port(combs[1], ids.f, f1).unwrap();
        ctx.netlist.connect_port(combs[0], ids.f1, f1).unwrap();

        let init0 = parse_param_bits(ctx, ci, ids.init0, 16, 0)?;
        let init1 = parse_param_bits(ctx, ci, ids.init1, 16, 0)?;
        ctx.netlist.cell_mut(combs[0]).unwrap().params.insert(ids.init, init0);
        ctx.netlist.cell_mut(combs[1]).unwrap().params.insert(ids.init, init1);

        {
            let c = ctx.netlist.cell_mut(combs[0]).unwrap();
            c.cluster = Some(combs[0]);
            c.constr_children.push(combs[1]);
        }
        {
            let c = ctx.netlist.cell_mut(combs[1]).unwrap();
            c.cluster = Some(combs[0]);
            c.constr_dx = 0;
            c.constr_dy = 0;
            c.constr_dz = 1;
            c.constr_abs_z = false;
        }

        ctx.netlist.remove_cell(ci).unwrap();
    }
    Ok(())
}
