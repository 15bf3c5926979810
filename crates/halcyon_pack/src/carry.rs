//! Carry chain expansion.
//!
//! Each `CCU2` arithmetic cell splits into two `SLICE_COMB` cells in CCU2
//! mode joined by an internal carry net. Chains are discovered from their
//! head (no driven `CIN`) and walked through `COUT`→`CIN` links; every
//! split cell gets an in-chain index that fixes its relative placement:
//! `z = ((k/2)<<3)|(k%2)` within a tile of four slices and `x = k/8`
//! tiles along the chain.

use crate::rules::parse_param_bits;
use halcyon_common::{Ident, PnrError, PnrResult};
use halcyon_device::PortDir;
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, Property};

/// Splits every carry chain into placed-constrained slice cells.
pub fn pack_carries(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();

    // Chain heads: carry cells whose CIN is not driven by another carry.
    let mut roots = Vec::new();
    for (&name, cell) in &ctx.netlist.cells {
        if cell.cell_type != ids.ccu2 {
            continue;
        }
        if let Some(cin) = cell.port_net(ids.cin) {
            if let Some(driver) = ctx.net(cin).unwrap().driver {
                let drv_type = ctx.cell(driver.cell).unwrap().cell_type;
                if drv_type != ids.ccu2 {
                    return Err(PnrError::user(format!(
                        "carry cell '{}' CIN net '{}' is driven by non-carry cell '{}'",
                        ctx.name_of(name),
                        ctx.name_of(cin),
                        ctx.name_of(driver.cell)
                    )));
                }
                continue;
            }
        }
        roots.push(name);
    }

    let mut chains = 0usize;
    for root in roots {
        let mut cursor = Some(root);
        let mut constr_base: Option<Ident> = None;
        let mut idx: i32 = 0;
        chains += 1;

        while let Some(ci) = cursor {
            if ctx.cell(ci).unwrap().cell_type != ids.ccu2 {
                return Err(PnrError::user(format!(
                    "found non-carry cell '{}' in carry chain",
                    ctx.name_of(ci)
                )));
            }

            // Split into two slice halves.
            let mut combs = [Ident::EMPTY; 2];
            for (half, slot) in combs.iter_mut().enumerate() {
                let name = ctx.id(&format!("{}$ccu2_comb[{half}]$", ctx.name_of(ci)));
                ctx.netlist
                    .create_cell(name, ids.slice_comb)
                    .map_err(|_| PnrError::user("carry split name collision"))?;
                ctx.netlist
                    .cell_mut(name)
                    .unwrap()
                    .params
                    .insert(ids.mode, Property::from_str_value("CCU2"));
                *slot = name;
            }

            for (half, comb) in combs.iter().enumerate() {
                for base in ["A", "B", "C", "D"] {
                    let src = ctx.id(&format!("{base}{half}"));
                    let dst = ctx.id(base);
                    ctx.netlist.move_port_to(ci, src, *comb, dst).unwrap();
                }
                let s = ctx.id(&format!("S{half}"));
                ctx.netlist.move_port_to(ci, s, *comb, ids.f).unwrap();
            }

            // External chain connections.
            ctx.netlist.move_port_to(ci, ids.cin, combs[0], ids.fci).unwrap();
            ctx.netlist.move_port_to(ci, ids.cout, combs[1], ids.fco).unwrap();

            // Parameters.
            if let Some(inject) = ctx.cell(ci).unwrap().params.get(&ids.inject).cloned() {
                ctx.netlist
                    .cell_mut(combs[0])
                    .unwrap()
                    .params
                    .insert(ids.inject, inject);
            }
            let init0 = parse_param_bits(ctx, ci, ids.init0, 16, 0)?;
            let init1 = parse_param_bits(ctx, ci, ids.init1, 16, 0)?;
            ctx.netlist.cell_mut(combs[0]).unwrap().params.insert(ids.init, init0);
            ctx.netlist.cell_mut(combs[1]).unwrap().params.insert(ids.init, init1);

            // The carry between the two halves.
            let int_cy = ctx.id(&format!("{}$ccu2_cy$", ctx.name_of(ci)));
            ctx.netlist.create_net(int_cy).unwrap();
            ctx.netlist.add_port(combs[0], ids.fco, PortDir::Output).unwrap();
            ctx.netlist.add_port(combs[1], ids.fci, PortDir::Input).unwrap();
            ctx.netlist.connect_port(combs[0], ids.fco, int_cy).unwrap();
            ctx.netlist.connect_port(combs[1], ids.fci, int_cy).unwrap();

            // Relative placement along the chain.
            for comb in combs {
                let z = idx % 8;
                {
                    let c = ctx.netlist.cell_mut(comb).unwrap();
                    c.constr_dz = ((z / 2) << 3) | (z % 2);
                    c.constr_abs_z = true;
                }
                match constr_base {
                    None => {
                        constr_base = Some(comb);
                        let c = ctx.netlist.cell_mut(comb).unwrap();
                        c.cluster = Some(comb);
                    }
                    Some(base) => {
                        {
                            let c = ctx.netlist.cell_mut(comb).unwrap();
                            c.constr_dx = idx / 8;
                            c.constr_dy = 0;
                            c.cluster = Some(base);
                        }
                        ctx.netlist.cell_mut(base).unwrap().constr_children.push(comb);
                    }
                }
                idx += 1;
            }

            ctx.netlist.remove_cell(ci).unwrap();

            // Follow the chain through FCO fanout.
            cursor = None;
            if let Some(fco) = ctx.cell(combs[1]).unwrap().port_net(ids.fco) {
                let users: Vec<_> = ctx.net(fco).unwrap().users().collect();
                if users.len() > 1 {
                    return Err(PnrError::user(format!(
                        "carry cell '{}' has multiple fanout on FCO",
                        ctx.name_of(combs[1])
                    )));
                }
                if let Some(user) = users.first() {
                    if user.port != ids.cin {
                        return Err(PnrError::user(format!(
                            "carry chain output of '{}' feeds port '{}' of '{}', not CIN",
                            ctx.name_of(combs[1]),
                            ctx.name_of(user.port),
                            ctx.name_of(user.cell)
                        )));
                    }
                    cursor = Some(user.cell);
                }
            }
        }
    }

    if chains > 0 {
        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 4),
            format!("expanded {chains} carry chain(s)"),
        ));
    }
    Ok(())
}
