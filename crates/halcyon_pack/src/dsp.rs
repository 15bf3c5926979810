//! DSP macro expansion.
//!
//! Each high-level multiplier macro expands into a fixed topology of DSP
//! primitives: 9×9 pre-add/multiply tile pairs, 18-bit multipliers, 18×36
//! multipliers, and output pipeline registers. Macro ports are copied
//! bus-slice-wise onto the primitives; the signed-ness controls apply only
//! to the most-significant slice; the register-bypass parameters propagate
//! into each primitive; and the whole expansion is one relative-placement
//! cluster rooted at the first pre-adder.

use crate::helpers::copy_port_bus;
use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, Property};

/// Shape of one DSP macro type.
struct DspMacroType {
    n9x9: usize,
    n18x18: usize,
    n18x36: usize,
    /// Accumulators; when present they take over the output bus and no
    /// pipeline registers are created.
    acc54: usize,
    b_width: usize,
    z_width: usize,
}

fn macro_shape(ctx: &Context, ty: Ident) -> Option<DspMacroType> {
    let ids = &ctx.ids;
    if ty == ids.mult9x9 {
        Some(DspMacroType {
            n9x9: 1,
            n18x18: 0,
            n18x36: 0,
            acc54: 0,
            b_width: 9,
            z_width: 18,
        })
    } else if ty == ids.mult18x18 {
        Some(DspMacroType {
            n9x9: 2,
            n18x18: 1,
            n18x36: 0,
            acc54: 0,
            b_width: 18,
            z_width: 36,
        })
    } else if ty == ids.mult18x36 {
        Some(DspMacroType {
            n9x9: 4,
            n18x18: 2,
            n18x36: 1,
            acc54: 0,
            b_width: 36,
            z_width: 54,
        })
    } else if ty == ids.multaddsub18x18 {
        Some(DspMacroType {
            n9x9: 2,
            n18x18: 1,
            n18x36: 0,
            acc54: 1,
            b_width: 18,
            z_width: 54,
        })
    } else if ty == ids.mult36x36 {
        Some(DspMacroType {
            n9x9: 8,
            n18x18: 4,
            n18x36: 2,
            acc54: 0,
            b_width: 36,
            z_width: 72,
        })
    } else {
        None
    }
}

/// Creates one DSP primitive inside the macro's cluster at (dx, dz).
fn create_dsp_cell(
    ctx: &mut Context,
    macro_name: Ident,
    prim_type: Ident,
    root: Option<Ident>,
    dx: i32,
    dz: i32,
) -> Ident {
    let name = ctx.id(&format!(
        "{}${}_{}_{}$",
        ctx.name_of(macro_name),
        ctx.name_of(prim_type),
        dx,
        dz
    ));
    ctx.netlist.create_cell(name, prim_type).unwrap();
    {
        let c = ctx.netlist.cell_mut(name).unwrap();
        c.constr_dx = dx;
        c.constr_dy = 0;
        c.constr_dz = dz;
        c.constr_abs_z = true;
    }
    match root {
        None => {
            let c = ctx.netlist.cell_mut(name).unwrap();
            c.cluster = Some(name);
        }
        Some(root) => {
            ctx.netlist.cell_mut(name).unwrap().cluster = Some(root);
            ctx.netlist.cell_mut(root).unwrap().constr_children.push(name);
        }
    }
    name
}

fn copy_param(ctx: &mut Context, from: Ident, key: Ident, to: Ident, to_key: Ident) {
    if let Some(value) = ctx.cell(from).unwrap().params.get(&key).cloned() {
        ctx.netlist.cell_mut(to).unwrap().params.insert(to_key, value);
    }
}

fn copy_port(ctx: &mut Context, from: Ident, port: Ident, to: Ident, to_port: Ident) {
    let _ = ctx.netlist.copy_port_to(from, port, to, to_port);
}

/// Expands every DSP macro into its primitive topology.
pub fn pack_dsps(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let reginputa = ctx.id("REGINPUTA");
    let reginputb = ctx.id("REGINPUTB");
    let regoutput = ctx.id("REGOUTPUT");
    let regbypsa1 = ctx.id("REGBYPSA1");
    let regbypsbr0 = ctx.id("REGBYPSBR0");
    let regbyps = ctx.id("REGBYPS");
    let signeda = ctx.id("SIGNEDA");
    let signedb = ctx.id("SIGNEDB");
    let cea = ctx.id("CEA");
    let ceb = ctx.id("CEB");
    let cep = ctx.id("CEP");
    let rsta = ctx.id("RSTA");
    let rstb = ctx.id("RSTB");
    let rstp = ctx.id("RSTP");
    let addsub = ctx.id("ADDSUB");
    let loadc = ctx.id("LOADC");

    let macros: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| macro_shape(ctx, c.cell_type).is_some())
        .map(|(&n, _)| n)
        .collect();

    for ci in macros {
        let mt = macro_shape(ctx, ctx.cell(ci).unwrap().cell_type).unwrap();
        let n_reg18 = if mt.acc54 > 0 { 0 } else { mt.z_width / 18 };

        // Constituent cells, the first pre-adder rooting the cluster.
        let mut preadd9 = Vec::with_capacity(mt.n9x9);
        let mut mult9 = Vec::with_capacity(mt.n9x9);
        for i in 0..mt.n9x9 {
            let dx = ((i / 4) * 4 + (i / 2) % 2) as i32;
            let root = preadd9.first().copied();
            preadd9.push(create_dsp_cell(
                ctx,
                ci,
                ids.preadd9_core,
                root,
                dx,
                (i % 2) as i32,
            ));
            let root = Some(preadd9[0]);
            mult9.push(create_dsp_cell(
                ctx,
                ci,
                ids.mult9_core,
                root,
                dx,
                (i % 2) as i32 + 2,
            ));
        }
        let root = preadd9[0];
        let mut mult18 = Vec::with_capacity(mt.n18x18);
        for i in 0..mt.n18x18 {
            let dx = ((i / 2) * 4 + i % 2) as i32;
            mult18.push(create_dsp_cell(ctx, ci, ids.mult18_core, Some(root), dx, 4));
        }
        let mut mult18x36 = Vec::with_capacity(mt.n18x36);
        for i in 0..mt.n18x36 {
            mult18x36.push(create_dsp_cell(
                ctx,
                ci,
                ids.mult18x36_core,
                Some(root),
                (i * 4 + 2) as i32,
                4,
            ));
        }
        let mut reg18 = Vec::with_capacity(n_reg18);
        for i in 0..n_reg18 {
            let dx = ((i / 4) * 4 + 2) as i32;
            reg18.push(create_dsp_cell(
                ctx,
                ci,
                ids.reg18_core,
                Some(root),
                dx,
                (i % 4) as i32,
            ));
        }
        let mut acc54 = Vec::with_capacity(mt.acc54);
        for i in 0..mt.acc54 {
            acc54.push(create_dsp_cell(
                ctx,
                ci,
                ids.acc54_core,
                Some(root),
                (i * 4 + 2) as i32,
                5,
            ));
        }

        // Configure the 9×9 pre-add/multiply pairs.
        for i in 0..mt.n9x9 {
            let b_start = (9 * i) % mt.b_width;
            let a_start = 9 * (i % 2) + 18 * (i / 4);

            copy_port_bus(ctx, ci, "B", b_start, true, preadd9[i], "B", 0, false, 9)?;
            copy_port_bus(ctx, ci, "A", a_start, true, mult9[i], "A", 0, false, 9)?;

            copy_port(ctx, ci, ids.clk, mult9[i], ids.clk);
            copy_port(ctx, ci, cea, mult9[i], cea);
            copy_port(ctx, ci, rsta, mult9[i], rsta);
            copy_port(ctx, ci, ids.clk, preadd9[i], ids.clk);
            copy_port(ctx, ci, ceb, preadd9[i], ceb);
            copy_port(ctx, ci, rstb, preadd9[i], rstb);

            copy_param(ctx, ci, reginputa, mult9[i], regbypsa1);
            copy_param(ctx, ci, reginputb, preadd9[i], regbypsbr0);

            // Signed-ness bits only on the most-significant slice.
            if i == mt.n9x9 - 1 {
                copy_port(ctx, ci, signeda, mult9[i], signeda);
                copy_port(ctx, ci, signedb, preadd9[i], signedb);
            }
        }

        for &m18 in &mult18 {
            copy_port(ctx, ci, ids.clk, m18, ids.clk);
        }
        for &m36 in &mult18x36 {
            copy_port(ctx, ci, ids.clk, m36, ids.clk);
        }

        // Output registers carry the result bus, 18 bits per slice.
        for (i, &reg) in reg18.iter().enumerate() {
            copy_port(ctx, ci, ids.clk, reg, ids.clk);
            copy_port(ctx, ci, cep, reg, cep);
            copy_port(ctx, ci, rstp, reg, rstp);
            copy_param(ctx, ci, regoutput, reg, regbyps);
            for j in 0..18 {
                let src = ctx.id(&format!("Z[{}]", 18 * i + j));
                let dst = ctx.id(&format!("PP{j}"));
                if ctx.cell(ci).unwrap().ports.contains_key(&src) {
                    ctx.netlist.move_port_to(ci, src, reg, dst).unwrap();
                }
            }
        }

        // Accumulator variants take the whole sum bus plus the add/sub
        // controls instead of pipeline registers.
        for &acc in &acc54 {
            copy_port(ctx, ci, ids.clk, acc, ids.clk);
            copy_port(ctx, ci, cep, acc, cep);
            copy_port(ctx, ci, rstp, acc, rstp);
            copy_port(ctx, ci, addsub, acc, addsub);
            copy_port(ctx, ci, loadc, acc, loadc);
            copy_param(ctx, ci, regoutput, acc, regbyps);
            for j in 0..mt.z_width {
                let src = ctx.id(&format!("Z[{j}]"));
                let dst = ctx.id(&format!("SUM{j}"));
                if ctx.cell(ci).unwrap().ports.contains_key(&src) {
                    ctx.netlist.move_port_to(ci, src, acc, dst).unwrap();
                }
            }
        }

        ctx.netlist.remove_cell(ci).unwrap();
        sink.emit(Diagnostic::info(
            DiagnosticCode::new(Category::Pack, 3),
            format!(
                "expanded DSP macro '{}' into {} primitives",
                ctx.name_of(ci),
                2 * mt.n9x9 + mt.n18x18 + mt.n18x36 + mt.acc54 + n_reg18
            ),
        ));
    }
    Ok(())
}
