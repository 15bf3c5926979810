//! LUT+FF fusion.
//!
//! A flip-flop whose data input is the sole load of a LUT output can share
//! the LUT's slice: the pair is co-constrained two z slots apart, the FF's
//! data moves from the routed `M` path onto the direct `DI` path, and the
//! FF's control set is recorded on the cluster so later candidates joining
//! the same cluster must match it. Within carry clusters a random
//! rejection keeps the clusters from growing past the given ratio.

use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, Property};
use halcyon_place::FfControlSet;
use std::collections::HashMap;

/// Fuses fanout-1 LUT→FF pairs into shared slices.
pub fn pack_lutffs(ctx: &mut Context, sink: &DiagnosticSink, carry_ratio: f64) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let mut cluster_ffinfo: HashMap<Ident, FfControlSet> = HashMap::new();
    let mut num_pair = 0usize;
    let mut num_glue = 0usize;

    let ffs: Vec<Ident> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| c.cell_type == ids.slice_ff)
        .map(|(&n, _)| n)
        .collect();

    for ff in ffs {
        // All FF data arrives on M at this stage.
        let Some(di_net) = ctx.cell(ff).unwrap().port_net(ids.m) else {
            continue;
        };
        let Some(driver) = ctx.net(di_net).unwrap().driver else {
            continue;
        };
        if ctx.net(di_net).unwrap().user_count() != 1 {
            continue;
        }
        let lut = driver.cell;
        if ctx.cell(lut).unwrap().cell_type != ids.slice_comb {
            continue;
        }
        if driver.port != ids.f && driver.port != ids.ofx {
            continue;
        }
        // The FF must not already use the direct path or sit in a cluster.
        if ctx.cell(ff).unwrap().port_net(ids.di).is_some() {
            continue;
        }
        if ctx.cell(ff).unwrap().cluster.is_some() {
            continue;
        }
        // Only plain logic and carry LUTs can take a partner.
        let mode = ctx.cell(lut).unwrap().param_str(ids.mode, "LOGIC");
        if mode != "LOGIC" && mode != "CCU2" {
            continue;
        }

        let ffinfo = FfControlSet::from_cell(ctx.cell(ff).unwrap(), &ids);

        match ctx.cell(lut).unwrap().cluster {
            None => {
                // A free LUT: start a new cluster.
                {
                    let l = ctx.netlist.cell_mut(lut).unwrap();
                    l.cluster = Some(lut);
                    l.constr_children.push(ff);
                }
                let f = ctx.netlist.cell_mut(ff).unwrap();
                f.cluster = Some(lut);
                f.constr_dx = 0;
                f.constr_dy = 0;
                f.constr_dz = 2;
                f.constr_abs_z = false;
                num_pair += 1;
            }
            Some(cluster) => {
                // Joining an existing cluster: the first FF's control set
                // binds all later candidates.
                if let Some(existing) = cluster_ffinfo.get(&cluster) {
                    if *existing != ffinfo {
                        continue;
                    }
                }
                // Keep carry clusters from hoarding FFs.
                if mode == "CCU2" {
                    let r = ctx.rng.next_bounded(1000) as f64 * 1e-3;
                    if r > carry_ratio {
                        continue;
                    }
                }
                let (ldx, ldy, ldz, labs) = {
                    let l = ctx.cell(lut).unwrap();
                    (l.constr_dx, l.constr_dy, l.constr_dz, l.constr_abs_z)
                };
                {
                    let f = ctx.netlist.cell_mut(ff).unwrap();
                    f.cluster = Some(cluster);
                    f.constr_dx = ldx;
                    f.constr_dy = ldy;
                    f.constr_dz = ldz + 2;
                    f.constr_abs_z = labs;
                }
                ctx.netlist
                    .cell_mut(cluster)
                    .unwrap()
                    .constr_children
                    .push(ff);
                num_glue += 1;
            }
        }

        // Take the direct LUT→FF path.
        ctx.netlist.rename_port(ff, ids.m, ids.di).unwrap();
        ctx.netlist
            .cell_mut(ff)
            .unwrap()
            .params
            .insert(ids.sel, Property::from_str_value("DL"));

        let cluster = ctx.cell(ff).unwrap().cluster.unwrap();
        cluster_ffinfo.entry(cluster).or_insert(ffinfo);
    }

    sink.emit(Diagnostic::info(
        DiagnosticCode::new(Category::Pack, 30),
        format!("created {num_pair} LUT+FF pair(s), extended {num_glue} cluster(s)"),
    ));
    Ok(())
}
