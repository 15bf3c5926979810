//! Derived clock constraints.
//!
//! User-supplied clock periods propagate through the clock network: a DCC
//! copies its input period to its output, a DCS takes the minimum of its
//! two inputs, an oscillator emits its fixed divided frequencies, and a
//! PLL scales its reference by the feedback and output dividers. The pass
//! iterates to a fixed point (with a safety cap) and never overrides a
//! constraint the user supplied directly.

use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::Context;
use std::collections::HashSet;

/// Fixed-point iteration cap.
const MAX_ITERS: usize = 10;

/// Oscillator high-frequency base, in MHz.
const OSC_HF_MHZ: f64 = 450.0;
/// Oscillator low-frequency output, in Hz.
const OSC_LF_HZ: f64 = 32_000.0;

fn get_period(ctx: &Context, cell: Ident, port: Ident) -> Option<f64> {
    let net = ctx.cell(cell).ok()?.port_net(port)?;
    ctx.net(net).ok()?.clock_constraint
}

/// Propagates the user clock constraints through clock-shaping cells.
pub fn generate_constraints(ctx: &mut Context, sink: &DiagnosticSink) -> PnrResult<()> {
    let ids = ctx.ids.clone();
    let clkop = ctx.id("CLKOP");
    let clkos = ctx.id("CLKOS");
    let div_clkop = ctx.id("DIV_CLKOP");
    let div_clkos = ctx.id("DIV_CLKOS");
    let fbk_div = ctx.id("FBK_DIV");
    let hf_clk_div = ctx.id("HF_CLK_DIV");

    // Anything constrained before this pass came from the user and wins.
    let user_constrained: HashSet<Ident> = ctx
        .netlist
        .nets
        .iter()
        .filter(|(_, n)| n.clock_constraint.is_some())
        .map(|(&n, _)| n)
        .collect();

    let mut set_period = |ctx: &mut Context, cell: Ident, port: Ident, period: f64| -> bool {
        let Some(net) = ctx.cell(cell).ok().and_then(|c| c.port_net(port)) else {
            return false;
        };
        if user_constrained.contains(&net) {
            let kept = ctx.net(net).unwrap().clock_constraint.unwrap();
            if (kept - period).abs() > 1e-9 {
                sink.emit(Diagnostic::info(
                    DiagnosticCode::new(Category::Timing, 5),
                    format!(
                        "keeping user constraint of {:.1} MHz on net '{}' (derived {:.1} MHz)",
                        1000.0 / kept,
                        ctx.name_of(net),
                        1000.0 / period
                    ),
                ));
            }
            return false;
        }
        let n = ctx.netlist.nets.get_mut(&net).unwrap();
        let changed = match n.clock_constraint {
            Some(existing) => (existing - period).abs() > 1e-9,
            None => true,
        };
        if changed {
            n.clock_constraint = Some(period);
        }
        changed
    };

    sink.emit(Diagnostic::info(
        DiagnosticCode::new(Category::Timing, 4),
        "generating derived timing constraints".to_string(),
    ));

    for _ in 0..MAX_ITERS {
        let mut changed = false;
        let cells: Vec<Ident> = ctx.netlist.cells.keys().copied().collect();
        for cell in cells {
            let ty = ctx.cell(cell).unwrap().cell_type;
            if ty == ids.dcc {
                if let Some(period) = get_period(ctx, cell, ids.clki) {
                    changed |= set_period(ctx, cell, ids.clko, period);
                }
            } else if ty == ids.dcs {
                let p0 = get_period(ctx, cell, ids.clk0);
                let p1 = get_period(ctx, cell, ids.clk1);
                let derived = match (p0, p1) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (Some(a), None) => Some(a),
                    (None, Some(b)) => Some(b),
                    (None, None) => None,
                };
                if let Some(period) = derived {
                    changed |= set_period(ctx, cell, ids.dcsout, period);
                }
            } else if ty == ids.osc_core {
                let div = ctx.cell(cell).unwrap().param_int(hf_clk_div, 0);
                let hf_period = (1000.0 / OSC_HF_MHZ) * (div as f64 + 1.0);
                changed |= set_period(ctx, cell, ids.hfclkout, hf_period);
                changed |= set_period(ctx, cell, ids.lfclkout, 1.0e9 / OSC_LF_HZ);
            } else if ty == ids.pll_core {
                if let Some(period_in) = get_period(ctx, cell, ids.refck) {
                    let fbk = ctx.cell(cell).unwrap().param_int(fbk_div, 1).max(1) as f64;
                    for (out, div_key) in [(clkop, div_clkop), (clkos, div_clkos)] {
                        let div = ctx.cell(cell).unwrap().param_int(div_key, 1).max(1) as f64;
                        changed |= set_period(ctx, cell, out, period_in * fbk / div);
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;
    use halcyon_device::PortDir;
    use halcyon_netlist::Property;

    fn setup() -> (Context, DiagnosticSink) {
        (fabric::create("fab-4x4").unwrap().0, DiagnosticSink::new())
    }

    fn connect(ctx: &mut Context, cell: Ident, port: Ident, net: &str, dir: PortDir) -> Ident {
        let n = ctx.id(net);
        let _ = ctx.netlist.create_net(n);
        ctx.netlist.add_port(cell, port, dir).unwrap();
        ctx.netlist.connect_port(cell, port, n).unwrap();
        n
    }

    #[test]
    fn dcc_copies_its_input_period() {
        let (mut ctx, sink) = setup();
        let dcc = ctx.id("dcc0");
        ctx.netlist.create_cell(dcc, ctx.ids.dcc).unwrap();
        let clki_id = ctx.ids.clki;
        let clko_id = ctx.ids.clko;
        let clki = connect(&mut ctx, dcc, clki_id, "clk_in", PortDir::Input);
        let clko = connect(&mut ctx, dcc, clko_id, "clk_out", PortDir::Output);
        ctx.netlist.net_mut(clki).unwrap().clock_constraint = Some(10.0);

        generate_constraints(&mut ctx, &sink).unwrap();
        assert_eq!(ctx.net(clko).unwrap().clock_constraint, Some(10.0));
    }

    #[test]
    fn dcs_takes_the_minimum() {
        let (mut ctx, sink) = setup();
        let dcs = ctx.id("dcs0");
        ctx.netlist.create_cell(dcs, ctx.ids.dcs).unwrap();
        let clk0_id = ctx.ids.clk0;
        let clk1_id = ctx.ids.clk1;
        let dcsout_id = ctx.ids.dcsout;
        let c0 = connect(&mut ctx, dcs, clk0_id, "fast", PortDir::Input);
        let c1 = connect(&mut ctx, dcs, clk1_id, "slow", PortDir::Input);
        let out = connect(&mut ctx, dcs, dcsout_id, "sel_out", PortDir::Output);
        ctx.netlist.net_mut(c0).unwrap().clock_constraint = Some(8.0);
        ctx.netlist.net_mut(c1).unwrap().clock_constraint = Some(20.0);

        generate_constraints(&mut ctx, &sink).unwrap();
        assert_eq!(ctx.net(out).unwrap().clock_constraint, Some(8.0));
    }

    #[test]
    fn oscillator_emits_fixed_outputs() {
        let (mut ctx, sink) = setup();
        let osc = ctx.id("osc0");
        ctx.netlist.create_cell(osc, ctx.ids.osc_core).unwrap();
        let hf_clk_div_id = ctx.id("HF_CLK_DIV");
        ctx.netlist
            .cell_mut(osc)
            .unwrap()
            .params
            .insert(hf_clk_div_id, Property::from_int(8, 8));
        let hfclkout_id = ctx.ids.hfclkout;
        let lfclkout_id = ctx.ids.lfclkout;
        let hf = connect(&mut ctx, osc, hfclkout_id, "hf", PortDir::Output);
        let lf = connect(&mut ctx, osc, lfclkout_id, "lf", PortDir::Output);

        generate_constraints(&mut ctx, &sink).unwrap();
        let hf_period = ctx.net(hf).unwrap().clock_constraint.unwrap();
        assert!((hf_period - (1000.0 / 450.0) * 9.0).abs() < 1e-9);
        assert_eq!(ctx.net(lf).unwrap().clock_constraint, Some(31_250.0));
    }

    #[test]
    fn pll_scales_through_a_dcc_chain() {
        let (mut ctx, sink) = setup();
        let pll = ctx.id("pll0");
        ctx.netlist.create_cell(pll, ctx.ids.pll_core).unwrap();
        let fbk_div_id = ctx.id("FBK_DIV");
        ctx.netlist
            .cell_mut(pll)
            .unwrap()
            .params
            .insert(fbk_div_id, Property::from_int(2, 8));
        let div_clkop_id = ctx.id("DIV_CLKOP");
        ctx.netlist
            .cell_mut(pll)
            .unwrap()
            .params
            .insert(div_clkop_id, Property::from_int(4, 8));
        let refck_id = ctx.ids.refck;
        let clkop_id = ctx.id("CLKOP");
        let refck = connect(&mut ctx, pll, refck_id, "ref", PortDir::Input);
        let clkop = connect(&mut ctx, pll, clkop_id, "pll_out", PortDir::Output);
        ctx.netlist.net_mut(refck).unwrap().clock_constraint = Some(20.0);

        // A DCC behind the PLL picks the derived period up on the next
        // iteration of the fixed point.
        let dcc = ctx.id("dcc0");
        ctx.netlist.create_cell(dcc, ctx.ids.dcc).unwrap();
        ctx.netlist.add_port(dcc, ctx.ids.clki, PortDir::Input).unwrap();
        ctx.netlist.connect_port(dcc, ctx.ids.clki, clkop).unwrap();
        let clko_id = ctx.ids.clko;
        let glb = connect(&mut ctx, dcc, clko_id, "glb", PortDir::Output);

        generate_constraints(&mut ctx, &sink).unwrap();
        // 20 ns × 2 / 4 = 10 ns.
        assert_eq!(ctx.net(clkop).unwrap().clock_constraint, Some(10.0));
        assert_eq!(ctx.net(glb).unwrap().clock_constraint, Some(10.0));
    }

    #[test]
    fn user_constraints_are_never_overridden() {
        let (mut ctx, sink) = setup();
        let dcc = ctx.id("dcc0");
        ctx.netlist.create_cell(dcc, ctx.ids.dcc).unwrap();
        let clki_id = ctx.ids.clki;
        let clko_id = ctx.ids.clko;
        let clki = connect(&mut ctx, dcc, clki_id, "clk_in", PortDir::Input);
        let clko = connect(&mut ctx, dcc, clko_id, "clk_out", PortDir::Output);
        ctx.netlist.net_mut(clki).unwrap().clock_constraint = Some(10.0);
        // The user pinned the output to something else.
        ctx.netlist.net_mut(clko).unwrap().clock_constraint = Some(12.5);

        generate_constraints(&mut ctx, &sink).unwrap();
        assert_eq!(ctx.net(clko).unwrap().clock_constraint, Some(12.5));
        assert!(sink
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("keeping user constraint")));
    }

    #[test]
    fn terminates_without_clock_cells() {
        let (mut ctx, sink) = setup();
        generate_constraints(&mut ctx, &sink).unwrap();
    }
}
