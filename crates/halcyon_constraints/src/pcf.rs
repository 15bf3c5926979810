//! PCF: line-oriented physical constraints.
//!
//! Commands: `set_io <cell> <pkg-pin>`, `set_frequency <net> <MHz>`,
//! `set_cell <cell> <bel>`, `set_pseudo_plug --port <p:wire> --timing
//! <in:out:min:max>`, and the regex prohibit family (`prohibit_pip`,
//! `prohibit_wire`, `prohibit_bel`) that reserves matching resources so
//! neither the placer nor the router can use them.

use halcyon_arch::Architecture;
use halcyon_common::{Frequency, Ident, PnrError, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, PlaceStrength, Property};
use regex::Regex;

fn warn(sink: &DiagnosticSink, line: u32, message: String) {
    sink.emit(Diagnostic::warning(DiagnosticCode::new(Category::Constraint, 30), message).at_line(line));
}

fn set_bel_attr_by_name(ctx: &mut Context, cell: Ident, bel: halcyon_device::BelId) {
    let name = ctx.name_of(ctx.device.bel(bel).name).to_string();
    let key = ctx.ids.bel;
    ctx.netlist
        .cell_mut(cell)
        .expect("cell checked")
        .attrs
        .insert(key, Property::from_str_value(name));
}

/// The net used to reserve prohibited wires and pips.
fn prohibit_net(ctx: &mut Context) -> Ident {
    let name = ctx.id("$prohibit$");
    if ctx.netlist.nets.contains_key(&name) {
        return name;
    }
    ctx.netlist.create_net(name).expect("fresh prohibit net");
    name
}

fn compile_pattern(pattern: &str, line: u32) -> PnrResult<Regex> {
    Regex::new(pattern).map_err(|e| {
        PnrError::user(format!(
            "invalid regex pattern '{pattern}' on line {line}: {e}"
        ))
    })
}

fn cmd_prohibit_wire(ctx: &mut Context, pattern: &str, line: u32) -> PnrResult<usize> {
    let re = compile_pattern(pattern, line)?;
    let net = prohibit_net(ctx);
    let matching: Vec<_> = ctx
        .device
        .wires()
        .filter(|&w| re.is_match(ctx.name_of(ctx.device.wire(w).name)))
        .collect();
    let mut count = 0;
    for wire in matching {
        if ctx.bindings.net_on_wire(wire).is_none() {
            ctx.bind_wire(wire, net, PlaceStrength::User)
                .expect("wire checked free");
            count += 1;
        }
    }
    Ok(count)
}

fn cmd_prohibit_pip(ctx: &mut Context, pattern: &str, line: u32) -> PnrResult<usize> {
    let re = compile_pattern(pattern, line)?;
    let net = prohibit_net(ctx);
    // Pips are addressed by their `src->dst` wire-name form.
    let matching: Vec<_> = ctx
        .device
        .pips()
        .filter(|&p| {
            let pip = ctx.device.pip(p);
            let name = format!(
                "{}->{}",
                ctx.name_of(ctx.device.wire(pip.src).name),
                ctx.name_of(ctx.device.wire(pip.dst).name)
            );
            re.is_match(&name)
        })
        .collect();
    let mut count = 0;
    for pip in matching {
        let dst = ctx.device.pip(pip).dst;
        if ctx.bindings.net_on_pip(pip).is_none() && ctx.bindings.net_on_wire(dst).is_none() {
            ctx.bind_pip(pip, net, PlaceStrength::User)
                .expect("pip checked free");
            count += 1;
        }
    }
    Ok(count)
}

fn cmd_prohibit_bel(ctx: &mut Context, pattern: &str, line: u32) -> PnrResult<usize> {
    let re = compile_pattern(pattern, line)?;
    let matching: Vec<_> = ctx
        .device
        .bels()
        .filter(|&b| re.is_match(ctx.name_of(ctx.device.bel(b).name)))
        .collect();
    let mut count = 0;
    for bel in matching {
        if ctx.bindings.cell_at(bel).is_some() {
            continue;
        }
        let bel_type = ctx.device.bel(bel).bel_type;
        let blocker = ctx.id(&format!(
            "$prohibit_bel_{}$",
            ctx.name_of(ctx.device.bel(bel).name)
        ));
        ctx.netlist
            .create_cell(blocker, bel_type)
            .map_err(|_| PnrError::user(format!("duplicate prohibit_bel pattern on line {line}")))?;
        ctx.bind_bel(bel, blocker, PlaceStrength::User)
            .expect("bel checked free");
        count += 1;
    }
    Ok(count)
}

/// Parses a PCF source into the context.
pub fn parse_pcf<A: Architecture + ?Sized>(
    ctx: &mut Context,
    arch: &A,
    source: &str,
    sink: &DiagnosticSink,
) -> PnrResult<()> {
    for (lineno, raw) in source.lines().enumerate() {
        let line_num = lineno as u32 + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let args: Vec<&str> = words[1..]
            .iter()
            .copied()
            .filter(|w| !w.starts_with("--"))
            .collect();
        match words[0] {
            "set_io" => {
                let [cell, pin] = args[..] else {
                    return Err(PnrError::user(format!(
                        "set_io expects <cell> <pin> on line {line_num}"
                    )));
                };
                let Some(cell_id) = ctx.interner.get(cell).filter(|c| ctx.netlist.cells.contains_key(c))
                else {
                    warn(sink, line_num, format!("set_io: no cell named '{cell}'"));
                    continue;
                };
                let Some(bel) = arch.package_pin_bel(pin) else {
                    return Err(PnrError::user(format!(
                        "set_io: unknown package pin '{pin}' on line {line_num}"
                    )));
                };
                set_bel_attr_by_name(ctx, cell_id, bel);
            }
            "set_frequency" => {
                let [net, mhz] = args[..] else {
                    return Err(PnrError::user(format!(
                        "set_frequency expects <net> <MHz> on line {line_num}"
                    )));
                };
                let Some(net_id) = ctx.interner.get(net).filter(|n| ctx.netlist.nets.contains_key(n))
                else {
                    warn(sink, line_num, format!("set_frequency: no net named '{net}'"));
                    continue;
                };
                let freq = mhz
                    .parse::<f64>()
                    .map(Frequency::from_mhz)
                    .map_err(|_| {
                        PnrError::user(format!(
                            "set_frequency: bad value '{mhz}' on line {line_num}"
                        ))
                    })?;
                ctx.netlist.net_mut(net_id).unwrap().clock_constraint = Some(freq.period_ns());
            }
            "set_cell" => {
                let [cell, bel_name] = args[..] else {
                    return Err(PnrError::user(format!(
                        "set_cell expects <cell> <bel> on line {line_num}"
                    )));
                };
                let Some(cell_id) = ctx.interner.get(cell).filter(|c| ctx.netlist.cells.contains_key(c))
                else {
                    warn(sink, line_num, format!("set_cell: no cell named '{cell}'"));
                    continue;
                };
                let Some(bel) = ctx.interner.get(bel_name).and_then(|b| ctx.device.bel_by_name(b))
                else {
                    return Err(PnrError::user(format!(
                        "set_cell: unknown bel '{bel_name}' on line {line_num}"
                    )));
                };
                set_bel_attr_by_name(ctx, cell_id, bel);
            }
            "set_pseudo_plug" => {
                // Flags carry the payload: --port p:wire --timing in:out:min:max
                let mut port: Option<&str> = None;
                let mut timing: Option<&str> = None;
                let mut it = words[1..].iter();
                while let Some(w) = it.next() {
                    match *w {
                        "--port" => port = it.next().copied(),
                        "--timing" => timing = it.next().copied(),
                        _ => {}
                    }
                }
                let (Some(port), Some(timing)) = (port, timing) else {
                    return Err(PnrError::user(format!(
                        "set_pseudo_plug expects --port and --timing on line {line_num}"
                    )));
                };
                if port.split(':').count() != 2 || timing.split(':').count() != 4 {
                    return Err(PnrError::user(format!(
                        "set_pseudo_plug: malformed arguments on line {line_num}"
                    )));
                }
                let plug = ctx.id(&format!("$pseudo_plug${}$", port.replace(':', "_")));
                let plug_type = ctx.id("PSEUDO_PLUG");
                ctx.netlist
                    .create_cell(plug, plug_type)
                    .map_err(|_| PnrError::user(format!("duplicate pseudo plug on line {line_num}")))?;
                let port_key = ctx.id("PLUG_PORT");
                let timing_key = ctx.id("PLUG_TIMING");
                let c = ctx.netlist.cell_mut(plug).unwrap();
                c.attrs.insert(port_key, Property::from_str_value(port));
                c.attrs.insert(timing_key, Property::from_str_value(timing));
            }
            "prohibit_wire" => {
                let [pattern] = args[..] else {
                    return Err(PnrError::user(format!(
                        "prohibit_wire expects one pattern on line {line_num}"
                    )));
                };
                let count = cmd_prohibit_wire(ctx, pattern, line_num)?;
                sink.emit(Diagnostic::info(
                    DiagnosticCode::new(Category::Constraint, 31),
                    format!("prohibited {count} wire(s) matching '{pattern}'"),
                ));
            }
            "prohibit_pip" => {
                let [pattern] = args[..] else {
                    return Err(PnrError::user(format!(
                        "prohibit_pip expects one pattern on line {line_num}"
                    )));
                };
                let count = cmd_prohibit_pip(ctx, pattern, line_num)?;
                sink.emit(Diagnostic::info(
                    DiagnosticCode::new(Category::Constraint, 31),
                    format!("prohibited {count} pip(s) matching '{pattern}'"),
                ));
            }
            "prohibit_bel" => {
                let [pattern] = args[..] else {
                    return Err(PnrError::user(format!(
                        "prohibit_bel expects one pattern on line {line_num}"
                    )));
                };
                let count = cmd_prohibit_bel(ctx, pattern, line_num)?;
                sink.emit(Diagnostic::info(
                    DiagnosticCode::new(Category::Constraint, 31),
                    format!("prohibited {count} bel(s) matching '{pattern}'"),
                ));
            }
            other => warn(sink, line_num, format!("unsupported PCF command `{other}`")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;

    fn setup() -> (Context, fabric::FabricArch, DiagnosticSink) {
        let (mut ctx, arch) = fabric::create("fab-4x4").unwrap();
        let led = ctx.id("led0");
        ctx.netlist.create_cell(led, ctx.ids.ob).unwrap();
        (ctx, arch, DiagnosticSink::new())
    }

    #[test]
    fn set_io_resolves_package_pin_to_bel() {
        let (mut ctx, arch, sink) = setup();
        parse_pcf(&mut ctx, &arch, "set_io led0 A2\n", &sink).unwrap();
        let cell = ctx.cell(ctx.id("led0")).unwrap();
        let expected = arch.package_pin_bel("A2").unwrap();
        let bel_name = cell.attrs[&ctx.ids.bel].as_string();
        assert_eq!(
            ctx.device.bel_by_name(ctx.id(&bel_name)),
            Some(expected)
        );
    }

    #[test]
    fn set_io_unknown_pin_is_fatal() {
        let (mut ctx, arch, sink) = setup();
        assert!(parse_pcf(&mut ctx, &arch, "set_io led0 ZZ9\n", &sink).is_err());
    }

    #[test]
    fn set_frequency_converts_to_period() {
        let (mut ctx, arch, sink) = setup();
        let clk = ctx.id("clk");
        ctx.netlist.create_net(clk).unwrap();
        parse_pcf(&mut ctx, &arch, "set_frequency clk 25\n", &sink).unwrap();
        assert_eq!(ctx.net(clk).unwrap().clock_constraint, Some(40.0));
    }

    #[test]
    fn set_cell_pins_to_named_bel() {
        let (mut ctx, arch, sink) = setup();
        let lut = ctx.id("lut0");
        ctx.netlist.create_cell(lut, ctx.ids.slice_comb).unwrap();
        parse_pcf(&mut ctx, &arch, "set_cell lut0 R1C1_SLICE0_LUT0\n", &sink).unwrap();
        assert_eq!(
            ctx.cell(lut).unwrap().attrs[&ctx.ids.bel].as_string(),
            "R1C1_SLICE0_LUT0"
        );
    }

    #[test]
    fn prohibit_wire_reserves_matches() {
        let (mut ctx, arch, sink) = setup();
        parse_pcf(&mut ctx, &arch, r"prohibit_wire ^R1C1_LOCAL[01]$", &sink).unwrap();
        let l0 = ctx.device.wire_by_name(ctx.id("R1C1_LOCAL0")).unwrap();
        let l1 = ctx.device.wire_by_name(ctx.id("R1C1_LOCAL1")).unwrap();
        let l2 = ctx.device.wire_by_name(ctx.id("R1C1_LOCAL2")).unwrap();
        assert!(ctx.bindings.net_on_wire(l0).is_some());
        assert!(ctx.bindings.net_on_wire(l1).is_some());
        assert!(ctx.bindings.net_on_wire(l2).is_none());
        ctx.verify_bindings().unwrap();
    }

    #[test]
    fn prohibit_bel_blocks_placement() {
        let (mut ctx, arch, sink) = setup();
        parse_pcf(&mut ctx, &arch, r"prohibit_bel ^R1C1_SLICE0_LUT0$", &sink).unwrap();
        let bel = ctx.device.bel_by_name(ctx.id("R1C1_SLICE0_LUT0")).unwrap();
        assert!(ctx.bindings.cell_at(bel).is_some());
        assert!(!arch.bel_available(&ctx, bel));
    }

    #[test]
    fn prohibit_pip_uses_src_dst_names() {
        let (mut ctx, arch, sink) = setup();
        parse_pcf(
            &mut ctx,
            &arch,
            r"prohibit_pip ^R1C1_S00_F->R1C1_S00_DI$",
            &sink,
        )
        .unwrap();
        let f = ctx.device.wire_by_name(ctx.id("R1C1_S00_F")).unwrap();
        let di = ctx.device.wire_by_name(ctx.id("R1C1_S00_DI")).unwrap();
        let pip = ctx.device.pip_between(f, di).unwrap();
        assert!(ctx.bindings.net_on_pip(pip).is_some());
    }

    #[test]
    fn bad_regex_is_fatal() {
        let (mut ctx, arch, sink) = setup();
        assert!(parse_pcf(&mut ctx, &arch, r"prohibit_wire [unclosed\n", &sink).is_err());
    }

    #[test]
    fn pseudo_plug_records_port_and_timing() {
        let (mut ctx, arch, sink) = setup();
        parse_pcf(
            &mut ctx,
            &arch,
            "set_pseudo_plug --port rx:R0C1_IOB0_O --timing 0.1:0.2:0.0:1.5\n",
            &sink,
        )
        .unwrap();
        let plug = ctx.id("$pseudo_plug$rx_R0C1_IOB0_O$");
        let c = ctx.cell(plug).unwrap();
        assert_eq!(c.attrs[&ctx.id("PLUG_PORT")].as_string(), "rx:R0C1_IOB0_O");
        assert_eq!(
            c.attrs[&ctx.id("PLUG_TIMING")].as_string(),
            "0.1:0.2:0.0:1.5"
        );
    }

    #[test]
    fn comments_and_unknown_commands() {
        let (mut ctx, arch, sink) = setup();
        parse_pcf(
            &mut ctx,
            &arch,
            "# comment line\nfrob_the_widgets a b\n",
            &sink,
        )
        .unwrap();
        assert!(!sink.has_errors());
        assert!(sink.diagnostics().iter().any(|d| d.message.contains("unsupported PCF")));
    }
}
