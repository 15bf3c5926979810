//! QSF: Quartus-style settings files.
//!
//! Three commands: `set_location_assignment <loc> -to <obj>`,
//! `set_instance_assignment -name <attr> -to <obj> [value]`, and
//! `set_global_assignment -name <attr> [value]`. Location values of the
//! form `PIN_<name>` become `LOC` attributes with the prefix stripped.

use crate::tcl::{join_continuations, tokenize_line, Token};
use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, Property};

fn warn(sink: &DiagnosticSink, line: u32, message: String) {
    sink.emit(Diagnostic::warning(DiagnosticCode::new(Category::Constraint, 10), message).at_line(line));
}

struct ParsedArgs {
    name: Option<String>,
    to: Option<String>,
    positionals: Vec<String>,
}

fn split_args(tokens: &[Token]) -> ParsedArgs {
    let mut args = ParsedArgs {
        name: None,
        to: None,
        positionals: Vec::new(),
    };
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].word() {
            Some("-name") => {
                i += 1;
                args.name = tokens.get(i).map(|t| t.text().to_string());
            }
            Some("-to") => {
                i += 1;
                args.to = tokens.get(i).map(|t| t.text().to_string());
            }
            _ => args.positionals.push(tokens[i].text().to_string()),
        }
        i += 1;
    }
    args
}

/// Applies an attribute to the named object: a top-level port when one
/// matches, otherwise a cell.
fn assign(ctx: &mut Context, target: &str, key: Ident, value: Property) -> bool {
    let Some(id) = ctx.interner.get(target) else {
        return false;
    };
    if ctx.netlist.ports.contains_key(&id) {
        ctx.netlist.ports.get_mut(&id).unwrap().attrs.insert(key, value);
        return true;
    }
    if ctx.netlist.cells.contains_key(&id) {
        ctx.netlist.cell_mut(id).unwrap().attrs.insert(key, value);
        return true;
    }
    false
}

/// Parses a QSF source into the context.
pub fn parse_qsf(ctx: &mut Context, source: &str, sink: &DiagnosticSink) -> PnrResult<()> {
    let joined = join_continuations(source);
    for (lineno, line) in joined.lines().enumerate() {
        let line_num = lineno as u32 + 1;
        for tokens in tokenize_line(line) {
            let Some(cmd) = tokens.first().and_then(|t| t.word()) else {
                continue;
            };
            let args = split_args(&tokens[1..]);
            match cmd {
                "set_location_assignment" => {
                    let (Some(loc), Some(target)) = (args.positionals.first(), args.to.as_deref())
                    else {
                        warn(sink, line_num, "set_location_assignment: missing location or -to".into());
                        continue;
                    };
                    let loc = loc.strip_prefix("PIN_").unwrap_or(loc);
                    let key = ctx.ids.loc;
                    if !assign(ctx, target, key, Property::from_str_value(loc)) {
                        warn(sink, line_num, format!("no object named '{target}'"));
                    }
                }
                "set_instance_assignment" => {
                    let (Some(name), Some(target)) = (args.name.as_deref(), args.to.as_deref())
                    else {
                        warn(sink, line_num, "set_instance_assignment: missing -name or -to".into());
                        continue;
                    };
                    let value = args.positionals.first().cloned().unwrap_or_default();
                    let key = ctx.id(name);
                    if !assign(ctx, target, key, Property::from_str_value(value)) {
                        warn(sink, line_num, format!("no object named '{target}'"));
                    }
                }
                "set_global_assignment" => {
                    let Some(name) = args.name.as_deref() else {
                        warn(sink, line_num, "set_global_assignment: missing -name".into());
                        continue;
                    };
                    let value = args.positionals.first().cloned().unwrap_or_default();
                    let key = ctx.id(name);
                    ctx.netlist.settings.insert(key, Property::from_str_value(value));
                }
                other => warn(sink, line_num, format!("unsupported QSF command `{other}`")),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halcyon_arch::fabric;
    use halcyon_device::PortDir;
    use halcyon_netlist::TopPort;
    use std::collections::BTreeMap;

    fn setup() -> (Context, DiagnosticSink) {
        let (mut ctx, _) = fabric::create("fab-4x4").unwrap();
        let port = ctx.id("data[0]");
        ctx.netlist.ports.insert(
            port,
            TopPort {
                name: port,
                dir: PortDir::Output,
                net: None,
                attrs: BTreeMap::new(),
            },
        );
        (ctx, DiagnosticSink::new())
    }

    #[test]
    fn instance_assignment_sets_port_attr() {
        let (mut ctx, sink) = setup();
        parse_qsf(
            &mut ctx,
            "set_instance_assignment -name IO_STANDARD -to data\\[0\\] \"LVCMOS33\"\n",
            &sink,
        )
        .unwrap();
        let port = &ctx.netlist.ports[&ctx.id("data[0]")];
        assert_eq!(port.attrs[&ctx.id("IO_STANDARD")].as_string(), "LVCMOS33");
    }

    #[test]
    fn location_assignment_strips_pin_prefix() {
        let (mut ctx, sink) = setup();
        parse_qsf(
            &mut ctx,
            "set_location_assignment PIN_A12 -to data\\[0\\]\n",
            &sink,
        )
        .unwrap();
        let port = &ctx.netlist.ports[&ctx.id("data[0]")];
        assert_eq!(port.attrs[&ctx.ids.loc].as_string(), "A12");
    }

    #[test]
    fn location_assignment_on_cell() {
        let (mut ctx, sink) = setup();
        let cell = ctx.id("led_reg");
        ctx.netlist.create_cell(cell, ctx.ids.fd1p3dx).unwrap();
        parse_qsf(&mut ctx, "set_location_assignment PIN_B3 -to led_reg\n", &sink).unwrap();
        assert_eq!(
            ctx.cell(cell).unwrap().attrs[&ctx.ids.loc].as_string(),
            "B3"
        );
    }

    #[test]
    fn global_assignment_lands_in_settings() {
        let (mut ctx, sink) = setup();
        parse_qsf(
            &mut ctx,
            "set_global_assignment -name FAMILY \"Fabric Demo\"\n",
            &sink,
        )
        .unwrap();
        assert_eq!(
            ctx.netlist.settings[&ctx.id("FAMILY")].as_string(),
            "Fabric Demo"
        );
    }

    #[test]
    fn unknown_target_is_a_warning() {
        let (mut ctx, sink) = setup();
        parse_qsf(
            &mut ctx,
            "set_instance_assignment -name IO_STANDARD -to missing \"LVTTL\"\n",
            &sink,
        )
        .unwrap();
        assert!(!sink.has_errors());
        assert!(sink.diagnostics().iter().any(|d| d.message.contains("no object named")));
    }

    #[test]
    fn comments_are_ignored(){
        let (mut ctx, sink) = setup();
        parse_qsf(&mut ctx, "# set_location_assignment PIN_A1 -to data\\[0\\]\n", &sink).unwrap();
        assert!(ctx.netlist.ports[&ctx.id("data[0]")].attrs.is_empty());
    }
}
