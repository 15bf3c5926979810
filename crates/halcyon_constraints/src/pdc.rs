//! PDC: Lattice-style `ldc_*` constraint files.
//!
//! `ldc_set_location -site <pkg-pin> <objects>` pins an IO to a package
//! pin; `ldc_set_port -iobuf {k=v k=v ...} <objects>` sets buffer
//! attributes. Objects use the same `[get_ports ...]`/`[get_cells ...]`
//! sub-expressions as XDC.

use crate::tcl::{join_continuations, tokenize_line, Token};
use halcyon_common::PnrResult;
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, Property};

fn warn(sink: &DiagnosticSink, line: u32, message: String) {
    sink.emit(Diagnostic::warning(DiagnosticCode::new(Category::Constraint, 20), message).at_line(line));
}

/// Resolves `[get_ports x]`/`[get_cells x]` object tokens to attribute
/// targets: a port name or a cell name.
fn targets(ctx: &Context, tokens: &[Token], sink: &DiagnosticSink, line: u32) -> Vec<halcyon_common::Ident> {
    let mut out = Vec::new();
    for token in tokens {
        let Token::SubExpr(text) = token else { continue };
        let commands = tokenize_line(text);
        let Some(inner) = commands.first() else { continue };
        let Some(cmd) = inner.first().and_then(|t| t.word()) else {
            continue;
        };
        if cmd != "get_ports" && cmd != "get_cells" {
            warn(sink, line, format!("unsupported object query `{cmd}`"));
            continue;
        }
        for name in inner[1..].iter().filter_map(|t| t.word()) {
            match ctx.interner.get(name) {
                Some(id)
                    if ctx.netlist.ports.contains_key(&id)
                        || ctx.netlist.cells.contains_key(&id) =>
                {
                    out.push(id)
                }
                _ => warn(sink, line, format!("no port or cell named '{name}'")),
            }
        }
    }
    out
}

fn set_attr(ctx: &mut Context, target: halcyon_common::Ident, key: halcyon_common::Ident, value: Property) {
    if ctx.netlist.ports.contains_key(&target) {
        ctx.netlist.ports.get_mut(&target).unwrap().attrs.insert(key, value);
    } else if let Ok(cell) = ctx.netlist.cell_mut(target) {
        cell.attrs.insert(key, value);
    }
}

/// Parses a PDC source into the context.
pub fn parse_pdc(ctx: &mut Context, source: &str, sink: &DiagnosticSink) -> PnrResult<()> {
    let joined = join_continuations(source);
    for (lineno, line) in joined.lines().enumerate() {
        let line_num = lineno as u32 + 1;
        for tokens in tokenize_line(line) {
            let Some(cmd) = tokens.first().and_then(|t| t.word()) else {
                continue;
            };
            match cmd {
                "ldc_set_location" => {
                    let mut site: Option<String> = None;
                    let mut i = 1;
                    while i < tokens.len() {
                        if tokens[i].word() == Some("-site") {
                            i += 1;
                            site = tokens.get(i).map(|t| t.text().to_string());
                        }
                        i += 1;
                    }
                    let Some(site) = site else {
                        warn(sink, line_num, "ldc_set_location: missing -site".into());
                        continue;
                    };
                    let key = ctx.ids.loc;
                    for target in targets(ctx, &tokens[1..], sink, line_num) {
                        set_attr(ctx, target, key, Property::from_str_value(site.clone()));
                    }
                }
                "ldc_set_port" => {
                    let mut kv: Option<String> = None;
                    let mut i = 1;
                    while i < tokens.len() {
                        if tokens[i].word() == Some("-iobuf") {
                            i += 1;
                            kv = tokens.get(i).map(|t| t.text().to_string());
                        }
                        i += 1;
                    }
                    let Some(kv) = kv else {
                        warn(sink, line_num, "ldc_set_port: missing -iobuf".into());
                        continue;
                    };
                    let resolved = targets(ctx, &tokens[1..], sink, line_num);
                    for pair in kv.split_whitespace() {
                        let Some((key, value)) = pair.split_once('=') else {
                            warn(sink, line_num, format!("malformed IO buffer setting '{pair}'"));
                            continue;
                        };
                        let key = ctx.id(key);
                        for &target in &resolved {
                            set_attr(ctx, target, key, Property::from_str_value(value));
                        }
                    }
                }
                other => warn(sink, line_num, format!("unsupported PDC command `{other}`")),
            }
        }
    }
    Ok(())
}
