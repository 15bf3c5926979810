//! XDC: the Tcl-subset constraint dialect.
//!
//! Supported commands: `get_ports`, `get_cells`, `get_nets`, `get_pins`,
//! `get_iobanks`, `create_clock -period <ns> -name <id> <objects>`, and
//! `set_property [-dict "k v ..."] <key> <value> <objects>`. Unknown
//! commands and unknown object names are warnings, not errors.

use crate::tcl::{join_continuations, tokenize_line, Token};
use halcyon_common::{Ident, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, PortRef, Property};

/// A design object an XDC command can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TclObject {
    /// A top-level port.
    Port(Ident),
    /// A leaf cell.
    Cell(Ident),
    /// A net.
    Net(Ident),
    /// One pin of one cell.
    Pin(PortRef),
    /// An IO bank index.
    IoBank(u32),
}

fn warn(sink: &DiagnosticSink, line: u32, message: String) {
    sink.emit(Diagnostic::warning(DiagnosticCode::new(Category::Constraint, 1), message).at_line(line));
}

/// Evaluates one `[get_*]` sub-expression into design objects.
fn eval_subexpr(ctx: &Context, text: &str, sink: &DiagnosticSink, line: u32) -> Vec<TclObject> {
    let commands = tokenize_line(text);
    let Some(tokens) = commands.first() else {
        return Vec::new();
    };
    let Some(cmd) = tokens.first().and_then(|t| t.word()) else {
        return Vec::new();
    };
    let mut objects = Vec::new();
    let names = tokens[1..]
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) if !w.starts_with('-') => Some(w.as_str()),
            _ => None,
        });
    match cmd {
        "get_ports" => {
            for name in names {
                match ctx.interner.get(name).filter(|id| ctx.netlist.ports.contains_key(id)) {
                    Some(id) => objects.push(TclObject::Port(id)),
                    None => warn(sink, line, format!("get_ports: no port named '{name}'")),
                }
            }
        }
        "get_cells" => {
            for name in names {
                match ctx.interner.get(name).filter(|id| ctx.netlist.cells.contains_key(id)) {
                    Some(id) => objects.push(TclObject::Cell(id)),
                    None => warn(sink, line, format!("get_cells: no cell named '{name}'")),
                }
            }
        }
        "get_nets" => {
            for name in names {
                match ctx.interner.get(name).filter(|id| ctx.netlist.nets.contains_key(id)) {
                    Some(id) => objects.push(TclObject::Net(id)),
                    None => warn(sink, line, format!("get_nets: no net named '{name}'")),
                }
            }
        }
        "get_pins" => {
            for name in names {
                let Some((cell, port)) = name.rsplit_once('/') else {
                    warn(sink, line, format!("get_pins: malformed pin name '{name}'"));
                    continue;
                };
                let resolved = ctx
                    .interner
                    .get(cell)
                    .filter(|id| ctx.netlist.cells.contains_key(id))
                    .map(|c| PortRef::new(c, ctx.id(port)));
                match resolved {
                    Some(pin) => objects.push(TclObject::Pin(pin)),
                    None => warn(sink, line, format!("get_pins: no cell named '{cell}'")),
                }
            }
        }
        "get_iobanks" => {
            for name in names {
                match name.parse() {
                    Ok(bank) => objects.push(TclObject::IoBank(bank)),
                    Err(_) => warn(sink, line, format!("get_iobanks: bad bank '{name}'")),
                }
            }
        }
        other => warn(sink, line, format!("unsupported sub-expression `{other}`")),
    }
    objects
}

/// Resolves the net a top-level port connects to.
///
/// Before IO preparation the port record may not carry its net yet; the
/// placeholder buffer cell with the port's name does.
fn port_net(ctx: &Context, port: Ident) -> Option<Ident> {
    if let Some(net) = ctx.netlist.ports.get(&port).and_then(|p| p.net) {
        return Some(net);
    }
    let cell = ctx.cell(port).ok()?;
    cell.port_net(ctx.ids.o).or_else(|| cell.port_net(ctx.ids.i))
}

fn object_nets(ctx: &Context, objects: &[TclObject]) -> Vec<Ident> {
    objects
        .iter()
        .filter_map(|obj| match obj {
            TclObject::Net(net) => Some(*net),
            TclObject::Port(port) => port_net(ctx, *port),
            _ => None,
        })
        .collect()
}

fn cmd_create_clock(
    ctx: &mut Context,
    tokens: &[Token],
    sink: &DiagnosticSink,
    line: u32,
) {
    let mut period: Option<f64> = None;
    let mut name: Option<String> = None;
    let mut objects = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].word() {
            Some("-period") => {
                i += 1;
                period = tokens.get(i).and_then(|t| t.text().parse().ok());
            }
            Some("-name") => {
                i += 1;
                name = tokens.get(i).map(|t| t.text().to_string());
            }
            Some(w) if !w.starts_with('-') => {
                // A bare net/port name.
                if let Some(id) = ctx.interner.get(w) {
                    if ctx.netlist.nets.contains_key(&id) {
                        objects.push(TclObject::Net(id));
                    } else if ctx.netlist.ports.contains_key(&id) {
                        objects.push(TclObject::Port(id));
                    }
                }
            }
            None => objects.extend(eval_subexpr(ctx, tokens[i].text(), sink, line)),
            _ => {}
        }
        i += 1;
    }

    let Some(period) = period else {
        warn(sink, line, "create_clock: missing -period".to_string());
        return;
    };
    let nets = object_nets(ctx, &objects);
    if nets.is_empty() {
        warn(sink, line, "create_clock: no target objects".to_string());
        return;
    }
    for net in nets {
        ctx.netlist.net_mut(net).unwrap().clock_constraint = Some(period);
        sink.emit(
            Diagnostic::info(
                DiagnosticCode::new(Category::Constraint, 2),
                format!(
                    "clock '{}': {:.3} MHz on net '{}'",
                    name.as_deref().unwrap_or("<unnamed>"),
                    1000.0 / period,
                    ctx.name_of(net)
                ),
            )
            .at_line(line),
        );
    }
}

fn apply_property(ctx: &mut Context, object: TclObject, key: Ident, value: &str) {
    let value = Property::from_str_value(value);
    match object {
        TclObject::Port(port) => {
            ctx.netlist.ports.get_mut(&port).unwrap().attrs.insert(key, value);
        }
        TclObject::Cell(cell) => {
            ctx.netlist.cell_mut(cell).unwrap().attrs.insert(key, value);
        }
        TclObject::Net(net) => {
            ctx.netlist.net_mut(net).unwrap().attrs.insert(key, value);
        }
        TclObject::Pin(_) | TclObject::IoBank(_) => {}
    }
}

fn cmd_set_property(ctx: &mut Context, tokens: &[Token], sink: &DiagnosticSink, line: u32) {
    let mut dict: Option<String> = None;
    let mut positionals: Vec<&Token> = Vec::new();
    let mut objects = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(w) if w == "-dict" => {
                i += 1;
                dict = tokens.get(i).map(|t| t.text().to_string());
            }
            Token::Word(_) => positionals.push(&tokens[i]),
            Token::SubExpr(text) => objects.extend(eval_subexpr(ctx, text, sink, line)),
        }
        i += 1;
    }

    let mut pairs: Vec<(String, String)> = Vec::new();
    match dict {
        Some(dict) => {
            let words: Vec<&str> = dict.split_whitespace().collect();
            if words.len() % 2 != 0 {
                warn(sink, line, "set_property -dict: odd key/value list".to_string());
                return;
            }
            for kv in words.chunks(2) {
                pairs.push((kv[0].to_string(), kv[1].to_string()));
            }
        }
        None => {
            if positionals.len() < 2 {
                warn(sink, line, "set_property: missing key or value".to_string());
                return;
            }
            // Trailing bare words are object names when they resolve.
            for extra in &positionals[2..] {
                if let Some(id) = ctx.interner.get(extra.text()) {
                    if ctx.netlist.ports.contains_key(&id) {
                        objects.push(TclObject::Port(id));
                    } else if ctx.netlist.cells.contains_key(&id) {
                        objects.push(TclObject::Cell(id));
                    }
                }
            }
            pairs.push((
                positionals[0].text().to_string(),
                positionals[1].text().to_string(),
            ));
        }
    }

    if objects.is_empty() {
        warn(sink, line, "set_property: no target objects".to_string());
        return;
    }
    for (key, value) in pairs {
        let key = ctx.id(&key);
        for &object in &objects {
            apply_property(ctx, object, key, &value);
        }
    }
}

/// Parses an XDC source into the context.
pub fn parse_xdc(ctx: &mut Context, source: &str, sink: &DiagnosticSink) -> PnrResult<()> {
    let joined = join_continuations(source);
    for (lineno, line) in joined.lines().enumerate() {
        let line_num = lineno as u32 + 1;
        for tokens in tokenize_line(line) {
            let Some(cmd) = tokens.first().and_then(|t| t.word()) else {
                continue;
            };
            match cmd {
                "create_clock" => cmd_create_clock(ctx, &tokens[1..], sink, line_num),
                "set_property" => cmd_set_property(ctx, &tokens[1..], sink, line_num),
                other => warn(sink, line_num, format!("unsupported XDC command `{other}`")),
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
        // A top port `clk_in` whose placeholder buffer drives `clk_net`.
        let port = ctx.id("clk_in");
        let net = ctx.id("clk_net");
        ctx.netlist.create_net(net).unwrap();
        ctx.netlist.ports.insert(
            port,
            TopPort {
                name: port,
                dir: PortDir::Input,
                net: None,
                attrs: BTreeMap::new(),
            },
        );
        ctx.netlist.create_cell(port, ctx.ids.npnr_ibuf).unwrap();
        ctx.netlist.add_port(port, ctx.ids.o, PortDir::Output).unwrap();
        ctx.netlist.connect_port(port, ctx.ids.o, net).unwrap();
        (ctx, DiagnosticSink::new())
    }

    #[test]
    fn create_clock_attaches_period_to_port_net() {
        let (mut ctx, sink) = setup();
        parse_xdc(
            &mut ctx,
            "create_clock -period 10.0 -name clk [get_ports clk_in]\n",
            &sink,
        )
        .unwrap();
        let net = ctx.net(ctx.id("clk_net")).unwrap();
        assert_eq!(net.clock_constraint, Some(10.0));
        // 10 ns is 100 MHz.
        assert!(sink.diagnostics().iter().any(|d| d.message.contains("100.000 MHz")));
    }

    #[test]
    fn create_clock_on_net_object() {
        let (mut ctx, sink) = setup();
        parse_xdc(
            &mut ctx,
            "create_clock -period 4.0 [get_nets clk_net]\n",
            &sink,
        )
        .unwrap();
        assert_eq!(
            ctx.net(ctx.id("clk_net")).unwrap().clock_constraint,
            Some(4.0)
        );
    }

    #[test]
    fn set_property_on_port() {
        let (mut ctx, sink) = setup();
        parse_xdc(
            &mut ctx,
            "set_property IOSTANDARD LVCMOS33 [get_ports clk_in]\n",
            &sink,
        )
        .unwrap();
        let port = &ctx.netlist.ports[&ctx.id("clk_in")];
        assert_eq!(
            port.attrs[&ctx.id("IOSTANDARD")].as_string(),
            "LVCMOS33"
        );
    }

    #[test]
    fn set_property_dict_applies_all_pairs() {
        let (mut ctx, sink) = setup();
        parse_xdc(
            &mut ctx,
            r#"set_property -dict "IOSTANDARD LVCMOS33 SLEW FAST" [get_ports clk_in]"#,
            &sink,
        )
        .unwrap();
        let port = &ctx.netlist.ports[&ctx.id("clk_in")];
        assert_eq!(port.attrs[&ctx.id("IOSTANDARD")].as_string(), "LVCMOS33");
        assert_eq!(port.attrs[&ctx.id("SLEW")].as_string(), "FAST");
    }

    #[test]
    fn set_property_on_cell() {
        let (mut ctx, sink) = setup();
        let cell = ctx.id("u_ram");
        ctx.netlist.create_cell(cell, ctx.ids.ebr_core).unwrap();
        parse_xdc(
            &mut ctx,
            "set_property KEEP true [get_cells u_ram]\n",
            &sink,
        )
        .unwrap();
        assert_eq!(
            ctx.cell(cell).unwrap().attrs[&ctx.id("KEEP")].as_string(),
            "true"
        );
    }

    #[test]
    fn unknown_command_is_a_warning() {
        let (mut ctx, sink) = setup();
        parse_xdc(&mut ctx, "set_false_path -from a -to b\n", &sink).unwrap();
        assert!(!sink.has_errors());
        assert!(sink
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("unsupported XDC command")));
    }

    #[test]
    fn unknown_port_is_a_warning() {
        let (mut ctx, sink) = setup();
        parse_xdc(
            &mut ctx,
            "create_clock -period 10 [get_ports nonexistent]\n",
            &sink,
        )
        .unwrap();
        assert!(!sink.has_errors());
        assert!(sink.diagnostics().iter().any(|d| d.message.contains("no port named")));
    }

    #[test]
    fn comments_and_blank_lines_skip() {
        let (mut ctx, sink) = setup();
        parse_xdc(
            &mut ctx,
            "# a comment\n\ncreate_clock -period 8.0 [get_ports clk_in] ; # inline\n",
            &sink,
        )
        .unwrap();
        assert_eq!(
            ctx.net(ctx.id("clk_net")).unwrap().clock_constraint,
            Some(8.0)
        );
    }
}
