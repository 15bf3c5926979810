//! The generic cell-rewrite driver.
//!
//! Most packer transforms are table-driven: a [`XformRule`] names a source
//! cell type and describes how to turn a matching cell into the target
//! type: port renames (including one-to-many fanout), parameter renames,
//! defaults, fixed assignments, and "parse this parameter as a W-bit
//! vector" directives. Ports with no explicit mapping are renamed by
//! stripping `[` and `]` so that bus pins match the flat bel pin names.

use halcyon_common::{Ident, PnrError, PnrResult};
use halcyon_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use halcyon_netlist::{Context, Property};
use std::collections::BTreeMap;

/// One rewrite rule: everything needed to transform a matching cell.
#[derive(Clone, Debug, Default)]
pub struct XformRule {
    /// The type the cell becomes.
    pub new_type: Ident,
    /// Explicit port renames.
    pub port_xform: BTreeMap<Ident, Ident>,
    /// One-to-many port fanout: the source pin feeds every listed pin.
    pub port_multixform: BTreeMap<Ident, Vec<Ident>>,
    /// Parameter renames (the old key is kept alongside the new one).
    pub param_xform: BTreeMap<Ident, Ident>,
    /// Attributes assigned unconditionally.
    pub set_attrs: Vec<(Ident, Property)>,
    /// Parameters assigned unconditionally, after everything else.
    pub set_params: Vec<(Ident, Property)>,
    /// Parameters assigned only when absent.
    pub default_params: Vec<(Ident, Property)>,
    /// `(old, new, width, default)`: parse `old` as a `width`-bit vector
    /// into `new`, substituting `default` when the parameter is missing.
    pub parse_params: Vec<(Ident, Ident, usize, u64)>,
}

impl XformRule {
    /// Starts a rule that rewrites to `new_type`.
    pub fn to(new_type: Ident) -> Self {
        Self {
            new_type,
            ..Self::default()
        }
    }

    /// Adds a port rename.
    pub fn port(mut self, from: Ident, to: Ident) -> Self {
        self.port_xform.insert(from, to);
        self
    }

    /// Adds a one-to-many port fanout.
    pub fn multiport(mut self, from: Ident, to: Vec<Ident>) -> Self {
        self.port_multixform.insert(from, to);
        self
    }

    /// Adds a parameter rename.
    pub fn param(mut self, from: Ident, to: Ident) -> Self {
        self.param_xform.insert(from, to);
        self
    }

    /// Adds a fixed attribute assignment.
    pub fn set_attr(mut self, key: Ident, value: Property) -> Self {
        self.set_attrs.push((key, value));
        self
    }

    /// Adds a fixed parameter assignment.
    pub fn set_param(mut self, key: Ident, value: Property) -> Self {
        self.set_params.push((key, value));
        self
    }

    /// Adds a default parameter.
    pub fn default_param(mut self, key: Ident, value: Property) -> Self {
        self.default_params.push((key, value));
        self
    }

    /// Adds a parse directive.
    pub fn parse_param(mut self, from: Ident, to: Ident, width: usize, default: u64) -> Self {
        self.parse_params.push((from, to, width, default));
        self
    }
}

/// Parses a cell parameter into a `width`-bit vector property.
///
/// Missing parameters take `default`. A parameter whose string form is not
/// numeric is a fatal user error naming the cell.
pub fn parse_param_bits(
    ctx: &Context,
    cell: Ident,
    key: Ident,
    width: usize,
    default: u64,
) -> PnrResult<Property> {
    let c = ctx
        .cell(cell)
        .map_err(|_| PnrError::user("parse_param on a missing cell"))?;
    match c.params.get(&key) {
        None => Ok(Property::from_int(default, width)),
        Some(p) => p.to_bits(width).map(Property::from_bits).ok_or_else(|| {
            PnrError::user(format!(
                "parameter '{}' of cell '{}' is not a valid {width}-bit value",
                ctx.name_of(key),
                ctx.name_of(cell)
            ))
        }),
    }
}

fn strip_brackets(name: &str) -> String {
    name.chars().filter(|&c| c != '[' && c != ']').collect()
}

/// Applies `rule` to one cell.
pub fn xform_cell(ctx: &mut Context, rule: &XformRule, cell: Ident) -> PnrResult<()> {
    ctx.netlist
        .cell_mut(cell)
        .map_err(|_| PnrError::user("xform on a missing cell"))?
        .cell_type = rule.new_type;

    let orig_ports: Vec<Ident> = ctx.cell(cell).unwrap().ports.keys().copied().collect();
    for pname in orig_ports {
        if let Some(new_names) = rule.port_multixform.get(&pname) {
            let port = ctx.cell(cell).unwrap().ports[&pname].clone();
            ctx.netlist.disconnect_port(cell, pname).ok();
            ctx.netlist.cell_mut(cell).unwrap().ports.remove(&pname);
            for &new_name in new_names {
                ctx.netlist.add_port(cell, new_name, port.dir).ok();
                if let Some(net) = port.net {
                    ctx.netlist.connect_port(cell, new_name, net).map_err(|e| {
                        PnrError::user(format!(
                            "rewriting cell '{}': {e}",
                            ctx.name_of(cell)
                        ))
                    })?;
                }
            }
        } else {
            let new_name = match rule.port_xform.get(&pname) {
                Some(&n) => n,
                None => ctx.id(&strip_brackets(ctx.name_of(pname))),
            };
            if new_name != pname {
                ctx.netlist.rename_port(cell, pname, new_name).map_err(|e| {
                    PnrError::user(format!("rewriting cell '{}': {e}", ctx.name_of(cell)))
                })?;
            }
        }
    }

    let mapped: Vec<(Ident, Ident)> = {
        let c = ctx.cell(cell).unwrap();
        rule.param_xform
            .iter()
            .filter(|(old, _)| c.params.contains_key(old))
            .map(|(&old, &new)| (old, new))
            .collect()
    };
    for (old, new) in mapped {
        let value = ctx.cell(cell).unwrap().params[&old].clone();
        ctx.netlist.cell_mut(cell).unwrap().params.insert(new, value);
    }

    for (key, value) in &rule.set_attrs {
        ctx.netlist
            .cell_mut(cell)
            .unwrap()
            .attrs
            .insert(*key, value.clone());
    }
    for (key, value) in &rule.default_params {
        let c = ctx.netlist.cell_mut(cell).unwrap();
        c.params.entry(*key).or_insert_with(|| value.clone());
    }
    for &(old, new, width, default) in &rule.parse_params {
        let parsed = parse_param_bits(ctx, cell, old, width, default)?;
        ctx.netlist.cell_mut(cell).unwrap().params.insert(new, parsed);
    }
    for (key, value) in &rule.set_params {
        ctx.netlist
            .cell_mut(cell)
            .unwrap()
            .params
            .insert(*key, value.clone());
    }
    Ok(())
}

/// Applies a rule table to every matching cell in the netlist.
///
/// With `print_summary`, emits one info diagnostic per target type with
/// the number of cells created.
pub fn generic_xform(
    ctx: &mut Context,
    rules: &BTreeMap<Ident, XformRule>,
    sink: &DiagnosticSink,
    print_summary: bool,
) -> PnrResult<()> {
    let matching: Vec<(Ident, Ident)> = ctx
        .netlist
        .cells
        .iter()
        .filter(|(_, c)| rules.contains_key(&c.cell_type))
        .map(|(&name, c)| (name, c.cell_type))
        .collect();

    let mut counts: BTreeMap<Ident, usize> = BTreeMap::new();
    for &(cell, old_type) in &matching {
        xform_cell(ctx, &rules[&old_type], cell)?;
        *counts.entry(rules[&old_type].new_type).or_insert(0) += 1;
    }

    if print_summary {
        for (new_type, count) in counts {
            sink.emit(Diagnostic::info(
                DiagnosticCode::new(Category::Pack, 1),
                format!("created {count} {} cell(s)", ctx.name_of(new_type)),
            ));
        }
    }
    Ok(())
}
