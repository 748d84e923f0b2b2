//! Attribute and symbol-table introspection builtins: `Attributes`,
//! `SetAttributes`, `ClearAttributes`, `Protect`, `Unprotect`, `Default`
//! and `Names`.

use tungsten_core::{EvalError, Expr, Normal, Symbol};
use tungsten_rewrite::Attributes;

use crate::eval::{BuiltinOutcome, Evaluator};

fn list(elems: Vec<Expr>) -> Expr {
    Expr::normal_evaluated(Expr::system("List"), elems)
}

/// Symbols named by an argument that is either a symbol or a list of
/// symbols.
fn symbol_args(e: &Expr) -> Option<Vec<Symbol>> {
    match e {
        Expr::Symbol(s) => Some(vec![s.clone()]),
        _ if e.has_form("List", tungsten_core::Arity::Any) => e
            .elements()
            .iter()
            .map(|x| x.as_symbol().cloned())
            .collect(),
        _ => None,
    }
}

pub fn attributes(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let sym = match elems[0].as_symbol() {
        Some(s) => s.clone(),
        None => return Ok(BuiltinOutcome::NoMatch),
    };
    let names: Vec<Expr> = ev
        .defs
        .attributes(&sym)
        .names()
        .into_iter()
        .map(Expr::system)
        .collect();
    Ok(BuiltinOutcome::Evaluated(list(names)))
}

/// Parse the attribute argument of `SetAttributes`/`ClearAttributes`: a
/// symbol or a list of symbols naming attributes. Unknown names emit
/// `Attributes::attnf`.
fn attribute_arg(ev: &mut Evaluator, e: &Expr) -> Option<Attributes> {
    let syms = symbol_args(e)?;
    let mut attrs = Attributes::empty();
    for s in syms {
        match Attributes::from_symbol_name(s.short_name()) {
            Some(a) => attrs |= a,
            None => {
                ev.message(Symbol::system("Attributes"), "attnf", &[Expr::Symbol(s)]);
                return None;
            }
        }
    }
    Some(attrs)
}

fn change_attributes(
    ev: &mut Evaluator,
    n: &Normal,
    add: bool,
) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let targets = match symbol_args(&elems[0]) {
        Some(t) => t,
        None => return Ok(BuiltinOutcome::NoMatch),
    };
    let attrs = match attribute_arg(ev, &elems[1]) {
        Some(a) => a,
        None => return Ok(BuiltinOutcome::Failed),
    };
    for sym in targets {
        let result = if add {
            ev.defs.set_attributes(&sym, attrs)
        } else {
            ev.defs.clear_attributes(&sym, attrs)
        };
        if result.is_err() {
            ev.message(
                Symbol::system("SetAttributes"),
                "locked",
                &[Expr::Symbol(sym)],
            );
            return Ok(BuiltinOutcome::Failed);
        }
    }
    Ok(BuiltinOutcome::Evaluated(Expr::system("Null")))
}

pub fn set_attributes(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    change_attributes(ev, n, true)
}

pub fn clear_attributes(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    change_attributes(ev, n, false)
}

fn change_protection(
    ev: &mut Evaluator,
    n: &Normal,
    protect: bool,
) -> Result<BuiltinOutcome, EvalError> {
    let mut changed: Vec<Expr> = Vec::new();
    for elem in n.elements() {
        let sym = match elem.as_symbol() {
            Some(s) => s.clone(),
            None => return Ok(BuiltinOutcome::NoMatch),
        };
        let result = if protect {
            ev.defs.set_attributes(&sym, Attributes::PROTECTED)
        } else {
            ev.defs.clear_attributes(&sym, Attributes::PROTECTED)
        };
        match result {
            Ok(()) => changed.push(Expr::string(sym.name())),
            Err(_) => {
                ev.message(
                    Symbol::system("SetAttributes"),
                    "locked",
                    &[Expr::Symbol(sym)],
                );
            }
        }
    }
    Ok(BuiltinOutcome::Evaluated(list(changed)))
}

pub fn protect(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    change_protection(ev, n, true)
}

pub fn unprotect(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    change_protection(ev, n, false)
}

/// `Default[f]` / `Default[f, pos]`: the registered default value, left
/// symbolic when none exists.
pub fn default_value(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    let sym = match elems.first().and_then(|e| e.as_symbol()) {
        Some(s) => s.clone(),
        None => return Ok(BuiltinOutcome::NoMatch),
    };
    let pos = match elems.len() {
        1 => 1,
        2 => match &elems[1] {
            Expr::Integer(i) => match usize::try_from(i.clone()) {
                Ok(p) => p,
                Err(_) => return Ok(BuiltinOutcome::NoMatch),
            },
            _ => return Ok(BuiltinOutcome::NoMatch),
        },
        _ => return Ok(BuiltinOutcome::NoMatch),
    };
    match ev.defs.default_for(&sym, pos) {
        Some(v) => Ok(BuiltinOutcome::Evaluated(v.clone())),
        None => Ok(BuiltinOutcome::NoMatch),
    }
}

/// `Names["glob"]`: matching defined symbol names as strings.
pub fn names(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let glob = match &elems[0] {
        Expr::String(s) => s,
        _ => return Ok(BuiltinOutcome::NoMatch),
    };
    let found: Vec<Expr> = ev
        .defs
        .names(glob)
        .into_iter()
        .map(|s| Expr::string(s.name()))
        .collect();
    Ok(BuiltinOutcome::Evaluated(list(found)))
}
