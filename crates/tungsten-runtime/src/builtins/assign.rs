//! Assignment operators: `Set`, `SetDelayed`, `UpSet`, `UpSetDelayed`,
//! `Unset`, `Clear` and `ClearAll`.
//!
//! Each operator reduces to a mutation of the definitions database. The
//! target symbol and rule list are derived from the shape of the held
//! left-hand side; a `Protected` target turns the assignment into
//! `$Failed` with a `Set::wrsym` message.

use tungsten_core::{EvalError, Expr, Normal, Symbol};
use tungsten_rewrite::{DefinitionError, Rule, ValueKind};

use crate::eval::{BuiltinOutcome, Evaluator};

/// Where an assignment lands: which symbol, which of its rule lists.
fn assignment_target(lhs: &Expr) -> Option<(Symbol, ValueKind)> {
    // Condition and HoldPattern wrap the pattern without changing the
    // target.
    if lhs.has_form("Condition", tungsten_core::Arity::Exact(2))
        || lhs.has_form("HoldPattern", tungsten_core::Arity::Exact(1))
    {
        return assignment_target(&lhs.elements()[0]);
    }
    match lhs {
        Expr::Symbol(s) => Some((s.clone(), ValueKind::Own)),
        Expr::Normal(n) => match n.head() {
            Expr::Symbol(s) => Some((s.clone(), ValueKind::Down)),
            head => head.lookup_symbol().map(|s| (s.clone(), ValueKind::Sub)),
        },
        _ => None,
    }
}

fn report_refusal(ev: &mut Evaluator, err: DefinitionError) {
    match err {
        DefinitionError::Protected(sym) => {
            ev.message(Symbol::system("Set"), "wrsym", &[Expr::Symbol(sym)]);
        }
        DefinitionError::Locked(sym) => {
            ev.message(Symbol::system("SetAttributes"), "locked", &[Expr::Symbol(sym)]);
        }
    }
}

fn assign(
    ev: &mut Evaluator,
    n: &Normal,
    delayed: bool,
) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let (lhs, rhs) = (&elems[0], &elems[1]);
    let (sym, kind) = match assignment_target(lhs) {
        Some(t) => t,
        None => return Ok(BuiltinOutcome::NoMatch),
    };
    // `Set` evaluates the right-hand side up front (it arrived evaluated
    // thanks to HoldFirst); `SetDelayed` keeps it verbatim.
    let rule = Rule::new(lhs.clone(), rhs.clone(), delayed);
    match ev.defs.add_rule(&sym, kind, rule) {
        Ok(()) => Ok(BuiltinOutcome::Evaluated(if delayed {
            Expr::system("Null")
        } else {
            rhs.clone()
        })),
        Err(err) => {
            report_refusal(ev, err);
            Ok(BuiltinOutcome::Failed)
        }
    }
}

pub fn set(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    assign(ev, n, false)
}

pub fn set_delayed(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    assign(ev, n, true)
}

fn up_assign(
    ev: &mut Evaluator,
    n: &Normal,
    delayed: bool,
) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let (lhs, rhs) = (&elems[0], &elems[1]);

    // The rule attaches to every distinct symbol governing an element of
    // the left-hand side.
    let mut targets: Vec<Symbol> = Vec::new();
    for elem in lhs.elements() {
        if let Some(s) = upvalue_symbol(elem) {
            if !targets.contains(&s) {
                targets.push(s);
            }
        }
    }
    if targets.is_empty() {
        ev.message(Symbol::system("UpSet"), "nosym", &[lhs.clone()]);
        return Ok(BuiltinOutcome::Failed);
    }

    let mut any_ok = false;
    for sym in targets {
        let rule = Rule::new(lhs.clone(), rhs.clone(), delayed);
        match ev.defs.add_rule(&sym, ValueKind::Up, rule) {
            Ok(()) => any_ok = true,
            Err(err) => report_refusal(ev, err),
        }
    }
    if !any_ok {
        return Ok(BuiltinOutcome::Failed);
    }
    Ok(BuiltinOutcome::Evaluated(if delayed {
        Expr::system("Null")
    } else {
        rhs.clone()
    }))
}

/// The symbol an upvalue attaches to for one element of the LHS: the
/// element's lookup symbol, looking through pattern wrappers like
/// `g[x_]` (which hangs the rule on `g`).
fn upvalue_symbol(elem: &Expr) -> Option<Symbol> {
    if elem.has_form("Pattern", tungsten_core::Arity::Exact(2)) {
        return upvalue_symbol(&elem.elements()[1]);
    }
    if elem.has_form("Blank", tungsten_core::Arity::Exact(1)) {
        // _g attaches to g.
        return elem.elements()[0].as_symbol().cloned();
    }
    if elem.has_form("Blank", tungsten_core::Arity::Exact(0)) {
        return None;
    }
    elem.lookup_symbol().cloned()
}

pub fn upset(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    up_assign(ev, n, false)
}

pub fn upset_delayed(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    up_assign(ev, n, true)
}

pub fn unset(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let lhs = &elems[0];
    let (sym, kind) = match assignment_target(lhs) {
        Some(t) => t,
        None => return Ok(BuiltinOutcome::NoMatch),
    };
    match ev.defs.remove_rule(&sym, kind, lhs) {
        Ok(true) => Ok(BuiltinOutcome::Evaluated(Expr::system("Null"))),
        Ok(false) => {
            ev.message(
                Symbol::system("Unset"),
                "norep",
                &[lhs.clone(), Expr::Symbol(sym)],
            );
            Ok(BuiltinOutcome::Failed)
        }
        Err(err) => {
            report_refusal(ev, err);
            Ok(BuiltinOutcome::Failed)
        }
    }
}

fn clear_symbols(
    ev: &mut Evaluator,
    n: &Normal,
    all: bool,
) -> Result<BuiltinOutcome, EvalError> {
    for elem in n.elements() {
        match elem {
            Expr::Symbol(sym) => {
                if let Err(err) = ev.defs.clear(sym, all) {
                    report_refusal(ev, err);
                }
            }
            _ => return Ok(BuiltinOutcome::NoMatch),
        }
    }
    Ok(BuiltinOutcome::Evaluated(Expr::system("Null")))
}

pub fn clear(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    clear_symbols(ev, n, false)
}

pub fn clear_all(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    clear_symbols(ev, n, true)
}
