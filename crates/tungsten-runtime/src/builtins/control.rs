//! Evaluation control and structural predicates: `If`,
//! `CompoundExpression`, `Evaluate`, `ReplaceAll`, `MatchQ`, `SameQ`,
//! `Head` and the `*Q` number predicates.

use dashu::integer::IBig;
use tungsten_core::{EvalError, Expr, Normal};
use tungsten_rewrite::match_expr;

use crate::eval::{BuiltinOutcome, Evaluator};

fn boolean(b: bool) -> Expr {
    Expr::system(if b { "True" } else { "False" })
}

/// `If[cond, then]`, `If[cond, then, else]`, `If[cond, then, else,
/// other]`. A non-boolean condition picks the fourth branch or stays
/// symbolic.
pub fn if_(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if !(2..=4).contains(&elems.len()) {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let branch = if elems[0].same_q(&Expr::system("True")) {
        Some(elems[1].clone())
    } else if elems[0].same_q(&Expr::system("False")) {
        Some(elems.get(2).cloned().unwrap_or_else(|| Expr::system("Null")))
    } else {
        elems.get(3).cloned()
    };
    match branch {
        Some(e) => Ok(BuiltinOutcome::Evaluated(e)),
        None => Ok(BuiltinOutcome::NoMatch),
    }
}

/// `expr; expr; ...` under HoldAll: evaluate left to right, the last
/// value is the result.
pub fn compound_expression(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let mut last = Expr::system("Null");
    for elem in n.elements() {
        last = ev.eval_nested(elem)?;
    }
    Ok(BuiltinOutcome::Evaluated(last))
}

/// `Evaluate` reaching the evaluator in an ordinary position is a no-op
/// wrapper: its (already evaluated) contents replace it.
pub fn evaluate(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    Ok(BuiltinOutcome::Evaluated(match elems.len() {
        1 => elems[0].clone(),
        _ => Expr::normal_evaluated(Expr::system("Sequence"), elems.to_vec()),
    }))
}

/// One rewrite rule extracted from a `Rule`/`RuleDelayed` expression.
fn rule_pair(e: &Expr) -> Option<(&Expr, &Expr)> {
    if e.has_form("Rule", tungsten_core::Arity::Exact(2))
        || e.has_form("RuleDelayed", tungsten_core::Arity::Exact(2))
    {
        let elems = e.elements();
        Some((&elems[0], &elems[1]))
    } else {
        None
    }
}

fn rule_list(e: &Expr) -> Option<Vec<(&Expr, &Expr)>> {
    if let Some(pair) = rule_pair(e) {
        return Some(vec![pair]);
    }
    if e.has_form("List", tungsten_core::Arity::Any) {
        return e.elements().iter().map(rule_pair).collect();
    }
    None
}

fn replace_walk(ev: &mut Evaluator, expr: &Expr, rules: &[(&Expr, &Expr)]) -> Expr {
    for (pat, repl) in rules {
        if let Some(bindings) = match_expr(ev, pat, expr) {
            return tungsten_rewrite::substitute(repl, &bindings);
        }
    }
    match expr {
        Expr::Normal(n) => {
            let head = replace_walk(ev, n.head(), rules);
            let elements = n
                .elements()
                .iter()
                .map(|e| replace_walk(ev, e, rules))
                .collect();
            Expr::normal(head, elements)
        }
        _ => expr.clone(),
    }
}

/// `ReplaceAll[expr, rules]` (`expr /. rules`): outermost-first one-pass
/// replacement; a replaced subtree is not revisited.
pub fn replace_all(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let rules = match rule_list(&elems[1]) {
        Some(r) => r,
        None => return Ok(BuiltinOutcome::NoMatch),
    };
    let expr = elems[0].clone();
    Ok(BuiltinOutcome::Evaluated(replace_walk(ev, &expr, &rules)))
}

pub fn match_q(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let elems = n.elements();
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let (expr, pattern) = (elems[0].clone(), elems[1].clone());
    let matched = match_expr(ev, &pattern, &expr).is_some();
    Ok(BuiltinOutcome::Evaluated(boolean(matched)))
}

pub fn same_q(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    let all_same = elems.windows(2).all(|w| w[0].same_q(&w[1]));
    Ok(BuiltinOutcome::Evaluated(boolean(all_same)))
}

pub fn head(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    Ok(BuiltinOutcome::Evaluated(elems[0].head()))
}

pub fn atom_q(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    Ok(BuiltinOutcome::Evaluated(boolean(elems[0].is_atom())))
}

pub fn integer_q(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    Ok(BuiltinOutcome::Evaluated(boolean(matches!(
        elems[0],
        Expr::Integer(_)
    ))))
}

pub fn number_q(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    Ok(BuiltinOutcome::Evaluated(boolean(elems[0].is_number())))
}

fn parity_q(n: &Normal, even: bool) -> BuiltinOutcome {
    let elems = n.elements();
    if elems.len() != 1 {
        return BuiltinOutcome::NoMatch;
    }
    match &elems[0] {
        Expr::Integer(i) => {
            let is_even = i % IBig::from(2) == IBig::from(0);
            BuiltinOutcome::Evaluated(boolean(is_even == even))
        }
        // Anything that is not an even/odd integer is simply not one.
        _ => BuiltinOutcome::Evaluated(boolean(false)),
    }
}

pub fn even_q(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    Ok(parity_q(n, true))
}

pub fn odd_q(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    Ok(parity_q(n, false))
}
