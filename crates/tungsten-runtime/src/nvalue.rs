//! `N[expr]` / `N[expr, digits]`: numeric approximation.
//!
//! A walk structurally similar to evaluation: `nvalues` rules attached to
//! the governing symbol fire first, then number atoms convert to machine
//! or arbitrary-precision reals, then the walk recurses into the elements
//! of unheld heads and re-evaluates the result.

use dashu::integer::IBig;
use tungsten_core::number::{dbig_from_ibig, dbig_from_rbig};
use tungsten_core::{EvalError, Expr, Normal, Real, Symbol};
use tungsten_rewrite::{match_expr, substitute, Attributes, Rule};

use crate::eval::{BuiltinOutcome, Evaluator};

/// Handler for the `N` head. `N[x]` approximates to machine precision,
/// `N[x, d]` to `d` decimal digits.
pub fn n(ev: &mut Evaluator, call: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let elems = call.elements();
    let precision = match elems.len() {
        1 => None,
        2 => match &elems[1] {
            Expr::Integer(i) => match usize::try_from(i.clone()) {
                Ok(p) if p > 0 => Some(p),
                _ => return Ok(BuiltinOutcome::NoMatch),
            },
            _ => return Ok(BuiltinOutcome::NoMatch),
        },
        _ => return Ok(BuiltinOutcome::NoMatch),
    };
    let expr = elems[0].clone();
    let approximated = approximate(ev, &expr, precision)?;
    Ok(BuiltinOutcome::Evaluated(approximated))
}

fn approximate(
    ev: &mut Evaluator,
    expr: &Expr,
    precision: Option<usize>,
) -> Result<Expr, EvalError> {
    // Symbol-attached N-rules beat the structural conversion: this is how
    // constants like Pi get their numeric values.
    if let Some(sym) = expr.lookup_symbol() {
        let rules: Vec<Rule> = ev.defs.lookup(sym).nvalues.iter().cloned().collect();
        for rule in rules {
            if let Some(bindings) = match_expr(ev, &rule.pattern, expr) {
                let result = substitute(&rule.replacement, &bindings);
                return ev.eval_nested(&result);
            }
        }
    }

    match expr {
        Expr::Integer(i) => Ok(integer_to_real(i, precision)),
        Expr::Rational(r) => Ok(match precision {
            None => Expr::real(rational_to_f64(expr)),
            Some(p) => Expr::Real(Real::Big(dbig_from_rbig(r, p))),
        }),
        Expr::Real(r) => Ok(match precision {
            // Reals keep their representation at machine precision.
            None => Expr::real(r.to_f64()),
            Some(p) => match r {
                Real::Machine(_) => Expr::Real(r.clone()),
                Real::Big(v) => Expr::Real(Real::Big(v.clone().with_precision(p).value())),
            },
        }),
        Expr::Complex(c) => {
            let re = approximate(ev, &c.re, precision)?;
            let im = approximate(ev, &c.im, precision)?;
            Ok(Expr::complex(re, im))
        }
        Expr::String(_) | Expr::Symbol(_) => Ok(expr.clone()),
        Expr::Normal(node) => {
            let attrs = node
                .head_symbol()
                .map(|s| ev.defs.attributes(s))
                .unwrap_or_default();
            let mut elements = Vec::with_capacity(node.elements().len());
            for (i, elem) in node.elements().iter().enumerate() {
                if held(attrs, i) {
                    elements.push(elem.clone());
                } else {
                    elements.push(approximate(ev, elem, precision)?);
                }
            }
            let rebuilt = Expr::normal(node.head().clone(), elements);
            ev.eval_nested(&rebuilt)
        }
    }
}

fn held(attrs: Attributes, index: usize) -> bool {
    attrs.contains(Attributes::HOLD_ALL_COMPLETE)
        || attrs.contains(Attributes::HOLD_ALL)
        || (index == 0 && attrs.contains(Attributes::HOLD_FIRST))
        || (index > 0 && attrs.contains(Attributes::HOLD_REST))
}

fn integer_to_real(i: &IBig, precision: Option<usize>) -> Expr {
    match precision {
        None => {
            let approx: f64 = i.to_f64().value();
            Expr::real(approx)
        }
        Some(p) => Expr::Real(Real::Big(dbig_from_ibig(i, p))),
    }
}

fn rational_to_f64(e: &Expr) -> f64 {
    tungsten_core::number::real_value(e).unwrap_or(f64::NAN)
}

/// Register an N-rule for a symbol, the programmatic face of
/// `N[sym] = value`.
pub fn set_n_rule(ev: &mut Evaluator, sym: &Symbol, value: Expr) {
    let _ = ev.defs.add_rule(
        sym,
        tungsten_rewrite::ValueKind::N,
        Rule::system(Expr::Symbol(sym.clone()), value),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integers_approximate_to_machine_reals() {
        let mut ev = Evaluator::new();
        let out = ev.evaluate(&Expr::normal(Expr::system("N"), vec![Expr::int(3)]));
        assert_eq!(out, Expr::real(3.0));
    }

    #[test]
    fn rationals_approximate_to_their_quotient() {
        let mut ev = Evaluator::new();
        let out = ev.evaluate(&Expr::normal(Expr::system("N"), vec![Expr::ratio(1, 2)]));
        assert_eq!(out, Expr::real(0.5));
    }

    #[test]
    fn pi_has_a_numeric_value() {
        let mut ev = Evaluator::new();
        let out = ev.evaluate(&Expr::normal(Expr::system("N"), vec![Expr::system("Pi")]));
        assert_eq!(out, Expr::real(std::f64::consts::PI));
    }

    #[test]
    fn n_recurses_into_compounds_and_reevaluates() {
        let mut ev = Evaluator::new();
        // N[1/2 + x] leaves the symbol but converts the rational.
        let e = Expr::normal(
            Expr::system("N"),
            vec![Expr::normal(
                Expr::system("Plus"),
                vec![Expr::ratio(1, 2), Expr::symbol("x")],
            )],
        );
        let out = ev.evaluate(&e);
        assert_eq!(
            out.elements(),
            &[Expr::real(0.5), Expr::symbol("x")]
        );
    }

    #[test]
    fn precision_argument_produces_big_reals() {
        let mut ev = Evaluator::new();
        let out = ev.evaluate(&Expr::normal(
            Expr::system("N"),
            vec![Expr::int(2), Expr::int(30)],
        ));
        match out {
            Expr::Real(Real::Big(v)) => assert_eq!(v.precision(), 30),
            other => panic!("expected a big real, got {other}"),
        }
    }
}
