//! Native arithmetic: numeric combining for `Plus` and `Times`, exact
//! integer/rational powers, and the derived forms `Minus`, `Subtract`,
//! `Divide` rewritten into the canonical heads.
//!
//! By the time a handler runs, the rewrite loop has already flattened and
//! canonically sorted the elements, so all numeric atoms sit at the front.
//! Handlers must return `NoMatch` when they would reproduce their input;
//! the loop treats `Evaluated` as progress.

use dashu::integer::IBig;
use tungsten_core::number::{add_numbers, exact_reciprocal, mul_numbers, neg_number};
use tungsten_core::{EvalError, Expr, Normal};

use crate::eval::{BuiltinOutcome, Evaluator};

/// Split a term into a numeric coefficient and a base, so that like terms
/// can be collected: `Times[3, x, y]` is `(3, Times[x, y])`, a bare `x` is
/// `(1, x)`.
fn coefficient_split(term: &Expr) -> (Expr, Expr) {
    if let Expr::Normal(n) = term {
        if term.has_form("Times", tungsten_core::Arity::AtLeast(2))
            && n.elements()[0].is_number()
        {
            let coeff = n.elements()[0].clone();
            let rest = &n.elements()[1..];
            let base = if rest.len() == 1 {
                rest[0].clone()
            } else {
                Expr::normal(Expr::system("Times"), rest.to_vec())
            };
            return (coeff, base);
        }
    }
    (Expr::int(1), term.clone())
}

fn rebuild_term(coeff: Expr, base: Expr) -> Option<Expr> {
    if coeff.same_q(&Expr::int(0)) {
        return None;
    }
    if coeff.same_q(&Expr::int(1)) {
        return Some(base);
    }
    Some(Expr::normal(Expr::system("Times"), vec![coeff, base]))
}

pub fn plus(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.is_empty() {
        return Ok(BuiltinOutcome::Evaluated(Expr::int(0)));
    }
    if elems.len() == 1 {
        return Ok(BuiltinOutcome::Evaluated(elems[0].clone()));
    }

    // Fold the leading numeric atoms.
    let mut number: Option<Expr> = None;
    let mut terms: Vec<(Expr, Expr)> = Vec::new();
    for e in elems {
        if e.is_number() {
            number = Some(match &number {
                None => e.clone(),
                Some(acc) => match add_numbers(acc, e) {
                    Some(sum) => sum,
                    None => return Ok(BuiltinOutcome::NoMatch),
                },
            });
            continue;
        }
        // Collect like symbolic terms by base.
        let (coeff, base) = coefficient_split(e);
        match terms.iter_mut().find(|(_, b)| b.same_q(&base)) {
            Some((c, _)) => {
                *c = match add_numbers(c, &coeff) {
                    Some(sum) => sum,
                    None => return Ok(BuiltinOutcome::NoMatch),
                };
            }
            None => terms.push((coeff, base)),
        }
    }

    let mut out: Vec<Expr> = Vec::new();
    if let Some(num) = number {
        // An exact zero summand vanishes; inexact zeros are kept.
        if !num.same_q(&Expr::int(0)) || terms.is_empty() {
            out.push(num);
        }
    }
    for (coeff, base) in terms {
        if let Some(term) = rebuild_term(coeff, base) {
            out.push(term);
        }
    }

    let result = match out.len() {
        0 => Expr::int(0),
        1 => out.pop().unwrap_or_else(|| Expr::int(0)),
        _ => Expr::normal(Expr::system("Plus"), out),
    };
    if result.same_q(&Expr::Normal(Box::new(n.clone()))) {
        Ok(BuiltinOutcome::NoMatch)
    } else {
        Ok(BuiltinOutcome::Evaluated(result))
    }
}

pub fn times(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.is_empty() {
        return Ok(BuiltinOutcome::Evaluated(Expr::int(1)));
    }
    if elems.len() == 1 {
        return Ok(BuiltinOutcome::Evaluated(elems[0].clone()));
    }

    let mut number: Option<Expr> = None;
    let mut rest: Vec<Expr> = Vec::new();
    for e in elems {
        if e.is_number() {
            number = Some(match &number {
                None => e.clone(),
                Some(acc) => match mul_numbers(acc, e) {
                    Some(prod) => prod,
                    None => return Ok(BuiltinOutcome::NoMatch),
                },
            });
        } else {
            rest.push(e.clone());
        }
    }

    // An exact zero factor annihilates the product.
    if matches!(&number, Some(num) if num.same_q(&Expr::int(0))) {
        return Ok(BuiltinOutcome::Evaluated(Expr::int(0)));
    }

    let mut out: Vec<Expr> = Vec::new();
    if let Some(num) = number {
        if !num.same_q(&Expr::int(1)) || rest.is_empty() {
            out.push(num);
        }
    }
    out.extend(rest);

    let result = match out.len() {
        0 => Expr::int(1),
        1 => out.pop().unwrap_or_else(|| Expr::int(1)),
        _ => Expr::normal(Expr::system("Times"), out),
    };
    if result.same_q(&Expr::Normal(Box::new(n.clone()))) {
        Ok(BuiltinOutcome::NoMatch)
    } else {
        Ok(BuiltinOutcome::Evaluated(result))
    }
}

/// Integer power by squaring; exponent magnitudes beyond `u32` are left
/// symbolic by the caller.
fn ipow(base: &IBig, exp: u32) -> IBig {
    let mut result = IBig::from(1);
    let mut base = base.clone();
    let mut exp = exp;
    while exp > 0 {
        if exp & 1 == 1 {
            result = &result * &base;
        }
        base = &base * &base;
        exp >>= 1;
    }
    result
}

fn exact_pow(base: &Expr, exp: i64) -> Option<Expr> {
    let mag = u32::try_from(exp.unsigned_abs()).ok()?;
    let raised = match base {
        Expr::Integer(i) => Expr::Integer(ipow(i, mag)),
        Expr::Rational(r) => {
            let num = ipow(r.numerator(), mag);
            let den = ipow(&IBig::from(r.denominator().clone()), mag);
            Expr::rational(num, den).ok()?
        }
        _ => return None,
    };
    if exp < 0 {
        exact_reciprocal(&raised)
    } else {
        Some(raised)
    }
}

pub fn power(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() == 1 {
        return Ok(BuiltinOutcome::Evaluated(elems[0].clone()));
    }
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let (base, exp) = (&elems[0], &elems[1]);

    // Structural identities first.
    if exp.same_q(&Expr::int(0)) {
        return Ok(BuiltinOutcome::Evaluated(Expr::int(1)));
    }
    if exp.same_q(&Expr::int(1)) {
        return Ok(BuiltinOutcome::Evaluated(base.clone()));
    }
    if base.same_q(&Expr::int(1)) {
        return Ok(BuiltinOutcome::Evaluated(Expr::int(1)));
    }

    if let Expr::Integer(e) = exp {
        if let Ok(e64) = i64::try_from(e.clone()) {
            if let Some(result) = exact_pow(base, e64) {
                return Ok(BuiltinOutcome::Evaluated(result));
            }
            if let (Expr::Real(r), Ok(e32)) = (base, i32::try_from(e64)) {
                return Ok(BuiltinOutcome::Evaluated(Expr::real(r.to_f64().powi(e32))));
            }
        }
    }
    if let (Expr::Real(b), Expr::Real(e)) = (base, exp) {
        return Ok(BuiltinOutcome::Evaluated(Expr::real(b.to_f64().powf(e.to_f64()))));
    }
    if let Expr::Real(e) = exp {
        if let Some(b) = tungsten_core::number::real_value(base) {
            return Ok(BuiltinOutcome::Evaluated(Expr::real(b.powf(e.to_f64()))));
        }
    }
    Ok(BuiltinOutcome::NoMatch)
}

pub fn minus(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() != 1 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let result = match neg_number(&elems[0]) {
        Some(negated) => negated,
        None => Expr::normal(
            Expr::system("Times"),
            vec![Expr::int(-1), elems[0].clone()],
        ),
    };
    Ok(BuiltinOutcome::Evaluated(result))
}

pub fn subtract(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let negated = Expr::normal(
        Expr::system("Times"),
        vec![Expr::int(-1), elems[1].clone()],
    );
    Ok(BuiltinOutcome::Evaluated(Expr::normal(
        Expr::system("Plus"),
        vec![elems[0].clone(), negated],
    )))
}

pub fn divide(ev: &mut Evaluator, n: &Normal) -> Result<BuiltinOutcome, EvalError> {
    let _ = ev;
    let elems = n.elements();
    if elems.len() != 2 {
        return Ok(BuiltinOutcome::NoMatch);
    }
    let inverse = Expr::normal(
        Expr::system("Power"),
        vec![elems[1].clone(), Expr::int(-1)],
    );
    Ok(BuiltinOutcome::Evaluated(Expr::normal(
        Expr::system("Times"),
        vec![elems[0].clone(), inverse],
    )))
}
