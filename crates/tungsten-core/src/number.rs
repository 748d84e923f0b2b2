//! Numeric atoms and the promotion arithmetic the builtin rule providers
//! lean on. The heavy lifting is delegated to `dashu` (arbitrary precision
//! integers, rationals and decimal floats).

use dashu::base::{Approximation, Signed, UnsignedAbs};
use dashu::float::{DBig, FBig};
use dashu::integer::IBig;
use dashu::rational::RBig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::expr::Expr;

/// An inexact real number: either a machine double or an arbitrary-precision
/// decimal float. The two never compare `same_q` equal, even at the same
/// numeric value. A big real's precision tag is the decimal precision carried
/// by the underlying `DBig`, so it cannot drift out of sync with the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Real {
    Machine(f64),
    Big(DBig),
}

impl Real {
    /// Decimal digits of precision claimed by this value. Machine reals
    /// report the conventional machine precision.
    pub fn precision(&self) -> usize {
        match self {
            Real::Machine(_) => 16,
            Real::Big(v) => v.precision(),
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Real::Machine(f) => *f,
            Real::Big(v) => v.to_f64().value(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Real::Machine(f) => *f == 0.0,
            Real::Big(v) => *v == DBig::ZERO,
        }
    }
}

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Real::Machine(a), Real::Machine(b)) => a == b,
            (Real::Big(a), Real::Big(b)) => a == b && a.precision() == b.precision(),
            _ => false,
        }
    }
}

/// Convert a machine double to an arbitrary-precision decimal. Fails for
/// NaN and infinities.
pub fn dbig_from_f64(f: f64) -> Option<DBig> {
    let binary: FBig = FBig::try_from(f).ok()?;
    Some(match binary.to_decimal() {
        Approximation::Exact(v) => v,
        Approximation::Inexact(v, _) => v,
    })
}

/// An exact rational rendered as a decimal float at `prec` digits.
pub fn dbig_from_rbig(r: &RBig, prec: usize) -> DBig {
    let num = DBig::from(r.numerator().clone()).with_precision(prec).value();
    let den = DBig::from(IBig::from(r.denominator().clone()))
        .with_precision(prec)
        .value();
    num / den
}

pub fn dbig_from_ibig(i: &IBig, prec: usize) -> DBig {
    DBig::from(i.clone()).with_precision(prec).value()
}

/// Approximate any real-valued numeric atom as f64. `None` for non-numbers
/// and complexes.
pub fn real_value(e: &Expr) -> Option<f64> {
    match e {
        Expr::Integer(i) => Some(i.to_f64().value()),
        Expr::Rational(r) => Some(r.to_f64().value()),
        Expr::Real(r) => Some(r.to_f64()),
        _ => None,
    }
}

/// Rank of a number's type for canonical ordering ties: exact before
/// inexact, machine last.
pub fn type_rank(e: &Expr) -> u8 {
    match e {
        Expr::Integer(_) => 0,
        Expr::Rational(_) => 1,
        Expr::Real(Real::Big(_)) => 2,
        Expr::Real(Real::Machine(_)) => 3,
        Expr::Complex(_) => 4,
        _ => 5,
    }
}

/// Numeric comparison of two real-valued atoms, exact where both sides are
/// exact, by f64 approximation otherwise.
pub fn numeric_cmp(a: &Expr, b: &Expr) -> Option<Ordering> {
    match (a, b) {
        (Expr::Integer(x), Expr::Integer(y)) => Some(x.cmp(y)),
        (Expr::Rational(x), Expr::Rational(y)) => Some(x.cmp(y)),
        (Expr::Integer(x), Expr::Rational(y)) => Some(RBig::from(x.clone()).cmp(y)),
        (Expr::Rational(x), Expr::Integer(y)) => Some(x.cmp(&RBig::from(y.clone()))),
        _ => {
            let (x, y) = (real_value(a)?, real_value(b)?);
            x.partial_cmp(&y)
        }
    }
}

/// Sum of two real-valued numeric atoms, with the usual precision
/// contagion: machine reals dominate, big reals absorb exact values at
/// their own precision.
pub fn add_numbers(a: &Expr, b: &Expr) -> Option<Expr> {
    binary_op(
        a,
        b,
        |x, y| x + y,
        |x, y| x + y,
        |x, y| x + y,
        |x, y| x + y,
    )
}

/// Product counterpart of [`add_numbers`].
pub fn mul_numbers(a: &Expr, b: &Expr) -> Option<Expr> {
    binary_op(
        a,
        b,
        |x, y| x * y,
        |x, y| x * y,
        |x, y| x * y,
        |x, y| x * y,
    )
}

fn binary_op(
    a: &Expr,
    b: &Expr,
    int_op: fn(&IBig, &IBig) -> IBig,
    rat_op: fn(&RBig, &RBig) -> RBig,
    big_op: fn(&DBig, &DBig) -> DBig,
    f64_op: fn(f64, f64) -> f64,
) -> Option<Expr> {
    match (a, b) {
        (Expr::Complex(_), _) | (_, Expr::Complex(_)) => None,
        (Expr::Integer(x), Expr::Integer(y)) => Some(Expr::Integer(int_op(x, y))),
        (Expr::Real(Real::Machine(_)), _) | (_, Expr::Real(Real::Machine(_))) => {
            Some(Expr::real(f64_op(real_value(a)?, real_value(b)?)))
        }
        (Expr::Real(Real::Big(x)), Expr::Real(Real::Big(y))) => {
            Some(Expr::Real(Real::Big(big_op(x, y))))
        }
        (Expr::Real(Real::Big(x)), _) => {
            let y = as_dbig(b, x.precision())?;
            Some(Expr::Real(Real::Big(big_op(x, &y))))
        }
        (_, Expr::Real(Real::Big(y))) => {
            let x = as_dbig(a, y.precision())?;
            Some(Expr::Real(Real::Big(big_op(&x, y))))
        }
        _ => {
            let x = as_rbig(a)?;
            let y = as_rbig(b)?;
            Some(Expr::from_rbig(rat_op(&x, &y)))
        }
    }
}

fn as_rbig(e: &Expr) -> Option<RBig> {
    match e {
        Expr::Integer(i) => Some(RBig::from(i.clone())),
        Expr::Rational(r) => Some(r.clone()),
        _ => None,
    }
}

fn as_dbig(e: &Expr, prec: usize) -> Option<DBig> {
    match e {
        Expr::Integer(i) => Some(dbig_from_ibig(i, prec)),
        Expr::Rational(r) => Some(dbig_from_rbig(r, prec)),
        Expr::Real(Real::Big(v)) => Some(v.clone()),
        Expr::Real(Real::Machine(f)) => dbig_from_f64(*f),
        _ => None,
    }
}

/// Negation preserving exactness.
pub fn neg_number(e: &Expr) -> Option<Expr> {
    match e {
        Expr::Integer(i) => Some(Expr::Integer(-i.clone())),
        Expr::Rational(r) => Some(Expr::Rational(-r.clone())),
        Expr::Real(Real::Machine(f)) => Some(Expr::real(-f)),
        Expr::Real(Real::Big(v)) => Some(Expr::Real(Real::Big(-v.clone()))),
        Expr::Complex(c) => {
            let re = neg_number(&c.re)?;
            let im = neg_number(&c.im)?;
            Some(Expr::complex(re, im))
        }
        _ => None,
    }
}

/// Exact reciprocal of an integer or rational. `None` for zero and for
/// inexact values (those go through f64 arithmetic instead).
pub fn exact_reciprocal(e: &Expr) -> Option<Expr> {
    match e {
        Expr::Integer(i) if *i != IBig::ZERO => Some(Expr::from_rbig(RBig::from_parts(
            if i.is_negative() { IBig::from(-1) } else { IBig::from(1) },
            i.clone().unsigned_abs(),
        ))),
        Expr::Rational(r) => {
            let num = IBig::from(r.denominator().clone());
            let num = if r.numerator().is_negative() { -num } else { num };
            Some(Expr::from_rbig(RBig::from_parts(
                num,
                r.numerator().clone().unsigned_abs(),
            )))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_addition_stays_exact() {
        let a = Expr::int(2);
        let b = Expr::int(3);
        assert_eq!(add_numbers(&a, &b), Some(Expr::int(5)));
    }

    #[test]
    fn rational_product_reduces_to_integer() {
        let half = Expr::ratio(1, 2);
        let two = Expr::int(2);
        assert_eq!(mul_numbers(&half, &two), Some(Expr::int(1)));
    }

    #[test]
    fn machine_real_dominates() {
        let a = Expr::ratio(1, 2);
        let b = Expr::real(0.5);
        assert_eq!(add_numbers(&a, &b), Some(Expr::real(1.0)));
    }

    #[test]
    fn machine_and_exact_never_same_q() {
        assert!(Expr::int(1) != Expr::real(1.0));
    }

    #[test]
    fn reciprocal_of_negative_rational() {
        let r = Expr::ratio(-2, 3);
        assert_eq!(exact_reciprocal(&r), Some(Expr::ratio(-3, 2)));
    }
}
