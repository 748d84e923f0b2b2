//! Canonical total order over expressions.
//!
//! `Orderless` normalization sorts element lists with this order, which makes
//! structurally equal results out of `b + a` and `a + b` and gives rule
//! matching a stable element layout. Numbers sort first (by value, exact
//! types before inexact on ties), then strings, then symbols by qualified
//! name, then compound nodes by element count, head, and elements.

use std::cmp::Ordering;

use crate::expr::Expr;
use crate::number::{numeric_cmp, real_value, type_rank};

fn class_rank(e: &Expr) -> u8 {
    match e {
        _ if e.is_number() => 0,
        Expr::String(_) => 1,
        Expr::Symbol(_) => 2,
        Expr::Normal(_) => 3,
        _ => 0,
    }
}

/// Approximate value of the real part, used to place complexes among the
/// other numbers.
fn number_value(e: &Expr) -> f64 {
    match e {
        Expr::Complex(c) => real_value(&c.re).unwrap_or(0.0),
        _ => real_value(e).unwrap_or(0.0),
    }
}

pub fn canonical_cmp(a: &Expr, b: &Expr) -> Ordering {
    let rank = class_rank(a).cmp(&class_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        _ if a.is_number() && b.is_number() => {
            let by_value = match (a, b) {
                (Expr::Complex(_), _) | (_, Expr::Complex(_)) => {
                    let re = number_value(a).partial_cmp(&number_value(b));
                    re.unwrap_or(Ordering::Equal).then_with(|| {
                        let ia = match a {
                            Expr::Complex(c) => real_value(&c.im).unwrap_or(0.0),
                            _ => 0.0,
                        };
                        let ib = match b {
                            Expr::Complex(c) => real_value(&c.im).unwrap_or(0.0),
                            _ => 0.0,
                        };
                        ia.partial_cmp(&ib).unwrap_or(Ordering::Equal)
                    })
                }
                _ => numeric_cmp(a, b).unwrap_or(Ordering::Equal),
            };
            by_value.then_with(|| type_rank(a).cmp(&type_rank(b)))
        }
        (Expr::String(x), Expr::String(y)) => x.cmp(y),
        (Expr::Symbol(x), Expr::Symbol(y)) => x.name().cmp(y.name()),
        (Expr::Normal(x), Expr::Normal(y)) => x
            .elements()
            .len()
            .cmp(&y.elements().len())
            .then_with(|| canonical_cmp(x.head(), y.head()))
            .then_with(|| {
                for (ea, eb) in x.elements().iter().zip(y.elements()) {
                    let c = canonical_cmp(ea, eb);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                Ordering::Equal
            }),
        _ => Ordering::Equal,
    }
}

/// Sort elements into canonical order (stable, so `same_q`-equal elements
/// keep their relative positions).
pub fn sort_canonical(elements: &mut [Expr]) {
    elements.sort_by(canonical_cmp);
}
