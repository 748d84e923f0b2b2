//! Structural classification of pattern expressions.
//!
//! Patterns are ordinary expressions; the matcher recognizes the pattern
//! heads (`Blank`, `Pattern`, `Condition`, ...) by form. Anything that is
//! not a well-formed pattern construct is a literal to be compared
//! structurally.

use tungsten_core::{Arity, Expr, Symbol};

#[derive(Debug, Clone, Copy)]
pub enum PatternForm<'a> {
    /// `_` or `_h`.
    Blank(Option<&'a Expr>),
    /// `__` or `__h`.
    BlankSequence(Option<&'a Expr>),
    /// `___` or `___h`.
    BlankNullSequence(Option<&'a Expr>),
    /// `Pattern[name, p]` (`name : p`, `x_`, ...).
    Named { name: &'a Symbol, pattern: &'a Expr },
    /// `Optional[p]` / `Optional[p, default]` (`x_.`, `x_: v`).
    Optional {
        pattern: &'a Expr,
        default: Option<&'a Expr>,
    },
    /// `PatternTest[p, test]` (`p?test`).
    Test { pattern: &'a Expr, test: &'a Expr },
    /// `Condition[p, cond]` (`p /; cond`).
    Condition { pattern: &'a Expr, condition: &'a Expr },
    /// `Alternatives[p1, p2, ...]` (`p1 | p2 | ...`).
    Alternatives(&'a [Expr]),
    /// `Repeated[p]` (`p..`) / `RepeatedNull[p]` (`p...`).
    Repeated { pattern: &'a Expr, min_one: bool },
    /// `HoldPattern[p]`, transparent for matching.
    HoldPattern(&'a Expr),
    /// `Verbatim[e]`: `e` compared literally, pattern heads inert.
    Verbatim(&'a Expr),
    /// `Except[c]` / `Except[c, p]`.
    Except {
        forbidden: &'a Expr,
        pattern: Option<&'a Expr>,
    },
    /// Not a pattern construct; matched structurally.
    Literal(&'a Expr),
}

pub fn classify(e: &Expr) -> PatternForm<'_> {
    let n = match e.as_normal() {
        Some(n) => n,
        None => return PatternForm::Literal(e),
    };
    let head = match n.head_symbol() {
        Some(s) if s.is_system() => s.short_name(),
        _ => return PatternForm::Literal(e),
    };
    let elems = n.elements();
    match (head, elems.len()) {
        ("Blank", 0) => PatternForm::Blank(None),
        ("Blank", 1) => PatternForm::Blank(Some(&elems[0])),
        ("BlankSequence", 0) => PatternForm::BlankSequence(None),
        ("BlankSequence", 1) => PatternForm::BlankSequence(Some(&elems[0])),
        ("BlankNullSequence", 0) => PatternForm::BlankNullSequence(None),
        ("BlankNullSequence", 1) => PatternForm::BlankNullSequence(Some(&elems[0])),
        ("Pattern", 2) => match elems[0].as_symbol() {
            Some(name) => PatternForm::Named {
                name,
                pattern: &elems[1],
            },
            None => PatternForm::Literal(e),
        },
        ("Optional", 1) => PatternForm::Optional {
            pattern: &elems[0],
            default: None,
        },
        ("Optional", 2) => PatternForm::Optional {
            pattern: &elems[0],
            default: Some(&elems[1]),
        },
        ("PatternTest", 2) => PatternForm::Test {
            pattern: &elems[0],
            test: &elems[1],
        },
        ("Condition", 2) => PatternForm::Condition {
            pattern: &elems[0],
            condition: &elems[1],
        },
        ("Alternatives", _) => PatternForm::Alternatives(elems),
        ("Repeated", 1) => PatternForm::Repeated {
            pattern: &elems[0],
            min_one: true,
        },
        ("RepeatedNull", 1) => PatternForm::Repeated {
            pattern: &elems[0],
            min_one: false,
        },
        ("HoldPattern", 1) => PatternForm::HoldPattern(&elems[0]),
        ("Verbatim", 1) => PatternForm::Verbatim(&elems[0]),
        ("Except", 1) => PatternForm::Except {
            forbidden: &elems[0],
            pattern: None,
        },
        ("Except", 2) => PatternForm::Except {
            forbidden: &elems[0],
            pattern: Some(&elems[1]),
        },
        _ => PatternForm::Literal(e),
    }
}

/// Minimum number of candidate elements the pattern element demands: zero
/// for null sequences, optionals and `RepeatedNull` (including named
/// wrappings), one otherwise.
pub fn min_demand(p: &Expr) -> usize {
    match classify(p) {
        PatternForm::BlankNullSequence(_) => 0,
        PatternForm::Optional { .. } => 0,
        PatternForm::Repeated { min_one, .. } => usize::from(min_one),
        PatternForm::Named { pattern, .. } | PatternForm::Test { pattern, .. } => {
            min_demand(pattern)
        }
        _ => 1,
    }
}

/// Total demand of a run of pattern elements.
pub fn min_demand_all(pats: &[Expr]) -> usize {
    pats.iter().map(min_demand).sum()
}

/// Convenience constructors for pattern forms, used throughout the test
/// suites and by builtin rule tables.
pub mod build {
    use super::*;

    pub fn blank() -> Expr {
        Expr::normal(Expr::system("Blank"), vec![])
    }

    pub fn blank_head(head: &str) -> Expr {
        Expr::normal(Expr::system("Blank"), vec![Expr::system(head)])
    }

    /// `x_`
    pub fn named(name: &str) -> Expr {
        Expr::normal(
            Expr::system("Pattern"),
            vec![Expr::symbol(name), blank()],
        )
    }

    /// `x_h`
    pub fn named_head(name: &str, head: &str) -> Expr {
        Expr::normal(
            Expr::system("Pattern"),
            vec![Expr::symbol(name), blank_head(head)],
        )
    }

    /// `x__`
    pub fn named_sequence(name: &str) -> Expr {
        Expr::normal(
            Expr::system("Pattern"),
            vec![
                Expr::symbol(name),
                Expr::normal(Expr::system("BlankSequence"), vec![]),
            ],
        )
    }

    /// `x___`
    pub fn named_null_sequence(name: &str) -> Expr {
        Expr::normal(
            Expr::system("Pattern"),
            vec![
                Expr::symbol(name),
                Expr::normal(Expr::system("BlankNullSequence"), vec![]),
            ],
        )
    }

    /// `x_.`
    pub fn optional(name: &str) -> Expr {
        Expr::normal(Expr::system("Optional"), vec![named(name)])
    }

    pub fn condition(pattern: Expr, cond: Expr) -> Expr {
        Expr::normal(Expr::system("Condition"), vec![pattern, cond])
    }

    pub fn pattern_test(pattern: Expr, test: Expr) -> Expr {
        Expr::normal(Expr::system("PatternTest"), vec![pattern, test])
    }

    pub fn alternatives(alts: Vec<Expr>) -> Expr {
        Expr::normal(Expr::system("Alternatives"), alts)
    }
}

/// `true` for `Sequence[...]` nodes produced by sequence bindings.
pub fn is_sequence(e: &Expr) -> bool {
    e.has_form("Sequence", Arity::Any)
}
