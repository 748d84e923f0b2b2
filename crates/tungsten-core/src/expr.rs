use dashu::integer::IBig;
use dashu::rational::RBig;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EvalError;
use crate::number::Real;
use crate::order::canonical_cmp;
use crate::symbol::Symbol;

/// An M-expression tree node. Atoms are immutable value types; compound
/// nodes own their elements outright (a tree, never a graph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Integer(IBig),
    /// Always reduced, denominator strictly greater than 1 (a rational with
    /// denominator 1 is constructed as an `Integer` instead).
    Rational(RBig),
    Real(Real),
    /// Real and imaginary parts are real-valued atoms, never complex.
    Complex(Box<Complex>),
    String(String),
    Symbol(Symbol),
    Normal(Box<Normal>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: Expr,
    pub im: Expr,
}

/// Invariant-tracking flags on a compound node. Conservative: a set flag
/// guarantees the property, a clear flag promises nothing. `same_q` and
/// `PartialEq` ignore them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NormalFlags {
    /// No element shares this node's head and no element is a `Sequence`.
    pub is_flat: bool,
    /// Elements are in canonical order.
    pub is_sorted: bool,
    /// Every element is already at its evaluation fixed point.
    pub elements_evaluated: bool,
}

/// A compound node `head[e1, ..., en]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normal {
    head: Expr,
    elements: Vec<Expr>,
    #[serde(default, skip)]
    flags: NormalFlags,
}

impl PartialEq for Normal {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.elements == other.elements
    }
}

impl Normal {
    pub fn head(&self) -> &Expr {
        &self.head
    }

    pub fn elements(&self) -> &[Expr] {
        &self.elements
    }

    pub fn flags(&self) -> NormalFlags {
        self.flags
    }

    pub fn into_parts(self) -> (Expr, Vec<Expr>) {
        (self.head, self.elements)
    }

    /// Head's symbol when the head is a bare symbol.
    pub fn head_symbol(&self) -> Option<&Symbol> {
        match &self.head {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn set_elements_evaluated(&mut self) {
        self.flags.elements_evaluated = true;
    }
}

/// Structural arity test used by `has_form`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Among(&'static [usize]),
    Any,
}

impl Arity {
    fn admits(&self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == *k,
            Arity::AtLeast(k) => n >= *k,
            Arity::Among(ks) => ks.contains(&n),
            Arity::Any => true,
        }
    }
}

impl Expr {
    pub fn int(v: i64) -> Expr {
        Expr::Integer(IBig::from(v))
    }

    pub fn real(v: f64) -> Expr {
        Expr::Real(Real::Machine(v))
    }

    pub fn string(s: impl Into<String>) -> Expr {
        Expr::String(s.into())
    }

    /// A symbol; bare names default into ``Global```.
    pub fn symbol(name: impl Into<String>) -> Expr {
        Expr::Symbol(Symbol::new(name))
    }

    /// A ``System``` symbol from its short name.
    pub fn system(short: &str) -> Expr {
        Expr::Symbol(Symbol::system(short))
    }

    /// A reduced rational. Denominator 1 collapses to an integer;
    /// denominator 0 is a malformed value and refused.
    pub fn rational(num: IBig, den: IBig) -> Result<Expr, EvalError> {
        use dashu::base::{Signed, UnsignedAbs};
        if den == IBig::ZERO {
            return Err(EvalError::MalformedRational);
        }
        let num = if den.is_negative() { -num } else { num };
        Ok(Expr::from_rbig(RBig::from_parts(num, den.unsigned_abs())))
    }

    /// Infallible small-rational literal for rule tables and tests; a zero
    /// denominator collapses to the integer numerator rather than panic.
    pub fn ratio(num: i64, den: i64) -> Expr {
        Expr::rational(IBig::from(num), IBig::from(den)).unwrap_or_else(|_| Expr::int(num))
    }

    /// Normalize an `RBig`: integral values become `Integer` atoms.
    pub fn from_rbig(r: RBig) -> Expr {
        if *r.denominator() == dashu::integer::UBig::ONE {
            Expr::Integer(r.numerator().clone())
        } else {
            Expr::Rational(r)
        }
    }

    /// A complex atom; an exact-zero imaginary part collapses to the real
    /// part.
    pub fn complex(re: Expr, im: Expr) -> Expr {
        let exact_zero = matches!(&im, Expr::Integer(i) if *i == IBig::ZERO);
        if exact_zero {
            re
        } else {
            Expr::Complex(Box::new(Complex { re, im }))
        }
    }

    /// A compound node. Computes the conservative normalization flags at
    /// construction so the evaluator can skip redundant passes.
    pub fn normal(head: Expr, elements: Vec<Expr>) -> Expr {
        let head_sym = match &head {
            Expr::Symbol(s) => Some(s.clone()),
            _ => None,
        };
        let is_flat = elements.iter().all(|e| match e {
            Expr::Normal(n) => match (n.head_symbol(), &head_sym) {
                (Some(h), _) if h.is_system() && h.short_name() == "Sequence" => false,
                (Some(h), Some(outer)) => h != outer,
                _ => true,
            },
            _ => true,
        });
        let is_sorted = elements
            .windows(2)
            .all(|w| canonical_cmp(&w[0], &w[1]) != std::cmp::Ordering::Greater);
        Expr::Normal(Box::new(Normal {
            head,
            elements,
            flags: NormalFlags {
                is_flat,
                is_sorted,
                elements_evaluated: false,
            },
        }))
    }

    /// `normal` plus the promise that every element is already evaluated.
    /// Used by the evaluator when it builds results from evaluated parts.
    pub fn normal_evaluated(head: Expr, elements: Vec<Expr>) -> Expr {
        match Expr::normal(head, elements) {
            Expr::Normal(mut n) => {
                n.set_elements_evaluated();
                Expr::Normal(n)
            }
            other => other,
        }
    }

    pub fn as_normal(&self) -> Option<&Normal> {
        match self {
            Expr::Normal(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The node's head. Atoms report their builtin class head
    /// (`System`Integer`, `System`Symbol`, ...).
    pub fn head(&self) -> Expr {
        match self {
            Expr::Integer(_) => Expr::system("Integer"),
            Expr::Rational(_) => Expr::system("Rational"),
            Expr::Real(_) => Expr::system("Real"),
            Expr::Complex(_) => Expr::system("Complex"),
            Expr::String(_) => Expr::system("String"),
            Expr::Symbol(_) => Expr::system("Symbol"),
            Expr::Normal(n) => n.head().clone(),
        }
    }

    /// Fully qualified name of the head when the head is a symbol.
    pub fn head_name(&self) -> Option<String> {
        match self.head() {
            Expr::Symbol(s) => Some(s.name().to_string()),
            _ => None,
        }
    }

    /// The symbol whose definition governs this expression: the symbol
    /// itself, a compound's head symbol, or for curried heads (`f[a][b]`)
    /// the innermost head symbol.
    pub fn lookup_symbol(&self) -> Option<&Symbol> {
        match self {
            Expr::Symbol(s) => Some(s),
            Expr::Normal(n) => n.head().lookup_symbol(),
            _ => None,
        }
    }

    pub fn elements(&self) -> &[Expr] {
        match self {
            Expr::Normal(n) => n.elements(),
            _ => &[],
        }
    }

    pub fn is_atom(&self) -> bool {
        !matches!(self, Expr::Normal(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Expr::Integer(_) | Expr::Rational(_) | Expr::Real(_) | Expr::Complex(_)
        )
    }

    /// Literal atoms evaluate to themselves with no definition lookup.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Integer(_) | Expr::Rational(_) | Expr::Real(_) | Expr::Complex(_) | Expr::String(_)
        )
    }

    /// Structural test: head is the ``System``` symbol `name` and `arity`
    /// admits the element count. No evaluation is performed.
    pub fn has_form(&self, name: &str, arity: Arity) -> bool {
        match self {
            Expr::Normal(n) => match n.head_symbol() {
                Some(h) => {
                    h.is_system() && h.short_name() == name && arity.admits(n.elements().len())
                }
                None => false,
            },
            _ => false,
        }
    }

    /// `true` when this is `Sequence[...]`.
    pub fn is_sequence(&self) -> bool {
        self.has_form("Sequence", Arity::Any)
    }

    /// Structural identity, the `SameQ` relation: atom values compare by
    /// value *and* numeric type (`1` is never `same_q` `1.0`), compound
    /// nodes recursively, cached flags ignored.
    pub fn same_q(&self, other: &Expr) -> bool {
        self == other
    }
}

impl fmt::Display for Expr {
    /// FullForm-style rendering, used by messages and test diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(i) => write!(f, "{i}"),
            Expr::Rational(r) => write!(f, "{}/{}", r.numerator(), r.denominator()),
            Expr::Real(Real::Machine(v)) => write!(f, "{v:?}"),
            Expr::Real(Real::Big(v)) => write!(f, "{v}"),
            Expr::Complex(c) => write!(f, "Complex[{}, {}]", c.re, c.im),
            Expr::String(s) => write!(f, "{s:?}"),
            Expr::Symbol(s) => {
                // System symbols render short, everything else qualified.
                if s.is_system() {
                    f.write_str(s.short_name())
                } else {
                    f.write_str(s.name())
                }
            }
            Expr::Normal(n) => {
                write!(f, "{}[", n.head())?;
                for (i, e) in n.elements().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
        }
    }
}
