//! Core expression data model for the Tungsten rewrite engine.
//!
//! An [`Expr`] is a closed tagged union: number/string atoms, symbols
//! identified by fully qualified names, and compound [`Normal`] nodes
//! (`head[element, ...]`). Compound nodes carry conservative cached flags
//! that let the evaluator skip redundant normalization passes.

pub mod error;
pub mod expr;
pub mod number;
pub mod order;
pub mod symbol;

pub use error::EvalError;
pub use expr::{Arity, Expr, Normal, NormalFlags};
pub use number::Real;
pub use order::canonical_cmp;
pub use symbol::Symbol;
