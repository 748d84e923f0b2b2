//! The Tungsten evaluator: rewrite-to-fixpoint over the `tungsten-rewrite`
//! definitions database, plus the builtin set the core loop depends on
//! (arithmetic combining, assignment, attribute manipulation, evaluation
//! control, `N`).

pub mod builtins;
pub mod eval;
pub mod messages;
pub mod nvalue;

pub use eval::{Evaluator, EvaluatorConfig};
pub use messages::{EvalMessage, Messages};
