//! Pattern matching, rule ordering, and the definitions database.
//!
//! The matcher is a backtracking search over candidate bindings; failure is
//! the absence of a binding set, never an error. Rule lists are kept sorted
//! by pattern specificity with an explicit newest-wins tie-break, so the
//! most constrained applicable rule always fires first.

pub mod attrs;
pub mod defs;
pub mod matcher;
pub mod pattern;
pub mod rule;
pub mod subst;

pub use attrs::Attributes;
pub use defs::{Definition, DefinitionError, Definitions, ValueKind};
pub use matcher::{match_expr, Bindings, MatchContext};
pub use pattern::{classify, PatternForm};
pub use rule::{pattern_sort_key, PatternKey, Rule, RuleSet};
pub use subst::substitute;
