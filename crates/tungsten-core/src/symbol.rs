use serde::{Deserialize, Serialize};
use std::fmt;

pub const SYSTEM_CONTEXT: &str = "System`";
pub const GLOBAL_CONTEXT: &str = "Global`";

/// A symbol identified by its fully qualified name, ``Context`ShortName``.
///
/// The evaluator never performs context resolution: the parser (an external
/// collaborator) hands over fully qualified names. Constructors here only
/// qualify *bare* names, defaulting them into the ``Global``` context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// A name that may or may not carry a context. Bare names land in
    /// ``Global```.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.contains('`') {
            Symbol(name)
        } else {
            Symbol(format!("{GLOBAL_CONTEXT}{name}"))
        }
    }

    /// A short name qualified into ``System```.
    pub fn system(short: &str) -> Self {
        Symbol(format!("{SYSTEM_CONTEXT}{short}"))
    }

    /// A short name qualified into ``Global```.
    pub fn global(short: &str) -> Self {
        Symbol(format!("{GLOBAL_CONTEXT}{short}"))
    }

    /// The full qualified name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The part after the last backtick.
    pub fn short_name(&self) -> &str {
        match self.0.rfind('`') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// The context prefix, including the trailing backtick.
    pub fn context(&self) -> &str {
        match self.0.rfind('`') {
            Some(pos) => &self.0[..=pos],
            None => "",
        }
    }

    pub fn is_system(&self) -> bool {
        self.context() == SYSTEM_CONTEXT
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_names_default_to_global() {
        let s = Symbol::new("x");
        assert_eq!(s.name(), "Global`x");
        assert_eq!(s.short_name(), "x");
        assert_eq!(s.context(), "Global`");
        assert!(!s.is_system());
    }

    #[test]
    fn qualified_names_pass_through() {
        let s = Symbol::new("System`Plus");
        assert_eq!(s, Symbol::system("Plus"));
        assert_eq!(s.short_name(), "Plus");
        assert!(s.is_system());
    }
}
