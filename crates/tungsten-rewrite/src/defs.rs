//! The definitions database: per-symbol attributes, rule lists, defaults,
//! options and message templates.
//!
//! Definitions are created lazily; looking up a symbol never mutates the
//! table unless a rule or attribute is actually stored. Mutation goes
//! through checked methods so that `Protected` and `Locked` violations
//! surface as errors the caller can turn into messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tungsten_core::{Expr, Symbol};

use crate::attrs::Attributes;
use crate::rule::{Rule, RuleSet};

/// Which of a symbol's rule lists a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `x = ...` on a bare symbol.
    Own,
    /// `f[...] = ...` where the lookup symbol is the (curried) head.
    Down,
    /// `f[...][...] = ...`.
    Sub,
    /// Rules attached to a symbol appearing inside another head's call.
    Up,
    /// Rules applied only under `N`.
    N,
    /// Rules applied only during formatting.
    Format,
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("symbol {0} is Protected")]
    Protected(Symbol),
    #[error("symbol {0} is Locked")]
    Locked(Symbol),
}

/// Everything attached to one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub attributes: Attributes,
    pub ownvalues: RuleSet,
    pub downvalues: RuleSet,
    pub subvalues: RuleSet,
    pub upvalues: RuleSet,
    pub nvalues: RuleSet,
    pub formatvalues: RuleSet,
    /// Message templates keyed by tag, e.g. `"argx"`.
    pub messages: HashMap<String, String>,
    pub options: Vec<(Expr, Expr)>,
    /// `Default[f]` entries: `None` is the general default, `Some(i)` the
    /// default for argument position `i`.
    pub defaults: Vec<(Option<usize>, Expr)>,
}

impl Definition {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.ownvalues.is_empty()
            && self.downvalues.is_empty()
            && self.subvalues.is_empty()
            && self.upvalues.is_empty()
            && self.nvalues.is_empty()
            && self.formatvalues.is_empty()
            && self.messages.is_empty()
            && self.options.is_empty()
            && self.defaults.is_empty()
    }

    pub fn values(&self, kind: ValueKind) -> &RuleSet {
        match kind {
            ValueKind::Own => &self.ownvalues,
            ValueKind::Down => &self.downvalues,
            ValueKind::Sub => &self.subvalues,
            ValueKind::Up => &self.upvalues,
            ValueKind::N => &self.nvalues,
            ValueKind::Format => &self.formatvalues,
        }
    }

    fn values_mut(&mut self, kind: ValueKind) -> &mut RuleSet {
        match kind {
            ValueKind::Own => &mut self.ownvalues,
            ValueKind::Down => &mut self.downvalues,
            ValueKind::Sub => &mut self.subvalues,
            ValueKind::Up => &mut self.upvalues,
            ValueKind::N => &mut self.nvalues,
            ValueKind::Format => &mut self.formatvalues,
        }
    }
}

/// Symbol table mapping fully qualified symbols to their definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    table: HashMap<Symbol, Definition>,
    #[serde(skip)]
    empty: Definition,
}

impl Definitions {
    pub fn new() -> Definitions {
        Definitions::default()
    }

    /// Read-only lookup; unknown symbols present as an empty definition.
    pub fn lookup(&self, sym: &Symbol) -> &Definition {
        self.table.get(sym).unwrap_or(&self.empty)
    }

    pub fn get_mut(&mut self, sym: &Symbol) -> &mut Definition {
        self.table.entry(sym.clone()).or_default()
    }

    pub fn attributes(&self, sym: &Symbol) -> Attributes {
        self.lookup(sym).attributes
    }

    fn check_writable(&self, sym: &Symbol, bypass_protection: bool) -> Result<(), DefinitionError> {
        let attrs = self.attributes(sym);
        if attrs.contains(Attributes::LOCKED) {
            return Err(DefinitionError::Locked(sym.clone()));
        }
        if attrs.contains(Attributes::PROTECTED) && !bypass_protection {
            return Err(DefinitionError::Protected(sym.clone()));
        }
        Ok(())
    }

    pub fn add_rule(
        &mut self,
        sym: &Symbol,
        kind: ValueKind,
        rule: Rule,
    ) -> Result<(), DefinitionError> {
        self.check_writable(sym, rule.system)?;
        self.get_mut(sym).values_mut(kind).add(rule);
        Ok(())
    }

    pub fn remove_rule(
        &mut self,
        sym: &Symbol,
        kind: ValueKind,
        pattern: &Expr,
    ) -> Result<bool, DefinitionError> {
        self.check_writable(sym, false)?;
        Ok(self.get_mut(sym).values_mut(kind).remove(pattern))
    }

    pub fn set_attributes(
        &mut self,
        sym: &Symbol,
        attrs: Attributes,
    ) -> Result<(), DefinitionError> {
        if self.attributes(sym).contains(Attributes::LOCKED) {
            return Err(DefinitionError::Locked(sym.clone()));
        }
        self.get_mut(sym).attributes |= attrs;
        Ok(())
    }

    pub fn clear_attributes(
        &mut self,
        sym: &Symbol,
        attrs: Attributes,
    ) -> Result<(), DefinitionError> {
        if self.attributes(sym).contains(Attributes::LOCKED) {
            return Err(DefinitionError::Locked(sym.clone()));
        }
        self.get_mut(sym).attributes &= !attrs;
        Ok(())
    }

    /// Clear rules (and optionally everything else) for one symbol.
    /// `Clear` keeps attributes, messages, options and defaults;
    /// `ClearAll` removes the entire definition.
    pub fn clear(&mut self, sym: &Symbol, all: bool) -> Result<(), DefinitionError> {
        self.check_writable(sym, false)?;
        if all {
            self.table.remove(sym);
        } else if let Some(def) = self.table.get_mut(sym) {
            def.ownvalues.clear();
            def.downvalues.clear();
            def.subvalues.clear();
            def.upvalues.clear();
            def.nvalues.clear();
            def.formatvalues.clear();
        }
        Ok(())
    }

    pub fn set_default(&mut self, sym: &Symbol, pos: Option<usize>, value: Expr) {
        let def = self.get_mut(sym);
        def.defaults.retain(|(p, _)| *p != pos);
        def.defaults.push((pos, value));
    }

    /// `Default[sym, pos]`: the positional default if registered, falling
    /// back to the general one.
    pub fn default_for(&self, sym: &Symbol, pos: usize) -> Option<&Expr> {
        let def = self.lookup(sym);
        def.defaults
            .iter()
            .find(|(p, _)| *p == Some(pos))
            .or_else(|| def.defaults.iter().find(|(p, _)| p.is_none()))
            .map(|(_, v)| v)
    }

    pub fn set_message(&mut self, sym: &Symbol, tag: &str, template: String) {
        self.get_mut(sym).messages.insert(tag.to_string(), template);
    }

    pub fn message_template(&self, sym: &Symbol, tag: &str) -> Option<&str> {
        self.lookup(sym).messages.get(tag).map(String::as_str)
    }

    /// All defined symbols whose full name matches a glob. `*` matches
    /// any run of characters, `@` a nonempty run of characters excluding
    /// uppercase letters. A glob without a context part matches against
    /// short names.
    pub fn names(&self, glob: &str) -> Vec<Symbol> {
        let qualified = glob.contains('`');
        let mut out: Vec<Symbol> = self
            .table
            .keys()
            .filter(|sym| {
                let target = if qualified { sym.name() } else { sym.short_name() };
                glob_match(glob, target)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }
}

fn glob_match(pat: &str, s: &str) -> bool {
    fn go(p: &[char], s: &[char]) -> bool {
        match p.split_first() {
            None => s.is_empty(),
            Some(('*', rest)) => (0..=s.len()).any(|k| go(rest, &s[k..])),
            Some(('@', rest)) => (1..=s.len()).any(|k| {
                s[..k].iter().all(|c| !c.is_ascii_uppercase()) && go(rest, &s[k..])
            }),
            Some((c, rest)) => s.first() == Some(c) && go(rest, &s[1..]),
        }
    }
    let p: Vec<char> = pat.chars().collect();
    let sc: Vec<char> = s.chars().collect();
    go(&p, &sc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::build;
    use pretty_assertions::assert_eq;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    #[test]
    fn lookup_of_unknown_symbol_is_empty() {
        let defs = Definitions::new();
        assert!(defs.lookup(&sym("nothing")).is_empty());
    }

    #[test]
    fn protected_symbols_reject_user_rules() {
        let mut defs = Definitions::new();
        let plus = Symbol::system("Plus");
        defs.set_attributes(&plus, Attributes::PROTECTED).unwrap();
        let rule = Rule::new(
            Expr::normal(Expr::system("Plus"), vec![build::named("x")]),
            Expr::int(0),
            true,
        );
        assert!(matches!(
            defs.add_rule(&plus, ValueKind::Down, rule),
            Err(DefinitionError::Protected(_))
        ));
    }

    #[test]
    fn system_rules_bypass_protection() {
        let mut defs = Definitions::new();
        let plus = Symbol::system("Plus");
        defs.set_attributes(&plus, Attributes::PROTECTED).unwrap();
        let rule = Rule::system(
            Expr::normal(Expr::system("Plus"), vec![build::named("x")]),
            Expr::int(0),
        );
        assert!(defs.add_rule(&plus, ValueKind::Down, rule).is_ok());
        assert_eq!(defs.lookup(&plus).downvalues.len(), 1);
    }

    #[test]
    fn locked_symbols_reject_attribute_changes() {
        let mut defs = Definitions::new();
        let s = sym("frozen");
        defs.set_attributes(&s, Attributes::LOCKED).unwrap();
        assert!(matches!(
            defs.set_attributes(&s, Attributes::FLAT),
            Err(DefinitionError::Locked(_))
        ));
        assert!(matches!(
            defs.clear_attributes(&s, Attributes::LOCKED),
            Err(DefinitionError::Locked(_))
        ));
    }

    #[test]
    fn clear_keeps_attributes_clear_all_removes() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.set_attributes(&f, Attributes::LISTABLE).unwrap();
        defs.add_rule(
            &f,
            ValueKind::Down,
            Rule::new(
                Expr::normal(Expr::symbol("f"), vec![build::named("x")]),
                Expr::int(1),
                true,
            ),
        )
        .unwrap();
        defs.clear(&f, false).unwrap();
        assert!(defs.lookup(&f).downvalues.is_empty());
        assert_eq!(defs.attributes(&f), Attributes::LISTABLE);
        defs.clear(&f, true).unwrap();
        assert!(defs.lookup(&f).is_empty());
    }

    #[test]
    fn positional_default_beats_general() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.set_default(&f, None, Expr::int(0));
        defs.set_default(&f, Some(2), Expr::int(1));
        assert_eq!(defs.default_for(&f, 1), Some(&Expr::int(0)));
        assert_eq!(defs.default_for(&f, 2), Some(&Expr::int(1)));
    }

    #[test]
    fn names_glob() {
        let mut defs = Definitions::new();
        for n in ["foo", "fig", "Fab"] {
            defs.set_default(&sym(n), None, Expr::int(0));
        }
        let starts_f: Vec<String> = defs
            .names("f*")
            .into_iter()
            .map(|s| s.short_name().to_string())
            .collect();
        assert_eq!(starts_f, vec!["fig", "foo"]);
        // `@` refuses uppercase, so F@b does not match f@* style globs.
        let lower: Vec<String> = defs
            .names("@")
            .into_iter()
            .map(|s| s.short_name().to_string())
            .collect();
        assert_eq!(lower, vec!["fig", "foo"]);
    }
}
