//! Rewrite rules and specificity-ordered rule sets.
//!
//! Rules within a definition are kept sorted most-specific-first, so the
//! evaluator can stop at the first match. Specificity is a structural key
//! computed from the pattern alone: literals beat constrained blanks beat
//! bare blanks, tested and conditioned patterns beat untested ones, and
//! longer element lists beat shorter ones. Ties between equally specific
//! patterns go to the most recently added rule.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tungsten_core::Expr;

use crate::pattern::{classify, PatternForm};

/// A single rewrite rule. `delayed` distinguishes `RuleDelayed` (`:>`,
/// `SetDelayed`) from `Rule` (`->`, `Set`); the evaluator treats both the
/// same at application time since right-hand sides are re-evaluated by the
/// fixpoint loop anyway, but the distinction survives for display and for
/// `Definition` round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: Expr,
    pub replacement: Expr,
    pub delayed: bool,
    /// System rules sort after user rules of equal specificity.
    pub system: bool,
}

impl Rule {
    pub fn new(pattern: Expr, replacement: Expr, delayed: bool) -> Rule {
        Rule {
            pattern,
            replacement,
            delayed,
            system: false,
        }
    }

    pub fn system(pattern: Expr, replacement: Expr) -> Rule {
        Rule {
            pattern,
            replacement,
            delayed: true,
            system: true,
        }
    }
}

/// Structural specificity key for a pattern. Derived `Ord` compares fields
/// top to bottom; smaller keys are more specific and sort first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PatternKey {
    /// 0 atom, 2 compound, 3 malformed pattern construct.
    pub class: u8,
    /// 0 literal; 11/12/13 blank kinds with a head constraint; 21/22/23
    /// without; 1 empty alternatives (matches nothing, maximally
    /// specific).
    pub blank: u8,
    /// 0 when guarded by a `PatternTest`.
    pub test: u8,
    /// 0 when the pattern is named.
    pub named: u8,
    /// 1 when optional (optionals are less specific).
    pub optional: u8,
    pub head: Option<Box<PatternKey>>,
    /// Element keys with a trailing sentinel, so that a longer element
    /// list sorts as more specific than any proper prefix of it.
    pub elements: Vec<PatternKey>,
    /// 0 when guarded by a `Condition`.
    pub condition: u8,
}

impl PatternKey {
    fn atom() -> PatternKey {
        PatternKey {
            class: 0,
            blank: 0,
            test: 1,
            named: 1,
            optional: 0,
            head: None,
            elements: Vec::new(),
            condition: 1,
        }
    }

    fn blank(kind: u8) -> PatternKey {
        PatternKey {
            class: 2,
            blank: kind,
            test: 1,
            named: 1,
            optional: 0,
            head: None,
            elements: Vec::new(),
            condition: 1,
        }
    }

    /// Past-the-end marker appended to every element key list. Its class
    /// outranks every real key, which makes `f[x_]` less specific than
    /// `f[x_, y_]` under plain lexicographic `Vec` comparison.
    fn sentinel() -> PatternKey {
        PatternKey {
            class: 4,
            blank: 0,
            test: 0,
            named: 0,
            optional: 0,
            head: None,
            elements: Vec::new(),
            condition: 0,
        }
    }
}

/// Compute the specificity key of a pattern.
pub fn pattern_sort_key(pat: &Expr) -> PatternKey {
    match classify(pat) {
        PatternForm::Blank(h) => PatternKey::blank(if h.is_some() { 11 } else { 21 }),
        PatternForm::BlankSequence(h) => PatternKey::blank(if h.is_some() { 12 } else { 22 }),
        PatternForm::BlankNullSequence(h) => PatternKey::blank(if h.is_some() { 13 } else { 23 }),
        PatternForm::Named { pattern, .. } => {
            let mut key = pattern_sort_key(pattern);
            key.named = 0;
            key
        }
        PatternForm::Optional { pattern, .. } => {
            let mut key = pattern_sort_key(pattern);
            key.optional = 1;
            key
        }
        PatternForm::Test { pattern, .. } => {
            let mut key = pattern_sort_key(pattern);
            key.test = 0;
            key
        }
        PatternForm::Condition { pattern, .. } => {
            let mut key = pattern_sort_key(pattern);
            key.condition = 0;
            key
        }
        PatternForm::Alternatives(alts) => match alts.iter().map(pattern_sort_key).min() {
            Some(key) => key,
            // Empty alternatives match nothing at all.
            None => PatternKey::blank(1),
        },
        PatternForm::HoldPattern(p) | PatternForm::Verbatim(p) => pattern_sort_key(p),
        PatternForm::Repeated { pattern, .. } => {
            let mut key = pattern_sort_key(pattern);
            key.class = 3;
            key
        }
        PatternForm::Except { pattern, .. } => match pattern {
            Some(p) => pattern_sort_key(p),
            None => PatternKey::blank(21),
        },
        PatternForm::Literal(e) => match e {
            Expr::Normal(n) => {
                let mut elements: Vec<PatternKey> =
                    n.elements().iter().map(pattern_sort_key).collect();
                elements.push(PatternKey::sentinel());
                PatternKey {
                    class: 2,
                    blank: 0,
                    test: 1,
                    named: 1,
                    optional: 0,
                    head: Some(Box::new(pattern_sort_key(n.head()))),
                    elements,
                    condition: 1,
                }
            }
            _ => PatternKey::atom(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RuleEntry {
    rule: Rule,
    /// Insertion sequence number, used to break specificity ties in favor
    /// of the newest rule.
    seq: u64,
}

impl RuleEntry {
    fn sort_key(&self) -> (bool, PatternKey, Reverse<u64>) {
        (
            self.rule.system,
            pattern_sort_key(&self.rule.pattern),
            Reverse(self.seq),
        )
    }
}

/// A list of rules kept sorted by `(system, specificity, newest-first)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    entries: Vec<RuleEntry>,
    next_seq: u64,
}

impl RuleSet {
    pub fn new() -> RuleSet {
        RuleSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate rules most specific first.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.entries.iter().map(|e| &e.rule)
    }

    /// Insert a rule, replacing any existing rule whose pattern is
    /// structurally identical. Among rules of equal specificity the new
    /// rule lands first, so redefinitions and refinements win.
    pub fn add(&mut self, rule: Rule) {
        self.entries
            .retain(|e| !e.rule.pattern.same_q(&rule.pattern));
        let entry = RuleEntry {
            rule,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let key = entry.sort_key();
        let at = self.entries.partition_point(|e| e.sort_key() < key);
        self.entries.insert(at, entry);
    }

    /// Remove the rule with a structurally identical pattern, if any.
    pub fn remove(&mut self, pattern: &Expr) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.rule.pattern.same_q(pattern));
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::build;
    use pretty_assertions::assert_eq;

    fn f(elems: Vec<Expr>) -> Expr {
        Expr::normal(Expr::symbol("f"), elems)
    }

    #[test]
    fn literal_beats_constrained_blank_beats_bare_blank() {
        let lit = pattern_sort_key(&Expr::int(1));
        let constrained = pattern_sort_key(&build::blank_head("Integer"));
        let bare = pattern_sort_key(&build::blank());
        assert!(lit < constrained);
        assert!(constrained < bare);
    }

    #[test]
    fn blank_kinds_order() {
        let one = pattern_sort_key(&build::blank());
        let seq = pattern_sort_key(&Expr::normal(Expr::system("BlankSequence"), vec![]));
        let null = pattern_sort_key(&Expr::normal(Expr::system("BlankNullSequence"), vec![]));
        assert!(one < seq);
        assert!(seq < null);
    }

    #[test]
    fn pattern_test_raises_specificity() {
        let plain = pattern_sort_key(&build::named("x"));
        let tested = pattern_sort_key(&build::pattern_test(
            build::named("x"),
            Expr::system("EvenQ"),
        ));
        assert!(tested < plain);
    }

    #[test]
    fn condition_raises_specificity() {
        let plain = pattern_sort_key(&build::named("x"));
        let guarded = pattern_sort_key(&build::condition(build::named("x"), Expr::system("True")));
        assert!(guarded < plain);
    }

    #[test]
    fn naming_does_not_change_rank_against_literals() {
        // x_Integer still beats y_ no matter the names involved.
        let typed = pattern_sort_key(&build::named_head("x", "Integer"));
        let untyped = pattern_sort_key(&build::named("y"));
        assert!(typed < untyped);
    }

    #[test]
    fn longer_element_lists_are_more_specific() {
        let one = pattern_sort_key(&f(vec![build::named("x")]));
        let two = pattern_sort_key(&f(vec![build::named("x"), build::named("y")]));
        assert!(two < one);
    }

    #[test]
    fn alternatives_take_most_specific_branch() {
        let alt = pattern_sort_key(&build::alternatives(vec![
            Expr::int(1),
            build::blank(),
        ]));
        assert_eq!(alt, pattern_sort_key(&Expr::int(1)));
    }

    #[test]
    fn ruleset_orders_specific_first() {
        let mut rs = RuleSet::new();
        rs.add(Rule::new(
            f(vec![build::named("x")]),
            Expr::int(1),
            true,
        ));
        rs.add(Rule::new(f(vec![Expr::int(0)]), Expr::int(0), true));
        let pats: Vec<&Expr> = rs.iter().map(|r| &r.pattern).collect();
        // The literal f[0] rule must come first despite later insertion.
        assert_eq!(pats[0], &f(vec![Expr::int(0)]));
    }

    #[test]
    fn same_pattern_replaces_in_place() {
        let mut rs = RuleSet::new();
        let pat = f(vec![build::named("x")]);
        rs.add(Rule::new(pat.clone(), Expr::int(1), true));
        rs.add(Rule::new(pat.clone(), Expr::int(2), true));
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.iter().next().map(|r| &r.replacement), Some(&Expr::int(2)));
    }

    #[test]
    fn equal_specificity_newest_first() {
        let mut rs = RuleSet::new();
        rs.add(Rule::new(
            f(vec![build::named("x")]),
            Expr::int(1),
            true,
        ));
        rs.add(Rule::new(
            f(vec![build::named("y")]),
            Expr::int(2),
            true,
        ));
        assert_eq!(
            rs.iter().next().map(|r| &r.replacement),
            Some(&Expr::int(2))
        );
    }

    #[test]
    fn user_rules_precede_system_rules() {
        let mut rs = RuleSet::new();
        rs.add(Rule::system(f(vec![build::named("x")]), Expr::int(1)));
        rs.add(Rule::new(
            f(vec![build::named("x2")]),
            Expr::int(2),
            true,
        ));
        assert_eq!(
            rs.iter().next().map(|r| &r.replacement),
            Some(&Expr::int(2))
        );
    }
}
