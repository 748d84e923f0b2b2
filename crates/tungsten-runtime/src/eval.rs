//! The rewrite-to-fixpoint evaluator.
//!
//! `evaluate` repeats single rewrite steps until no rule applies. Each
//! step normalizes the node under its head's attributes (selective element
//! evaluation, `Sequence` splicing, `Flat` flattening, `Orderless`
//! sorting, `Listable` threading) and then consults, in order, the
//! upvalues of the element symbols, the head's downvalues or subvalues,
//! and the head's native handler. Resource exhaustion surfaces as an
//! `EvalError` internally and is converted to the `$Aborted` sentinel plus
//! a message at the public boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tungsten_core::{EvalError, Expr, Normal, Symbol};
use tungsten_rewrite::{
    match_expr, substitute, Attributes, Definitions, MatchContext, Rule, ValueKind,
};

use crate::builtins;
use crate::messages::Messages;

/// What a native handler did with an expression.
pub enum BuiltinOutcome {
    /// Handler produced a different expression; the loop continues on it.
    Evaluated(Expr),
    /// Handler does not apply; fall through exactly like a pattern miss.
    NoMatch,
    /// Handler failed; the expression becomes `$Failed` (messages already
    /// emitted by the handler).
    Failed,
}

pub type BuiltinFn = fn(&mut Evaluator, &Normal) -> Result<BuiltinOutcome, EvalError>;

#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    /// `$RecursionLimit`: maximum expression depth during evaluation.
    pub recursion_limit: usize,
    /// `$IterationLimit`: maximum rewrites of one expression.
    pub iteration_limit: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            recursion_limit: 512,
            iteration_limit: 4096,
        }
    }
}

pub struct Evaluator {
    pub defs: Definitions,
    pub messages: Messages,
    config: EvaluatorConfig,
    cancel: Arc<AtomicBool>,
    handlers: HashMap<Symbol, BuiltinFn>,
    /// Depth of the innermost `eval_at` in flight; matcher hooks and
    /// native handlers evaluate nested expressions relative to it.
    depth: usize,
    /// Resource exhaustion raised inside a matcher hook, re-raised by the
    /// evaluation loop once the match attempt returns.
    pending: Option<EvalError>,
}

enum Step {
    Rewritten(Expr),
    Fixpoint(Expr),
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl Evaluator {
    pub fn new() -> Evaluator {
        Evaluator::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Evaluator {
        let mut ev = Evaluator {
            defs: Definitions::new(),
            messages: Messages::new(),
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            handlers: HashMap::new(),
            depth: 0,
            pending: None,
        };
        builtins::register_all(&mut ev);
        ev
    }

    /// Cooperative cancel token; setting it aborts the evaluation in
    /// progress at the next step boundary. A request raised between
    /// evaluations aborts the next one. The token resets when the abort
    /// is consumed.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn register_handler(&mut self, sym: Symbol, f: BuiltinFn) {
        self.handlers.insert(sym, f);
    }

    /// Evaluate to fixpoint. Limit overruns and aborts become the
    /// `$Aborted` sentinel with the corresponding message emitted.
    pub fn evaluate(&mut self, expr: &Expr) -> Expr {
        match self.try_evaluate(expr) {
            Ok(e) => e,
            Err(EvalError::RecursionLimit(n)) => {
                self.message(
                    Symbol::system("$RecursionLimit"),
                    "reclim",
                    &[Expr::int(n as i64)],
                );
                Expr::system("$Aborted")
            }
            Err(EvalError::IterationLimit(n)) => {
                self.message(
                    Symbol::system("$IterationLimit"),
                    "itlim",
                    &[Expr::int(n as i64)],
                );
                Expr::system("$Aborted")
            }
            Err(_) => Expr::system("$Aborted"),
        }
    }

    pub fn try_evaluate(&mut self, expr: &Expr) -> Result<Expr, EvalError> {
        self.eval_at(expr, 0)
    }

    /// Emit a message through the symbol's registered template. Messages
    /// with no registered template fall back to a generic rendering.
    pub fn message(&mut self, symbol: Symbol, tag: &str, args: &[Expr]) {
        let template = self
            .defs
            .message_template(&symbol, tag)
            .unwrap_or("-- Message text not found --")
            .to_string();
        self.messages.emit(symbol, tag, &template, args);
    }

    pub(crate) fn eval_at(&mut self, expr: &Expr, depth: usize) -> Result<Expr, EvalError> {
        if depth > self.config.recursion_limit {
            return Err(EvalError::RecursionLimit(self.config.recursion_limit));
        }
        let saved = self.depth;
        self.depth = depth;
        let result = self.eval_loop(expr, depth);
        self.depth = saved;
        result
    }

    /// Evaluate a nested expression (a held argument, a hook call) one
    /// level below the innermost evaluation in flight, so it counts
    /// against `$RecursionLimit`.
    pub(crate) fn eval_nested(&mut self, expr: &Expr) -> Result<Expr, EvalError> {
        self.eval_at(expr, self.depth + 1)
    }

    fn eval_loop(&mut self, expr: &Expr, depth: usize) -> Result<Expr, EvalError> {
        let mut current = expr.clone();
        let mut iterations = 0usize;
        loop {
            if self.cancel.swap(false, Ordering::Relaxed) {
                return Err(EvalError::Aborted);
            }
            let step = self.rewrite_step(&current, depth)?;
            if let Some(err) = self.pending.take() {
                return Err(err);
            }
            match step {
                Step::Fixpoint(e) => return Ok(e),
                Step::Rewritten(e) => {
                    iterations += 1;
                    if iterations >= self.config.iteration_limit {
                        return Err(EvalError::IterationLimit(self.config.iteration_limit));
                    }
                    current = e;
                }
            }
        }
    }

    fn rewrite_step(&mut self, expr: &Expr, depth: usize) -> Result<Step, EvalError> {
        match expr {
            Expr::Symbol(sym) => self.rewrite_symbol(sym),
            Expr::Normal(n) => self.rewrite_normal(n, depth),
            _ => Ok(Step::Fixpoint(expr.clone())),
        }
    }

    fn rewrite_symbol(&mut self, sym: &Symbol) -> Result<Step, EvalError> {
        let rules: Vec<Rule> = self.defs.lookup(sym).ownvalues.iter().cloned().collect();
        let expr = Expr::Symbol(sym.clone());
        for rule in rules {
            if let Some(bindings) = match_expr(self, &rule.pattern, &expr) {
                let result = substitute(&rule.replacement, &bindings);
                tracing::trace!(symbol = %sym, "ownvalue fired");
                return Ok(Step::Rewritten(result));
            }
        }
        Ok(Step::Fixpoint(expr))
    }

    fn rewrite_normal(&mut self, n: &Normal, depth: usize) -> Result<Step, EvalError> {
        let head = self.eval_at(n.head(), depth + 1)?;
        let head_sym = head.lookup_symbol().cloned();
        let attrs = head_sym
            .as_ref()
            .map(|s| self.defs.attributes(s))
            .unwrap_or_default();
        let complete = attrs.contains(Attributes::HOLD_ALL_COMPLETE);
        let hold_all = complete || attrs.contains(Attributes::HOLD_ALL);
        let hold_first = attrs.contains(Attributes::HOLD_FIRST);
        let hold_rest = attrs.contains(Attributes::HOLD_REST);

        // Selective element evaluation. `Evaluate` overrides a hold;
        // `Unevaluated` suppresses evaluation in an evaluated position and
        // is restored in the result when no rule fires.
        let mut elements: Vec<Expr> = Vec::with_capacity(n.elements().len());
        let mut unevaluated: Vec<usize> = Vec::new();
        let skip_elements = n.flags().elements_evaluated && head.same_q(n.head());
        for (i, elem) in n.elements().iter().enumerate() {
            if skip_elements {
                elements.push(elem.clone());
                continue;
            }
            let held = hold_all || (i == 0 && hold_first) || (i > 0 && hold_rest);
            if complete {
                elements.push(elem.clone());
            } else if held {
                if elem.has_form("Evaluate", tungsten_core::Arity::Any) {
                    elements.push(self.eval_override(elem, depth)?);
                } else {
                    elements.push(elem.clone());
                }
            } else if elem.has_form("Unevaluated", tungsten_core::Arity::Exact(1)) {
                unevaluated.push(i);
                elements.push(elem.elements()[0].clone());
            } else {
                elements.push(self.eval_at(elem, depth + 1)?);
            }
        }

        // Structural normalization under the head's attributes.
        let original_len = elements.len();
        if !complete && !attrs.contains(Attributes::SEQUENCE_HOLD) {
            splice_sequences(&mut elements);
        }
        if attrs.contains(Attributes::FLAT) {
            flatten(&head, &mut elements);
        }
        if elements.len() != original_len {
            // Splicing or flattening shifted positions; the recorded
            // wrapper indices no longer apply.
            unevaluated.clear();
        }
        if attrs.contains(Attributes::ORDERLESS) && !unevaluated.is_empty() {
            // Sorting would scramble the recorded positions; restore
            // eagerly instead, the wrappers then block rule application.
            for &i in &unevaluated {
                elements[i] = Expr::normal_evaluated(
                    Expr::system("Unevaluated"),
                    vec![elements[i].clone()],
                );
            }
            unevaluated.clear();
        }
        if attrs.contains(Attributes::ORDERLESS) {
            tungsten_core::order::sort_canonical(&mut elements);
        }

        if attrs.contains(Attributes::LISTABLE) {
            if let Some(threaded) = self.thread_listable(&head, &elements)? {
                return Ok(Step::Rewritten(threaded));
            }
        }

        let candidate = Expr::normal_evaluated(head.clone(), elements);

        // Upvalues of the element symbols come first.
        if !complete {
            let mut seen: Vec<Symbol> = Vec::new();
            for elem in candidate.elements() {
                if let Some(s) = elem.lookup_symbol() {
                    if !seen.contains(s) {
                        seen.push(s.clone());
                    }
                }
            }
            for s in seen {
                let rules: Vec<Rule> = self.defs.lookup(&s).upvalues.iter().cloned().collect();
                if let Some(result) = self.apply_first(&rules, &candidate) {
                    return Ok(Step::Rewritten(result));
                }
            }
        }

        // Downvalues for a symbol head, subvalues for a curried head.
        if let Some(sym) = &head_sym {
            let kind = if head.as_symbol().is_some() {
                ValueKind::Down
            } else {
                ValueKind::Sub
            };
            let rules: Vec<Rule> = self.defs.lookup(sym).values(kind).iter().cloned().collect();
            if let Some(result) = self.apply_first(&rules, &candidate) {
                return Ok(Step::Rewritten(result));
            }
            if let Some(handler) = self.handlers.get(sym).copied() {
                if let Some(cn) = candidate.as_normal() {
                    let cn = cn.clone();
                    match handler(self, &cn)? {
                        BuiltinOutcome::Evaluated(e) => return Ok(Step::Rewritten(e)),
                        BuiltinOutcome::Failed => {
                            return Ok(Step::Rewritten(Expr::system("$Failed")))
                        }
                        BuiltinOutcome::NoMatch => {}
                    }
                }
            }
        }

        // Fixpoint: put Unevaluated wrappers back.
        let result = if unevaluated.is_empty() {
            candidate
        } else {
            let (head, mut elements) = match candidate {
                Expr::Normal(n) => n.into_parts(),
                other => return Ok(Step::Fixpoint(other)),
            };
            for &i in &unevaluated {
                if let Some(slot) = elements.get_mut(i) {
                    *slot = Expr::normal_evaluated(
                        Expr::system("Unevaluated"),
                        vec![slot.clone()],
                    );
                }
            }
            Expr::normal_evaluated(head, elements)
        };
        Ok(Step::Fixpoint(result))
    }

    /// `Evaluate[...]` inside a held position: evaluate the contents
    /// anyway. A single argument replaces the wrapper bare; several become
    /// a `Sequence`.
    fn eval_override(&mut self, wrapper: &Expr, depth: usize) -> Result<Expr, EvalError> {
        let mut evaluated = Vec::with_capacity(wrapper.elements().len());
        for e in wrapper.elements() {
            evaluated.push(self.eval_at(e, depth + 1)?);
        }
        Ok(if evaluated.len() == 1 {
            evaluated.pop().unwrap_or_else(|| Expr::system("Null"))
        } else {
            Expr::normal_evaluated(Expr::system("Sequence"), evaluated)
        })
    }

    fn apply_first(&mut self, rules: &[Rule], expr: &Expr) -> Option<Expr> {
        for rule in rules {
            if let Some(bindings) = match_expr(self, &rule.pattern, expr) {
                tracing::trace!(pattern = %rule.pattern, "rule fired");
                return Some(substitute(&rule.replacement, &bindings));
            }
            if self.pending.is_some() {
                // A hook hit a resource limit; stop matching, the loop
                // re-raises it.
                return None;
            }
        }
        None
    }

    /// Evaluate a matcher hook call and test for a literal `True`.
    /// Resource exhaustion inside the hook is remembered for re-raising;
    /// any other evaluation error counts as a failed test.
    fn hook_true(&mut self, call: &Expr) -> bool {
        match self.eval_nested(call) {
            Ok(e) => e.same_q(&Expr::system("True")),
            Err(
                err @ (EvalError::RecursionLimit(_)
                | EvalError::IterationLimit(_)
                | EvalError::Aborted),
            ) => {
                self.pending = Some(err);
                false
            }
            Err(_) => false,
        }
    }

    /// `Listable` threading: distribute the head over `List` arguments of
    /// a common length, broadcasting scalars. A length mismatch emits
    /// `Thread::tdlen` and leaves the expression alone.
    fn thread_listable(
        &mut self,
        head: &Expr,
        elements: &[Expr],
    ) -> Result<Option<Expr>, EvalError> {
        let mut len: Option<usize> = None;
        for e in elements {
            if e.has_form("List", tungsten_core::Arity::Any) {
                let n = e.elements().len();
                match len {
                    None => len = Some(n),
                    Some(m) if m != n => {
                        self.message(
                            Symbol::system("Thread"),
                            "tdlen",
                            &[Expr::normal(head.clone(), elements.to_vec())],
                        );
                        return Ok(None);
                    }
                    Some(_) => {}
                }
            }
        }
        let len = match len {
            Some(n) => n,
            None => return Ok(None),
        };
        let rows: Vec<Expr> = (0..len)
            .map(|i| {
                let row: Vec<Expr> = elements
                    .iter()
                    .map(|e| {
                        if e.has_form("List", tungsten_core::Arity::Any) {
                            e.elements()[i].clone()
                        } else {
                            e.clone()
                        }
                    })
                    .collect();
                Expr::normal(head.clone(), row)
            })
            .collect();
        Ok(Some(Expr::normal(Expr::system("List"), rows)))
    }
}

/// Splice `Sequence[...]` elements into the surrounding list.
fn splice_sequences(elements: &mut Vec<Expr>) {
    if !elements.iter().any(|e| e.is_sequence()) {
        return;
    }
    let mut out = Vec::with_capacity(elements.len());
    for e in elements.drain(..) {
        if e.is_sequence() {
            if let Expr::Normal(n) = e {
                out.extend(n.into_parts().1);
            }
        } else {
            out.push(e);
        }
    }
    *elements = out;
}

/// One level of `Flat` flattening: same-head compound elements are
/// replaced by their elements. Children were flattened during their own
/// evaluation, so one level per step reaches the fixpoint.
fn flatten(head: &Expr, elements: &mut Vec<Expr>) {
    let needs = elements
        .iter()
        .any(|e| matches!(e, Expr::Normal(n) if n.head().same_q(head)));
    if !needs {
        return;
    }
    let mut out = Vec::with_capacity(elements.len());
    for e in elements.drain(..) {
        match e {
            Expr::Normal(n) if n.head().same_q(head) => out.extend(n.into_parts().1),
            other => out.push(other),
        }
    }
    *elements = out;
}

/// The evaluator is the matcher's full context: `PatternTest` and
/// `Condition` hooks evaluate through the engine at the live recursion
/// depth, so a test that recurses back into the matched head still runs
/// into `$RecursionLimit`. An ordinary hook evaluation error counts as a
/// failed test, sibling branches are unaffected.
impl MatchContext for Evaluator {
    fn attributes(&self, sym: &Symbol) -> Attributes {
        self.defs.attributes(sym)
    }

    fn default_value(&mut self, head: &Symbol, pos: usize, _count: usize) -> Option<Expr> {
        self.defs.default_for(head, pos).cloned()
    }

    fn check_test(&mut self, test: &Expr, arg: &Expr) -> bool {
        let call = Expr::normal(test.clone(), vec![arg.clone()]);
        self.hook_true(&call)
    }

    fn check_condition(&mut self, condition: &Expr) -> bool {
        self.hook_true(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plus(elems: Vec<Expr>) -> Expr {
        Expr::normal(Expr::system("Plus"), elems)
    }

    #[test]
    fn atoms_are_fixpoints() {
        let mut ev = Evaluator::new();
        assert_eq!(ev.evaluate(&Expr::int(5)), Expr::int(5));
        assert_eq!(ev.evaluate(&Expr::string("s")), Expr::string("s"));
        assert_eq!(ev.evaluate(&Expr::symbol("x")), Expr::symbol("x"));
    }

    #[test]
    fn sequence_splices_into_arguments() {
        let mut ev = Evaluator::new();
        let e = Expr::normal(
            Expr::symbol("f"),
            vec![
                Expr::normal(Expr::system("Sequence"), vec![Expr::int(1), Expr::int(2)]),
                Expr::int(3),
            ],
        );
        assert_eq!(
            ev.evaluate(&e),
            Expr::normal_evaluated(
                Expr::symbol("f"),
                vec![Expr::int(1), Expr::int(2), Expr::int(3)]
            )
        );
    }

    #[test]
    fn orderless_sorts_and_flat_flattens() {
        let mut ev = Evaluator::new();
        let e = plus(vec![
            Expr::symbol("b"),
            plus(vec![Expr::symbol("a"), Expr::symbol("c")]),
        ]);
        let out = ev.evaluate(&e);
        assert_eq!(
            out.elements(),
            &[Expr::symbol("a"), Expr::symbol("b"), Expr::symbol("c")]
        );
    }

    #[test]
    fn iteration_limit_aborts_with_message() {
        let mut ev = Evaluator::with_config(EvaluatorConfig {
            recursion_limit: 512,
            iteration_limit: 20,
        });
        // f[x_] := f[x] rewrites forever.
        let pat = Expr::normal(
            Expr::symbol("f"),
            vec![tungsten_rewrite::pattern::build::named("x")],
        );
        let body = Expr::normal(Expr::symbol("f"), vec![Expr::symbol("x")]);
        ev.defs
            .add_rule(&Symbol::new("f"), ValueKind::Down, Rule::new(pat, body, true))
            .unwrap();
        let out = ev.evaluate(&Expr::normal(Expr::symbol("f"), vec![Expr::int(1)]));
        assert_eq!(out, Expr::system("$Aborted"));
        assert!(ev.messages.contains("$IterationLimit", "itlim"));
    }

    #[test]
    fn recursion_limit_aborts_with_message() {
        let mut ev = Evaluator::with_config(EvaluatorConfig {
            recursion_limit: 20,
            iteration_limit: 4096,
        });
        // x := g[x] deepens forever.
        ev.defs
            .add_rule(
                &Symbol::new("x"),
                ValueKind::Own,
                Rule::new(
                    Expr::symbol("x"),
                    Expr::normal(Expr::symbol("g"), vec![Expr::symbol("x")]),
                    true,
                ),
            )
            .unwrap();
        let out = ev.evaluate(&Expr::symbol("x"));
        assert_eq!(out, Expr::system("$Aborted"));
        assert!(ev.messages.contains("$RecursionLimit", "reclim"));
    }

    #[test]
    fn pattern_test_recursion_counts_against_limit() {
        let mut ev = Evaluator::with_config(EvaluatorConfig {
            recursion_limit: 20,
            iteration_limit: 4096,
        });
        // t[a_] := f[a]; f[x_?t] := 0. Evaluating f[1] ping-pongs
        // between the matcher and the test hook and must stop at
        // $RecursionLimit rather than exhaust the native stack.
        let t_pat = Expr::normal(
            Expr::symbol("t"),
            vec![tungsten_rewrite::pattern::build::named("a")],
        );
        let t_body = Expr::normal(Expr::symbol("f"), vec![Expr::symbol("a")]);
        ev.defs
            .add_rule(&Symbol::new("t"), ValueKind::Down, Rule::new(t_pat, t_body, true))
            .unwrap();
        let f_pat = Expr::normal(
            Expr::symbol("f"),
            vec![tungsten_rewrite::pattern::build::pattern_test(
                tungsten_rewrite::pattern::build::named("x"),
                Expr::symbol("t"),
            )],
        );
        ev.defs
            .add_rule(
                &Symbol::new("f"),
                ValueKind::Down,
                Rule::new(f_pat, Expr::int(0), true),
            )
            .unwrap();
        let out = ev.evaluate(&Expr::normal(Expr::symbol("f"), vec![Expr::int(1)]));
        assert_eq!(out, Expr::system("$Aborted"));
        assert!(ev.messages.contains("$RecursionLimit", "reclim"));
    }

    #[test]
    fn cancel_token_aborts_and_resets() {
        let mut ev = Evaluator::new();
        ev.cancel_token().store(true, Ordering::Relaxed);
        let out = ev.evaluate(&plus(vec![Expr::int(1), Expr::int(2)]));
        assert_eq!(out, Expr::system("$Aborted"));
        // The request is consumed; the next evaluation proceeds.
        assert_eq!(ev.evaluate(&plus(vec![Expr::int(1), Expr::int(2)])), Expr::int(3));
    }

    #[test]
    fn listable_threads_over_lists() {
        let mut ev = Evaluator::new();
        let e = plus(vec![
            Expr::normal(Expr::system("List"), vec![Expr::int(1), Expr::int(2)]),
            Expr::int(10),
        ]);
        assert_eq!(
            ev.evaluate(&e),
            Expr::normal_evaluated(
                Expr::system("List"),
                vec![Expr::int(11), Expr::int(12)]
            )
        );
    }

    #[test]
    fn listable_length_mismatch_reports() {
        let mut ev = Evaluator::new();
        let e = plus(vec![
            Expr::normal(Expr::system("List"), vec![Expr::int(1), Expr::int(2)]),
            Expr::normal(Expr::system("List"), vec![Expr::int(1)]),
        ]);
        let out = ev.evaluate(&e);
        assert!(ev.messages.contains("Thread", "tdlen"));
        assert!(out.has_form("Plus", tungsten_core::Arity::Exact(2)));
    }

    #[test]
    fn upvalues_fire_before_downvalues() {
        let mut ev = Evaluator::new();
        // g /: f[g[x_]] := x, plus a broader f rule defined later.
        let up_pat = Expr::normal(
            Expr::symbol("f"),
            vec![Expr::normal(
                Expr::symbol("g"),
                vec![tungsten_rewrite::pattern::build::named("x")],
            )],
        );
        ev.defs
            .add_rule(
                &Symbol::new("g"),
                ValueKind::Up,
                Rule::new(up_pat, Expr::symbol("x"), true),
            )
            .unwrap();
        let down_pat = Expr::normal(
            Expr::symbol("f"),
            vec![tungsten_rewrite::pattern::build::named("y")],
        );
        ev.defs
            .add_rule(
                &Symbol::new("f"),
                ValueKind::Down,
                Rule::new(down_pat, Expr::int(0), true),
            )
            .unwrap();
        let e = Expr::normal(
            Expr::symbol("f"),
            vec![Expr::normal(Expr::symbol("g"), vec![Expr::int(7)])],
        );
        assert_eq!(ev.evaluate(&e), Expr::int(7));
    }
}
