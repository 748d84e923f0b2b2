//! The backtracking pattern matcher.
//!
//! Matching is a nondeterministic search: `Orderless` heads permute the
//! candidates, sequence patterns try every feasible split, `Alternatives`
//! fork, and `Flat` heads let a single blank absorb a run of elements.
//! Bindings are branch-local (cloned at every choice point), so a failed
//! branch can never corrupt its siblings. Failure is reported by absence of
//! a binding set; the matcher itself never errors.

use std::collections::HashMap;

use tungsten_core::{Expr, Symbol};

use crate::attrs::Attributes;
use crate::pattern::{classify, min_demand_all, PatternForm};
use crate::subst::substitute;

/// Pattern-variable bindings, keyed by the variable's fully qualified name.
/// Ephemeral: created per match attempt, discarded on failure.
pub type Bindings = HashMap<String, Expr>;

/// The matcher's view of its surroundings. Attribute and default-value
/// lookups come from the definitions database; `PatternTest` and
/// `Condition` need to evaluate an auxiliary expression mid-match, which
/// the evaluator supplies. A purely structural context (no evaluation) is
/// implemented by [`Definitions`](crate::defs::Definitions) itself.
pub trait MatchContext {
    fn attributes(&self, sym: &Symbol) -> Attributes;

    /// `Default[head]` / `Default[head, pos]` for an optional pattern at
    /// 1-based position `pos` of `count` elements.
    fn default_value(&mut self, head: &Symbol, pos: usize, count: usize) -> Option<Expr>;

    /// Evaluate `test[arg]`; `true` only for an outcome of `True`.
    fn check_test(&mut self, test: &Expr, arg: &Expr) -> bool;

    /// Evaluate an already-substituted condition; `true` only for `True`.
    fn check_condition(&mut self, condition: &Expr) -> bool;
}

/// Match `expr` against `pattern`, returning the first consistent binding
/// set found.
pub fn match_expr(
    ctx: &mut dyn MatchContext,
    pattern: &Expr,
    expr: &Expr,
) -> Option<Bindings> {
    let mut bindings = Bindings::new();
    if match_single(ctx, pattern, expr, &mut bindings) {
        Some(bindings)
    } else {
        None
    }
}

/// Bind `name`, or check consistency against an earlier binding of the
/// same name.
fn bind(bindings: &mut Bindings, name: &Symbol, value: Expr) -> bool {
    match bindings.get(name.name()) {
        Some(prev) => prev.same_q(&value),
        None => {
            bindings.insert(name.name().to_string(), value);
            true
        }
    }
}

fn head_ok(constraint: Option<&Expr>, expr: &Expr) -> bool {
    match constraint {
        None => true,
        Some(h) => expr.head().same_q(h),
    }
}

/// Match one pattern against one whole expression.
pub fn match_single(
    ctx: &mut dyn MatchContext,
    pat: &Expr,
    expr: &Expr,
    bindings: &mut Bindings,
) -> bool {
    match classify(pat) {
        PatternForm::Blank(h) => head_ok(h, expr),
        // In single-expression position a sequence pattern matches a
        // sequence of exactly one.
        PatternForm::BlankSequence(h) => head_ok(h, expr),
        PatternForm::BlankNullSequence(h) => head_ok(h, expr),
        PatternForm::Named { name, pattern } => {
            let mut local = bindings.clone();
            if match_single(ctx, pattern, expr, &mut local) && bind(&mut local, name, expr.clone())
            {
                *bindings = local;
                return true;
            }
            false
        }
        PatternForm::Optional { pattern, .. } => match_single(ctx, pattern, expr, bindings),
        PatternForm::Test { pattern, test } => {
            let mut local = bindings.clone();
            if match_single(ctx, pattern, expr, &mut local) && ctx.check_test(test, expr) {
                *bindings = local;
                return true;
            }
            false
        }
        PatternForm::Condition { pattern, condition } => {
            let mut local = bindings.clone();
            if !match_single(ctx, pattern, expr, &mut local) {
                return false;
            }
            let cond = substitute(condition, &local);
            if ctx.check_condition(&cond) {
                *bindings = local;
                return true;
            }
            false
        }
        PatternForm::Alternatives(alts) => {
            for alt in alts {
                let mut local = bindings.clone();
                if match_single(ctx, alt, expr, &mut local) {
                    *bindings = local;
                    return true;
                }
            }
            false
        }
        PatternForm::Repeated { pattern, .. } => match_single(ctx, pattern, expr, bindings),
        PatternForm::HoldPattern(p) => match_single(ctx, p, expr, bindings),
        PatternForm::Verbatim(v) => v.same_q(expr),
        PatternForm::Except { forbidden, pattern } => {
            let mut scratch = bindings.clone();
            if match_single(ctx, forbidden, expr, &mut scratch) {
                return false;
            }
            match pattern {
                Some(p) => match_single(ctx, p, expr, bindings),
                None => true,
            }
        }
        PatternForm::Literal(p) => match p {
            Expr::Normal(pn) => {
                if let Expr::Normal(en) = expr {
                    let mut local = bindings.clone();
                    if match_single(ctx, pn.head(), en.head(), &mut local) {
                        let attrs = pn
                            .head_symbol()
                            .map(|s| ctx.attributes(s))
                            .unwrap_or_default();
                        if match_elements(
                            ctx,
                            pn.head_symbol(),
                            attrs,
                            pn.elements(),
                            en.elements(),
                            &mut local,
                        ) {
                            *bindings = local;
                            return true;
                        }
                    }
                }
                try_one_identity(ctx, pn.head_symbol(), pn.elements(), expr, bindings)
            }
            _ => p.same_q(expr),
        },
    }
}

/// `OneIdentity` lets a compound pattern `h[p1, ..., pn]` match a whole
/// expression that is not `h`-headed, provided all but one pattern element
/// can be absorbed by defaults. This is what makes `a_. + x_` match a lone
/// `x` with `a` bound to `Default[Plus]`.
fn try_one_identity(
    ctx: &mut dyn MatchContext,
    head: Option<&Symbol>,
    pats: &[Expr],
    expr: &Expr,
    bindings: &mut Bindings,
) -> bool {
    let head_sym = match head {
        Some(s) => s,
        None => return false,
    };
    if !ctx.attributes(head_sym).contains(Attributes::ONE_IDENTITY) {
        return false;
    }
    // The expression itself must not already carry this head; that case is
    // ordinary element matching.
    if expr.head().as_symbol() == Some(head_sym) {
        return false;
    }
    let singleton = [expr.clone()];
    let mut local = bindings.clone();
    if match_positional(
        ctx,
        Some(head_sym),
        Attributes::empty(),
        pats,
        &singleton,
        pats.len(),
        1,
        &mut local,
    ) {
        *bindings = local;
        return true;
    }
    false
}

/// Match a pattern element list against a candidate element list under the
/// head's attributes.
fn match_elements(
    ctx: &mut dyn MatchContext,
    head: Option<&Symbol>,
    attrs: Attributes,
    pats: &[Expr],
    exprs: &[Expr],
    bindings: &mut Bindings,
) -> bool {
    if attrs.contains(Attributes::ORDERLESS) {
        let mut used = vec![false; exprs.len()];
        match_orderless(ctx, head, attrs, pats, exprs, &mut used, pats.len(), bindings)
    } else {
        match_positional(ctx, head, attrs, pats, exprs, pats.len(), 1, bindings)
    }
}

/// The default binding for an optional pattern element: the explicit
/// default if the pattern carries one, otherwise the head's registered
/// `Default` value.
fn optional_default(
    ctx: &mut dyn MatchContext,
    head: Option<&Symbol>,
    explicit: Option<&Expr>,
    pos: usize,
    count: usize,
) -> Option<Expr> {
    match explicit {
        Some(d) => Some(d.clone()),
        None => head.and_then(|h| {
            let h = h.clone();
            ctx.default_value(&h, pos, count)
        }),
    }
}

/// Wrap a matched run for a `Flat` absorption: single elements stay bare,
/// longer runs are re-wrapped under the head.
fn absorb(head: &Symbol, run: &[Expr]) -> Expr {
    if run.len() == 1 {
        run[0].clone()
    } else {
        Expr::normal_evaluated(Expr::Symbol(head.clone()), run.to_vec())
    }
}

/// Can this pattern element absorb a multi-element run under a `Flat`
/// head? Only bare or same-head blanks (possibly named) qualify.
fn flat_absorbable(p: &Expr, head: &Symbol) -> bool {
    match classify(p) {
        PatternForm::Blank(None) => true,
        PatternForm::Blank(Some(h)) => h.as_symbol() == Some(head),
        PatternForm::Named { pattern, .. } => flat_absorbable(pattern, head),
        _ => false,
    }
}

/// Left-to-right positional matching with backtracking over sequence split
/// points, optional defaults, and `Flat` absorption runs. `pos` is the
/// 1-based position of `pats[0]` in the full original pattern list of
/// `count` elements (needed for positional `Default` lookups).
#[allow(clippy::too_many_arguments)]
fn match_positional(
    ctx: &mut dyn MatchContext,
    head: Option<&Symbol>,
    attrs: Attributes,
    pats: &[Expr],
    exprs: &[Expr],
    count: usize,
    pos: usize,
    bindings: &mut Bindings,
) -> bool {
    let (p0, rest) = match pats.split_first() {
        Some(split) => split,
        None => return exprs.is_empty(),
    };
    let rest_min = min_demand_all(rest);

    // Sequence-style element patterns: try every feasible split length.
    if let Some(seq) = as_sequence_element(p0) {
        let max_take = exprs.len().saturating_sub(rest_min);
        let min_take = seq.min_take;
        if min_take > max_take {
            return false;
        }
        for k in min_take..=max_take {
            let slice = &exprs[..k];
            let mut local = bindings.clone();
            if !seq.admits(ctx, slice, &mut local) {
                continue;
            }
            if let Some(name) = seq.name {
                let value = Expr::normal_evaluated(Expr::system("Sequence"), slice.to_vec());
                if !bind(&mut local, name, value) {
                    continue;
                }
            }
            if match_positional(ctx, head, attrs, rest, &exprs[k..], count, pos + 1, &mut local) {
                *bindings = local;
                return true;
            }
        }
        return false;
    }

    // Optional element: consume one if possible, else fall back to the
    // default value.
    if let PatternForm::Optional { pattern, default } = classify(p0) {
        if !exprs.is_empty() {
            let mut local = bindings.clone();
            if match_single(ctx, pattern, &exprs[0], &mut local)
                && match_positional(ctx, head, attrs, rest, &exprs[1..], count, pos + 1, &mut local)
            {
                *bindings = local;
                return true;
            }
        }
        if let Some(value) = optional_default(ctx, head, default, pos, count) {
            let mut local = bindings.clone();
            if match_single(ctx, pattern, &value, &mut local)
                && match_positional(ctx, head, attrs, rest, exprs, count, pos + 1, &mut local)
            {
                *bindings = local;
                return true;
            }
        }
        return false;
    }

    if exprs.is_empty() {
        return false;
    }

    // Ordinary element: match exactly one candidate...
    {
        let mut local = bindings.clone();
        if match_single(ctx, p0, &exprs[0], &mut local)
            && match_positional(ctx, head, attrs, rest, &exprs[1..], count, pos + 1, &mut local)
        {
            *bindings = local;
            return true;
        }
    }

    // ... or, under a Flat head, absorb a longer same-head run.
    if attrs.contains(Attributes::FLAT) {
        if let Some(h) = head {
            if flat_absorbable(p0, h) {
                let h = h.clone();
                let max_take = exprs.len().saturating_sub(rest_min);
                for k in 2..=max_take.max(1) {
                    if k > exprs.len() {
                        break;
                    }
                    let candidate = absorb(&h, &exprs[..k]);
                    let mut local = bindings.clone();
                    if match_single(ctx, p0, &candidate, &mut local)
                        && match_positional(
                            ctx,
                            head,
                            attrs,
                            rest,
                            &exprs[k..],
                            count,
                            pos + 1,
                            &mut local,
                        )
                    {
                        *bindings = local;
                        return true;
                    }
                }
            }
        }
    }

    false
}

/// Orderless matching: assign each pattern element a disjoint subset of the
/// candidate bag via backtracking. Sequence patterns take runs that are
/// contiguous in the remaining bag; the match succeeds only when the whole
/// bag is consumed.
#[allow(clippy::too_many_arguments)]
fn match_orderless(
    ctx: &mut dyn MatchContext,
    head: Option<&Symbol>,
    attrs: Attributes,
    pats: &[Expr],
    exprs: &[Expr],
    used: &mut Vec<bool>,
    count: usize,
    bindings: &mut Bindings,
) -> bool {
    let (p0, rest) = match pats.split_first() {
        Some(split) => split,
        None => return used.iter().all(|u| *u),
    };
    let remaining: Vec<usize> = (0..exprs.len()).filter(|i| !used[*i]).collect();
    let rest_min = min_demand_all(rest);
    let pos = count - pats.len() + 1;

    if let Some(seq) = as_sequence_element(p0) {
        let max_take = remaining.len().saturating_sub(rest_min);
        let min_take = seq.min_take;
        if min_take > max_take {
            return false;
        }
        for k in min_take..=max_take {
            for start in 0..=(remaining.len() - k) {
                let idxs = &remaining[start..start + k];
                let slice: Vec<Expr> = idxs.iter().map(|i| exprs[*i].clone()).collect();
                let mut local = bindings.clone();
                if !seq.admits(ctx, &slice, &mut local) {
                    continue;
                }
                if let Some(name) = seq.name {
                    let value = Expr::normal_evaluated(Expr::system("Sequence"), slice.clone());
                    if !bind(&mut local, name, value) {
                        continue;
                    }
                }
                for i in idxs {
                    used[*i] = true;
                }
                if match_orderless(ctx, head, attrs, rest, exprs, used, count, &mut local) {
                    *bindings = local;
                    return true;
                }
                for i in idxs {
                    used[*i] = false;
                }
                // Zero-length runs are position independent.
                if k == 0 {
                    break;
                }
            }
        }
        return false;
    }

    if let PatternForm::Optional { pattern, default } = classify(p0) {
        for &i in &remaining {
            let mut local = bindings.clone();
            if match_single(ctx, pattern, &exprs[i], &mut local) {
                used[i] = true;
                if match_orderless(ctx, head, attrs, rest, exprs, used, count, &mut local) {
                    *bindings = local;
                    return true;
                }
                used[i] = false;
            }
        }
        if let Some(value) = optional_default(ctx, head, default, pos, count) {
            let mut local = bindings.clone();
            if match_single(ctx, pattern, &value, &mut local)
                && match_orderless(ctx, head, attrs, rest, exprs, used, count, &mut local)
            {
                *bindings = local;
                return true;
            }
        }
        return false;
    }

    // Ordinary element: try every unused candidate.
    for &i in &remaining {
        let mut local = bindings.clone();
        if match_single(ctx, p0, &exprs[i], &mut local) {
            used[i] = true;
            if match_orderless(ctx, head, attrs, rest, exprs, used, count, &mut local) {
                *bindings = local;
                return true;
            }
            used[i] = false;
        }
    }

    // Flat absorption of a contiguous-in-bag run.
    if attrs.contains(Attributes::FLAT) {
        if let Some(h) = head {
            if flat_absorbable(p0, h) {
                let h = h.clone();
                let max_take = remaining.len().saturating_sub(rest_min);
                for k in 2..=max_take.max(1) {
                    if k > remaining.len() {
                        break;
                    }
                    for start in 0..=(remaining.len() - k) {
                        let idxs = &remaining[start..start + k];
                        let run: Vec<Expr> = idxs.iter().map(|i| exprs[*i].clone()).collect();
                        let candidate = absorb(&h, &run);
                        let mut local = bindings.clone();
                        if match_single(ctx, p0, &candidate, &mut local) {
                            for i in idxs {
                                used[*i] = true;
                            }
                            if match_orderless(ctx, head, attrs, rest, exprs, used, count, &mut local)
                            {
                                *bindings = local;
                                return true;
                            }
                            for i in idxs {
                                used[*i] = false;
                            }
                        }
                    }
                }
            }
        }
    }

    false
}

/// A sequence-style element pattern after peeling `Pattern` and
/// `PatternTest` wrappers: `x__`, `___h`, `p..`, and friends.
struct SequenceElement<'a> {
    name: Option<&'a Symbol>,
    tests: Vec<&'a Expr>,
    kind: SequenceKind<'a>,
    min_take: usize,
}

enum SequenceKind<'a> {
    HeadConstrained(Option<&'a Expr>),
    Repeated(&'a Expr),
}

impl<'a> SequenceElement<'a> {
    /// Does this sequence pattern admit the given run? Repeated patterns
    /// match each element against the unit pattern (bindings accumulate);
    /// pattern tests apply to every element of the run.
    fn admits(&self, ctx: &mut dyn MatchContext, slice: &[Expr], bindings: &mut Bindings) -> bool {
        match self.kind {
            SequenceKind::HeadConstrained(h) => {
                if !slice.iter().all(|e| head_ok(h, e)) {
                    return false;
                }
            }
            SequenceKind::Repeated(unit) => {
                for e in slice {
                    if !match_single(ctx, unit, e, bindings) {
                        return false;
                    }
                }
            }
        }
        for test in &self.tests {
            for e in slice {
                if !ctx.check_test(test, e) {
                    return false;
                }
            }
        }
        true
    }
}

fn as_sequence_element(p: &Expr) -> Option<SequenceElement<'_>> {
    fn peel<'a>(
        p: &'a Expr,
        name: Option<&'a Symbol>,
        tests: &mut Vec<&'a Expr>,
    ) -> Option<SequenceElement<'a>> {
        match classify(p) {
            PatternForm::BlankSequence(h) => Some(SequenceElement {
                name,
                tests: Vec::new(),
                kind: SequenceKind::HeadConstrained(h),
                min_take: 1,
            }),
            PatternForm::BlankNullSequence(h) => Some(SequenceElement {
                name,
                tests: Vec::new(),
                kind: SequenceKind::HeadConstrained(h),
                min_take: 0,
            }),
            PatternForm::Repeated { pattern, min_one } => Some(SequenceElement {
                name,
                tests: Vec::new(),
                kind: SequenceKind::Repeated(pattern),
                min_take: usize::from(min_one),
            }),
            PatternForm::Named { name: n, pattern } => peel(pattern, Some(n), tests),
            PatternForm::Test { pattern, test } => {
                tests.push(test);
                peel(pattern, name, tests)
            }
            _ => None,
        }
    }
    let mut tests = Vec::new();
    let mut found = peel(p, None, &mut tests)?;
    found.tests = tests;
    Some(found)
}
