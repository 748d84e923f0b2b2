//! Builtin symbols: attributes, message templates, defaults and native
//! handlers, registered into a fresh [`Evaluator`].
//!
//! Native handlers stand in for system rules: the rewrite loop consults
//! them after the head's pattern rules, and `NoMatch` falls through
//! exactly like a pattern miss, leaving the expression symbolic.

pub mod arithmetic;
pub mod assign;
pub mod attributes;
pub mod control;

use tungsten_core::{Expr, Symbol};
use tungsten_rewrite::Attributes;

use crate::eval::{BuiltinFn, Evaluator};
use crate::nvalue;

pub fn register_all(ev: &mut Evaluator) {
    register_attributes(ev);
    register_messages(ev);
    register_defaults(ev);
    register_handlers(ev);
    register_constants(ev);
}

fn set(ev: &mut Evaluator, name: &str, attrs: Attributes) {
    // Registration happens before anything is Protected or Locked, so
    // these writes cannot be refused.
    let _ = ev.defs.set_attributes(&Symbol::system(name), attrs);
}

fn register_attributes(ev: &mut Evaluator) {
    use Attributes as A;
    let numeric = A::LISTABLE | A::NUMERIC_FUNCTION | A::PROTECTED;

    set(
        ev,
        "Plus",
        A::FLAT | A::ORDERLESS | A::ONE_IDENTITY | numeric,
    );
    set(
        ev,
        "Times",
        A::FLAT | A::ORDERLESS | A::ONE_IDENTITY | numeric,
    );
    set(ev, "Power", A::ONE_IDENTITY | numeric);
    set(ev, "Minus", numeric);
    set(ev, "Subtract", numeric);
    set(ev, "Divide", numeric);

    set(ev, "List", A::PROTECTED | A::LOCKED);
    set(ev, "Sequence", A::PROTECTED);

    set(ev, "Hold", A::HOLD_ALL | A::PROTECTED);
    set(ev, "HoldComplete", A::HOLD_ALL_COMPLETE | A::PROTECTED);
    set(ev, "HoldPattern", A::HOLD_ALL | A::PROTECTED);
    set(ev, "Unevaluated", A::HOLD_ALL_COMPLETE | A::PROTECTED);
    set(ev, "Evaluate", A::PROTECTED);

    set(ev, "Set", A::HOLD_FIRST | A::SEQUENCE_HOLD | A::PROTECTED);
    set(ev, "SetDelayed", A::HOLD_ALL | A::SEQUENCE_HOLD | A::PROTECTED);
    set(ev, "UpSet", A::HOLD_FIRST | A::SEQUENCE_HOLD | A::PROTECTED);
    set(ev, "UpSetDelayed", A::HOLD_ALL | A::SEQUENCE_HOLD | A::PROTECTED);
    set(ev, "Unset", A::HOLD_FIRST | A::PROTECTED);
    set(ev, "Clear", A::HOLD_ALL | A::PROTECTED);
    set(ev, "ClearAll", A::HOLD_ALL | A::PROTECTED);

    set(ev, "Attributes", A::HOLD_ALL | A::PROTECTED);
    set(ev, "SetAttributes", A::HOLD_FIRST | A::PROTECTED);
    set(ev, "ClearAttributes", A::HOLD_FIRST | A::PROTECTED);
    set(ev, "Protect", A::HOLD_ALL | A::PROTECTED);
    set(ev, "Unprotect", A::HOLD_ALL | A::PROTECTED);
    set(ev, "Default", A::PROTECTED);
    set(ev, "Names", A::PROTECTED);

    set(ev, "If", A::HOLD_REST | A::PROTECTED);
    set(ev, "CompoundExpression", A::HOLD_ALL | A::PROTECTED);
    set(ev, "ReplaceAll", A::PROTECTED);
    set(ev, "MatchQ", A::PROTECTED);
    set(ev, "SameQ", A::PROTECTED);
    set(ev, "Head", A::PROTECTED);
    set(ev, "AtomQ", A::PROTECTED);
    set(ev, "IntegerQ", A::PROTECTED);
    set(ev, "NumberQ", A::PROTECTED);
    set(ev, "EvenQ", A::LISTABLE | A::PROTECTED);
    set(ev, "OddQ", A::LISTABLE | A::PROTECTED);
    set(ev, "N", A::PROTECTED);
    set(ev, "Thread", A::PROTECTED);

    // Pattern construct heads. Matching treats them structurally; the
    // attributes only keep their contents from evaluating on the way in.
    set(ev, "Blank", A::PROTECTED);
    set(ev, "BlankSequence", A::PROTECTED);
    set(ev, "BlankNullSequence", A::PROTECTED);
    set(ev, "Pattern", A::HOLD_FIRST | A::PROTECTED);
    set(ev, "Optional", A::PROTECTED);
    set(ev, "Alternatives", A::PROTECTED);
    set(ev, "Condition", A::HOLD_ALL | A::PROTECTED);
    set(ev, "PatternTest", A::HOLD_REST | A::PROTECTED);
    set(ev, "Repeated", A::PROTECTED);
    set(ev, "RepeatedNull", A::PROTECTED);
    set(ev, "Except", A::PROTECTED);
    set(ev, "Verbatim", A::HOLD_ALL | A::PROTECTED);
    set(ev, "Rule", A::SEQUENCE_HOLD | A::PROTECTED);
    set(ev, "RuleDelayed", A::HOLD_REST | A::SEQUENCE_HOLD | A::PROTECTED);

    set(ev, "True", A::PROTECTED);
    set(ev, "False", A::PROTECTED);
    set(ev, "Null", A::PROTECTED);
    set(ev, "$Failed", A::PROTECTED);
    set(ev, "$Aborted", A::PROTECTED);
    set(ev, "Pi", A::CONSTANT | A::PROTECTED);
    set(ev, "E", A::CONSTANT | A::PROTECTED);
}

fn register_messages(ev: &mut Evaluator) {
    let entries: &[(&str, &str, &str)] = &[
        ("Set", "wrsym", "Symbol `1` is Protected."),
        ("Set", "write", "Tag `1` in `2` is Protected."),
        ("SetAttributes", "locked", "Symbol `1` is locked."),
        ("Unset", "norep", "Assignment on `1` for `2` not found."),
        (
            "Thread",
            "tdlen",
            "Objects of unequal length in `1` cannot be combined.",
        ),
        ("$IterationLimit", "itlim", "Iteration limit of `1` exceeded."),
        (
            "$RecursionLimit",
            "reclim",
            "Recursion depth of `1` exceeded.",
        ),
        (
            "UpSet",
            "nosym",
            "`1` does not contain a symbol to attach a rule to.",
        ),
        ("Attributes", "attnf", "`1` is not a known attribute."),
    ];
    for (sym, tag, template) in entries {
        ev.defs
            .set_message(&Symbol::system(sym), tag, (*template).to_string());
    }
}

fn register_defaults(ev: &mut Evaluator) {
    ev.defs.set_default(&Symbol::system("Plus"), None, Expr::int(0));
    ev.defs.set_default(&Symbol::system("Times"), None, Expr::int(1));
    // Power's default applies to the exponent position only.
    ev.defs
        .set_default(&Symbol::system("Power"), Some(2), Expr::int(1));
}

fn register_handlers(ev: &mut Evaluator) {
    let table: &[(&str, BuiltinFn)] = &[
        ("Plus", arithmetic::plus),
        ("Times", arithmetic::times),
        ("Power", arithmetic::power),
        ("Minus", arithmetic::minus),
        ("Subtract", arithmetic::subtract),
        ("Divide", arithmetic::divide),
        ("Set", assign::set),
        ("SetDelayed", assign::set_delayed),
        ("UpSet", assign::upset),
        ("UpSetDelayed", assign::upset_delayed),
        ("Unset", assign::unset),
        ("Clear", assign::clear),
        ("ClearAll", assign::clear_all),
        ("Attributes", attributes::attributes),
        ("SetAttributes", attributes::set_attributes),
        ("ClearAttributes", attributes::clear_attributes),
        ("Protect", attributes::protect),
        ("Unprotect", attributes::unprotect),
        ("Default", attributes::default_value),
        ("Names", attributes::names),
        ("If", control::if_),
        ("CompoundExpression", control::compound_expression),
        ("Evaluate", control::evaluate),
        ("ReplaceAll", control::replace_all),
        ("MatchQ", control::match_q),
        ("SameQ", control::same_q),
        ("Head", control::head),
        ("AtomQ", control::atom_q),
        ("IntegerQ", control::integer_q),
        ("NumberQ", control::number_q),
        ("EvenQ", control::even_q),
        ("OddQ", control::odd_q),
        ("N", nvalue::n),
    ];
    for (name, f) in table {
        ev.register_handler(Symbol::system(name), *f);
    }
}

fn register_constants(ev: &mut Evaluator) {
    // N-rules for the constants; exact forms stay symbolic otherwise.
    nvalue::set_n_rule(ev, &Symbol::system("Pi"), Expr::real(std::f64::consts::PI));
    nvalue::set_n_rule(ev, &Symbol::system("E"), Expr::real(std::f64::consts::E));
}
