//! End-to-end evaluator scenarios: arithmetic combining, user definitions
//! through the assignment operators, attribute-driven normalization,
//! dispatch by pattern specificity, and evaluation control.

use pretty_assertions::assert_eq;
use tungsten_core::Expr;
use tungsten_rewrite::pattern::build;
use tungsten_runtime::Evaluator;

fn sys(name: &str, elems: Vec<Expr>) -> Expr {
    Expr::normal(Expr::system(name), elems)
}

fn call(name: &str, elems: Vec<Expr>) -> Expr {
    Expr::normal(Expr::symbol(name), elems)
}

fn set(ev: &mut Evaluator, lhs: Expr, rhs: Expr) {
    let out = ev.evaluate(&sys("Set", vec![lhs, rhs]));
    assert!(!out.same_q(&Expr::system("$Failed")), "assignment refused");
}

fn set_delayed(ev: &mut Evaluator, lhs: Expr, rhs: Expr) {
    let out = ev.evaluate(&sys("SetDelayed", vec![lhs, rhs]));
    assert_eq!(out, Expr::system("Null"));
}

#[test]
fn one_plus_two_is_three() {
    let mut ev = Evaluator::new();
    assert_eq!(
        ev.evaluate(&sys("Plus", vec![Expr::int(1), Expr::int(2)])),
        Expr::int(3)
    );
}

#[test]
fn mixed_exact_and_machine_arithmetic() {
    let mut ev = Evaluator::new();
    assert_eq!(
        ev.evaluate(&sys("Plus", vec![Expr::ratio(1, 2), Expr::ratio(1, 3)])),
        Expr::ratio(5, 6)
    );
    assert_eq!(
        ev.evaluate(&sys("Times", vec![Expr::int(2), Expr::real(1.5)])),
        Expr::real(3.0)
    );
}

#[test]
fn like_terms_collect() {
    let mut ev = Evaluator::new();
    // a + b + a -> b + 2 a (canonical order puts the bare symbol first).
    let out = ev.evaluate(&sys(
        "Plus",
        vec![Expr::symbol("a"), Expr::symbol("b"), Expr::symbol("a")],
    ));
    let two_a = sys("Times", vec![Expr::int(2), Expr::symbol("a")]);
    assert_eq!(out.elements(), &[Expr::symbol("b"), two_a]);
}

#[test]
fn fibonacci_via_downvalues() {
    let mut ev = Evaluator::new();
    set(&mut ev, call("fib", vec![Expr::int(0)]), Expr::int(0));
    set(&mut ev, call("fib", vec![Expr::int(1)]), Expr::int(1));
    let n = build::named("n");
    let recurse = sys(
        "Plus",
        vec![
            call("fib", vec![sys("Plus", vec![Expr::symbol("n"), Expr::int(-1)])]),
            call("fib", vec![sys("Plus", vec![Expr::symbol("n"), Expr::int(-2)])]),
        ],
    );
    set_delayed(&mut ev, call("fib", vec![n]), recurse);
    assert_eq!(ev.evaluate(&call("fib", vec![Expr::int(5)])), Expr::int(5));
    assert_eq!(ev.evaluate(&call("fib", vec![Expr::int(10)])), Expr::int(55));
}

#[test]
fn dispatch_by_argument_head() {
    let mut ev = Evaluator::new();
    set_delayed(
        &mut ev,
        call("f", vec![build::named_head("x", "Integer")]),
        Expr::string("exact"),
    );
    set_delayed(
        &mut ev,
        call("f", vec![build::named_head("x", "Real")]),
        Expr::string("inexact"),
    );
    assert_eq!(ev.evaluate(&call("f", vec![Expr::int(1)])), Expr::string("exact"));
    assert_eq!(
        ev.evaluate(&call("f", vec![Expr::real(1.0)])),
        Expr::string("inexact")
    );
    // No rule for a symbolic argument: stays put.
    let sym_arg = ev.evaluate(&call("f", vec![Expr::symbol("y")]));
    assert!(sym_arg.has_form("f", tungsten_core::Arity::Exact(1)) || sym_arg.head() == Expr::symbol("f"));
}

#[test]
fn specificity_beats_definition_order() {
    // The literal rule wins no matter which order the rules arrive in.
    for literal_first in [true, false] {
        let mut ev = Evaluator::new();
        let define_literal =
            |ev: &mut Evaluator| set(ev, call("g", vec![Expr::int(0)]), Expr::string("zero"));
        let define_general = |ev: &mut Evaluator| {
            set_delayed(ev, call("g", vec![build::named("x")]), Expr::string("general"))
        };
        if literal_first {
            define_literal(&mut ev);
            define_general(&mut ev);
        } else {
            define_general(&mut ev);
            define_literal(&mut ev);
        }
        assert_eq!(ev.evaluate(&call("g", vec![Expr::int(0)])), Expr::string("zero"));
        assert_eq!(
            ev.evaluate(&call("g", vec![Expr::int(7)])),
            Expr::string("general")
        );
    }
}

#[test]
fn redefinition_wins_among_equal_specificity() {
    let mut ev = Evaluator::new();
    set_delayed(&mut ev, call("h", vec![build::named("x")]), Expr::string("old"));
    set_delayed(&mut ev, call("h", vec![build::named("y")]), Expr::string("new"));
    assert_eq!(ev.evaluate(&call("h", vec![Expr::int(1)])), Expr::string("new"));
}

#[test]
fn hold_is_inert() {
    let mut ev = Evaluator::new();
    let held = sys("Hold", vec![sys("Plus", vec![Expr::int(1), Expr::int(1)])]);
    let out = ev.evaluate(&held);
    assert_eq!(
        out.elements(),
        &[sys("Plus", vec![Expr::int(1), Expr::int(1)])]
    );
}

#[test]
fn evaluate_overrides_hold() {
    let mut ev = Evaluator::new();
    let e = sys(
        "Hold",
        vec![sys(
            "Evaluate",
            vec![sys("Plus", vec![Expr::int(1), Expr::int(1)])],
        )],
    );
    assert_eq!(ev.evaluate(&e).elements(), &[Expr::int(2)]);
}

#[test]
fn unevaluated_is_stripped_matched_and_restored() {
    let mut ev = Evaluator::new();
    let summand = sys("Plus", vec![Expr::int(1), Expr::int(1)]);

    // No rule for f: the wrapper comes back, contents untouched.
    let kept = ev.evaluate(&call(
        "f",
        vec![sys("Unevaluated", vec![summand.clone()])],
    ));
    assert_eq!(kept.elements(), &[sys("Unevaluated", vec![summand.clone()])]);

    // With a rule, the bare contents participate in the match.
    set_delayed(&mut ev, call("g", vec![build::named("x")]), Expr::symbol("x"));
    let through = ev.evaluate(&call(
        "g",
        vec![sys("Unevaluated", vec![summand])],
    ));
    assert_eq!(through, Expr::int(2));
}

#[test]
fn protected_plus_refuses_assignment() {
    let mut ev = Evaluator::new();
    let lhs = sys("Plus", vec![build::named("x"), build::named("y")]);
    let out = ev.evaluate(&sys("Set", vec![lhs, Expr::int(0)]));
    assert_eq!(out, Expr::system("$Failed"));
    assert!(ev.messages.contains("Set", "wrsym"));
    // Plus still works.
    assert_eq!(
        ev.evaluate(&sys("Plus", vec![Expr::int(1), Expr::int(2)])),
        Expr::int(3)
    );
}

#[test]
fn unprotect_allows_then_protect_refuses_again() {
    let mut ev = Evaluator::new();
    set(&mut ev, call("mine", vec![]), Expr::int(1));
    ev.evaluate(&sys("Protect", vec![Expr::symbol("mine")]));
    let refused = ev.evaluate(&sys(
        "Set",
        vec![call("mine", vec![]), Expr::int(2)],
    ));
    assert_eq!(refused, Expr::system("$Failed"));
    ev.evaluate(&sys("Unprotect", vec![Expr::symbol("mine")]));
    set(&mut ev, call("mine", vec![]), Expr::int(3));
    assert_eq!(ev.evaluate(&call("mine", vec![])), Expr::int(3));
}

#[test]
fn evaluation_is_idempotent() {
    let mut ev = Evaluator::new();
    set_delayed(&mut ev, call("f", vec![build::named("x")]), Expr::symbol("x"));
    let inputs = vec![
        sys("Plus", vec![Expr::symbol("a"), Expr::int(1), Expr::symbol("b")]),
        sys("Hold", vec![sys("Plus", vec![Expr::int(1), Expr::int(1)])]),
        call("f", vec![sys("Times", vec![Expr::int(2), Expr::symbol("z")])]),
        sys("List", vec![Expr::ratio(1, 2), Expr::real(2.5), Expr::string("s")]),
    ];
    for e in inputs {
        let once = ev.evaluate(&e);
        let twice = ev.evaluate(&once);
        assert!(once.same_q(&twice), "not a fixpoint: {once} vs {twice}");
    }
}

#[test]
fn orderless_is_commutative() {
    let mut ev = Evaluator::new();
    let ab = ev.evaluate(&sys("Plus", vec![Expr::symbol("a"), Expr::symbol("b")]));
    let ba = ev.evaluate(&sys("Plus", vec![Expr::symbol("b"), Expr::symbol("a")]));
    assert!(ab.same_q(&ba));
}

#[test]
fn flat_is_associative() {
    let mut ev = Evaluator::new();
    let left = ev.evaluate(&sys(
        "Plus",
        vec![
            sys("Plus", vec![Expr::symbol("a"), Expr::symbol("b")]),
            Expr::symbol("c"),
        ],
    ));
    let right = ev.evaluate(&sys(
        "Plus",
        vec![
            Expr::symbol("a"),
            sys("Plus", vec![Expr::symbol("b"), Expr::symbol("c")]),
        ],
    ));
    assert!(left.same_q(&right));
    assert_eq!(
        left.elements(),
        &[Expr::symbol("a"), Expr::symbol("b"), Expr::symbol("c")]
    );
}

#[test]
fn replace_all_splices_sequences() {
    let mut ev = Evaluator::new();
    // f[1, 2, 3] /. f[x_, ys__] -> {x, ys}
    let rule = sys(
        "Rule",
        vec![
            call("f", vec![build::named("x"), build::named_sequence("ys")]),
            sys("List", vec![Expr::symbol("x"), Expr::symbol("ys")]),
        ],
    );
    let subject = call("f", vec![Expr::int(1), Expr::int(2), Expr::int(3)]);
    let out = ev.evaluate(&sys("ReplaceAll", vec![subject, rule]));
    assert_eq!(
        out.elements(),
        &[Expr::int(1), Expr::int(2), Expr::int(3)]
    );
}

#[test]
fn match_q_answers_structurally() {
    let mut ev = Evaluator::new();
    let yes = ev.evaluate(&sys(
        "MatchQ",
        vec![Expr::int(4), build::blank_head("Integer")],
    ));
    assert_eq!(yes, Expr::system("True"));
    let no = ev.evaluate(&sys(
        "MatchQ",
        vec![Expr::real(4.0), build::blank_head("Integer")],
    ));
    assert_eq!(no, Expr::system("False"));
}

#[test]
fn pattern_test_dispatches_through_evaluator() {
    let mut ev = Evaluator::new();
    // even[x_?EvenQ] := True; even[x_] := False. The tested blank is
    // the more specific of the two and wins for even[4].
    set_delayed(
        &mut ev,
        call(
            "even",
            vec![build::pattern_test(build::named("x"), Expr::system("EvenQ"))],
        ),
        Expr::system("True"),
    );
    set_delayed(
        &mut ev,
        call("even", vec![build::named("x")]),
        Expr::system("False"),
    );
    assert_eq!(ev.evaluate(&call("even", vec![Expr::int(4)])), Expr::system("True"));
    assert_eq!(ev.evaluate(&call("even", vec![Expr::int(5)])), Expr::system("False"));
}

#[test]
fn condition_reevaluates_per_binding() {
    let mut ev = Evaluator::new();
    // pos[x_ /; EvenQ[x]] := x
    let guarded = build::condition(
        build::named("x"),
        sys("EvenQ", vec![Expr::symbol("x")]),
    );
    set_delayed(&mut ev, call("pos", vec![guarded]), Expr::symbol("x"));
    assert_eq!(ev.evaluate(&call("pos", vec![Expr::int(2)])), Expr::int(2));
    let miss = ev.evaluate(&call("pos", vec![Expr::int(3)]));
    assert!(miss.head() == Expr::symbol("pos"));
}

#[test]
fn default_optional_matches_lone_argument() {
    let mut ev = Evaluator::new();
    // coeff[a_. * x_] := a picks up Times's default 1 for a bare symbol.
    let pattern = sys(
        "Times",
        vec![build::optional("a"), build::named("x")],
    );
    set_delayed(&mut ev, call("coeff", vec![pattern]), Expr::symbol("a"));
    assert_eq!(
        ev.evaluate(&call(
            "coeff",
            vec![sys("Times", vec![Expr::int(3), Expr::symbol("y")])]
        )),
        Expr::int(3)
    );
    assert_eq!(
        ev.evaluate(&call("coeff", vec![Expr::symbol("y")])),
        Expr::int(1)
    );
}

#[test]
fn upvalues_via_upset_delayed() {
    let mut ev = Evaluator::new();
    // area /: scale[area, k_] := k * 100, attached to area.
    let lhs = call(
        "scale",
        vec![Expr::symbol("area"), build::named("k")],
    );
    let rhs = sys("Times", vec![Expr::symbol("k"), Expr::int(100)]);
    let out = ev.evaluate(&sys("UpSetDelayed", vec![lhs, rhs]));
    assert_eq!(out, Expr::system("Null"));
    assert_eq!(
        ev.evaluate(&call("scale", vec![Expr::symbol("area"), Expr::int(3)])),
        Expr::int(300)
    );
}

#[test]
fn clear_and_unset_remove_rules() {
    let mut ev = Evaluator::new();
    set(&mut ev, call("f", vec![Expr::int(1)]), Expr::int(10));
    assert_eq!(ev.evaluate(&call("f", vec![Expr::int(1)])), Expr::int(10));

    ev.evaluate(&sys("Unset", vec![call("f", vec![Expr::int(1)])]));
    let unresolved = ev.evaluate(&call("f", vec![Expr::int(1)]));
    assert!(unresolved.head() == Expr::symbol("f"));

    set(&mut ev, call("f", vec![Expr::int(2)]), Expr::int(20));
    ev.evaluate(&sys("Clear", vec![Expr::symbol("f")]));
    let cleared = ev.evaluate(&call("f", vec![Expr::int(2)]));
    assert!(cleared.head() == Expr::symbol("f"));
}

#[test]
fn user_attributes_change_evaluation() {
    let mut ev = Evaluator::new();
    ev.evaluate(&sys(
        "SetAttributes",
        vec![Expr::symbol("comm"), Expr::system("Orderless")],
    ));
    let out = ev.evaluate(&call(
        "comm",
        vec![Expr::symbol("b"), Expr::symbol("a")],
    ));
    assert_eq!(out.elements(), &[Expr::symbol("a"), Expr::symbol("b")]);
    let attrs = ev.evaluate(&sys("Attributes", vec![Expr::symbol("comm")]));
    assert_eq!(attrs.elements(), &[Expr::system("Orderless")]);
}

#[test]
fn names_lists_defined_symbols() {
    let mut ev = Evaluator::new();
    set(&mut ev, call("alpha", vec![]), Expr::int(1));
    set(&mut ev, call("beta", vec![]), Expr::int(2));
    let out = ev.evaluate(&sys("Names", vec![Expr::string("al*")]));
    assert_eq!(out.elements(), &[Expr::string("Global`alpha")]);
}

#[test]
fn if_and_compound_expression_control_flow() {
    let mut ev = Evaluator::new();
    let picked = ev.evaluate(&sys(
        "If",
        vec![Expr::system("True"), Expr::int(1), Expr::int(2)],
    ));
    assert_eq!(picked, Expr::int(1));

    // x = 5; x + 1
    let listed = ev.evaluate(&sys(
        "CompoundExpression",
        vec![
            sys("Set", vec![Expr::symbol("x"), Expr::int(5)]),
            sys("Plus", vec![Expr::symbol("x"), Expr::int(1)]),
        ],
    ));
    assert_eq!(listed, Expr::int(6));
}

#[test]
fn own_values_resolve_symbols() {
    let mut ev = Evaluator::new();
    set(&mut ev, Expr::symbol("speed"), Expr::int(42));
    assert_eq!(ev.evaluate(&Expr::symbol("speed")), Expr::int(42));
    assert_eq!(
        ev.evaluate(&sys("Plus", vec![Expr::symbol("speed"), Expr::int(1)])),
        Expr::int(43)
    );
}

#[test]
fn subvalues_for_curried_heads() {
    let mut ev = Evaluator::new();
    // deriv[n_][x_] := n * x
    let lhs = Expr::normal(
        call("deriv", vec![build::named("n")]),
        vec![build::named("x")],
    );
    let rhs = sys("Times", vec![Expr::symbol("n"), Expr::symbol("x")]);
    set_delayed(&mut ev, lhs, rhs);
    let e = Expr::normal(call("deriv", vec![Expr::int(3)]), vec![Expr::int(4)]);
    assert_eq!(ev.evaluate(&e), Expr::int(12));
}
