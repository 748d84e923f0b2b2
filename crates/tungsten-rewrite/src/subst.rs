//! Substitution of match bindings into a replacement template.

use tungsten_core::Expr;

use crate::matcher::Bindings;
use crate::pattern::is_sequence;

/// Replace every bound symbol in `template` with its binding, splicing
/// `Sequence[...]` bindings into surrounding element lists. An unbound
/// symbol stays a literal reference; that a replacement only mentions bound
/// names is the rule author's responsibility.
pub fn substitute(template: &Expr, bindings: &Bindings) -> Expr {
    match template {
        Expr::Symbol(s) => match bindings.get(s.name()) {
            Some(v) => v.clone(),
            None => template.clone(),
        },
        Expr::Normal(n) => {
            let head = substitute(n.head(), bindings);
            let mut elements = Vec::with_capacity(n.elements().len());
            for e in n.elements() {
                let r = substitute(e, bindings);
                if is_sequence(&r) {
                    elements.extend(r.elements().iter().cloned());
                } else {
                    elements.push(r);
                }
            }
            Expr::normal(head, elements)
        }
        _ => template.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn binding(name: &str, v: Expr) -> Bindings {
        let mut b = Bindings::new();
        b.insert(tungsten_core::Symbol::new(name).name().to_string(), v);
        b
    }

    #[test]
    fn replaces_bound_symbols() {
        let template = Expr::normal(Expr::symbol("f"), vec![Expr::symbol("x")]);
        let out = substitute(&template, &binding("x", Expr::int(3)));
        assert_eq!(out, Expr::normal(Expr::symbol("f"), vec![Expr::int(3)]));
    }

    #[test]
    fn splices_sequence_bindings() {
        let template = Expr::normal(Expr::symbol("f"), vec![Expr::symbol("xs"), Expr::int(9)]);
        let seq = Expr::normal(
            Expr::system("Sequence"),
            vec![Expr::int(1), Expr::int(2)],
        );
        let out = substitute(&template, &binding("xs", seq));
        assert_eq!(
            out,
            Expr::normal(
                Expr::symbol("f"),
                vec![Expr::int(1), Expr::int(2), Expr::int(9)]
            )
        );
    }

    #[test]
    fn unbound_symbols_stay_literal() {
        let template = Expr::symbol("y");
        assert_eq!(substitute(&template, &Bindings::new()), Expr::symbol("y"));
    }
}
