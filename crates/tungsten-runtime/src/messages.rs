//! User-visible evaluation messages.
//!
//! Anomalies that must not abort evaluation (wrong argument counts,
//! protected-symbol writes, length mismatches under `Listable` threading)
//! are reported here and evaluation carries on. The driver drains the list
//! after each top-level input.

use tungsten_core::{Expr, Symbol};

/// One emitted message, e.g. `Set::wrsym: Symbol Plus is Protected.`
#[derive(Debug, Clone, PartialEq)]
pub struct EvalMessage {
    pub symbol: Symbol,
    pub tag: String,
    pub text: String,
}

impl std::fmt::Display for EvalMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}: {}", self.symbol.short_name(), self.tag, self.text)
    }
}

/// Message sink for one evaluation session.
#[derive(Debug, Default)]
pub struct Messages {
    entries: Vec<EvalMessage>,
}

impl Messages {
    pub fn new() -> Messages {
        Messages::default()
    }

    /// Emit a message from a template, filling `` `1` ``, `` `2` ``, ...
    /// placeholders with the rendered arguments.
    pub fn emit(&mut self, symbol: Symbol, tag: &str, template: &str, args: &[Expr]) {
        let text = fill_template(template, args);
        tracing::debug!(symbol = %symbol, tag, %text, "message");
        self.entries.push(EvalMessage {
            symbol,
            tag: tag.to_string(),
            text,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvalMessage> {
        self.entries.iter()
    }

    /// Remove and return all pending messages.
    pub fn drain(&mut self) -> Vec<EvalMessage> {
        std::mem::take(&mut self.entries)
    }

    pub fn contains(&self, short_name: &str, tag: &str) -> bool {
        self.entries
            .iter()
            .any(|m| m.symbol.short_name() == short_name && m.tag == tag)
    }
}

/// Replace `` `n` `` placeholders with the display form of the n-th
/// (1-based) argument. Unknown placeholders are left as-is.
fn fill_template(template: &str, args: &[Expr]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '`' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(*d);
            chars.next();
        }
        if chars.peek() == Some(&'`') && !digits.is_empty() {
            chars.next();
            match digits.parse::<usize>().ok().and_then(|n| args.get(n - 1)) {
                Some(arg) => out.push_str(&arg.to_string()),
                None => {
                    out.push('`');
                    out.push_str(&digits);
                    out.push('`');
                }
            }
        } else {
            out.push('`');
            out.push_str(&digits);
        }
    }
    out
}
