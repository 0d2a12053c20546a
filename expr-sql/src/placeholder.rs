//! `@N` placeholder handling for clause assembly.
//!
//! Compiled clauses number their placeholders from zero against their own
//! parameter list. Combining clauses needs two rewrites: shifting the numbers
//! of a clause appended after others ([`shift`]), and turning the final text
//! into the dialect's positional syntax while flattening the parameters
//! ([`Renumber`]).
//!
//! Tokens inside quoted strings, quoted identifiers and `[bracketed]` names
//! are left alone, as are `@N` sequences glued to a preceding identifier
//! (`a@1`) or `@` (`@@1`).

use std::collections::HashMap;
use std::ops::Range;

use crate::dialect::Dialect;
use crate::value::Value;

/// What an empty value set renders as inside `IN (...)`. Unlike `NULL`, it
/// stays false under `NOT`.
pub(crate) const EMPTY_SET: &str = "SELECT 1 WHERE 1 = 0";

/// One `@N` token: its byte range in the text and its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub span: Range<usize>,
    pub slot: usize,
}

/// Find every placeholder token outside quoted regions.
pub(crate) fn scan(sql: &str) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut closing: Option<u8> = None;
    let mut i = 0;

    while let Some(&b) = bytes.get(i) {
        if let Some(end) = closing {
            if b == end {
                closing = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => closing = Some(b),
            b'[' => closing = Some(b']'),
            b'@' if !glued(bytes, i) => {
                let digits = sql
                    .get(i + 1..)
                    .map_or(0, |rest| rest.bytes().take_while(u8::is_ascii_digit).count());
                let end = i + 1 + digits;
                // too many digits to be a slot: not ours
                if let Some(slot) = sql.get(i + 1..end).and_then(|d| d.parse().ok()) {
                    tokens.push(Token {
                        span: i..end,
                        slot,
                    });
                }
                if digits > 0 {
                    i = end;
                    continue;
                }
            },
            _ => {},
        }
        i += 1;
    }
    tokens
}

/// Whether the `@` at `at` continues an identifier or another `@`.
fn glued(bytes: &[u8], at: usize) -> bool {
    at.checked_sub(1)
        .and_then(|prev| bytes.get(prev))
        .is_some_and(|&c| c.is_ascii_alphanumeric() || c == b'_' || c == b'@')
}

/// Rebuild `sql`, replacing each token with the text `render` gives it.
fn rewrite(sql: &str, mut render: impl FnMut(&Token) -> String) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for token in scan(sql) {
        out.push_str(&sql[last..token.span.start]);
        out.push_str(&render(&token));
        last = token.span.end;
    }
    out.push_str(&sql[last..]);
    out
}

/// Add `offset` to every placeholder in `sql`.
pub(crate) fn shift(sql: &str, offset: usize) -> String {
    if offset == 0 {
        return sql.to_string();
    }
    rewrite(sql, |t| format!("@{}", t.slot + offset))
}

/// Renumbers clauses into one global, 1-based sequence of dialect
/// placeholders, collecting the parameters in placeholder order.
#[derive(Debug)]
pub(crate) struct Renumber<'a> {
    dialect: &'a dyn Dialect,
    params: Vec<Value>,
}

impl<'a> Renumber<'a> {
    pub const fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// Rewrite one clause against its own parameter list.
    ///
    /// A slot referenced twice reuses its first placeholder. An array
    /// parameter expands to one placeholder per element, or to
    /// [`EMPTY_SET`] when empty. Parameters nothing references are dropped;
    /// tokens without a parameter are kept as written.
    pub fn clause(&mut self, sql: &str, params: &[Value]) -> String {
        let mut rendered: HashMap<usize, String> = HashMap::new();
        rewrite(sql, |token| {
            let Some(value) = params.get(token.slot) else {
                return sql[token.span.clone()].to_string();
            };
            if let Some(text) = rendered.get(&token.slot) {
                return text.clone();
            }
            let text = match value {
                Value::Array(items) if items.is_empty() => EMPTY_SET.to_string(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| self.push(item.clone()))
                    .collect::<Vec<_>>()
                    .join(", "),
                other => self.push(other.clone()),
            };
            rendered.insert(token.slot, text.clone());
            text
        })
    }

    fn push(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.param(self.params.len())
    }

    pub fn into_parameters(self) -> Vec<Value> {
        self.params
    }
}
