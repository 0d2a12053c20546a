//! Compile-time error helpers for `predicate!`.

use proc_macro2::Span;
use syn::Error;

/// Method and function names the compiler knows how to translate.
pub const KNOWN_METHODS: &[&str] = &[
    "equals",
    "starts_with",
    "ends_with",
    "contains",
    "invariant_equals",
    "invariant_starts_with",
    "invariant_ends_with",
    "invariant_contains",
    "sql_wildcard",
    "sql_equals",
    "sql_starts_with",
    "sql_ends_with",
    "sql_contains",
    "sql_in",
    "sql_nullable_equals",
    "sql_text",
    "sql_arg",
    "replace",
    "to_uppercase",
    "to_lowercase",
    "to_string",
    "unwrap_or",
    "len",
];

// =============================================================================
// FUZZY MATCHING ("DID YOU MEAN?")
// =============================================================================

/// Levenshtein edit distance, case-insensitive.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut row = Vec::with_capacity(b.len() + 1);
        row.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let substitute = prev.get(j).map_or(usize::MAX, |d| d + usize::from(ca != cb));
            let delete = prev.get(j + 1).map_or(usize::MAX, |d| d + 1);
            let insert = row.last().map_or(usize::MAX, |d| d + 1);
            row.push(substitute.min(delete).min(insert));
        }
        prev = row;
    }
    prev.last().copied().unwrap_or_default()
}

/// The closest option within a small edit distance.
pub fn find_similar<'a>(input: &str, options: &[&'a str]) -> Option<&'a str> {
    let threshold = (input.len() / 2).clamp(2, 4);
    options
        .iter()
        .map(|opt| (*opt, edit_distance(input, opt)))
        .filter(|(_, dist)| *dist <= threshold && *dist > 0)
        .min_by_key(|(_, dist)| *dist)
        .map(|(opt, _)| opt)
}

/// `"\n\nDid you mean '...'?"`, or nothing.
pub fn did_you_mean(input: &str, options: &[&str]) -> String {
    find_similar(input, options)
        .map(|s| format!("\n\nDid you mean '{s}'?"))
        .unwrap_or_default()
}

// =============================================================================
// ERROR HELPERS
// =============================================================================

/// A method on a closure parameter that has no SQL translation.
pub fn unknown_method(span: Span, got: &str) -> Error {
    let suggestion = did_you_mean(got, KNOWN_METHODS);
    Error::new(
        span,
        format!(
            "Method '{got}' cannot be translated to SQL.{suggestion}\n\n\
             Supported: {}",
            KNOWN_METHODS.join(", ")
        ),
    )
}

/// Syntax that has no predicate form.
pub fn unsupported(span: Span, what: &str, example: &str) -> Error {
    Error::new(
        span,
        format!("Unsupported {what} in predicate.\n\nExample: {example}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("Contains", "contains"), 0);
    }

    #[test]
    fn test_did_you_mean() {
        assert_eq!(find_similar("start_with", KNOWN_METHODS), Some("starts_with"));
        assert_eq!(find_similar("frobnicate", KNOWN_METHODS), None);
        assert!(did_you_mean("to_lowercas", KNOWN_METHODS).contains("to_lowercase"));
    }
}
