//! SQL identifier validation for table, alias and column names.
//!
//! Row shapes and configuration splice names into SQL text, so they are
//! restricted to plain identifiers. Values never go through here: they are
//! always bound as parameters.

// ═══════════════════════════════════════════════════════════════════════════
// SQL IDENTIFIER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════

/// Maximum length for SQL identifiers (`PostgreSQL` limit is 63).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Whether `s` is a plain SQL identifier.
///
/// Accepted: an ASCII letter or underscore, followed by ASCII letters,
/// digits or underscores, 1 to 63 characters in total.
///
/// # Examples
///
/// ```
/// use expr_sql::is_valid_sql_identifier;
///
/// assert!(is_valid_sql_identifier("umbracoNode"));
/// assert!(is_valid_sql_identifier("_parent_id"));
///
/// assert!(!is_valid_sql_identifier(""));
/// assert!(!is_valid_sql_identifier("1node"));
/// assert!(!is_valid_sql_identifier("node.id"));
/// assert!(!is_valid_sql_identifier("node]; DROP"));
/// ```
#[inline]
#[must_use]
pub fn is_valid_sql_identifier(s: &str) -> bool {
    let Some((first, rest)) = s.as_bytes().split_first() else {
        return false;
    };
    s.len() <= MAX_IDENTIFIER_LENGTH
        && (first.is_ascii_alphabetic() || *first == b'_')
        && rest.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

/// Assert that `s` is a valid SQL identifier.
///
/// # Panics
///
/// Panics if the identifier is invalid. Meant for names written in code
/// (row shapes), not for user input.
///
/// ```should_panic
/// use expr_sql::assert_valid_sql_identifier;
///
/// assert_valid_sql_identifier("node; DROP TABLE", "table");
/// ```
#[inline]
pub fn assert_valid_sql_identifier(s: &str, context: &str) {
    assert!(
        is_valid_sql_identifier(s),
        "invalid SQL {context} name '{s}': expected an ASCII letter or underscore \
         followed by letters, digits or underscores, at most {MAX_IDENTIFIER_LENGTH} chars"
    );
}
