//! Procedural macros for `expr-sql`.
//!
//! Use through the re-export in `expr_sql`:
//!
//! ```ignore
//! use expr_sql::predicate;
//!
//! let min = 2;
//! let tree = predicate!(|x| x.level >= min && !x.trashed);
//! ```

mod errors;
mod predicate;

use proc_macro::TokenStream;

/// Build an `expr_sql::Expr` lambda from closure syntax.
///
/// The closure is never called: its body is translated node by node.
/// Sub-expressions that do not mention a closure parameter are evaluated
/// where the macro is written, so captured variables become bound values.
///
/// | Syntax | Tree |
/// |--------|------|
/// | `x.name` | member access |
/// | `a == b`, `a < b`, `a && b`, `!a` ... | binary / unary nodes |
/// | `x.path.starts_with("-1")` | method call |
/// | `sql_in(ids, x.id)` | static call |
/// | `x.parent_id.unwrap_or(-1)` | `Coalesce` |
/// | `x.id as i64` | `Convert` |
/// | `Point::new(a, b)` | constructor |
/// | `[1, 2, 3]` | array literal |
/// | `None` | `null` |
///
/// Methods without a SQL translation are rejected at compile time.
#[proc_macro]
pub fn predicate(input: TokenStream) -> TokenStream {
    predicate::predicate_impl(input)
}
