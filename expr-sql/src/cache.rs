//! Render-once, replay-many caching of compiled clauses.
//!
//! A [`CachedExpression`] wraps a predicate tree that is compiled many times
//! with different captured values but always yields the same SQL shape. The
//! first compilation freezes the SQL text; later compilations only re-bind
//! parameters, in the same order, without producing any text.
//!
//! ```
//! use expr_sql::{CachedExpression, Compiler, Expr, FieldMap, SqlContext, Sqlite, Value};
//!
//! let ctx = SqlContext::new(Sqlite);
//! let fields = FieldMap::new().with("Document", "level", "\"doc\".\"level\"");
//! let mut cached = CachedExpression::new();
//!
//! for level in [1, 2] {
//!     let x = Expr::param("x");
//!     cached.wrap(Expr::lambda(["x"], x.field("level").eq(Expr::captured("level", level))));
//!
//!     let mut compiler = Compiler::for_model(&ctx, "Document", &fields);
//!     let sql = compiler.compile_cached(&mut cached).unwrap();
//!     assert_eq!(sql, "(\"doc\".\"level\" = @0)");
//!     assert_eq!(compiler.parameters(), &[Value::from(level)]);
//! }
//! ```

use std::collections::HashMap;

use crate::error::CompileError;
use crate::expr::Expr;

/// A predicate tree plus its frozen SQL once rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedExpression {
    inner: Option<Expr>,
    sql: Option<String>,
}

impl CachedExpression {
    /// An empty cell: no tree, nothing rendered.
    pub const fn new() -> Self {
        Self {
            inner: None,
            sql: None,
        }
    }

    /// Replace the wrapped tree.
    ///
    /// The new tree must have the same shape as any tree rendered before;
    /// only captured values may differ. Nothing checks this.
    pub fn wrap(&mut self, expr: Expr) {
        self.inner = Some(expr);
    }

    /// The wrapped tree, if any.
    #[inline]
    pub const fn inner(&self) -> Option<&Expr> {
        self.inner.as_ref()
    }

    /// Whether the SQL text has been frozen by a first render.
    #[inline]
    pub const fn is_rendered(&self) -> bool {
        self.sql.is_some()
    }

    /// The frozen SQL text, if any.
    #[inline]
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Store the result of the first render.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidState`] if the cell is already rendered.
    pub fn freeze(&mut self, sql: String) -> Result<(), CompileError> {
        if self.sql.is_some() {
            return Err(CompileError::InvalidState(
                "cached expression is already rendered".into(),
            ));
        }
        self.sql = Some(sql);
        Ok(())
    }
}

/// Cached expressions keyed by a stable clause identity.
#[derive(Debug, Clone, Default)]
pub struct ExpressionCache {
    slots: HashMap<String, CachedExpression>,
}

impl ExpressionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cell for `key`, created empty on first access.
    pub fn slot(&mut self, key: impl Into<String>) -> &mut CachedExpression {
        self.slots.entry(key.into()).or_default()
    }

    /// The cell for `key`, without creating it.
    pub fn get(&self, key: &str) -> Option<&CachedExpression> {
        self.slots.get(key)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds no cells.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every cell, so the next access renders afresh.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freeze_twice_is_invalid() {
        let mut cell = CachedExpression::new();
        assert!(!cell.is_rendered());
        cell.freeze("a = @0".into()).unwrap();
        assert!(cell.is_rendered());
        assert!(matches!(
            cell.freeze("b".into()),
            Err(CompileError::InvalidState(_))
        ));
        assert_eq!(cell.sql(), Some("a = @0"));
    }

    #[test]
    fn test_wrap_replaces_inner_keeps_sql() {
        let mut cell = CachedExpression::new();
        cell.wrap(Expr::constant(1));
        cell.freeze("@0".into()).unwrap();
        cell.wrap(Expr::constant(2));
        assert_eq!(cell.inner(), Some(&Expr::constant(2)));
        assert_eq!(cell.sql(), Some("@0"));
    }

    #[test]
    fn test_cache_slots_are_stable() {
        let mut cache = ExpressionCache::new();
        cache.slot("by-level").wrap(Expr::constant(1));
        cache.slot("by-level").freeze("x".into()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("by-level").is_some_and(CachedExpression::is_rendered));
        assert!(cache.get("other").is_none());
    }
}
