//! Collaborators shared by every compiler.

use crate::dialect::{Dialect, TextColumnType};
use crate::eval::{Evaluate, Interpreter};

/// The dialect, evaluator and text column default a compiler works with.
///
/// Built once and borrowed by each compiler or query; nothing in it changes
/// during compilation.
///
/// ```
/// use expr_sql::{Interpreter, SqlContext, SqlServer, TextColumnType};
///
/// let ctx = SqlContext::new(SqlServer)
///     .with_evaluator(Interpreter::new())
///     .with_text_column_type(TextColumnType::NText);
/// assert_eq!(ctx.dialect().name(), "sqlserver");
/// ```
#[derive(Debug)]
pub struct SqlContext {
    dialect: Box<dyn Dialect>,
    evaluator: Box<dyn Evaluate>,
    text_column_type: TextColumnType,
}

impl SqlContext {
    /// A context over `dialect` with the default [`Interpreter`] and
    /// `nvarchar` text columns.
    pub fn new(dialect: impl Dialect + 'static) -> Self {
        Self::from_boxed(Box::new(dialect))
    }

    pub(crate) fn from_boxed(dialect: Box<dyn Dialect>) -> Self {
        Self {
            dialect,
            evaluator: Box::new(Interpreter::new()),
            text_column_type: TextColumnType::default(),
        }
    }

    /// Replace the evaluator used for captured values and constructors.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl Evaluate + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Column type assumed by string comparisons that do not name one.
    #[must_use]
    pub fn with_text_column_type(mut self, kind: TextColumnType) -> Self {
        self.text_column_type = kind;
        self
    }

    /// The syntax provider.
    #[inline]
    pub fn dialect(&self) -> &dyn Dialect {
        &*self.dialect
    }

    /// The evaluator that turns value subtrees into [`Value`](crate::Value)s.
    #[inline]
    pub fn evaluator(&self) -> &dyn Evaluate {
        &*self.evaluator
    }

    /// See [`with_text_column_type`](Self::with_text_column_type).
    #[inline]
    pub const fn text_column_type(&self) -> TextColumnType {
        self.text_column_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Postgres;
    use crate::expr::Expr;
    use crate::value::Value;

    #[test]
    fn test_defaults() {
        let ctx = SqlContext::new(Postgres);
        assert_eq!(ctx.dialect().param(1), "$1");
        assert_eq!(ctx.text_column_type(), TextColumnType::NVarchar);
        assert_eq!(
            ctx.evaluator().evaluate(&Expr::constant(3)),
            Ok(Value::Int(3))
        );
    }
}
