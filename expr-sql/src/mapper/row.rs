use crate::dialect::Dialect;
use crate::error::CompileError;
use crate::expr::{Expr, Lambda, Member, Unary, UnaryOp};
use crate::validate::assert_valid_sql_identifier;

use super::{Mapped, MemberMapper};

/// The columns of one table, keyed by the member names predicates use.
///
/// ```
/// use expr_sql::RowShape;
///
/// let node = RowShape::new("umbracoNode")
///     .column("id", "id")
///     .column("parent_id", "parentId");
/// assert_eq!(node.column_for("parent_id"), Some("parentId"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowShape {
    table: String,
    columns: Vec<(String, String)>,
}

impl RowShape {
    /// A shape over `table` with no columns yet.
    ///
    /// # Panics
    ///
    /// Panics if `table` is not a valid SQL identifier.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        assert_valid_sql_identifier(&table, "table");
        Self {
            table,
            columns: Vec::new(),
        }
    }

    /// Map `member` to `column`.
    ///
    /// # Panics
    ///
    /// Panics if `column` is not a valid SQL identifier.
    #[must_use]
    pub fn column(mut self, member: impl Into<String>, column: impl Into<String>) -> Self {
        let column = column.into();
        assert_valid_sql_identifier(&column, "column");
        self.columns.push((member.into(), column));
        self
    }

    /// The unquoted table name.
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The column `member` maps to.
    pub fn column_for(&self, member: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, c)| c.as_str())
    }

    /// Use this shape under `alias`.
    ///
    /// # Panics
    ///
    /// Panics if `alias` is not a valid SQL identifier.
    pub fn aliased<'a>(&'a self, alias: &'a str) -> RowSource<'a> {
        assert_valid_sql_identifier(alias, "alias");
        RowSource {
            shape: self,
            alias: Some(alias),
        }
    }
}

/// A row shape as it appears in a query, optionally aliased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSource<'a> {
    shape: &'a RowShape,
    alias: Option<&'a str>,
}

impl<'a> From<&'a RowShape> for RowSource<'a> {
    fn from(shape: &'a RowShape) -> Self {
        Self { shape, alias: None }
    }
}

impl RowSource<'_> {
    /// `quote(alias or table).quote(column)` for `member`.
    fn reference(&self, member: &str, dialect: &dyn Dialect) -> Result<String, CompileError> {
        let column = self
            .shape
            .column_for(member)
            .ok_or_else(|| CompileError::mapping(member, self.shape.table()))?;
        let owner = self.alias.unwrap_or(self.shape.table());
        Ok(format!(
            "{}.{}",
            dialect.quote_name(owner),
            dialect.quote_name(column)
        ))
    }
}

/// Maps members of `N` row shapes, one per lambda parameter.
///
/// With a single shape any parameter (or conversion) maps to it. With two
/// or three shapes the lambda's parameter names select the shape
/// positionally: in `|n, p| ...`, `n` is the first source and `p` the
/// second.
#[derive(Debug, Clone)]
pub struct RowMapper<'a, const N: usize> {
    sources: [RowSource<'a>; N],
    names: Vec<String>,
}

impl<'a, const N: usize> RowMapper<'a, N> {
    /// A mapper over `sources`, matched to lambda parameters by position.
    pub const fn new(sources: [RowSource<'a>; N]) -> Self {
        Self {
            sources,
            names: Vec::new(),
        }
    }

    /// The source a parameter (or converted parameter) receiver refers to.
    fn source_for(&self, receiver: &Expr) -> Result<&RowSource<'a>, CompileError> {
        if N == 1 {
            return self
                .sources
                .first()
                .ok_or_else(|| CompileError::unsupported("row mapper has no shape"));
        }
        match receiver {
            Expr::Parameter(p) => self
                .names
                .iter()
                .position(|n| *n == p.name)
                .and_then(|i| self.sources.get(i))
                .ok_or_else(|| {
                    CompileError::unsupported(format!("unknown row parameter '{}'", p.name))
                }),
            _ => Err(CompileError::unsupported(
                "conversion of a row parameter is ambiguous with several row shapes",
            )),
        }
    }
}

impl<const N: usize> MemberMapper for RowMapper<'_, N> {
    fn on_lambda(&mut self, lambda: &Lambda) -> Result<(), CompileError> {
        if N == 1 {
            return Ok(());
        }
        if lambda.params.len() != N {
            return Err(CompileError::unsupported(format!(
                "expected a lambda over {N} rows, found {} parameters",
                lambda.params.len()
            )));
        }
        self.names = lambda.params.iter().map(|p| p.name.clone()).collect();
        Ok(())
    }

    fn map_member(
        &self,
        member: &Member,
        dialect: &dyn Dialect,
        replaying: bool,
    ) -> Result<Mapped, CompileError> {
        let Some(receiver) = member.target.as_deref() else {
            return Ok(Mapped::Value);
        };
        if !matches!(
            receiver,
            Expr::Parameter(_)
                | Expr::Unary(Unary {
                    op: UnaryOp::Convert,
                    ..
                })
        ) {
            return Ok(Mapped::Value);
        }

        let source = self.source_for(receiver)?;
        if replaying {
            return Ok(Mapped::Column(String::new()));
        }
        source
            .reference(&member.name, dialect)
            .map(Mapped::Column)
    }
}
