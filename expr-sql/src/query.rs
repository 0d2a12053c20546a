//! Query builder: accumulates compiled WHERE clauses.
//!
//! Each `filter*` call compiles its input with a fresh [`Compiler`] and
//! stores the result as a [`Clause`] whose `@N` placeholders index its own
//! parameter list. [`Query::build`] joins the clauses with `AND` and turns
//! the placeholders into the dialect's positional syntax.
//!
//! ```
//! use expr_sql::{Expr, FieldMap, Query, SqlContext, Postgres, Value};
//!
//! let ctx = SqlContext::new(Postgres);
//! let fields = FieldMap::new()
//!     .with("Node", "id", "\"n\".\"id\"")
//!     .with("Node", "trashed", "\"n\".\"trashed\"");
//!
//! let result = Query::for_model(&ctx, "Node", &fields)
//!     .filter(&Expr::lambda(["x"], !Expr::param("x").field("trashed")))?
//!     .filter_in(&Expr::lambda(["x"], Expr::param("x").field("id")), [1, 2])?
//!     .build();
//!
//! assert_eq!(result.sql, r#"WHERE ("n"."trashed" = $1) AND ("n"."id" IN ($2, $3))"#);
//! assert_eq!(result.params, vec![Value::Bool(false), Value::Int(1), Value::Int(2)]);
//! # Ok::<(), expr_sql::CompileError>(())
//! ```

use tracing::debug;

use crate::cache::CachedExpression;
use crate::compiler::Compiler;
use crate::context::SqlContext;
use crate::error::CompileError;
use crate::expr::Expr;
use crate::mapper::{FieldResolver, MemberMapper, ModelMapper, RowMapper, RowSource};
use crate::placeholder::{shift, Renumber};
use crate::value::Value;

/// One compiled WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    sql: String,
    params: Vec<Value>,
}

impl Clause {
    /// A clause over its own parameter list: `@N` indexes `params`.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// SQL text with `@N` placeholders.
    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameters the clause's placeholders index.
    #[inline]
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Query result with SQL string and parameters.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "QueryResult must be used to execute the query"]
pub struct QueryResult {
    /// `WHERE ...` with dialect placeholders, or empty when no clause was added.
    pub sql: String,
    /// Values in placeholder order.
    pub params: Vec<Value>,
}

impl QueryResult {
    /// Bind a value to every `sql_arg(name)` parameter.
    pub fn bind_arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        for param in &mut self.params {
            if matches!(param, Value::Arg(n) if n == name) {
                *param = value.clone();
            }
        }
        self
    }

    /// Names of `sql_arg` parameters still waiting for a value.
    pub fn unbound_args(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter_map(|p| match p {
            Value::Arg(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// WHERE clause builder over one mapping strategy.
#[derive(Debug)]
pub struct Query<'a, M> {
    ctx: &'a SqlContext,
    mapper: M,
    clauses: Vec<Clause>,
}

/// Query over a business model.
pub type ModelQuery<'a> = Query<'a, ModelMapper<'a>>;
/// Query over one row shape.
pub type RowQuery<'a> = Query<'a, RowMapper<'a, 1>>;
/// Query over two joined row shapes.
pub type RowQuery2<'a> = Query<'a, RowMapper<'a, 2>>;
/// Query over three joined row shapes.
pub type RowQuery3<'a> = Query<'a, RowMapper<'a, 3>>;

impl<'a> ModelQuery<'a> {
    /// Start a query over `model`, resolving columns through `resolver`.
    pub fn for_model(ctx: &'a SqlContext, model: &'a str, resolver: &'a dyn FieldResolver) -> Self {
        Self::new(ctx, ModelMapper::new(model, resolver))
    }
}

impl<'a> RowQuery<'a> {
    /// Start a query over a single row shape.
    pub fn for_row(ctx: &'a SqlContext, source: impl Into<RowSource<'a>>) -> Self {
        Self::new(ctx, RowMapper::new([source.into()]))
    }
}

impl<'a, const N: usize> Query<'a, RowMapper<'a, N>> {
    /// Start a query over `N` joined row shapes.
    pub fn for_rows(ctx: &'a SqlContext, sources: [RowSource<'a>; N]) -> Self {
        Self::new(ctx, RowMapper::new(sources))
    }
}

impl<'a, M: MemberMapper + Clone> Query<'a, M> {
    /// An empty query over any mapping strategy.
    pub const fn new(ctx: &'a SqlContext, mapper: M) -> Self {
        Self {
            ctx,
            mapper,
            clauses: Vec::new(),
        }
    }

    fn compiler(&self) -> Compiler<'a, M> {
        Compiler::new(self.ctx, self.mapper.clone())
    }

    fn push(mut self, sql: String, params: Vec<Value>) -> Self {
        self.clauses.push(Clause::new(sql, params));
        self
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FILTERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Add a predicate clause.
    ///
    /// # Errors
    ///
    /// Any [`CompileError`] from compiling `predicate`.
    pub fn filter(self, predicate: &Expr) -> Result<Self, CompileError> {
        let mut compiler = self.compiler();
        let sql = compiler.compile(predicate)?;
        let params = compiler.into_parameters();
        Ok(self.push(sql, params))
    }

    /// Add a cached predicate clause, rendered on first use and replayed
    /// afterwards. An empty cell adds nothing.
    ///
    /// # Errors
    ///
    /// Any [`CompileError`] from compiling the wrapped tree.
    pub fn filter_cached(self, cell: &mut CachedExpression) -> Result<Self, CompileError> {
        let mut compiler = self.compiler();
        let sql = compiler.compile_cached(cell)?;
        if sql.is_empty() {
            return Ok(self);
        }
        let params = compiler.into_parameters();
        Ok(self.push(sql, params))
    }

    /// `<column> IN (...)`
    ///
    /// When every value is a string the comparison is case-insensitive:
    /// both the column and the values are lower-cased. No values match no
    /// row.
    ///
    /// # Errors
    ///
    /// Fails if `selector` is not a mapped field selector.
    pub fn filter_in<V: Into<Value>>(
        self,
        selector: &Expr,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, CompileError> {
        self.membership(selector, values.into_iter().map(Into::into).collect(), "IN")
    }

    /// `<column> NOT IN (...)`, lower-casing like [`filter_in`](Self::filter_in).
    /// No values match every row.
    ///
    /// # Errors
    ///
    /// Fails if `selector` is not a mapped field selector.
    pub fn filter_not_in<V: Into<Value>>(
        self,
        selector: &Expr,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, CompileError> {
        self.membership(selector, values.into_iter().map(Into::into).collect(), "NOT IN")
    }

    fn membership(
        self,
        selector: &Expr,
        values: Vec<Value>,
        keyword: &str,
    ) -> Result<Self, CompileError> {
        let column = self.compiler().column(selector)?;
        let (column, values): (String, Vec<Value>) = if !values.is_empty() && values.iter().all(Value::is_string) {
            (
                format!("lower({column})"),
                values.iter().map(Value::to_lowercase).collect(),
            )
        } else {
            (column, values)
        };
        Ok(self.push(
            format!("{column} {keyword} (@0)"),
            vec![Value::Array(values)],
        ))
    }

    /// Any of several predicates: `((p1) OR (p2) ...)`.
    ///
    /// Each predicate is compiled on its own and its placeholders shifted
    /// past the parameters of the predicates before it.
    ///
    /// # Errors
    ///
    /// Fails when `predicates` is empty or any predicate fails to compile.
    pub fn filter_any(self, predicates: &[Expr]) -> Result<Self, CompileError> {
        if predicates.is_empty() {
            return Err(CompileError::unsupported(
                "filter_any needs at least one predicate",
            ));
        }
        let mut parts = Vec::with_capacity(predicates.len());
        let mut params = Vec::new();
        for predicate in predicates {
            let mut compiler = self.compiler();
            let sql = compiler.compile(predicate)?;
            parts.push(format!("({})", shift(&sql, params.len())));
            params.extend(compiler.into_parameters());
        }
        Ok(self.push(format!("({})", parts.join(" OR ")), params))
    }

    /// `(<column> IS NULL)`
    ///
    /// # Errors
    ///
    /// Fails if `selector` is not a mapped field selector.
    pub fn filter_null(self, selector: &Expr) -> Result<Self, CompileError> {
        let column = self.compiler().column(selector)?;
        Ok(self.push(format!("({column} IS NULL)"), Vec::new()))
    }

    /// `(<column> IS NOT NULL)`
    ///
    /// # Errors
    ///
    /// Fails if `selector` is not a mapped field selector.
    pub fn filter_not_null(self, selector: &Expr) -> Result<Self, CompileError> {
        let column = self.compiler().column(selector)?;
        Ok(self.push(format!("({column} IS NOT NULL)"), Vec::new()))
    }

    /// Any of several columns in one set of values:
    /// `(a IN (...) OR b IN (...))`, sharing a single array parameter.
    ///
    /// # Errors
    ///
    /// Fails when `selectors` is empty or one is not a mapped field selector.
    pub fn filter_any_in<V: Into<Value>>(
        self,
        selectors: &[Expr],
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, CompileError> {
        if selectors.is_empty() {
            return Err(CompileError::unsupported(
                "filter_any_in needs at least one field",
            ));
        }
        let mut parts = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let column = self.compiler().column(selector)?;
            parts.push(format!("{column} IN (@0)"));
        }
        let values = values.into_iter().map(Into::into).collect();
        Ok(self.push(
            format!("({})", parts.join(" OR ")),
            vec![Value::Array(values)],
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // OUTPUT
    // ═══════════════════════════════════════════════════════════════════════

    /// Clauses added so far, in order.
    #[inline]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Assemble `WHERE (c1) AND (c2) ...` with dialect placeholders.
    ///
    /// An empty builder produces empty SQL.
    pub fn build(self) -> QueryResult {
        if self.clauses.is_empty() {
            return QueryResult {
                sql: String::new(),
                params: Vec::new(),
            };
        }

        let mut renumber = Renumber::new(self.ctx.dialect());
        let conditions: Vec<String> = self
            .clauses
            .iter()
            .map(|c| format!("({})", renumber.clause(&c.sql, &c.params)))
            .collect();
        let params = renumber.into_parameters();
        debug!(
            clauses = conditions.len(),
            params = params.len(),
            dialect = self.ctx.dialect().name(),
            "assembled where clause"
        );

        QueryResult {
            sql: format!("WHERE {}", conditions.join(" AND ")),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{SqlServer, Sqlite};
    use crate::mapper::{FieldMap, RowShape};

    fn fields() -> FieldMap {
        FieldMap::new()
            .with("Node", "id", "[n].[id]")
            .with("Node", "alias", "[n].[alias]")
            .with("Node", "trashed", "[n].[trashed]")
            .with("Node", "parent_id", "[n].[parentId]")
            .with("Node", "node_user", "[n].[nodeUser]")
    }

    fn field(name: &str) -> Expr {
        Expr::lambda(["x"], Expr::param("x").field(name))
    }

    #[test]
    fn test_filter_in_strings_lowercases() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let q = Query::for_model(&ctx, "Node", &f)
            .filter_in(&field("alias"), ["Home", "NEWS"])
            .unwrap();
        let clause = &q.clauses()[0];
        assert_eq!(clause.sql(), "lower([n].[alias]) IN (@0)");
        assert_eq!(
            clause.params(),
            &[Value::Array(vec![Value::from("home"), Value::from("news")])]
        );
    }

    #[test]
    fn test_filter_not_in_numbers_keep_column() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let q = Query::for_model(&ctx, "Node", &f)
            .filter_not_in(&field("id"), [1, 2])
            .unwrap();
        assert_eq!(q.clauses()[0].sql(), "[n].[id] NOT IN (@0)");
    }

    #[test]
    fn test_empty_value_set_renders_empty_subquery() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let result = Query::for_model(&ctx, "Node", &f)
            .filter_not_in(&field("id"), Vec::<i64>::new())
            .unwrap()
            .build();
        assert_eq!(result.sql, "WHERE ([n].[id] NOT IN (SELECT 1 WHERE 1 = 0))");
        assert!(result.params.is_empty());
    }

    #[test]
    fn test_filter_any_shifts_placeholders() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let x = Expr::param("x");
        let q = Query::for_model(&ctx, "Node", &f)
            .filter_any(&[
                Expr::lambda(["x"], x.clone().field("id").eq(Expr::constant(1))),
                Expr::lambda(["x"], x.clone().field("parent_id").eq(Expr::constant(2))),
            ])
            .unwrap();
        let clause = &q.clauses()[0];
        assert_eq!(clause.sql(), "((([n].[id] = @0)) OR (([n].[parentId] = @1)))");
        assert_eq!(clause.params(), &[Value::Int(1), Value::Int(2)]);
        assert!(Query::for_model(&ctx, "Node", &f).filter_any(&[]).is_err());
    }

    #[test]
    fn test_null_clauses() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let q = Query::for_model(&ctx, "Node", &f)
            .filter_null(&field("parent_id"))
            .unwrap()
            .filter_not_null(&field("node_user"))
            .unwrap();
        let sql: Vec<&str> = q.clauses().iter().map(Clause::sql).collect();
        assert_eq!(sql, ["([n].[parentId] IS NULL)", "([n].[nodeUser] IS NOT NULL)"]);
    }

    #[test]
    fn test_filter_any_in_shares_values() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let r = Query::for_model(&ctx, "Node", &f)
            .filter_any_in(&[field("id"), field("parent_id")], [3, 4])
            .unwrap()
            .build();
        assert_eq!(r.sql, "WHERE (([n].[id] IN (@0, @1) OR [n].[parentId] IN (@0, @1)))");
        assert_eq!(r.params, vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn test_unmapped_selector_fails() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let err = Query::for_model(&ctx, "Node", &f)
            .filter_null(&field("missing"))
            .unwrap_err();
        assert!(matches!(err, CompileError::MappingNotFound { .. }));
    }

    #[test]
    fn test_filter_cached_skips_empty_cell() {
        let ctx = SqlContext::new(SqlServer);
        let f = fields();
        let q = Query::for_model(&ctx, "Node", &f)
            .filter_cached(&mut CachedExpression::new())
            .unwrap();
        assert!(q.clauses().is_empty());
        assert_eq!(q.build().sql, "");
    }

    #[test]
    fn test_build_drops_spurious_collection_slot() {
        let ctx = SqlContext::new(Sqlite);
        let f = fields();
        let x = Expr::param("x");
        let p = Expr::lambda(
            ["x"],
            Expr::call_static("sql_in", [Expr::captured("ids", vec![5, 6]), x.field("id")]),
        );
        let r = Query::for_model(&ctx, "Node", &f).filter(&p).unwrap().build();
        assert_eq!(r.sql, "WHERE ([n].[id] IN (?1,?2))");
        assert_eq!(r.params, vec![Value::Int(5), Value::Int(6)]);
    }

    #[test]
    fn test_bind_arg() {
        let ctx = SqlContext::new(Sqlite);
        let f = fields();
        let x = Expr::param("x");
        let p = Expr::lambda(
            ["x"],
            x.field("id").eq(Expr::call_static("sql_arg", [Expr::constant("id")])),
        );
        let r = Query::for_model(&ctx, "Node", &f).filter(&p).unwrap().build();
        assert_eq!(r.unbound_args().collect::<Vec<_>>(), ["id"]);
        let r = r.bind_arg("id", 42);
        assert_eq!(r.params, vec![Value::Int(42)]);
        assert_eq!(r.unbound_args().count(), 0);
    }

    #[test]
    fn test_row_query_over_two_shapes() {
        let ctx = SqlContext::new(Sqlite);
        let node = RowShape::new("umbracoNode").column("id", "id");
        let doc = RowShape::new("cmsDocument").column("node_id", "nodeId");
        let p = Expr::lambda(
            ["n", "d"],
            Expr::param("n").field("id").eq(Expr::param("d").field("node_id")),
        );
        let r = Query::for_rows(&ctx, [node.aliased("n"), doc.aliased("d")])
            .filter(&p)
            .unwrap()
            .build();
        assert_eq!(r.sql, r#"WHERE (("n"."id" = "d"."nodeId"))"#);
        assert!(r.params.is_empty());
    }
}
