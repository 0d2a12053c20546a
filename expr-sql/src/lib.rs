//! # expr-sql
//!
//! Compile typed predicate expressions into parameterized SQL `WHERE`
//! clauses.
//!
//! A predicate such as `|x| x.name == "Test" && x.is_published` is described
//! by an [`Expr`] tree, either built by hand or with the [`predicate!`]
//! macro. A [`Compiler`] walks the tree once and produces a SQL fragment with
//! `@N` placeholders plus the ordered parameter list those placeholders
//! index. Column names come from a [`MemberMapper`]: a [`ModelMapper`] over a
//! [`FieldResolver`], or a [`RowMapper`] over one to three [`RowShape`]s.
//!
//! ```
//! use expr_sql::{predicate, FieldMap, Query, SqlContext, Sqlite, Value};
//!
//! let ctx = SqlContext::new(Sqlite);
//! let fields = FieldMap::new()
//!     .with("Document", "name", "\"doc\".\"name\"")
//!     .with("Document", "is_published", "\"doc\".\"published\"");
//!
//! let result = Query::for_model(&ctx, "Document", &fields)
//!     .filter(&predicate!(|x| x.name == "Test" && x.is_published))?
//!     .build();
//!
//! assert_eq!(result.sql, r#"WHERE (("doc"."name" = ?1 AND "doc"."published" = ?2))"#);
//! assert_eq!(result.params, vec![Value::from("Test"), Value::Bool(true)]);
//! # Ok::<(), expr_sql::CompileError>(())
//! ```
//!
//! ## Caching
//!
//! A clause compiled many times with different captured values can be held
//! in a [`CachedExpression`]: the first compilation freezes the SQL text,
//! later ones only re-bind the parameters in the same order.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`Expr`] | predicate trees |
//! | [`Compiler`] | tree to SQL fragment and parameters |
//! | [`Query`] | clause accumulation and `WHERE` assembly |
//! | [`Dialect`] | `SQLite`, Postgres and SQL Server syntax |
//! | [`Config`] | TOML configuration of dialect and mappings |

mod cache;
mod compiler;
mod config;
mod context;
mod dialect;
mod error;
mod eval;
mod expr;
mod mapper;
mod placeholder;
mod query;
mod validate;
mod value;

pub use cache::{CachedExpression, ExpressionCache};
pub use compiler::{Compiler, ModelCompiler, RowCompiler, RowCompiler2, RowCompiler3};
pub use config::{ColumnEntry, Config};
pub use context::SqlContext;
pub use dialect::{Dialect, Postgres, SqlServer, Sqlite, TextColumnType};
pub use error::{CompileError, ConfigError, EvalError};
pub use eval::{Evaluate, Interpreter};
pub use expr::{Binary, BinaryOp, Expr, Lambda, Member, MethodCall, New, Parameter, Unary, UnaryOp};
pub use mapper::{FieldMap, FieldResolver, Mapped, MemberMapper, ModelMapper, RowMapper, RowShape, RowSource};
pub use query::{Clause, ModelQuery, Query, QueryResult, RowQuery, RowQuery2, RowQuery3};
pub use validate::{assert_valid_sql_identifier, is_valid_sql_identifier};
pub use value::Value;

pub use expr_sql_macros::predicate;
