//! The expression compiler: predicate trees to SQL fragments with `@N`
//! placeholders and an ordered parameter list.
//!
//! A [`Compiler`] walks a tree once, depth first and left to right. Every
//! value it meets is appended to its parameter list and rendered as
//! `@<index>`, so the Nth placeholder always names the Nth parameter.
//!
//! When asked to compile a [`CachedExpression`] that was rendered before, the
//! compiler runs in replay mode: it walks the same tree and appends the same
//! parameters in the same order, but produces no text and makes no column
//! lookups. The frozen SQL of the first render is returned instead.
//!
//! ```
//! use expr_sql::{Compiler, Expr, FieldMap, SqlContext, Sqlite, Value};
//!
//! let ctx = SqlContext::new(Sqlite);
//! let fields = FieldMap::new()
//!     .with("Document", "name", "\"doc.name\"")
//!     .with("Document", "is_published", "\"doc.published\"");
//!
//! // |x| x.name == "Test" && x.is_published
//! let x = Expr::param("x");
//! let predicate = Expr::lambda(
//!     ["x"],
//!     x.clone().field("name").eq(Expr::constant("Test")).and(x.field("is_published")),
//! );
//!
//! let mut compiler = Compiler::for_model(&ctx, "Document", &fields);
//! let sql = compiler.compile(&predicate).unwrap();
//! assert_eq!(sql, r#"("doc.name" = @0 AND "doc.published" = @1)"#);
//! assert_eq!(compiler.parameters(), &[Value::from("Test"), Value::Bool(true)]);
//! ```

mod methods;

use tracing::{debug, trace, warn};

use crate::cache::CachedExpression;
use crate::context::SqlContext;
use crate::error::CompileError;
use crate::expr::{Binary, BinaryOp, Expr, Lambda, Member, New, Unary, UnaryOp};
use crate::mapper::{FieldResolver, Mapped, MemberMapper, ModelMapper, RowMapper, RowSource};
use crate::value::Value;

/// Compiles predicate trees for one query clause.
///
/// Single use: create one per clause, read the parameters, drop it. After an
/// error the parameter list is incomplete and must not be used.
#[derive(Debug)]
pub struct Compiler<'a, M> {
    ctx: &'a SqlContext,
    mapper: M,
    params: Vec<Value>,
    replaying: bool,
}

/// Compiler for predicates over a business model.
pub type ModelCompiler<'a> = Compiler<'a, ModelMapper<'a>>;
/// Compiler for predicates over one row shape.
pub type RowCompiler<'a> = Compiler<'a, RowMapper<'a, 1>>;
/// Compiler for predicates over two joined row shapes.
pub type RowCompiler2<'a> = Compiler<'a, RowMapper<'a, 2>>;
/// Compiler for predicates over three joined row shapes.
pub type RowCompiler3<'a> = Compiler<'a, RowMapper<'a, 3>>;

impl<'a> ModelCompiler<'a> {
    /// Compile members of `model`, resolving columns through `resolver`.
    pub fn for_model(ctx: &'a SqlContext, model: &'a str, resolver: &'a dyn FieldResolver) -> Self {
        Self::new(ctx, ModelMapper::new(model, resolver))
    }
}

impl<'a> RowCompiler<'a> {
    /// Compile members of a single row shape.
    pub fn for_row(ctx: &'a SqlContext, source: impl Into<RowSource<'a>>) -> Self {
        Self::new(ctx, RowMapper::new([source.into()]))
    }
}

impl<'a, const N: usize> Compiler<'a, RowMapper<'a, N>> {
    /// Compile members of `N` joined row shapes, the lambda parameters
    /// matching `sources` by position.
    pub fn for_rows(ctx: &'a SqlContext, sources: [RowSource<'a>; N]) -> Self {
        Self::new(ctx, RowMapper::new(sources))
    }
}

impl<'a, M: MemberMapper> Compiler<'a, M> {
    /// A compiler over any mapping strategy.
    pub const fn new(ctx: &'a SqlContext, mapper: M) -> Self {
        Self {
            ctx,
            mapper,
            params: Vec::new(),
            replaying: false,
        }
    }

    /// Parameters appended so far, in placeholder order.
    #[inline]
    pub fn parameters(&self) -> &[Value] {
        &self.params
    }

    /// Take the parameters once compiling is done.
    #[inline]
    pub fn into_parameters(self) -> Vec<Value> {
        self.params
    }

    /// Compile a tree to SQL, appending its parameters.
    ///
    /// # Errors
    ///
    /// Fails on unsupported methods or call shapes, members without a
    /// column mapping, and values that cannot be evaluated.
    pub fn compile(&mut self, expr: &Expr) -> Result<String, CompileError> {
        match expr {
            Expr::Lambda(lambda) => self.lambda(lambda),
            Expr::Member(member) => self.member(expr, member),
            Expr::Constant(Value::Null) => Ok(self.emit("null")),
            Expr::Constant(value) => {
                let slot = self.bind(value.clone());
                Ok(self.emit(format!("@{slot}")))
            },
            Expr::Binary(binary) => self.binary(binary, false),
            Expr::Unary(unary) => self.unary(unary),
            Expr::Parameter(param) => Ok(self.emit(param.name.as_str())),
            Expr::Call(call) => self.method_call(call),
            Expr::New(new) => self.construct(expr, new),
            Expr::Array(items) => {
                let parts = self.list(items)?;
                Ok(self.emit(parts.join(",")))
            },
        }
    }

    /// Compile the tree held by `cell`, rendering it once and replaying it
    /// on every later call.
    ///
    /// An empty cell compiles to an empty string.
    ///
    /// # Errors
    ///
    /// Same as [`compile`](Self::compile).
    pub fn compile_cached(&mut self, cell: &mut CachedExpression) -> Result<String, CompileError> {
        let Some(inner) = cell.inner() else {
            return Ok(String::new());
        };

        let outer = std::mem::replace(&mut self.replaying, cell.is_rendered());
        let result = self.compile(inner);
        self.replaying = outer;
        let sql = result?;

        if let Some(frozen) = cell.sql() {
            debug!(params = self.params.len(), "replayed cached expression");
            return Ok(frozen.to_string());
        }
        debug!(sql = %sql, "froze cached expression");
        cell.freeze(sql.clone())?;
        Ok(sql)
    }

    /// Resolve a field selector (`|x| x.member`) to its column reference
    /// without appending parameters.
    ///
    /// # Errors
    ///
    /// Fails if the selector is not a member access or has no column.
    pub fn column(&mut self, selector: &Expr) -> Result<String, CompileError> {
        let body = match selector {
            Expr::Lambda(lambda) => {
                self.mapper.on_lambda(lambda)?;
                &*lambda.body
            },
            other => other,
        };
        let body = strip_convert(body);
        let Expr::Member(member) = body else {
            return Err(CompileError::unsupported(format!(
                "'{body}' is not a field selector"
            )));
        };
        match self.mapper.map_member(member, self.ctx.dialect(), false)? {
            Mapped::Column(column) => Ok(column),
            Mapped::Value => Err(CompileError::unsupported(format!(
                "'{body}' does not select a column"
            ))),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Append a parameter, returning its slot.
    fn bind(&mut self, value: Value) -> usize {
        let slot = self.params.len();
        trace!(slot, ?value, "bind parameter");
        self.params.push(value);
        slot
    }

    /// SQL text, suppressed while replaying.
    fn emit(&self, sql: impl Into<String>) -> String {
        if self.replaying {
            String::new()
        } else {
            sql.into()
        }
    }

    /// `<column> = @N` with `flag` bound.
    fn flag_test(&mut self, column: &str, flag: bool) -> String {
        let slot = self.bind(Value::Bool(flag));
        self.emit(format!("{column} = @{slot}"))
    }

    /// Compile each item, flattening nested array literals.
    fn list(&mut self, items: &[Expr]) -> Result<Vec<String>, CompileError> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Array(nested) => parts.extend(self.list(nested)?),
                other => parts.push(self.compile(other)?),
            }
        }
        Ok(parts)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // NODE HANDLERS
    // ═══════════════════════════════════════════════════════════════════════

    fn lambda(&mut self, lambda: &Lambda) -> Result<String, CompileError> {
        self.mapper.on_lambda(lambda)?;
        // |x| x.is_trashed
        if let Some(member) = lambda.body.as_bound_member() {
            let column = self.member(&lambda.body, member)?;
            return Ok(self.flag_test(&column, true));
        }
        self.compile(&lambda.body)
    }

    fn member(&mut self, expr: &Expr, member: &Member) -> Result<String, CompileError> {
        match self
            .mapper
            .map_member(member, self.ctx.dialect(), self.replaying)?
        {
            Mapped::Column(column) => Ok(column),
            Mapped::Value => {
                let value = self.ctx.evaluator().evaluate(expr)?;
                let slot = self.bind(value);
                Ok(self.emit(format!("@{slot}")))
            },
        }
    }

    fn binary(&mut self, b: &Binary, bare: bool) -> Result<String, CompileError> {
        match b.op {
            BinaryOp::AndAlso | BinaryOp::OrElse | BinaryOp::And | BinaryOp::Or => {
                let left = self.logical_operand(&b.left)?;
                let right = self.logical_operand(&b.right)?;
                let keyword = if matches!(b.op, BinaryOp::AndAlso | BinaryOp::And) {
                    "AND"
                } else {
                    "OR"
                };
                Ok(self.emit(format!("({left} {keyword} {right})")))
            },
            BinaryOp::Equal | BinaryOp::NotEqual => self.equality(b, bare),
            BinaryOp::Modulo | BinaryOp::Coalesce => {
                let left = self.compile(&b.left)?;
                let right = self.compile(&b.right)?;
                let function = if b.op == BinaryOp::Modulo { "MOD" } else { "COALESCE" };
                Ok(self.emit(format!("{function}({left},{right})")))
            },
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let left = self.compile(&b.left)?;
                let right = self.compile(&b.right)?;
                let op = b.op.symbol();
                Ok(self.emit(if bare {
                    format!("{left} {op} {right}")
                } else {
                    format!("({left} {op} {right})")
                }))
            },
            BinaryOp::ExclusiveOr
            | BinaryOp::LeftShift
            | BinaryOp::RightShift
            | BinaryOp::ArrayIndex => {
                warn!(operator = ?b.op, "operator has no SQL form, rendering its name");
                let left = self.compile(&b.left)?;
                let right = self.compile(&b.right)?;
                Ok(self.emit(format!("({left} {:?} {right})", b.op)))
            },
        }
    }

    /// An operand of `AND` / `OR`.
    fn logical_operand(&mut self, operand: &Expr) -> Result<String, CompileError> {
        match operand {
            Expr::Member(member) if member.target.is_some() => {
                let column = self.member(operand, member)?;
                Ok(self.flag_test(&column, true))
            },
            // comparisons bind tighter than AND / OR
            Expr::Binary(inner) if inner.op.is_comparison() => self.binary(inner, true),
            other => self.compile(other),
        }
    }

    fn equality(&mut self, b: &Binary, bare: bool) -> Result<String, CompileError> {
        let equal = b.op == BinaryOp::Equal;

        // x == true, x != false, true == x ...
        if let Some(flag) = b.right.as_bool_constant() {
            return if flag == equal {
                self.truthy(&b.left)
            } else {
                self.not(&b.left)
            };
        }
        if let Some(flag) = b.left.as_bool_constant() {
            return if flag == equal {
                self.truthy(&b.right)
            } else {
                self.not(&b.right)
            };
        }

        let left = self.compile(&b.left)?;
        let right = self.compile(&b.right)?;
        let op = match (equal, right == "null") {
            (true, true) => "IS",
            (false, true) => "IS NOT",
            (true, false) => "=",
            (false, false) => "<>",
        };
        Ok(self.emit(if bare {
            format!("{left} {op} {right}")
        } else {
            format!("({left} {op} {right})")
        }))
    }

    fn unary(&mut self, u: &Unary) -> Result<String, CompileError> {
        match u.op {
            UnaryOp::Not => self.not(&u.operand),
            UnaryOp::Negate => {
                let operand = self.compile(&u.operand)?;
                Ok(self.emit(format!("-({operand})")))
            },
            UnaryOp::Convert | UnaryOp::Quote | UnaryOp::TypeAs | UnaryOp::ArrayLength => {
                self.compile(&u.operand)
            },
        }
    }

    /// Negation: a member becomes `<column> = @N` with `false`, anything
    /// else `NOT (...)`.
    fn not(&mut self, operand: &Expr) -> Result<String, CompileError> {
        let sql = self.compile(operand)?;
        if matches!(operand, Expr::Member(_)) {
            return Ok(self.flag_test(&sql, false));
        }
        Ok(self.emit(format!("NOT ({sql})")))
    }

    /// The positive counterpart of [`not`](Self::not).
    fn truthy(&mut self, operand: &Expr) -> Result<String, CompileError> {
        let sql = self.compile(operand)?;
        if matches!(operand, Expr::Member(_)) {
            return Ok(self.flag_test(&sql, true));
        }
        Ok(sql)
    }

    fn construct(&mut self, expr: &Expr, new: &New) -> Result<String, CompileError> {
        match self.ctx.evaluator().evaluate(expr) {
            Ok(value) => {
                let slot = self.bind(value);
                Ok(self.emit(format!("@{slot}")))
            },
            Err(error) => {
                debug!(type_name = %new.type_name, %error, "constructor not evaluable, rendering arguments");
                let parts = self.list(&new.args)?;
                Ok(self.emit(parts.join(",")))
            },
        }
    }
}

fn strip_convert(expr: &Expr) -> &Expr {
    match expr {
        Expr::Unary(Unary {
            op: UnaryOp::Convert,
            operand,
        }) => strip_convert(operand),
        other => other,
    }
}
