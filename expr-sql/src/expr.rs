//! Predicate expression trees.
//!
//! An [`Expr`] is the typed, immutable description of a boolean filter before
//! it is turned into SQL. Trees are normally produced by the
//! [`predicate!`](crate::predicate) macro, but every node can also be built by
//! hand:
//!
//! ```
//! use expr_sql::Expr;
//!
//! // |x| x.name == "Test" && x.is_published
//! let x = Expr::param("x");
//! let tree = Expr::lambda(
//!     ["x"],
//!     x.clone().field("name").eq(Expr::constant("Test")).and(x.field("is_published")),
//! );
//! assert_eq!(tree.to_string(), r#"|x| ((x.name == "Test") && x.is_published)"#);
//! ```

use std::fmt;

use crate::value::Value;

/// A node of a predicate expression tree.
///
/// The set of kinds is closed: the compiler matches on it exhaustively, so a
/// new kind cannot be added without deciding how it compiles.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `|params| body`
    Lambda(Lambda),
    /// `target.name`, or a static member when there is no target.
    Member(Member),
    /// A literal or captured value.
    Constant(Value),
    /// `left op right`
    Binary(Binary),
    /// `op operand`
    Unary(Unary),
    /// A lambda parameter reference.
    Parameter(Parameter),
    /// `target.method(args)`, or `method(args)` for static calls.
    Call(MethodCall),
    /// Construction of a value from arguments.
    New(New),
    /// An array literal.
    Array(Vec<Expr>),
}

/// A lambda with its declared parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    /// Declared parameters, in order.
    pub params: Vec<Parameter>,
    /// The predicate itself.
    pub body: Box<Expr>,
}

/// A lambda parameter, identified by its declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Name as written in the lambda head.
    pub name: String,
}

/// Member access.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Receiver of the access; `None` for a static member.
    pub target: Option<Box<Expr>>,
    /// Field or property name.
    pub name: String,
}

/// Binary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    /// The operator.
    pub op: BinaryOp,
    /// Left operand.
    pub left: Box<Expr>,
    /// Right operand.
    pub right: Box<Expr>,
}

/// Unary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    /// The operator.
    pub op: UnaryOp,
    /// The single operand.
    pub operand: Box<Expr>,
}

/// Method call.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// Receiver of the call; `None` for static (extension-style) calls whose
    /// receiver is the first argument.
    pub target: Option<Box<Expr>>,
    /// Method name in snake_case; dispatch is on this name.
    pub method: String,
    /// Arguments after the receiver.
    pub args: Vec<Expr>,
}

/// Constructor call.
#[derive(Debug, Clone, PartialEq)]
pub struct New {
    /// Name the evaluator looks the constructor up by.
    pub type_name: String,
    /// Constructor arguments.
    pub args: Vec<Expr>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`, rendered as `MOD(l,r)`
    Modulo,
    /// Bitwise and: `&`
    And,
    /// Bitwise or: `|`
    Or,
    /// Logical and: `&&`
    AndAlso,
    /// Logical or: `||`
    OrElse,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `left ?? right`
    Coalesce,
    /// `^`; no SQL form.
    ExclusiveOr,
    /// `<<`; no SQL form.
    LeftShift,
    /// `>>`; no SQL form.
    RightShift,
    /// `a[i]`; no SQL form.
    ArrayIndex,
}

impl BinaryOp {
    /// Source-level spelling, used by [`Expr`]'s `Display`.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::AndAlso => "&&",
            Self::OrElse => "||",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Coalesce => "??",
            Self::ExclusiveOr => "^",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::ArrayIndex => "[]",
        }
    }

    /// Relational operators, which bind tighter than `AND` / `OR` in SQL.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
                | Self::Equal
                | Self::NotEqual
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical not: `!`
    Not,
    /// Arithmetic negation: `-`
    Negate,
    /// Type conversion (`x as T`); transparent for SQL purposes.
    Convert,
    /// A quoted nested lambda; compiles to its operand.
    Quote,
    /// Checked conversion; compiles to its operand.
    TypeAs,
    /// Length of an array; compiles to its operand.
    ArrayLength,
}

impl Expr {
    /// `|params| body`
    pub fn lambda<S: Into<String>>(params: impl IntoIterator<Item = S>, body: Self) -> Self {
        Self::Lambda(Lambda {
            params: params
                .into_iter()
                .map(|name| Parameter { name: name.into() })
                .collect(),
            body: Box::new(body),
        })
    }

    /// Reference to the lambda parameter `name`.
    pub fn param(name: impl Into<String>) -> Self {
        Self::Parameter(Parameter { name: name.into() })
    }

    /// `target.name`
    pub fn member(target: Self, name: impl Into<String>) -> Self {
        Self::Member(Member {
            target: Some(Box::new(target)),
            name: name.into(),
        })
    }

    /// A static member (no receiver).
    pub fn static_member(name: impl Into<String>) -> Self {
        Self::Member(Member {
            target: None,
            name: name.into(),
        })
    }

    /// `self.name`
    #[must_use]
    pub fn field(self, name: impl Into<String>) -> Self {
        Self::member(self, name)
    }

    /// A literal value.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// The `null` literal.
    pub const fn null() -> Self {
        Self::Constant(Value::Null)
    }

    /// A variable captured from the surrounding scope.
    ///
    /// Shaped like a closure capture: a member read on a constant record, so
    /// the evaluator resolves it and the compiler binds it as a parameter.
    pub fn captured(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        Self::member(
            Self::Constant(Value::record([(name.clone(), value.into())])),
            name,
        )
    }

    /// `left op right`
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary(Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `op operand`
    pub fn unary(op: UnaryOp, operand: Self) -> Self {
        Self::Unary(Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `operand as T`
    pub fn convert(operand: Self) -> Self {
        Self::unary(UnaryOp::Convert, operand)
    }

    /// `target.method(args)`
    pub fn call(target: Self, method: impl Into<String>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::Call(MethodCall {
            target: Some(Box::new(target)),
            method: method.into(),
            args: args.into_iter().collect(),
        })
    }

    /// `method(args)` where the first argument acts as the receiver.
    pub fn call_static(method: impl Into<String>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::Call(MethodCall {
            target: None,
            method: method.into(),
            args: args.into_iter().collect(),
        })
    }

    /// `self.method(args)`
    #[must_use]
    pub fn invoke(self, method: impl Into<String>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::call(self, method, args)
    }

    /// `TypeName(args)`; evaluated through a registered constructor.
    pub fn new_object(type_name: impl Into<String>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::New(New {
            type_name: type_name.into(),
            args: args.into_iter().collect(),
        })
    }

    /// `[items]`
    pub fn array(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Array(items.into_iter().collect())
    }

    #[must_use]
    pub fn eq(self, other: Self) -> Self {
        Self::binary(BinaryOp::Equal, self, other)
    }

    #[must_use]
    pub fn ne(self, other: Self) -> Self {
        Self::binary(BinaryOp::NotEqual, self, other)
    }

    #[must_use]
    pub fn lt(self, other: Self) -> Self {
        Self::binary(BinaryOp::LessThan, self, other)
    }

    #[must_use]
    pub fn le(self, other: Self) -> Self {
        Self::binary(BinaryOp::LessThanOrEqual, self, other)
    }

    #[must_use]
    pub fn gt(self, other: Self) -> Self {
        Self::binary(BinaryOp::GreaterThan, self, other)
    }

    #[must_use]
    pub fn ge(self, other: Self) -> Self {
        Self::binary(BinaryOp::GreaterThanOrEqual, self, other)
    }

    /// `self && other`
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::binary(BinaryOp::AndAlso, self, other)
    }

    /// `self || other`
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::binary(BinaryOp::OrElse, self, other)
    }

    /// Member access with a receiver: the shape that denotes a column (or a
    /// captured value) rather than a computed expression.
    pub fn as_bound_member(&self) -> Option<&Member> {
        match self {
            Self::Member(m) if m.target.is_some() => Some(m),
            _ => None,
        }
    }

    /// The value of a boolean constant.
    pub const fn as_bool_constant(&self) -> Option<bool> {
        match self {
            Self::Constant(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Whether any node below (or at) `self` reads a lambda parameter.
    pub fn references_parameter(&self) -> bool {
        match self {
            Self::Parameter(_) => true,
            Self::Constant(_) => false,
            Self::Lambda(l) => l.body.references_parameter(),
            Self::Member(m) => m.target.as_ref().is_some_and(|t| t.references_parameter()),
            Self::Binary(b) => b.left.references_parameter() || b.right.references_parameter(),
            Self::Unary(u) => u.operand.references_parameter(),
            Self::Call(c) => {
                c.target.as_ref().is_some_and(|t| t.references_parameter())
                    || c.args.iter().any(Self::references_parameter)
            },
            Self::New(n) => n.args.iter().any(Self::references_parameter),
            Self::Array(items) => items.iter().any(Self::references_parameter),
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        Self::unary(UnaryOp::Not, self)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Source-like rendering of the tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lambda(l) => {
                f.write_str("|")?;
                for (i, p) in l.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&p.name)?;
                }
                write!(f, "| {}", l.body)
            },
            Self::Member(m) => match &m.target {
                Some(t) => write!(f, "{t}.{}", m.name),
                None => f.write_str(&m.name),
            },
            Self::Constant(v) => match v {
                Value::Null => f.write_str("null"),
                Value::String(s) => write!(f, "{s:?}"),
                other => write!(f, "{other}"),
            },
            Self::Binary(b) => match b.op {
                BinaryOp::ArrayIndex => write!(f, "{}[{}]", b.left, b.right),
                op => write!(f, "({} {} {})", b.left, op.symbol(), b.right),
            },
            Self::Unary(u) => match u.op {
                UnaryOp::Not => write!(f, "!{}", u.operand),
                UnaryOp::Negate => write!(f, "-{}", u.operand),
                UnaryOp::ArrayLength => write!(f, "{}.len()", u.operand),
                UnaryOp::Convert | UnaryOp::TypeAs => write!(f, "({} as _)", u.operand),
                UnaryOp::Quote => write!(f, "{}", u.operand),
            },
            Self::Parameter(p) => f.write_str(&p.name),
            Self::Call(c) => {
                if let Some(t) = &c.target {
                    write!(f, "{t}.")?;
                }
                write!(f, "{}(", c.method)?;
                write_list(f, &c.args)?;
                f.write_str(")")
            },
            Self::New(n) => {
                write!(f, "{}::new(", n.type_name)?;
                write_list(f, &n.args)?;
                f.write_str(")")
            },
            Self::Array(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            },
        }
    }
}
