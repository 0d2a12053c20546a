//! Compile-time evaluation of parameter-free sub-expressions.
//!
//! The compiler never guesses values: whenever it needs a concrete value
//! (a captured variable, a constructor, the collection of an `IN` test) it
//! asks an [`Evaluate`] implementation. [`Interpreter`] is the default.

use std::collections::HashMap;
use std::fmt;

use crate::error::EvalError;
use crate::expr::{Binary, BinaryOp, Expr, MethodCall, New, UnaryOp};
use crate::value::Value;

/// Produces the runtime value of an expression that does not read any
/// lambda parameter.
pub trait Evaluate: fmt::Debug + Send + Sync {
    /// The value of `expr`.
    ///
    /// # Errors
    ///
    /// Fails if `expr` reads a lambda parameter or contains a node this
    /// evaluator cannot compute.
    fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError>;
}

type Constructor = Box<dyn Fn(&[Value]) -> Option<Value> + Send + Sync>;

/// Tree-walking evaluator for constants, captured records, arithmetic,
/// comparisons and a handful of string methods.
///
/// Constructors are unknown unless registered with
/// [`with_constructor`](Self::with_constructor); an unknown `New` node fails
/// with [`EvalError::NotEvaluable`] so the compiler can fall back to
/// rendering its arguments.
#[derive(Default)]
pub struct Interpreter {
    constructors: HashMap<String, Constructor>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("Interpreter")
            .field("constructors", &names)
            .finish()
    }
}

impl Interpreter {
    /// An interpreter with no registered constructors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how to build a value of `type_name` from evaluated arguments.
    #[must_use]
    pub fn with_constructor<F>(mut self, type_name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.constructors.insert(type_name.into(), Box::new(ctor));
        self
    }

    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Constant(v) => Ok(v.clone()),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Parameter(p) => Err(EvalError::Unbound(p.name.clone())),
            Expr::Lambda(_) => Err(EvalError::NotEvaluable(expr.to_string())),
            Expr::Member(m) => {
                let Some(target) = &m.target else {
                    return Err(EvalError::NotEvaluable(m.name.clone()));
                };
                match self.eval(target)? {
                    Value::Record(mut fields) => {
                        fields.remove(&m.name).ok_or_else(|| EvalError::MissingMember {
                            member: m.name.clone(),
                        })
                    },
                    other => Err(EvalError::TypeMismatch(format!(
                        "cannot read '{}' from {}",
                        m.name,
                        other.kind()
                    ))),
                }
            },
            Expr::Binary(b) => self.binary(b),
            Expr::Unary(u) => {
                let v = self.eval(&u.operand)?;
                match (u.op, v) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Negate, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| EvalError::TypeMismatch("integer overflow".into())),
                    (UnaryOp::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
                    (UnaryOp::ArrayLength, Value::Array(items)) => len_value(items.len()),
                    (UnaryOp::Convert | UnaryOp::Quote | UnaryOp::TypeAs, v) => Ok(v),
                    (op, v) => Err(EvalError::TypeMismatch(format!(
                        "{op:?} on {}",
                        v.kind()
                    ))),
                }
            },
            Expr::Call(c) => self.call(c),
            Expr::New(n) => self.construct(n),
        }
    }

    fn binary(&self, b: &Binary) -> Result<Value, EvalError> {
        let left = self.eval(&b.left)?;
        // short-circuit forms only look at the right side when needed
        match b.op {
            BinaryOp::AndAlso if left == Value::Bool(false) => return Ok(left),
            BinaryOp::OrElse if left == Value::Bool(true) => return Ok(left),
            BinaryOp::Coalesce if !left.is_null() => return Ok(left),
            _ => {},
        }
        let right = self.eval(&b.right)?;

        let mismatch = |l: &Value, r: &Value| {
            EvalError::TypeMismatch(format!("{} {} {}", l.kind(), b.op.symbol(), r.kind()))
        };

        match b.op {
            BinaryOp::Equal => Ok(Value::Bool(left == right)),
            BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
            BinaryOp::Coalesce => Ok(right),
            BinaryOp::AndAlso | BinaryOp::OrElse | BinaryOp::And | BinaryOp::Or => {
                let conjunction = matches!(b.op, BinaryOp::AndAlso | BinaryOp::And);
                match (&left, &right) {
                    (Value::Bool(l), Value::Bool(r)) if conjunction => Ok(Value::Bool(*l && *r)),
                    (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(*l || *r)),
                    (Value::Int(l), Value::Int(r)) if b.op == BinaryOp::And => Ok(Value::Int(l & r)),
                    (Value::Int(l), Value::Int(r)) if b.op == BinaryOp::Or => Ok(Value::Int(l | r)),
                    _ => Err(mismatch(&left, &right)),
                }
            },
            BinaryOp::Add => match (&left, &right) {
                (Value::String(l), r) => Ok(Value::String(format!("{l}{r}"))),
                (l, Value::String(r)) => Ok(Value::String(format!("{l}{r}"))),
                _ => arithmetic(b.op, &left, &right).ok_or_else(|| mismatch(&left, &right)),
            },
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                arithmetic(b.op, &left, &right).ok_or_else(|| mismatch(&left, &right))
            },
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let ord = compare(&left, &right).ok_or_else(|| mismatch(&left, &right))?;
                Ok(Value::Bool(match b.op {
                    BinaryOp::LessThan => ord.is_lt(),
                    BinaryOp::LessThanOrEqual => ord.is_le(),
                    BinaryOp::GreaterThan => ord.is_gt(),
                    _ => ord.is_ge(),
                }))
            },
            BinaryOp::ArrayIndex => match (&left, &right) {
                (Value::Array(items), Value::Int(i)) => usize::try_from(*i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| EvalError::TypeMismatch(format!("index {i} out of range"))),
                _ => Err(mismatch(&left, &right)),
            },
            BinaryOp::ExclusiveOr | BinaryOp::LeftShift | BinaryOp::RightShift => {
                Err(EvalError::NotEvaluable(b.op.symbol().to_string()))
            },
        }
    }

    fn call(&self, c: &MethodCall) -> Result<Value, EvalError> {
        let Some(target) = &c.target else {
            return Err(EvalError::NotEvaluable(format!("{}()", c.method)));
        };
        let receiver = self.eval(target)?;
        match (c.method.as_str(), &receiver) {
            ("to_string", v) => Ok(Value::String(v.to_string())),
            ("to_uppercase", Value::String(s)) => Ok(Value::String(s.to_uppercase())),
            ("to_lowercase", Value::String(s)) => Ok(Value::String(s.to_lowercase())),
            ("trim", Value::String(s)) => Ok(Value::String(s.trim().to_string())),
            ("len", Value::String(s)) => len_value(s.chars().count()),
            ("len", Value::Array(items)) => len_value(items.len()),
            ("clone" | "to_owned" | "into", v) => Ok(v.clone()),
            (method, v) => Err(EvalError::NotEvaluable(format!("{}.{method}()", v.kind()))),
        }
    }

    fn construct(&self, n: &New) -> Result<Value, EvalError> {
        let ctor = self
            .constructors
            .get(&n.type_name)
            .ok_or_else(|| EvalError::NotEvaluable(format!("{}::new", n.type_name)))?;
        let args = n
            .args
            .iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;
        ctor(&args).ok_or_else(|| EvalError::NotEvaluable(format!("{}::new", n.type_name)))
    }
}

impl Evaluate for Interpreter {
    fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        if expr.references_parameter() {
            return Err(EvalError::Unbound(expr.to_string()));
        }
        self.eval(expr)
    }
}

fn len_value(len: usize) -> Result<Value, EvalError> {
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| EvalError::TypeMismatch("length overflow".into()))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    if let (Value::Int(l), Value::Int(r)) = (left, right) {
        let v = match op {
            BinaryOp::Add => l.checked_add(*r),
            BinaryOp::Subtract => l.checked_sub(*r),
            BinaryOp::Multiply => l.checked_mul(*r),
            BinaryOp::Divide => l.checked_div(*r),
            BinaryOp::Modulo => l.checked_rem(*r),
            _ => None,
        };
        return v.map(Value::Int);
    }
    let (l, r) = (as_f64(left)?, as_f64(right)?);
    let v = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Subtract => l - r,
        BinaryOp::Multiply => l * r,
        BinaryOp::Divide => l / r,
        BinaryOp::Modulo => l % r,
        _ => return None,
    };
    Some(Value::Float(v))
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        _ => as_f64(left)?.partial_cmp(&as_f64(right)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_member_is_read_from_record() {
        let e = Expr::captured("path", "-1,20");
        assert_eq!(Interpreter::new().evaluate(&e), Ok(Value::from("-1,20")));
    }

    #[test]
    fn test_parameter_is_unbound() {
        let e = Expr::param("x").field("id");
        assert_eq!(
            Interpreter::new().evaluate(&e),
            Err(EvalError::Unbound("x.id".into()))
        );
    }

    #[test]
    fn test_arithmetic_and_concat() {
        let i = Interpreter::new();
        let sum = Expr::binary(BinaryOp::Add, Expr::constant(40), Expr::constant(2));
        assert_eq!(i.evaluate(&sum), Ok(Value::Int(42)));

        let concat = Expr::binary(BinaryOp::Add, Expr::constant("-1,"), Expr::constant(20));
        assert_eq!(i.evaluate(&concat), Ok(Value::from("-1,20")));

        let div0 = Expr::binary(BinaryOp::Divide, Expr::constant(1), Expr::constant(0));
        assert!(matches!(i.evaluate(&div0), Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_comparison_and_short_circuit() {
        let i = Interpreter::new();
        let lt = Expr::constant(1).lt(Expr::constant(2.5));
        assert_eq!(i.evaluate(&lt), Ok(Value::Bool(true)));

        // right side would fail, but is never evaluated
        let and = Expr::constant(false).and(Expr::static_member("Now"));
        assert_eq!(i.evaluate(&and), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_unknown_constructor_is_not_evaluable() {
        let e = Expr::new_object("Guid", [Expr::constant("abc")]);
        assert!(matches!(
            Interpreter::new().evaluate(&e),
            Err(EvalError::NotEvaluable(_))
        ));
    }

    #[test]
    fn test_registered_constructor() {
        let i = Interpreter::new().with_constructor("Range", |args| {
            Some(Value::String(format!("{}..{}", args.first()?, args.get(1)?)))
        });
        let e = Expr::new_object("Range", [Expr::constant(1), Expr::constant(5)]);
        assert_eq!(i.evaluate(&e), Ok(Value::from("1..5")));
    }

    #[test]
    fn test_string_methods() {
        let i = Interpreter::new();
        let e = Expr::captured("alias", "Home").invoke("to_lowercase", []);
        assert_eq!(i.evaluate(&e), Ok(Value::from("home")));
        let e = Expr::captured("ids", vec![1, 2, 3]).invoke("len", []);
        assert_eq!(i.evaluate(&e), Ok(Value::Int(3)));
    }
}
