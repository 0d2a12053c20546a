//! Method call translation.
//!
//! Calls are dispatched on their snake_case name. The receiver is the call
//! target, or the first argument for static calls (`sql_in(ids, x.id)`).

use crate::dialect::TextColumnType;
use crate::error::CompileError;
use crate::expr::{Expr, MethodCall};
use crate::mapper::MemberMapper;
use crate::placeholder::EMPTY_SET;
use crate::value::Value;

use super::Compiler;

/// The string search a comparison method performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Search {
    Wildcard,
    Equals,
    Prefix,
    Suffix,
    Substring,
}

impl Search {
    fn from_method(name: &str) -> Option<Self> {
        Some(match name {
            "sql_wildcard" => Self::Wildcard,
            "equals" | "invariant_equals" | "sql_equals" => Self::Equals,
            "starts_with" | "invariant_starts_with" | "sql_starts_with" => Self::Prefix,
            "ends_with" | "invariant_ends_with" | "sql_ends_with" => Self::Suffix,
            "contains" | "invariant_contains" | "sql_contains" => Self::Substring,
            _ => return None,
        })
    }
}

/// Strip one pair of enclosing `"`, `` ` `` or `'` quotes.
fn strip_quotes(s: &str) -> &str {
    let mut chars = s.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && matches!(first, '"' | '`' | '\'') => {
            chars.as_str()
        },
        (Some(only), None) if matches!(only, '"' | '`' | '\'') => "",
        _ => s,
    }
}

/// Whether an expression is shaped like a collection without evaluating it.
const fn is_literal_collection(expr: &Expr) -> bool {
    matches!(expr, Expr::Array(_) | Expr::Constant(Value::Array(_)))
}

/// Fill `{0}`, `{1}`, `{2}` in a template.
fn render_template(template: &str, parts: &[String]) -> String {
    parts
        .iter()
        .enumerate()
        .fold(template.to_string(), |acc, (i, part)| {
            acc.replace(&format!("{{{i}}}"), part)
        })
}

impl<M: MemberMapper> Compiler<'_, M> {
    pub(super) fn method_call(&mut self, call: &MethodCall) -> Result<String, CompileError> {
        let method = call.method.as_str();

        // static calls that take no receiver
        match method {
            "sql_text" => return self.sql_text(call),
            "sql_arg" => return self.sql_arg(call),
            _ => {},
        }

        let (receiver, args): (&Expr, &[Expr]) = match (&call.target, call.args.split_first()) {
            (Some(target), _) => (&**target, call.args.as_slice()),
            (None, Some((first, rest))) => (first, rest),
            (None, None) => {
                return Err(CompileError::unsupported(format!(
                    "{method}() has no receiver"
                )));
            },
        };

        match method {
            "contains" if self.is_membership(receiver, args) => self.membership(receiver, args),
            "sql_in" => self.membership(receiver, args),
            "to_string" => {
                let slot = self.bind(Value::String(receiver.to_string()));
                Ok(self.emit(format!("@{slot}")))
            },
            "to_uppercase" => {
                let sql = self.compile(receiver)?;
                Ok(self.emit(format!("upper({sql})")))
            },
            "to_lowercase" => {
                let sql = self.compile(receiver)?;
                Ok(self.emit(format!("lower({sql})")))
            },
            "replace" => self.replace(receiver, args),
            "sql_nullable_equals" => self.nullable_equals(receiver, args),
            name => match Search::from_method(name) {
                Some(search) => self.string_comparison(name, receiver, args, search),
                None => Err(CompileError::unsupported(format!(
                    "method '{name}' has no SQL translation"
                ))),
            },
        }
    }

    /// `contains` on a collection with a member argument, as opposed to a
    /// substring search. Strings are never collections.
    fn is_membership(&self, receiver: &Expr, args: &[Expr]) -> bool {
        let [arg] = args else {
            return false;
        };
        if arg.as_bound_member().is_none() {
            return false;
        }
        if is_literal_collection(receiver) {
            return true;
        }
        !receiver.references_parameter()
            && self
                .ctx
                .evaluator()
                .evaluate(receiver)
                .is_ok_and(|value| value.as_array().is_some())
    }

    /// `<column> IN (@i,@i+1,...)`, one parameter per element.
    fn membership(&mut self, receiver: &Expr, args: &[Expr]) -> Result<String, CompileError> {
        let [arg] = args else {
            return Err(CompileError::unsupported(
                "sql_in must contain the member being accessed",
            ));
        };
        let Some(member) = arg.as_bound_member() else {
            return Err(CompileError::unsupported(
                "sql_in must contain the member being accessed",
            ));
        };

        // A captured collection is bound once here as a whole; nothing
        // references that slot and the assembler drops it.
        if !is_literal_collection(receiver) {
            self.compile(receiver)?;
        }
        let column = self.member(arg, member)?;

        let values = match self.ctx.evaluator().evaluate(receiver)? {
            Value::Array(values) => values,
            other => {
                return Err(CompileError::unsupported(format!(
                    "cannot test membership in a {}",
                    other.kind()
                )));
            },
        };
        if values.is_empty() {
            return Ok(self.emit(format!("{column} IN ({EMPTY_SET})")));
        }
        let slots: Vec<String> = values
            .into_iter()
            .map(|v| format!("@{}", self.bind(v)))
            .collect();
        Ok(self.emit(format!("{column} IN ({})", slots.join(","))))
    }

    /// The concrete value of a text argument. Null is rejected, never read
    /// as `""`.
    fn argument_value(&self, method: &str, arg: &Expr) -> Result<Value, CompileError> {
        let value = match arg {
            Expr::Constant(value) => value.clone(),
            other => self.ctx.evaluator().evaluate(other)?,
        };
        if value.is_null() {
            return Err(CompileError::unsupported(format!(
                "{method}() does not accept a null argument"
            )));
        }
        Ok(value)
    }

    fn string_comparison(
        &mut self,
        method: &str,
        receiver: &Expr,
        args: &[Expr],
        search: Search,
    ) -> Result<String, CompileError> {
        let column = self.compile(receiver)?;
        let Some(first) = args.first() else {
            return Err(CompileError::unsupported(
                "string comparison needs a value to compare with",
            ));
        };
        let text = self.argument_value(method, first)?.to_string();
        let text = strip_quotes(&text);

        let ctx = self.ctx;
        let kind = args
            .iter()
            .skip(1)
            .find_map(|a| match a {
                Expr::Constant(v) => TextColumnType::from_value(v),
                _ => None,
            })
            .unwrap_or_else(|| ctx.text_column_type());

        let dialect = ctx.dialect();
        let wildcard = dialect.wildcard_placeholder();
        let pattern = match search {
            Search::Wildcard | Search::Equals => text.to_string(),
            Search::Prefix => format!("{text}{wildcard}"),
            Search::Suffix => format!("{wildcard}{text}"),
            Search::Substring => format!("{wildcard}{text}{wildcard}"),
        };

        let slot = self.bind(Value::String(pattern));
        let sql = if search == Search::Equals {
            dialect.equal_comparison(&column, slot, kind)
        } else {
            dialect.wildcard_comparison(&column, slot, kind)
        };
        Ok(self.emit(sql))
    }

    /// `replace(col, @search, @replacement)`
    fn replace(&mut self, receiver: &Expr, args: &[Expr]) -> Result<String, CompileError> {
        let column = self.compile(receiver)?;
        let [search, replacement] = args else {
            return Err(CompileError::unsupported(
                "replace takes a search and a replacement value",
            ));
        };

        let search = self.replace_argument(search)?;
        let replacement = self.replace_argument(replacement)?;
        let search = self.bind(Value::String(search));
        let replacement = self.bind(Value::String(replacement));
        Ok(self.emit(format!("replace({column}, @{search}, @{replacement})")))
    }

    fn replace_argument(&self, arg: &Expr) -> Result<String, CompileError> {
        match self.argument_value("replace", arg)? {
            Value::Array(_) => Err(CompileError::unsupported(
                "replace does not accept a collection argument",
            )),
            value => Ok(strip_quotes(&value.to_string()).to_string()),
        }
    }

    /// `(COALESCE(a,fb) = COALESCE(b,fb))`
    fn nullable_equals(&mut self, receiver: &Expr, args: &[Expr]) -> Result<String, CompileError> {
        let left = self.compile(receiver)?;
        let [other, fallback] = args else {
            return Err(CompileError::unsupported(
                "sql_nullable_equals takes a value and a fallback",
            ));
        };
        let right = self.compile(other)?;
        let fallback = self.compile(fallback)?;
        Ok(self.emit(format!(
            "(COALESCE({left},{fallback}) = COALESCE({right},{fallback}))"
        )))
    }

    /// `sql_text(a[, b[, c]], "template {0} {1}")`
    fn sql_text(&mut self, call: &MethodCall) -> Result<String, CompileError> {
        let operands: Vec<&Expr> = call.target.as_deref().into_iter().chain(&call.args).collect();
        let Some((template, operands)) = operands.split_last() else {
            return Err(CompileError::unsupported("sql_text needs a template"));
        };
        let Expr::Constant(Value::String(template)) = template else {
            return Err(CompileError::unsupported(
                "sql_text template must be a string constant",
            ));
        };
        if !(1..=3).contains(&operands.len()) {
            return Err(CompileError::unsupported(format!(
                "sql_text takes 1 to 3 operands, found {}",
                operands.len()
            )));
        }

        let mut parts = Vec::with_capacity(operands.len());
        for operand in operands {
            parts.push(self.compile(operand)?);
        }
        Ok(self.emit(render_template(template, &parts)))
    }

    /// `sql_arg("name")`: a placeholder bound later by name.
    fn sql_arg(&mut self, call: &MethodCall) -> Result<String, CompileError> {
        match (&call.target, call.args.as_slice()) {
            (None, [Expr::Constant(Value::String(name))]) => {
                let slot = self.bind(Value::Arg(name.clone()));
                Ok(self.emit(format!("@{slot}")))
            },
            _ => Err(CompileError::unsupported(
                "sql_arg takes exactly one string constant",
            )),
        }
    }
}
