//! `predicate!` lowering: closure syntax to `Expr` builder calls.

use std::collections::HashSet;

use proc_macro2::{TokenStream, TokenTree};
use quote::{ToTokens, quote};
use syn::{BinOp, Expr, ExprClosure, Pat, Result, UnOp, spanned::Spanned};

use crate::errors::{KNOWN_METHODS, unknown_method, unsupported};

// ============================================================================
// PREDICATE! MACRO - Closure to expression tree
// ============================================================================

/// Expand `predicate!(|x| ...)` into an `::expr_sql::Expr` lambda.
pub fn predicate_impl(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let closure = syn::parse_macro_input!(input as ExprClosure);
    let tokens = expand(&closure).unwrap_or_else(syn::Error::into_compile_error);

    #[cfg(feature = "debug-expand")]
    debug_print(&tokens);

    tokens.into()
}

fn expand(closure: &ExprClosure) -> Result<TokenStream> {
    let names = closure
        .inputs
        .iter()
        .map(param_name)
        .collect::<Result<Vec<_>>>()?;
    let lower = Lower {
        params: names.iter().cloned().collect(),
    };
    let body = lower.expr(&closure.body)?;
    let arity = names.len();

    Ok(quote! {
        {
            let __params: [&str; #arity] = [#(#names),*];
            ::expr_sql::Expr::lambda(__params, #body)
        }
    })
}

fn param_name(pat: &Pat) -> Result<String> {
    match pat {
        Pat::Ident(p) => Ok(p.ident.to_string()),
        Pat::Type(t) => param_name(&t.pat),
        Pat::Reference(r) => param_name(&r.pat),
        other => Err(unsupported(
            other.span(),
            "closure parameter",
            "predicate!(|x| x.id == 1) or predicate!(|x: &Document| x.id == 1)",
        )),
    }
}

#[cfg(feature = "debug-expand")]
fn debug_print(tokens: &TokenStream) {
    let wrapped = quote!(fn __predicate() -> ::expr_sql::Expr { #tokens });
    match syn::parse2::<syn::File>(wrapped) {
        Ok(file) => eprintln!("predicate! expansion:\n{}", prettyplease::unparse(&file)),
        Err(_) => eprintln!("predicate! expansion:\n{tokens}"),
    }
}

/// `Vec<Expr>` from lowered items; spelled out so an empty list infers.
fn expr_vec(items: &[TokenStream]) -> TokenStream {
    quote!(::std::vec::Vec::<::expr_sql::Expr>::from([#(#items),*]))
}

fn binary(op: &str, left: &TokenStream, right: &TokenStream) -> TokenStream {
    let op = syn::Ident::new(op, proc_macro2::Span::call_site());
    quote!(::expr_sql::Expr::binary(::expr_sql::BinaryOp::#op, #left, #right))
}

fn unary(op: &str, operand: &TokenStream) -> TokenStream {
    let op = syn::Ident::new(op, proc_macro2::Span::call_site());
    quote!(::expr_sql::Expr::unary(::expr_sql::UnaryOp::#op, #operand))
}

/// `None` written as a value.
fn is_none(expr: &Expr) -> bool {
    matches!(expr, Expr::Path(p) if p.qself.is_none() && p.path.is_ident("None"))
}

/// `sql_*(...)` marker calls stay in the tree even without parameters.
fn is_marker_call(expr: &Expr) -> bool {
    let Expr::Call(call) = expr else {
        return false;
    };
    let Expr::Path(func) = &*call.func else {
        return false;
    };
    func.path
        .segments
        .last()
        .is_some_and(|s| s.ident.to_string().starts_with("sql_"))
}

struct Lower {
    params: HashSet<String>,
}

impl Lower {
    fn expr(&self, expr: &Expr) -> Result<TokenStream> {
        match expr {
            Expr::Paren(p) => return self.expr(&p.expr),
            Expr::Group(g) => return self.expr(&g.expr),
            Expr::Reference(r) => return self.expr(&r.expr),
            Expr::Lit(l) => {
                let lit = &l.lit;
                return Ok(quote!(::expr_sql::Expr::constant(#lit)));
            },
            Expr::Array(a) => {
                let items = a
                    .elems
                    .iter()
                    .map(|e| self.expr(e))
                    .collect::<Result<Vec<_>>>()?;
                let items = expr_vec(&items);
                return Ok(quote!(::expr_sql::Expr::Array(#items)));
            },
            _ => {},
        }
        if is_none(expr) {
            return Ok(quote!(::expr_sql::Expr::null()));
        }
        if !self.references_param(expr.to_token_stream()) && !is_marker_call(expr) {
            return Ok(Self::value(expr));
        }
        self.structural(expr)
    }

    /// A sub-expression Rust evaluates right away.
    ///
    /// Variables and their fields keep the shape of a closure capture (a
    /// member read on a constant); anything computed becomes a constant.
    fn value(expr: &Expr) -> TokenStream {
        let name = match expr {
            Expr::Path(p) => p.path.get_ident().map(ToString::to_string),
            Expr::Field(f) => Some(match &f.member {
                syn::Member::Named(ident) => ident.to_string(),
                syn::Member::Unnamed(index) => index.index.to_string(),
            }),
            _ => None,
        };
        match name {
            Some(name) => quote! {
                ::expr_sql::Expr::captured(#name, ::core::clone::Clone::clone(&#expr))
            },
            None => quote!(::expr_sql::Expr::constant(#expr)),
        }
    }

    /// Whether a lambda parameter appears, ignoring names after `.` or `::`.
    fn references_param(&self, tokens: TokenStream) -> bool {
        let mut qualified = false;
        for tt in tokens {
            match tt {
                TokenTree::Ident(ident) => {
                    if !qualified && self.params.contains(&ident.to_string()) {
                        return true;
                    }
                    qualified = false;
                },
                TokenTree::Group(group) => {
                    if self.references_param(group.stream()) {
                        return true;
                    }
                    qualified = false;
                },
                TokenTree::Punct(punct) => qualified = matches!(punct.as_char(), '.' | ':'),
                TokenTree::Literal(_) => qualified = false,
            }
        }
        false
    }

    fn list<'a>(&self, exprs: impl IntoIterator<Item = &'a Expr>) -> Result<Vec<TokenStream>> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn structural(&self, expr: &Expr) -> Result<TokenStream> {
        match expr {
            Expr::Path(p) => match p.path.get_ident() {
                Some(ident) if self.params.contains(&ident.to_string()) => {
                    let name = ident.to_string();
                    Ok(quote!(::expr_sql::Expr::param(#name)))
                },
                _ => Err(unsupported(p.span(), "path", "x.field")),
            },
            Expr::Field(f) => {
                let base = self.expr(&f.base)?;
                let name = match &f.member {
                    syn::Member::Named(ident) => ident.to_string(),
                    syn::Member::Unnamed(index) => index.index.to_string(),
                };
                Ok(quote!(#base.field(#name)))
            },
            Expr::Binary(b) => {
                let left = self.expr(&b.left)?;
                let right = self.expr(&b.right)?;
                let op = match b.op {
                    BinOp::Add(_) => "Add",
                    BinOp::Sub(_) => "Subtract",
                    BinOp::Mul(_) => "Multiply",
                    BinOp::Div(_) => "Divide",
                    BinOp::Rem(_) => "Modulo",
                    BinOp::And(_) => "AndAlso",
                    BinOp::Or(_) => "OrElse",
                    BinOp::BitAnd(_) => "And",
                    BinOp::BitOr(_) => "Or",
                    BinOp::BitXor(_) => "ExclusiveOr",
                    BinOp::Shl(_) => "LeftShift",
                    BinOp::Shr(_) => "RightShift",
                    BinOp::Eq(_) => "Equal",
                    BinOp::Ne(_) => "NotEqual",
                    BinOp::Lt(_) => "LessThan",
                    BinOp::Le(_) => "LessThanOrEqual",
                    BinOp::Gt(_) => "GreaterThan",
                    BinOp::Ge(_) => "GreaterThanOrEqual",
                    _ => {
                        return Err(unsupported(
                            b.op.span(),
                            "assignment operator",
                            "x.level >= 2",
                        ));
                    },
                };
                Ok(binary(op, &left, &right))
            },
            Expr::Unary(u) => {
                let operand = self.expr(&u.expr)?;
                match u.op {
                    UnOp::Not(_) => Ok(unary("Not", &operand)),
                    UnOp::Neg(_) => Ok(unary("Negate", &operand)),
                    UnOp::Deref(_) => Ok(operand),
                    _ => Err(unsupported(u.op.span(), "unary operator", "!x.trashed")),
                }
            },
            Expr::Cast(c) => {
                let operand = self.expr(&c.expr)?;
                Ok(quote!(::expr_sql::Expr::convert(#operand)))
            },
            Expr::Index(i) => {
                let base = self.expr(&i.expr)?;
                let index = self.expr(&i.index)?;
                Ok(binary("ArrayIndex", &base, &index))
            },
            Expr::MethodCall(m) => self.method_call(m),
            Expr::Call(c) => self.call(c),
            other => Err(unsupported(
                other.span(),
                "expression",
                "predicate!(|x| x.name == name && !x.trashed)",
            )),
        }
    }

    fn method_call(&self, m: &syn::ExprMethodCall) -> Result<TokenStream> {
        let name = m.method.to_string();
        let receiver = self.expr(&m.receiver)?;
        let args = self.list(&m.args)?;

        match (name.as_str(), args.as_slice()) {
            // x.parent_id.unwrap_or(-1)
            ("unwrap_or", [fallback]) => Ok(binary("Coalesce", &receiver, fallback)),
            ("len", []) => Ok(unary("ArrayLength", &receiver)),
            (method, _) if KNOWN_METHODS.contains(&method) => {
                let args = expr_vec(&args);
                Ok(quote!(#receiver.invoke(#name, #args)))
            },
            (method, _) => Err(unknown_method(m.method.span(), method)),
        }
    }

    fn call(&self, c: &syn::ExprCall) -> Result<TokenStream> {
        let Expr::Path(func) = &*c.func else {
            return Err(unsupported(c.func.span(), "call target", "sql_in(ids, x.id)"));
        };
        let segments: Vec<String> = func
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect();
        let args = expr_vec(&self.list(&c.args)?);

        match segments.as_slice() {
            // Type::new(...)
            [.., type_name, last] if last == "new" => {
                Ok(quote!(::expr_sql::Expr::new_object(#type_name, #args)))
            },
            [.., last] if KNOWN_METHODS.contains(&last.as_str()) => {
                Ok(quote!(::expr_sql::Expr::call_static(#last, #args)))
            },
            [.., last] => Err(unknown_method(func.span(), last)),
            [] => Err(unsupported(func.span(), "call target", "sql_in(ids, x.id)")),
        }
    }
}
