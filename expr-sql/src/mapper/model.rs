use std::fmt;

use crate::dialect::Dialect;
use crate::error::CompileError;
use crate::expr::{Expr, Member, Unary, UnaryOp};

use super::{FieldResolver, Mapped, MemberMapper};

/// Maps members of a single business model through a [`FieldResolver`].
///
/// - `x.name` and `(x as T).name` resolve `(model, "name")`.
/// - `x.content_type.alias` follows `related(model, "content_type")` and
///   resolves `alias` on the model it leads to.
/// - Everything else (captured variables, statics) is a value.
#[derive(Clone, Copy)]
pub struct ModelMapper<'a> {
    model: &'a str,
    resolver: &'a dyn FieldResolver,
}

impl fmt::Debug for ModelMapper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelMapper")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl<'a> ModelMapper<'a> {
    /// Map members of `model` through `resolver`.
    pub fn new(model: &'a str, resolver: &'a dyn FieldResolver) -> Self {
        Self { model, resolver }
    }

    /// The model type a receiver expression denotes.
    fn model_of(&self, receiver: &Expr) -> Result<String, CompileError> {
        match receiver {
            Expr::Member(Member {
                target: Some(inner),
                name,
            }) => {
                let parent = self.model_of(inner)?;
                self.resolver
                    .related(&parent, name)
                    .ok_or_else(|| CompileError::mapping(name, parent))
            },
            Expr::Unary(Unary {
                op: UnaryOp::Convert,
                operand,
            }) => self.model_of(operand),
            _ => Ok(self.model.to_string()),
        }
    }

    fn resolve(&self, model: &str, member: &str) -> Result<Mapped, CompileError> {
        self.resolver
            .resolve(model, member)
            .map(Mapped::Column)
            .ok_or_else(|| CompileError::mapping(member, model))
    }
}

/// Whether a receiver chain starts at a lambda parameter.
fn rooted_in_parameter(expr: &Expr) -> bool {
    match expr {
        Expr::Parameter(_) => true,
        Expr::Member(Member {
            target: Some(inner),
            ..
        }) => rooted_in_parameter(inner),
        Expr::Unary(Unary {
            op: UnaryOp::Convert,
            operand,
        }) => rooted_in_parameter(operand),
        _ => false,
    }
}

impl MemberMapper for ModelMapper<'_> {
    fn map_member(
        &self,
        member: &Member,
        _dialect: &dyn Dialect,
        replaying: bool,
    ) -> Result<Mapped, CompileError> {
        let Some(receiver) = member.target.as_deref() else {
            return Ok(Mapped::Value);
        };

        match receiver {
            Expr::Parameter(_)
            | Expr::Unary(Unary {
                op: UnaryOp::Convert,
                ..
            }) => {
                if replaying {
                    return Ok(Mapped::Column(String::new()));
                }
                self.resolve(self.model, &member.name)
            },
            Expr::Member(_) if rooted_in_parameter(receiver) => {
                if replaying {
                    return Ok(Mapped::Column(String::new()));
                }
                let nested = self.model_of(receiver)?;
                self.resolve(&nested, &member.name)
            },
            _ => Ok(Mapped::Value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Sqlite;
    use crate::mapper::FieldMap;

    fn fields() -> FieldMap {
        FieldMap::new()
            .with("Document", "name", "\"doc\".\"name\"")
            .with("ContentType", "alias", "\"ct\".\"alias\"")
            .with_relation("Document", "content_type", "ContentType")
    }

    fn member(expr: &Expr) -> &Member {
        match expr {
            Expr::Member(m) => m,
            other => panic!("not a member: {other:?}"),
        }
    }

    #[test]
    fn test_parameter_member_resolves() {
        let f = fields();
        let mapper = ModelMapper::new("Document", &f);
        let e = Expr::param("x").field("name");
        assert_eq!(
            mapper.map_member(member(&e), &Sqlite, false).unwrap(),
            Mapped::Column("\"doc\".\"name\"".into())
        );
    }

    #[test]
    fn test_convert_receiver_uses_model() {
        let f = fields();
        let mapper = ModelMapper::new("Document", &f);
        let e = Expr::convert(Expr::param("x")).field("name");
        assert_eq!(
            mapper.map_member(member(&e), &Sqlite, false).unwrap(),
            Mapped::Column("\"doc\".\"name\"".into())
        );
    }

    #[test]
    fn test_nested_chain_follows_relation() {
        let f = fields();
        let mapper = ModelMapper::new("Document", &f);
        let e = Expr::param("x").field("content_type").field("alias");
        assert_eq!(
            mapper.map_member(member(&e), &Sqlite, false).unwrap(),
            Mapped::Column("\"ct\".\"alias\"".into())
        );

        let e = Expr::param("x").field("creator").field("name");
        assert!(matches!(
            mapper.map_member(member(&e), &Sqlite, false),
            Err(CompileError::MappingNotFound { member, .. }) if member == "creator"
        ));
    }

    #[test]
    fn test_missing_mapping() {
        let f = fields();
        let mapper = ModelMapper::new("Document", &f);
        let e = Expr::param("x").field("path");
        let err = mapper.map_member(member(&e), &Sqlite, false).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MappingNotFound { ref member, ref model } if member == "path" && model == "Document"
        ));
    }

    #[test]
    fn test_captured_is_value_and_replay_skips_lookup() {
        let f = fields();
        let mapper = ModelMapper::new("Document", &f);
        let e = Expr::captured("path", "-1");
        assert_eq!(mapper.map_member(member(&e), &Sqlite, false).unwrap(), Mapped::Value);

        // unmapped member, but replay never looks it up
        let e = Expr::param("x").field("path");
        assert_eq!(
            mapper.map_member(member(&e), &Sqlite, true).unwrap(),
            Mapped::Column(String::new())
        );
    }
}
