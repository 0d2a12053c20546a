//! Member-to-column mapping strategies.
//!
//! The compiler is generic over a [`MemberMapper`], which decides for every
//! member access whether it denotes a column or a value to bind. Two
//! families are provided:
//!
//! - [`ModelMapper`]: predicates over a business model, resolved through a
//!   [`FieldResolver`].
//! - [`RowMapper`]: predicates over one, two or three row shapes
//!   ([`RowShape`]), optionally aliased.

mod model;
mod row;

use std::collections::BTreeMap;

pub use model::ModelMapper;
pub use row::{RowMapper, RowShape, RowSource};

use crate::dialect::Dialect;
use crate::error::CompileError;
use crate::expr::{Lambda, Member};

/// Outcome of mapping a member access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapped {
    /// A column reference, already quoted. Empty on a replay pass.
    Column(String),
    /// Not a column: the member must be evaluated and bound as a parameter.
    Value,
}

/// Strategy deciding how member accesses compile.
pub trait MemberMapper {
    /// Called when the compiler enters a lambda, before its body.
    fn on_lambda(&mut self, _lambda: &Lambda) -> Result<(), CompileError> {
        Ok(())
    }

    /// Classify a member access.
    ///
    /// On a replay pass (`replaying`) implementations must not perform any
    /// lookups; the classification has to follow from the tree's shape alone.
    fn map_member(
        &self,
        member: &Member,
        dialect: &dyn Dialect,
        replaying: bool,
    ) -> Result<Mapped, CompileError>;
}

/// Maps `(model, member)` pairs to quoted column references.
pub trait FieldResolver: Send + Sync {
    /// The column for `member` on `model`, or `None` if it is not mapped.
    fn resolve(&self, model: &str, member: &str) -> Option<String>;

    /// The model type reached through `member`, for nested property chains
    /// such as `x.content_type.alias`.
    fn related(&self, _model: &str, _member: &str) -> Option<String> {
        None
    }
}

/// In-memory [`FieldResolver`].
///
/// Column references are stored verbatim; quote them for the target
/// dialect when inserting (or let [`Config`](crate::Config) do it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    columns: BTreeMap<String, BTreeMap<String, String>>,
    relations: BTreeMap<String, BTreeMap<String, String>>,
}

impl FieldMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `model.member` to `column`.
    #[must_use]
    pub fn with(mut self, model: &str, member: &str, column: impl Into<String>) -> Self {
        self.insert(model, member, column);
        self
    }

    /// Declare that `model.member` leads to a value of type `related`.
    #[must_use]
    pub fn with_relation(mut self, model: &str, member: &str, related: impl Into<String>) -> Self {
        self.relations
            .entry(model.to_string())
            .or_default()
            .insert(member.to_string(), related.into());
        self
    }

    /// Map `model.member` to `column`, replacing any earlier mapping.
    pub fn insert(&mut self, model: &str, member: &str, column: impl Into<String>) {
        self.columns
            .entry(model.to_string())
            .or_default()
            .insert(member.to_string(), column.into());
    }

    /// Number of mapped `(model, member)` pairs.
    pub fn len(&self) -> usize {
        self.columns.values().map(BTreeMap::len).sum()
    }

    /// Whether no member is mapped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FieldResolver for FieldMap {
    fn resolve(&self, model: &str, member: &str) -> Option<String> {
        self.columns.get(model)?.get(member).cloned()
    }

    fn related(&self, model: &str, member: &str) -> Option<String> {
        self.relations.get(model)?.get(member).cloned()
    }
}
