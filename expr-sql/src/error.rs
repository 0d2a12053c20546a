//! Error types for compilation, evaluation and configuration.

use thiserror::Error;

/// Errors raised while compiling a predicate.
///
/// There is no partial success: once a compile call returns an error the
/// compiler's parameter list is meaningless and the compiler must be dropped.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A method name, call shape or argument kind the compiler cannot translate.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The field resolver has no column for a member.
    #[error("no column mapped for member '{member}' on type '{model}'")]
    MappingNotFound {
        /// The member as written in the predicate.
        member: String,
        /// The model or row alias it was looked up on.
        model: String,
    },

    /// A cached expression was used in a way its lifecycle forbids.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A value that must be concrete at compile time could not be evaluated.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl CompileError {
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub(crate) fn mapping(member: impl Into<String>, model: impl Into<String>) -> Self {
        Self::MappingNotFound {
            member: member.into(),
            model: model.into(),
        }
    }
}

/// Errors raised by an [`Evaluate`](crate::Evaluate) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The expression reads a lambda parameter, which has no value at compile time.
    #[error("'{0}' depends on lambda parameter and cannot be evaluated")]
    Unbound(String),

    /// A record has no member with this name.
    #[error("value has no member '{member}'")]
    MissingMember {
        /// The member that was read.
        member: String,
    },

    /// The evaluator does not know how to produce a value for this node.
    #[error("cannot evaluate '{0}'")]
    NotEvaluable(String),

    /// Operand kinds do not fit the operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Errors raised while loading a [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML text does not parse or does not fit the config shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `dialect` value other than `sqlite`, `postgres` or `sqlserver`.
    #[error("unknown dialect '{0}' (expected sqlite, postgres or sqlserver)")]
    UnknownDialect(String),

    /// A table, column or alias name that is not a plain SQL identifier.
    #[error("invalid SQL {context} name '{name}'")]
    InvalidIdentifier {
        /// What kind of name it is (`table` or `column`).
        context: &'static str,
        /// The rejected name.
        name: String,
    },
}
