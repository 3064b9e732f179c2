//! Error types for expression translation and host evaluation.
//!
//! Every [`TranslationError`] is fatal: the translator never catches or retries,
//! and the caller is expected to surface it as a "bad query" error.

use thiserror::Error;

/// Errors raised while evaluating a closed sub-expression on the host side.
///
/// These come from an injected [`HostEvaluator`](crate::folding::HostEvaluator)
/// and propagate through translation untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeError(String),

    /// A lambda parameter was reached while evaluating a closed sub-expression
    #[error("Unbound parameter: {0}")]
    UnboundParameter(String),

    /// Call to a host function that was never registered
    #[error("Unknown host function: {0}")]
    UnknownFunction(String),

    /// Member access on a captured value that has no such member
    #[error("Unknown member: {0}")]
    UnknownMember(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A host function reported a failure of its own
    #[error("{0}")]
    Raised(String),
}

/// Fatal query translation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    /// An expression node kind, method, or operator combination has no translation rule
    #[error("{0}")]
    UnsupportedExpressionShape(String),

    /// A recognized operator was called with an unexpected number of arguments
    #[error("Method '{method}' is expected to have {expected} arguments, but it has {actual}")]
    InvalidArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// The raw-query escape hatch did not resolve to a string or a prebuilt query spec
    #[error("Malformed query escape: {0}")]
    MalformedConstantEscape(String),

    /// Internal invariant violation (duplicate ORDER BY, SELECT overwrite, ...)
    #[error("Internal error: {0}")]
    StructuralViolation(String),

    /// Failure inside an injected host evaluation
    #[error(transparent)]
    Host(#[from] HostError),
}

impl TranslationError {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        TranslationError::UnsupportedExpressionShape(message.into())
    }

    pub(crate) fn structural(message: impl Into<String>) -> Self {
        TranslationError::StructuralViolation(message.into())
    }

    pub(crate) fn argument_count(method: &str, expected: usize, actual: usize) -> Self {
        TranslationError::InvalidArgumentCount {
            method: method.to_string(),
            expected,
            actual,
        }
    }

    pub(crate) fn method_not_supported(method: &str) -> Self {
        TranslationError::UnsupportedExpressionShape(format!(
            "Method '{}' is not supported.",
            method
        ))
    }
}

pub type Result<T, E = TranslationError> = std::result::Result<T, E>;
