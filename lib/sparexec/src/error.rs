use mindrdf::NamedNode;
use mindstore::StoreError;
use std::time::Duration;

/// A SPARQL evaluation error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryEvaluationError {
    /// Error from the underlying triple store.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// An expression error the enclosing operator does not catch.
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    /// A custom aggregate raised from its step or finalize.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    /// Error during `SERVICE` evaluation.
    #[error("SERVICE evaluation failed: {0}")]
    Service(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The variable holding the `SERVICE` name is unbound.
    #[error("The variable holding the service name is unbound")]
    UnboundService,
    /// No adapter is registered for the `SERVICE` endpoint.
    #[error("No service handler is registered for {0}")]
    UnsupportedService(NamedNode),
    /// The evaluation was cancelled through its token.
    #[error("The query evaluation was cancelled")]
    Cancelled,
    /// The evaluation ran past the token's deadline.
    #[error("The query evaluation exceeded the timeout of {0:?}")]
    Timeout(Duration),
}

/// A typed error raised while evaluating an expression.
///
/// These are caught where SPARQL requires: `FILTER` turns them into `false`,
/// `COALESCE` falls through to the next argument, `BOUND` returns `false`,
/// and `BIND` leaves the target variable unbound. Anywhere else they
/// terminate the query.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ExpressionError {
    /// Operand types do not fit the operator.
    #[error("Type error: {0}")]
    TypeError(String),
    /// The expression reads a variable with no binding.
    #[error("Variable ?{0} is not bound")]
    UnboundVariable(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Numeric operation overflowed")]
    NumericOverflow,
    /// An invalid regular expression in `REGEX` or `REPLACE`.
    #[error("Invalid regular expression: {0}")]
    BadRegex(String),
    /// A malformed `xsd:dateTime` or duration lexical form.
    #[error("Invalid dateTime value: {0}")]
    InvalidDateTime(String),
}

/// An error raised by a custom aggregate's step or finalize.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Aggregate error: {0}")]
pub struct AggregateError(pub String);
