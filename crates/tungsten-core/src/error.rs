use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

/// Hard failures of the engine itself. Recoverable, user-level anomalies
/// never take this path; they go through the message channel and evaluation
/// continues with a sentinel expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("recursion depth of {0} exceeded")]
    RecursionLimit(usize),
    #[error("iteration limit of {0} exceeded")]
    IterationLimit(usize),
    #[error("evaluation aborted")]
    Aborted,
    #[error("malformed rational: denominator is zero")]
    MalformedRational,
    #[error("internal error: {0}")]
    Internal(String),
}
