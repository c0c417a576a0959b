use super::loan::LoanStatus;
use rust_decimal::Decimal;
use std::fmt;

/// Rejections produced by the pure lifecycle functions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("loan does not exist")]
    NotFound,
    #[error("loan already exists")]
    AlreadyExists,
    #[error("loan must be in {expected} status, found {actual}")]
    InvalidState {
        expected: LoanStatus,
        actual: LoanStatus,
    },
    #[error("repayment of {amount} exceeds outstanding balance of {outstanding}")]
    ExceedsBalance {
        amount: Decimal,
        outstanding: Decimal,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sled backend error: {0}")]
    Sled(#[from] sled::Error),
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<minicbor::decode::Error> for StoreError {
    fn from(value: minicbor::decode::Error) -> Self {
        StoreError::Corrupt(value.to_string())
    }
}

impl<E: std::error::Error> From<minicbor::encode::Error<E>> for StoreError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        StoreError::Corrupt(value.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("gave up after {attempts} conflicting attempts")]
    Contention { attempts: u32 },
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

/// The operation a caller attempted, carried on every [`LoanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Apply,
    Decide,
    Repay,
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Apply => "apply",
            Operation::Decide => "decide",
            Operation::Repay => "repay",
            Operation::Query => "query",
        };
        f.write_str(name)
    }
}

/// Error returned by the executor, naming the key and attempted operation.
#[derive(thiserror::Error, Debug)]
#[error("{operation} on loan '{key}' failed: {kind}")]
pub struct LoanError {
    key: String,
    operation: Operation,
    kind: ErrorKind,
}

impl LoanError {
    pub fn new(key: impl Into<String>, operation: Operation, kind: impl Into<ErrorKind>) -> Self {
        Self {
            key: key.into(),
            operation,
            kind: kind.into(),
        }
    }
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn operation(&self) -> Operation {
        self.operation
    }
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
    /// The lifecycle rejection, if that is what this error is.
    pub fn lifecycle(&self) -> Option<&LifecycleError> {
        match &self.kind {
            ErrorKind::Lifecycle(err) => Some(err),
            _ => None,
        }
    }
    /// Only exhausted optimistic retries are worth submitting again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Contention { .. })
    }
}
