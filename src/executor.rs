//! Optimistic read-validate-write execution of lifecycle operations
use super::config::ExecutorConfig;
use super::error::{ErrorKind, LifecycleError, LoanError, Operation, StoreError};
use super::lifecycle::{self, ApplyRequest};
use super::loan::{Decision, LoanRecord};
use super::store::{Version, VersionedStore, WriteOutcome};
use super::types::TimeStamp;
use rust_decimal::Decimal;

/// One proposed mutation of a single loan key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Apply(ApplyRequest),
    Decide { id: String, decision: Decision },
    Repay { id: String, amount: Decimal },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Apply(request) => &request.id,
            Command::Decide { id, .. } | Command::Repay { id, .. } => id,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Command::Apply(_) => Operation::Apply,
            Command::Decide { .. } => Operation::Decide,
            Command::Repay { .. } => Operation::Repay,
        }
    }

    fn transition(&self, current: Option<&LoanRecord>) -> Result<LoanRecord, LifecycleError> {
        let at = TimeStamp::new();
        match self {
            Command::Apply(request) => lifecycle::apply(current, request, at),
            Command::Decide { decision, .. } => lifecycle::decide(current, *decision, at),
            Command::Repay { amount, .. } => lifecycle::repay(current, *amount, at),
        }
    }
}

/// Result of a single read-validate-write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Committed(LoanRecord),
    /// Another writer got there first. Nothing was written.
    Conflict,
}

pub struct LoanExecutor<S> {
    store: S,
    config: ExecutorConfig,
}

impl<S: VersionedStore> LoanExecutor<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ExecutorConfig::default())
    }

    pub fn with_config(store: S, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Open a new loan under `id`
    pub fn apply(
        &self,
        id: &str,
        applicant_name: &str,
        principal: Decimal,
        term_months: u32,
        interest_rate: Decimal,
    ) -> Result<LoanRecord, LoanError> {
        let request = ApplyRequest::new(id, applicant_name, principal, term_months, interest_rate);
        self.submit(&Command::Apply(request))
    }

    /// Approve or reject a loan that is still in the applied state
    pub fn decide(&self, id: &str, decision: Decision) -> Result<LoanRecord, LoanError> {
        self.submit(&Command::Decide {
            id: id.to_owned(),
            decision,
        })
    }

    /// Record a repayment against an approved loan
    pub fn repay(&self, id: &str, amount: Decimal) -> Result<LoanRecord, LoanError> {
        self.submit(&Command::Repay {
            id: id.to_owned(),
            amount,
        })
    }

    /// Current snapshot of a loan. A single read, never writes.
    pub fn query(&self, id: &str) -> Result<LoanRecord, LoanError> {
        let current = self.read(id, Operation::Query)?.map(|(record, _)| record);

        lifecycle::query(current.as_ref())
            .cloned()
            .map_err(|err| LoanError::new(id, Operation::Query, err))
    }

    /// Runs `command` until it commits, is rejected, or the attempt budget is spent.
    #[tracing::instrument(skip_all, fields(key = command.key(), operation = %command.operation()))]
    pub fn submit(&self, command: &Command) -> Result<LoanRecord, LoanError> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            tracing::debug!(attempt, "starting attempt");

            match self.try_once(command)? {
                Attempt::Committed(record) => return Ok(record),
                Attempt::Conflict => {
                    tracing::warn!(attempt, max_attempts, "version conflict, retrying");
                }
            }
        }

        tracing::warn!(max_attempts, "retry budget exhausted");
        Err(LoanError::new(
            command.key(),
            command.operation(),
            ErrorKind::Contention {
                attempts: max_attempts,
            },
        ))
    }

    /// Submits an already ordered sequence of commands, one result per command.
    ///
    /// Each command is decided on its own against the record as left by the
    /// commands before it; a rejection does not stop the ones after it.
    pub fn submit_all<'a>(
        &self,
        commands: impl IntoIterator<Item = &'a Command>,
    ) -> Vec<Result<LoanRecord, LoanError>> {
        commands
            .into_iter()
            .map(|command| self.submit(command))
            .collect()
    }

    /// Exactly one read-validate-write cycle.
    ///
    /// Callers driving their own retry loop can stop after any attempt, a
    /// [`Attempt::Conflict`] leaves the store untouched.
    pub fn try_once(&self, command: &Command) -> Result<Attempt, LoanError> {
        let key = command.key();
        let operation = command.operation();
        let store_err = |err: StoreError| LoanError::new(key, operation, err);

        let (current, expected) = match self.read(key, operation)? {
            Some((record, version)) => (Some(record), Some(version)),
            None => (None, None),
        };

        let next = command
            .transition(current.as_ref())
            .map_err(|err| LoanError::new(key, operation, err))?;
        debug_assert!(next.check_invariants().is_ok());

        let encoded = next.to_cbor().map_err(store_err)?;
        let fingerprint = sha256::digest(&encoded);

        match self
            .store
            .put_conditional(key, encoded, expected)
            .map_err(store_err)?
        {
            WriteOutcome::Written(version) => {
                tracing::info!(
                    key,
                    %operation,
                    version = version.get(),
                    status = %next.status(),
                    outstanding = %next.outstanding(),
                    %fingerprint,
                    "committed"
                );
                Ok(Attempt::Committed(next))
            }
            WriteOutcome::Conflict => Ok(Attempt::Conflict),
        }
    }

    fn read(
        &self,
        key: &str,
        operation: Operation,
    ) -> Result<Option<(LoanRecord, Version)>, LoanError> {
        let Some(stored) = self
            .store
            .get(key)
            .map_err(|err| LoanError::new(key, operation, err))?
        else {
            return Ok(None);
        };

        let record = LoanRecord::from_cbor(&stored.value)
            .map_err(|err| LoanError::new(key, operation, err))?;

        Ok(Some((record, stored.version)))
    }
}
