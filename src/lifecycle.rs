//! Pure loan lifecycle transitions.
//!
//! Each function takes the record currently stored under a key (if any) and the
//! caller's input, and returns the record that should replace it. Nothing here
//! touches storage, so a rejected transition can never leave a partial write
//! behind.
use super::error::LifecycleError;
use super::loan::{Decision, LoanRecord, LoanStatus};
use super::types::{TimeStamp, exact_sub};
use chrono::Utc;
use rust_decimal::Decimal;

/// Arguments for opening a new loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    pub id: String,
    pub applicant_name: String,
    pub principal: Decimal,
    pub term_months: u32,
    pub interest_rate: Decimal,
}

impl ApplyRequest {
    pub fn new(
        id: impl Into<String>,
        applicant_name: impl Into<String>,
        principal: Decimal,
        term_months: u32,
        interest_rate: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            applicant_name: applicant_name.into(),
            principal,
            term_months,
            interest_rate,
        }
    }

    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.id.is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "loan ID cannot be empty".into(),
            ));
        }
        if self.applicant_name.is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "applicant name cannot be empty".into(),
            ));
        }
        if self.principal <= Decimal::ZERO {
            return Err(LifecycleError::InvalidArgument(format!(
                "principal must be positive, got {}",
                self.principal
            )));
        }
        if self.term_months == 0 {
            return Err(LifecycleError::InvalidArgument(
                "loan term must be positive".into(),
            ));
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(LifecycleError::InvalidArgument(format!(
                "interest rate cannot be negative, got {}",
                self.interest_rate
            )));
        }
        Ok(())
    }
}

fn require_status(record: &LoanRecord, expected: LoanStatus) -> Result<(), LifecycleError> {
    if record.status() != expected {
        return Err(LifecycleError::InvalidState {
            expected,
            actual: record.status(),
        });
    }
    Ok(())
}

/// Opens a loan in [`LoanStatus::Applied`] with the full principal outstanding.
pub fn apply(
    existing: Option<&LoanRecord>,
    request: &ApplyRequest,
    at: TimeStamp<Utc>,
) -> Result<LoanRecord, LifecycleError> {
    request.validate()?;

    if existing.is_some() {
        return Err(LifecycleError::AlreadyExists);
    }

    Ok(LoanRecord::open(
        request.id.clone(),
        request.applicant_name.clone(),
        request.principal,
        request.term_months,
        request.interest_rate,
        at,
    ))
}

/// Approves or rejects an applied loan. No other field changes.
pub fn decide(
    existing: Option<&LoanRecord>,
    decision: Decision,
    at: TimeStamp<Utc>,
) -> Result<LoanRecord, LifecycleError> {
    let current = existing.ok_or(LifecycleError::NotFound)?;
    require_status(current, LoanStatus::Applied)?;

    let next_status = LoanStatus::from(decision);
    debug_assert!(current.status().can_transition_to(next_status));

    let mut next = current.clone();
    next.set_status(next_status, at);

    Ok(next)
}

/// Applies a repayment to an approved loan, closing it as paid when the
/// balance reaches zero.
pub fn repay(
    existing: Option<&LoanRecord>,
    amount: Decimal,
    at: TimeStamp<Utc>,
) -> Result<LoanRecord, LifecycleError> {
    if amount <= Decimal::ZERO {
        return Err(LifecycleError::InvalidArgument(format!(
            "repayment amount must be positive, got {amount}"
        )));
    }

    let current = existing.ok_or(LifecycleError::NotFound)?;
    require_status(current, LoanStatus::Approved)?;

    if amount > current.outstanding() {
        return Err(LifecycleError::ExceedsBalance {
            amount,
            outstanding: current.outstanding(),
        });
    }

    let remaining = exact_sub(current.outstanding(), amount).ok_or_else(|| {
        LifecycleError::InvalidArgument(format!(
            "repayment amount {amount} cannot be taken exactly from outstanding balance {}",
            current.outstanding()
        ))
    })?;

    let mut next = current.clone();
    next.record_repayment(amount, remaining, at);

    Ok(next)
}

pub fn query(existing: Option<&LoanRecord>) -> Result<&LoanRecord, LifecycleError> {
    existing.ok_or(LifecycleError::NotFound)
}
