//! The loan record, its status machine and the audit trail of accepted transitions
use super::error::{LifecycleError, StoreError};
use super::types::{Money, TimeStamp, exact_add};
use chrono::Utc;
use rust_decimal::Decimal;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum LoanStatus {
    #[n(0)]
    Applied,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Paid,
}

// Every legal status change. Partial repayments leave the status untouched and
// are not transitions.
const TRANSITIONS: &[(LoanStatus, LoanStatus)] = &[
    (LoanStatus::Applied, LoanStatus::Approved),
    (LoanStatus::Applied, LoanStatus::Rejected),
    (LoanStatus::Approved, LoanStatus::Paid),
];

impl LoanStatus {
    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        TRANSITIONS.contains(&(self, next))
    }
    pub fn is_terminal(self) -> bool {
        !TRANSITIONS.iter().any(|(from, _)| *from == self)
    }
    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Applied => "APPLIED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of underwriting an [`LoanStatus::Applied`] loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for LoanStatus {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approved => LoanStatus::Approved,
            Decision::Rejected => LoanStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Decision::Approved),
            "REJECTED" => Ok(Decision::Rejected),
            other => Err(LifecycleError::InvalidArgument(format!(
                "decision must be APPROVED or REJECTED, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum LoanEvent {
    #[n(0)]
    Applied,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Repaid {
        #[n(0)]
        amount: Money,
    },
    #[n(4)]
    Paid,
}

/// One entry in a loan's audit trail.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Witness {
    #[n(0)]
    pub event: LoanEvent,
    #[n(1)]
    pub timestamp_utc: TimeStamp<Utc>,
}

impl Witness {
    pub fn new(event: LoanEvent, timestamp_utc: TimeStamp<Utc>) -> Self {
        Self {
            event,
            timestamp_utc,
        }
    }
}

// Terms are fixed once applied for, only the balance side moves.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LoanRecord {
    #[n(0)]
    id: String,
    #[n(1)]
    applicant_name: String,
    #[n(2)]
    principal: Money,
    #[n(3)]
    term_months: u32,
    #[n(4)]
    interest_rate: Money,
    #[n(5)]
    outstanding: Money,
    #[n(6)]
    status: LoanStatus,
    #[n(7)]
    repayments: Vec<Money>,
    #[n(8)]
    history: Vec<Witness>,
}

impl LoanRecord {
    pub(crate) fn open(
        id: String,
        applicant_name: String,
        principal: Decimal,
        term_months: u32,
        interest_rate: Decimal,
        at: TimeStamp<Utc>,
    ) -> Self {
        Self {
            id,
            applicant_name,
            principal: principal.into(),
            term_months,
            interest_rate: interest_rate.into(),
            outstanding: principal.into(),
            status: LoanStatus::Applied,
            repayments: vec![],
            history: vec![Witness::new(LoanEvent::Applied, at)],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn applicant_name(&self) -> &str {
        &self.applicant_name
    }
    pub fn principal(&self) -> Decimal {
        self.principal.value()
    }
    pub fn term_months(&self) -> u32 {
        self.term_months
    }
    pub fn interest_rate(&self) -> Decimal {
        self.interest_rate.value()
    }
    pub fn outstanding(&self) -> Decimal {
        self.outstanding.value()
    }
    pub fn status(&self) -> LoanStatus {
        self.status
    }
    /// Accepted repayments in the order they were made.
    pub fn repayments(&self) -> Vec<Decimal> {
        self.repayments.iter().map(Money::value).collect()
    }
    pub fn total_repaid(&self) -> Decimal {
        self.repayments.iter().map(Money::value).sum()
    }
    pub fn history(&self) -> &[Witness] {
        &self.history
    }

    pub(crate) fn set_status(&mut self, next: LoanStatus, at: TimeStamp<Utc>) {
        let event = match next {
            LoanStatus::Applied => LoanEvent::Applied,
            LoanStatus::Approved => LoanEvent::Approved,
            LoanStatus::Rejected => LoanEvent::Rejected,
            LoanStatus::Paid => LoanEvent::Paid,
        };
        self.status = next;
        self.history.push(Witness::new(event, at));
    }

    /// Appends `amount` and moves the balance to `remaining`, which the caller
    /// has already computed exactly.
    pub(crate) fn record_repayment(
        &mut self,
        amount: Decimal,
        remaining: Decimal,
        at: TimeStamp<Utc>,
    ) {
        self.repayments.push(amount.into());
        self.history.push(Witness::new(
            LoanEvent::Repaid {
                amount: amount.into(),
            },
            at.clone(),
        ));

        if remaining <= Decimal::ZERO {
            self.outstanding = Money::ZERO;
            self.set_status(LoanStatus::Paid, at);
        } else {
            self.outstanding = remaining.into();
        }
    }

    /// Checks the balance and status invariants every stored record must satisfy.
    pub fn check_invariants(&self) -> Result<(), String> {
        let principal = self.principal();
        let outstanding = self.outstanding();

        if self.id.is_empty() || self.applicant_name.is_empty() {
            return Err("id and applicant name must be non-empty".into());
        }
        if principal <= Decimal::ZERO || self.term_months == 0 {
            return Err("principal and term must be positive".into());
        }
        if self.interest_rate() < Decimal::ZERO {
            return Err("interest rate is negative".into());
        }
        if outstanding < Decimal::ZERO || outstanding > principal {
            return Err(format!("outstanding {outstanding} is outside 0..={principal}"));
        }
        if (outstanding == Decimal::ZERO) != (self.status == LoanStatus::Paid) {
            return Err(format!(
                "outstanding {outstanding} is inconsistent with status {}",
                self.status
            ));
        }
        if self.repayments.iter().any(|amount| !amount.is_positive()) {
            return Err("repayments must be positive".into());
        }
        let total = self
            .repayments
            .iter()
            .try_fold(Decimal::ZERO, |sum, amount| exact_add(sum, amount.value()))
            .ok_or("repayments do not sum exactly")?;
        if exact_add(total, outstanding) != Some(principal) {
            return Err(format!(
                "repayments {total} plus outstanding {outstanding} != principal {principal}"
            ));
        }

        Ok(())
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, StoreError> {
        Ok(minicbor::to_vec(self)?)
    }

    /// Decodes a stored record, refusing ones that break the invariants.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, StoreError> {
        let record: LoanRecord = minicbor::decode(bytes)?;
        record.check_invariants().map_err(StoreError::Corrupt)?;

        Ok(record)
    }

    /// sha256 digest of the encoded record.
    pub fn fingerprint(&self) -> Result<String, StoreError> {
        Ok(sha256::digest(&self.to_cbor()?))
    }
}
