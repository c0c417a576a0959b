use anyhow::Context;
use loan_ledger::{
    Decision, ErrorKind, LifecycleError, LoanExecutor, LoanStatus, SledStore, Command,
    lifecycle::ApplyRequest,
};
use rust_decimal_macros::dec;
use sled::open;
use std::sync::Arc;

use tempfile::tempdir; // Use for test db cleanup.

// Sled takes a file lock on its directory, so each test gets its own database
// under a temp dir.
fn sled_ledger(name: &str) -> anyhow::Result<(tempfile::TempDir, LoanExecutor<SledStore>)> {
    let temp_dir = tempdir()?;
    let db = open(temp_dir.path().join(name))?;
    let ledger = LoanExecutor::new(SledStore::new(Arc::new(db)));
    Ok((temp_dir, ledger))
}

#[test]
fn apply_approve_and_pay_off() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("pay_off.db")?;

    let loan = ledger
        .apply("L1", "Jane Doe", dec!(5000), 12, dec!(5.5))
        .context("Loan failed on apply: ")?;
    assert_eq!(loan.status(), LoanStatus::Applied);
    assert_eq!(loan.outstanding(), dec!(5000));
    assert!(loan.repayments().is_empty());

    let loan = ledger
        .decide("L1", Decision::Approved)
        .context("Loan failed on approval: ")?;
    assert_eq!(loan.status(), LoanStatus::Approved);

    let loan = ledger.repay("L1", dec!(2000))?;
    assert_eq!(loan.outstanding(), dec!(3000));
    assert_eq!(loan.repayments(), vec![dec!(2000)]);

    let loan = ledger.repay("L1", dec!(3000))?;
    assert_eq!(loan.outstanding(), dec!(0));
    assert_eq!(loan.status(), LoanStatus::Paid);

    let err = ledger.repay("L1", dec!(1)).unwrap_err();
    assert_eq!(
        err.lifecycle(),
        Some(&LifecycleError::InvalidState {
            expected: LoanStatus::Approved,
            actual: LoanStatus::Paid,
        })
    );

    // the rejected repayment never reached the store
    let stored = ledger.query("L1")?;
    assert_eq!(stored.repayments(), vec![dec!(2000), dec!(3000)]);
    assert_eq!(stored.status(), LoanStatus::Paid);

    Ok(())
}

#[test]
fn rejecting_an_approved_loan_fails() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("reject_approved.db")?;

    ledger.apply("L1", "Jane Doe", dec!(5000), 12, dec!(5.5))?;
    ledger.decide("L1", Decision::Approved)?;

    let err = ledger.decide("L1", Decision::Rejected).unwrap_err();
    assert!(matches!(
        err.lifecycle(),
        Some(LifecycleError::InvalidState { .. })
    ));
    assert_eq!(err.key(), "L1");

    assert_eq!(ledger.query("L1")?.status(), LoanStatus::Approved);

    Ok(())
}

#[test]
fn duplicate_apply_keeps_original() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("duplicate.db")?;

    let original = ledger.apply("L1", "Jane Doe", dec!(5000), 12, dec!(5.5))?;

    let err = ledger
        .apply("L1", "John Roe", dec!(10), 1, dec!(0))
        .unwrap_err();
    assert_eq!(err.lifecycle(), Some(&LifecycleError::AlreadyExists));

    assert_eq!(ledger.query("L1")?, original);

    Ok(())
}

#[test]
fn rejected_loan_takes_no_repayments() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("rejected.db")?;

    ledger.apply("L2", "Jane Doe", dec!(800), 6, dec!(0))?;
    let loan = ledger.decide("L2", Decision::Rejected)?;
    assert_eq!(loan.status(), LoanStatus::Rejected);
    assert_eq!(loan.outstanding(), dec!(800));

    let err = ledger.repay("L2", dec!(100)).unwrap_err();
    assert!(matches!(
        err.lifecycle(),
        Some(LifecycleError::InvalidState {
            actual: LoanStatus::Rejected,
            ..
        })
    ));

    Ok(())
}

#[test]
fn overpayment_is_refused_without_partial_write() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("overpayment.db")?;

    ledger.apply("L3", "Jane Doe", dec!(100.00), 3, dec!(1.25))?;
    ledger.decide("L3", Decision::Approved)?;
    let before = ledger.repay("L3", dec!(40.00))?;

    let err = ledger.repay("L3", dec!(60.01)).unwrap_err();
    assert_eq!(
        err.lifecycle(),
        Some(&LifecycleError::ExceedsBalance {
            amount: dec!(60.01),
            outstanding: dec!(60.00),
        })
    );

    assert_eq!(ledger.query("L3")?, before);

    Ok(())
}

#[test]
fn repayment_too_small_to_register_is_refused() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("tiny_repayment.db")?;

    ledger.apply("L6", "Jane Doe", dec!(10), 12, dec!(0))?;
    let before = ledger.decide("L6", Decision::Approved)?;

    let err = ledger.repay("L6", dec!(0.0000000000000000000000000001)).unwrap_err();
    assert!(matches!(
        err.lifecycle(),
        Some(LifecycleError::InvalidArgument(_))
    ));

    let stored = ledger.query("L6")?;
    assert_eq!(stored, before);
    assert!(stored.repayments().is_empty());

    Ok(())
}

#[test]
fn unknown_loan_is_not_found() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("unknown.db")?;

    for err in [
        ledger.query("missing").unwrap_err(),
        ledger.decide("missing", Decision::Approved).unwrap_err(),
        ledger.repay("missing", dec!(1)).unwrap_err(),
    ] {
        assert_eq!(err.lifecycle(), Some(&LifecycleError::NotFound));
        assert!(!err.is_retryable());
    }

    Ok(())
}

#[test]
fn records_survive_reopening_the_database() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("reopen.db");

    {
        let store = SledStore::open(&db_path)?;
        let ledger = LoanExecutor::new(store);
        ledger.apply("L4", "Jane Doe", dec!(1200), 12, dec!(3))?;
        ledger.decide("L4", Decision::Approved)?;
        ledger.repay("L4", dec!(100))?;
        ledger.store().flush()?;
    }

    let ledger = LoanExecutor::new(SledStore::open(&db_path)?);
    let loan = ledger.query("L4")?;

    assert_eq!(loan.outstanding(), dec!(1100));
    assert_eq!(loan.repayments(), vec![dec!(100)]);
    assert_eq!(loan.history().len(), 3);

    Ok(())
}

#[test]
fn ordered_commands_are_decided_one_by_one() -> anyhow::Result<()> {
    let (_dir, ledger) = sled_ledger("ordered.db")?;

    let commands = vec![
        Command::Apply(ApplyRequest::new("L5", "Jane Doe", dec!(300), 3, dec!(0))),
        Command::Repay {
            id: "L5".into(),
            amount: dec!(100),
        },
        Command::Decide {
            id: "L5".into(),
            decision: Decision::Approved,
        },
        Command::Repay {
            id: "L5".into(),
            amount: dec!(100),
        },
        Command::Decide {
            id: "L5".into(),
            decision: Decision::Rejected,
        },
        Command::Repay {
            id: "L5".into(),
            amount: dec!(200),
        },
    ];

    let results = ledger.submit_all(&commands);
    assert_eq!(results.len(), commands.len());

    let accepted: Vec<bool> = results.iter().map(Result::is_ok).collect();
    assert_eq!(accepted, vec![true, false, true, true, false, true]);

    // the early repayment was refused because the loan was not yet approved
    let early = results[1].as_ref().unwrap_err();
    assert!(matches!(
        early.kind(),
        ErrorKind::Lifecycle(LifecycleError::InvalidState {
            actual: LoanStatus::Applied,
            ..
        })
    ));

    let loan = ledger.query("L5")?;
    assert_eq!(loan.status(), LoanStatus::Paid);
    assert_eq!(loan.repayments(), vec![dec!(100), dec!(200)]);

    Ok(())
}
