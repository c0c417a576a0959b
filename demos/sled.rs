//! Walks one loan through its whole life against a sled database.
//!
//! Run with `cargo run --example sled [config.toml]`. Without a config file the
//! sled database is created in a temporary directory.

use anyhow::Context;
use loan_ledger::{Decision, LedgerConfig, LoanExecutor, config::Backend, utils};
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let temp_dir = tempfile::tempdir()?;
    let config = match std::env::args().nth(1) {
        Some(path) => LedgerConfig::load(path)?,
        None => {
            let mut config = LedgerConfig::default();
            config.store.backend = Backend::Sled;
            config.store.path = temp_dir.path().join("loans.db");
            config
        }
    };

    let store = config.store.open()?;
    let ledger = LoanExecutor::with_config(store, config.executor.clone());

    let loan_id = utils::new_loan_id()?;
    tracing::info!(%loan_id, "applying for loan");

    let loan = ledger
        .apply(&loan_id, "Jane Doe", dec!(5000), 12, dec!(5.5))
        .context("Loan failed on apply: ")?;
    println!("applied: {loan:#?}");

    ledger
        .decide(&loan_id, Decision::Approved)
        .context("Loan failed on approval: ")?;

    ledger
        .repay(&loan_id, dec!(2000))
        .context("Loan failed on first repayment: ")?;

    let loan = ledger.query(&loan_id)?;
    println!(
        "after first repayment: outstanding {} status {}",
        loan.outstanding(),
        loan.status()
    );

    let loan = ledger
        .repay(&loan_id, dec!(3000))
        .context("Loan failed on final repayment: ")?;
    println!(
        "after final repayment: outstanding {} status {} repayments {:?}",
        loan.outstanding(),
        loan.status(),
        loan.repayments()
    );

    match ledger.repay(&loan_id, dec!(1)) {
        Ok(_) => anyhow::bail!("a paid loan accepted another repayment"),
        Err(err) => println!("rejected as expected: {err}"),
    }

    Ok(())
}
