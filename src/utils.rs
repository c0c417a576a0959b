//! Identifier helpers for callers that do not bring their own loan ids

use bech32::Bech32m;
use uuid7::uuid7;

pub const LOAN_ID_HRP: &str = "loan_";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// A fresh, time ordered loan id such as `loan_1...`.
pub fn new_loan_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(LOAN_ID_HRP)
}
