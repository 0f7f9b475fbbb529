use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use bond_yield_core::fixed_income::bond::{Bond, BondRecord};
use bond_yield_core::fixed_income::metadata::{BondMetadata, RawBondMetadata};
use bond_yield_core::fixed_income::yields::{self, BondYieldInput};
use bond_yield_core::normalize;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Bonds arrive either as the typed `Bond` shape or as the flat record the
/// UI persists (camelCase keys, string numbers).
#[derive(Deserialize)]
#[serde(untagged)]
enum BondPayload {
    Typed(Bond),
    Record(BondRecord),
}

fn parse_bond(bond_json: &str) -> NapiResult<Bond> {
    match serde_json::from_str(bond_json).map_err(to_napi_error)? {
        BondPayload::Typed(bond) => Ok(bond),
        BondPayload::Record(record) => Bond::from_record(&record).map_err(to_napi_error),
    }
}

fn to_json_string(value: &impl serde::Serialize) -> NapiResult<String> {
    serde_json::to_string(value).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Yields
// ---------------------------------------------------------------------------

/// Gross yield to maturity in percent, as a decimal string.
#[napi]
pub fn compute_gross_yield(bond_json: String) -> NapiResult<String> {
    let bond = parse_bond(&bond_json)?;
    let pct = yields::compute_gross_yield(&bond).map_err(to_napi_error)?;
    Ok(pct.to_string())
}

/// Net yield to maturity in percent, as a decimal string.
#[napi]
pub fn compute_net_yield(bond_json: String) -> NapiResult<String> {
    let bond = parse_bond(&bond_json)?;
    let pct = yields::compute_net_yield(&bond).map_err(to_napi_error)?;
    Ok(pct.to_string())
}

/// Yield in percent of selling on `exit_date` (YYYY-MM-DD) at `exit_price`.
#[napi]
pub fn compute_exit_yield(
    bond_json: String,
    exit_date: String,
    exit_price: Option<String>,
    net: bool,
) -> NapiResult<String> {
    let bond = parse_bond(&bond_json)?;
    let date = NaiveDate::parse_from_str(exit_date.trim(), "%Y-%m-%d").map_err(to_napi_error)?;
    let price: Option<Decimal> = exit_price
        .as_deref()
        .map(normalize::normalize_number)
        .transpose()
        .map_err(to_napi_error)?;
    let pct = yields::compute_exit_yield(&bond, date, price, net).map_err(to_napi_error)?;
    Ok(pct.to_string())
}

#[napi]
pub fn coupon_schedule(bond_json: String) -> NapiResult<String> {
    let bond = parse_bond(&bond_json)?;
    let schedule = yields::coupon_schedule(&bond).map_err(to_napi_error)?;
    to_json_string(&schedule.coupons())
}

#[napi]
pub fn calculate_bond_yields(input_json: String) -> NapiResult<String> {
    let input: BondYieldInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = yields::calculate_bond_yields(&input).map_err(to_napi_error)?;
    to_json_string(&output)
}

/// Refresh the stored yields of a flat bond record, selling at its
/// `todayPrice` on `today` (YYYY-MM-DD).
#[napi]
pub fn refresh_record_yields(record_json: String, today: String) -> NapiResult<String> {
    let record: BondRecord = serde_json::from_str(&record_json).map_err(to_napi_error)?;
    let today = NaiveDate::parse_from_str(today.trim(), "%Y-%m-%d").map_err(to_napi_error)?;
    let refreshed = yields::refresh_record_yields(&record, today).map_err(to_napi_error)?;
    to_json_string(&refreshed)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[napi]
pub fn normalize_number(raw: String) -> NapiResult<String> {
    let value = normalize::normalize_number(&raw).map_err(to_napi_error)?;
    Ok(value.to_string())
}

#[napi]
pub fn normalize_bond_metadata(raw_json: String) -> NapiResult<String> {
    let raw: RawBondMetadata = serde_json::from_str(&raw_json).map_err(to_napi_error)?;
    let metadata = BondMetadata::from_raw(&raw).map_err(to_napi_error)?;
    to_json_string(&metadata)
}
