//! Locale-tolerant number parsing for values typed by users or scraped from
//! exchange pages ("92,81", "1.234,5", "1,234.5", "2.15").

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BondYieldError;
use crate::BondYieldResult;

/// A numeric field that may arrive either as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Text(String),
    Number(Decimal),
}

impl NumberInput {
    /// Resolve to a Decimal, normalizing text with [`normalize_number`].
    pub fn resolve(&self, field: &str) -> BondYieldResult<Decimal> {
        match self {
            NumberInput::Number(value) => Ok(*value),
            NumberInput::Text(text) => {
                normalize_number(text).map_err(|_| BondYieldError::InvalidInput {
                    field: field.into(),
                    reason: format!("'{text}' is not a number"),
                })
            }
        }
    }
}

impl From<Decimal> for NumberInput {
    fn from(value: Decimal) -> Self {
        NumberInput::Number(value)
    }
}

/// Parse a number written with either `,` or `.` as the decimal separator.
///
/// When both separators appear, the last one is the decimal separator.
/// A separator that repeats (`1,234,567` or `1.234.567`) only groups thousands.
/// A single comma with no dot is a decimal comma, so the ambiguous `"1,234"`
/// reads as `1.234`, the same as `"1.234"`.
pub fn normalize_number(raw: &str) -> BondYieldResult<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BondYieldError::InvalidInput {
            field: "number".into(),
            reason: "empty string".into(),
        });
    }

    let commas = trimmed.matches(',').count();
    let dots = trimmed.matches('.').count();
    let canonical = match (trimmed.rfind('.'), trimmed.rfind(',')) {
        (Some(dot), Some(comma)) if dot < comma => trimmed.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => trimmed.replace(',', ""),
        (None, Some(_)) if commas > 1 => trimmed.replace(',', ""),
        (None, Some(_)) => trimmed.replace(',', "."),
        (Some(_), None) if dots > 1 => trimmed.replace('.', ""),
        _ => trimmed.to_string(),
    };

    Decimal::from_str(&canonical)
        .or_else(|_| Decimal::from_scientific(&canonical))
        .map_err(|_| BondYieldError::InvalidInput {
            field: "number".into(),
            reason: format!("'{raw}' is not a number"),
        })
}
