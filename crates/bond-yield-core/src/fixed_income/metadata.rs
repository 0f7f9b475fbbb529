//! Normalization of bond metadata as published by exchange listing pages.
//!
//! Listing pages quote prices with either decimal separator, percent changes
//! with a trailing `%`, coupon frequencies as Italian labels ("Semestrale"),
//! the coupon as a per-period rate, and dates sometimes with two-digit years.
//! [`BondMetadata::from_raw`] turns such a payload into typed terms that can
//! be applied to a [`Bond`].

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BondYieldError;
use crate::fixed_income::bond::Bond;
use crate::normalize::NumberInput;
use crate::types::{Money, Percent};
use crate::BondYieldResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const COUPON_FREQUENCY_LABELS: [(&str, i32); 8] = [
    ("annuale", 1),
    ("semestrale", 2),
    ("quadrimestrale", 3),
    ("trimestrale", 4),
    ("bimestrale", 6),
    ("mensile", 12),
    ("giornaliero", 365),
    ("zero coupon", 0),
];

/// Accepted date layouts, most specific first.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d/%m/%y", "%d.%m.%Y"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Metadata exactly as scraped: every numeric field may be text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBondMetadata {
    #[serde(default)]
    pub title: Option<String>,
    /// Last traded price
    pub last_price: NumberInput,
    /// Daily change, e.g. "-0,12%"
    #[serde(default)]
    pub price_change_pct: Option<NumberInput>,
    /// Frequency label ("Semestrale") or a number of coupons per year
    pub coupon_frequency: NumberInput,
    /// Coupon rate for one period, in percent
    pub periodic_coupon_rate: NumberInput,
    pub issuing_date: String,
    pub maturity_date: String,
}

/// Normalized bond metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondMetadata {
    pub title: Option<String>,
    pub last_price: Money,
    pub price_change_pct: Option<Percent>,
    /// Coupons per year
    pub coupon_frequency: i32,
    pub periodic_coupon_rate_pct: Percent,
    /// Annual coupon rate: periodic rate × frequency
    pub coupon_rate_pct: Percent,
    pub issuing_date: NaiveDate,
    pub maturity_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Coupons per year for an Italian frequency label, ignoring case and
/// surrounding whitespace.
pub fn parse_coupon_frequency(label: &str) -> BondYieldResult<i32> {
    let normalized = label.trim().to_lowercase();
    COUPON_FREQUENCY_LABELS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, freq)| *freq)
        .ok_or_else(|| BondYieldError::InvalidInput {
            field: "coupon_frequency".into(),
            reason: format!("unknown coupon frequency '{label}'"),
        })
}

impl BondMetadata {
    pub fn from_raw(raw: &RawBondMetadata) -> BondYieldResult<Self> {
        let last_price = raw.last_price.resolve("last_price")?;
        let price_change_pct = match &raw.price_change_pct {
            Some(NumberInput::Text(text)) => {
                let stripped = text.trim().trim_end_matches('%');
                Some(NumberInput::Text(stripped.to_string()).resolve("price_change_pct")?)
            }
            Some(NumberInput::Number(value)) => Some(*value),
            None => None,
        };

        let coupon_frequency = match &raw.coupon_frequency {
            NumberInput::Text(label) => match parse_coupon_frequency(label) {
                Ok(freq) => freq,
                Err(_) => whole_frequency(raw.coupon_frequency.resolve("coupon_frequency")?)?,
            },
            NumberInput::Number(value) => whole_frequency(*value)?,
        };

        let periodic_coupon_rate_pct = raw.periodic_coupon_rate.resolve("periodic_coupon_rate")?;
        let coupon_rate_pct = periodic_coupon_rate_pct * Decimal::from(coupon_frequency);

        let issuing_date = parse_listing_date(&raw.issuing_date, "issuing_date")?;
        let mut maturity_date = parse_listing_date(&raw.maturity_date, "maturity_date")?;
        if maturity_date < issuing_date {
            // Two-digit year resolved into the wrong century
            maturity_date = shift_century(maturity_date)?;
        }

        Ok(Self {
            title: raw.title.as_ref().map(|t| t.trim().to_string()),
            last_price,
            price_change_pct,
            coupon_frequency,
            periodic_coupon_rate_pct,
            coupon_rate_pct,
            issuing_date,
            maturity_date,
        })
    }

    /// Copy the coupon terms and dates into `bond`, leaving the investor's
    /// own settlement terms untouched.
    pub fn apply_to(&self, mut bond: Bond) -> Bond {
        bond.coupon_rate_pct = self.coupon_rate_pct;
        bond.yearly_frequency = self.coupon_frequency;
        bond.issuing_date = Some(self.issuing_date);
        bond.maturity_date = self.maturity_date;
        bond
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn whole_frequency(value: Decimal) -> BondYieldResult<i32> {
    if !value.fract().is_zero() || value < Decimal::ZERO {
        return Err(BondYieldError::InvalidInput {
            field: "coupon_frequency".into(),
            reason: format!("{value} is not a whole number of coupons"),
        });
    }
    i32::try_from(value).map_err(|_| BondYieldError::InvalidInput {
        field: "coupon_frequency".into(),
        reason: format!("{value} is out of range"),
    })
}

fn parse_listing_date(raw: &str, field: &str) -> BondYieldResult<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(trimmed, fmt)
                .ok()
                // %d/%m/%Y also accepts "01/03/72" as year 72
                .filter(|d| *fmt != "%d/%m/%Y" || d.year() >= 1000)
        })
        .ok_or_else(|| BondYieldError::InvalidInput {
            field: field.into(),
            reason: format!("'{raw}' is not a recognised date"),
        })
}

fn shift_century(date: NaiveDate) -> BondYieldResult<NaiveDate> {
    date.with_year(date.year() + 100)
        .ok_or_else(|| BondYieldError::DateError(format!("cannot move {date} forward 100 years")))
}
