//! Bond terms as entered by the investor, plus the flat record used by
//! callers to persist, import and export them.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BondYieldError;
use crate::normalize::NumberInput;
use crate::types::{Money, Percent};
use crate::BondYieldResult;

/// Date format used by [`BondRecord`].
const RECORD_DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A fixed-coupon bond position: what was bought, when, and at what price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    /// Opaque security identifier (usually an ISIN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    /// Date the bond was purchased
    pub settlement_date: NaiveDate,
    /// Date the bond was issued; the settlement date stands in when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_date: Option<NaiveDate>,
    /// Date the bond matures
    pub maturity_date: NaiveDate,
    /// Annual coupon rate in percent (0.5 = 0.5%)
    pub coupon_rate_pct: Percent,
    /// Clean price paid at settlement
    pub settlement_price: Money,
    /// Price repaid at maturity (typically 100)
    pub redemption_price: Money,
    /// Coupons per year; zero or negative means zero-coupon
    pub yearly_frequency: i32,
    /// Capital gains tax in percent
    #[serde(default)]
    pub capital_gain_tax_pct: Percent,
}

/// Flat, string-tolerant representation of a [`Bond`] for storage and
/// spreadsheet-style import/export. Dates are ISO `YYYY-MM-DD`.
///
/// Besides the bond terms a record carries the latest market price and the
/// yields last derived from it. Those are kept verbatim so a row survives a
/// read and write unchanged; [`refresh_record_yields`] recomputes them.
///
/// [`refresh_record_yields`]: crate::fixed_income::yields::refresh_record_yields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondRecord {
    #[serde(default)]
    pub isin: String,
    pub settlement_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_date: Option<String>,
    pub maturity_date: String,
    pub coupon_rate_perc: NumberInput,
    pub settlement_price: NumberInput,
    pub redemption_price: NumberInput,
    pub yearly_frequency: NumberInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_gain_tax_perc: Option<NumberInput>,
    /// Latest market price, used for the sell-today yields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_price: Option<NumberInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_yield_gross: Option<NumberInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_yield_net: Option<NumberInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_yield_gross_today: Option<NumberInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_yield_net_today: Option<NumberInput>,
}

// ---------------------------------------------------------------------------
// Bond
// ---------------------------------------------------------------------------

impl Bond {
    pub fn new(
        settlement_date: NaiveDate,
        maturity_date: NaiveDate,
        coupon_rate_pct: Percent,
        settlement_price: Money,
        redemption_price: Money,
        yearly_frequency: i32,
    ) -> Self {
        Self {
            isin: None,
            settlement_date,
            issuing_date: None,
            maturity_date,
            coupon_rate_pct,
            settlement_price,
            redemption_price,
            yearly_frequency,
            capital_gain_tax_pct: Decimal::ZERO,
        }
    }

    pub fn with_isin(mut self, isin: impl Into<String>) -> Self {
        self.isin = Some(isin.into());
        self
    }

    pub fn with_issuing_date(mut self, issuing_date: NaiveDate) -> Self {
        self.issuing_date = Some(issuing_date);
        self
    }

    pub fn with_capital_gain_tax(mut self, tax_pct: Percent) -> Self {
        self.capital_gain_tax_pct = tax_pct;
        self
    }

    /// Issuing date, falling back to the settlement date.
    pub fn effective_issuing_date(&self) -> NaiveDate {
        self.issuing_date.unwrap_or(self.settlement_date)
    }

    /// Coupons per year, with non-positive frequencies collapsed to zero-coupon.
    pub fn coupon_frequency(&self) -> u32 {
        u32::try_from(self.yearly_frequency).unwrap_or(0)
    }

    pub fn is_zero_coupon(&self) -> bool {
        self.coupon_frequency() == 0
    }

    /// Months between consecutive coupons, `None` for a zero-coupon bond.
    pub fn months_per_period(&self) -> Option<i32> {
        match self.coupon_frequency() {
            0 => None,
            freq => Some(12 / freq as i32),
        }
    }

    /// Amount paid on each coupon date.
    pub fn coupon_amount(&self) -> Money {
        match self.coupon_frequency() {
            0 => Decimal::ZERO,
            freq => self.redemption_price * (self.coupon_rate_pct / dec!(100)) / Decimal::from(freq),
        }
    }

    /// Check the terms describe a bond whose yield can be computed.
    pub fn validate(&self) -> BondYieldResult<()> {
        if self.settlement_price <= Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "settlement_price".into(),
                reason: "Settlement price must be positive".into(),
            });
        }
        if self.redemption_price < Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "redemption_price".into(),
                reason: "Redemption price cannot be negative".into(),
            });
        }
        if self.coupon_rate_pct < Decimal::ZERO {
            return Err(BondYieldError::InvalidInput {
                field: "coupon_rate_pct".into(),
                reason: "Coupon rate cannot be negative".into(),
            });
        }
        if self.capital_gain_tax_pct < Decimal::ZERO || self.capital_gain_tax_pct > dec!(100) {
            return Err(BondYieldError::InvalidInput {
                field: "capital_gain_tax_pct".into(),
                reason: "Capital gains tax must be between 0% and 100%".into(),
            });
        }
        let freq = self.coupon_frequency();
        if freq > 0 && 12 % freq != 0 {
            return Err(BondYieldError::InvalidInput {
                field: "yearly_frequency".into(),
                reason: format!("{freq} coupons per year do not fall on whole months"),
            });
        }
        if self.settlement_date > self.maturity_date {
            return Err(BondYieldError::InvalidInput {
                field: "settlement_date".into(),
                reason: "Settlement date must not be after maturity date".into(),
            });
        }
        if let Some(issuing_date) = self.issuing_date {
            if issuing_date > self.maturity_date {
                return Err(BondYieldError::InvalidInput {
                    field: "issuing_date".into(),
                    reason: "Issuing date must not be after maturity date".into(),
                });
            }
        }
        Ok(())
    }

    /// Flatten into a storage record.
    pub fn to_record(&self) -> BondRecord {
        BondRecord {
            isin: self.isin.clone().unwrap_or_default(),
            settlement_date: self.settlement_date.format(RECORD_DATE_FORMAT).to_string(),
            issuing_date: self
                .issuing_date
                .map(|d| d.format(RECORD_DATE_FORMAT).to_string()),
            maturity_date: self.maturity_date.format(RECORD_DATE_FORMAT).to_string(),
            coupon_rate_perc: self.coupon_rate_pct.into(),
            settlement_price: self.settlement_price.into(),
            redemption_price: self.redemption_price.into(),
            yearly_frequency: Decimal::from(self.yearly_frequency).into(),
            capital_gain_tax_perc: Some(self.capital_gain_tax_pct.into()),
            today_price: None,
            annual_yield_gross: None,
            annual_yield_net: None,
            annual_yield_gross_today: None,
            annual_yield_net_today: None,
        }
    }

    /// Rebuild a bond from a storage record, normalizing every numeric field.
    pub fn from_record(record: &BondRecord) -> BondYieldResult<Self> {
        let frequency = record.yearly_frequency.resolve("yearly_frequency")?;
        if !frequency.fract().is_zero() {
            return Err(BondYieldError::InvalidInput {
                field: "yearly_frequency".into(),
                reason: format!("{frequency} is not a whole number of coupons"),
            });
        }
        let yearly_frequency = frequency.to_i32().ok_or_else(|| BondYieldError::InvalidInput {
            field: "yearly_frequency".into(),
            reason: format!("{frequency} is out of range"),
        })?;

        let trimmed_isin = record.isin.trim();
        let issuing_date = match record.issuing_date.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Some(parse_record_date("issuingDate", text)?),
            _ => None,
        };
        let capital_gain_tax_pct = match &record.capital_gain_tax_perc {
            Some(value) => value.resolve("capital_gain_tax_perc")?,
            None => Decimal::ZERO,
        };

        Ok(Self {
            isin: (!trimmed_isin.is_empty()).then(|| trimmed_isin.to_string()),
            settlement_date: parse_record_date("settlementDate", &record.settlement_date)?,
            issuing_date,
            maturity_date: parse_record_date("maturityDate", &record.maturity_date)?,
            coupon_rate_pct: record.coupon_rate_perc.resolve("coupon_rate_perc")?,
            settlement_price: record.settlement_price.resolve("settlement_price")?,
            redemption_price: record.redemption_price.resolve("redemption_price")?,
            yearly_frequency,
            capital_gain_tax_pct,
        })
    }
}

// ---------------------------------------------------------------------------
// BondRecord
// ---------------------------------------------------------------------------

impl BondRecord {
    /// Latest market price, if the record has a usable one.
    ///
    /// Blank text and a zero price both mean "no quote yet".
    pub fn today_price(&self) -> BondYieldResult<Option<Money>> {
        match &self.today_price {
            Some(NumberInput::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(value) => {
                let price = value.resolve("today_price")?;
                Ok((!price.is_zero()).then_some(price))
            }
            None => Ok(None),
        }
    }
}

fn parse_record_date(field: &str, text: &str) -> BondYieldResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), RECORD_DATE_FORMAT).map_err(|e| {
        BondYieldError::DateError(format!("{field}: '{text}' is not a YYYY-MM-DD date ({e})"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn btp_2028() -> Bond {
        Bond::new(d(2025, 3, 7), d(2028, 7, 15), dec!(0.5), dec!(92.81), dec!(100), 2)
            .with_isin("IT0005445306")
    }

    #[test]
    fn test_issuing_date_defaults_to_settlement() {
        let bond = btp_2028();
        assert_eq!(bond.effective_issuing_date(), d(2025, 3, 7));
        let issued = bond.with_issuing_date(d(2021, 7, 15));
        assert_eq!(issued.effective_issuing_date(), d(2021, 7, 15));
    }

    #[test]
    fn test_coupon_amount_per_period() {
        assert_eq!(btp_2028().coupon_amount(), dec!(0.25));
        let mut annual = btp_2028();
        annual.yearly_frequency = 1;
        assert_eq!(annual.coupon_amount(), dec!(0.5));
    }

    #[test]
    fn test_negative_frequency_is_zero_coupon() {
        let mut bond = btp_2028();
        bond.yearly_frequency = -2;
        assert!(bond.is_zero_coupon());
        assert_eq!(bond.months_per_period(), None);
        assert_eq!(bond.coupon_amount(), Decimal::ZERO);
        assert!(bond.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut bond = btp_2028();
        bond.redemption_price = dec!(-100);
        assert!(matches!(
            bond.validate(),
            Err(BondYieldError::InvalidInput { ref field, .. }) if field == "redemption_price"
        ));
    }

    #[test]
    fn test_validate_rejects_settlement_after_maturity() {
        let mut bond = btp_2028();
        bond.settlement_date = d(2029, 1, 1);
        assert!(bond.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_irregular_frequency() {
        let mut bond = btp_2028();
        bond.yearly_frequency = 5;
        assert!(bond.validate().is_err());
        bond.yearly_frequency = 12;
        assert!(bond.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tax_out_of_range() {
        let bond = btp_2028().with_capital_gain_tax(dec!(120));
        assert!(bond.validate().is_err());
    }

    #[test]
    fn test_record_round_trip() {
        let bond = btp_2028()
            .with_issuing_date(d(2021, 7, 15))
            .with_capital_gain_tax(dec!(12.5));
        let record = bond.to_record();
        assert_eq!(record.settlement_date, "2025-03-07");
        assert_eq!(record.issuing_date.as_deref(), Some("2021-07-15"));
        assert_eq!(Bond::from_record(&record).unwrap(), bond);
    }

    #[test]
    fn test_record_from_ui_json_with_locale_strings() {
        let json = r#"{
            "isin": "IT0005441883",
            "settlementDate": "2025-03-05",
            "maturityDate": "2072-03-01",
            "couponRatePerc": "2,15",
            "settlementPrice": "57,80",
            "redemptionPrice": 100,
            "yearlyFrequency": "2"
        }"#;
        let record: BondRecord = serde_json::from_str(json).unwrap();
        let bond = Bond::from_record(&record).unwrap();
        assert_eq!(bond.isin.as_deref(), Some("IT0005441883"));
        assert_eq!(bond.coupon_rate_pct, dec!(2.15));
        assert_eq!(bond.settlement_price, dec!(57.80));
        assert_eq!(bond.yearly_frequency, 2);
        assert_eq!(bond.capital_gain_tax_pct, Decimal::ZERO);
        assert_eq!(bond.issuing_date, None);
    }

    #[test]
    fn test_record_keeps_market_price_and_yields() {
        let json = r#"{
            "isin": "IT0005445306",
            "settlementDate": "2025-03-07",
            "maturityDate": "2028-07-15",
            "couponRatePerc": 0.5,
            "settlementPrice": 92.81,
            "redemptionPrice": 100,
            "yearlyFrequency": 2,
            "annualYieldGross": 2.781,
            "annualYieldNet": 2,
            "todayPrice": "92,81",
            "annualYieldGrossToday": 2.781,
            "annualYieldNetToday": 2
        }"#;
        let record: BondRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.today_price().unwrap(), Some(dec!(92.81)));
        assert_eq!(record.annual_yield_gross, Some(NumberInput::Number(dec!(2.781))));
        assert_eq!(record.annual_yield_net_today, Some(NumberInput::Number(dec!(2))));

        let written = serde_json::to_value(&record).unwrap();
        assert_eq!(written["todayPrice"], "92,81");
        let reread: BondRecord = serde_json::from_value(written.clone()).unwrap();
        assert_eq!(serde_json::to_value(&reread).unwrap(), written);
        assert_eq!(reread.annual_yield_gross.unwrap().resolve("annualYieldGross").unwrap(), dec!(2.781));
    }

    #[test]
    fn test_record_without_quote_has_no_today_price() {
        let mut record = btp_2028().to_record();
        assert_eq!(record.today_price().unwrap(), None);
        record.today_price = Some(NumberInput::Text(" ".into()));
        assert_eq!(record.today_price().unwrap(), None);
        record.today_price = Some(NumberInput::Number(Decimal::ZERO));
        assert_eq!(record.today_price().unwrap(), None);

        let written = serde_json::to_value(btp_2028().to_record()).unwrap();
        assert!(written.get("todayPrice").is_none());
        assert!(written.get("annualYieldGross").is_none());
    }

    #[test]
    fn test_record_rejects_fractional_frequency() {
        let mut record = btp_2028().to_record();
        record.yearly_frequency = NumberInput::Text("2,5".into());
        assert!(Bond::from_record(&record).is_err());
    }

    #[test]
    fn test_record_rejects_locale_dates() {
        let mut record = btp_2028().to_record();
        record.maturity_date = "15/07/2028".into();
        assert!(matches!(
            Bond::from_record(&record),
            Err(BondYieldError::DateError(_))
        ));
    }
}
