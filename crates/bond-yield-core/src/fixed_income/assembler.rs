//! Assembly of the investor's cashflow stream for a holding period.
//!
//! A full-life stream runs from settlement to maturity. An early-exit stream
//! is derived from a full-life stream by cutting it at the exit date and
//! replacing the redemption with the sale proceeds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::calendar::days_between;
use crate::error::BondYieldError;
use crate::fixed_income::accrual::{accrued_interest, accrued_since_last_coupon};
use crate::fixed_income::bond::Bond;
use crate::fixed_income::schedule::CouponSchedule;
use crate::fixed_income::tax::TaxAdjuster;
use crate::types::{CashFlow, CashFlowKind, Money, Percent};
use crate::BondYieldResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An investor's cashflows for one holding period.
///
/// `cashflows` is strictly increasing by date: legs falling on the same day
/// (a coupon paid on the redemption date, say) are merged into one flow.
/// The individual legs are kept so that an exit stream can be cut from a
/// full-life stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvestorStream {
    cashflows: Vec<CashFlow>,
    #[serde(skip)]
    legs: Vec<CashFlow>,
}

impl InvestorStream {
    fn from_legs(mut legs: Vec<CashFlow>) -> BondYieldResult<Self> {
        legs.sort_by_key(|leg| (leg.date, leg.kind.rank()));
        let cashflows = coalesce(&legs);

        if cashflows.len() < 2 {
            return Err(BondYieldError::Schedule(format!(
                "holding period produces {} distinct cashflow date(s), at least 2 are required",
                cashflows.len()
            )));
        }
        let has_outflow = cashflows.iter().any(|cf| cf.amount < Decimal::ZERO);
        let has_inflow = cashflows.iter().any(|cf| cf.amount > Decimal::ZERO);
        if !(has_outflow && has_inflow) {
            return Err(BondYieldError::Schedule(
                "cashflows have no sign change, no yield exists".into(),
            ));
        }

        Ok(Self { cashflows, legs })
    }

    /// Dated cashflows, strictly increasing by date.
    pub fn cashflows(&self) -> &[CashFlow] {
        &self.cashflows
    }

    /// Unmerged legs in date order.
    pub fn legs(&self) -> &[CashFlow] {
        &self.legs
    }

    pub fn first_date(&self) -> NaiveDate {
        self.cashflows[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.cashflows[self.cashflows.len() - 1].date
    }

    pub fn len(&self) -> usize {
        self.cashflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cashflows.is_empty()
    }
}

/// Sum same-date legs; the merged flow takes the most significant kind.
fn coalesce(sorted_legs: &[CashFlow]) -> Vec<CashFlow> {
    let mut merged: Vec<CashFlow> = Vec::with_capacity(sorted_legs.len());
    for leg in sorted_legs {
        match merged.last_mut() {
            Some(prev) if prev.date == leg.date => {
                prev.amount += leg.amount;
                if leg.kind.rank() > prev.kind.rank() {
                    prev.kind = leg.kind;
                }
            }
            _ => merged.push(leg.clone()),
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Cashflows of holding `bond` from settlement to maturity.
///
/// Coupons strictly after settlement are received (net of tax when `net`),
/// the purchase pays price plus interest accrued since the last coupon, and
/// the redemption pays price plus accrued interest minus tax on the gain.
pub fn assemble_full_life(bond: &Bond, net: bool) -> BondYieldResult<InvestorStream> {
    bond.validate()?;
    let schedule = CouponSchedule::generate(bond)?;
    assemble_from_schedule(bond, &schedule, net)
}

pub(crate) fn assemble_from_schedule(
    bond: &Bond,
    schedule: &CouponSchedule,
    net: bool,
) -> BondYieldResult<InvestorStream> {
    let tax = TaxAdjuster::select(net, bond.capital_gain_tax_pct);
    let settlement = bond.settlement_date;
    let maturity = bond.maturity_date;

    let accrued_at_settlement =
        accrued_since_last_coupon(schedule, settlement, bond.coupon_rate_pct)?;
    let accrued_at_maturity = accrued_since_last_coupon(schedule, maturity, bond.coupon_rate_pct)?;

    let redemption_proceeds = bond.redemption_price + accrued_at_maturity;
    let gain = redemption_proceeds - bond.settlement_price;

    let mut legs = Vec::with_capacity(schedule.len() + 2);
    legs.push(CashFlow::new(
        settlement,
        -(bond.settlement_price + accrued_at_settlement),
        CashFlowKind::Settlement,
    ));
    legs.extend(
        schedule
            .iter()
            .filter(|cf| cf.date > settlement && cf.date <= maturity)
            .map(|cf| CashFlow::new(cf.date, tax.coupon(cf.amount), CashFlowKind::Coupon)),
    );
    legs.push(CashFlow::new(
        maturity,
        tax.exit_amount(redemption_proceeds, gain),
        CashFlowKind::Redemption,
    ));

    debug!(
        isin = bond.isin.as_deref().unwrap_or(""),
        net,
        legs = legs.len(),
        %accrued_at_settlement,
        %accrued_at_maturity,
        "assembled full-life stream"
    );
    InvestorStream::from_legs(legs)
}

/// Cut a full-life stream at `exit_date` and sell at `exit_price`.
///
/// Legs dated on or before the exit survive, except the redemption, which
/// the sale replaces. Interest at exit is accrued forward: the days from the
/// exit date to the next flow of the full-life stream, at the coupon rate
/// over 365. When `net`, tax is charged on `exit_price − settlement_price`.
pub fn assemble_early_exit(
    full: &InvestorStream,
    exit_date: NaiveDate,
    exit_price: Money,
    settlement_price: Money,
    coupon_rate_pct: Percent,
    net: bool,
    tax_pct: Percent,
) -> BondYieldResult<InvestorStream> {
    if exit_price < Decimal::ZERO {
        return Err(BondYieldError::InvalidInput {
            field: "exit_price".into(),
            reason: "Exit price cannot be negative".into(),
        });
    }
    if exit_date < full.first_date() {
        return Err(BondYieldError::InvalidInput {
            field: "exit_date".into(),
            reason: format!("Exit date {exit_date} is before settlement {}", full.first_date()),
        });
    }
    if exit_date > full.last_date() {
        return Err(BondYieldError::InvalidInput {
            field: "exit_date".into(),
            reason: format!("Exit date {exit_date} is after maturity {}", full.last_date()),
        });
    }

    let tax = TaxAdjuster::select(net, tax_pct);
    let accrued_at_exit = full
        .cashflows()
        .iter()
        .find(|cf| cf.date > exit_date)
        .map(|next| accrued_interest(exit_date, next.date, coupon_rate_pct))
        .unwrap_or(Decimal::ZERO);

    let gain = exit_price - settlement_price;
    let exit_amount = tax.exit_amount(exit_price + accrued_at_exit, gain);

    let mut legs: Vec<CashFlow> = full
        .legs()
        .iter()
        .filter(|leg| leg.kind != CashFlowKind::Redemption && leg.date <= exit_date)
        .cloned()
        .collect();
    legs.push(CashFlow::new(exit_date, exit_amount, CashFlowKind::Exit));

    debug!(
        %exit_date,
        net,
        legs = legs.len(),
        %accrued_at_exit,
        days_to_next = full
            .cashflows()
            .iter()
            .find(|cf| cf.date > exit_date)
            .map(|next| days_between(exit_date, next.date))
            .unwrap_or(0),
        "assembled early-exit stream"
    );
    InvestorStream::from_legs(legs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn btp_2028() -> Bond {
        Bond::new(d(2025, 3, 7), d(2028, 7, 15), dec!(0.5), dec!(92.81), dec!(100), 2)
    }

    fn btp_2032_net() -> Bond {
        Bond::new(d(2025, 3, 31), d(2032, 12, 1), dec!(2.5), dec!(93.87), dec!(100), 2)
            .with_capital_gain_tax(dec!(12.5))
    }

    fn assert_strictly_increasing(stream: &InvestorStream) {
        for pair in stream.cashflows().windows(2) {
            assert!(pair[0].date < pair[1].date, "{:?} !< {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_full_life_shape() {
        let stream = assemble_full_life(&btp_2028(), false).unwrap();
        assert_strictly_increasing(&stream);
        assert_eq!(stream.first_date(), d(2025, 3, 7));
        assert_eq!(stream.last_date(), d(2028, 7, 15));
        // settlement + 6 coupons + (coupon + redemption) merged at maturity
        assert_eq!(stream.len(), 8);
        assert_eq!(stream.cashflows()[0].kind, CashFlowKind::Settlement);
        assert_eq!(stream.cashflows()[7].kind, CashFlowKind::Redemption);
        assert_eq!(stream.legs().len(), 9);
    }

    #[test]
    fn test_full_life_amounts() {
        let stream = assemble_full_life(&btp_2028(), false).unwrap();
        let flows = stream.cashflows();
        // 51 days since 15 Jan 2025 at 0.5%
        let accrued = dec!(0.5) * dec!(51) / dec!(365);
        assert_eq!(flows[0].amount, -(dec!(92.81) + accrued));
        assert_eq!(flows[1].amount, dec!(0.25));
        assert_eq!(flows[7].amount, dec!(100.25));
    }

    #[test]
    fn test_zero_coupon_has_two_flows() {
        let mut bond = btp_2028();
        bond.yearly_frequency = 0;
        let stream = assemble_full_life(&bond, false).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream.cashflows()[0].amount, dec!(-92.81));
        assert_eq!(stream.cashflows()[1].amount, dec!(100));
    }

    #[test]
    fn test_net_taxes_coupons_and_gain() {
        let bond = btp_2028().with_capital_gain_tax(dec!(12.5));
        let gross = assemble_full_life(&bond, false).unwrap();
        let net = assemble_full_life(&bond, true).unwrap();
        assert_eq!(net.cashflows()[0], gross.cashflows()[0]);
        assert_eq!(net.cashflows()[1].amount, dec!(0.21875));
        // Redemption leg taxed on 100 - 92.81; final coupon taxed separately
        let expected_last = dec!(100) - (dec!(100) - dec!(92.81)) * dec!(12.5) / dec!(100)
            + dec!(0.21875);
        assert_eq!(net.cashflows()[7].amount, expected_last);
    }

    #[test]
    fn test_net_with_zero_tax_is_gross() {
        let bond = btp_2028();
        assert_eq!(
            assemble_full_life(&bond, true).unwrap(),
            assemble_full_life(&bond, false).unwrap()
        );
    }

    #[test]
    fn test_settlement_on_maturity_fails() {
        let mut bond = btp_2028();
        bond.settlement_date = bond.maturity_date;
        assert!(matches!(
            assemble_full_life(&bond, false),
            Err(BondYieldError::Schedule(_))
        ));
    }

    #[test]
    fn test_free_bond_has_no_sign_change() {
        let mut bond = btp_2028();
        bond.yearly_frequency = 0;
        bond.redemption_price = Decimal::ZERO;
        assert!(matches!(
            assemble_full_life(&bond, false),
            Err(BondYieldError::Schedule(_))
        ));
    }

    #[test]
    fn test_early_exit_accrues_forward_to_next_coupon() {
        let bond = btp_2032_net();
        let full = assemble_full_life(&bond, true).unwrap();
        let exit = assemble_early_exit(
            &full,
            d(2025, 4, 1),
            dec!(94),
            bond.settlement_price,
            bond.coupon_rate_pct,
            true,
            bond.capital_gain_tax_pct,
        )
        .unwrap();

        assert_eq!(exit.len(), 2);
        assert_eq!(exit.cashflows()[1].kind, CashFlowKind::Exit);
        // 61 days from 1 Apr to the 1 Jun coupon; tax on 94 - 93.87
        let accrued = dec!(2.5) * dec!(61) / dec!(365);
        let tax = (dec!(94) - dec!(93.87)) * dec!(12.5) / dec!(100);
        assert_eq!(exit.cashflows()[1].amount, dec!(94) + accrued - tax);
    }

    #[test]
    fn test_early_exit_keeps_coupons_up_to_exit() {
        let bond = btp_2032_net();
        let full = assemble_full_life(&bond, false).unwrap();
        let exit = assemble_early_exit(
            &full,
            d(2026, 6, 1),
            dec!(96),
            bond.settlement_price,
            bond.coupon_rate_pct,
            false,
            bond.capital_gain_tax_pct,
        )
        .unwrap();

        assert_strictly_increasing(&exit);
        let dates: Vec<NaiveDate> = exit.cashflows().iter().map(|cf| cf.date).collect();
        assert_eq!(dates, vec![d(2025, 3, 31), d(2025, 6, 1), d(2025, 12, 1), d(2026, 6, 1)]);
        // Coupon on the exit date merges into the exit flow; next flow is 1 Dec 2026
        let accrued = dec!(2.5) * dec!(183) / dec!(365);
        assert_eq!(exit.cashflows()[3].amount, dec!(1.25) + (dec!(96) + accrued));
        assert_eq!(exit.cashflows()[3].kind, CashFlowKind::Exit);
    }

    #[test]
    fn test_early_exit_at_maturity_matches_full_life() {
        let bond = btp_2032_net();
        let full = assemble_full_life(&bond, true).unwrap();
        let exit = assemble_early_exit(
            &full,
            bond.maturity_date,
            bond.redemption_price,
            bond.settlement_price,
            bond.coupon_rate_pct,
            true,
            bond.capital_gain_tax_pct,
        )
        .unwrap();
        let amounts = |s: &InvestorStream| -> Vec<(NaiveDate, Money)> {
            s.cashflows().iter().map(|cf| (cf.date, cf.amount)).collect()
        };
        assert_eq!(amounts(&exit), amounts(&full));
    }

    #[test]
    fn test_early_exit_on_settlement_date_fails() {
        let bond = btp_2028();
        let full = assemble_full_life(&bond, false).unwrap();
        let result = assemble_early_exit(
            &full,
            bond.settlement_date,
            dec!(93),
            bond.settlement_price,
            bond.coupon_rate_pct,
            false,
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(BondYieldError::Schedule(_))));
    }

    #[test]
    fn test_early_exit_outside_holding_period_is_invalid() {
        let bond = btp_2028();
        let full = assemble_full_life(&bond, false).unwrap();
        for date in [d(2025, 1, 1), d(2029, 1, 1)] {
            let result = assemble_early_exit(
                &full,
                date,
                dec!(93),
                bond.settlement_price,
                bond.coupon_rate_pct,
                false,
                Decimal::ZERO,
            );
            assert!(matches!(result, Err(BondYieldError::InvalidInput { .. })));
        }
    }
}
