use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;

use super::domain::{Contract, ContractRecord, FiscalYearWindow, FULL_OWNERSHIP};
use super::error::{EntityRef, FiscalError};

pub const MONTHS_PER_YEAR: u32 = 12;

/// Months a contract counts as active within the fiscal year.
///
/// The active period `[start, end ?? Dec 31]` is intersected with the year. Whole calendar
/// months are counted over the inclusive intersection and any leftover days count as one
/// more month. The result never exceeds 12.
pub fn active_months(start: NaiveDate, end: Option<NaiveDate>, window: FiscalYearWindow) -> u32 {
    let from = start.max(window.first_day());
    let to = end
        .unwrap_or_else(|| window.last_day())
        .min(window.last_day());

    if from > to {
        return 0;
    }

    let Some(until) = to.succ_opt() else {
        return MONTHS_PER_YEAR;
    };

    let whole = whole_months(from, until);
    let months = if shift_months(from, whole) < until {
        whole + 1
    } else {
        whole
    };

    months.min(MONTHS_PER_YEAR)
}

/// Largest `n` with `from + n months <= until`, day-of-month clamped like chrono does.
fn whole_months(from: NaiveDate, until: NaiveDate) -> u32 {
    let delta = (until.year() - from.year()) * 12 + until.month() as i32 - from.month() as i32;
    let mut months = u32::try_from(delta).unwrap_or(0);
    while months > 0 && shift_months(from, months) > until {
        months -= 1;
    }
    months
}

fn shift_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Gross RON income a contract yields for an owner holding `share_percent` of the property.
///
/// Foreign-currency rents are converted with the single `exchange_rate` supplied for the
/// whole calculation. An amount too large for `Decimal` is a data error on the contract.
pub fn gross_contribution(
    contract: &Contract,
    window: FiscalYearWindow,
    exchange_rate: Decimal,
    share_percent: Decimal,
) -> Result<Decimal, FiscalError> {
    let months = active_months(contract.start, contract.end, window);
    prorated_income(contract, months, exchange_rate, share_percent)
}

fn prorated_income(
    contract: &Contract,
    months: u32,
    exchange_rate: Decimal,
    share_percent: Decimal,
) -> Result<Decimal, FiscalError> {
    let rate = if contract.currency.is_foreign() {
        exchange_rate
    } else {
        Decimal::ONE
    };
    share_percent
        .checked_div(FULL_OWNERSHIP)
        .and_then(|fraction| {
            contract
                .monthly_rent
                .checked_mul(Decimal::from(months))?
                .checked_mul(fraction)
        })
        .and_then(|total| total.checked_mul(rate))
        .ok_or_else(|| {
            FiscalError::data(
                EntityRef::Contract(contract.id.clone()),
                "income overflows the supported decimal range",
            )
        })
}

/// One contract reduced to the fiscal year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContract {
    pub contract: Contract,
    pub active_months: u32,
}

impl NormalizedContract {
    /// Validate a stored record and count its active months.
    pub fn from_record(
        record: &ContractRecord,
        window: FiscalYearWindow,
    ) -> Result<Self, FiscalError> {
        let contract = Contract::try_from(record)?;
        let active_months = active_months(contract.start, contract.end, window);
        Ok(Self {
            contract,
            active_months,
        })
    }

    pub fn income_for_share(
        &self,
        exchange_rate: Decimal,
        share_percent: Decimal,
    ) -> Result<Decimal, FiscalError> {
        prorated_income(
            &self.contract,
            self.active_months,
            exchange_rate,
            share_percent,
        )
    }
}
