use super::common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::workflows::fiscal::domain::{Contract, ContractId, Currency};
use crate::workflows::fiscal::error::{EntityRef, FiscalError};
use crate::workflows::fiscal::normalizer::{active_months, gross_contribution, NormalizedContract};

#[test]
fn full_year_counts_twelve_months() {
    assert_eq!(active_months(date(2025, 1, 1), None, window(2025)), 12);
    assert_eq!(
        active_months(date(2025, 1, 1), Some(date(2025, 12, 31)), window(2025)),
        12
    );
}

#[test]
fn contract_spanning_several_years_is_capped() {
    assert_eq!(
        active_months(date(2019, 6, 1), Some(date(2031, 6, 1)), window(2025)),
        12
    );
}

#[test]
fn mid_month_start_counts_the_partial_month() {
    assert_eq!(active_months(date(2025, 3, 15), None, window(2025)), 10);
    assert_eq!(active_months(date(2025, 3, 1), None, window(2025)), 10);
    assert_eq!(active_months(date(2026, 3, 15), None, window(2026)), 10);
}

#[test]
fn half_year_lease_counts_six_months() {
    assert_eq!(
        active_months(date(2025, 1, 1), Some(date(2025, 6, 30)), window(2025)),
        6
    );
}

#[test]
fn single_day_counts_one_month() {
    assert_eq!(
        active_months(date(2025, 6, 15), Some(date(2025, 6, 15)), window(2025)),
        1
    );
    assert_eq!(active_months(date(2025, 12, 31), None, window(2025)), 1);
}

#[test]
fn contracts_outside_the_year_count_zero() {
    assert_eq!(
        active_months(date(2023, 1, 1), Some(date(2024, 12, 31)), window(2025)),
        0
    );
    assert_eq!(active_months(date(2026, 1, 1), None, window(2025)), 0);
}

#[test]
fn later_end_dates_never_lower_the_count() {
    let start = date(2025, 3, 15);
    let mut previous = 0;
    let mut end = start;
    while end <= date(2026, 2, 1) {
        let months = active_months(start, Some(end), window(2025));
        assert!(months >= previous, "{end} gave {months} after {previous}");
        assert!(months <= 12);
        previous = months;
        end = end.succ_opt().expect("next day");
    }
    assert_eq!(previous, 10);
}

#[test]
fn foreign_rent_is_converted_with_the_supplied_rate() {
    let record = contract_record(
        "ctr-eur",
        CO_OWNED,
        dec!(500),
        Currency::Eur,
        "2025-01-01",
        None,
    );
    let contract = Contract::try_from(&record).expect("valid contract");

    assert_eq!(
        gross_contribution(&contract, window(2025), dec!(4.97), dec!(100)).expect("income"),
        dec!(29820)
    );
    assert_eq!(
        gross_contribution(&contract, window(2025), dec!(4.97), dec!(50)).expect("income"),
        dec!(14910)
    );
}

#[test]
fn ron_rent_ignores_exchange_rate() {
    let record = contract_record(
        "ctr-ron",
        CO_OWNED,
        dec!(1000),
        Currency::Ron,
        "2025-07-01",
        None,
    );
    let normalized = NormalizedContract::from_record(&record, window(2025)).expect("valid");

    assert_eq!(normalized.active_months, 6);
    assert_eq!(
        normalized.income_for_share(dec!(5), dec!(100)).expect("income"),
        dec!(6000)
    );
}

#[test]
fn blank_end_date_means_open_ended() {
    let record = contract_record(
        "ctr-open",
        CO_OWNED,
        dec!(1000),
        Currency::Ron,
        "2024-05-10",
        Some("  "),
    );
    let normalized = NormalizedContract::from_record(&record, window(2025)).expect("valid");

    assert_eq!(normalized.contract.end, None);
    assert_eq!(normalized.active_months, 12);
}

#[test]
fn malformed_records_are_data_errors() {
    let reversed = contract_record(
        "ctr-rev",
        CO_OWNED,
        dec!(1000),
        Currency::Ron,
        "2025-06-01",
        Some("2025-02-01"),
    );
    let mut unparseable = reversed.clone();
    unparseable.start_date = Some("01/06/2025".to_string());
    let mut missing_rent = reversed.clone();
    missing_rent.end_date = None;
    missing_rent.monthly_rent = None;
    let mut missing_start = missing_rent.clone();
    missing_start.monthly_rent = Some(dec!(1000));
    missing_start.start_date = None;

    for record in [reversed, unparseable, missing_rent, missing_start] {
        match NormalizedContract::from_record(&record, window(2025)) {
            Err(FiscalError::Data { .. }) => {}
            other => panic!("expected data error for {record:?}, got {other:?}"),
        }
    }
}

#[test]
fn income_beyond_decimal_range_is_a_data_error() {
    let record = contract_record(
        "ctr-huge",
        CO_OWNED,
        Decimal::MAX / dec!(2),
        Currency::Eur,
        "2025-01-01",
        None,
    );
    let normalized = NormalizedContract::from_record(&record, window(2025)).expect("valid");

    match normalized.income_for_share(dec!(4.97), dec!(100)) {
        Err(FiscalError::Data { entity, .. }) => {
            assert_eq!(entity, EntityRef::Contract(ContractId("ctr-huge".to_string())));
        }
        other => panic!("expected data error, got {other:?}"),
    }
}
