use super::common::*;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::workflows::fiscal::error::FiscalError;
use crate::workflows::fiscal::memory::PortfolioSnapshot;
use crate::workflows::fiscal::ownership::{OwnerShare, OwnershipAllocator, OwnershipWarning};
use crate::workflows::fiscal::repository::{ContractFilter, PortfolioRepository};

fn owner_share(owner_id: &str, percent: rust_decimal::Decimal) -> OwnerShare {
    OwnerShare {
        owner_id: oid(owner_id),
        percent,
    }
}

#[test]
fn get_owners_returns_every_share() {
    let (allocator, _) = allocator(co_owned_portfolio());

    let owners = allocator.get_owners(&pid(CO_OWNED)).expect("owners");

    assert_eq!(
        owners,
        vec![owner_share(OWNER_A, dec!(60)), owner_share(OWNER_B, dec!(40))]
    );
    assert_eq!(
        allocator.total_percentage(&pid(CO_OWNED)).expect("total"),
        dec!(100)
    );
}

#[test]
fn get_owners_of_unknown_property_is_not_found() {
    let (allocator, _) = allocator(co_owned_portfolio());

    match allocator.get_owners(&pid("prop-missing")) {
        Err(FiscalError::NotFound { .. }) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn add_owner_beyond_full_ownership_is_written_with_warning() {
    let (allocator, repository) = allocator(co_owned_portfolio());

    let change = allocator
        .add_owner(&owner(OWNER_A), &pid(CO_OWNED), &oid("owner-c"), dec!(10))
        .expect("over-allocation is soft");

    assert_eq!(change.total_percent, dec!(110));
    assert_eq!(
        change.warnings,
        vec![OwnershipWarning::OverAllocated {
            property_id: pid(CO_OWNED),
            total: dec!(110),
        }]
    );
    let stored = repository
        .fetch_property_ownerships(&pid(CO_OWNED))
        .expect("rows");
    assert_eq!(stored.len(), 3);
}

#[test]
fn add_owner_rejects_shares_outside_range() {
    let (allocator, _) = allocator(co_owned_portfolio());

    for percent in [dec!(0), dec!(-5), dec!(100.5)] {
        match allocator.add_owner(&admin(), &pid(CO_OWNED), &oid("owner-c"), percent) {
            Err(FiscalError::Validation { .. }) => {}
            other => panic!("expected validation error for {percent}, got {other:?}"),
        }
    }
}

#[test]
fn add_owner_rejects_existing_owner() {
    let (allocator, _) = allocator(co_owned_portfolio());

    match allocator.add_owner(&owner(OWNER_A), &pid(CO_OWNED), &oid(OWNER_B), dec!(5)) {
        Err(FiscalError::Validation { .. }) => {}
        other => panic!("expected duplicate owner rejection, got {other:?}"),
    }
}

#[test]
fn add_owner_requires_an_editor() {
    let (allocator, _) = allocator(co_owned_portfolio());

    match allocator.add_owner(&owner(STRANGER), &pid(CO_OWNED), &oid(STRANGER), dec!(10)) {
        Err(FiscalError::AccessDenied { user, .. }) => assert_eq!(user, oid(STRANGER)),
        other => panic!("expected access denied, got {other:?}"),
    }
}

#[test]
fn update_owner_percent_reports_under_allocation() {
    let (allocator, repository) = allocator(co_owned_portfolio());

    let change = allocator
        .update_owner_percent(&owner(OWNER_B), &pid(CO_OWNED), &oid(OWNER_B), dec!(30))
        .expect("update applies");

    assert_eq!(change.total_percent, dec!(90));
    assert!(matches!(
        change.warnings.as_slice(),
        [OwnershipWarning::UnderAllocated { .. }]
    ));
    let stored = repository
        .fetch_property_ownerships(&pid(CO_OWNED))
        .expect("rows");
    assert!(stored
        .iter()
        .any(|row| row.owner_id == oid(OWNER_B) && row.percent == dec!(30)));
}

#[test]
fn update_owner_percent_for_non_owner_is_not_found() {
    let (allocator, _) = allocator(co_owned_portfolio());

    match allocator.update_owner_percent(&admin(), &pid(CO_OWNED), &oid(STRANGER), dec!(10)) {
        Err(FiscalError::NotFound { .. }) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn remove_owner_refuses_last_owner() {
    let (allocator, repository) = allocator(co_owned_portfolio());

    match allocator.remove_owner(&owner(OWNER_A), &pid(SOLO), &oid(OWNER_A)) {
        Err(FiscalError::Invariant { .. }) => {}
        other => panic!("expected invariant error, got {other:?}"),
    }
    assert_eq!(
        repository
            .fetch_property_ownerships(&pid(SOLO))
            .expect("rows")
            .len(),
        1
    );
}

#[test]
fn remove_owner_leaves_remaining_shares() {
    let (allocator, _) = allocator(co_owned_portfolio());

    let change = allocator
        .remove_owner(&owner(OWNER_A), &pid(CO_OWNED), &oid(OWNER_B))
        .expect("co-owner removed");

    assert_eq!(change.owners, vec![owner_share(OWNER_A, dec!(60))]);
    assert_eq!(change.total_percent, dec!(60));
    assert_eq!(change.warnings.len(), 1);
}

#[test]
fn can_edit_property_allows_owners_and_admins() {
    let (allocator, _) = allocator(co_owned_portfolio());
    let property = pid(CO_OWNED);

    assert!(allocator.can_edit_property(&owner(OWNER_B), &property).unwrap());
    assert!(allocator.can_edit_property(&admin(), &property).unwrap());
    assert!(!allocator.can_edit_property(&owner(STRANGER), &property).unwrap());
}

#[test]
fn create_property_assigns_caller_full_ownership() {
    let (allocator, _) = allocator(PortfolioSnapshot::default());

    let property_id = allocator
        .create_property(&owner(OWNER_A), new_property("Casa Bunicii"))
        .expect("property created");

    assert_eq!(
        allocator.get_owners(&property_id).expect("owners"),
        vec![owner_share(OWNER_A, dec!(100))]
    );
}

#[test]
fn create_co_owned_property_requires_shares_to_sum_to_one_hundred() {
    let (allocator, repository) = allocator(PortfolioSnapshot::default());

    let result = allocator.create_co_owned_property(
        &owner(OWNER_A),
        new_property("Duplex"),
        vec![owner_share(OWNER_A, dec!(50)), owner_share(OWNER_B, dec!(40))],
    );

    assert!(matches!(result, Err(FiscalError::Validation { .. })));
    let snapshot = repository.snapshot().expect("snapshot");
    assert!(snapshot.properties.is_empty());
    assert!(snapshot.ownerships.is_empty());
}

#[test]
fn create_co_owned_property_accepts_rounding_slack() {
    let (allocator, _) = allocator(PortfolioSnapshot::default());

    let property_id = allocator
        .create_co_owned_property(
            &owner(OWNER_A),
            new_property("Triplex"),
            vec![
                owner_share(OWNER_A, dec!(33.33)),
                owner_share(OWNER_B, dec!(33.33)),
                owner_share("owner-c", dec!(33.33)),
            ],
        )
        .expect("99.99% is within tolerance");

    assert_eq!(
        allocator.total_percentage(&property_id).expect("total"),
        dec!(99.99)
    );
}

#[test]
fn create_co_owned_property_rejects_repeated_owner() {
    let (allocator, _) = allocator(PortfolioSnapshot::default());

    let result = allocator.create_co_owned_property(
        &owner(OWNER_A),
        new_property("Duplex"),
        vec![owner_share(OWNER_A, dec!(50)), owner_share(OWNER_A, dec!(50))],
    );

    assert!(matches!(result, Err(FiscalError::Validation { .. })));
}

#[test]
fn create_co_owned_property_removes_property_when_rows_fail() {
    let repository = Arc::new(RejectingOwnershipRepository::default());
    let allocator = OwnershipAllocator::new(repository.clone());

    let result = allocator.create_co_owned_property(
        &owner(OWNER_A),
        new_property("Duplex"),
        vec![owner_share(OWNER_A, dec!(50)), owner_share(OWNER_B, dec!(50))],
    );

    assert!(matches!(result, Err(FiscalError::Repository(_))));
    let snapshot = repository.inner.snapshot().expect("snapshot");
    assert!(snapshot.properties.is_empty(), "property row rolled back");
}

#[test]
fn delete_property_is_blocked_by_contracts() {
    let (allocator, _) = allocator(co_owned_portfolio());

    match allocator.delete_property(&owner(OWNER_A), &pid(CO_OWNED)) {
        Err(FiscalError::Invariant { .. }) => {}
        other => panic!("expected invariant error, got {other:?}"),
    }
}

#[test]
fn delete_property_removes_ownership_rows() {
    let (allocator, repository) = allocator(co_owned_portfolio());

    allocator
        .delete_property(&owner(OWNER_A), &pid(SOLO))
        .expect("unrented property deleted");

    assert!(repository.fetch_property(&pid(SOLO)).unwrap().is_none());
    assert!(repository
        .fetch_property_ownerships(&pid(SOLO))
        .unwrap()
        .is_empty());
    assert_eq!(
        repository
            .fetch_contracts(&ContractFilter::for_owner(oid(OWNER_A)))
            .unwrap()
            .len(),
        1
    );
}
