use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::config::FiscalConfig;
use crate::workflows::fiscal::domain::{
    AccessContext, Address, ContractId, ContractRecord, Currency, FiscalYearWindow, NewContract,
    NewProperty, OwnerId, PaymentFrequency, Property, PropertyId, PropertyOwnership, Tenant,
};
use crate::workflows::fiscal::memory::{InMemoryPortfolioRepository, PortfolioSnapshot};
use crate::workflows::fiscal::ownership::OwnershipAllocator;
use crate::workflows::fiscal::repository::{
    ContractFilter, PortfolioRepository, RepositoryError,
};
use crate::workflows::fiscal::router::{fiscal_router, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::workflows::fiscal::service::FiscalSummaryService;

pub(super) const OWNER_A: &str = "owner-a";
pub(super) const OWNER_B: &str = "owner-b";
pub(super) const STRANGER: &str = "owner-z";
pub(super) const CO_OWNED: &str = "prop-co";
pub(super) const SOLO: &str = "prop-solo";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn window(year: i32) -> FiscalYearWindow {
    FiscalYearWindow::new(year).expect("supported year")
}

pub(super) fn pid(id: &str) -> PropertyId {
    PropertyId(id.to_string())
}

pub(super) fn oid(id: &str) -> OwnerId {
    OwnerId(id.to_string())
}

pub(super) fn owner(id: &str) -> AccessContext {
    AccessContext::owner(id)
}

pub(super) fn admin() -> AccessContext {
    AccessContext::admin("admin-1")
}

pub(super) fn address(locality: &str, county: &str) -> Address {
    Address {
        street: Some("Lalelelor".to_string()),
        number: Some("4".to_string()),
        locality: locality.to_string(),
        county: county.to_string(),
        postal_code: Some("400001".to_string()),
    }
}

pub(super) fn property(id: &str, name: &str) -> Property {
    Property {
        id: pid(id),
        name: name.to_string(),
        address: address("Cluj-Napoca", "Cluj"),
        rooms: 2,
        declared_ownership_total: dec!(100),
    }
}

pub(super) fn new_property(name: &str) -> NewProperty {
    NewProperty {
        name: name.to_string(),
        address: address("Brasov", "Brasov"),
        rooms: 3,
    }
}

pub(super) fn share(property_id: &str, owner_id: &str, percent: Decimal) -> PropertyOwnership {
    PropertyOwnership {
        property_id: pid(property_id),
        owner_id: oid(owner_id),
        percent,
    }
}

pub(super) fn tenant(name: &str) -> Tenant {
    Tenant {
        name: name.to_string(),
        tax_id: Some("1900101123456".to_string()),
        email: None,
        phone: None,
    }
}

pub(super) fn contract_record(
    id: &str,
    property_id: &str,
    monthly_rent: Decimal,
    currency: Currency,
    start: &str,
    end: Option<&str>,
) -> ContractRecord {
    ContractRecord {
        id: ContractId(id.to_string()),
        property_id: pid(property_id),
        tenant: tenant(&format!("Chirias {id}")),
        monthly_rent: Some(monthly_rent),
        currency,
        payment_frequency: PaymentFrequency::Monthly,
        start_date: Some(start.to_string()),
        end_date: end.map(str::to_string),
        document_ref: None,
        deposit: None,
    }
}

pub(super) fn new_contract(property_id: &str, monthly_rent: Decimal, start: NaiveDate) -> NewContract {
    NewContract {
        property_id: pid(property_id),
        tenant: tenant("Ion Popescu"),
        monthly_rent,
        currency: Currency::Ron,
        payment_frequency: PaymentFrequency::Monthly,
        start_date: start,
        end_date: None,
        document_ref: Some("contract-2025-01.pdf".to_string()),
        deposit: Some(dec!(2000)),
    }
}

/// `prop-co` held 60/40 by owner-a and owner-b with one 1000 RON lease over 2025,
/// plus `prop-solo` held entirely by owner-a and not rented out.
pub(super) fn co_owned_portfolio() -> PortfolioSnapshot {
    PortfolioSnapshot {
        properties: vec![
            property(CO_OWNED, "Apartament Centru"),
            property(SOLO, "Garsoniera Marasti"),
        ],
        ownerships: vec![
            share(CO_OWNED, OWNER_A, dec!(60)),
            share(CO_OWNED, OWNER_B, dec!(40)),
            share(SOLO, OWNER_A, dec!(100)),
        ],
        contracts: vec![contract_record(
            "ctr-co",
            CO_OWNED,
            dec!(1000),
            Currency::Ron,
            "2025-01-01",
            Some("2025-12-31"),
        )],
    }
}

pub(super) fn repository(snapshot: PortfolioSnapshot) -> Arc<InMemoryPortfolioRepository> {
    Arc::new(InMemoryPortfolioRepository::from_snapshot(snapshot))
}

pub(super) fn allocator(
    snapshot: PortfolioSnapshot,
) -> (
    OwnershipAllocator<InMemoryPortfolioRepository>,
    Arc<InMemoryPortfolioRepository>,
) {
    let repository = repository(snapshot);
    (OwnershipAllocator::new(repository.clone()), repository)
}

pub(super) fn build_service(
    snapshot: PortfolioSnapshot,
) -> (
    FiscalSummaryService<InMemoryPortfolioRepository>,
    Arc<InMemoryPortfolioRepository>,
) {
    let repository = repository(snapshot);
    let service = FiscalSummaryService::new(repository.clone(), &FiscalConfig::default())
        .expect("default config is valid");
    (service, repository)
}

pub(super) fn router_with(snapshot: PortfolioSnapshot) -> axum::Router {
    let (service, _) = build_service(snapshot);
    fiscal_router(Arc::new(service))
}

/// Delegates to the in-memory store but refuses to write ownership rows.
#[derive(Default)]
pub(super) struct RejectingOwnershipRepository {
    pub(super) inner: InMemoryPortfolioRepository,
}

impl PortfolioRepository for RejectingOwnershipRepository {
    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        self.inner.fetch_property(id)
    }

    fn fetch_property_ownerships(
        &self,
        property_id: &PropertyId,
    ) -> Result<Vec<PropertyOwnership>, RepositoryError> {
        self.inner.fetch_property_ownerships(property_id)
    }

    fn fetch_contracts(
        &self,
        filter: &ContractFilter,
    ) -> Result<Vec<ContractRecord>, RepositoryError> {
        self.inner.fetch_contracts(filter)
    }

    fn fetch_contract(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        self.inner.fetch_contract(id)
    }

    fn create_property(&self, fields: NewProperty) -> Result<PropertyId, RepositoryError> {
        self.inner.create_property(fields)
    }

    fn delete_property(&self, id: &PropertyId) -> Result<(), RepositoryError> {
        self.inner.delete_property(id)
    }

    fn create_ownership_rows(&self, _rows: Vec<PropertyOwnership>) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("ownership table locked".to_string()))
    }

    fn update_ownership_percent(
        &self,
        property_id: &PropertyId,
        owner_id: &OwnerId,
        percent: Decimal,
    ) -> Result<(), RepositoryError> {
        self.inner
            .update_ownership_percent(property_id, owner_id, percent)
    }

    fn delete_ownership_row(
        &self,
        property_id: &PropertyId,
        owner_id: &OwnerId,
    ) -> Result<(), RepositoryError> {
        self.inner.delete_ownership_row(property_id, owner_id)
    }

    fn insert_contract(&self, contract: NewContract) -> Result<ContractRecord, RepositoryError> {
        self.inner.insert_contract(contract)
    }

    fn delete_contract(&self, id: &ContractId) -> Result<(), RepositoryError> {
        self.inner.delete_contract(id)
    }
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("record store offline".to_string()))
}

impl PortfolioRepository for UnavailableRepository {
    fn fetch_property(&self, _id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        offline()
    }

    fn fetch_property_ownerships(
        &self,
        _property_id: &PropertyId,
    ) -> Result<Vec<PropertyOwnership>, RepositoryError> {
        offline()
    }

    fn fetch_contracts(
        &self,
        _filter: &ContractFilter,
    ) -> Result<Vec<ContractRecord>, RepositoryError> {
        offline()
    }

    fn fetch_contract(&self, _id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        offline()
    }

    fn create_property(&self, _fields: NewProperty) -> Result<PropertyId, RepositoryError> {
        offline()
    }

    fn delete_property(&self, _id: &PropertyId) -> Result<(), RepositoryError> {
        offline()
    }

    fn create_ownership_rows(&self, _rows: Vec<PropertyOwnership>) -> Result<(), RepositoryError> {
        offline()
    }

    fn update_ownership_percent(
        &self,
        _property_id: &PropertyId,
        _owner_id: &OwnerId,
        _percent: Decimal,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn delete_ownership_row(
        &self,
        _property_id: &PropertyId,
        _owner_id: &OwnerId,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn insert_contract(&self, _contract: NewContract) -> Result<ContractRecord, RepositoryError> {
        offline()
    }

    fn delete_contract(&self, _id: &ContractId) -> Result<(), RepositoryError> {
        offline()
    }
}

pub(super) fn request_as(
    method: &str,
    uri: &str,
    ctx: &AccessContext,
    body: Option<Value>,
) -> Request<Body> {
    let role = if ctx.is_admin() { "admin" } else { "owner" };
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, ctx.user_id.0.as_str())
        .header(USER_ROLE_HEADER, role);
    match body {
        Some(json) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).expect("serialize body")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Decimal fields travel as JSON strings.
pub(super) fn decimal_at(payload: &Value, pointer: &str) -> Decimal {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("no decimal string at {pointer} in {payload}"))
        .parse()
        .expect("decimal")
}
