use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    ContractId, ContractRecord, NewContract, NewProperty, OwnerId, Property, PropertyId,
    PropertyOwnership,
};

/// Selects contracts by owner share and/or property. Empty filter means everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFilter {
    pub owner_id: Option<OwnerId>,
    pub property_id: Option<PropertyId>,
}

impl ContractFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id: Some(owner_id),
            property_id: None,
        }
    }

    pub fn for_property(property_id: PropertyId) -> Self {
        Self {
            owner_id: None,
            property_id: Some(property_id),
        }
    }
}

/// Storage abstraction over the hosted record store so the engine can be exercised in isolation.
///
/// Implementations are expected to serve fresh data on every call; the engine never caches
/// across calls.
pub trait PortfolioRepository: Send + Sync {
    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
    fn fetch_property_ownerships(
        &self,
        property_id: &PropertyId,
    ) -> Result<Vec<PropertyOwnership>, RepositoryError>;
    fn fetch_contracts(&self, filter: &ContractFilter)
        -> Result<Vec<ContractRecord>, RepositoryError>;
    fn fetch_contract(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError>;
    fn create_property(&self, fields: NewProperty) -> Result<PropertyId, RepositoryError>;
    /// Removes the property together with its ownership rows.
    fn delete_property(&self, id: &PropertyId) -> Result<(), RepositoryError>;
    fn create_ownership_rows(&self, rows: Vec<PropertyOwnership>) -> Result<(), RepositoryError>;
    fn update_ownership_percent(
        &self,
        property_id: &PropertyId,
        owner_id: &OwnerId,
        percent: Decimal,
    ) -> Result<(), RepositoryError>;
    fn delete_ownership_row(
        &self,
        property_id: &PropertyId,
        owner_id: &OwnerId,
    ) -> Result<(), RepositoryError>;
    fn insert_contract(&self, contract: NewContract) -> Result<ContractRecord, RepositoryError>;
    fn delete_contract(&self, id: &ContractId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
