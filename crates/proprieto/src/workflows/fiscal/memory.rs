use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    ContractId, ContractRecord, NewContract, NewProperty, OwnerId, Property, PropertyId,
    PropertyOwnership, FULL_OWNERSHIP,
};
use super::repository::{ContractFilter, PortfolioRepository, RepositoryError};

/// Serializable dump of a portfolio, used to seed the in-memory store from JSON files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub ownerships: Vec<PropertyOwnership>,
    #[serde(default)]
    pub contracts: Vec<ContractRecord>,
}

#[derive(Debug, Default)]
struct PortfolioState {
    properties: BTreeMap<PropertyId, Property>,
    ownerships: Vec<PropertyOwnership>,
    contracts: BTreeMap<ContractId, ContractRecord>,
    property_sequence: u64,
    contract_sequence: u64,
}

impl PortfolioState {
    fn next_property_id(&mut self) -> PropertyId {
        loop {
            self.property_sequence += 1;
            let id = PropertyId(format!("prop-{:06}", self.property_sequence));
            if !self.properties.contains_key(&id) {
                return id;
            }
        }
    }

    fn next_contract_id(&mut self) -> ContractId {
        loop {
            self.contract_sequence += 1;
            let id = ContractId(format!("ctr-{:06}", self.contract_sequence));
            if !self.contracts.contains_key(&id) {
                return id;
            }
        }
    }

    fn owns(&self, owner_id: &OwnerId, property_id: &PropertyId) -> bool {
        self.ownerships
            .iter()
            .any(|row| &row.owner_id == owner_id && &row.property_id == property_id)
    }
}

/// Process-local record store. Rows are kept ordered by identifier so reads are deterministic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPortfolioRepository {
    state: Arc<Mutex<PortfolioState>>,
}

impl InMemoryPortfolioRepository {
    pub fn from_snapshot(snapshot: PortfolioSnapshot) -> Self {
        let repository = Self::default();
        if let Ok(mut state) = repository.state.lock() {
            state.properties = snapshot
                .properties
                .into_iter()
                .map(|property| (property.id.clone(), property))
                .collect();
            state.ownerships = snapshot.ownerships;
            state.contracts = snapshot
                .contracts
                .into_iter()
                .map(|contract| (contract.id.clone(), contract))
                .collect();
        }
        repository
    }

    pub fn snapshot(&self) -> Result<PortfolioSnapshot, RepositoryError> {
        let state = self.lock()?;
        Ok(PortfolioSnapshot {
            properties: state.properties.values().cloned().collect(),
            ownerships: state.ownerships.clone(),
            contracts: state.contracts.values().cloned().collect(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, PortfolioState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("portfolio store poisoned".to_string()))
    }
}

impl PortfolioRepository for InMemoryPortfolioRepository {
    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.lock()?.properties.get(id).cloned())
    }

    fn fetch_property_ownerships(
        &self,
        property_id: &PropertyId,
    ) -> Result<Vec<PropertyOwnership>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .ownerships
            .iter()
            .filter(|row| &row.property_id == property_id)
            .cloned()
            .collect())
    }

    fn fetch_contracts(
        &self,
        filter: &ContractFilter,
    ) -> Result<Vec<ContractRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .contracts
            .values()
            .filter(|contract| {
                filter
                    .property_id
                    .as_ref()
                    .map_or(true, |property_id| &contract.property_id == property_id)
            })
            .filter(|contract| {
                filter
                    .owner_id
                    .as_ref()
                    .map_or(true, |owner_id| state.owns(owner_id, &contract.property_id))
            })
            .cloned()
            .collect())
    }

    fn fetch_contract(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        Ok(self.lock()?.contracts.get(id).cloned())
    }

    fn create_property(&self, fields: NewProperty) -> Result<PropertyId, RepositoryError> {
        let mut state = self.lock()?;
        let id = state.next_property_id();
        state.properties.insert(
            id.clone(),
            Property {
                id: id.clone(),
                name: fields.name,
                address: fields.address,
                rooms: fields.rooms,
                declared_ownership_total: FULL_OWNERSHIP,
            },
        );
        Ok(id)
    }

    fn delete_property(&self, id: &PropertyId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.properties.remove(id).ok_or(RepositoryError::NotFound)?;
        state.ownerships.retain(|row| &row.property_id != id);
        Ok(())
    }

    fn create_ownership_rows(&self, rows: Vec<PropertyOwnership>) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if rows.iter().any(|row| !state.properties.contains_key(&row.property_id)) {
            return Err(RepositoryError::NotFound);
        }
        if rows
            .iter()
            .any(|row| state.owns(&row.owner_id, &row.property_id))
        {
            return Err(RepositoryError::Conflict);
        }
        state.ownerships.extend(rows);
        Ok(())
    }

    fn update_ownership_percent(
        &self,
        property_id: &PropertyId,
        owner_id: &OwnerId,
        percent: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let row = state
            .ownerships
            .iter_mut()
            .find(|row| &row.property_id == property_id && &row.owner_id == owner_id)
            .ok_or(RepositoryError::NotFound)?;
        row.percent = percent;
        Ok(())
    }

    fn delete_ownership_row(
        &self,
        property_id: &PropertyId,
        owner_id: &OwnerId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let before = state.ownerships.len();
        state
            .ownerships
            .retain(|row| !(&row.property_id == property_id && &row.owner_id == owner_id));
        if state.ownerships.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn insert_contract(&self, contract: NewContract) -> Result<ContractRecord, RepositoryError> {
        let mut state = self.lock()?;
        if !state.properties.contains_key(&contract.property_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = state.next_contract_id();
        let record = ContractRecord::from_new(id.clone(), contract);
        state.contracts.insert(id, record.clone());
        Ok(record)
    }

    fn delete_contract(&self, id: &ContractId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state
            .contracts
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}
