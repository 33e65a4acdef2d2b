use std::fmt;

use serde::Serialize;

use super::domain::{ContractId, OwnerId, PropertyId};
use super::repository::RepositoryError;

/// Record or input an error is attributed to, so callers can point at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Property(PropertyId),
    Contract(ContractId),
    Owner(OwnerId),
    Ownership {
        property_id: PropertyId,
        owner_id: OwnerId,
    },
    Portfolio,
    FiscalYear(i32),
    /// A scalar argument of a pure calculation, e.g. `gross_income`.
    Input(&'static str),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Property(id) => write!(f, "property {id}"),
            EntityRef::Contract(id) => write!(f, "contract {id}"),
            EntityRef::Owner(id) => write!(f, "owner {id}"),
            EntityRef::Ownership {
                property_id,
                owner_id,
            } => write!(f, "share of owner {owner_id} in property {property_id}"),
            EntityRef::Portfolio => write!(f, "portfolio of all owners"),
            EntityRef::FiscalYear(year) => write!(f, "fiscal year {year}"),
            EntityRef::Input(name) => write!(f, "input {name}"),
        }
    }
}

/// Failures raised by the fiscal engine. Every variant names the entity at fault.
#[derive(Debug, thiserror::Error)]
pub enum FiscalError {
    #[error("invalid {entity}: {reason}")]
    Validation { entity: EntityRef, reason: String },
    #[error("incomplete record for {entity}: {reason}")]
    Data { entity: EntityRef, reason: String },
    #[error("rejected change to {entity}: {reason}")]
    Invariant { entity: EntityRef, reason: String },
    #[error("{entity} not found")]
    NotFound { entity: EntityRef },
    #[error("user {user} may not access {entity}")]
    AccessDenied { user: OwnerId, entity: EntityRef },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl FiscalError {
    pub fn validation(entity: EntityRef, reason: impl Into<String>) -> Self {
        Self::Validation {
            entity,
            reason: reason.into(),
        }
    }

    pub fn data(entity: EntityRef, reason: impl Into<String>) -> Self {
        Self::Data {
            entity,
            reason: reason.into(),
        }
    }

    pub fn invariant(entity: EntityRef, reason: impl Into<String>) -> Self {
        Self::Invariant {
            entity,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: EntityRef) -> Self {
        Self::NotFound { entity }
    }

    pub fn entity(&self) -> Option<&EntityRef> {
        match self {
            FiscalError::Validation { entity, .. }
            | FiscalError::Data { entity, .. }
            | FiscalError::Invariant { entity, .. }
            | FiscalError::NotFound { entity }
            | FiscalError::AccessDenied { entity, .. } => Some(entity),
            FiscalError::Repository(_) => None,
        }
    }

    /// Stable machine-readable tag used in API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            FiscalError::Validation { .. } => "validation",
            FiscalError::Data { .. } => "data",
            FiscalError::Invariant { .. } => "invariant",
            FiscalError::NotFound { .. } => "not_found",
            FiscalError::AccessDenied { .. } => "access_denied",
            FiscalError::Repository(_) => "repository",
        }
    }
}
