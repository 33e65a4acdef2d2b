use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    AccessContext, NewProperty, OwnerId, Property, PropertyId, PropertyOwnership, FULL_OWNERSHIP,
};
use super::error::{EntityRef, FiscalError};
use super::repository::{ContractFilter, PortfolioRepository, RepositoryError};

/// Rounding slack accepted when co-owner shares are checked against 100%.
pub const SHARE_SUM_TOLERANCE: Decimal = dec!(0.01);

/// One owner's percentage of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerShare {
    pub owner_id: OwnerId,
    pub percent: Decimal,
}

impl From<PropertyOwnership> for OwnerShare {
    fn from(row: PropertyOwnership) -> Self {
        Self {
            owner_id: row.owner_id,
            percent: row.percent,
        }
    }
}

/// Soft findings about a property's share total. The change they accompany was still applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnershipWarning {
    OverAllocated { property_id: PropertyId, total: Decimal },
    UnderAllocated { property_id: PropertyId, total: Decimal },
}

impl OwnershipWarning {
    /// Warning for a total that is off 100% by more than the tolerance, if any.
    pub fn for_total(property_id: &PropertyId, total: Decimal) -> Option<Self> {
        if total - FULL_OWNERSHIP > SHARE_SUM_TOLERANCE {
            Some(Self::OverAllocated {
                property_id: property_id.clone(),
                total,
            })
        } else if FULL_OWNERSHIP - total > SHARE_SUM_TOLERANCE {
            Some(Self::UnderAllocated {
                property_id: property_id.clone(),
                total,
            })
        } else {
            None
        }
    }
}

impl fmt::Display for OwnershipWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipWarning::OverAllocated { property_id, total } => write!(
                f,
                "ownership shares of property {property_id} total {total}%, above 100%"
            ),
            OwnershipWarning::UnderAllocated { property_id, total } => write!(
                f,
                "ownership shares of property {property_id} total {total}%, below 100%"
            ),
        }
    }
}

/// State of a property's ownership after a successful change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipChange {
    pub property_id: PropertyId,
    pub owners: Vec<OwnerShare>,
    pub total_percent: Decimal,
    pub warnings: Vec<OwnershipWarning>,
}

impl OwnershipChange {
    fn from_owners(property_id: PropertyId, owners: Vec<OwnerShare>) -> Self {
        let total_percent = sum_shares(&owners);
        let warnings = OwnershipWarning::for_total(&property_id, total_percent)
            .into_iter()
            .collect();
        Self {
            property_id,
            owners,
            total_percent,
            warnings,
        }
    }
}

pub fn sum_shares(owners: &[OwnerShare]) -> Decimal {
    owners.iter().map(|share| share.percent).sum()
}

/// Resolves and mutates the owners of a property.
///
/// Single-owner and co-ownership creation both end up as plain ownership rows; only
/// co-ownership creation insists on an exact 100% split up front.
pub struct OwnershipAllocator<R> {
    repository: Arc<R>,
}

impl<R> OwnershipAllocator<R>
where
    R: PortfolioRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Owners and shares of a property. Empty means the property is unallocated.
    pub fn get_owners(&self, property_id: &PropertyId) -> Result<Vec<OwnerShare>, FiscalError> {
        self.property_with_owners(property_id)
            .map(|(_, owners)| owners)
    }

    pub fn total_percentage(&self, property_id: &PropertyId) -> Result<Decimal, FiscalError> {
        self.get_owners(property_id)
            .map(|owners| sum_shares(&owners))
    }

    pub fn property_with_owners(
        &self,
        property_id: &PropertyId,
    ) -> Result<(Property, Vec<OwnerShare>), FiscalError> {
        let property = self.require_property(property_id)?;
        let owners = self
            .repository
            .fetch_property_ownerships(property_id)?
            .into_iter()
            .map(OwnerShare::from)
            .collect();
        Ok((property, owners))
    }

    pub fn can_edit_property(
        &self,
        ctx: &AccessContext,
        property_id: &PropertyId,
    ) -> Result<bool, FiscalError> {
        let owners = self.get_owners(property_id)?;
        Ok(is_editor(ctx, &owners))
    }

    /// Fails with `AccessDenied` unless the caller is an admin or holds a share.
    pub fn require_editor(
        &self,
        ctx: &AccessContext,
        property_id: &PropertyId,
    ) -> Result<(), FiscalError> {
        let owners = self.get_owners(property_id)?;
        self.require_editor_among(ctx, property_id, &owners)
    }

    /// Add a co-owner. A total above 100% is written anyway and reported as a warning.
    pub fn add_owner(
        &self,
        ctx: &AccessContext,
        property_id: &PropertyId,
        owner_id: &OwnerId,
        percent: Decimal,
    ) -> Result<OwnershipChange, FiscalError> {
        validate_percent(property_id, owner_id, percent)?;
        let mut owners = self.get_owners(property_id)?;
        self.require_editor_among(ctx, property_id, &owners)?;

        if owners.iter().any(|share| &share.owner_id == owner_id) {
            return Err(FiscalError::validation(
                ownership_ref(property_id, owner_id),
                "owner already holds a share in this property",
            ));
        }

        self.repository
            .create_ownership_rows(vec![PropertyOwnership {
                property_id: property_id.clone(),
                owner_id: owner_id.clone(),
                percent,
            }])
            .map_err(|err| conflict_as_duplicate(err, property_id, owner_id))?;

        owners.push(OwnerShare {
            owner_id: owner_id.clone(),
            percent,
        });
        let change = OwnershipChange::from_owners(property_id.clone(), owners);
        info!(property = %property_id, owner = %owner_id, %percent, "co-owner added");
        log_warnings(&change.warnings);
        Ok(change)
    }

    /// Change an existing owner's share; same soft policy as [`Self::add_owner`].
    pub fn update_owner_percent(
        &self,
        ctx: &AccessContext,
        property_id: &PropertyId,
        owner_id: &OwnerId,
        percent: Decimal,
    ) -> Result<OwnershipChange, FiscalError> {
        validate_percent(property_id, owner_id, percent)?;
        let mut owners = self.get_owners(property_id)?;
        self.require_editor_among(ctx, property_id, &owners)?;

        let share = owners
            .iter_mut()
            .find(|share| &share.owner_id == owner_id)
            .ok_or_else(|| FiscalError::not_found(ownership_ref(property_id, owner_id)))?;

        self.repository
            .update_ownership_percent(property_id, owner_id, percent)?;
        share.percent = percent;

        let change = OwnershipChange::from_owners(property_id.clone(), owners);
        info!(property = %property_id, owner = %owner_id, %percent, "ownership share updated");
        log_warnings(&change.warnings);
        Ok(change)
    }

    /// Remove a co-owner. The last owner can never be removed.
    pub fn remove_owner(
        &self,
        ctx: &AccessContext,
        property_id: &PropertyId,
        owner_id: &OwnerId,
    ) -> Result<OwnershipChange, FiscalError> {
        let owners = self.get_owners(property_id)?;
        self.require_editor_among(ctx, property_id, &owners)?;

        if !owners.iter().any(|share| &share.owner_id == owner_id) {
            return Err(FiscalError::not_found(ownership_ref(property_id, owner_id)));
        }
        if owners.len() <= 1 {
            return Err(FiscalError::invariant(
                EntityRef::Property(property_id.clone()),
                "cannot remove the last owner of a property",
            ));
        }

        self.repository.delete_ownership_row(property_id, owner_id)?;

        let remaining = owners
            .into_iter()
            .filter(|share| &share.owner_id != owner_id)
            .collect();
        let change = OwnershipChange::from_owners(property_id.clone(), remaining);
        info!(property = %property_id, owner = %owner_id, "co-owner removed");
        log_warnings(&change.warnings);
        Ok(change)
    }

    /// Register a property held entirely by the caller.
    pub fn create_property(
        &self,
        ctx: &AccessContext,
        fields: NewProperty,
    ) -> Result<PropertyId, FiscalError> {
        self.create_co_owned_property(
            ctx,
            fields,
            vec![OwnerShare {
                owner_id: ctx.user_id.clone(),
                percent: FULL_OWNERSHIP,
            }],
        )
    }

    /// Register a property with several owners whose shares must add up to 100%.
    ///
    /// Nothing is written when validation fails. If the ownership rows cannot be stored the
    /// freshly created property row is removed again.
    pub fn create_co_owned_property(
        &self,
        ctx: &AccessContext,
        fields: NewProperty,
        shares: Vec<OwnerShare>,
    ) -> Result<PropertyId, FiscalError> {
        validate_property_fields(&fields)?;
        validate_initial_shares(&shares)?;

        let property_id = self.repository.create_property(fields)?;
        let rows = shares
            .iter()
            .map(|share| PropertyOwnership {
                property_id: property_id.clone(),
                owner_id: share.owner_id.clone(),
                percent: share.percent,
            })
            .collect();

        if let Err(err) = self.repository.create_ownership_rows(rows) {
            warn!(property = %property_id, error = %err, "ownership rows failed, rolling back property");
            if let Err(rollback) = self.repository.delete_property(&property_id) {
                warn!(property = %property_id, error = %rollback, "rollback of property row failed");
            }
            return Err(err.into());
        }

        info!(
            property = %property_id,
            owners = shares.len(),
            created_by = %ctx.user_id,
            "property registered"
        );
        Ok(property_id)
    }

    /// Delete a property and its ownership rows. Contracts must be removed first.
    pub fn delete_property(
        &self,
        ctx: &AccessContext,
        property_id: &PropertyId,
    ) -> Result<(), FiscalError> {
        self.require_editor(ctx, property_id)?;

        let contracts = self
            .repository
            .fetch_contracts(&ContractFilter::for_property(property_id.clone()))?;
        if !contracts.is_empty() {
            return Err(FiscalError::invariant(
                EntityRef::Property(property_id.clone()),
                format!("property still has {} contract(s)", contracts.len()),
            ));
        }

        self.repository.delete_property(property_id)?;
        info!(property = %property_id, deleted_by = %ctx.user_id, "property deleted");
        Ok(())
    }

    fn require_property(&self, property_id: &PropertyId) -> Result<Property, FiscalError> {
        self.repository
            .fetch_property(property_id)?
            .ok_or_else(|| FiscalError::not_found(EntityRef::Property(property_id.clone())))
    }

    pub(crate) fn require_editor_among(
        &self,
        ctx: &AccessContext,
        property_id: &PropertyId,
        owners: &[OwnerShare],
    ) -> Result<(), FiscalError> {
        if is_editor(ctx, owners) {
            Ok(())
        } else {
            Err(FiscalError::AccessDenied {
                user: ctx.user_id.clone(),
                entity: EntityRef::Property(property_id.clone()),
            })
        }
    }
}

fn is_editor(ctx: &AccessContext, owners: &[OwnerShare]) -> bool {
    ctx.is_admin() || owners.iter().any(|share| share.owner_id == ctx.user_id)
}

fn ownership_ref(property_id: &PropertyId, owner_id: &OwnerId) -> EntityRef {
    EntityRef::Ownership {
        property_id: property_id.clone(),
        owner_id: owner_id.clone(),
    }
}

fn validate_percent(
    property_id: &PropertyId,
    owner_id: &OwnerId,
    percent: Decimal,
) -> Result<(), FiscalError> {
    if percent <= Decimal::ZERO || percent > FULL_OWNERSHIP {
        return Err(FiscalError::validation(
            ownership_ref(property_id, owner_id),
            format!("share {percent}% is outside (0, 100]"),
        ));
    }
    Ok(())
}

fn validate_property_fields(fields: &NewProperty) -> Result<(), FiscalError> {
    if fields.name.trim().is_empty() {
        return Err(FiscalError::validation(
            EntityRef::Input("property.name"),
            "property name is required",
        ));
    }
    if fields.address.locality.trim().is_empty() || fields.address.county.trim().is_empty() {
        return Err(FiscalError::validation(
            EntityRef::Input("property.address"),
            "locality and county are required",
        ));
    }
    Ok(())
}

fn validate_initial_shares(shares: &[OwnerShare]) -> Result<(), FiscalError> {
    if shares.is_empty() {
        return Err(FiscalError::validation(
            EntityRef::Input("owners"),
            "a property needs at least one owner",
        ));
    }

    let mut seen = BTreeSet::new();
    for share in shares {
        if !seen.insert(&share.owner_id) {
            return Err(FiscalError::validation(
                EntityRef::Owner(share.owner_id.clone()),
                "owner listed more than once",
            ));
        }
        if share.percent <= Decimal::ZERO || share.percent > FULL_OWNERSHIP {
            return Err(FiscalError::validation(
                EntityRef::Owner(share.owner_id.clone()),
                format!("share {}% is outside (0, 100]", share.percent),
            ));
        }
    }

    let total = sum_shares(shares);
    if (total - FULL_OWNERSHIP).abs() > SHARE_SUM_TOLERANCE {
        return Err(FiscalError::validation(
            EntityRef::Input("owners"),
            format!("shares must sum to 100% (currently {total}%)"),
        ));
    }
    Ok(())
}

fn conflict_as_duplicate(
    err: RepositoryError,
    property_id: &PropertyId,
    owner_id: &OwnerId,
) -> FiscalError {
    match err {
        RepositoryError::Conflict => FiscalError::validation(
            ownership_ref(property_id, owner_id),
            "owner already holds a share in this property",
        ),
        other => other.into(),
    }
}

fn log_warnings(warnings: &[OwnershipWarning]) {
    for warning in warnings {
        warn!(%warning, "ownership total out of balance");
    }
}
