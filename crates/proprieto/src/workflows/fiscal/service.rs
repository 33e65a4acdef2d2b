use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::aggregator::{aggregate, AggregationWarning, ContractIncome};
use super::calculator::{FiscalCalculator, FiscalResult};
use super::domain::{
    AccessContext, ContractId, ContractRecord, FiscalYearWindow, NewContract, OwnerId,
    SummaryScope,
};
use super::error::{EntityRef, FiscalError};
use super::ownership::{sum_shares, OwnershipAllocator, OwnershipWarning};
use super::repository::{ContractFilter, PortfolioRepository, RepositoryError};
use crate::config::FiscalConfig;

/// Everything the dashboard and the D212 export need for one scope and year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiscalSummary {
    pub fiscal_year: i32,
    pub scope: SummaryScope,
    pub exchange_rate: Decimal,
    pub result: FiscalResult,
    pub breakdown: Vec<ContractIncome>,
    pub owner_totals: BTreeMap<OwnerId, Decimal>,
    pub warnings: Vec<AggregationWarning>,
}

/// Stored contract plus any soft findings about the property it was registered on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractRegistration {
    pub contract: ContractRecord,
    pub warnings: Vec<OwnershipWarning>,
}

/// Service composing the ownership allocator, income aggregation and the fiscal calculator.
pub struct FiscalSummaryService<R> {
    repository: Arc<R>,
    allocator: OwnershipAllocator<R>,
    calculator: FiscalCalculator,
    default_fiscal_year: i32,
}

impl<R> FiscalSummaryService<R>
where
    R: PortfolioRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: &FiscalConfig) -> Result<Self, FiscalError> {
        let calculator = FiscalCalculator::from_config(config)?;
        Ok(Self {
            allocator: OwnershipAllocator::new(repository.clone()),
            repository,
            calculator,
            default_fiscal_year: config.default_fiscal_year,
        })
    }

    pub fn allocator(&self) -> &OwnershipAllocator<R> {
        &self.allocator
    }

    pub fn calculator(&self) -> &FiscalCalculator {
        &self.calculator
    }

    pub fn default_fiscal_year(&self) -> i32 {
        self.default_fiscal_year
    }

    /// Allocation lookup, normalization, aggregation and tax calculation in one pass.
    ///
    /// Data is fetched fresh on every call, so identical inputs over unchanged data give
    /// identical summaries.
    pub fn compute_fiscal_summary(
        &self,
        ctx: &AccessContext,
        scope: SummaryScope,
        fiscal_year: i32,
        exchange_rate: Decimal,
    ) -> Result<FiscalSummary, FiscalError> {
        authorize_scope(ctx, &scope)?;
        let window = FiscalYearWindow::new(fiscal_year)?;
        if exchange_rate <= Decimal::ZERO {
            return Err(FiscalError::validation(
                EntityRef::Input("exchange_rate"),
                format!("exchange rate must be positive, got {exchange_rate}"),
            ));
        }

        let contracts = self.repository.fetch_contracts(&filter_for(&scope))?;
        let aggregation = aggregate(&self.allocator, &contracts, window, exchange_rate, &scope)?;
        for warning in &aggregation.warnings {
            warn!(entity = %warning.entity, excluded = warning.excluded, "{}", warning.message);
        }

        let result = self.calculator.calculate(aggregation.total_gross)?;
        info!(
            fiscal_year,
            contracts = contracts.len(),
            lines = aggregation.breakdown.len(),
            gross = %result.gross_income,
            tier = result.cass_tier.level(),
            "fiscal summary computed"
        );

        Ok(FiscalSummary {
            fiscal_year,
            scope,
            exchange_rate,
            result,
            breakdown: aggregation.breakdown,
            owner_totals: aggregation.owner_totals,
            warnings: aggregation.warnings,
        })
    }

    pub fn list_contracts(
        &self,
        ctx: &AccessContext,
        scope: &SummaryScope,
    ) -> Result<Vec<ContractRecord>, FiscalError> {
        authorize_scope(ctx, scope)?;
        Ok(self.repository.fetch_contracts(&filter_for(scope))?)
    }

    /// Store a new lease. Ownership that does not add up to 100% is reported, not blocked.
    pub fn register_contract(
        &self,
        ctx: &AccessContext,
        contract: NewContract,
    ) -> Result<ContractRegistration, FiscalError> {
        validate_new_contract(&contract)?;
        let owners = self.allocator.get_owners(&contract.property_id)?;
        self.allocator
            .require_editor_among(ctx, &contract.property_id, &owners)?;

        let warnings: Vec<_> = OwnershipWarning::for_total(&contract.property_id, sum_shares(&owners))
            .into_iter()
            .collect();
        for warning in &warnings {
            warn!(%warning, "contract registered on unbalanced property");
        }

        let stored = self.repository.insert_contract(contract)?;
        info!(contract = %stored.id, property = %stored.property_id, "contract registered");
        Ok(ContractRegistration {
            contract: stored,
            warnings,
        })
    }

    pub fn delete_contract(
        &self,
        ctx: &AccessContext,
        contract_id: &ContractId,
    ) -> Result<(), FiscalError> {
        let contract = self
            .repository
            .fetch_contract(contract_id)?
            .ok_or_else(|| FiscalError::not_found(EntityRef::Contract(contract_id.clone())))?;
        self.allocator.require_editor(ctx, &contract.property_id)?;

        self.repository
            .delete_contract(contract_id)
            .map_err(|err| match err {
                RepositoryError::NotFound => {
                    FiscalError::not_found(EntityRef::Contract(contract_id.clone()))
                }
                other => other.into(),
            })?;
        info!(contract = %contract_id, deleted_by = %ctx.user_id, "contract deleted");
        Ok(())
    }
}

fn filter_for(scope: &SummaryScope) -> ContractFilter {
    match scope {
        SummaryScope::AllContracts => ContractFilter::all(),
        SummaryScope::Owner(owner_id) => ContractFilter::for_owner(owner_id.clone()),
    }
}

/// Owners see their own portfolio; only admins see other owners' or everyone's.
fn authorize_scope(ctx: &AccessContext, scope: &SummaryScope) -> Result<(), FiscalError> {
    if ctx.is_admin() {
        return Ok(());
    }
    match scope {
        SummaryScope::Owner(owner_id) if owner_id == &ctx.user_id => Ok(()),
        SummaryScope::Owner(owner_id) => Err(FiscalError::AccessDenied {
            user: ctx.user_id.clone(),
            entity: EntityRef::Owner(owner_id.clone()),
        }),
        SummaryScope::AllContracts => Err(FiscalError::AccessDenied {
            user: ctx.user_id.clone(),
            entity: EntityRef::Portfolio,
        }),
    }
}

fn validate_new_contract(contract: &NewContract) -> Result<(), FiscalError> {
    if contract.tenant.name.trim().is_empty() {
        return Err(FiscalError::validation(
            EntityRef::Input("tenant.name"),
            "tenant name is required",
        ));
    }
    if contract.monthly_rent < Decimal::ZERO {
        return Err(FiscalError::validation(
            EntityRef::Input("monthly_rent"),
            format!("monthly rent cannot be negative, got {}", contract.monthly_rent),
        ));
    }
    if let Some(end_date) = contract.end_date {
        if end_date < contract.start_date {
            return Err(FiscalError::validation(
                EntityRef::Input("end_date"),
                format!(
                    "end date {end_date} cannot precede start date {}",
                    contract.start_date
                ),
            ));
        }
    }
    Ok(())
}
