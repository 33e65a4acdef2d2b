use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{
    ContractId, ContractRecord, Currency, FiscalYearWindow, OwnerId, PaymentFrequency,
    PropertyId, SummaryScope,
};
use super::error::{EntityRef, FiscalError};
use super::normalizer::NormalizedContract;
use super::ownership::{sum_shares, OwnershipAllocator, OwnershipWarning};
use super::repository::PortfolioRepository;

/// Income one contract contributes to one owner for the fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractIncome {
    pub contract_id: ContractId,
    pub property_id: PropertyId,
    pub property_name: String,
    pub property_address: String,
    pub tenant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_tax_id: Option<String>,
    pub owner_id: OwnerId,
    pub share_percent: Decimal,
    pub currency: Currency,
    pub payment_frequency: PaymentFrequency,
    pub monthly_rent: Decimal,
    pub active_months: u32,
    pub gross_income: Decimal,
}

/// Problem with one contract or property that did not stop the aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationWarning {
    pub entity: EntityRef,
    pub message: String,
    /// Whether the entity's income was left out of the totals.
    pub excluded: bool,
}

impl AggregationWarning {
    fn excluded(entity: EntityRef, message: impl Into<String>) -> Self {
        Self {
            entity,
            message: message.into(),
            excluded: true,
        }
    }

    fn from_error(err: FiscalError) -> Self {
        let entity = err.entity().cloned().unwrap_or(EntityRef::Portfolio);
        Self::excluded(entity, err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortfolioAggregation {
    pub total_gross: Decimal,
    pub breakdown: Vec<ContractIncome>,
    pub owner_totals: BTreeMap<OwnerId, Decimal>,
    pub warnings: Vec<AggregationWarning>,
}

impl PortfolioAggregation {
    /// Add every share line of one contract, or none of them if a total would overflow.
    fn push_contract(
        &mut self,
        contract_id: &ContractId,
        lines: Vec<ContractIncome>,
    ) -> Result<(), FiscalError> {
        let overflow = || {
            FiscalError::data(
                EntityRef::Contract(contract_id.clone()),
                "income overflows the portfolio total",
            )
        };

        let mut total_gross = self.total_gross;
        let mut owner_totals: Vec<(OwnerId, Decimal)> = Vec::with_capacity(lines.len());
        for line in &lines {
            total_gross = total_gross
                .checked_add(line.gross_income)
                .ok_or_else(overflow)?;
            let current = owner_totals
                .iter()
                .rev()
                .find(|(owner_id, _)| *owner_id == line.owner_id)
                .map(|(_, total)| *total)
                .or_else(|| self.owner_totals.get(&line.owner_id).copied())
                .unwrap_or(Decimal::ZERO);
            let updated = current
                .checked_add(line.gross_income)
                .ok_or_else(overflow)?;
            owner_totals.push((line.owner_id.clone(), updated));
        }

        self.total_gross = total_gross;
        self.owner_totals.extend(owner_totals);
        self.breakdown.extend(lines);
        Ok(())
    }
}

/// Sum prorated contract incomes over the scope, weighting each by ownership share.
///
/// Malformed contracts, contracts on unknown properties and properties without owners are
/// reported as warnings and skipped. Repository failures abort the aggregation.
pub fn aggregate<R>(
    allocator: &OwnershipAllocator<R>,
    contracts: &[ContractRecord],
    window: FiscalYearWindow,
    exchange_rate: Decimal,
    scope: &SummaryScope,
) -> Result<PortfolioAggregation, FiscalError>
where
    R: PortfolioRepository + 'static,
{
    let mut aggregation = PortfolioAggregation::default();

    for record in contracts {
        let normalized = match NormalizedContract::from_record(record, window) {
            Ok(normalized) => normalized,
            Err(err @ FiscalError::Data { .. }) => {
                aggregation.warnings.push(AggregationWarning::from_error(err));
                continue;
            }
            Err(err) => return Err(err),
        };

        let (property, owners) = match allocator.property_with_owners(&record.property_id) {
            Ok(found) => found,
            Err(FiscalError::NotFound { .. }) => {
                aggregation.warnings.push(AggregationWarning::excluded(
                    EntityRef::Contract(record.id.clone()),
                    format!("property {} does not exist", record.property_id),
                ));
                continue;
            }
            Err(err) => return Err(err),
        };

        if owners.is_empty() {
            aggregation.warnings.push(AggregationWarning::excluded(
                EntityRef::Property(property.id.clone()),
                format!("property has no declared owners; contract {} skipped", record.id),
            ));
            continue;
        }

        if let Some(warning) = OwnershipWarning::for_total(&property.id, sum_shares(&owners)) {
            aggregation.warnings.push(AggregationWarning {
                entity: EntityRef::Property(property.id.clone()),
                message: warning.to_string(),
                excluded: false,
            });
        }

        let selected: Vec<_> = owners
            .iter()
            .filter(|share| scope.includes(&share.owner_id))
            .collect();
        if selected.is_empty() {
            if let Some(owner_id) = scope.owner() {
                aggregation.warnings.push(AggregationWarning::excluded(
                    EntityRef::Contract(record.id.clone()),
                    format!("owner {owner_id} no longer holds a share in {}", property.id),
                ));
            }
            continue;
        }

        let property_address = property.address.formatted();
        let contract = &normalized.contract;
        let lines: Result<Vec<_>, _> = selected
            .into_iter()
            .map(|share| -> Result<ContractIncome, FiscalError> {
                Ok(ContractIncome {
                    contract_id: contract.id.clone(),
                    property_id: property.id.clone(),
                    property_name: property.name.clone(),
                    property_address: property_address.clone(),
                    tenant_name: contract.tenant.name.clone(),
                    tenant_tax_id: contract.tenant.tax_id.clone(),
                    owner_id: share.owner_id.clone(),
                    share_percent: share.percent,
                    currency: contract.currency,
                    payment_frequency: contract.payment_frequency,
                    monthly_rent: contract.monthly_rent,
                    active_months: normalized.active_months,
                    gross_income: normalized.income_for_share(exchange_rate, share.percent)?,
                })
            })
            .collect();

        if let Err(err) = lines.and_then(|lines| aggregation.push_contract(&contract.id, lines)) {
            aggregation.warnings.push(AggregationWarning::from_error(err));
        }
    }

    Ok(aggregation)
}
