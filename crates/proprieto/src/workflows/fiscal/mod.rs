//! Rental income aggregation and D212 tax computation for co-owned properties.
//!
//! Ownership rows decide who declares which part of every contract; the normalizer turns
//! contract terms into months active within a fiscal year; the aggregator sums prorated,
//! share-weighted incomes; the calculator applies the 10% income tax and the CASS brackets.

pub mod aggregator;
pub mod calculator;
pub mod domain;
pub mod error;
pub mod export;
pub mod memory;
pub mod normalizer;
pub mod ownership;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use aggregator::{aggregate, AggregationWarning, ContractIncome, PortfolioAggregation};
pub use calculator::{CassTier, FiscalCalculator, FiscalResult};
pub use domain::{
    AccessContext, Address, Contract, ContractId, ContractRecord, Currency, FiscalYearWindow,
    NewContract, NewProperty, OwnerId, PaymentFrequency, Property, PropertyId, PropertyOwnership,
    Role, SummaryScope, Tenant,
};
pub use error::{EntityRef, FiscalError};
pub use export::{d212_csv_string, write_d212_csv, ExportError};
pub use memory::{InMemoryPortfolioRepository, PortfolioSnapshot};
pub use normalizer::{active_months, gross_contribution, NormalizedContract};
pub use ownership::{OwnerShare, OwnershipAllocator, OwnershipChange, OwnershipWarning};
pub use repository::{ContractFilter, PortfolioRepository, RepositoryError};
pub use router::fiscal_router;
pub use service::{ContractRegistration, FiscalSummary, FiscalSummaryService};
