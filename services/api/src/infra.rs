use metrics_exporter_prometheus::PrometheusHandle;
use proprieto::error::AppError;
use proprieto::workflows::fiscal::{
    AccessContext, InMemoryPortfolioRepository, OwnerId, PortfolioSnapshot, SummaryScope,
};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Identity used for CLI runs that are not scoped to a single owner.
pub(crate) const CLI_OPERATOR: &str = "cli-operator";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_portfolio(raw: &str) -> Result<PortfolioSnapshot, AppError> {
    Ok(serde_json::from_str(raw)?)
}

/// Seed an in-memory store from a JSON portfolio dump (`properties`, `ownerships`, `contracts`).
pub(crate) fn load_portfolio(path: &Path) -> Result<InMemoryPortfolioRepository, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let snapshot = parse_portfolio(&raw)?;
    tracing::info!(
        path = %path.display(),
        properties = snapshot.properties.len(),
        contracts = snapshot.contracts.len(),
        "portfolio loaded"
    );
    Ok(InMemoryPortfolioRepository::from_snapshot(snapshot))
}

/// `--owner` narrows a CLI run to one owner; without it the operator sees every owner.
pub(crate) fn cli_scope(owner: Option<String>) -> (AccessContext, SummaryScope) {
    match owner.filter(|owner| !owner.trim().is_empty()) {
        Some(owner) => (
            AccessContext::owner(owner.clone()),
            SummaryScope::Owner(OwnerId(owner)),
        ),
        None => (AccessContext::admin(CLI_OPERATOR), SummaryScope::AllContracts),
    }
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|err| format!("failed to parse '{raw}' as a decimal number ({err})"))
}
