use crate::cli::ServeArgs;
use crate::infra::{load_portfolio, AppState};
use crate::routes::with_fiscal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use proprieto::config::AppConfig;
use proprieto::error::AppError;
use proprieto::telemetry;
use proprieto::workflows::fiscal::{FiscalSummaryService, InMemoryPortfolioRepository};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = match args.portfolio.take() {
        Some(path) => load_portfolio(&path)?,
        None => InMemoryPortfolioRepository::default(),
    };
    let fiscal_service = Arc::new(FiscalSummaryService::new(
        Arc::new(repository),
        &config.fiscal,
    )?);

    let app = with_fiscal_routes(fiscal_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        minimum_wage = %config.fiscal.minimum_wage_reference,
        fiscal_year = config.fiscal.default_fiscal_year,
        "proprieto fiscal service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
