use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AccessContext, ContractId, NewContract, NewProperty, OwnerId, PropertyId, Role, SummaryScope,
};
use super::error::FiscalError;
use super::export::d212_csv_string;
use super::ownership::{sum_shares, OwnerShare};
use super::repository::{PortfolioRepository, RepositoryError};
use super::service::FiscalSummaryService;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryQuery {
    #[serde(default)]
    pub(crate) fiscal_year: Option<i32>,
    pub(crate) exchange_rate: Decimal,
    #[serde(default)]
    pub(crate) owner_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScopeQuery {
    #[serde(default)]
    pub(crate) owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePropertyRequest {
    #[serde(flatten)]
    pub(crate) property: NewProperty,
    /// Omitted for a property held entirely by the caller.
    #[serde(default)]
    pub(crate) owners: Option<Vec<OwnerShare>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShareRequest {
    pub(crate) percent: Decimal,
}

/// Router builder exposing the fiscal summary, ownership and contract endpoints.
pub fn fiscal_router<R>(service: Arc<FiscalSummaryService<R>>) -> Router
where
    R: PortfolioRepository + 'static,
{
    Router::new()
        .route("/api/v1/fiscal/summary", get(summary_handler::<R>))
        .route("/api/v1/fiscal/summary.csv", get(summary_csv_handler::<R>))
        .route("/api/v1/properties", post(create_property_handler::<R>))
        .route(
            "/api/v1/properties/:property_id",
            delete(delete_property_handler::<R>),
        )
        .route(
            "/api/v1/properties/:property_id/owners",
            get(owners_handler::<R>).post(add_owner_handler::<R>),
        )
        .route(
            "/api/v1/properties/:property_id/owners/:owner_id",
            put(update_owner_handler::<R>).delete(remove_owner_handler::<R>),
        )
        .route(
            "/api/v1/contracts",
            get(list_contracts_handler::<R>).post(register_contract_handler::<R>),
        )
        .route(
            "/api/v1/contracts/:contract_id",
            delete(delete_contract_handler::<R>),
        )
        .with_state(service)
}

/// Caller identity from the gateway headers. Authentication happens upstream.
pub(crate) fn access_context(headers: &HeaderMap) -> Result<AccessContext, Response> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            let payload = json!({ "error": format!("missing {USER_ID_HEADER} header") });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })?;

    let role = match headers
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(raw) if raw.trim().eq_ignore_ascii_case("admin") => Role::Admin,
        _ => Role::Owner,
    };

    Ok(AccessContext {
        user_id: OwnerId(user_id.to_string()),
        role,
    })
}

/// Explicit owner wins; otherwise admins get everything and owners get their own share.
pub(crate) fn resolve_scope(ctx: &AccessContext, owner_id: Option<String>) -> SummaryScope {
    match owner_id.filter(|id| !id.trim().is_empty()) {
        Some(owner_id) => SummaryScope::Owner(OwnerId(owner_id)),
        None if ctx.is_admin() => SummaryScope::AllContracts,
        None => SummaryScope::Owner(ctx.user_id.clone()),
    }
}

pub(crate) fn error_response(error: FiscalError) -> Response {
    let status = match &error {
        FiscalError::Validation { .. } | FiscalError::Data { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FiscalError::Invariant { .. } => StatusCode::CONFLICT,
        FiscalError::NotFound { .. } => StatusCode::NOT_FOUND,
        FiscalError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        FiscalError::Repository(RepositoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        FiscalError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
        "entity": error.entity(),
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn summary_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let scope = resolve_scope(&ctx, query.owner_id);
    let fiscal_year = query
        .fiscal_year
        .unwrap_or_else(|| service.default_fiscal_year());

    match service.compute_fiscal_summary(&ctx, scope, fiscal_year, query.exchange_rate) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn summary_csv_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let scope = resolve_scope(&ctx, query.owner_id);
    let fiscal_year = query
        .fiscal_year
        .unwrap_or_else(|| service.default_fiscal_year());

    let summary =
        match service.compute_fiscal_summary(&ctx, scope, fiscal_year, query.exchange_rate) {
            Ok(summary) => summary,
            Err(error) => return error_response(error),
        };

    match d212_csv_string(&summary) {
        Ok(csv) => {
            let disposition = format!("attachment; filename=\"anaf_d212_{fiscal_year}.csv\"");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                csv,
            )
                .into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn create_property_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Json(request): Json<CreatePropertyRequest>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let allocator = service.allocator();
    let created = match request.owners {
        Some(owners) => allocator.create_co_owned_property(&ctx, request.property, owners),
        None => allocator.create_property(&ctx, request.property),
    };

    match created.and_then(|property_id| {
        allocator
            .get_owners(&property_id)
            .map(|owners| (property_id, owners))
    }) {
        Ok((property_id, owners)) => {
            let payload = json!({ "property_id": property_id, "owners": owners });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_property_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service
        .allocator()
        .delete_property(&ctx, &PropertyId(property_id))
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn owners_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    if let Err(response) = access_context(&headers) {
        return response;
    }
    let property_id = PropertyId(property_id);
    let allocator = service.allocator();
    match allocator.get_owners(&property_id) {
        Ok(owners) => {
            let payload = json!({
                "property_id": property_id,
                "owners": owners,
                "total_percent": sum_shares(&owners),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn add_owner_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(share): Json<OwnerShare>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service.allocator().add_owner(
        &ctx,
        &PropertyId(property_id),
        &share.owner_id,
        share.percent,
    ) {
        Ok(change) => (StatusCode::CREATED, Json(change)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_owner_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Path((property_id, owner_id)): Path<(String, String)>,
    Json(request): Json<ShareRequest>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service.allocator().update_owner_percent(
        &ctx,
        &PropertyId(property_id),
        &OwnerId(owner_id),
        request.percent,
    ) {
        Ok(change) => (StatusCode::OK, Json(change)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_owner_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Path((property_id, owner_id)): Path<(String, String)>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service
        .allocator()
        .remove_owner(&ctx, &PropertyId(property_id), &OwnerId(owner_id))
    {
        Ok(change) => (StatusCode::OK, Json(change)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_contracts_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Query(query): Query<ScopeQuery>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let scope = resolve_scope(&ctx, query.owner_id);
    match service.list_contracts(&ctx, &scope) {
        Ok(contracts) => (StatusCode::OK, Json(json!({ "contracts": contracts }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_contract_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Json(contract): Json<NewContract>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service.register_contract(&ctx, contract) {
        Ok(registration) => (StatusCode::CREATED, Json(registration)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_contract_handler<R>(
    State(service): State<Arc<FiscalSummaryService<R>>>,
    headers: HeaderMap,
    Path(contract_id): Path<String>,
) -> Response
where
    R: PortfolioRepository + 'static,
{
    let ctx = match access_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match service.delete_contract(&ctx, &ContractId(contract_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}
