use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    errors::ServiceError,
    services::reports::{DashboardSummary, FinancialReport, OrderReport},
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct YearQuery {
    /// Calendar year; defaults to the current UTC year
    pub year: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/report/financial",
    summary = "Financial report",
    description = "Delivered-order revenue for a year, with processor fees and a processor cross-check",
    params(YearQuery),
    responses(
        (status = 200, description = "Report generated", body = ApiResponse<FinancialReport>),
        (status = 400, description = "Invalid year", body = crate::errors::ErrorResponse),
    ),
    tag = "reports"
)]
pub async fn financial_report(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<ApiResponse<FinancialReport>>, ServiceError> {
    let report = state.services.reports.financial_report(query.year).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/report/orders",
    summary = "Order report",
    params(YearQuery),
    responses(
        (status = 200, description = "Report generated", body = ApiResponse<OrderReport>),
        (status = 400, description = "Invalid year", body = crate::errors::ErrorResponse),
    ),
    tag = "reports"
)]
pub async fn order_report(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<ApiResponse<OrderReport>>, ServiceError> {
    let report = state.services.reports.order_report(query.year).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/report/dashboard-summary",
    summary = "Dashboard summary",
    responses(
        (status = 200, description = "Month and year to date figures", body = ApiResponse<DashboardSummary>),
    ),
    tag = "reports"
)]
pub async fn dashboard_summary(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardSummary>>, ServiceError> {
    let summary = state.services.reports.dashboard_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/report/financial", get(financial_report))
        .route("/report/orders", get(order_report))
        .route("/report/dashboard-summary", get(dashboard_summary))
}
