use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use super::JsonBody;
use crate::{
    entities::order::OrderStatus,
    errors::ServiceError,
    services::{
        order_projection::{OrderResponse, StatusHistoryResponse},
        order_status::UpdateOrderStatusRequest,
        orders::{CreateOrderRequest, OrderStatistics, OrderStatusSummary},
    },
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderListQuery {
    /// Status name (any case) or ordinal
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StatisticsQuery {
    /// RFC 3339 timestamp or YYYY-MM-DD
    pub from: Option<String>,
    /// RFC 3339 timestamp or YYYY-MM-DD (inclusive through end of day)
    pub to: Option<String>,
}

/// Parses an RFC 3339 timestamp, or a bare date taken as the start (or end) of that day.
fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ServiceError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ServiceError::ValidationError(vec![format!(
            "Invalid date '{}'; expected RFC 3339 or YYYY-MM-DD",
            raw
        )])
    })?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| ServiceError::ValidationError(vec![format!("Invalid date '{}'", raw)]))
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::parse(raw).map_err(|e| ServiceError::ValidationError(vec![e]))
}

/// List orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<Vec<OrderResponse>>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_status)
        .transpose()?;
    let orders = state.services.orders.list_orders(status).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/number/{order_number}",
    summary = "Get order by number",
    params(("order_number" = String, Path, description = "Order number, e.g. ORD-20250115-0001")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_by_number(&order_number)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Checks stock, decrements inventory and records the order in one transaction",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Validation, unknown products or stock issues", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Change order status",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 204, description = "Status changed"),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(request): JsonBody<UpdateOrderStatusRequest>,
) -> Result<StatusCode, ServiceError> {
    state.services.order_status.update_status(id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/status-history",
    summary = "Order status history",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "History, newest first", body = ApiResponse<Vec<StatusHistoryResponse>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_status_history(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<StatusHistoryResponse>>>, ServiceError> {
    let history = state.services.orders.get_status_history(id).await?;
    Ok(Json(ApiResponse::success(history)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/customer/{email}",
    summary = "Orders for a customer",
    params(("email" = String, Path, description = "Customer email")),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<OrderResponse>>),
    ),
    tag = "orders"
)]
pub async fn get_orders_by_customer(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state.services.orders.get_orders_by_customer(&email).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/statistics",
    summary = "Order statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Counts and revenue", body = ApiResponse<OrderStatistics>),
        (status = 400, description = "Invalid date bound", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<ApiResponse<OrderStatistics>>, ServiceError> {
    let from = query.from.as_deref().map(|s| parse_bound(s, false)).transpose()?;
    let to = query.to.as_deref().map(|s| parse_bound(s, true)).transpose()?;
    let stats = state.services.orders.statistics(from, to).await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/status-summary",
    summary = "Order totals per status",
    responses(
        (status = 200, description = "Present statuses in ordinal order", body = ApiResponse<Vec<OrderStatusSummary>>),
    ),
    tag = "orders"
)]
pub async fn get_status_summary(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<OrderStatusSummary>>>, ServiceError> {
    let summary = state.services.orders.status_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/statistics", get(get_statistics))
        .route("/orders/status-summary", get(get_status_summary))
        .route("/orders/number/:order_number", get(get_order_by_number))
        .route("/orders/customer/:email", get(get_orders_by_customer))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", put(update_order_status))
        .route("/orders/:id/status-history", get(get_status_history))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_dates_cover_whole_days() {
        let from = parse_bound("2025-01-01", false).unwrap();
        let to = parse_bound("2025-01-31", true).unwrap();
        assert_eq!(from.to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2025-01-31T23:59:59+00:00");
    }

    #[test]
    fn rfc3339_bounds_are_normalised_to_utc() {
        let ts = parse_bound("2025-03-01T10:00:00+02:00", false).unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-03-01T08:00:00+00:00");
        assert!(parse_bound("last tuesday", false).is_err());
    }

    #[test]
    fn status_filter_accepts_names_and_ordinals() {
        assert_eq!(parse_status("delivered").unwrap(), OrderStatus::Delivered);
        assert_eq!(parse_status("6").unwrap(), OrderStatus::Cancelled);
        assert!(parse_status("lost").is_err());
    }
}
