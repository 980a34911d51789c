use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get},
    Router,
};

use super::JsonBody;
use crate::{
    errors::ServiceError,
    services::{
        attributes::{AttributeRequest, AttributeResponse},
        brands::{BrandRequest, BrandResponse},
        sales::{CreateSaleRequest, SaleResponse, UpdateSaleRequest},
    },
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/brands",
    summary = "List brands",
    responses((status = 200, description = "Brands by name", body = ApiResponse<Vec<BrandResponse>>)),
    tag = "merchandising"
)]
pub async fn list_brands(State(state): State<AppState>) -> ApiResult<Vec<BrandResponse>> {
    let brands = state.services.brands.list_brands().await?;
    Ok(Json(ApiResponse::success(brands)))
}

#[utoipa::path(
    get,
    path = "/api/v1/brands/{id}",
    summary = "Get brand",
    params(("id" = i32, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Brand", body = ApiResponse<BrandResponse>),
        (status = 404, description = "Brand not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn get_brand(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<BrandResponse> {
    let brand = state.services.brands.get_brand(id).await?;
    Ok(Json(ApiResponse::success(brand)))
}

#[utoipa::path(
    post,
    path = "/api/v1/brands",
    summary = "Create brand",
    request_body = BrandRequest,
    responses(
        (status = 201, description = "Brand created", body = ApiResponse<BrandResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn create_brand(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<BrandRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let brand = state.services.brands.create_brand(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(brand))))
}

#[utoipa::path(
    put,
    path = "/api/v1/brands/{id}",
    summary = "Rename brand",
    params(("id" = i32, Path, description = "Brand ID")),
    request_body = BrandRequest,
    responses(
        (status = 200, description = "Brand renamed", body = ApiResponse<BrandResponse>),
        (status = 404, description = "Brand not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn update_brand(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(request): JsonBody<BrandRequest>,
) -> ApiResult<BrandResponse> {
    let brand = state.services.brands.update_brand(id, request).await?;
    Ok(Json(ApiResponse::success(brand)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/brands/{id}",
    summary = "Delete brand",
    params(("id" = i32, Path, description = "Brand ID")),
    responses(
        (status = 204, description = "Brand deleted"),
        (status = 400, description = "Brand still used by products", body = crate::errors::ErrorResponse),
        (status = 404, description = "Brand not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn delete_brand(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.brands.delete_brand(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/attributes",
    summary = "List product attributes",
    responses((status = 200, description = "Attributes by category and display order", body = ApiResponse<Vec<AttributeResponse>>)),
    tag = "merchandising"
)]
pub async fn list_attributes(State(state): State<AppState>) -> ApiResult<Vec<AttributeResponse>> {
    let attributes = state.services.attributes.list_attributes().await?;
    Ok(Json(ApiResponse::success(attributes)))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/attributes",
    summary = "Attributes for a category",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Attributes in display order", body = ApiResponse<Vec<AttributeResponse>>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn list_category_attributes(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Vec<AttributeResponse>> {
    let attributes = state.services.attributes.list_for_category(id).await?;
    Ok(Json(ApiResponse::success(attributes)))
}

#[utoipa::path(
    get,
    path = "/api/v1/attributes/{id}",
    summary = "Get product attribute",
    params(("id" = i32, Path, description = "Attribute ID")),
    responses(
        (status = 200, description = "Attribute", body = ApiResponse<AttributeResponse>),
        (status = 404, description = "Attribute not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn get_attribute(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<AttributeResponse> {
    let attribute = state.services.attributes.get_attribute(id).await?;
    Ok(Json(ApiResponse::success(attribute)))
}

#[utoipa::path(
    post,
    path = "/api/v1/attributes",
    summary = "Create product attribute",
    request_body = AttributeRequest,
    responses(
        (status = 201, description = "Attribute created", body = ApiResponse<AttributeResponse>),
        (status = 400, description = "Invalid request or unknown category", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used in the category", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn create_attribute(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AttributeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let attribute = state.services.attributes.create_attribute(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(attribute))))
}

#[utoipa::path(
    put,
    path = "/api/v1/attributes/{id}",
    summary = "Update product attribute",
    params(("id" = i32, Path, description = "Attribute ID")),
    request_body = AttributeRequest,
    responses(
        (status = 200, description = "Attribute updated, options replaced", body = ApiResponse<AttributeResponse>),
        (status = 404, description = "Attribute not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used in the category", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn update_attribute(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(request): JsonBody<AttributeRequest>,
) -> ApiResult<AttributeResponse> {
    let attribute = state.services.attributes.update_attribute(id, request).await?;
    Ok(Json(ApiResponse::success(attribute)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/attributes/{id}",
    summary = "Delete product attribute",
    params(("id" = i32, Path, description = "Attribute ID")),
    responses(
        (status = 204, description = "Attribute and its options deleted"),
        (status = 404, description = "Attribute not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn delete_attribute(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.attributes.delete_attribute(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/sales",
    summary = "List sales",
    responses((status = 200, description = "All sales, newest first", body = ApiResponse<Vec<SaleResponse>>)),
    tag = "merchandising"
)]
pub async fn list_sales(State(state): State<AppState>) -> ApiResult<Vec<SaleResponse>> {
    let sales = state.services.sales.list_sales().await?;
    Ok(Json(ApiResponse::success(sales)))
}

#[utoipa::path(
    get,
    path = "/api/v1/sales/active",
    summary = "List running sales",
    responses((status = 200, description = "Active sales whose window contains now", body = ApiResponse<Vec<SaleResponse>>)),
    tag = "merchandising"
)]
pub async fn list_active_sales(State(state): State<AppState>) -> ApiResult<Vec<SaleResponse>> {
    let sales = state.services.sales.list_active_sales().await?;
    Ok(Json(ApiResponse::success(sales)))
}

#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}",
    summary = "Get sale",
    params(("id" = i32, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale", body = ApiResponse<SaleResponse>),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn get_sale(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<SaleResponse> {
    let sale = state.services.sales.get_sale(id).await?;
    Ok(Json(ApiResponse::success(sale)))
}

#[utoipa::path(
    post,
    path = "/api/v1/sales",
    summary = "Create sale",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created and active", body = ApiResponse<SaleResponse>),
        (status = 400, description = "Invalid request or unknown product", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateSaleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let sale = state.services.sales.create_sale(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(sale))))
}

#[utoipa::path(
    put,
    path = "/api/v1/sales/{id}",
    summary = "Update sale",
    params(("id" = i32, Path, description = "Sale ID")),
    request_body = UpdateSaleRequest,
    responses(
        (status = 200, description = "Sale updated", body = ApiResponse<SaleResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn update_sale(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(request): JsonBody<UpdateSaleRequest>,
) -> ApiResult<SaleResponse> {
    let sale = state.services.sales.update_sale(id, request).await?;
    Ok(Json(ApiResponse::success(sale)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/sales/{id}",
    summary = "Deactivate sale",
    params(("id" = i32, Path, description = "Sale ID")),
    responses(
        (status = 204, description = "Sale deactivated"),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn deactivate_sale(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.sales.deactivate_sale(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/v1/sales/{id}/permanent",
    summary = "Delete sale permanently",
    params(("id" = i32, Path, description = "Sale ID")),
    responses(
        (status = 204, description = "Sale removed"),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
    ),
    tag = "merchandising"
)]
pub async fn delete_sale_permanently(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.sales.delete_sale_permanently(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn merchandising_routes() -> Router<AppState> {
    Router::new()
        .route("/brands", get(list_brands).post(create_brand))
        .route(
            "/brands/:id",
            get(get_brand).put(update_brand).delete(delete_brand),
        )
        .route("/attributes", get(list_attributes).post(create_attribute))
        .route(
            "/attributes/:id",
            get(get_attribute).put(update_attribute).delete(delete_attribute),
        )
        .route("/categories/:id/attributes", get(list_category_attributes))
        .route("/sales", get(list_sales).post(create_sale))
        .route("/sales/active", get(list_active_sales))
        .route(
            "/sales/:id",
            get(get_sale).put(update_sale).delete(deactivate_sale),
        )
        .route("/sales/:id/permanent", delete(delete_sale_permanently))
}
