use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ATSYN API",
        version = "1.0.0",
        description = r#"
# ATSYN Storefront API

Backend for the ATSYN tattoo-supply storefront.

## Features

- **Orders**: Create orders with atomic stock reservation and drive them through the fulfilment lifecycle
- **Catalog**: Categories, products and stock levels
- **Merchandising**: Brands, per-category product attributes and time-boxed sales
- **Content**: Product reviews, the contact form inbox and news posts
- **Reports**: Year-to-date financial and order reports cross-checked against the card processor
- **Payments**: Card payment intents

## Error Handling

Every failure uses the same body:

```json
{
  "error": "Not Found",
  "message": "Order with ID 42 not found.",
  "request_id": "b1c9...",
  "timestamp": "2025-01-15T10:30:00Z"
}
```

Requests rejected for several reasons at once also carry a `details` array.

## Money

Amounts are USD decimals with two places. Payment intent amounts are integer cents.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order creation, lookup and lifecycle"),
        (name = "catalog", description = "Categories, products and stock"),
        (name = "merchandising", description = "Brands, product attributes and sales"),
        (name = "content", description = "Reviews, contact submissions and news"),
        (name = "reports", description = "Financial and order reporting"),
        (name = "payments", description = "Card payment intents")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::get_status_history,
        crate::handlers::orders::get_orders_by_customer,
        crate::handlers::orders::get_statistics,
        crate::handlers::orders::get_status_summary,

        // Catalog
        crate::handlers::catalog::list_categories,
        crate::handlers::catalog::get_category,
        crate::handlers::catalog::create_category,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::create_product,
        crate::handlers::catalog::update_stock,

        // Merchandising
        crate::handlers::merchandising::list_brands,
        crate::handlers::merchandising::get_brand,
        crate::handlers::merchandising::create_brand,
        crate::handlers::merchandising::update_brand,
        crate::handlers::merchandising::delete_brand,
        crate::handlers::merchandising::list_attributes,
        crate::handlers::merchandising::list_category_attributes,
        crate::handlers::merchandising::get_attribute,
        crate::handlers::merchandising::create_attribute,
        crate::handlers::merchandising::update_attribute,
        crate::handlers::merchandising::delete_attribute,
        crate::handlers::merchandising::list_sales,
        crate::handlers::merchandising::list_active_sales,
        crate::handlers::merchandising::get_sale,
        crate::handlers::merchandising::create_sale,
        crate::handlers::merchandising::update_sale,
        crate::handlers::merchandising::deactivate_sale,
        crate::handlers::merchandising::delete_sale_permanently,

        // Content
        crate::handlers::content::list_reviews,
        crate::handlers::content::list_product_reviews,
        crate::handlers::content::create_review,
        crate::handlers::content::delete_review,
        crate::handlers::content::list_contact_submissions,
        crate::handlers::content::submit_contact,
        crate::handlers::content::toggle_contact_read,
        crate::handlers::content::delete_contact_submission,
        crate::handlers::content::list_news,
        crate::handlers::content::get_news,
        crate::handlers::content::create_news,
        crate::handlers::content::update_news,
        crate::handlers::content::delete_news,

        // Reports
        crate::handlers::reports::financial_report,
        crate::handlers::reports::order_report,
        crate::handlers::reports::dashboard_summary,

        // Payments
        crate::handlers::payments::create_payment_intent,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::ResponseMeta,

            // Orders
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderItemRequest,
            crate::services::orders::OrderStatistics,
            crate::services::orders::OrderStatusSummary,
            crate::services::order_status::UpdateOrderStatusRequest,
            crate::services::order_projection::OrderResponse,
            crate::services::order_projection::OrderItemResponse,
            crate::services::order_projection::StatusHistoryResponse,

            // Catalog
            crate::services::catalog::CategoryResponse,
            crate::services::catalog::ProductResponse,
            crate::services::catalog::CreateCategoryRequest,
            crate::services::catalog::CreateProductRequest,
            crate::services::catalog::UpdateStockRequest,

            // Merchandising
            crate::services::brands::BrandResponse,
            crate::services::brands::BrandRequest,
            crate::services::attributes::AttributeResponse,
            crate::services::attributes::AttributeOptionResponse,
            crate::services::attributes::AttributeRequest,
            crate::services::attributes::AttributeOptionRequest,
            crate::services::sales::SaleResponse,
            crate::services::sales::CreateSaleRequest,
            crate::services::sales::UpdateSaleRequest,

            // Content
            crate::services::reviews::ReviewResponse,
            crate::services::reviews::CreateReviewRequest,
            crate::services::contact::ContactSubmissionResponse,
            crate::services::contact::ContactRequest,
            crate::services::news::NewsPostResponse,
            crate::services::news::NewsPostRequest,

            // Reports
            crate::services::reports::FinancialReport,
            crate::services::reports::MonthlyRevenue,
            crate::services::reports::OrderReport,
            crate::services::reports::MonthlyOrders,
            crate::services::reports::DashboardSummary,

            // Payments
            crate::services::payments::CreatePaymentIntentRequest,
            crate::services::payments::CreatePaymentIntentResponse,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_public_route() {
        let json = serde_json::to_string_pretty(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("ATSYN API"));
        for path in [
            "/api/v1/orders",
            "/api/v1/orders/{id}/status",
            "/api/v1/orders/number/{order_number}",
            "/api/v1/products/{id}/stock",
            "/api/v1/categories/{id}/attributes",
            "/api/v1/sales/{id}/permanent",
            "/api/v1/products/{id}/reviews",
            "/api/v1/contact/{id}/read",
            "/api/v1/report/financial",
            "/api/v1/report/dashboard-summary",
            "/api/v1/payments/create-intent",
        ] {
            assert!(json.contains(path), "missing {path}");
        }
    }
}
