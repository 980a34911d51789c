use axum::{extract::State, response::Json, routing::post, Router};

use super::JsonBody;
use crate::{
    errors::ServiceError,
    services::payments::{CreatePaymentIntentRequest, CreatePaymentIntentResponse},
    ApiResponse, AppState,
};

/// Create a card payment intent
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-intent",
    summary = "Create payment intent",
    description = "Creates a USD payment intent with automatic payment methods. Amount is in cents.",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = ApiResponse<CreatePaymentIntentResponse>),
        (status = 400, description = "Invalid amount", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment processor unavailable", body = crate::errors::ErrorResponse),
    ),
    tag = "payments"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreatePaymentIntentRequest>,
) -> Result<Json<ApiResponse<CreatePaymentIntentResponse>>, ServiceError> {
    let intent = state.services.payments.create_intent(request).await?;
    Ok(Json(ApiResponse::success(intent)))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/create-intent", post(create_payment_intent))
}
