use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::JsonBody;
use crate::{
    errors::ServiceError,
    services::{
        contact::{ContactRequest, ContactSubmissionResponse},
        news::{NewsPostRequest, NewsPostResponse},
        reviews::{CreateReviewRequest, ReviewResponse},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReviewListQuery {
    /// Only reviews left under this email.
    pub reviewer_email: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews",
    summary = "List reviews",
    params(ReviewListQuery),
    responses((status = 200, description = "Reviews, newest first", body = ApiResponse<Vec<ReviewResponse>>)),
    tag = "content"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewListQuery>,
) -> ApiResult<Vec<ReviewResponse>> {
    let reviews = state
        .services
        .reviews
        .list_reviews(query.reviewer_email.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(reviews)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/reviews",
    summary = "Reviews for a product",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reviews, newest first", body = ApiResponse<Vec<ReviewResponse>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Vec<ReviewResponse>> {
    let reviews = state.services.reviews.list_for_product(id).await?;
    Ok(Json(ApiResponse::success(reviews)))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    summary = "Review a product",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review stored", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn create_review(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateReviewRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let review = state.services.reviews.create_review(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(review))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    summary = "Delete review",
    params(("id" = i32, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 404, description = "Review not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.reviews.delete_review(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/contact",
    summary = "List contact submissions",
    responses((status = 200, description = "Submissions, newest first", body = ApiResponse<Vec<ContactSubmissionResponse>>)),
    tag = "content"
)]
pub async fn list_contact_submissions(
    State(state): State<AppState>,
) -> ApiResult<Vec<ContactSubmissionResponse>> {
    let submissions = state.services.contact.list_submissions().await?;
    Ok(Json(ApiResponse::success(submissions)))
}

#[utoipa::path(
    post,
    path = "/api/v1/contact",
    summary = "Submit the contact form",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Submission stored unread", body = ApiResponse<ContactSubmissionResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ContactRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let submission = state.services.contact.submit(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(submission))))
}

#[utoipa::path(
    put,
    path = "/api/v1/contact/{id}/read",
    summary = "Toggle read flag",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission with its new read flag", body = ApiResponse<ContactSubmissionResponse>),
        (status = 404, description = "Submission not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn toggle_contact_read(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<ContactSubmissionResponse> {
    let submission = state.services.contact.toggle_read(id).await?;
    Ok(Json(ApiResponse::success(submission)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/contact/{id}",
    summary = "Delete contact submission",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 204, description = "Submission deleted"),
        (status = 404, description = "Submission not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn delete_contact_submission(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.contact.delete_submission(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/news",
    summary = "List news posts",
    responses((status = 200, description = "Posts, newest first", body = ApiResponse<Vec<NewsPostResponse>>)),
    tag = "content"
)]
pub async fn list_news(State(state): State<AppState>) -> ApiResult<Vec<NewsPostResponse>> {
    let posts = state.services.news.list_posts().await?;
    Ok(Json(ApiResponse::success(posts)))
}

#[utoipa::path(
    get,
    path = "/api/v1/news/{id}",
    summary = "Get news post",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = ApiResponse<NewsPostResponse>),
        (status = 404, description = "Post not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<NewsPostResponse> {
    let post = state.services.news.get_post(id).await?;
    Ok(Json(ApiResponse::success(post)))
}

#[utoipa::path(
    post,
    path = "/api/v1/news",
    summary = "Publish news post",
    request_body = NewsPostRequest,
    responses(
        (status = 201, description = "Post published", body = ApiResponse<NewsPostResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn create_news(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<NewsPostRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let post = state.services.news.create_post(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(post))))
}

#[utoipa::path(
    put,
    path = "/api/v1/news/{id}",
    summary = "Edit news post",
    params(("id" = i32, Path, description = "Post ID")),
    request_body = NewsPostRequest,
    responses(
        (status = 200, description = "Post updated", body = ApiResponse<NewsPostResponse>),
        (status = 404, description = "Post not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn update_news(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(request): JsonBody<NewsPostRequest>,
) -> ApiResult<NewsPostResponse> {
    let post = state.services.news.update_post(id, request).await?;
    Ok(Json(ApiResponse::success(post)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/news/{id}",
    summary = "Delete news post",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 404, description = "Post not found", body = crate::errors::ErrorResponse),
    ),
    tag = "content"
)]
pub async fn delete_news(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.news.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(list_reviews).post(create_review))
        .route("/reviews/:id", delete(delete_review))
        .route("/products/:id/reviews", get(list_product_reviews))
        .route(
            "/contact",
            get(list_contact_submissions).post(submit_contact),
        )
        .route("/contact/:id/read", put(toggle_contact_read))
        .route("/contact/:id", delete(delete_contact_submission))
        .route("/news", get(list_news).post(create_news))
        .route(
            "/news/:id",
            get(get_news).put(update_news).delete(delete_news),
        )
}
