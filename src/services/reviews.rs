use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::{
        product::Entity as ProductEntity,
        review::{self, Entity as ReviewEntity},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: i32,
    pub product_id: i32,
    pub reviewer_name: String,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<review::Model> for ReviewResponse {
    fn from(model: review::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            reviewer_name: model.reviewer_name,
            rating: model.rating,
            title: model.title,
            comment: model.comment,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: i32,
    #[validate(length(min = 1, max = 100, message = "Reviewer name must be 1-100 characters"))]
    pub reviewer_name: String,
    #[validate(email(message = "Reviewer email must be a valid email address"))]
    pub reviewer_email: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, max = 200, message = "Review title must be 1-200 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Comment cannot exceed 2000 characters"))]
    pub comment: String,
}

/// Customer ratings attached to products. The reviewer's email is kept for
/// moderation and the per-reviewer filter but never echoed back.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(product_id = request.product_id, rating = request.rating))]
    pub async fn create_review(
        &self,
        request: CreateReviewRequest,
    ) -> Result<ReviewResponse, ServiceError> {
        request.validate()?;
        self.ensure_product(request.product_id).await?;

        let created = review::ActiveModel {
            product_id: Set(request.product_id),
            reviewer_name: Set(request.reviewer_name.trim().to_string()),
            reviewer_email: Set(request.reviewer_email.trim().to_ascii_lowercase()),
            rating: Set(request.rating),
            title: Set(request.title.trim().to_string()),
            comment: Set(request.comment),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(review_id = created.id, "Review created");
        Ok(created.into())
    }

    /// Newest first. A product nobody has reviewed yields an empty list.
    pub async fn list_for_product(
        &self,
        product_id: i32,
    ) -> Result<Vec<ReviewResponse>, ServiceError> {
        self.ensure_product(product_id).await?;
        let reviews = ReviewEntity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(reviews.into_iter().map(Into::into).collect())
    }

    /// Newest first, optionally narrowed to one reviewer's email.
    pub async fn list_reviews(
        &self,
        reviewer_email: Option<&str>,
    ) -> Result<Vec<ReviewResponse>, ServiceError> {
        let mut query = ReviewEntity::find()
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id);
        if let Some(email) = reviewer_email {
            query = query.filter(review::Column::ReviewerEmail.eq(email.trim().to_ascii_lowercase()));
        }
        let reviews = query.all(&*self.db).await?;
        Ok(reviews.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn delete_review(&self, id: i32) -> Result<(), ServiceError> {
        let result = ReviewEntity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Review with ID {} not found.", id)));
        }
        info!(review_id = id, "Review deleted");
        Ok(())
    }

    async fn ensure_product(&self, product_id: i32) -> Result<(), ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product with ID {} not found.", product_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn request(rating: i32, email: &str) -> CreateReviewRequest {
        CreateReviewRequest {
            product_id: 1,
            reviewer_name: "Sam".into(),
            reviewer_email: email.into(),
            rating,
            title: "Smooth lines".into(),
            comment: String::new(),
        }
    }

    #[rstest]
    #[case(0)]
    #[case(6)]
    #[case(-3)]
    fn ratings_outside_one_to_five_are_rejected(#[case] rating: i32) {
        let err: ServiceError = request(rating, "sam@example.com").validate().unwrap_err().into();
        assert_eq!(err.details(), Some(vec!["Rating must be between 1 and 5".to_string()]));
    }

    #[test]
    fn malformed_reviewer_email_is_rejected() {
        let err: ServiceError = request(4, "not-an-email").validate().unwrap_err().into();
        assert_eq!(
            err.details(),
            Some(vec!["Reviewer email must be a valid email address".to_string()])
        );
    }
}
