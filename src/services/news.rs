use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::news_post::{self, Entity as NewsEntity},
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsPostResponse {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<news_post::Model> for NewsPostResponse {
    fn from(model: news_post::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsPostRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: String,
}

#[derive(Clone)]
pub struct NewsService {
    db: Arc<DatabaseConnection>,
}

impl NewsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest first.
    pub async fn list_posts(&self) -> Result<Vec<NewsPostResponse>, ServiceError> {
        let posts = NewsEntity::find()
            .order_by_desc(news_post::Column::CreatedAt)
            .order_by_desc(news_post::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(posts.into_iter().map(Into::into).collect())
    }

    pub async fn get_post(&self, id: i32) -> Result<NewsPostResponse, ServiceError> {
        self.find(id).await.map(Into::into)
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_post(
        &self,
        request: NewsPostRequest,
    ) -> Result<NewsPostResponse, ServiceError> {
        request.validate()?;
        let created = news_post::ActiveModel {
            title: Set(request.title.trim().to_string()),
            content: Set(request.content),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(post_id = created.id, "News post published");
        Ok(created.into())
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn update_post(
        &self,
        id: i32,
        request: NewsPostRequest,
    ) -> Result<NewsPostResponse, ServiceError> {
        request.validate()?;
        let existing = self.find(id).await?;

        let mut active: news_post::ActiveModel = existing.into();
        active.title = Set(request.title.trim().to_string());
        active.content = Set(request.content);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(post_id = id, "News post updated");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: i32) -> Result<(), ServiceError> {
        let result = NewsEntity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(post_not_found(id));
        }
        info!(post_id = id, "News post deleted");
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<news_post::Model, ServiceError> {
        NewsEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| post_not_found(id))
    }
}

fn post_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("News post with ID {} not found.", id))
}
