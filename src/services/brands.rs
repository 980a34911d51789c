use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::{
        brand::{self, Entity as BrandEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::{is_unique_violation, ServiceError},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrandResponse {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<brand::Model> for BrandResponse {
    fn from(model: brand::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_at: model.created_at,
        }
    }
}

/// Body for both create and rename.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrandRequest {
    #[validate(length(min = 1, max = 100, message = "Brand name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Clone)]
pub struct BrandService {
    db: Arc<DatabaseConnection>,
}

impl BrandService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_brands(&self) -> Result<Vec<BrandResponse>, ServiceError> {
        let brands = BrandEntity::find()
            .order_by_asc(brand::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(brands.into_iter().map(Into::into).collect())
    }

    pub async fn get_brand(&self, id: i32) -> Result<BrandResponse, ServiceError> {
        self.find(id).await.map(Into::into)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_brand(&self, request: BrandRequest) -> Result<BrandResponse, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();
        self.ensure_name_free(&name, None).await?;

        let created = brand::ActiveModel {
            name: Set(name.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| map_write_error(e, &name))?;

        info!(brand_id = created.id, "Brand created");
        Ok(created.into())
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn update_brand(
        &self,
        id: i32,
        request: BrandRequest,
    ) -> Result<BrandResponse, ServiceError> {
        request.validate()?;
        let existing = self.find(id).await?;
        let name = request.name.trim().to_string();
        self.ensure_name_free(&name, Some(id)).await?;

        let mut active: brand::ActiveModel = existing.into();
        active.name = Set(name.clone());
        let updated = active
            .update(&*self.db)
            .await
            .map_err(|e| map_write_error(e, &name))?;

        info!(brand_id = id, "Brand renamed");
        Ok(updated.into())
    }

    /// Refuses while any product still references the brand.
    #[instrument(skip(self))]
    pub async fn delete_brand(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;

        let in_use = ProductEntity::find()
            .filter(product::Column::BrandId.eq(id))
            .count(&*self.db)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::ValidationError(vec![
                "Cannot delete brand because it is being used by one or more products.".into(),
            ]));
        }

        BrandEntity::delete_by_id(existing.id).exec(&*self.db).await?;
        info!(brand_id = id, "Brand deleted");
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<brand::Model, ServiceError> {
        BrandEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Brand with ID {} not found.", id)))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> Result<(), ServiceError> {
        let mut query = BrandEntity::find().filter(brand::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(brand::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(duplicate_brand(name));
        }
        Ok(())
    }
}

fn map_write_error(err: sea_orm::DbErr, name: &str) -> ServiceError {
    if is_unique_violation(&err) {
        duplicate_brand(name)
    } else {
        error!(error = %err, "Failed to write brand");
        ServiceError::DatabaseError(err)
    }
}

fn duplicate_brand(name: &str) -> ServiceError {
    ServiceError::Conflict(format!("Brand with name '{}' already exists.", name))
}
