use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    entities::{
        brand::Entity as BrandEntity,
        category::{self, Entity as CategoryEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::{is_unique_violation, ServiceError},
    services::pricing::round_currency,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: Option<i32>,
    pub category: Option<CategoryResponse>,
    pub brand_id: Option<i32>,
    pub stock_amount: i32,
    pub in_stock: bool,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProductResponse {
    pub fn from_parts(model: product::Model, category: Option<category::Model>) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            price: round_currency(model.price),
            category_id: model.category_id,
            category: category.map(CategoryResponse::from),
            brand_id: model.brand_id,
            stock_amount: model.stock_amount,
            in_stock: model.in_stock,
            is_visible: model.is_visible,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product title must be 1-200 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    pub category_id: Option<i32>,
    #[serde(default)]
    pub brand_id: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock amount cannot be negative"))]
    pub stock_amount: i32,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockRequest {
    #[validate(range(min = 0, message = "Stock amount cannot be negative"))]
    pub stock_amount: i32,
}

fn default_true() -> bool {
    true
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("negative_price");
        err.message = Some("Price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Categories and products referenced by orders.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryResponse>, ServiceError> {
        let categories = CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(categories.into_iter().map(Into::into).collect())
    }

    pub async fn get_category(&self, id: i32) -> Result<CategoryResponse, ServiceError> {
        CategoryEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| category_not_found(id))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<CategoryResponse, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();

        let existing = CategoryEntity::find()
            .filter(category::Column::Name.eq(name.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(duplicate_category(&name));
        }

        let created = category::ActiveModel {
            name: Set(name.clone()),
            description: Set(request.description),
            is_active: Set(request.is_active),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_category(&name)
            } else {
                error!(error = %e, "Failed to insert category");
                ServiceError::DatabaseError(e)
            }
        })?;

        info!(category_id = created.id, "Category created");
        Ok(created.into())
    }

    pub async fn list_products(
        &self,
        category_id: Option<i32>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        let mut query = ProductEntity::find().order_by_asc(product::Column::Id);
        if let Some(category_id) = category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        let products = query.all(&*self.db).await?;

        let category_ids: Vec<i32> = products.iter().filter_map(|p| p.category_id).collect();
        let categories: HashMap<i32, category::Model> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            CategoryEntity::find()
                .filter(category::Column::Id.is_in(category_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(products
            .into_iter()
            .map(|p| {
                let category = p.category_id.and_then(|id| categories.get(&id).cloned());
                ProductResponse::from_parts(p, category)
            })
            .collect())
    }

    pub async fn get_product(&self, id: i32) -> Result<ProductResponse, ServiceError> {
        let (product, category) = ProductEntity::find_by_id(id)
            .find_also_related(CategoryEntity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product with ID {} not found.", id)))?;
        Ok(ProductResponse::from_parts(product, category))
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;

        let category = match request.category_id {
            Some(category_id) => Some(
                CategoryEntity::find_by_id(category_id)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| category_not_found(category_id))?,
            ),
            None => None,
        };

        if let Some(brand_id) = request.brand_id {
            if BrandEntity::find_by_id(brand_id).one(&*self.db).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "Brand with ID {} not found.",
                    brand_id
                )));
            }
        }

        let created = product::ActiveModel {
            title: Set(request.title.trim().to_string()),
            description: Set(request.description),
            price: Set(request.price),
            category_id: Set(request.category_id),
            brand_id: Set(request.brand_id),
            stock_amount: Set(request.stock_amount),
            in_stock: Set(request.stock_amount > 0),
            is_visible: Set(request.is_visible),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = created.id, "Product created");
        Ok(ProductResponse::from_parts(created, category))
    }

    /// Sets the absolute stock level and recomputes availability.
    #[instrument(skip(self, request), fields(stock_amount = request.stock_amount))]
    pub async fn update_stock(
        &self,
        id: i32,
        request: UpdateStockRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;

        let existing = ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product with ID {} not found.", id)))?;

        let mut active: product::ActiveModel = existing.into();
        active.stock_amount = Set(request.stock_amount);
        active.in_stock = Set(request.stock_amount > 0);
        let updated = active.update(&*self.db).await?;

        info!(product_id = id, in_stock = updated.in_stock, "Product stock updated");
        self.get_product(updated.id).await
    }
}

fn category_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Category with ID {} not found.", id))
}

fn duplicate_category(name: &str) -> ServiceError {
    ServiceError::Conflict(format!("Category with name '{}' already exists.", name))
}
