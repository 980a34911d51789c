use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    entities::{
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item, order_status_history,
        product::{self, Entity as ProductEntity},
    },
    errors::{flatten_validation_errors, ServiceError},
    events::{Event, EventSender},
    services::{
        order_numbers::allocate_order_number,
        order_projection::{project_orders, OrderResponse, StatusCounts, StatusHistoryResponse},
        order_status::SYSTEM_ACTOR,
        pricing::{round_currency, OrderTotals},
    },
};

/// Attempts at the whole creation when the order-number index rejects an insert
/// or the database reports lock contention.
const MAX_CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItemRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(
        custom = "customer_name_required",
        length(max = 200, message = "Customer name cannot exceed 200 characters")
    )]
    pub customer_name: String,
    #[validate(
        email(message = "Customer email must be a valid email address"),
        length(max = 254, message = "Customer email cannot exceed 254 characters")
    )]
    pub customer_email: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Shipping address cannot exceed 500 characters"))]
    pub shipping_address: String,
    #[serde(default)]
    pub is_pickup: bool,
    #[validate(
        custom = "billing_address_required",
        length(max = 500, message = "Billing address cannot exceed 500 characters")
    )]
    pub billing_address: String,
    #[serde(default)]
    #[validate(custom = "non_negative_amount")]
    pub shipping_cost: Decimal,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub order_items: Vec<CreateOrderItemRequest>,
}

fn required_text(value: &str, message: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(message.into());
        return Err(err);
    }
    Ok(())
}

fn customer_name_required(value: &str) -> Result<(), ValidationError> {
    required_text(value, "Customer name is required")
}

fn billing_address_required(value: &str) -> Result<(), ValidationError> {
    required_text(value, "Billing address is required")
}

fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("negative_amount");
        err.message = Some("Shipping cost cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

impl CreateOrderRequest {
    /// Validates the whole request, items included, and returns the requested
    /// quantities merged per product in first-seen order.
    pub fn validated_lines(&self) -> Result<Vec<(i32, i32)>, ServiceError> {
        let mut messages = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => flatten_validation_errors(&errors),
        };
        for (index, item) in self.order_items.iter().enumerate() {
            if let Err(errors) = item.validate() {
                messages.extend(
                    flatten_validation_errors(&errors)
                        .into_iter()
                        .map(|m| format!("Item {}: {}", index + 1, m)),
                );
            }
        }
        if !messages.is_empty() {
            return Err(ServiceError::ValidationError(messages));
        }

        let mut merged: Vec<(i32, i32)> = Vec::with_capacity(self.order_items.len());
        for item in &self.order_items {
            match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, quantity)) => {
                    *quantity = quantity.checked_add(item.quantity).ok_or_else(|| {
                        ServiceError::ValidationError(vec![format!(
                            "Quantity for product {} is too large",
                            item.product_id
                        )])
                    })?;
                }
                None => merged.push((item.product_id, item.quantity)),
            }
        }
        Ok(merged)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub confirmed_orders: u64,
    pub processing_orders: u64,
    pub shipped_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
    pub returned_orders: u64,
    pub refunded_orders: u64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusSummary {
    #[schema(value_type = String, example = "Delivered")]
    pub status: OrderStatus,
    pub status_name: String,
    pub count: u64,
    pub total_value: Decimal,
}

/// Order creation and read-side queries.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(customer_email = %request.customer_email, items = request.order_items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        self.create_order_at(request, Utc::now()).await
    }

    /// Creates an order as if it were placed at `now`. The day of `now` picks
    /// the order-number counter.
    pub async fn create_order_at(
        &self,
        request: CreateOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderResponse, ServiceError> {
        let lines = request.validated_lines()?;

        let product_ids: Vec<i32> = lines.iter().map(|(id, _)| *id).collect();
        let products: HashMap<i32, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut missing: Vec<i32> = product_ids
            .iter()
            .copied()
            .filter(|id| !products.contains_key(id))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            warn!(?missing, "Order references unknown products");
            return Err(ServiceError::ProductsNotFound(missing));
        }

        let stock_issues: Vec<String> = lines
            .iter()
            .filter_map(|(id, quantity)| {
                products
                    .get(id)
                    .and_then(|product| stock_issue(product, *quantity))
            })
            .collect();
        if !stock_issues.is_empty() {
            warn!(issues = stock_issues.len(), "Order rejected for stock");
            return Err(ServiceError::InsufficientStock(stock_issues));
        }

        let priced: Vec<PricedLine> = lines
            .iter()
            .filter_map(|(id, quantity)| {
                products.get(id).map(|product| PricedLine {
                    product_id: product.id,
                    product_name: product.title.clone(),
                    unit_price: round_currency(product.price),
                    quantity: *quantity,
                })
            })
            .collect();
        let totals = OrderTotals::compute(
            priced.iter().map(|line| (line.unit_price, line.quantity)),
            request.shipping_cost,
            request.is_pickup,
        );

        let mut attempt = 0;
        let order_id = loop {
            attempt += 1;
            match self.persist_order(&request, &priced, &totals, now).await {
                Err(e) if e.is_unique_violation() && attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(attempt, error = %e, "Order number collided, retrying creation");
                    continue;
                }
                Err(e) if e.is_lock_contention() && attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(attempt, error = %e, "Order transaction hit lock contention, retrying");
                    continue;
                }
                result => break result?,
            }
        };

        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;

        info!(order_id, order_number = %order.order_number, total = %order.total_amount, "Order created");
        metrics::counter!("atsyn.orders.created", 1);

        if let Err(e) = self
            .event_sender
            .publish(Event::OrderCreated {
                order_id,
                order_number: order.order_number.clone(),
            })
        {
            warn!(error = %e, order_id, "Failed to publish order created event");
        }

        self.project_one(order).await
    }

    /// Writes the order in one transaction. Any error drops the transaction,
    /// which rolls back the counter, the stock decrements and every insert.
    async fn persist_order(
        &self,
        request: &CreateOrderRequest,
        lines: &[PricedLine],
        totals: &OrderTotals,
        now: DateTime<Utc>,
    ) -> Result<i32, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin order transaction");
            ServiceError::DatabaseError(e)
        })?;

        let order_number = allocate_order_number(&txn, now).await?;

        for line in lines {
            decrement_stock(&txn, line).await?;
        }

        let order = order::ActiveModel {
            order_number: Set(order_number),
            order_date: Set(now),
            customer_name: Set(request.customer_name.trim().to_string()),
            customer_email: Set(request.customer_email.trim().to_string()),
            shipping_address: Set(request.shipping_address.trim().to_string()),
            is_pickup: Set(request.is_pickup),
            billing_address: Set(request.billing_address.trim().to_string()),
            subtotal: Set(totals.subtotal),
            tax_amount: Set(totals.tax_amount),
            shipping_cost: Set(totals.shipping_cost),
            total_amount: Set(totals.total_amount),
            status: Set(OrderStatus::Pending),
            notes: Set(request.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for line in lines {
            order_item::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity),
                total_price: Set(line.unit_price * Decimal::from(line.quantity)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        order_status_history::ActiveModel {
            order_id: Set(order.id),
            from_status: Set(OrderStatus::Pending),
            to_status: Set(OrderStatus::Pending),
            changed_at: Set(now),
            notes: Set(Some("Order created".to_string())),
            changed_by: Set(Some(SYSTEM_ACTOR.to_string())),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order transaction");
            ServiceError::DatabaseError(e)
        })?;

        Ok(order.id)
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let mut query = OrderEntity::find()
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::Id);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        let orders = query.all(&*self.db).await?;
        Ok(project_orders(&*self.db, orders).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: i32) -> Result<OrderResponse, ServiceError> {
        let order = OrderEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| order_not_found(id))?;
        self.project_one(order).await
    }

    #[instrument(skip(self))]
    pub async fn get_order_by_number(&self, order_number: &str) -> Result<OrderResponse, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order with number {} not found.", order_number))
            })?;
        self.project_one(order).await
    }

    #[instrument(skip(self))]
    pub async fn get_orders_by_customer(
        &self,
        email: &str,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(order::Column::CustomerEmail.eq(email.trim()))
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(project_orders(&*self.db, orders).await?)
    }

    /// Audit trail for an order, newest first.
    #[instrument(skip(self))]
    pub async fn get_status_history(
        &self,
        order_id: i32,
    ) -> Result<Vec<StatusHistoryResponse>, ServiceError> {
        if OrderEntity::find_by_id(order_id).one(&*self.db).await?.is_none() {
            return Err(order_not_found(order_id));
        }

        let rows = order_status_history::Entity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_desc(order_status_history::Column::ChangedAt)
            .order_by_desc(order_status_history::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Counts and revenue over orders placed within the optional bounds.
    #[instrument(skip(self))]
    pub async fn statistics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<OrderStatistics, ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(from) = from {
            query = query.filter(order::Column::OrderDate.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(order::Column::OrderDate.lte(to));
        }
        let orders = query.all(&*self.db).await?;

        let counts = StatusCounts::tally(&orders);
        let total_revenue: Decimal = orders.iter().map(|o| round_currency(o.total_amount)).sum();
        let average_order_value = if orders.is_empty() {
            Decimal::ZERO
        } else {
            round_currency(total_revenue / Decimal::from(orders.len()))
        };

        Ok(OrderStatistics {
            total_orders: orders.len() as u64,
            pending_orders: counts.pending,
            confirmed_orders: counts.confirmed,
            processing_orders: counts.processing,
            shipped_orders: counts.shipped,
            delivered_orders: counts.delivered,
            cancelled_orders: counts.cancelled,
            returned_orders: counts.returned,
            refunded_orders: counts.refunded,
            total_revenue,
            average_order_value,
            from_date: from,
            to_date: to,
        })
    }

    /// One row per status that has orders, in ordinal order.
    #[instrument(skip(self))]
    pub async fn status_summary(&self) -> Result<Vec<OrderStatusSummary>, ServiceError> {
        let orders = OrderEntity::find().all(&*self.db).await?;

        let mut groups: BTreeMap<OrderStatus, (u64, Decimal)> = BTreeMap::new();
        for order in &orders {
            let entry = groups.entry(order.status).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += round_currency(order.total_amount);
        }

        Ok(groups
            .into_iter()
            .map(|(status, (count, total_value))| OrderStatusSummary {
                status,
                status_name: status.display_name().to_string(),
                count,
                total_value,
            })
            .collect())
    }

    async fn project_one(&self, order: order::Model) -> Result<OrderResponse, ServiceError> {
        let id = order.id;
        project_orders(&*self.db, vec![order])
            .await?
            .pop()
            .ok_or_else(|| order_not_found(id))
    }
}

struct PricedLine {
    product_id: i32,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

fn order_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Order with ID {} not found.", id))
}

fn stock_issue(product: &product::Model, requested: i32) -> Option<String> {
    if !product.in_stock {
        Some(format!("Product '{}' is out of stock", product.title))
    } else if product.stock_amount < requested {
        Some(format!(
            "Product '{}' has insufficient stock. Available: {}, Requested: {}",
            product.title, product.stock_amount, requested
        ))
    } else {
        None
    }
}

/// Conditional decrement: only succeeds while the product is in stock with at
/// least `quantity` units, so two racing orders cannot both take the last unit.
async fn decrement_stock(txn: &DatabaseTransaction, line: &PricedLine) -> Result<(), ServiceError> {
    let result = ProductEntity::update_many()
        .col_expr(
            product::Column::StockAmount,
            Expr::col(product::Column::StockAmount).sub(line.quantity),
        )
        .filter(product::Column::Id.eq(line.product_id))
        .filter(product::Column::InStock.eq(true))
        .filter(product::Column::StockAmount.gte(line.quantity))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        let issue = match ProductEntity::find_by_id(line.product_id).one(txn).await? {
            Some(current) => stock_issue(&current, line.quantity).unwrap_or_else(|| {
                format!("Product '{}' is out of stock", current.title)
            }),
            None => format!("Product '{}' is out of stock", line.product_name),
        };
        warn!(product_id = line.product_id, "Stock changed while placing order");
        return Err(ServiceError::InsufficientStock(vec![issue]));
    }

    ProductEntity::update_many()
        .col_expr(product::Column::InStock, Expr::value(false))
        .filter(product::Column::Id.eq(line.product_id))
        .filter(product::Column::StockAmount.lte(0))
        .exec(txn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn request(items: Vec<(i32, i32)>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: "Rae Lin".into(),
            customer_email: "rae@example.com".into(),
            shipping_address: "12 Harbor St".into(),
            is_pickup: false,
            billing_address: "12 Harbor St".into(),
            shipping_cost: dec!(5.99),
            notes: None,
            order_items: items
                .into_iter()
                .map(|(product_id, quantity)| CreateOrderItemRequest { product_id, quantity })
                .collect(),
        }
    }

    #[test]
    fn duplicate_products_are_merged_in_first_seen_order() {
        let lines = request(vec![(7, 1), (3, 2), (7, 4)]).validated_lines().unwrap();
        assert_eq!(lines, vec![(7, 5), (3, 2)]);
    }

    #[test]
    fn all_validation_failures_are_reported_together() {
        let mut bad = request(vec![(1, 0), (2, -3)]);
        bad.customer_name = "   ".into();
        bad.customer_email = "nope".into();
        bad.shipping_cost = dec!(-1);

        let err = bad.validated_lines().unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(ref messages) => {
            assert!(messages.contains(&"Customer name is required".to_string()));
            assert!(messages.contains(&"Customer email must be a valid email address".to_string()));
            assert!(messages.contains(&"Shipping cost cannot be negative".to_string()));
            assert!(messages.contains(&"Item 1: Quantity must be at least 1".to_string()));
            assert!(messages.contains(&"Item 2: Quantity must be at least 1".to_string()));
        });
    }

    #[test]
    fn empty_orders_are_rejected() {
        let err = request(vec![]).validated_lines().unwrap_err();
        assert_eq!(
            err.details(),
            Some(vec!["Order must contain at least one item".to_string()])
        );
    }

    #[test]
    fn request_accepts_camel_case_json() {
        let body = r#"{
            "customerName": "Rae Lin",
            "customerEmail": "rae@example.com",
            "billingAddress": "12 Harbor St",
            "isPickup": true,
            "shippingCost": "4.00",
            "orderItems": [{"productId": 1, "quantity": 2}]
        }"#;
        let parsed: CreateOrderRequest = serde_json::from_str(body).unwrap();
        assert!(parsed.is_pickup);
        assert_eq!(parsed.order_items[0].quantity, 2);
        assert!(parsed.shipping_address.is_empty());
    }

    #[test]
    fn stock_messages_name_the_product() {
        let mut product = product::Model {
            id: 1,
            title: "Black Ink 8oz".into(),
            description: String::new(),
            price: dec!(10.00),
            category_id: None,
            brand_id: None,
            stock_amount: 1,
            in_stock: true,
            is_visible: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(
            stock_issue(&product, 3).as_deref(),
            Some("Product 'Black Ink 8oz' has insufficient stock. Available: 1, Requested: 3")
        );
        assert_eq!(stock_issue(&product, 1), None);
        product.in_stock = false;
        assert_eq!(
            stock_issue(&product, 1).as_deref(),
            Some("Product 'Black Ink 8oz' is out of stock")
        );
    }
}
