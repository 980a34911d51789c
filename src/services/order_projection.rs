//! Client-facing order shapes, assembled from flat rows through id-indexed maps.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{
    category,
    order::{self, OrderStatus},
    order_item, order_status_history, product,
};
use crate::services::{catalog::ProductResponse, pricing::round_currency};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
    /// Live product, if it still exists
    pub product: Option<ProductResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i32,
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub is_pickup: bool,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    #[schema(value_type = String, example = "Pending")]
    pub status: OrderStatus,
    pub status_name: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub order_items: Vec<OrderItemResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryResponse {
    pub id: i32,
    #[schema(value_type = String, example = "Pending")]
    pub from_status: OrderStatus,
    pub from_status_name: String,
    #[schema(value_type = String, example = "Confirmed")]
    pub to_status: OrderStatus,
    pub to_status_name: String,
    pub changed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub changed_by: Option<String>,
}

impl From<order_status_history::Model> for StatusHistoryResponse {
    fn from(model: order_status_history::Model) -> Self {
        Self {
            id: model.id,
            from_status: model.from_status,
            from_status_name: model.from_status.display_name().to_string(),
            to_status: model.to_status,
            to_status_name: model.to_status.display_name().to_string(),
            changed_at: model.changed_at,
            notes: model.notes,
            changed_by: model.changed_by,
        }
    }
}

/// Order counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub confirmed: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub returned: u64,
    pub refunded: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: OrderStatus) {
        let bucket = match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Confirmed => &mut self.confirmed,
            OrderStatus::Processing => &mut self.processing,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
            OrderStatus::Returned => &mut self.returned,
            OrderStatus::Refunded => &mut self.refunded,
        };
        *bucket += 1;
    }

    pub fn tally<'a, I>(orders: I) -> Self
    where
        I: IntoIterator<Item = &'a order::Model>,
    {
        let mut counts = Self::default();
        for order in orders {
            counts.record(order.status);
        }
        counts
    }
}

/// Loads items, products and categories for `orders` in three batched queries
/// and stitches them together. Input order is preserved.
pub async fn project_orders<C>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderResponse>, DbErr>
where
    C: ConnectionTrait,
{
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;

    let product_ids: BTreeSet<i32> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<i32, product::Model> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    let category_ids: BTreeSet<i32> = products.values().filter_map(|p| p.category_id).collect();
    let categories: HashMap<i32, category::Model> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let mut items_by_order: HashMap<i32, Vec<order_item::Model>> = HashMap::new();
    for item in items {
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let lines = items_by_order
                .remove(&order.id)
                .unwrap_or_default()
                .into_iter()
                .map(|item| project_item(item, &products, &categories))
                .collect();
            project_order(order, lines)
        })
        .collect())
}

fn project_item(
    item: order_item::Model,
    products: &HashMap<i32, product::Model>,
    categories: &HashMap<i32, category::Model>,
) -> OrderItemResponse {
    let product = products.get(&item.product_id).cloned().map(|p| {
        let category = p.category_id.and_then(|id| categories.get(&id).cloned());
        ProductResponse::from_parts(p, category)
    });

    OrderItemResponse {
        id: item.id,
        product_id: item.product_id,
        product_name: item.product_name,
        unit_price: round_currency(item.unit_price),
        quantity: item.quantity,
        total_price: round_currency(item.total_price),
        product,
    }
}

fn project_order(order: order::Model, order_items: Vec<OrderItemResponse>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        order_number: order.order_number,
        order_date: order.order_date,
        customer_name: order.customer_name,
        customer_email: order.customer_email,
        shipping_address: order.shipping_address,
        billing_address: order.billing_address,
        is_pickup: order.is_pickup,
        subtotal: round_currency(order.subtotal),
        tax_amount: round_currency(order.tax_amount),
        shipping_cost: round_currency(order.shipping_cost),
        total_amount: round_currency(order.total_amount),
        status: order.status,
        status_name: order.status.display_name().to_string(),
        notes: order.notes,
        created_at: order.created_at,
        updated_at: order.updated_at,
        order_items,
    }
}
