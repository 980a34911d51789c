use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub is_pickup: bool,
    pub billing_address: String,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub shipping_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order lifecycle status, persisted as its integer ordinal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(try_from = "StatusInput")]
#[strum(ascii_case_insensitive)]
pub enum OrderStatus {
    #[sea_orm(num_value = 1)]
    Pending,
    #[sea_orm(num_value = 2)]
    Confirmed,
    #[sea_orm(num_value = 3)]
    Processing,
    #[sea_orm(num_value = 4)]
    Shipped,
    #[sea_orm(num_value = 5)]
    Delivered,
    #[sea_orm(num_value = 6)]
    Cancelled,
    #[sea_orm(num_value = 7)]
    Returned,
    #[sea_orm(num_value = 8)]
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
    ];

    pub fn ordinal(self) -> i32 {
        match self {
            OrderStatus::Pending => 1,
            OrderStatus::Confirmed => 2,
            OrderStatus::Processing => 3,
            OrderStatus::Shipped => 4,
            OrderStatus::Delivered => 5,
            OrderStatus::Cancelled => 6,
            OrderStatus::Returned => 7,
            OrderStatus::Refunded => 8,
        }
    }

    pub fn from_ordinal(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.ordinal() == value)
    }

    /// Human-readable label shown to customers and operators.
    pub fn display_name(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
            OrderStatus::Refunded => "Refunded",
        }
    }

    /// Parses either a status name (any case) or its ordinal.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if let Ok(status) = OrderStatus::from_str(trimmed) {
            return Ok(status);
        }
        trimmed
            .parse::<i32>()
            .ok()
            .and_then(OrderStatus::from_ordinal)
            .ok_or_else(|| format!("Unknown order status '{}'", trimmed))
    }
}

/// Wire form accepted for a status: a name or an integer ordinal.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatusInput {
    Ordinal(i32),
    Name(String),
}

impl TryFrom<StatusInput> for OrderStatus {
    type Error = String;

    fn try_from(value: StatusInput) -> Result<Self, Self::Error> {
        match value {
            StatusInput::Ordinal(n) => OrderStatus::from_ordinal(n)
                .ok_or_else(|| format!("Unknown order status ordinal {}", n)),
            StatusInput::Name(name) => OrderStatus::parse(&name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveEnum;

    #[test]
    fn ordinals_match_persisted_values() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_value(), status.ordinal());
            assert_eq!(OrderStatus::from_ordinal(status.ordinal()), Some(status));
        }
        assert_eq!(OrderStatus::Returned.ordinal(), 7);
        assert_eq!(OrderStatus::Refunded.ordinal(), 8);
        assert_eq!(OrderStatus::from_ordinal(0), None);
    }

    #[test]
    fn parses_names_and_ordinals() {
        assert_eq!(OrderStatus::parse("confirmed"), Ok(OrderStatus::Confirmed));
        assert_eq!(OrderStatus::parse("SHIPPED"), Ok(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("5"), Ok(OrderStatus::Delivered));
        assert!(OrderStatus::parse("lost").is_err());
    }

    #[test]
    fn json_accepts_name_or_ordinal_and_emits_name() {
        let by_name: OrderStatus = serde_json::from_str("\"processing\"").unwrap();
        let by_ordinal: OrderStatus = serde_json::from_str("3").unwrap();
        assert_eq!(by_name, OrderStatus::Processing);
        assert_eq!(by_ordinal, OrderStatus::Processing);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"Processing\""
        );
        assert!(serde_json::from_str::<OrderStatus>("42").is_err());
    }
}
