use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ConnectionTrait, EntityTrait, Set,
};
use tracing::debug;

use crate::{entities::order_sequence, errors::ServiceError};

/// `YYYYMMDD` key of the counter row for `now`.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

pub fn format_order_number(day_key: &str, sequence: i32) -> String {
    format!("ORD-{}-{:04}", day_key, sequence)
}

/// Takes the next number for the day of `now`. Must run inside the order's
/// transaction so the counter advance is rolled back with a failed order.
///
/// The counter is advanced with a single upsert before anything is read, so
/// the transaction holds the write lock from its first statement. Concurrent
/// creators queue on that lock instead of failing to upgrade a read lock.
pub async fn allocate_order_number<C>(conn: &C, now: DateTime<Utc>) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let key = day_key(now);

    order_sequence::Entity::insert(order_sequence::ActiveModel {
        day_key: Set(key.clone()),
        last_value: Set(1),
        updated_at: Set(now),
    })
    .on_conflict(
        OnConflict::column(order_sequence::Column::DayKey)
            .value(
                order_sequence::Column::LastValue,
                Expr::col((order_sequence::Entity, order_sequence::Column::LastValue)).add(1),
            )
            .update_column(order_sequence::Column::UpdatedAt)
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    let sequence = order_sequence::Entity::find_by_id(key.clone())
        .one(conn)
        .await?
        .map(|row| row.last_value)
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Order counter for {} vanished after upsert", key))
        })?;

    let number = format_order_number(&key, sequence);
    debug!(order_number = %number, "Allocated order number");
    Ok(number)
}
