use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
        order_status_history,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

pub const SYSTEM_ACTOR: &str = "System";

/// Statuses reachable from `from` in a single step.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Processing, Cancelled],
        Processing => &[Shipped, Cancelled],
        Shipped => &[Delivered],
        Delivered => &[Refunded],
        Cancelled => &[Refunded],
        Refunded => &[],
        // Declared for compatibility; no path leads here and none leaves.
        Returned => &[],
    }
}

pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition { from, to })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    /// Target status, by name or ordinal
    #[schema(value_type = String, example = "Confirmed")]
    pub status: OrderStatus,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 100, message = "Changed by cannot exceed 100 characters"))]
    pub changed_by: Option<String>,
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Moves an order to a new status and appends the audit row in the same transaction.
    #[instrument(skip(self, request), fields(to = %request.status))]
    pub async fn update_status(
        &self,
        order_id: i32,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderModel, ServiceError> {
        request.validate()?;
        self.update_status_at(order_id, request, Utc::now()).await
    }

    pub async fn update_status_at(
        &self,
        order_id: i32,
        request: UpdateOrderStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderModel, ServiceError> {
        let to = request.status;
        let current = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order with ID {} not found.", order_id)))?;
        let from = current.status;

        if let Err(e) = ensure_transition(from, to) {
            warn!(%from, %to, "Rejected order status transition");
            return Err(e);
        }

        // The transaction opens with the guarded write, so it never has to upgrade a read lock.
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin status update transaction");
            ServiceError::DatabaseError(e)
        })?;

        // Guard on the status we validated against so a concurrent update cannot be overwritten.
        let result = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(to.ordinal()))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(from))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Order with ID {} was modified concurrently; retry the status change.",
                order_id
            )));
        }

        order_status_history::ActiveModel {
            order_id: Set(order_id),
            from_status: Set(from),
            to_status: Set(to),
            changed_at: Set(now),
            notes: Set(request.notes),
            changed_by: Set(Some(
                request
                    .changed_by
                    .filter(|actor| !actor.trim().is_empty())
                    .unwrap_or_else(|| SYSTEM_ACTOR.to_string()),
            )),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let updated = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order with ID {} not found.", order_id)))?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(%from, %to, "Order status updated");
        metrics::counter!("atsyn.orders.status_changed", 1);

        if let Err(e) = self
            .event_sender
            .publish(Event::OrderStatusChanged { order_id, from, to })
        {
            warn!(error = %e, "Failed to publish status change event");
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use OrderStatus::*;

    #[rstest]
    #[case(Pending, Confirmed, true)]
    #[case(Pending, Cancelled, true)]
    #[case(Pending, Shipped, false)]
    #[case(Pending, Pending, false)]
    #[case(Confirmed, Processing, true)]
    #[case(Confirmed, Cancelled, true)]
    #[case(Confirmed, Delivered, false)]
    #[case(Processing, Shipped, true)]
    #[case(Processing, Cancelled, true)]
    #[case(Shipped, Delivered, true)]
    #[case(Shipped, Cancelled, false)]
    #[case(Delivered, Refunded, true)]
    #[case(Delivered, Returned, false)]
    #[case(Cancelled, Refunded, true)]
    #[case(Cancelled, Pending, false)]
    #[case(Refunded, Pending, false)]
    #[case(Returned, Refunded, false)]
    fn transition_table(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] ok: bool) {
        assert_eq!(is_valid_transition(from, to), ok);
    }

    #[test]
    fn every_pair_agrees_with_the_adjacency_list() {
        let edges = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Processing),
            (Confirmed, Cancelled),
            (Processing, Shipped),
            (Processing, Cancelled),
            (Shipped, Delivered),
            (Delivered, Refunded),
            (Cancelled, Refunded),
        ];
        let mut accepted = 0;
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = edges.contains(&(from, to));
                assert_eq!(is_valid_transition(from, to), expected, "{from} -> {to}");
                accepted += usize::from(expected);
            }
        }
        assert_eq!(accepted, edges.len());
    }

    #[test]
    fn returned_is_unreachable() {
        assert!(OrderStatus::ALL
            .iter()
            .all(|from| !allowed_transitions(*from).contains(&Returned)));
        assert!(allowed_transitions(Returned).is_empty());
    }

    #[test]
    fn rejection_names_both_ends() {
        let err = ensure_transition(Pending, Shipped).unwrap_err();
        assert_eq!(err.to_string(), "Invalid status transition from Pending to Shipped");
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        (1..=8i32).prop_map(|n| OrderStatus::from_ordinal(n).unwrap())
    }

    proptest! {
        #[test]
        fn no_self_loops_and_terminal_states_stay_terminal(from in any_status(), to in any_status()) {
            if from == to {
                prop_assert!(!is_valid_transition(from, to));
            }
            if matches!(from, Refunded | Returned) {
                prop_assert!(!is_valid_transition(from, to));
            }
            prop_assert_eq!(ensure_transition(from, to).is_ok(), is_valid_transition(from, to));
        }

        #[test]
        fn nothing_returns_to_pending(from in any_status()) {
            prop_assert!(!is_valid_transition(from, Pending));
        }
    }
}
