use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use crate::{
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    errors::ServiceError,
    services::{
        order_projection::StatusCounts,
        payments::{ListPaymentIntentsParams, PaymentProcessor, PAGE_LIMIT},
        pricing::{round_currency, total_processor_fees},
    },
};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn month_name(month: u32) -> String {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
        .to_string()
}

/// `[Jan 1 00:00:00, Dec 31 23:59:59]` of `year`, in UTC.
pub fn year_window(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    let invalid = || ServiceError::ValidationError(vec![format!("Invalid report year {}", year)]);
    if !(1..=9999).contains(&year) {
        return Err(invalid());
    }
    let start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(invalid)?;
    let end = Utc
        .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
        .single()
        .ok_or_else(invalid)?;
    Ok((start, end))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue: Decimal,
    pub transactions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub year: i32,
    pub current_month: Decimal,
    pub year_to_date: Decimal,
    pub net_revenue: Decimal,
    pub total_fees: Decimal,
    pub transaction_count: u64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub processor_revenue: Decimal,
    pub processor_transaction_count: u64,
    pub processor_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyOrders {
    pub month: String,
    pub orders: u64,
    pub delivered_orders: u64,
    pub average_order_value: Decimal,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderReport {
    pub year: i32,
    pub current_month: u64,
    pub year_to_date: u64,
    pub processor_verified_payments: u64,
    pub pending_orders: u64,
    pub confirmed_orders: u64,
    pub processing_orders: u64,
    pub shipped_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
    pub returned_orders: u64,
    pub refunded_orders: u64,
    pub monthly_orders: Vec<MonthlyOrders>,
    pub processor_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub month_revenue: Decimal,
    pub month_orders: u64,
    pub month_pending_orders: u64,
    pub year_revenue: Decimal,
    pub year_orders: u64,
    pub year_pending_orders: u64,
    pub average_order_value: Decimal,
    pub total_pending: u64,
    pub total_confirmed: u64,
    pub total_processing: u64,
    pub total_shipped: u64,
    pub total_delivered: u64,
    pub total_cancelled: u64,
    pub total_refunded: u64,
    pub total_returned: u64,
}

/// Successful processor payments inside a window, with their estimated fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSummary {
    pub revenue: Decimal,
    pub fees: Decimal,
    pub transaction_count: u64,
    pub available: bool,
}

impl ProcessorSummary {
    pub fn unavailable() -> Self {
        Self {
            revenue: Decimal::ZERO,
            fees: Decimal::ZERO,
            transaction_count: 0,
            available: false,
        }
    }
}

/// Upper bound on pages fetched for one report.
pub const MAX_PROCESSOR_PAGES: u32 = 500;

/// Pages through every intent created in the window and totals the succeeded
/// ones. Any failed page makes the whole summary unavailable. Paging stops at
/// [`MAX_PROCESSOR_PAGES`] or when the cursor stops advancing.
pub async fn collect_processor_summary(
    processor: &dyn PaymentProcessor,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ProcessorSummary {
    let (start_ts, end_ts) = (start.timestamp(), end.timestamp());
    let mut params = ListPaymentIntentsParams {
        created_gte: Some(start_ts),
        created_lte: Some(end_ts),
        limit: PAGE_LIMIT,
        starting_after: None,
    };
    let mut succeeded: Vec<Decimal> = Vec::new();
    let mut pages = 0u32;

    loop {
        let page = match processor.list_payment_intents(&params).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, pages, "Payment processor unavailable, reporting without it");
                return ProcessorSummary::unavailable();
            }
        };
        pages += 1;

        for intent in page
            .data
            .iter()
            .filter(|i| i.status == "succeeded" && (start_ts..=end_ts).contains(&i.created))
        {
            succeeded.push(Decimal::new(intent.amount, 2));
        }

        let next_cursor = match page.data.last() {
            Some(last) if page.has_more => last.id.clone(),
            _ => break,
        };
        if params.starting_after.as_deref() == Some(next_cursor.as_str()) {
            warn!(pages, cursor = %next_cursor, "Processor cursor did not advance, stopping");
            break;
        }
        if pages >= MAX_PROCESSOR_PAGES {
            warn!(pages, "Processor page limit reached, totals may be partial");
            break;
        }
        params.starting_after = Some(next_cursor);
    }

    let summary = ProcessorSummary {
        revenue: round_currency(succeeded.iter().copied().sum()),
        fees: total_processor_fees(succeeded.iter().copied()),
        transaction_count: succeeded.len() as u64,
        available: true,
    };
    debug!(pages, count = summary.transaction_count, "Collected processor payments");
    summary
}

fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        round_currency(total / Decimal::from(count))
    }
}

/// Yearly and monthly rollups, cross-checked against the processor.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    processor: Arc<dyn PaymentProcessor>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { db, processor }
    }

    async fn orders_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        status: Option<OrderStatus>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let mut query = OrderEntity::find().filter(order::Column::OrderDate.gte(start));
        if let Some(end) = end {
            query = query.filter(order::Column::OrderDate.lte(end));
        }
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        Ok(query.all(&*self.db).await?)
    }

    pub async fn financial_report(&self, year: Option<i32>) -> Result<FinancialReport, ServiceError> {
        self.financial_report_at(year, Utc::now()).await
    }

    /// Revenue from delivered orders in `year`, evaluated as of `now`.
    #[instrument(skip(self))]
    pub async fn financial_report_at(
        &self,
        year: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<FinancialReport, ServiceError> {
        let year = year.unwrap_or_else(|| now.year());
        let (start, end) = year_window(year)?;
        let delivered = self
            .orders_between(start, Some(end), Some(OrderStatus::Delivered))
            .await?;
        let is_current_year = year == now.year();

        let mut year_to_date = Decimal::ZERO;
        let mut current_month = Decimal::ZERO;
        let mut months: BTreeMap<u32, (Decimal, u64)> = BTreeMap::new();
        for order in &delivered {
            let total = round_currency(order.total_amount);
            year_to_date += total;
            let month = order.order_date.month();
            if is_current_year && month == now.month() {
                current_month += total;
            }
            let entry = months.entry(month).or_insert((Decimal::ZERO, 0));
            entry.0 += total;
            entry.1 += 1;
        }

        let processor = collect_processor_summary(self.processor.as_ref(), start, end).await;
        let total_fees = processor.fees;

        Ok(FinancialReport {
            year,
            current_month,
            year_to_date,
            net_revenue: year_to_date - total_fees,
            total_fees,
            transaction_count: delivered.len() as u64,
            monthly_revenue: months
                .into_iter()
                .map(|(month, (revenue, transactions))| MonthlyRevenue {
                    month: month_name(month),
                    revenue,
                    transactions,
                })
                .collect(),
            processor_revenue: processor.revenue,
            processor_transaction_count: processor.transaction_count,
            processor_available: processor.available,
        })
    }

    pub async fn order_report(&self, year: Option<i32>) -> Result<OrderReport, ServiceError> {
        self.order_report_at(year, Utc::now()).await
    }

    /// Order counts for `year` across every status, evaluated as of `now`.
    #[instrument(skip(self))]
    pub async fn order_report_at(
        &self,
        year: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<OrderReport, ServiceError> {
        let year = year.unwrap_or_else(|| now.year());
        let (start, end) = year_window(year)?;
        let orders = self.orders_between(start, Some(end), None).await?;
        let is_current_year = year == now.year();

        #[derive(Default)]
        struct MonthAcc {
            orders: u64,
            delivered: u64,
            value: Decimal,
            delivered_revenue: Decimal,
        }

        let mut months: BTreeMap<u32, MonthAcc> = BTreeMap::new();
        let mut current_month = 0u64;
        for order in &orders {
            let month = order.order_date.month();
            if is_current_year && month == now.month() {
                current_month += 1;
            }
            let total = round_currency(order.total_amount);
            let acc = months.entry(month).or_default();
            acc.orders += 1;
            acc.value += total;
            if order.status == OrderStatus::Delivered {
                acc.delivered += 1;
                acc.delivered_revenue += total;
            }
        }

        let counts = StatusCounts::tally(&orders);
        let processor = collect_processor_summary(self.processor.as_ref(), start, end).await;

        Ok(OrderReport {
            year,
            current_month,
            year_to_date: orders.len() as u64,
            processor_verified_payments: processor.transaction_count,
            pending_orders: counts.pending,
            confirmed_orders: counts.confirmed,
            processing_orders: counts.processing,
            shipped_orders: counts.shipped,
            delivered_orders: counts.delivered,
            cancelled_orders: counts.cancelled,
            returned_orders: counts.returned,
            refunded_orders: counts.refunded,
            monthly_orders: months
                .into_iter()
                .map(|(month, acc)| MonthlyOrders {
                    month: month_name(month),
                    orders: acc.orders,
                    delivered_orders: acc.delivered,
                    average_order_value: average(acc.value, acc.orders),
                    total_revenue: acc.delivered_revenue,
                })
                .collect(),
            processor_available: processor.available,
        })
    }

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ServiceError> {
        self.dashboard_summary_at(Utc::now()).await
    }

    /// Month-to-date and year-to-date figures for the year containing `now`.
    #[instrument(skip(self))]
    pub async fn dashboard_summary_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, ServiceError> {
        let (year_start, _) = year_window(now.year())?;
        let orders = self.orders_between(year_start, None, None).await?;

        let mut summary = DashboardSummary {
            month_revenue: Decimal::ZERO,
            month_orders: 0,
            month_pending_orders: 0,
            year_revenue: Decimal::ZERO,
            year_orders: orders.len() as u64,
            year_pending_orders: 0,
            average_order_value: Decimal::ZERO,
            total_pending: 0,
            total_confirmed: 0,
            total_processing: 0,
            total_shipped: 0,
            total_delivered: 0,
            total_cancelled: 0,
            total_refunded: 0,
            total_returned: 0,
        };

        let mut year_value = Decimal::ZERO;
        for order in &orders {
            let total = round_currency(order.total_amount);
            let in_month =
                order.order_date.year() == now.year() && order.order_date.month() == now.month();
            let delivered = order.status == OrderStatus::Delivered;
            let pending = order.status == OrderStatus::Pending;

            year_value += total;
            if delivered {
                summary.year_revenue += total;
            }
            if pending {
                summary.year_pending_orders += 1;
            }
            if in_month {
                summary.month_orders += 1;
                if delivered {
                    summary.month_revenue += total;
                }
                if pending {
                    summary.month_pending_orders += 1;
                }
            }
        }

        let counts = StatusCounts::tally(&orders);
        summary.average_order_value = average(year_value, summary.year_orders);
        summary.total_pending = counts.pending;
        summary.total_confirmed = counts.confirmed;
        summary.total_processing = counts.processing;
        summary.total_shipped = counts.shipped;
        summary.total_delivered = counts.delivered;
        summary.total_cancelled = counts.cancelled;
        summary.total_refunded = counts.refunded;
        summary.total_returned = counts.returned;

        Ok(summary)
    }
}
