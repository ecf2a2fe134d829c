use crate::api::error::AppError;
use crate::entities::{operations, prelude::*};
use crate::services::operations::OperationStatus;
use axum::{Json, extract::State};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

/// How far ahead a carrier payment shows up on the dashboard.
const REMINDER_WINDOW_DAYS: i64 = 7;

#[derive(Serialize, ToSchema)]
pub struct PaymentReminder {
    pub operation_id: String,
    pub voyage_no: String,
    pub carrier_name: String,
    pub due_date: DateTime<Utc>,
    pub amount: f64,
    pub currency: String,
    pub days_left: i64,
    pub is_overdue: bool,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_carriers: u64,
    pub total_customers: u64,
    pub active_operations: u64,
    pub completed_operations: u64,
    pub upcoming_payments: Vec<PaymentReminder>,
}

#[utoipa::path(
    get,
    path = "/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard counters and payment reminders", body = DashboardStats)
    ),
    security(("jwt" = [])),
    tag = "dashboard"
)]
pub async fn dashboard_stats(
    State(state): State<crate::AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    let total_carriers = Carriers::find().count(&state.db).await?;
    let total_customers = Customers::find().count(&state.db).await?;
    let active_operations = Operations::find()
        .filter(operations::Column::IsActive.eq(true))
        .count(&state.db)
        .await?;
    let completed_operations = Operations::find()
        .filter(operations::Column::Status.eq(OperationStatus::CarrierPaid.as_str()))
        .count(&state.db)
        .await?;

    // Due date derives from the unloading date plus the agreed payment
    // term. Paid shipments carry no reminder.
    let now = Utc::now();
    let upcoming_payments = Operations::find()
        .filter(operations::Column::IsActive.eq(true))
        .filter(operations::Column::Status.ne(OperationStatus::CarrierPaid.as_str()))
        .order_by_asc(operations::Column::UnloadingDate)
        .all(&state.db)
        .await?
        .into_iter()
        .filter_map(|op| {
            let due_date = op.unloading_date + Duration::days(op.payment_term_days as i64);
            let days_left = (due_date - now).num_days();
            if days_left > REMINDER_WINDOW_DAYS {
                return None;
            }
            Some(PaymentReminder {
                operation_id: op.id,
                voyage_no: op.voyage_no,
                carrier_name: op.carrier_name,
                due_date,
                amount: op.total_amount,
                currency: op.currency,
                days_left,
                is_overdue: days_left < 0,
            })
        })
        .collect();

    Ok(Json(DashboardStats {
        total_carriers,
        total_customers,
        active_operations,
        completed_operations,
        upcoming_payments,
    }))
}
