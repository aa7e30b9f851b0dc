use crate::config::Config;
use crate::db_storage::ShopStorage;
use crate::errors::{AppError, ResultExt};
use crate::ledger;
use crate::models::*;
use crate::reminder_message::{build_reminder_message, ReminderMessage, ReminderRequest};
use crate::reminders::{start_of_utc_day, ReminderRunner, DEFAULT_CUSTOMER_NAME};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Postgres-backed storage for the CRUD endpoints.
    pub storage: ShopStorage,
    /// Application configuration.
    pub config: Config,
    /// Reminder job, triggered by the cron endpoint.
    pub reminders: ReminderRunner,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "mokhtar-reminders",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

// ============ Customers ============

/// GET /api/v1/customers
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Customer>>, AppError> {
    Ok(Json(state.storage.list_customers().await?))
}

/// POST /api/v1/customers
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let input = ledger::validate_new_customer(input)?;
    let customer = state.storage.create_customer(&input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// DELETE /api/v1/customers/:id
pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.storage.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Debts ============

/// GET /api/v1/debts?filter=ALL|PENDING|OVERDUE|PAID|DUE_TODAY
pub async fn list_debts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebtListParams>,
) -> Result<Json<Vec<Debt>>, AppError> {
    let today = Utc::now().date_naive();
    Ok(Json(state.storage.list_debts(params.filter, today).await?))
}

/// POST /api/v1/debts
pub async fn create_debt(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewDebt>,
) -> Result<(StatusCode, Json<Debt>), AppError> {
    let input = ledger::validate_new_debt(input)?;
    let debt = state.storage.create_debt(&input).await?;
    Ok((StatusCode::CREATED, Json(debt)))
}

/// PATCH /api/v1/debts/:id/status
pub async fn update_debt_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<DebtStatusUpdate>,
) -> Result<Json<Debt>, AppError> {
    Ok(Json(state.storage.update_debt_status(id, update.status).await?))
}

/// GET /api/v1/debts/:id/reminder
///
/// Composes the reminder for one debt so staff can open the click-to-chat
/// link by hand. `converted` adds a currency conversion annotation.
pub async fn preview_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ReminderPreviewParams>,
) -> Result<Json<ReminderMessage>, AppError> {
    let debt = state
        .storage
        .find_debt(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Debt with id {} not found", id)))?;
    let customer = state
        .storage
        .find_customer(debt.customer_id)
        .await
        .with_context(|| format!("Loading customer for debt {}", id))?
        .ok_or_else(|| {
            AppError::NotFound(format!("Customer with id {} not found", debt.customer_id))
        })?;

    if customer.phone.trim().is_empty() {
        return Err(AppError::BadRequest(format!(
            "Customer {} has no phone number",
            customer.id
        )));
    }

    let name = if customer.name.trim().is_empty() {
        DEFAULT_CUSTOMER_NAME
    } else {
        customer.name.as_str()
    };

    Ok(Json(build_reminder_message(&ReminderRequest {
        name,
        phone: &customer.phone,
        amount: &debt.amount,
        currency: debt.currency,
        due_date: debt.due_date,
        debt_type: debt.debt_type,
        converted_text: params.converted.as_deref(),
    })))
}

// ============ Sales ============

/// GET /api/v1/sales
pub async fn list_sales(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Sale>>, AppError> {
    Ok(Json(state.storage.list_sales().await?))
}

/// POST /api/v1/sales
///
/// A DEBT sale that is not fully paid also creates a linked pending debt.
pub async fn create_sale(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewSale>,
) -> Result<(StatusCode, Json<SaleCreated>), AppError> {
    let input = ledger::validate_new_sale(input)?;
    let today = Utc::now().date_naive();
    let created = state.storage.create_sale(&input, today).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// ============ Dashboard ============

/// GET /api/v1/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardSummary>, AppError> {
    let now = Utc::now();
    let today = now.date_naive();
    let day_start = start_of_utc_day(now);

    let sales = state
        .storage
        .sales_between(day_start, day_start + Duration::days(1))
        .await?;
    let debts = state.storage.open_debts().await?;

    Ok(Json(ledger::summarize_dashboard(&sales, &debts, today)))
}
