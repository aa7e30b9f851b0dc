use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::reminders::{ReminderFailure, ReminderRunReport, SELECTION_FAILED};

/// Header the hosting platform's scheduler sets on cron invocations.
pub const TRUSTED_SCHEDULER_HEADER: &str = "x-vercel-cron";
/// Header carrying the shared cron secret.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

#[derive(Debug, Default, Deserialize)]
pub struct CronQuery {
    #[serde(default)]
    pub secret: Option<String>,
}

/// Body of the cron endpoint, for both success and failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<CronFailure>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronFailure {
    pub id: String,
    pub err: String,
}

impl From<ReminderFailure> for CronFailure {
    fn from(failure: ReminderFailure) -> Self {
        Self {
            id: failure.id.to_string(),
            err: failure.err,
        }
    }
}

impl From<ReminderRunReport> for CronResponse {
    fn from(report: ReminderRunReport) -> Self {
        Self {
            ok: true,
            today: Some(report.today),
            found: Some(report.found),
            sent: Some(report.sent),
            failures: Some(report.failures.into_iter().map(CronFailure::from).collect()),
            error: None,
        }
    }
}

impl CronResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            today: None,
            found: None,
            sent: None,
            failures: None,
            error: Some(error.into()),
        }
    }
}

/// GET /api/cron/reminders
///
/// Runs the daily reminder job. Authorization happens before any store access.
/// Only an authorization failure returns a non-200 status; partial per-debt
/// failures and an aborted run are reported in the body.
pub async fn run_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CronQuery>,
) -> (StatusCode, Json<CronResponse>) {
    if let Err(e) = authorize_cron(
        state.config.cron_secret.as_deref(),
        &headers,
        query.secret.as_deref(),
    ) {
        tracing::warn!("Rejected reminder trigger: {}", e);
        return (
            StatusCode::UNAUTHORIZED,
            Json(CronResponse::failed("Unauthorized")),
        );
    }

    match state.reminders.run(Utc::now()).await {
        Ok(report) => (StatusCode::OK, Json(report.into())),
        Err(e) => {
            tracing::error!("Reminder run aborted: {}", e);
            (StatusCode::OK, Json(CronResponse::failed(SELECTION_FAILED)))
        }
    }
}

/// Authorization gate for the cron endpoint.
///
/// 1. A trusted scheduler marker header is accepted as-is.
/// 2. With no secret configured, every caller is accepted.
/// 3. Otherwise the `x-cron-secret` header, or failing that the `secret`
///    query parameter, must equal the configured secret.
pub fn authorize_cron(
    expected_secret: Option<&str>,
    headers: &HeaderMap,
    query_secret: Option<&str>,
) -> Result<(), AppError> {
    let trusted = headers
        .get(TRUSTED_SCHEDULER_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty());
    if trusted {
        return Ok(());
    }

    let Some(expected) = expected_secret else {
        return Ok(());
    };

    let supplied = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or(query_secret)
        .unwrap_or("");

    if !secrets_match(supplied, expected) {
        return Err(AppError::Unauthorized("Invalid cron secret".to_string()));
    }

    Ok(())
}

/// Constant-time comparison over SHA-256 digests of both values.
fn secrets_match(supplied: &str, expected: &str) -> bool {
    let a = Sha256::digest(supplied.as_bytes());
    let b = Sha256::digest(expected.as_bytes());

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
