use axum::{
    routing::{delete, get, patch},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::cron_handler;
use crate::errors::AppError;
use crate::handlers::{self, AppState};

/// Path of the scheduled reminder trigger.
pub const CRON_REMINDERS_PATH: &str = "/api/cron/reminders";

/// Builds the full application router.
///
/// `/health` and the cron trigger sit outside the rate limiter so the
/// platform's health checks and the scheduler are never throttled.
pub fn build_router(state: Arc<AppState>) -> Result<Router, AppError> {
    // 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| AppError::InternalError("Invalid rate limiter config".to_string()))?,
    );

    let api_routes = Router::new()
        .route(
            "/api/v1/customers",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route("/api/v1/customers/:id", delete(handlers::delete_customer))
        .route(
            "/api/v1/debts",
            get(handlers::list_debts).post(handlers::create_debt),
        )
        .route(
            "/api/v1/debts/:id/status",
            patch(handlers::update_debt_status),
        )
        .route(
            "/api/v1/debts/:id/reminder",
            get(handlers::preview_reminder),
        )
        .route(
            "/api/v1/sales",
            get(handlers::list_sales).post(handlers::create_sale),
        )
        .route("/api/v1/dashboard", get(handlers::dashboard))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route(CRON_REMINDERS_PATH, get(cron_handler::run_reminders))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
