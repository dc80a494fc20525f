use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execution/execute", post(handlers::execute_code))
        .route("/execution/validate", post(handlers::validate_code))
        .route("/execution/languages", get(handlers::supported_languages))
        .route("/execution/health", get(handlers::health_check))
        .route("/execution/test", post(handlers::run_tests))
        .route("/execution/test/single", post(handlers::run_single_test))
}
