use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::engine::reporting::{self, AdminStats, CustomerSummary, DriverSummary};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/customers", get(customers))
        .route("/admin/drivers", get(drivers))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<AdminStats> {
    Json(reporting::admin_stats(&state))
}

async fn customers(State(state): State<Arc<AppState>>) -> Json<Vec<CustomerSummary>> {
    Json(reporting::customers(&state))
}

async fn drivers(State(state): State<Arc<AppState>>) -> Json<Vec<DriverSummary>> {
    Json(reporting::drivers(&state))
}
