use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let batch = state.fleet.batch_container().await.map(|c| c.name);
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "docker-cron",
        "version": env!("CARGO_PKG_VERSION"),
        "containers": state.fleet.containers().await.len(),
        "scheduled_jobs": state.fleet.count_of_scheduled_jobs().await,
        "batch_container": batch,
    }))
}
