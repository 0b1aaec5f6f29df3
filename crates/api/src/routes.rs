use axum::{middleware::from_fn, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use docker_cron_dispatcher::Fleet;

use crate::handlers::{
    events::list_events, health::health_check, logs::container_logs, metrics::render_metrics,
};
use crate::middleware::{cors_layer, request_logging, trace_layer};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<Fleet>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self {
            fleet,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(list_events))
        .route("/logs", get(container_logs))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

/// 带中间件的完整应用
pub fn create_app(state: AppState) -> Router {
    create_routes(state)
        .layer(from_fn(request_logging))
        .layer(cors_layer())
        .layer(trace_layer())
}
