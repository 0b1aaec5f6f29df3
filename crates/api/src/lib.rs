//! # Docker Cron API
//!
//! 只读HTTP接口，基于Axum：
//!
//! - `GET /events?start=yyyy-MM-dd&end=yyyy-MM-dd` - 日历事件（历史运行与预测的触发时间）
//! - `GET /logs?container=<name>&start=<yyyy-MM-dd|毫秒>` - 容器日志
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus 指标
//!
//! `/events` 与 `/logs` 出错时返回 400 和纯文本错误信息。
//!
//! ```rust,ignore
//! let app = docker_cron_api::create_app(AppState::new(fleet));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_app, create_routes, AppState};
