use axum::extract::State;

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

/// Prometheus 文本格式的指标
pub async fn render_metrics(State(state): State<AppState>) -> ApiResult<String> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or_else(|| ApiError::NotFound("未安装指标导出器".to_string()))
}
