use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use docker_cron_core::SchedulerError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Scheduler(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// 错误以纯文本返回，调度错误统一为 400
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!("请求失败 ({}): {}", status, self);
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_is_bad_request() {
        let error: ApiError = SchedulerError::container_not_found("db").into();
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_bad_request_display() {
        let error = ApiError::bad_request("start 格式无效");
        assert_eq!(error.to_string(), "请求参数错误: start 格式无效");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found() {
        let response = ApiError::NotFound("metrics".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
