//! 服务端错误类型
//! 边界处统一收口: 内部细节进日志, 响应只带稳定的提示语

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 无会话
    #[error("authentication required")]
    Unauthenticated,
    /// 有会话但用户不合法 (不存在或已封禁)
    #[error("{0}")]
    Unauthorized(&'static str),
    /// 请求体不满足契约
    #[error("{0}")]
    Validation(&'static str),
    /// 其余一切意外失败, 细节已在构造时写入日志
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    /// 记录内部细节并降级为通用 500
    pub fn internal(context: &'static str, err: anyhow::Error) -> Self {
        tracing::error!("{}: {:#}", context, err);
        ApiError::Internal
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
