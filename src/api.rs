//! 弹幕过滤配置接口
//! GET / POST 共用同一个授权入口; 保存是整表替换, 不做合并

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{authorize, session_from_headers};
use crate::danmaku::{normalize_rules, FilterConfig, FilterType};
use crate::error::ApiError;
use crate::store::ConfigStore;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConfigStore>,
}

/// 弹幕过滤配置路由
pub fn danmaku_filter_routes() -> Router<AppState> {
    Router::new().route(
        "/api/danmaku-filter",
        get(get_filter_handler).post(save_filter_handler),
    )
}

/// GET /api/danmaku-filter - 读取当前用户的过滤配置
async fn get_filter_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session = authorize(state.store.as_ref(), session_from_headers(&headers)).await?;

    // 从未存储过配置等价于空规则表, 不是 404
    let config = state
        .store
        .danmaku_filter(&session.username)
        .await
        .map_err(|e| ApiError::internal("读取过滤配置失败", e))?
        .unwrap_or_default();

    Ok(Json(config))
}

/// POST /api/danmaku-filter - 整表替换当前用户的过滤配置
async fn save_filter_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let session = authorize(state.store.as_ref(), session_from_headers(&headers)).await?;

    // 请求体在边界内解析, 非 JSON 一律按意外失败处理
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::internal("请求体解析失败", e.into()))?;

    let Some(raw_rules) = payload.get("rules").and_then(Value::as_array) else {
        return Err(ApiError::Validation("invalid filter config"));
    };

    let rules = normalize_rules(raw_rules);
    for rule in rules.iter().filter(|r| r.kind == FilterType::Regex) {
        if Regex::new(&rule.keyword).is_err() {
            warn!(
                "用户 {} 保存了无法编译的正则规则: {}",
                session.username, rule.keyword
            );
        }
    }

    let config = FilterConfig { rules };
    state
        .store
        .set_danmaku_filter(&session.username, &config)
        .await
        .map_err(|e| ApiError::internal("写入过滤配置失败", e))?;

    info!(
        "💾 已更新用户 {} 的过滤规则: {} 条",
        session.username,
        config.rules.len()
    );
    Ok(Json(json!({ "success": true })))
}
