//! 会话解析与授权检查
//! GET / POST 共用同一个 authorize 入口, 存储操作之前必须先通过

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::store::ConfigStore;

/// 会话 Cookie 名, 值为 percent 编码的用户名
pub const SESSION_COOKIE: &str = "library_session";

/// 已认证的会话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
}

/// 共享的管理配置 (外部对象, 字段名保持其原始大小写)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(rename = "Users", default)]
    pub users: Vec<UserEntry>,
    #[serde(rename = "adminUsername")]
    pub admin_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    #[serde(default)]
    pub banned: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            admin_username: "admin".to_string(),
        }
    }
}

/// 从 Cookie 头解析会话; 缺失/空值视为未登录
pub fn session_from_headers(headers: &HeaderMap) -> Option<Session> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name != SESSION_COOKIE {
            return None;
        }
        let username = urlencoding::decode(value).ok()?.into_owned();
        (!username.is_empty()).then(|| Session { username })
    })
}

/// 授权检查: 管理员直通, 普通用户必须出现在用户表中且未被封禁
pub async fn authorize(
    store: &dyn ConfigStore,
    session: Option<Session>,
) -> Result<Session, ApiError> {
    let session = session.ok_or(ApiError::Unauthenticated)?;
    let config = store
        .admin_config()
        .await
        .map_err(|e| ApiError::internal("读取管理配置失败", e))?;

    if session.username == config.admin_username {
        return Ok(session);
    }
    match config
        .users
        .iter()
        .find(|user| user.username == session.username)
    {
        None => Err(ApiError::Unauthorized("user not found")),
        Some(user) if user.banned => Err(ApiError::Unauthorized("user is banned")),
        Some(_) => Ok(session),
    }
}
