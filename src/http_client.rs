use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;

const TIMEOUT_SECONDS: u64 = 15;

const USER_AGENT: &str = "media-library-api/0.1";

/// 全局 HTTP 客户端
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECONDS))
        .user_agent(USER_AGENT)
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to create HTTP client")
});

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("请求超时")]
    Timeout,
    #[error("请求失败: {0}")]
    RequestFailed(String),
    #[error("响应异常状态码: {0}")]
    BadStatus(u16),
    #[error("响应解析失败: {0}")]
    DecodeFailed(String),
}

/// GET 请求
pub async fn get(url: &str) -> Result<Response, HttpClientError> {
    let response = HTTP_CLIENT.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            HttpClientError::Timeout
        } else {
            HttpClientError::RequestFailed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(HttpClientError::BadStatus(response.status().as_u16()));
    }

    Ok(response)
}

/// GET 请求并解析 JSON
pub async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T, HttpClientError> {
    let response = get(url).await?;
    response
        .json()
        .await
        .map_err(|e| HttpClientError::DecodeFailed(e.to_string()))
}
