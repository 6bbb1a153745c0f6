//! 列表后端客户端
//! 浏览控制器消费的四个外部接口的类型化封装

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::http_client::{self, HttpClientError};
use crate::types::{EmbySource, EmbyView, ListEnvelope, SourcesEnvelope, VideoListPage, ViewsEnvelope};

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("请求超时")]
    Timeout,
    #[error("请求失败: {0}")]
    Transport(String),
    #[error("响应异常状态码: {0}")]
    BadStatus(u16),
    #[error("响应解析失败: {0}")]
    Decode(String),
    #[error("后端返回错误: {0}")]
    Backend(String),
    /// 被更新的请求取代; 不作为错误上报
    #[error("请求已取消")]
    Cancelled,
}

impl From<HttpClientError> for FetchError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::Timeout => FetchError::Timeout,
            HttpClientError::RequestFailed(msg) => FetchError::Transport(msg),
            HttpClientError::BadStatus(code) => FetchError::BadStatus(code),
            HttpClientError::DecodeFailed(msg) => FetchError::Decode(msg),
        }
    }
}

/// 列表后端抽象 (测试以桩实现替换)
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn openlist_list(&self, page: u32, page_size: u32) -> Result<VideoListPage, FetchError>;

    async fn emby_list(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
        parent_id: Option<&str>,
    ) -> Result<VideoListPage, FetchError>;

    async fn emby_views(&self, key: &str) -> Result<Vec<EmbyView>, FetchError>;

    async fn emby_sources(&self) -> Result<Vec<EmbySource>, FetchError>;
}

/// 真实 HTTP 后端
pub struct HttpBackend {
    base: Url,
}

impl HttpBackend {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[async_trait]
impl MediaBackend for HttpBackend {
    async fn openlist_list(&self, page: u32, page_size: u32) -> Result<VideoListPage, FetchError> {
        let mut url = self.endpoint("/api/openlist/list")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &page_size.to_string());
        let envelope: ListEnvelope = http_client::get_json(url.as_str()).await?;
        Ok(envelope.into_page(page))
    }

    async fn emby_list(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
        parent_id: Option<&str>,
    ) -> Result<VideoListPage, FetchError> {
        let mut url = self.endpoint("/api/emby/list")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &page.to_string())
                .append_pair("pageSize", &page_size.to_string())
                .append_pair("embyKey", key);
            if let Some(parent) = parent_id {
                pairs.append_pair("parentId", parent);
            }
        }
        let envelope: ListEnvelope = http_client::get_json(url.as_str()).await?;
        Ok(envelope.into_page(page))
    }

    async fn emby_views(&self, key: &str) -> Result<Vec<EmbyView>, FetchError> {
        let mut url = self.endpoint("/api/emby/views")?;
        url.query_pairs_mut().append_pair("embyKey", key);
        let envelope: ViewsEnvelope = http_client::get_json(url.as_str()).await?;
        if let Some(message) = envelope.error {
            return Err(FetchError::Backend(message));
        }
        Ok(envelope.views)
    }

    async fn emby_sources(&self) -> Result<Vec<EmbySource>, FetchError> {
        let url = self.endpoint("/api/emby/sources")?;
        let envelope: SourcesEnvelope = http_client::get_json(url.as_str()).await?;
        if let Some(message) = envelope.error {
            return Err(FetchError::Backend(message));
        }
        Ok(envelope.sources)
    }
}
