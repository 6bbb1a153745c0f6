//! 共享数据类型: 媒体条目与外部列表接口的响应包络

use serde::{Deserialize, Serialize};

/// 视频摘要 (列表页单元)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub poster: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// 媒体类型 (movie / tv / ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// 一页列表结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoListPage {
    pub items: Vec<VideoSummary>,
    pub page: u32,
    pub total_pages: u32,
    /// 响应级错误: 后端返回 200 但带 error 字段
    pub error: Option<String>,
}

/// Emby 媒体库分类 (视图)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbyView {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub view_type: String,
}

/// 已配置的 Emby 实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbySource {
    pub key: String,
    pub name: String,
}

/// 列表接口响应包络, 分页字段可缺
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvelope {
    #[serde(default)]
    pub list: Vec<VideoSummary>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 分类接口响应包络
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewsEnvelope {
    #[serde(default)]
    pub views: Vec<EmbyView>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 实例列表接口响应包络
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesEnvelope {
    #[serde(default)]
    pub sources: Vec<EmbySource>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ListEnvelope {
    /// 收敛成 [`VideoListPage`]; 缺失的分页字段按单页处理
    pub fn into_page(self, requested_page: u32) -> VideoListPage {
        let page = self.page.unwrap_or(requested_page);
        VideoListPage {
            items: self.list,
            page,
            total_pages: self.total_pages.unwrap_or(page),
            error: self.error,
        }
    }
}
