//! 配置存储
//! 管理配置与每用户的弹幕过滤配置都以 JSON 文档落在数据目录下

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::Context;
use async_trait::async_trait;
use tracing::warn;

use crate::auth::AdminConfig;
use crate::danmaku::FilterConfig;

/// 管理配置文件名
const ADMIN_CONFIG_FILE: &str = "admin.json";
/// 每用户过滤配置目录
const FILTER_DIR: &str = "danmaku_filter";

/// 配置存取抽象; 具体落盘格式由实现决定
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn admin_config(&self) -> anyhow::Result<AdminConfig>;

    /// 从未存储过配置返回 None, 不是错误
    async fn danmaku_filter(&self, username: &str) -> anyhow::Result<Option<FilterConfig>>;

    /// 整体替换该用户的配置 (last-writer-wins)
    async fn set_danmaku_filter(
        &self,
        username: &str,
        config: &FilterConfig,
    ) -> anyhow::Result<()>;
}

/// 基于本地 JSON 文件的存储
pub struct JsonConfigStore {
    root: PathBuf,
}

impl JsonConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // 用户名 percent 编码后做文件名, 防止路径穿越
    fn filter_path(&self, username: &str) -> PathBuf {
        self.root
            .join(FILTER_DIR)
            .join(format!("{}.json", urlencoding::encode(username)))
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn admin_config(&self) -> anyhow::Result<AdminConfig> {
        let path = self.root.join(ADMIN_CONFIG_FILE);
        if !path.exists() {
            warn!("管理配置 {} 不存在, 使用默认配置", path.display());
            return Ok(AdminConfig::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取 {} 失败", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("解析 {} 失败", path.display()))?;
        Ok(config)
    }

    async fn danmaku_filter(&self, username: &str) -> anyhow::Result<Option<FilterConfig>> {
        let path = self.filter_path(username);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取 {} 失败", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("解析 {} 失败", path.display()))?;
        Ok(Some(config))
    }

    async fn set_danmaku_filter(
        &self,
        username: &str,
        config: &FilterConfig,
    ) -> anyhow::Result<()> {
        let path = self.filter_path(username);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("创建 {} 失败", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&path, content).with_context(|| format!("写入 {} 失败", path.display()))?;
        Ok(())
    }
}

/// 内存存储, 供测试与演示使用
#[derive(Default)]
pub struct MemoryStore {
    admin: RwLock<AdminConfig>,
    filters: RwLock<HashMap<String, FilterConfig>>,
}

impl MemoryStore {
    pub fn new(admin: AdminConfig) -> Self {
        Self {
            admin: RwLock::new(admin),
            filters: RwLock::default(),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn admin_config(&self) -> anyhow::Result<AdminConfig> {
        Ok(self.admin.read().unwrap().clone())
    }

    async fn danmaku_filter(&self, username: &str) -> anyhow::Result<Option<FilterConfig>> {
        Ok(self.filters.read().unwrap().get(username).cloned())
    }

    async fn set_danmaku_filter(
        &self,
        username: &str,
        config: &FilterConfig,
    ) -> anyhow::Result<()> {
        self.filters
            .write()
            .unwrap()
            .insert(username.to_string(), config.clone());
        Ok(())
    }
}
