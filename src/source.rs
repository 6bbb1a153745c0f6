//! 数据源选择
//! URL 里同时存在两种编码: 导航用 "emby:<key>", 视频卡片用 "emby_<key>";
//! 下游消费卡片编码, 因此解析端两者都认, 不做统一

/// 运行时开关, 构造控制器时显式注入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowseFlags {
    pub openlist_enabled: bool,
    pub emby_enabled: bool,
}

/// 全部分类
pub const VIEW_ALL: &str = "all";

/// 浏览数据源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    OpenList,
    /// key 为 None 表示尚未选定实例, 等实例列表返回后默认选第一个
    Emby { key: Option<String> },
}

impl Default for LibrarySource {
    fn default() -> Self {
        LibrarySource::OpenList
    }
}

impl LibrarySource {
    /// 解析 source 参数, 两种编码都接受; 无法识别回落到 OpenList
    pub fn parse(raw: &str) -> Self {
        match raw {
            "openlist" => LibrarySource::OpenList,
            "emby" => LibrarySource::Emby { key: None },
            _ => {
                if let Some(key) = raw
                    .strip_prefix("emby:")
                    .or_else(|| raw.strip_prefix("emby_"))
                {
                    let key = (!key.is_empty()).then(|| key.to_string());
                    return LibrarySource::Emby { key };
                }
                LibrarySource::OpenList
            }
        }
    }

    /// 导航编码 (冒号形式)
    pub fn nav_value(&self) -> String {
        match self {
            LibrarySource::OpenList => "openlist".to_string(),
            LibrarySource::Emby { key: None } => "emby".to_string(),
            LibrarySource::Emby { key: Some(key) } => format!("emby:{}", key),
        }
    }

    /// 视频卡片编码 (下划线形式)
    pub fn card_value(&self) -> String {
        match self {
            LibrarySource::OpenList => "openlist".to_string(),
            LibrarySource::Emby { key: None } => "emby".to_string(),
            LibrarySource::Emby { key: Some(key) } => format!("emby_{}", key),
        }
    }

    pub fn is_emby(&self) -> bool {
        matches!(self, LibrarySource::Emby { .. })
    }

    pub fn emby_key(&self) -> Option<&str> {
        match self {
            LibrarySource::Emby { key: Some(key) } => Some(key),
            _ => None,
        }
    }
}

/// 从初始 URL 参数解析数据源并套用运行时开关
pub fn resolve_initial(raw: Option<&str>, flags: BrowseFlags) -> LibrarySource {
    apply_flags(raw.map(LibrarySource::parse).unwrap_or_default(), flags)
}

/// 开关约束: OpenList 关闭而 Emby 可用时, 无条件改走 Emby
pub fn apply_flags(source: LibrarySource, flags: BrowseFlags) -> LibrarySource {
    if !flags.openlist_enabled && flags.emby_enabled && !source.is_emby() {
        return LibrarySource::Emby { key: None };
    }
    source
}

/// 生成规范查询串; view 为 "all" 时省略
pub fn browse_query(source: &LibrarySource, view: &str) -> String {
    let mut query = format!("source={}", urlencoding::encode(&source.nav_value()));
    if view != VIEW_ALL {
        query.push_str("&view=");
        query.push_str(&urlencoding::encode(view));
    }
    query
}
