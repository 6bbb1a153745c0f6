//! 弹幕关键词过滤规则
//! 规范化是全函数: 任意形状的输入都映射到严格的规则类型, 从不拒绝

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 规则匹配方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Normal,
    Regex,
}

/// 单条过滤规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    /// 客户端生成的标识, 新建规则入库前可能缺失
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub keyword: String,
    #[serde(default, rename = "type")]
    pub kind: FilterType,
    #[serde(default)]
    pub enabled: bool,
}

/// 每个用户的过滤配置, 规则按显示/应用顺序排列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

/// 单条规则规范化:
/// keyword 强制为字符串 (缺失/非字符串归空), type 仅认 "regex", enabled 按真值处理
pub fn normalize_rule(raw: &Value) -> FilterRule {
    FilterRule {
        id: raw.get("id").and_then(Value::as_str).map(str::to_string),
        keyword: raw
            .get("keyword")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        kind: match raw.get("type").and_then(Value::as_str) {
            Some("regex") => FilterType::Regex,
            _ => FilterType::Normal,
        },
        enabled: raw.get("enabled").map(truthy).unwrap_or(false),
    }
}

/// 整表规范化
pub fn normalize_rules(raw: &[Value]) -> Vec<FilterRule> {
    raw.iter().map(normalize_rule).collect()
}

// null / false / 0 / "" 为假, 其余为真
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl FilterRule {
    /// 判断一条弹幕是否命中本规则; 无法编译的正则退化为子串匹配
    pub fn matches(&self, text: &str) -> bool {
        if !self.enabled || self.keyword.is_empty() {
            return false;
        }
        match self.kind {
            FilterType::Normal => text.contains(&self.keyword),
            FilterType::Regex => match Regex::new(&self.keyword) {
                Ok(re) => re.is_match(text),
                Err(_) => text.contains(&self.keyword),
            },
        }
    }
}

impl FilterConfig {
    /// 顺序扫描, 首个命中的启用规则即屏蔽
    pub fn should_block(&self, text: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(text))
    }
}
