use axum::{
    http::{header, Method},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use media_library_api::api::{danmaku_filter_routes, AppState};
use media_library_api::store::JsonConfigStore;

#[tokio::main]
async fn main() {
    // 初始化日志
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // CORS 配置
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // 数据目录
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let state = AppState {
        store: Arc::new(JsonConfigStore::new(&data_dir)),
    };

    // 路由
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api", get(api_info_handler))
        .route("/health", get(health_handler))
        .merge(danmaku_filter_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // 启动服务器
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("🚀 媒体库后端启动在 http://{}", addr);
    info!("📁 数据目录: {}", data_dir);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// GET / - 弹幕过滤设置页面
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api - API 信息
async fn api_info_handler() -> impl IntoResponse {
    Json(json!({
        "name": "MediaLibrary API",
        "version": "0.1.0",
        "description": "私人媒体库聚合浏览后端",
        "endpoints": {
            "GET /": "弹幕过滤设置页面",
            "GET /api/danmaku-filter": "读取当前用户的过滤规则 🔐",
            "POST /api/danmaku-filter": "整表替换当前用户的过滤规则 🔐",
            "GET /health": "健康检查"
        },
        "auth": {
            "note": "🔐 标记的端点需要会话 Cookie (library_session)"
        }
    }))
}

/// 健康检查
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// 最小设置页面
const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="zh-CN">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>弹幕过滤设置</title>
  <style>
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
      background: linear-gradient(135deg, #1a1a2e 0%, #16213e 50%, #0f3460 100%);
      min-height: 100vh;
      color: #e8e8e8;
      padding: 20px;
    }
    .container { max-width: 720px; margin: 0 auto; }
    h1 {
      text-align: center;
      font-size: 1.6rem;
      margin: 30px 0 20px;
      background: linear-gradient(90deg, #ff6b9d, #c44dff);
      -webkit-background-clip: text;
      -webkit-text-fill-color: transparent;
      background-clip: text;
    }
    .add-box { display: flex; gap: 8px; margin-bottom: 16px; }
    input[type="text"], select {
      padding: 10px 14px;
      border: none;
      border-radius: 10px;
      background: rgba(255,255,255,0.1);
      color: #fff;
      font-size: 14px;
      outline: none;
    }
    input[type="text"] { flex: 1; }
    input::placeholder { color: rgba(255,255,255,0.5); }
    select option { color: #16213e; }
    button {
      padding: 10px 18px;
      border: none;
      border-radius: 10px;
      background: linear-gradient(135deg, #ff6b9d, #c44dff);
      color: #fff;
      font-size: 14px;
      font-weight: 600;
      cursor: pointer;
    }
    button:disabled { opacity: 0.6; cursor: not-allowed; }
    .rules { display: flex; flex-direction: column; gap: 8px; margin-bottom: 16px; }
    .rule {
      display: flex;
      align-items: center;
      gap: 10px;
      padding: 10px 14px;
      background: rgba(255,255,255,0.06);
      border-radius: 10px;
      font-size: 14px;
    }
    .rule.off { opacity: 0.45; }
    .rule .keyword { flex: 1; word-break: break-all; }
    .rule .tag {
      font-size: 12px;
      padding: 2px 8px;
      border-radius: 6px;
      background: rgba(196, 77, 255, 0.25);
    }
    .rule button { padding: 4px 10px; font-size: 12px; background: rgba(255,255,255,0.12); }
    .status { font-size: 13px; color: rgba(255,255,255,0.6); min-height: 18px; margin-bottom: 12px; }
    .status.error { color: #ff6b6b; }
    .empty { color: rgba(255,255,255,0.4); font-size: 14px; text-align: center; padding: 30px; }
  </style>
</head>
<body>
  <div class="container">
    <h1>🛡️ 弹幕过滤设置</h1>
    <div class="add-box">
      <input type="text" id="keyword" placeholder="输入要屏蔽的关键词或正则...">
      <select id="type">
        <option value="normal">关键词</option>
        <option value="regex">正则</option>
      </select>
      <button onclick="addRule()">添加</button>
    </div>
    <div class="status" id="status"></div>
    <div class="rules" id="rules"></div>
    <button id="saveBtn" onclick="save()">保存</button>
  </div>

  <script>
    const rulesBox = document.getElementById('rules');
    const statusBox = document.getElementById('status');
    const saveBtn = document.getElementById('saveBtn');
    let rules = [];

    function setStatus(text, isError) {
      statusBox.textContent = text || '';
      statusBox.classList.toggle('error', !!isError);
    }

    function render() {
      if (!rules.length) {
        rulesBox.innerHTML = '<div class="empty">还没有过滤规则</div>';
        return;
      }
      rulesBox.innerHTML = rules.map((rule, idx) => `
        <div class="rule ${rule.enabled ? '' : 'off'}">
          <span class="tag">${rule.type === 'regex' ? '正则' : '关键词'}</span>
          <span class="keyword">${escapeHtml(rule.keyword)}</span>
          <button onclick="toggleRule(${idx})">${rule.enabled ? '停用' : '启用'}</button>
          <button onclick="removeRule(${idx})">删除</button>
        </div>
      `).join('');
    }

    function escapeHtml(text) {
      const div = document.createElement('div');
      div.textContent = text;
      return div.innerHTML;
    }

    function addRule() {
      const input = document.getElementById('keyword');
      const keyword = input.value.trim();
      if (!keyword) return;
      rules.push({
        id: crypto.randomUUID(),
        keyword,
        type: document.getElementById('type').value,
        enabled: true
      });
      input.value = '';
      render();
    }

    function toggleRule(idx) {
      rules[idx].enabled = !rules[idx].enabled;
      render();
    }

    function removeRule(idx) {
      rules.splice(idx, 1);
      render();
    }

    async function load() {
      try {
        const res = await fetch('/api/danmaku-filter', { credentials: 'include' });
        if (!res.ok) {
          const err = await res.json();
          throw new Error(err.error || '加载失败');
        }
        const data = await res.json();
        rules = data.rules || [];
        render();
        setStatus('');
      } catch (e) {
        setStatus('加载失败: ' + e.message, true);
      }
    }

    async function save() {
      saveBtn.disabled = true;
      try {
        const res = await fetch('/api/danmaku-filter', {
          method: 'POST',
          credentials: 'include',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify({ rules })
        });
        if (!res.ok) {
          const err = await res.json();
          throw new Error(err.error || '保存失败');
        }
        setStatus('已保存');
      } catch (e) {
        setStatus('保存失败: ' + e.message, true);
      } finally {
        saveBtn.disabled = false;
      }
    }

    load();
  </script>
</body>
</html>"##;
