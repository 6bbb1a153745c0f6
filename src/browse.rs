//! 媒体库浏览控制器
//! 单任务事件循环: 命令入队处理, 分页抓取带协作取消, 状态经 watch 通道对外广播.
//! 同一控制器同一时刻最多一个未取消的列表请求可以提交结果 —
//! 触发新请求前先取消旧请求, 再以代数校验兜底, 过期响应永远覆盖不了新状态.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{FetchError, MediaBackend};
use crate::source::{apply_flags, browse_query, resolve_initial, BrowseFlags, LibrarySource, VIEW_ALL};
use crate::types::{EmbySource, EmbyView, VideoListPage, VideoSummary};

/// 每页条数
pub const PAGE_SIZE: u32 = 20;

/// 拉取失败的统一提示语
const FETCH_ERROR_MESSAGE: &str = "加载失败，请稍后重试";

/// 初始 URL 查询参数
#[derive(Debug, Clone, Default)]
pub struct InitialQuery {
    pub source: Option<String>,
    pub view: Option<String>,
}

/// 对外状态快照
#[derive(Debug, Clone)]
pub struct BrowseState {
    pub source: LibrarySource,
    pub selected_view: String,
    pub views: Vec<EmbyView>,
    pub sources: Vec<EmbySource>,
    pub items: Vec<VideoSummary>,
    /// 已提交的最后一页 (1 起)
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<String>,
    /// 规范化后的地址栏查询串, 初始化完成后才开始同步
    pub query: String,
    pub initialized: bool,
}

impl Default for BrowseState {
    fn default() -> Self {
        Self {
            source: LibrarySource::default(),
            selected_view: VIEW_ALL.to_string(),
            views: Vec::new(),
            sources: Vec::new(),
            items: Vec::new(),
            page: 1,
            has_more: true,
            loading: false,
            loading_more: false,
            error: None,
            query: String::new(),
            initialized: false,
        }
    }
}

enum Msg {
    Select(LibrarySource),
    SelectView(String),
    LoadMore,
    Shutdown,
    PageLoaded {
        generation: u64,
        page: u32,
        result: Result<VideoListPage, FetchError>,
    },
    ViewsLoaded {
        generation: u64,
        result: Result<Vec<EmbyView>, FetchError>,
    },
    SourcesLoaded {
        generation: u64,
        result: Result<Vec<EmbySource>, FetchError>,
    },
}

/// 控制器句柄; 克隆共享同一个状态机
#[derive(Clone)]
pub struct BrowseController {
    tx: mpsc::Sender<Msg>,
    state_rx: watch::Receiver<BrowseState>,
}

impl BrowseController {
    /// 启动状态机并立即按初始 URL 参数解析数据源
    pub fn spawn(
        backend: Arc<dyn MediaBackend>,
        flags: BrowseFlags,
        initial: InitialQuery,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(BrowseState::default());
        let machine = Machine::new(backend, flags, tx.clone(), state_tx);
        tokio::spawn(machine.run(rx, initial));
        Self { tx, state_rx }
    }

    pub async fn select_source(&self, source: LibrarySource) {
        let _ = self.tx.send(Msg::Select(source)).await;
    }

    pub async fn select_view(&self, view: impl Into<String>) {
        let _ = self.tx.send(Msg::SelectView(view.into())).await;
    }

    /// 列表末尾可见性信号: 还有下一页且无请求在途时翻页
    pub async fn load_more(&self) {
        let _ = self.tx.send(Msg::LoadMore).await;
    }

    /// 主动停机; 丢弃全部句柄等价
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown).await;
    }

    /// 当前快照
    pub fn state(&self) -> BrowseState {
        self.state_rx.borrow().clone()
    }

    /// 状态订阅, 先给当前值再给后续变化
    pub fn updates(&self) -> impl Stream<Item = BrowseState> + Unpin {
        WatchStream::new(self.state_rx.clone())
    }

    /// 原始 watch 接收端
    pub fn watch(&self) -> watch::Receiver<BrowseState> {
        self.state_rx.clone()
    }
}

/// 状态机本体, 只归属后台任务
struct Machine {
    backend: Arc<dyn MediaBackend>,
    flags: BrowseFlags,
    tx: mpsc::Sender<Msg>,
    state_tx: watch::Sender<BrowseState>,
    state: BrowseState,
    /// 重置代数, 旧代的抓取结果一律丢弃
    generation: u64,
    /// 在途列表请求的取消令牌
    inflight: Option<CancellationToken>,
    /// 在途页码, None 表示没有列表请求在途
    inflight_page: Option<u32>,
    /// URL 携带的待恢复分类
    pending_view: Option<String>,
    /// 一次性恢复闩: 首次分类加载成功后置位, 此后不再尝试
    has_restored_view: bool,
}

impl Machine {
    fn new(
        backend: Arc<dyn MediaBackend>,
        flags: BrowseFlags,
        tx: mpsc::Sender<Msg>,
        state_tx: watch::Sender<BrowseState>,
    ) -> Self {
        Self {
            backend,
            flags,
            tx,
            state_tx,
            state: BrowseState::default(),
            generation: 0,
            inflight: None,
            inflight_page: None,
            pending_view: None,
            has_restored_view: false,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Msg>, initial: InitialQuery) {
        self.initialize(initial);
        loop {
            let msg = tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(msg) => msg,
                    None => break,
                },
                // 所有句柄都已丢弃
                _ = self.state_tx.closed() => break,
            };
            match msg {
                Msg::Select(source) => self.on_select_source(source),
                Msg::SelectView(view) => self.on_select_view(view),
                Msg::LoadMore => self.on_load_more(),
                Msg::Shutdown => break,
                Msg::PageLoaded {
                    generation,
                    page,
                    result,
                } => self.on_page_loaded(generation, page, result),
                Msg::ViewsLoaded { generation, result } => {
                    self.on_views_loaded(generation, result)
                }
                Msg::SourcesLoaded { generation, result } => {
                    self.on_sources_loaded(generation, result)
                }
            }
            self.publish();
        }
        self.cancel_inflight();
    }

    fn initialize(&mut self, initial: InitialQuery) {
        self.state.source = resolve_initial(initial.source.as_deref(), self.flags);
        // view 参数留待首次分类加载后恢复
        self.pending_view = initial.view.filter(|view| view.as_str() != VIEW_ALL);
        self.state.initialized = true;
        self.start_query(true);
        self.publish();
    }

    /// 重置并发起新一轮查询; 换源与换分类都走这里
    fn start_query(&mut self, source_changed: bool) {
        self.generation += 1;
        self.cancel_inflight();
        self.state.items.clear();
        self.state.page = 1;
        self.state.has_more = true;
        self.state.error = None;
        self.state.loading = false;
        self.state.loading_more = false;
        if source_changed {
            self.state.selected_view = VIEW_ALL.to_string();
            self.state.views.clear();
        }

        match self.state.source.clone() {
            LibrarySource::OpenList => {
                if self.flags.openlist_enabled {
                    self.state.loading = true;
                    self.spawn_page_fetch(1);
                }
                // OpenList 关闭: 不发请求, 以空态收场
            }
            LibrarySource::Emby { key } => {
                if !self.flags.emby_enabled {
                    return;
                }
                match key {
                    Some(_) => {
                        self.state.loading = true;
                        self.spawn_page_fetch(1);
                        if source_changed {
                            self.spawn_views_fetch();
                            if self.state.sources.is_empty() {
                                self.spawn_sources_fetch();
                            }
                        }
                    }
                    None => {
                        if let Some(first) = self.state.sources.first().cloned() {
                            // 实例列表已在手: 直接默认选中第一个
                            self.state.source = LibrarySource::Emby {
                                key: Some(first.key),
                            };
                            self.start_query(true);
                            return;
                        }
                        self.state.loading = true;
                        self.spawn_sources_fetch();
                    }
                }
            }
        }
    }

    fn on_select_source(&mut self, requested: LibrarySource) {
        let source = apply_flags(requested, self.flags);
        if source == self.state.source {
            return;
        }
        debug!("切换数据源: {}", source.nav_value());
        self.state.source = source;
        self.start_query(true);
    }

    fn on_select_view(&mut self, view: String) {
        if view == self.state.selected_view {
            return;
        }
        self.state.selected_view = view;
        self.start_query(false);
    }

    fn on_load_more(&mut self) {
        if !self.state.has_more
            || self.state.loading
            || self.state.loading_more
            || self.inflight_page.is_some()
        {
            return;
        }
        let next = self.state.page + 1;
        self.state.loading_more = true;
        self.spawn_page_fetch(next);
    }

    fn on_page_loaded(
        &mut self,
        generation: u64,
        page: u32,
        result: Result<VideoListPage, FetchError>,
    ) {
        if generation != self.generation {
            // 旧代结果, 丢弃
            return;
        }
        self.inflight = None;
        self.inflight_page = None;
        self.state.loading = false;
        self.state.loading_more = false;
        match result {
            Ok(resp) => {
                if let Some(message) = resp.error {
                    // 响应级错误: 首页清空, 后续页保持已有内容
                    warn!("列表接口返回错误: {}", message);
                    if page == 1 {
                        self.state.items.clear();
                    }
                    self.state.error = Some(message);
                    return;
                }
                self.state.error = None;
                if page == 1 {
                    self.state.items = resp.items;
                } else {
                    self.state.items.extend(resp.items);
                }
                self.state.page = resp.page;
                self.state.has_more = resp.page < resp.total_pages;
            }
            Err(FetchError::Cancelled) => {}
            Err(err) => {
                warn!("列表拉取失败: {}", err);
                if page == 1 {
                    self.state.items.clear();
                }
                self.state.error = Some(FETCH_ERROR_MESSAGE.to_string());
            }
        }
    }

    fn on_views_loaded(&mut self, generation: u64, result: Result<Vec<EmbyView>, FetchError>) {
        if generation != self.generation {
            return;
        }
        match result {
            Ok(views) => {
                self.state.views = views;
                if !self.has_restored_view {
                    self.has_restored_view = true;
                    if let Some(candidate) = self.pending_view.take() {
                        if self.state.views.iter().any(|view| view.id == candidate) {
                            self.state.selected_view = candidate;
                            self.start_query(false);
                        }
                    }
                }
            }
            Err(err) => {
                warn!("分类拉取失败: {}", err);
            }
        }
    }

    fn on_sources_loaded(&mut self, generation: u64, result: Result<Vec<EmbySource>, FetchError>) {
        if generation != self.generation {
            return;
        }
        match result {
            Ok(sources) => {
                self.state.sources = sources;
                if matches!(self.state.source, LibrarySource::Emby { key: None }) {
                    if self.state.sources.is_empty() {
                        // 没有可配置的实例: 以空态收场
                        self.state.loading = false;
                    } else {
                        self.start_query(true);
                    }
                }
            }
            Err(err) => {
                warn!("Emby 实例列表拉取失败: {}", err);
                if matches!(self.state.source, LibrarySource::Emby { key: None }) {
                    self.state.loading = false;
                }
            }
        }
    }

    fn spawn_page_fetch(&mut self, page: u32) {
        let token = CancellationToken::new();
        self.inflight = Some(token.clone());
        self.inflight_page = Some(page);
        let generation = self.generation;
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        let source = self.state.source.clone();
        let view = self.state.selected_view.clone();
        tokio::spawn(async move {
            let fetch = async {
                match source {
                    LibrarySource::OpenList => backend.openlist_list(page, PAGE_SIZE).await,
                    LibrarySource::Emby { key: Some(key) } => {
                        let parent = (view != VIEW_ALL).then_some(view.as_str());
                        backend.emby_list(&key, page, PAGE_SIZE, parent).await
                    }
                    LibrarySource::Emby { key: None } => Err(FetchError::Cancelled),
                }
            };
            tokio::select! {
                _ = token.cancelled() => {
                    // 已被新请求取代, 结果不再提交
                    debug!("第 {} 页请求已取消", page);
                }
                result = fetch => {
                    let _ = tx.send(Msg::PageLoaded { generation, page, result }).await;
                }
            }
        });
    }

    fn spawn_views_fetch(&mut self) {
        let Some(key) = self.state.source.emby_key().map(str::to_string) else {
            return;
        };
        let generation = self.generation;
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.emby_views(&key).await;
            let _ = tx.send(Msg::ViewsLoaded { generation, result }).await;
        });
    }

    fn spawn_sources_fetch(&mut self) {
        let generation = self.generation;
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.emby_sources().await;
            let _ = tx.send(Msg::SourcesLoaded { generation, result }).await;
        });
    }

    fn cancel_inflight(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
        self.inflight_page = None;
    }

    fn publish(&mut self) {
        if self.state.initialized {
            self.state.query = browse_query(&self.state.source, &self.state.selected_view);
        }
        let _ = self.state_tx.send(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    const BOTH: BrowseFlags = BrowseFlags {
        openlist_enabled: true,
        emby_enabled: true,
    };

    fn video(id: &str) -> VideoSummary {
        VideoSummary {
            id: id.to_string(),
            title: format!("标题 {}", id),
            poster: String::new(),
            year: None,
            release_date: None,
            rating: None,
            media_type: None,
        }
    }

    fn pages(prefix: &str, per_page: usize, total: u32) -> Vec<VideoListPage> {
        (1..=total)
            .map(|page| VideoListPage {
                items: (0..per_page)
                    .map(|i| video(&format!("{}-{}-{}", prefix, page, i)))
                    .collect(),
                page,
                total_pages: total,
                error: None,
            })
            .collect()
    }

    #[derive(Default, Clone)]
    struct PagedData {
        delay_ms: u64,
        pages: Vec<VideoListPage>,
        fail: Option<FetchError>,
    }

    impl PagedData {
        fn result(self, page: u32) -> Result<VideoListPage, FetchError> {
            if let Some(err) = self.fail {
                return Err(err);
            }
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or(VideoListPage {
                    items: Vec::new(),
                    page,
                    total_pages: self.pages.len() as u32,
                    error: None,
                }))
        }
    }

    /// 可编排延迟/响应/故障的桩后端; emby 数据按 "key:view" 索引
    #[derive(Default)]
    struct StubBackend {
        openlist: Mutex<PagedData>,
        emby: Mutex<HashMap<String, PagedData>>,
        views: Mutex<HashMap<String, Vec<EmbyView>>>,
        sources: Mutex<Vec<EmbySource>>,
    }

    impl StubBackend {
        fn set_openlist(&self, data: PagedData) {
            *self.openlist.lock().unwrap() = data;
        }

        fn set_emby(&self, key: &str, view: &str, data: PagedData) {
            self.emby
                .lock()
                .unwrap()
                .insert(format!("{}:{}", key, view), data);
        }

        fn set_views(&self, key: &str, views: Vec<EmbyView>) {
            self.views.lock().unwrap().insert(key.to_string(), views);
        }

        fn set_sources(&self, sources: Vec<EmbySource>) {
            *self.sources.lock().unwrap() = sources;
        }
    }

    #[async_trait]
    impl MediaBackend for StubBackend {
        async fn openlist_list(
            &self,
            page: u32,
            _page_size: u32,
        ) -> Result<VideoListPage, FetchError> {
            let data = self.openlist.lock().unwrap().clone();
            sleep(Duration::from_millis(data.delay_ms)).await;
            data.result(page)
        }

        async fn emby_list(
            &self,
            key: &str,
            page: u32,
            _page_size: u32,
            parent_id: Option<&str>,
        ) -> Result<VideoListPage, FetchError> {
            let slot = format!("{}:{}", key, parent_id.unwrap_or(VIEW_ALL));
            let data = self.emby.lock().unwrap().get(&slot).cloned().unwrap_or_default();
            sleep(Duration::from_millis(data.delay_ms)).await;
            data.result(page)
        }

        async fn emby_views(&self, key: &str) -> Result<Vec<EmbyView>, FetchError> {
            Ok(self
                .views
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_default())
        }

        async fn emby_sources(&self) -> Result<Vec<EmbySource>, FetchError> {
            Ok(self.sources.lock().unwrap().clone())
        }
    }

    fn view(id: &str) -> EmbyView {
        EmbyView {
            id: id.to_string(),
            name: id.to_string(),
            view_type: "movies".to_string(),
        }
    }

    fn emby_source(key: &str) -> EmbySource {
        EmbySource {
            key: key.to_string(),
            name: key.to_string(),
        }
    }

    /// 轮询 watch 直到状态满足条件
    async fn wait_for(
        controller: &BrowseController,
        predicate: impl Fn(&BrowseState) -> bool,
    ) -> BrowseState {
        let mut rx = controller.watch();
        timeout(Duration::from_secs(5), async move {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if predicate(&snapshot) {
                    return snapshot;
                }
                rx.changed().await.expect("控制器已退出");
            }
        })
        .await
        .expect("等待状态超时")
    }

    fn item_ids(state: &BrowseState) -> Vec<&str> {
        state.items.iter().map(|item| item.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_openlist_pagination_accumulates() {
        let backend = Arc::new(StubBackend::default());
        backend.set_openlist(PagedData {
            pages: pages("o", 2, 3),
            ..Default::default()
        });
        let controller =
            BrowseController::spawn(backend, BOTH, InitialQuery::default());

        let state = wait_for(&controller, |s| !s.loading && !s.items.is_empty()).await;
        assert_eq!(state.items.len(), 2);
        assert!(state.has_more);
        assert_eq!(state.query, "source=openlist");

        controller.load_more().await;
        let state = wait_for(&controller, |s| s.items.len() == 4 && !s.loading_more).await;
        assert_eq!(state.page, 2);
        assert!(state.has_more);

        controller.load_more().await;
        let state = wait_for(&controller, |s| s.items.len() == 6 && !s.loading_more).await;
        assert!(!state.has_more);
        assert_eq!(
            item_ids(&state),
            ["o-1-0", "o-1-1", "o-2-0", "o-2-1", "o-3-0", "o-3-1"]
        );

        // 没有下一页时可见性信号是空操作
        controller.load_more().await;
        let state = wait_for(&controller, |s| !s.loading_more).await;
        assert_eq!(state.items.len(), 6);
    }

    #[tokio::test]
    async fn test_stale_response_never_overwrites_newer_state() {
        let backend = Arc::new(StubBackend::default());
        // 旧源慢, 新源快: 即使旧响应后到也不得覆盖
        backend.set_openlist(PagedData {
            delay_ms: 300,
            pages: pages("old", 2, 1),
            ..Default::default()
        });
        backend.set_emby(
            "e1",
            VIEW_ALL,
            PagedData {
                delay_ms: 10,
                pages: pages("new", 2, 1),
                ..Default::default()
            },
        );
        backend.set_sources(vec![emby_source("e1")]);
        let controller =
            BrowseController::spawn(backend, BOTH, InitialQuery::default());

        controller
            .select_source(LibrarySource::Emby {
                key: Some("e1".to_string()),
            })
            .await;

        let state = wait_for(&controller, |s| !s.loading && !s.items.is_empty()).await;
        assert_eq!(item_ids(&state), ["new-1-0", "new-1-1"]);

        // 等旧请求的原定完成时刻过去, 状态必须原封不动
        sleep(Duration::from_millis(400)).await;
        let state = controller.state();
        assert_eq!(item_ids(&state), ["new-1-0", "new-1-1"]);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_openlist_disabled_falls_back_to_emby_first_source() {
        let backend = Arc::new(StubBackend::default());
        backend.set_sources(vec![emby_source("s1"), emby_source("s2")]);
        backend.set_emby(
            "s1",
            VIEW_ALL,
            PagedData {
                pages: pages("s1", 3, 1),
                ..Default::default()
            },
        );
        let flags = BrowseFlags {
            openlist_enabled: false,
            emby_enabled: true,
        };
        let controller =
            BrowseController::spawn(backend, flags, InitialQuery::default());

        let state = wait_for(&controller, |s| !s.items.is_empty()).await;
        assert_eq!(
            state.source,
            LibrarySource::Emby {
                key: Some("s1".to_string())
            }
        );
        assert_eq!(state.sources.len(), 2);
        assert_eq!(state.items.len(), 3);
        assert_eq!(state.query, "source=emby%3As1");
    }

    #[tokio::test]
    async fn test_view_restored_from_url_only_once() {
        let backend = Arc::new(StubBackend::default());
        backend.set_sources(vec![emby_source("s1"), emby_source("s2")]);
        backend.set_views("s1", vec![view("movies"), view("anime")]);
        backend.set_views("s2", vec![view("anime")]);
        backend.set_emby(
            "s1",
            VIEW_ALL,
            PagedData {
                pages: pages("s1-all", 1, 1),
                ..Default::default()
            },
        );
        backend.set_emby(
            "s1",
            "anime",
            PagedData {
                pages: pages("s1-anime", 2, 1),
                ..Default::default()
            },
        );
        backend.set_emby(
            "s2",
            VIEW_ALL,
            PagedData {
                pages: pages("s2-all", 1, 1),
                ..Default::default()
            },
        );
        let controller = BrowseController::spawn(
            backend,
            BOTH,
            InitialQuery {
                source: Some("emby:s1".to_string()),
                view: Some("anime".to_string()),
            },
        );

        // 首次分类加载后恢复 URL 里的 view, 列表随之切换
        let state = wait_for(&controller, |s| {
            s.selected_view == "anime" && !s.loading && !s.items.is_empty()
        })
        .await;
        assert_eq!(item_ids(&state), ["s1-anime-1-0", "s1-anime-1-1"]);
        assert_eq!(state.query, "source=emby%3As1&view=anime");

        // 换实例后分类重置为 all, 恢复不会再次发生
        controller
            .select_source(LibrarySource::Emby {
                key: Some("s2".to_string()),
            })
            .await;
        let state = wait_for(&controller, |s| {
            s.source.emby_key() == Some("s2") && !s.loading && !s.items.is_empty()
        })
        .await;
        assert_eq!(state.selected_view, VIEW_ALL);
        assert_eq!(item_ids(&state), ["s2-all-1-0"]);
    }

    #[tokio::test]
    async fn test_response_error_clears_first_page_only() {
        let backend = Arc::new(StubBackend::default());
        let mut paged = pages("o", 2, 3);
        paged[1].error = Some("后端故障".to_string());
        paged[1].items.clear();
        backend.set_openlist(PagedData {
            pages: paged,
            ..Default::default()
        });
        let controller =
            BrowseController::spawn(backend.clone(), BOTH, InitialQuery::default());

        let state = wait_for(&controller, |s| !s.loading && !s.items.is_empty()).await;
        assert_eq!(state.items.len(), 2);

        // 后续页的响应级错误保留已有内容
        controller.load_more().await;
        let state = wait_for(&controller, |s| s.error.is_some()).await;
        assert_eq!(state.items.len(), 2);
        assert_eq!(state.error.as_deref(), Some("后端故障"));

        // 首页的响应级错误清空列表
        backend.set_openlist(PagedData {
            pages: vec![VideoListPage {
                items: Vec::new(),
                page: 1,
                total_pages: 1,
                error: Some("首页故障".to_string()),
            }],
            ..Default::default()
        });
        controller.select_source(LibrarySource::OpenList).await;
        // 同源选择是空操作, 先切走再切回来
        controller
            .select_source(LibrarySource::Emby {
                key: Some("none".to_string()),
            })
            .await;
        controller.select_source(LibrarySource::OpenList).await;
        let state = wait_for(&controller, |s| {
            s.error.as_deref() == Some("首页故障") && !s.loading
        })
        .await;
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_sets_generic_message() {
        let backend = Arc::new(StubBackend::default());
        backend.set_openlist(PagedData {
            fail: Some(FetchError::Transport("connection refused".to_string())),
            ..Default::default()
        });
        let controller =
            BrowseController::spawn(backend, BOTH, InitialQuery::default());

        let state = wait_for(&controller, |s| s.error.is_some() && !s.loading).await;
        assert!(state.items.is_empty());
        // 对外只透出统一提示语
        assert_eq!(state.error.as_deref(), Some(FETCH_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_not_configured_resolves_to_idle_empty() {
        let backend = Arc::new(StubBackend::default());
        let flags = BrowseFlags {
            openlist_enabled: false,
            emby_enabled: false,
        };
        let controller =
            BrowseController::spawn(backend, flags, InitialQuery::default());

        let state = wait_for(&controller, |s| s.initialized && !s.loading).await;
        assert!(state.items.is_empty());
        assert!(state.error.is_none());

        // Emby 可用但没有配置任何实例: 同样以空态收场
        let backend = Arc::new(StubBackend::default());
        let flags = BrowseFlags {
            openlist_enabled: false,
            emby_enabled: true,
        };
        let controller =
            BrowseController::spawn(backend, flags, InitialQuery::default());
        let state = wait_for(&controller, |s| s.initialized && !s.loading).await;
        assert!(state.items.is_empty());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_updates_stream_yields_snapshots() {
        use futures::StreamExt;

        let backend = Arc::new(StubBackend::default());
        backend.set_openlist(PagedData {
            pages: pages("o", 1, 1),
            ..Default::default()
        });
        let controller =
            BrowseController::spawn(backend, BOTH, InitialQuery::default());

        let mut stream = controller.updates();
        let state = timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = stream.next().await.expect("控制器已退出");
                if !snapshot.loading && !snapshot.items.is_empty() {
                    break snapshot;
                }
            }
        })
        .await
        .expect("等待状态超时");
        assert_eq!(item_ids(&state), ["o-1-0"]);
    }

    #[tokio::test]
    async fn test_view_change_resets_pagination_but_keeps_source() {
        let backend = Arc::new(StubBackend::default());
        backend.set_sources(vec![emby_source("s1")]);
        backend.set_views("s1", vec![view("movies")]);
        backend.set_emby(
            "s1",
            VIEW_ALL,
            PagedData {
                pages: pages("all", 2, 2),
                ..Default::default()
            },
        );
        backend.set_emby(
            "s1",
            "movies",
            PagedData {
                pages: pages("movies", 1, 1),
                ..Default::default()
            },
        );
        let controller = BrowseController::spawn(
            backend,
            BOTH,
            InitialQuery {
                source: Some("emby_s1".to_string()),
                view: None,
            },
        );

        wait_for(&controller, |s| !s.loading && s.items.len() == 2).await;
        controller.load_more().await;
        let state = wait_for(&controller, |s| s.items.len() == 4).await;
        assert_eq!(state.page, 2);

        controller.select_view("movies").await;
        let state = wait_for(&controller, |s| {
            s.selected_view == "movies" && !s.loading && !s.items.is_empty()
        })
        .await;
        // 分页归位, 源与实例保持不变
        assert_eq!(state.page, 1);
        assert_eq!(item_ids(&state), ["movies-1-0"]);
        assert_eq!(state.source.emby_key(), Some("s1"));
        assert!(!state.views.is_empty());
    }
}
