//! In-process engine with no rendering backend.
//!
//! Keeps real reference counts, roots views in their renderer, and delivers
//! queued page events through the installed callback tables from inside
//! `update`. Tests and `ulbind replay` drive the binding through it.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::engine::{NativeEngine, NativeRect, NativeStr, ViewCallbacks};
use crate::handle::NativeHandle;

const FIRST_ADDRESS: u64 = 0x1000;
const ADDRESS_STEP: u64 = 0x40;
const MAIN_FRAME_ID: u64 = 1;

/// Counters for everything the binding asked of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub add_refs: u64,
    pub releases: u64,
    pub created: u64,
    pub destroyed: u64,
    pub updates: u64,
    pub renders: u64,
    pub purges: u64,
    pub accepted_children: u64,
    pub denied_children: u64,
    /// `release`/`add_ref` on an object that no longer exists.
    pub bad_releases: u64,
}

/// Rectangle carried by a child-view request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl EventRect {
    fn to_native(self) -> NativeRect {
        NativeRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            valid: true,
        }
    }
}

fn main_frame() -> bool {
    true
}

/// A page event waiting to be delivered to a view.
///
/// Enumerated arguments stay raw codes so that out-of-range values can be
/// exercised as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NativeEvent {
    Title {
        title: String,
    },
    /// Title delivered as raw bytes, which need not be UTF-8.
    TitleBytes {
        bytes: Vec<u8>,
    },
    Url {
        url: String,
    },
    Tooltip {
        tooltip: String,
    },
    Cursor {
        cursor: u32,
    },
    Console {
        source: u32,
        level: u32,
        message: String,
        #[serde(default)]
        line: u64,
        #[serde(default)]
        column: u64,
        #[serde(default)]
        source_id: String,
    },
    ChildView {
        opener_url: String,
        target_url: String,
        #[serde(default)]
        is_popup: bool,
        #[serde(default)]
        rect: Option<EventRect>,
    },
    BeginLoading {
        #[serde(default)]
        frame_id: u64,
        #[serde(default = "main_frame")]
        is_main_frame: bool,
        #[serde(default)]
        url: String,
    },
    FinishLoading {
        #[serde(default)]
        frame_id: u64,
        #[serde(default = "main_frame")]
        is_main_frame: bool,
        #[serde(default)]
        url: String,
    },
    FailLoading {
        #[serde(default)]
        frame_id: u64,
        #[serde(default = "main_frame")]
        is_main_frame: bool,
        #[serde(default)]
        url: String,
        description: String,
        error_domain: String,
        error_code: i32,
    },
    WindowObjectReady {
        #[serde(default)]
        frame_id: u64,
        #[serde(default = "main_frame")]
        is_main_frame: bool,
        #[serde(default)]
        url: String,
    },
    DomReady {
        #[serde(default)]
        frame_id: u64,
        #[serde(default = "main_frame")]
        is_main_frame: bool,
        #[serde(default)]
        url: String,
    },
    UpdateHistory,
}

struct ViewState {
    renderer: NativeHandle,
    width: u32,
    height: u32,
    transparent: bool,
    force_cpu: bool,
    url: String,
    title: String,
    callbacks: Option<ViewCallbacks>,
    /// Child views this view holds a reference to.
    children: Vec<NativeHandle>,
}

enum ObjectKind {
    Renderer,
    View(ViewState),
}

struct Object {
    ref_count: u32,
    kind: ObjectKind,
}

struct EngineState {
    next_address: u64,
    objects: HashMap<NativeHandle, Object>,
    queue: VecDeque<(NativeHandle, NativeEvent)>,
    stats: EngineStats,
    fail_creations: bool,
}

impl EngineState {
    fn allocate(&mut self, kind: ObjectKind) -> NativeHandle {
        let handle = NativeHandle::from_raw(self.next_address);
        self.next_address += ADDRESS_STEP;
        self.objects.insert(handle, Object { ref_count: 1, kind });
        self.stats.created += 1;
        handle
    }

    fn view(&self, handle: NativeHandle) -> Option<&ViewState> {
        match self.objects.get(&handle) {
            Some(Object { kind: ObjectKind::View(view), .. }) => Some(view),
            _ => None,
        }
    }

    fn view_mut(&mut self, handle: NativeHandle) -> Option<&mut ViewState> {
        match self.objects.get_mut(&handle) {
            Some(Object { kind: ObjectKind::View(view), .. }) => Some(view),
            _ => None,
        }
    }

    fn is_renderer(&self, handle: NativeHandle) -> bool {
        matches!(self.objects.get(&handle), Some(Object { kind: ObjectKind::Renderer, .. }))
    }

    /// Drop one reference; false when the object does not exist.
    fn drop_ref(&mut self, handle: NativeHandle) -> bool {
        let Some(object) = self.objects.get_mut(&handle) else {
            return false;
        };
        object.ref_count = object.ref_count.saturating_sub(1);
        if object.ref_count == 0 {
            self.destroy(handle);
        }
        true
    }

    fn destroy(&mut self, handle: NativeHandle) {
        let Some(object) = self.objects.remove(&handle) else {
            return;
        };
        self.stats.destroyed += 1;
        self.queue.retain(|(view, _)| *view != handle);

        match object.kind {
            ObjectKind::View(view) => {
                log::trace!("headless: view {} destroyed", handle);
                for child in view.children {
                    self.drop_ref(child);
                }
            }
            ObjectKind::Renderer => {
                let rooted: Vec<NativeHandle> = self
                    .objects
                    .iter()
                    .filter(|(_, object)| matches!(&object.kind, ObjectKind::View(v) if v.renderer == handle))
                    .map(|(view, _)| *view)
                    .collect();
                log::trace!("headless: renderer {} destroyed with {} views", handle, rooted.len());
                for view in rooted {
                    self.destroy(view);
                }
            }
        }
    }

    fn queue_load(&mut self, view: NativeHandle, url: &str, title: Option<String>, history: bool) {
        let frame = || (MAIN_FRAME_ID, true, url.to_string());
        let (frame_id, is_main_frame, url) = frame();
        self.queue.push_back((view, NativeEvent::BeginLoading { frame_id, is_main_frame, url }));
        let (frame_id, is_main_frame, url) = frame();
        self.queue.push_back((view, NativeEvent::WindowObjectReady { frame_id, is_main_frame, url }));
        if let Some(title) = title {
            self.queue.push_back((view, NativeEvent::Title { title }));
        }
        let (frame_id, is_main_frame, url) = frame();
        self.queue.push_back((view, NativeEvent::DomReady { frame_id, is_main_frame, url }));
        let (frame_id, is_main_frame, url) = frame();
        self.queue.push_back((view, NativeEvent::FinishLoading { frame_id, is_main_frame, url }));
        if history {
            self.queue.push_back((view, NativeEvent::UpdateHistory));
        }
    }
}

fn parse_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title>")? + "<title>".len();
    let close = open + lower[open..].find("</title>")?;
    Some(html[open..close].trim().to_string())
}

/// Headless [`NativeEngine`].
pub struct HeadlessEngine {
    state: RefCell<EngineState>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        HeadlessEngine {
            state: RefCell::new(EngineState {
                next_address: FIRST_ADDRESS,
                objects: HashMap::new(),
                queue: VecDeque::new(),
                stats: EngineStats::default(),
                fail_creations: false,
            }),
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.state.borrow().stats
    }

    /// Current reference count, `None` once destroyed.
    pub fn ref_count(&self, handle: NativeHandle) -> Option<u32> {
        self.state.borrow().objects.get(&handle).map(|o| o.ref_count)
    }

    pub fn is_alive(&self, handle: NativeHandle) -> bool {
        self.state.borrow().objects.contains_key(&handle)
    }

    /// Number of live objects, renderers included.
    pub fn object_count(&self) -> usize {
        self.state.borrow().objects.len()
    }

    pub fn pending_events(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Child views adopted by `view`.
    pub fn children(&self, view: NativeHandle) -> Vec<NativeHandle> {
        self.state
            .borrow()
            .view(view)
            .map(|v| v.children.clone())
            .unwrap_or_default()
    }

    pub fn is_force_cpu(&self, view: NativeHandle) -> Option<bool> {
        self.state.borrow().view(view).map(|v| v.force_cpu)
    }

    pub fn is_transparent(&self, view: NativeHandle) -> Option<bool> {
        self.state.borrow().view(view).map(|v| v.transparent)
    }

    pub fn size(&self, view: NativeHandle) -> Option<(u32, u32)> {
        self.state.borrow().view(view).map(|v| (v.width, v.height))
    }

    /// Make every subsequent creation call fail with a null handle.
    pub fn set_fail_creations(&self, fail: bool) {
        self.state.borrow_mut().fail_creations = fail;
    }

    /// Queue `event` for delivery on the next `update`. Returns false if the
    /// view does not exist.
    pub fn queue_event(&self, view: NativeHandle, event: NativeEvent) -> bool {
        let mut state = self.state.borrow_mut();
        if state.view(view).is_none() {
            return false;
        }
        state.queue.push_back((view, event));
        true
    }

    /// Apply an event to the view's own state, returning its callback table.
    fn apply(&self, view: NativeHandle, event: &NativeEvent) -> Option<ViewCallbacks> {
        let mut state = self.state.borrow_mut();
        let target = state.view_mut(view)?;
        match event {
            NativeEvent::Title { title } => target.title = title.clone(),
            NativeEvent::TitleBytes { bytes } => target.title = String::from_utf8_lossy(bytes).into_owned(),
            NativeEvent::Url { url } => target.url = url.clone(),
            _ => {}
        }
        target.callbacks
    }

    fn deliver(&self, view: NativeHandle, callbacks: ViewCallbacks, event: &NativeEvent) {
        let raw = view.raw();
        match event {
            NativeEvent::Title { title } => (callbacks.on_change_title)(raw, NativeStr::new(title)),
            NativeEvent::TitleBytes { bytes } => (callbacks.on_change_title)(
                raw,
                NativeStr {
                    ptr: bytes.as_ptr(),
                    len: bytes.len(),
                },
            ),
            NativeEvent::Url { url } => (callbacks.on_change_url)(raw, NativeStr::new(url)),
            NativeEvent::Tooltip { tooltip } => (callbacks.on_change_tooltip)(raw, NativeStr::new(tooltip)),
            NativeEvent::Cursor { cursor } => (callbacks.on_change_cursor)(raw, *cursor),
            NativeEvent::Console {
                source,
                level,
                message,
                line,
                column,
                source_id,
            } => (callbacks.on_add_console_message)(
                raw,
                *source,
                *level,
                NativeStr::new(message),
                *line,
                *column,
                NativeStr::new(source_id),
            ),
            NativeEvent::ChildView {
                opener_url,
                target_url,
                is_popup,
                rect,
            } => {
                let rect = rect.map(EventRect::to_native).unwrap_or_default();
                let child = (callbacks.on_create_child_view)(
                    raw,
                    NativeStr::new(opener_url),
                    NativeStr::new(target_url),
                    *is_popup,
                    rect,
                );
                self.adopt_child(view, NativeHandle::from_raw(child));
            }
            NativeEvent::BeginLoading { frame_id, is_main_frame, url } => {
                (callbacks.on_begin_loading)(raw, *frame_id, *is_main_frame, NativeStr::new(url))
            }
            NativeEvent::FinishLoading { frame_id, is_main_frame, url } => {
                (callbacks.on_finish_loading)(raw, *frame_id, *is_main_frame, NativeStr::new(url))
            }
            NativeEvent::FailLoading {
                frame_id,
                is_main_frame,
                url,
                description,
                error_domain,
                error_code,
            } => (callbacks.on_fail_loading)(
                raw,
                *frame_id,
                *is_main_frame,
                NativeStr::new(url),
                NativeStr::new(description),
                NativeStr::new(error_domain),
                *error_code,
            ),
            NativeEvent::WindowObjectReady { frame_id, is_main_frame, url } => {
                (callbacks.on_window_object_ready)(raw, *frame_id, *is_main_frame, NativeStr::new(url))
            }
            NativeEvent::DomReady { frame_id, is_main_frame, url } => {
                (callbacks.on_dom_ready)(raw, *frame_id, *is_main_frame, NativeStr::new(url))
            }
            NativeEvent::UpdateHistory => (callbacks.on_update_history)(raw),
        }
    }

    fn adopt_child(&self, opener: NativeHandle, child: NativeHandle) {
        let mut state = self.state.borrow_mut();
        if child.is_null() || state.view(child).is_none() {
            if !child.is_null() {
                log::warn!("headless: child view answer {} is not a live view", child);
            }
            state.stats.denied_children += 1;
            return;
        }
        if state.view(opener).is_none() {
            state.stats.denied_children += 1;
            return;
        }
        if let Some(object) = state.objects.get_mut(&child) {
            object.ref_count += 1;
        }
        if let Some(view) = state.view_mut(opener) {
            view.children.push(child);
        }
        state.stats.accepted_children += 1;
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for HeadlessEngine {
    fn create_renderer(&self) -> NativeHandle {
        let mut state = self.state.borrow_mut();
        if state.fail_creations {
            return NativeHandle::NULL;
        }
        state.allocate(ObjectKind::Renderer)
    }

    fn create_view(
        &self,
        renderer: NativeHandle,
        width: u32,
        height: u32,
        transparent: bool,
        force_cpu_renderer: bool,
    ) -> NativeHandle {
        let mut state = self.state.borrow_mut();
        if state.fail_creations || !state.is_renderer(renderer) || width == 0 || height == 0 {
            return NativeHandle::NULL;
        }
        state.allocate(ObjectKind::View(ViewState {
            renderer,
            width,
            height,
            transparent,
            force_cpu: force_cpu_renderer,
            url: String::new(),
            title: String::new(),
            callbacks: None,
            children: Vec::new(),
        }))
    }

    fn add_ref(&self, handle: NativeHandle) {
        let mut state = self.state.borrow_mut();
        match state.objects.get_mut(&handle) {
            Some(object) => {
                object.ref_count += 1;
                state.stats.add_refs += 1;
            }
            None => {
                log::warn!("headless: add_ref on dead object {}", handle);
                state.stats.bad_releases += 1;
            }
        }
    }

    fn release(&self, handle: NativeHandle) {
        let mut state = self.state.borrow_mut();
        if state.drop_ref(handle) {
            state.stats.releases += 1;
        } else {
            log::warn!("headless: release on dead object {}", handle);
            state.stats.bad_releases += 1;
        }
    }

    fn set_view_callbacks(&self, view: NativeHandle, callbacks: ViewCallbacks) {
        if let Some(view) = self.state.borrow_mut().view_mut(view) {
            view.callbacks = Some(callbacks);
        }
    }

    fn update(&self, renderer: NativeHandle) {
        let batch: Vec<(NativeHandle, NativeEvent)> = {
            let mut state = self.state.borrow_mut();
            state.stats.updates += 1;
            let pending = std::mem::take(&mut state.queue);
            let (mine, others): (VecDeque<_>, VecDeque<_>) = pending
                .into_iter()
                .partition(|(view, _)| state.view(*view).is_some_and(|v| v.renderer == renderer));
            state.queue = others;
            mine.into_iter().collect()
        };

        // No borrow is held while callbacks run; they may call back in.
        for (view, event) in batch {
            if let Some(callbacks) = self.apply(view, &event) {
                self.deliver(view, callbacks, &event);
            }
        }
    }

    fn render(&self, _renderer: NativeHandle) {
        self.state.borrow_mut().stats.renders += 1;
    }

    fn purge_memory(&self, _renderer: NativeHandle) {
        self.state.borrow_mut().stats.purges += 1;
    }

    fn log_memory_usage(&self, renderer: NativeHandle) {
        let state = self.state.borrow();
        let views = state
            .objects
            .values()
            .filter(|o| matches!(&o.kind, ObjectKind::View(v) if v.renderer == renderer))
            .count();
        log::info!(
            "headless renderer {}: {} views, {} objects, {} pending events",
            renderer,
            views,
            state.objects.len(),
            state.queue.len()
        );
    }

    fn dispose(&self, renderer: NativeHandle) {
        let mut state = self.state.borrow_mut();
        if !state.is_renderer(renderer) {
            log::warn!("headless: dispose on unknown renderer {}", renderer);
            return;
        }
        state.destroy(renderer);
    }

    fn load_html(&self, view: NativeHandle, html: &str) {
        let mut state = self.state.borrow_mut();
        let Some(target) = state.view(view) else { return };
        let url = target.url.clone();
        state.queue_load(view, &url, parse_title(html), false);
    }

    fn load_url(&self, view: NativeHandle, url: &str) {
        let mut state = self.state.borrow_mut();
        if state.view(view).is_none() {
            return;
        }
        state.queue.push_back((view, NativeEvent::Url { url: url.to_string() }));
        state.queue_load(view, url, None, true);
    }

    fn resize(&self, view: NativeHandle, width: u32, height: u32) {
        if let Some(view) = self.state.borrow_mut().view_mut(view) {
            view.width = width;
            view.height = height;
        }
    }

    fn view_url(&self, view: NativeHandle) -> String {
        self.state.borrow().view(view).map(|v| v.url.clone()).unwrap_or_default()
    }

    fn view_title(&self, view: NativeHandle) -> String {
        self.state.borrow().view(view).map(|v| v.title.clone()).unwrap_or_default()
    }
}

impl std::fmt::Debug for HeadlessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessEngine")
            .field("objects", &state.objects.len())
            .field("pending", &state.queue.len())
            .field("stats", &state.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    thread_local! {
        static SEEN: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
        static CHILD_ANSWER: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
    }

    fn seen(event: String) {
        SEEN.with(|s| s.borrow_mut().push(event));
    }

    fn text(value: NativeStr) -> String {
        String::from_utf8_lossy(unsafe { value.as_bytes() }).into_owned()
    }

    extern "C" fn title(_: u64, value: NativeStr) {
        seen(format!("title:{}", text(value)));
    }
    extern "C" fn url(_: u64, value: NativeStr) {
        seen(format!("url:{}", text(value)));
    }
    extern "C" fn tooltip(_: u64, _: NativeStr) {}
    extern "C" fn cursor(_: u64, code: u32) {
        seen(format!("cursor:{}", code));
    }
    extern "C" fn console(_: u64, _: u32, _: u32, _: NativeStr, _: u64, _: u64, _: NativeStr) {}
    extern "C" fn child(_: u64, _: NativeStr, _: NativeStr, _: bool, _: NativeRect) -> u64 {
        CHILD_ANSWER.with(|c| c.get())
    }
    extern "C" fn begin(_: u64, _: u64, _: bool, _: NativeStr) {
        seen("begin".to_string());
    }
    extern "C" fn finish(_: u64, _: u64, _: bool, _: NativeStr) {
        seen("finish".to_string());
    }
    extern "C" fn fail(_: u64, _: u64, _: bool, _: NativeStr, _: NativeStr, _: NativeStr, _: i32) {}
    extern "C" fn window_ready(_: u64, _: u64, _: bool, _: NativeStr) {
        seen("window".to_string());
    }
    extern "C" fn dom_ready(_: u64, _: u64, _: bool, _: NativeStr) {
        seen("dom".to_string());
    }
    extern "C" fn history(_: u64) {
        seen("history".to_string());
    }

    const RECORDING: ViewCallbacks = ViewCallbacks {
        on_change_title: title,
        on_change_url: url,
        on_change_tooltip: tooltip,
        on_change_cursor: cursor,
        on_add_console_message: console,
        on_create_child_view: child,
        on_begin_loading: begin,
        on_finish_loading: finish,
        on_fail_loading: fail,
        on_window_object_ready: window_ready,
        on_dom_ready: dom_ready,
        on_update_history: history,
    };

    fn take_seen() -> Vec<String> {
        SEEN.with(|s| std::mem::take(&mut *s.borrow_mut()))
    }

    #[test]
    fn test_addresses_and_creation_failure() {
        let engine = HeadlessEngine::new();
        let renderer = engine.create_renderer();
        assert_eq!(renderer.raw(), FIRST_ADDRESS);
        let view = engine.create_view(renderer, 10, 10, true, true);
        assert_eq!(view.raw(), FIRST_ADDRESS + ADDRESS_STEP);
        assert_eq!(engine.is_force_cpu(view), Some(true));

        assert!(engine.create_view(renderer, 0, 10, false, false).is_null());
        assert!(engine.create_view(view, 10, 10, false, false).is_null());
        engine.set_fail_creations(true);
        assert!(engine.create_renderer().is_null());
    }

    #[test]
    fn test_reference_counting() {
        let engine = HeadlessEngine::new();
        let renderer = engine.create_renderer();
        let view = engine.create_view(renderer, 10, 10, false, false);
        engine.add_ref(view);
        assert_eq!(engine.ref_count(view), Some(2));
        engine.release(view);
        engine.release(view);
        assert!(!engine.is_alive(view));

        engine.release(view);
        let stats = engine.stats();
        assert_eq!(stats.releases, 2);
        assert_eq!(stats.bad_releases, 1);
        assert_eq!(stats.destroyed, 1);
    }

    #[test]
    fn test_load_html_event_order() {
        let engine = HeadlessEngine::new();
        let renderer = engine.create_renderer();
        let view = engine.create_view(renderer, 800, 600, false, false);
        engine.set_view_callbacks(view, RECORDING);
        take_seen();

        engine.load_html(view, "<html><head><TITLE> Hello </TITLE></head></html>");
        assert_eq!(engine.pending_events(), 5);
        engine.update(renderer);
        assert_eq!(take_seen(), vec!["begin", "window", "title:Hello", "dom", "finish"]);
        assert_eq!(engine.view_title(view), "Hello");
        assert_eq!(engine.pending_events(), 0);
    }

    #[test]
    fn test_load_url_updates_state() {
        let engine = HeadlessEngine::new();
        let renderer = engine.create_renderer();
        let view = engine.create_view(renderer, 800, 600, false, false);
        engine.set_view_callbacks(view, RECORDING);
        take_seen();

        engine.load_url(view, "https://example.com/");
        engine.update(renderer);
        assert_eq!(
            take_seen(),
            vec!["url:https://example.com/", "begin", "window", "dom", "finish", "history"]
        );
        assert_eq!(engine.view_url(view), "https://example.com/");
    }

    #[test]
    fn test_events_without_callbacks_still_update_state() {
        let engine = HeadlessEngine::new();
        let renderer = engine.create_renderer();
        let view = engine.create_view(renderer, 8, 8, false, false);
        assert!(engine.queue_event(view, NativeEvent::Title { title: "quiet".into() }));
        engine.update(renderer);
        assert_eq!(engine.view_title(view), "quiet");
        assert!(!engine.queue_event(NativeHandle::from_raw(0x9999), NativeEvent::UpdateHistory));
    }

    #[test]
    fn test_child_adoption_and_cascade() {
        let engine = HeadlessEngine::new();
        let renderer = engine.create_renderer();
        let opener = engine.create_view(renderer, 8, 8, false, false);
        let popup = engine.create_view(renderer, 8, 8, false, false);
        engine.set_view_callbacks(opener, RECORDING);
        let request = NativeEvent::ChildView {
            opener_url: "a".into(),
            target_url: "b".into(),
            is_popup: true,
            rect: None,
        };

        CHILD_ANSWER.with(|c| c.set(0));
        engine.queue_event(opener, request.clone());
        engine.update(renderer);
        assert_eq!(engine.stats().denied_children, 1);
        assert!(engine.children(opener).is_empty());

        CHILD_ANSWER.with(|c| c.set(popup.raw()));
        engine.queue_event(opener, request);
        engine.update(renderer);
        assert_eq!(engine.children(opener), vec![popup]);
        assert_eq!(engine.ref_count(popup), Some(2));

        // the opener keeps the popup alive, and lets go when destroyed
        engine.release(popup);
        assert!(engine.is_alive(popup));
        engine.release(opener);
        assert!(!engine.is_alive(popup));
    }

    #[test]
    fn test_dispose_destroys_rooted_views() {
        let engine = HeadlessEngine::new();
        let renderer = engine.create_renderer();
        let a = engine.create_view(renderer, 8, 8, false, false);
        let b = engine.create_view(renderer, 8, 8, false, false);
        engine.queue_event(a, NativeEvent::UpdateHistory);
        engine.add_ref(b);

        engine.dispose(renderer);
        assert_eq!(engine.object_count(), 0);
        assert_eq!(engine.pending_events(), 0);
        assert!(!engine.is_alive(b));
    }

    #[test]
    fn test_event_serde() {
        let event: NativeEvent =
            serde_json::from_str(r#"{"kind":"begin_loading","url":"https://example.com/"}"#).unwrap();
        assert_eq!(
            event,
            NativeEvent::BeginLoading {
                frame_id: 0,
                is_main_frame: true,
                url: "https://example.com/".into()
            }
        );
    }
}
