//! The boundary with the native engine.
//!
//! Calls into the engine go through the [`NativeEngine`] trait. Calls out of
//! the engine go through a [`ViewCallbacks`] table of `extern "C"` function
//! pointers installed on every view; the engine invokes them synchronously
//! from inside `update`/`render`.

use crate::handle::NativeHandle;

/// Marker for the kind of native object a [`RefPtr`](crate::RefPtr) points at.
pub trait NativeType: 'static {
    const NAME: &'static str;
}

/// Native renderer (the coordinator).
pub enum NativeRenderer {}

/// Native view.
pub enum NativeView {}

impl NativeType for NativeRenderer {
    const NAME: &'static str = "renderer";
}

impl NativeType for NativeView {
    const NAME: &'static str = "view";
}

/// Entry points of the native engine.
///
/// Every call is made from the thread driving the renderer. Creation calls
/// return a handle carrying one reference owned by the caller, or
/// [`NativeHandle::NULL`] on failure.
pub trait NativeEngine {
    fn create_renderer(&self) -> NativeHandle;

    fn create_view(
        &self,
        renderer: NativeHandle,
        width: u32,
        height: u32,
        transparent: bool,
        force_cpu_renderer: bool,
    ) -> NativeHandle;

    /// Add one unit to the object's reference count.
    fn add_ref(&self, handle: NativeHandle);

    /// Remove one unit; the engine destroys the object when it reaches zero.
    fn release(&self, handle: NativeHandle);

    /// Install the callback table for `view`, replacing any previous one.
    fn set_view_callbacks(&self, view: NativeHandle, callbacks: ViewCallbacks);

    /// Update timers and dispatch pending callbacks.
    fn update(&self, renderer: NativeHandle);

    /// Render all active views; may dispatch callbacks as well.
    fn render(&self, renderer: NativeHandle);

    fn purge_memory(&self, renderer: NativeHandle);

    fn log_memory_usage(&self, renderer: NativeHandle);

    /// Tear the renderer down together with every object still rooted in it.
    fn dispose(&self, renderer: NativeHandle);

    fn load_html(&self, view: NativeHandle, html: &str);

    fn load_url(&self, view: NativeHandle, url: &str);

    fn resize(&self, view: NativeHandle, width: u32, height: u32);

    fn view_url(&self, view: NativeHandle) -> String;

    fn view_title(&self, view: NativeHandle) -> String;
}

/// Borrowed UTF-8 (usually) string crossing the boundary. Only valid for the
/// duration of the callback it is passed to.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl NativeStr {
    pub fn new(s: &str) -> Self {
        NativeStr {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    /// # Safety
    /// `ptr` must be null or point at `len` readable bytes for the lifetime
    /// of the returned slice.
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        if self.ptr.is_null() || self.len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(self.ptr, self.len)
        }
    }
}

/// Rectangle as the engine passes it. `valid == false` means "no rect".
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub valid: bool,
}

pub type StringCallback = extern "C" fn(view: u64, value: NativeStr);
pub type CursorCallback = extern "C" fn(view: u64, cursor: u32);
pub type ConsoleMessageCallback = extern "C" fn(
    view: u64,
    source: u32,
    level: u32,
    message: NativeStr,
    line: u64,
    column: u64,
    source_id: NativeStr,
);
/// Returns the handle of the view hosting the child, or 0 to deny it.
pub type CreateChildViewCallback = extern "C" fn(
    view: u64,
    opener_url: NativeStr,
    target_url: NativeStr,
    is_popup: bool,
    rect: NativeRect,
) -> u64;
pub type FrameCallback = extern "C" fn(view: u64, frame_id: u64, is_main_frame: bool, url: NativeStr);
pub type FailLoadingCallback = extern "C" fn(
    view: u64,
    frame_id: u64,
    is_main_frame: bool,
    url: NativeStr,
    description: NativeStr,
    error_domain: NativeStr,
    error_code: i32,
);
pub type ViewEventCallback = extern "C" fn(view: u64);

/// Callback table installed on every view.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ViewCallbacks {
    pub on_change_title: StringCallback,
    pub on_change_url: StringCallback,
    pub on_change_tooltip: StringCallback,
    pub on_change_cursor: CursorCallback,
    pub on_add_console_message: ConsoleMessageCallback,
    pub on_create_child_view: CreateChildViewCallback,
    pub on_begin_loading: FrameCallback,
    pub on_finish_loading: FrameCallback,
    pub on_fail_loading: FailLoadingCallback,
    pub on_window_object_ready: FrameCallback,
    pub on_dom_ready: FrameCallback,
    pub on_update_history: ViewEventCallback,
}

impl std::fmt::Debug for ViewCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCallbacks").finish_non_exhaustive()
    }
}
