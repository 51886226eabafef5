//! Listener capability sets.
//!
//! A listener is any type implementing one of these traits. Every method has
//! a no-op default, so implementors only write the events they care about.
//! Methods may fail or even panic; the dispatcher contains both and reports
//! them as diagnostics instead of letting them reach the engine.

use crate::marshal::{ConsoleMessage, Cursor, IntRect};
use crate::view::View;

pub type ListenerResult<T = ()> = anyhow::Result<T>;

/// Page-level events of a view.
pub trait ViewListener {
    fn on_change_title(&self, _view: &View, _title: &str) -> ListenerResult {
        Ok(())
    }

    fn on_change_url(&self, _view: &View, _url: &str) -> ListenerResult {
        Ok(())
    }

    fn on_change_tooltip(&self, _view: &View, _tooltip: &str) -> ListenerResult {
        Ok(())
    }

    fn on_change_cursor(&self, _view: &View, _cursor: Cursor) -> ListenerResult {
        Ok(())
    }

    fn on_add_console_message(&self, _view: &View, _message: &ConsoleMessage) -> ListenerResult {
        Ok(())
    }

    /// The page asked for a new window (popup or `target=_blank` link).
    ///
    /// Return the view that should host it, or `None` to deny the request.
    /// The returned view must be kept alive by the caller to receive its own
    /// events; the engine holds a reference of its own.
    fn on_create_child_view(
        &self,
        _view: &View,
        _opener_url: &str,
        _target_url: &str,
        _is_popup: bool,
        _rect: Option<IntRect>,
    ) -> ListenerResult<Option<View>> {
        Ok(None)
    }
}

/// Frame being loaded in a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_id: u64,
    pub is_main_frame: bool,
    pub url: String,
}

/// Why a frame failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub description: String,
    pub error_domain: String,
    pub error_code: i32,
}

/// Load lifecycle events of a view.
pub trait LoadListener {
    fn on_begin_loading(&self, _view: &View, _frame: &FrameInfo) -> ListenerResult {
        Ok(())
    }

    fn on_finish_loading(&self, _view: &View, _frame: &FrameInfo) -> ListenerResult {
        Ok(())
    }

    fn on_fail_loading(&self, _view: &View, _frame: &FrameInfo, _failure: &LoadFailure) -> ListenerResult {
        Ok(())
    }

    /// JavaScript window object is ready; bindings can be installed.
    fn on_window_object_ready(&self, _view: &View, _frame: &FrameInfo) -> ListenerResult {
        Ok(())
    }

    fn on_dom_ready(&self, _view: &View, _frame: &FrameInfo) -> ListenerResult {
        Ok(())
    }

    fn on_update_history(&self, _view: &View) -> ListenerResult {
        Ok(())
    }
}
