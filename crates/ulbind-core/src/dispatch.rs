//! Callback trampolines.
//!
//! [`VIEW_CALLBACKS`] is installed on every view the renderer creates. Each
//! entry resolves the raw view handle to its managed wrapper, converts the
//! arguments, and invokes the registered listener. Nothing raised by a
//! listener, error or panic, ever crosses back into the engine: failures are
//! reported to the renderer's diagnostic sink and the engine gets a neutral
//! result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use ulbind_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticEmitter, LogEmitter, Origin};

use crate::engine::{NativeRect, NativeStr, ViewCallbacks};
use crate::handle::NativeHandle;
use crate::listener::{FrameInfo, ListenerResult, LoadFailure, LoadListener, ViewListener};
use crate::marshal::{decode_str, ConsoleMessage, Cursor, IntRect, MessageLevel, MessageSource, UnknownCode};
use crate::renderer::{current_shared, RendererShared};
use crate::view::View;

pub(crate) const VIEW_CALLBACKS: ViewCallbacks = ViewCallbacks {
    on_change_title,
    on_change_url,
    on_change_tooltip,
    on_change_cursor,
    on_add_console_message,
    on_create_child_view,
    on_begin_loading,
    on_finish_loading,
    on_fail_loading,
    on_window_object_ready,
    on_dom_ready,
    on_update_history,
};

/// Last line of defence: nothing may unwind into the engine.
fn boundary<R>(fallback: R, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            log::error!("panic escaped callback dispatch: {}", panic_message(&*payload));
            fallback
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Marks the renderer as dispatching for as long as it is alive.
struct DispatchScope<'a>(&'a RendererShared);

impl<'a> DispatchScope<'a> {
    fn enter(renderer: &'a RendererShared) -> Self {
        renderer.enter_dispatch();
        DispatchScope(renderer)
    }
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        self.0.leave_dispatch();
    }
}

/// A callback resolved to its live renderer and view.
struct Target {
    renderer: Rc<RendererShared>,
    view: View,
    raw: u64,
    callback: &'static str,
}

fn resolve_target(raw: u64, callback: &'static str) -> Option<Target> {
    let Some(renderer) = current_shared() else {
        let diagnostic = Diagnostic::new(
            DiagnosticCode::NoLiveRenderer,
            format!("{} raised while no renderer is live", callback),
        )
        .with_origin(Origin::new(raw, callback))
        .build();
        let _ = LogEmitter.emit(&diagnostic);
        return None;
    };

    let resolved = match renderer.views.try_borrow_mut() {
        Ok(mut views) => views.resolve(NativeHandle::from_raw(raw)),
        Err(_) => None,
    };
    let Some(shared) = resolved else {
        log::trace!("{}: no wrapper for view {:#x}, event dropped", callback, raw);
        return None;
    };
    if !shared.ptr.is_valid() {
        return None;
    }

    Some(Target {
        renderer,
        view: View::from_shared(shared),
        raw,
        callback,
    })
}

impl Target {
    fn origin(&self) -> Origin {
        Origin::new(self.raw, self.callback)
    }

    fn view_listener(&self) -> Option<Rc<dyn ViewListener>> {
        self.view.shared().listener.borrow().clone()
    }

    fn load_listener(&self) -> Option<Rc<dyn LoadListener>> {
        self.view.shared().load_listener.borrow().clone()
    }

    fn string(&self, value: NativeStr, argument: &str) -> String {
        // SAFETY: the engine keeps string arguments alive for the duration of
        // the callback, and this copy is made before the callback returns.
        let (text, lossy) = unsafe { decode_str(value) };
        if lossy {
            self.renderer.report(
                Diagnostic::new(
                    DiagnosticCode::InvalidUtf8,
                    format!("`{}` was not valid UTF-8", argument),
                )
                .with_origin(self.origin())
                .with_note("invalid sequences were replaced with U+FFFD")
                .build(),
            );
        }
        text
    }

    fn enum_arg<T>(&self, code: u32) -> Option<T>
    where
        T: TryFrom<u32, Error = UnknownCode>,
    {
        match T::try_from(code) {
            Ok(value) => Some(value),
            Err(unknown) => {
                self.renderer.report(
                    Diagnostic::new(DiagnosticCode::UnknownEnumCode, unknown.to_string())
                        .with_origin(self.origin())
                        .with_note("event dropped")
                        .build(),
                );
                None
            }
        }
    }

    /// Run a listener method, containing its errors and panics.
    fn invoke<R>(&self, f: impl FnOnce() -> ListenerResult<R>) -> Option<R> {
        let _scope = DispatchScope::enter(&self.renderer);
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.renderer.report(
                    Diagnostic::new(DiagnosticCode::ListenerError, format!("listener failed: {:#}", e))
                        .with_origin(self.origin())
                        .build(),
                );
                None
            }
            Err(payload) => {
                self.renderer.report(
                    Diagnostic::new(
                        DiagnosticCode::ListenerPanic,
                        format!("listener panicked: {}", panic_message(&*payload)),
                    )
                    .with_origin(self.origin())
                    .with_help("later events are still delivered to this listener")
                    .build(),
                );
                None
            }
        }
    }

    /// Raw handle to give back for a child-view answer, 0 when unusable.
    fn child_handle(&self, child: &View) -> u64 {
        let same_renderer = std::ptr::eq(child.shared().renderer().as_ptr(), Rc::as_ptr(&self.renderer));
        let reason = match child.handle() {
            Ok(_) if child.ptr_eq(&self.view) => "the opener itself",
            Ok(handle) if same_renderer => return handle.raw(),
            Ok(_) => "a view of another renderer",
            Err(_) => "a disposed view",
        };
        self.renderer.report(
            Diagnostic::new(
                DiagnosticCode::InvalidChildView,
                format!("listener answered a child-view request with {}", reason),
            )
            .with_origin(self.origin())
            .with_note("the request was denied")
            .build(),
        );
        0
    }
}

fn string_event(
    raw: u64,
    callback: &'static str,
    argument: &'static str,
    value: NativeStr,
    f: impl FnOnce(&dyn ViewListener, &View, &str) -> ListenerResult,
) {
    boundary((), || {
        let Some(target) = resolve_target(raw, callback) else { return };
        let Some(listener) = target.view_listener() else { return };
        let text = target.string(value, argument);
        target.invoke(|| f(&*listener, &target.view, &text));
    })
}

fn frame_event(
    raw: u64,
    callback: &'static str,
    frame_id: u64,
    is_main_frame: bool,
    url: NativeStr,
    f: impl FnOnce(&dyn LoadListener, &View, &FrameInfo) -> ListenerResult,
) {
    boundary((), || {
        let Some(target) = resolve_target(raw, callback) else { return };
        let Some(listener) = target.load_listener() else { return };
        let frame = FrameInfo {
            frame_id,
            is_main_frame,
            url: target.string(url, "url"),
        };
        target.invoke(|| f(&*listener, &target.view, &frame));
    })
}

extern "C" fn on_change_title(view: u64, title: NativeStr) {
    string_event(view, "on_change_title", "title", title, |l, v, s| l.on_change_title(v, s));
}

extern "C" fn on_change_url(view: u64, url: NativeStr) {
    string_event(view, "on_change_url", "url", url, |l, v, s| l.on_change_url(v, s));
}

extern "C" fn on_change_tooltip(view: u64, tooltip: NativeStr) {
    string_event(view, "on_change_tooltip", "tooltip", tooltip, |l, v, s| {
        l.on_change_tooltip(v, s)
    });
}

extern "C" fn on_change_cursor(view: u64, cursor: u32) {
    boundary((), || {
        let Some(target) = resolve_target(view, "on_change_cursor") else { return };
        let Some(listener) = target.view_listener() else { return };
        let Some(cursor) = target.enum_arg::<Cursor>(cursor) else { return };
        target.invoke(|| listener.on_change_cursor(&target.view, cursor));
    })
}

extern "C" fn on_add_console_message(
    view: u64,
    source: u32,
    level: u32,
    message: NativeStr,
    line: u64,
    column: u64,
    source_id: NativeStr,
) {
    boundary((), || {
        let Some(target) = resolve_target(view, "on_add_console_message") else { return };
        let Some(listener) = target.view_listener() else { return };
        let Some(source) = target.enum_arg::<MessageSource>(source) else { return };
        let Some(level) = target.enum_arg::<MessageLevel>(level) else { return };
        let message = ConsoleMessage {
            source,
            level,
            text: target.string(message, "message"),
            line,
            column,
            source_id: target.string(source_id, "source_id"),
        };
        target.invoke(|| listener.on_add_console_message(&target.view, &message));
    })
}

extern "C" fn on_create_child_view(
    view: u64,
    opener_url: NativeStr,
    target_url: NativeStr,
    is_popup: bool,
    rect: NativeRect,
) -> u64 {
    boundary(0, || {
        let Some(target) = resolve_target(view, "on_create_child_view") else { return 0 };
        let Some(listener) = target.view_listener() else { return 0 };
        let opener_url = target.string(opener_url, "opener_url");
        let target_url = target.string(target_url, "target_url");
        let rect = IntRect::from_native(rect);

        let child = target
            .invoke(|| listener.on_create_child_view(&target.view, &opener_url, &target_url, is_popup, rect))
            .flatten();
        match child {
            Some(child) => target.child_handle(&child),
            None => 0,
        }
    })
}

extern "C" fn on_begin_loading(view: u64, frame_id: u64, is_main_frame: bool, url: NativeStr) {
    frame_event(view, "on_begin_loading", frame_id, is_main_frame, url, |l, v, f| {
        l.on_begin_loading(v, f)
    });
}

extern "C" fn on_finish_loading(view: u64, frame_id: u64, is_main_frame: bool, url: NativeStr) {
    frame_event(view, "on_finish_loading", frame_id, is_main_frame, url, |l, v, f| {
        l.on_finish_loading(v, f)
    });
}

extern "C" fn on_fail_loading(
    view: u64,
    frame_id: u64,
    is_main_frame: bool,
    url: NativeStr,
    description: NativeStr,
    error_domain: NativeStr,
    error_code: i32,
) {
    boundary((), || {
        let Some(target) = resolve_target(view, "on_fail_loading") else { return };
        let Some(listener) = target.load_listener() else { return };
        let frame = FrameInfo {
            frame_id,
            is_main_frame,
            url: target.string(url, "url"),
        };
        let failure = LoadFailure {
            description: target.string(description, "description"),
            error_domain: target.string(error_domain, "error_domain"),
            error_code,
        };
        target.invoke(|| listener.on_fail_loading(&target.view, &frame, &failure));
    })
}

extern "C" fn on_window_object_ready(view: u64, frame_id: u64, is_main_frame: bool, url: NativeStr) {
    frame_event(view, "on_window_object_ready", frame_id, is_main_frame, url, |l, v, f| {
        l.on_window_object_ready(v, f)
    });
}

extern "C" fn on_dom_ready(view: u64, frame_id: u64, is_main_frame: bool, url: NativeStr) {
    frame_event(view, "on_dom_ready", frame_id, is_main_frame, url, |l, v, f| l.on_dom_ready(v, f));
}

extern "C" fn on_update_history(view: u64) {
    boundary((), || {
        let Some(target) = resolve_target(view, "on_update_history") else { return };
        let Some(listener) = target.load_listener() else { return };
        target.invoke(|| listener.on_update_history(&target.view));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use anyhow::bail;
    use ulbind_diagnostics::MemoryEmitter;

    use crate::config::Config;
    use crate::error::BindError;
    use crate::headless::HeadlessEngine;
    use crate::renderer::{serial, Renderer};

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }

        fn push(&self, event: String) {
            self.events.borrow_mut().push(event);
        }
    }

    impl ViewListener for Recorder {
        fn on_change_title(&self, _view: &View, title: &str) -> ListenerResult {
            if title == "boom" {
                panic!("title listener exploded");
            }
            if title == "fail" {
                bail!("cannot handle title");
            }
            self.push(format!("title:{}", title));
            Ok(())
        }

        fn on_change_cursor(&self, _view: &View, cursor: Cursor) -> ListenerResult {
            self.push(format!("cursor:{}", cursor));
            Ok(())
        }

        fn on_add_console_message(&self, _view: &View, message: &ConsoleMessage) -> ListenerResult {
            self.push(format!("console:{}:{}:{}", message.level, message.text, message.line));
            Ok(())
        }
    }

    impl LoadListener for Recorder {
        fn on_begin_loading(&self, _view: &View, frame: &FrameInfo) -> ListenerResult {
            self.push(format!("begin:{}:{}", frame.frame_id, frame.url));
            Ok(())
        }

        fn on_fail_loading(&self, _view: &View, _frame: &FrameInfo, failure: &LoadFailure) -> ListenerResult {
            self.push(format!("fail:{}:{}", failure.error_domain, failure.error_code));
            Ok(())
        }
    }

    fn setup() -> (Renderer, View, Rc<Recorder>, MemoryEmitter) {
        let renderer = Renderer::create(Rc::new(HeadlessEngine::new()), Config::default()).unwrap();
        let sink = MemoryEmitter::new();
        renderer.set_diagnostics(Box::new(sink.clone()));
        let view = renderer.create_view(320, 240, false, false).unwrap();
        let recorder = Rc::new(Recorder::default());
        view.set_listener(Some(recorder.clone())).unwrap();
        view.set_load_listener(Some(recorder.clone())).unwrap();
        (renderer, view, recorder, sink)
    }

    fn raw(view: &View) -> u64 {
        view.handle().unwrap().raw()
    }

    #[test]
    fn test_string_events_reach_listener() {
        let _serial = serial();
        let (_renderer, view, recorder, sink) = setup();
        on_change_title(raw(&view), NativeStr::new("Hello"));
        on_change_tooltip(raw(&view), NativeStr::new("ignored by default"));
        assert_eq!(recorder.events(), vec!["title:Hello".to_string()]);
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_delivered_lossily() {
        let _serial = serial();
        let (_renderer, view, recorder, sink) = setup();
        let bytes = [b'a', 0xc3, b'b'];
        on_change_title(raw(&view), NativeStr { ptr: bytes.as_ptr(), len: bytes.len() });

        assert_eq!(recorder.events(), vec!["title:a\u{fffd}b".to_string()]);
        assert_eq!(sink.snapshot().count_code(DiagnosticCode::InvalidUtf8), 1);
    }

    #[test]
    fn test_unknown_enum_code_drops_event() {
        let _serial = serial();
        let (_renderer, view, recorder, sink) = setup();
        on_change_cursor(raw(&view), 2);
        on_change_cursor(raw(&view), 99);
        on_add_console_message(raw(&view), 1, 0, NativeStr::new("x"), 1, 1, NativeStr::new(""));
        on_add_console_message(raw(&view), 1, 3, NativeStr::new("oops"), 7, 2, NativeStr::new("app.js"));

        assert_eq!(
            recorder.events(),
            vec!["cursor:Hand".to_string(), "console:Error:oops:7".to_string()]
        );
        assert_eq!(sink.snapshot().count_code(DiagnosticCode::UnknownEnumCode), 2);
    }

    #[test]
    fn test_listener_error_and_panic_are_contained() {
        let _serial = serial();
        let (_renderer, view, recorder, sink) = setup();
        on_change_title(raw(&view), NativeStr::new("fail"));
        on_change_title(raw(&view), NativeStr::new("boom"));
        on_change_title(raw(&view), NativeStr::new("after"));

        assert_eq!(recorder.events(), vec!["title:after".to_string()]);
        let diagnostics = sink.snapshot();
        assert_eq!(diagnostics.count_code(DiagnosticCode::ListenerError), 1);
        assert_eq!(diagnostics.count_code(DiagnosticCode::ListenerPanic), 1);
        let panic = diagnostics
            .iter()
            .find(|d| d.code == DiagnosticCode::ListenerPanic)
            .unwrap();
        assert!(panic.message.contains("title listener exploded"));
        assert_eq!(panic.origin.as_ref().unwrap().callback, "on_change_title");
    }

    #[test]
    fn test_load_events_use_load_listener() {
        let _serial = serial();
        let (_renderer, view, recorder, _sink) = setup();
        on_begin_loading(raw(&view), 1, true, NativeStr::new("https://example.com/"));
        on_fail_loading(
            raw(&view),
            1,
            true,
            NativeStr::new("https://example.com/"),
            NativeStr::new("connection refused"),
            NativeStr::new("net"),
            -102,
        );
        on_update_history(raw(&view));
        assert_eq!(
            recorder.events(),
            vec!["begin:1:https://example.com/".to_string(), "fail:net:-102".to_string()]
        );
    }

    #[test]
    fn test_events_for_unknown_or_disposed_views_are_dropped() {
        let _serial = serial();
        let (_renderer, view, recorder, _sink) = setup();
        on_change_title(0xdead_0000, NativeStr::new("nobody"));

        let handle = raw(&view);
        view.dispose();
        on_change_title(handle, NativeStr::new("too late"));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_no_live_renderer() {
        // Must not panic or reach any listener.
        on_change_title(0x1000, NativeStr::new("orphan"));
        assert_eq!(on_create_child_view(0x1000, NativeStr::new(""), NativeStr::new(""), true, NativeRect::default()), 0);
    }

    struct Opener {
        child: RefCell<Option<View>>,
        purge: RefCell<Option<Result<(), BindError>>>,
    }

    impl ViewListener for Opener {
        fn on_change_title(&self, _view: &View, _title: &str) -> ListenerResult {
            let renderer = Renderer::current()?;
            *self.purge.borrow_mut() = Some(renderer.purge_memory());
            Ok(())
        }

        fn on_create_child_view(
            &self,
            _view: &View,
            _opener_url: &str,
            _target_url: &str,
            _is_popup: bool,
            _rect: Option<IntRect>,
        ) -> ListenerResult<Option<View>> {
            Ok(self.child.borrow().clone())
        }
    }

    #[test]
    fn test_child_view_answers() {
        let _serial = serial();
        let (renderer, view, _recorder, sink) = setup();
        let opener = Rc::new(Opener { child: RefCell::new(None), purge: RefCell::new(None) });
        view.set_listener(Some(opener.clone())).unwrap();
        let rect = NativeRect { x: 0, y: 0, width: 100, height: 100, valid: true };

        // denied
        assert_eq!(on_create_child_view(raw(&view), NativeStr::new("a"), NativeStr::new("b"), true, rect), 0);

        // accepted
        let child = renderer.create_view(100, 100, false, false).unwrap();
        *opener.child.borrow_mut() = Some(child.clone());
        assert_eq!(
            on_create_child_view(raw(&view), NativeStr::new("a"), NativeStr::new("b"), true, rect),
            raw(&child)
        );

        // disposed child
        child.dispose();
        assert_eq!(on_create_child_view(raw(&view), NativeStr::new("a"), NativeStr::new("b"), false, rect), 0);
        assert_eq!(sink.snapshot().count_code(DiagnosticCode::InvalidChildView), 1);

        // the opener cannot adopt itself
        *opener.child.borrow_mut() = Some(view.clone());
        assert_eq!(on_create_child_view(raw(&view), NativeStr::new("a"), NativeStr::new("b"), true, rect), 0);
        let diagnostics = sink.snapshot();
        assert_eq!(diagnostics.count_code(DiagnosticCode::InvalidChildView), 2);
        assert!(diagnostics.iter().any(|d| d.message.contains("the opener itself")));
        opener.child.borrow_mut().take();
    }

    #[test]
    fn test_purge_from_callback_is_rejected() {
        let _serial = serial();
        let (renderer, view, _recorder, _sink) = setup();
        let opener = Rc::new(Opener { child: RefCell::new(None), purge: RefCell::new(None) });
        view.set_listener(Some(opener.clone())).unwrap();

        on_change_title(raw(&view), NativeStr::new("t"));
        assert!(matches!(*opener.purge.borrow(), Some(Err(BindError::ReentrantPurge))));
        assert!(renderer.purge_memory().is_ok());
    }
}
