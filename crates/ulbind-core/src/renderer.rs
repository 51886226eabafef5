//! The renderer: process-wide coordinator of every view.
//!
//! Exactly one renderer may exist in the process at a time. It is created
//! through [`Renderer::create`], driven by [`Renderer::update`] and
//! [`Renderer::render`] from the thread that created it, and torn down by
//! [`Renderer::dispose`] (or by dropping its last handle). Native callbacks
//! only ever arrive from inside `update`/`render`.
//!
//! The process-wide slot records which thread owns the live renderer; the
//! thread-local lifecycle routes callbacks on that thread to it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use ulbind_diagnostics::{Diagnostic, DiagnosticEmitter, LogEmitter};

use crate::config::Config;
use crate::dispatch;
use crate::engine::{NativeEngine, NativeRenderer, NativeView};
use crate::error::{BindError, Result};
use crate::handle::NativeHandle;
use crate::ref_ptr::{RefPtr, Session};
use crate::registry::HandleRegistry;
use crate::view::{View, ViewShared};

/// Observable lifecycle of the renderer singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Created,
    Disposed,
}

enum Lifecycle {
    Uninitialized,
    Created(Weak<RendererShared>),
    Disposed,
}

/// Thread owning the live renderer, if any.
static OWNER: Mutex<Option<ThreadId>> = Mutex::new(None);

fn owner() -> MutexGuard<'static, Option<ThreadId>> {
    // The slot is a plain value; a panic while it was held leaves it usable.
    OWNER.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Claim the process-wide slot for the calling thread.
fn claim_owner() -> Result<()> {
    let mut owner = owner();
    if let Some(thread) = *owner {
        log::debug!("renderer already live on {:?}", thread);
        return Err(BindError::AlreadyInitialized);
    }
    *owner = Some(thread::current().id());
    Ok(())
}

fn release_owner() {
    *owner() = None;
}

#[cfg(test)]
static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that create a renderer; the test harness runs them on
/// parallel threads.
#[cfg(test)]
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

thread_local! {
    /// Routing state for the thread driving the renderer.
    static LIFECYCLE: RefCell<Lifecycle> = const { RefCell::new(Lifecycle::Uninitialized) };
}

/// The live renderer of this thread, if any.
pub(crate) fn current_shared() -> Option<Rc<RendererShared>> {
    LIFECYCLE
        .try_with(|l| match &*l.borrow() {
            Lifecycle::Created(weak) => weak.upgrade(),
            _ => None,
        })
        .ok()
        .flatten()
}

pub(crate) struct RendererShared {
    ptr: RefPtr<NativeRenderer>,
    pub(crate) engine: Rc<dyn NativeEngine>,
    pub(crate) session: Session,
    pub(crate) config: Config,
    /// Weak routing table used by the dispatcher.
    pub(crate) views: RefCell<HandleRegistry<ViewShared>>,
    /// The renderer's own counted reference to every view it created.
    owned: RefCell<HashMap<NativeHandle, RefPtr<NativeView>>>,
    dispatch_depth: Cell<u32>,
    updates: Cell<u64>,
    diagnostics: RefCell<Box<dyn DiagnosticEmitter>>,
    disposed: Cell<bool>,
}

impl RendererShared {
    fn live_handle(&self) -> Result<NativeHandle> {
        if self.disposed.get() {
            return Err(BindError::NotInitialized);
        }
        self.ptr.handle()
    }

    pub(crate) fn is_dispatching(&self) -> bool {
        self.dispatch_depth.get() > 0
    }

    fn ensure_not_dispatching(&self, operation: &'static str) -> Result<()> {
        if self.is_dispatching() {
            return Err(BindError::ReentrantCall(operation));
        }
        Ok(())
    }

    pub(crate) fn enter_dispatch(&self) {
        self.dispatch_depth.set(self.dispatch_depth.get() + 1);
    }

    pub(crate) fn leave_dispatch(&self) {
        self.dispatch_depth.set(self.dispatch_depth.get().saturating_sub(1));
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        match self.diagnostics.try_borrow_mut() {
            Ok(mut sink) => {
                if let Err(e) = sink.emit(&diagnostic) {
                    log::error!("failed to emit diagnostic {}: {}", diagnostic.code, e);
                }
            }
            // A sink reporting into itself; fall back to the log.
            Err(_) => {
                let _ = LogEmitter.emit(&diagnostic);
            }
        }
    }

    fn teardown(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let handle = self.ptr.handle();

        if let Ok(handle) = handle {
            if self.config.log_memory_on_dispose {
                self.engine.log_memory_usage(handle);
            }
        }

        // Drop the renderer's own view references while the session is still
        // alive, so they are given back to the engine one by one.
        let owned = std::mem::take(&mut *self.owned.borrow_mut());
        let released = owned.len();
        drop(owned);

        self.session.end();
        self.views.borrow_mut().clear();

        if let Ok(handle) = handle {
            self.engine.dispose(handle);
            log::info!("renderer {} disposed ({} views released)", handle, released);
        }

        let me = self as *const RendererShared;
        let _ = LIFECYCLE.try_with(|l| {
            if let Ok(mut state) = l.try_borrow_mut() {
                if matches!(&*state, Lifecycle::Created(weak) if std::ptr::eq(weak.as_ptr(), me)) {
                    *state = Lifecycle::Disposed;
                }
            }
        });
        release_owner();
    }
}

impl Drop for RendererShared {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle to the renderer singleton. Clones share the same renderer.
#[derive(Clone)]
pub struct Renderer {
    shared: Rc<RendererShared>,
}

impl Renderer {
    /// Create the renderer singleton.
    ///
    /// Fails with `AlreadyInitialized` while another renderer is live
    /// anywhere in the process. Creating again after disposal is allowed.
    pub fn create(engine: Rc<dyn NativeEngine>, config: Config) -> Result<Renderer> {
        claim_owner()?;

        let handle = engine.create_renderer();
        if handle.is_null() {
            release_owner();
            return Err(BindError::CreationFailed("renderer"));
        }
        let session = Session::new();
        let ptr = match RefPtr::wrap(Rc::clone(&engine), &session, handle) {
            Ok(ptr) => ptr,
            Err(e) => {
                release_owner();
                return Err(e);
            }
        };

        let shared = Rc::new(RendererShared {
            ptr,
            engine,
            session,
            config,
            views: RefCell::new(HandleRegistry::new()),
            owned: RefCell::new(HashMap::new()),
            dispatch_depth: Cell::new(0),
            updates: Cell::new(0),
            diagnostics: RefCell::new(Box::new(LogEmitter::new())),
            disposed: Cell::new(false),
        });

        LIFECYCLE.with(|l| *l.borrow_mut() = Lifecycle::Created(Rc::downgrade(&shared)));
        log::info!("renderer {} created", handle);
        Ok(Renderer { shared })
    }

    /// The live renderer, when called from the thread that created it.
    pub fn current() -> Result<Renderer> {
        current_shared()
            .map(|shared| Renderer { shared })
            .ok_or(BindError::NotInitialized)
    }

    /// Lifecycle state of the singleton as seen from this thread.
    pub fn state() -> LifecycleState {
        LIFECYCLE
            .try_with(|l| match &*l.borrow() {
                Lifecycle::Uninitialized => LifecycleState::Uninitialized,
                Lifecycle::Created(weak) if weak.strong_count() > 0 => LifecycleState::Created,
                _ => LifecycleState::Disposed,
            })
            .unwrap_or(LifecycleState::Disposed)
    }

    pub(crate) fn from_shared(shared: Rc<RendererShared>) -> Renderer {
        Renderer { shared }
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.shared.live_handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.get()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Replace the diagnostic sink. Defaults to [`LogEmitter`].
    pub fn set_diagnostics(&self, sink: Box<dyn DiagnosticEmitter>) {
        *self.shared.diagnostics.borrow_mut() = sink;
    }

    /// Create a new view.
    ///
    /// The renderer keeps its own reference to the view until
    /// [`close_view`](Self::close_view) or disposal; the returned `View`
    /// holds another one.
    pub fn create_view(
        &self,
        width: u32,
        height: u32,
        transparent: bool,
        force_cpu_renderer: bool,
    ) -> Result<View> {
        let renderer = self.shared.live_handle()?;
        if width == 0 || height == 0 {
            return Err(BindError::InvalidDimensions { width, height });
        }

        let engine = &self.shared.engine;
        let handle = engine.create_view(renderer, width, height, transparent, force_cpu_renderer);
        if handle.is_null() {
            return Err(BindError::CreationFailed("view"));
        }

        let ptr = RefPtr::<NativeView>::wrap(Rc::clone(engine), &self.shared.session, handle)?;
        let shared = Rc::new(ViewShared::new(
            handle,
            ptr,
            Rc::downgrade(&self.shared),
            width,
            height,
            transparent,
        ));
        self.shared.views.borrow_mut().register(handle, &shared)?;

        let internal = shared.ptr.clone();
        self.shared.owned.borrow_mut().insert(handle, internal);
        engine.set_view_callbacks(handle, dispatch::VIEW_CALLBACKS);

        log::debug!("view {} created ({}x{}, transparent={})", handle, width, height, transparent);
        Ok(View::from_shared(shared))
    }

    /// [`create_view`](Self::create_view) with `force_cpu_renderer` taken
    /// from the config.
    pub fn create_view_default(&self, width: u32, height: u32, transparent: bool) -> Result<View> {
        self.create_view(width, height, transparent, self.shared.config.force_cpu_renderer)
    }

    /// Give back the renderer's own reference to `view`. The native view is
    /// destroyed once every outstanding `View` is gone as well.
    pub fn close_view(&self, view: &View) -> Result<()> {
        self.shared.live_handle()?;
        let handle = view.raw_handle();
        let internal = self.shared.owned.borrow_mut().remove(&handle);
        match internal {
            Some(ptr) => {
                drop(ptr);
                Ok(())
            }
            None => Err(BindError::InvalidHandle(handle)),
        }
    }

    /// Resolve a native handle to its live view.
    pub fn view(&self, handle: NativeHandle) -> Result<View> {
        self.shared.live_handle()?;
        let shared = self.shared.views.borrow_mut().resolve(handle);
        match shared {
            Some(shared) if shared.ptr.is_valid() => Ok(View::from_shared(shared)),
            _ => Err(BindError::InvalidHandle(handle)),
        }
    }

    /// Number of views the renderer still holds a reference to.
    pub fn view_count(&self) -> usize {
        self.shared.owned.borrow().len()
    }

    /// Number of views with a live managed wrapper.
    pub fn registered_view_count(&self) -> usize {
        self.shared.views.borrow().live().len()
    }

    /// Update timers and dispatch pending callbacks.
    pub fn update(&self) -> Result<()> {
        let handle = self.shared.live_handle()?;
        self.shared.ensure_not_dispatching("update")?;
        self.shared.engine.update(handle);

        let updates = self.shared.updates.get() + 1;
        self.shared.updates.set(updates);
        let interval = u64::from(self.shared.config.sweep_interval);
        if interval > 0 && updates % interval == 0 {
            let swept = self.shared.views.borrow_mut().sweep();
            if swept > 0 {
                log::debug!("swept {} stale view entries", swept);
            }
        }
        Ok(())
    }

    /// Render all active views.
    pub fn render(&self) -> Result<()> {
        let handle = self.shared.live_handle()?;
        self.shared.ensure_not_dispatching("render")?;
        self.shared.engine.render(handle);
        Ok(())
    }

    /// Release as much native memory as possible. Not allowed from inside a
    /// callback.
    pub fn purge_memory(&self) -> Result<()> {
        let handle = self.shared.live_handle()?;
        if self.shared.is_dispatching() {
            return Err(BindError::ReentrantPurge);
        }
        self.shared.engine.purge_memory(handle);
        Ok(())
    }

    pub fn log_memory_usage(&self) -> Result<()> {
        let handle = self.shared.live_handle()?;
        self.shared.engine.log_memory_usage(handle);
        Ok(())
    }

    /// Tear down the renderer and everything rooted in it. Every `View` and
    /// `RefPtr` still held becomes invalid. Calling it again is a no-op.
    pub fn dispose(&self) -> Result<()> {
        if self.shared.disposed.get() {
            return Ok(());
        }
        self.shared.ensure_not_dispatching("dispose")?;
        self.shared.teardown();
        Ok(())
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("ptr", &self.shared.ptr)
            .field("views", &self.view_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
