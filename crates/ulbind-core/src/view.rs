//! Views: native pages owned by the renderer.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::engine::NativeView;
use crate::error::{BindError, Result};
use crate::handle::NativeHandle;
use crate::listener::{LoadListener, ViewListener};
use crate::ref_ptr::RefPtr;
use crate::renderer::{Renderer, RendererShared};

pub(crate) struct ViewShared {
    handle: NativeHandle,
    pub(crate) ptr: RefPtr<NativeView>,
    /// Back-reference only; a view never keeps its renderer alive.
    renderer: Weak<RendererShared>,
    pub(crate) listener: RefCell<Option<Rc<dyn ViewListener>>>,
    pub(crate) load_listener: RefCell<Option<Rc<dyn LoadListener>>>,
    size: Cell<(u32, u32)>,
    transparent: bool,
}

impl ViewShared {
    pub(crate) fn new(
        handle: NativeHandle,
        ptr: RefPtr<NativeView>,
        renderer: Weak<RendererShared>,
        width: u32,
        height: u32,
        transparent: bool,
    ) -> Self {
        ViewShared {
            handle,
            ptr,
            renderer,
            listener: RefCell::new(None),
            load_listener: RefCell::new(None),
            size: Cell::new((width, height)),
            transparent,
        }
    }

    pub(crate) fn renderer(&self) -> &Weak<RendererShared> {
        &self.renderer
    }
}

impl Drop for ViewShared {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.upgrade() {
            if let Ok(mut views) = renderer.views.try_borrow_mut() {
                views.unregister_stale(self.handle);
            }
        }
    }
}

/// A native view. Clones share the same wrapper and the same native
/// reference; the reference is given back when the last clone is dropped or
/// on [`View::dispose`].
#[derive(Clone)]
pub struct View {
    shared: Rc<ViewShared>,
}

impl View {
    pub(crate) fn from_shared(shared: Rc<ViewShared>) -> View {
        View { shared }
    }

    pub(crate) fn shared(&self) -> &Rc<ViewShared> {
        &self.shared
    }

    /// The native handle; `InvalidHandle` once disposed.
    pub fn handle(&self) -> Result<NativeHandle> {
        self.shared.ptr.handle()
    }

    /// The address this view was created with, valid or not.
    pub(crate) fn raw_handle(&self) -> NativeHandle {
        self.shared.handle
    }

    pub fn is_valid(&self) -> bool {
        self.shared.ptr.is_valid()
    }

    /// Whether both values wrap the same view.
    pub fn ptr_eq(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// The renderer owning this view.
    pub fn renderer(&self) -> Result<Renderer> {
        self.handle()?;
        self.shared
            .renderer
            .upgrade()
            .map(Renderer::from_shared)
            .ok_or(BindError::NotInitialized)
    }

    pub fn width(&self) -> Result<u32> {
        self.handle()?;
        Ok(self.shared.size.get().0)
    }

    pub fn height(&self) -> Result<u32> {
        self.handle()?;
        Ok(self.shared.size.get().1)
    }

    pub fn is_transparent(&self) -> Result<bool> {
        self.handle()?;
        Ok(self.shared.transparent)
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        let handle = self.handle()?;
        if width == 0 || height == 0 {
            return Err(BindError::InvalidDimensions { width, height });
        }
        self.shared.ptr.engine().resize(handle, width, height);
        self.shared.size.set((width, height));
        Ok(())
    }

    pub fn load_html(&self, html: &str) -> Result<()> {
        let handle = self.handle()?;
        self.shared.ptr.engine().load_html(handle, html);
        Ok(())
    }

    pub fn load_url(&self, url: &str) -> Result<()> {
        let handle = self.handle()?;
        self.shared.ptr.engine().load_url(handle, url);
        Ok(())
    }

    pub fn url(&self) -> Result<String> {
        let handle = self.handle()?;
        Ok(self.shared.ptr.engine().view_url(handle))
    }

    pub fn title(&self) -> Result<String> {
        let handle = self.handle()?;
        Ok(self.shared.ptr.engine().view_title(handle))
    }

    /// Register the view listener, replacing any previous one. `None` clears it.
    pub fn set_listener(&self, listener: Option<Rc<dyn ViewListener>>) -> Result<()> {
        self.handle()?;
        *self.shared.listener.borrow_mut() = listener;
        Ok(())
    }

    /// Register the load listener, replacing any previous one. `None` clears it.
    pub fn set_load_listener(&self, listener: Option<Rc<dyn LoadListener>>) -> Result<()> {
        self.handle()?;
        *self.shared.load_listener.borrow_mut() = listener;
        Ok(())
    }

    /// Give back this wrapper's native reference and stop routing callbacks
    /// to it. The renderer's own reference is unaffected. Safe to call more
    /// than once.
    pub fn dispose(&self) {
        let was_valid = self.shared.ptr.is_valid();
        self.shared.ptr.release();
        self.shared.listener.borrow_mut().take();
        self.shared.load_listener.borrow_mut().take();
        if let Some(renderer) = self.shared.renderer.upgrade() {
            if let Ok(mut views) = renderer.views.try_borrow_mut() {
                views.unregister(self.shared.handle);
            }
        }
        if was_valid {
            log::debug!("view {} disposed", self.shared.handle);
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("handle", &self.shared.handle)
            .field("valid", &self.is_valid())
            .field("size", &self.shared.size.get())
            .finish()
    }
}
