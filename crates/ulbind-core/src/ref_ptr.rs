//! Counted references to native objects.
//!
//! A [`RefPtr`] owns exactly one unit of a native object's reference count.
//! Cloning adds a unit, dropping or [`RefPtr::release`] gives it back exactly
//! once. The native side destroys the object when its count reaches zero.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::engine::{NativeEngine, NativeType};
use crate::error::{BindError, Result};
use crate::handle::NativeHandle;

/// Liveness of one renderer session. Every `RefPtr` rooted in a renderer
/// observes the same token; ending it invalidates all of them at once.
#[derive(Debug, Clone)]
pub struct Session(Rc<Cell<bool>>);

impl Session {
    pub fn new() -> Self {
        Session(Rc::new(Cell::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.get()
    }

    /// Mark the session torn down. Outstanding pointers stop touching the
    /// engine: the native graph is gone with it.
    pub(crate) fn end(&self) {
        self.0.set(false);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RefPtr<T: NativeType> {
    handle: NativeHandle,
    released: Cell<bool>,
    engine: Rc<dyn NativeEngine>,
    session: Session,
    _marker: PhantomData<*const T>,
}

impl<T: NativeType> RefPtr<T> {
    /// Adopt a reference the caller already owns, e.g. a handle the engine
    /// returned already incremented. Does not touch the native count.
    pub fn wrap(engine: Rc<dyn NativeEngine>, session: &Session, handle: NativeHandle) -> Result<Self> {
        if handle.is_null() || !session.is_alive() {
            return Err(BindError::InvalidHandle(handle));
        }
        log::trace!("adopt {} {}", T::NAME, handle);
        Ok(RefPtr {
            handle,
            released: Cell::new(false),
            engine,
            session: session.clone(),
            _marker: PhantomData,
        })
    }

    /// The native handle, as long as this pointer still holds its reference.
    pub fn handle(&self) -> Result<NativeHandle> {
        if self.is_valid() {
            Ok(self.handle)
        } else {
            Err(BindError::InvalidHandle(self.handle))
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.released.get() && self.session.is_alive()
    }

    /// Give the reference back. Only the first call decrements; later calls,
    /// and calls after the session ended, are no-ops.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        if !self.session.is_alive() {
            log::trace!("{} {} outlived its session", T::NAME, self.handle);
            return;
        }
        log::trace!("release {} {}", T::NAME, self.handle);
        self.engine.release(self.handle);
    }

    pub(crate) fn engine(&self) -> &Rc<dyn NativeEngine> {
        &self.engine
    }
}

impl<T: NativeType> Clone for RefPtr<T> {
    fn clone(&self) -> Self {
        let valid = self.is_valid();
        if valid {
            log::trace!("add_ref {} {}", T::NAME, self.handle);
            self.engine.add_ref(self.handle);
        }
        RefPtr {
            handle: self.handle,
            released: Cell::new(!valid),
            engine: Rc::clone(&self.engine),
            session: self.session.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: NativeType> Drop for RefPtr<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: NativeType> fmt::Debug for RefPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefPtr")
            .field("type", &T::NAME)
            .field("handle", &self.handle)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NativeView;
    use crate::headless::HeadlessEngine;

    fn setup() -> (Rc<HeadlessEngine>, Session, NativeHandle) {
        let engine = Rc::new(HeadlessEngine::new());
        let renderer = engine.create_renderer();
        let view = engine.create_view(renderer, 64, 64, false, false);
        (engine, Session::new(), view)
    }

    #[test]
    fn test_wrap_null_fails() {
        let (engine, session, _) = setup();
        let err = RefPtr::<NativeView>::wrap(engine, &session, NativeHandle::NULL).unwrap_err();
        assert!(matches!(err, BindError::InvalidHandle(h) if h.is_null()));
    }

    #[test]
    fn test_clone_and_release_balance() {
        let (engine, session, view) = setup();
        let before = engine.stats();

        let a = RefPtr::<NativeView>::wrap(engine.clone(), &session, view).unwrap();
        let b = a.clone();
        let c = b.clone();
        assert_eq!(engine.ref_count(view), Some(3));

        b.release();
        b.release();
        b.release();
        assert_eq!(engine.ref_count(view), Some(2));
        assert!(matches!(b.handle(), Err(BindError::InvalidHandle(h)) if h == view));

        // a clone of a released pointer is released too and costs nothing
        let d = b.clone();
        assert!(!d.is_valid());
        drop(d);

        drop(a);
        assert_eq!(c.handle().unwrap(), view);
        drop(c);

        let after = engine.stats();
        assert_eq!(after.add_refs - before.add_refs, 2);
        assert_eq!(after.releases - before.releases, 3);
        assert!(!engine.is_alive(view));
    }

    #[test]
    fn test_release_sequences_never_over_decrement() {
        // clones: 1 (wrap) + n, releases attempted: many more than that
        for clones in 0..5 {
            let (engine, session, view) = setup();
            let root = RefPtr::<NativeView>::wrap(engine.clone(), &session, view).unwrap();
            let copies: Vec<_> = (0..clones).map(|_| root.clone()).collect();
            for _ in 0..3 {
                for copy in &copies {
                    copy.release();
                }
                root.release();
            }
            let stats = engine.stats();
            assert_eq!(stats.add_refs, clones as u64);
            assert_eq!(stats.releases, clones as u64 + 1);
            assert!(!engine.is_alive(view));
        }
    }

    #[test]
    fn test_ended_session_invalidates_without_decrement() {
        let (engine, session, view) = setup();
        let ptr = RefPtr::<NativeView>::wrap(engine.clone(), &session, view).unwrap();
        session.end();

        assert!(matches!(ptr.handle(), Err(BindError::InvalidHandle(_))));
        let releases = engine.stats().releases;
        drop(ptr);
        assert_eq!(engine.stats().releases, releases);
    }
}
