//! Rust binding layer for an embedded HTML renderer.
//!
//! The engine owns its objects and counts references to them; this crate
//! gives them safe, scoped ownership on the Rust side and routes the
//! engine's callbacks to listener objects:
//! - [`RefPtr`] holds one counted reference and gives it back exactly once
//! - [`Renderer`] is the process-wide singleton that creates and drives views
//! - [`View`] wraps a native view; [`ViewListener`] and [`LoadListener`]
//!   receive its events
//! - failures inside listeners become [`Diagnostic`](ulbind_diagnostics::Diagnostic)s
//!   and never reach the engine
//!
//! [`HeadlessEngine`] implements [`NativeEngine`] without a rendering
//! backend, so the whole layer can be exercised in-process.

pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod handle;
pub mod headless;
pub mod listener;
pub mod marshal;
pub mod ref_ptr;
pub mod registry;
pub mod renderer;
pub mod view;

pub use config::{Config, CONFIG_FILE};
pub use engine::{NativeEngine, NativeRect, NativeRenderer, NativeStr, NativeType, NativeView, ViewCallbacks};
pub use error::{BindError, Result};
pub use handle::NativeHandle;
pub use headless::{EngineStats, EventRect, HeadlessEngine, NativeEvent};
pub use listener::{FrameInfo, ListenerResult, LoadFailure, LoadListener, ViewListener};
pub use marshal::{ConsoleMessage, Cursor, IntRect, MessageLevel, MessageSource, UnknownCode};
pub use ref_ptr::{RefPtr, Session};
pub use registry::HandleRegistry;
pub use renderer::{LifecycleState, Renderer};
pub use view::View;
