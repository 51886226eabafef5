//! Diagnostic side channel for the ulbind binding layer.
//!
//! Failures that happen on the native side of a callback (a listener that
//! returns an error or panics, an argument that cannot be marshalled) must not
//! unwind into the engine. They are turned into structured diagnostics instead:
//! - Stable error codes with a default severity
//! - The native handle and callback the failure came from
//! - Multiple output formats (log facade, terminal, JSON, plain text, in-memory)
//!
//! # Example
//!
//! ```
//! use ulbind_diagnostics::{
//!     Diagnostic, DiagnosticCode, DiagnosticEmitter, MemoryEmitter, Origin,
//! };
//!
//! let diag = Diagnostic::new(DiagnosticCode::ListenerError, "listener failed: boom")
//!     .with_origin(Origin::new(0x1040, "on_change_title"))
//!     .build();
//!
//! let mut emitter = MemoryEmitter::new();
//! emitter.emit(&diag).unwrap();
//! assert_eq!(emitter.snapshot().len(), 1);
//! ```

pub mod diagnostic;
pub mod emitter;
pub mod origin;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Diagnostics, Severity};
pub use emitter::{
    DiagnosticEmitter, JsonEmitter, LogEmitter, MemoryEmitter, SimpleEmitter, TerminalEmitter,
};
pub use origin::Origin;
