//! Opaque native handles.
//!
//! A handle is the address of an object living inside the native engine. It
//! crosses the boundary as a `u64` and is never dereferenced or offset on the
//! Rust side; ownership is expressed separately by [`RefPtr`](crate::RefPtr).

use serde::{Deserialize, Serialize};

/// Opaque address of a native object.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeHandle(u64);

impl NativeHandle {
    /// The null handle. Returned by the engine to signal failure or "no object".
    pub const NULL: NativeHandle = NativeHandle(0);

    pub const fn from_raw(raw: u64) -> Self {
        NativeHandle(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for NativeHandle {
    fn from(raw: u64) -> Self {
        NativeHandle(raw)
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
