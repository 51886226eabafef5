//! Where on the native boundary a diagnostic was raised.

use serde::{Deserialize, Serialize};

/// The emitting native object and the callback entry that was running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    /// Raw native handle of the emitting object (0 when unknown)
    pub handle: u64,
    /// Callback table entry, e.g. `on_change_title`
    pub callback: String,
}

impl Origin {
    /// Create a new origin.
    pub fn new(handle: u64, callback: impl Into<String>) -> Self {
        Self {
            handle,
            callback: callback.into(),
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:#x}", self.callback, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let origin = Origin::new(0x1040, "on_change_url");
        assert_eq!(origin.to_string(), "on_change_url@0x1040");
    }
}
