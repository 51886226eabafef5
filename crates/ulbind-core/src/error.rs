use crate::handle::NativeHandle;
use thiserror::Error;

pub type Result<T, E = BindError> = std::result::Result<T, E>;

/// Handle and lifecycle violations. These are programmer errors and are
/// surfaced to the caller immediately; continuing would risk corrupting the
/// native object graph.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid handle {0}: released, unregistered or owned by a disposed renderer")]
    InvalidHandle(NativeHandle),

    #[error("handle {0} is already registered to a different live object")]
    DuplicateHandle(NativeHandle),

    #[error("renderer already created; dispose it before creating another")]
    AlreadyInitialized,

    #[error("renderer is not initialized")]
    NotInitialized,

    #[error("purge_memory cannot be called from inside a callback")]
    ReentrantPurge,

    #[error("{0} cannot be called from inside a callback")]
    ReentrantCall(&'static str),

    #[error("invalid view dimensions {width}x{height}: width and height must be positive")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("native engine failed to create {0}")]
    CreationFailed(&'static str),

    #[error("config: {0}")]
    Config(String),
}
