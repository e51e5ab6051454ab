use crate::ClipId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Every failure the engine reports. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no clip with id {0}")]
    NotFound(ClipId),
    #[error("pin limit reached: at most {limit} entries can be pinned")]
    PinLimitExceeded { limit: usize },
    #[error("paste permission not granted; the entry is on the clipboard, paste it manually")]
    PermissionRequired,
    #[error("clipboard write failed: {0}")]
    Sink(String),
    #[error("persistence failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed data: {0}")]
    Decode(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    /// Stable code carried over the daemon protocol.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::PinLimitExceeded { .. } => "pin_limit_exceeded",
            CoreError::PermissionRequired => "permission_required",
            CoreError::Sink(_) => "sink",
            CoreError::Io(_) => "io",
            CoreError::Decode(_) => "decode",
            CoreError::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Decode(e.to_string())
    }
}
