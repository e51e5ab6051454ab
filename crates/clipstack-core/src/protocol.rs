//! Line-delimited JSON protocol spoken between `clipstack` and `clipstackd`.

use crate::selection::Searchable;
use crate::{Clip, ClipId, ClipKind, CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::OffsetDateTime;

pub const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Health,
    List {
        #[serde(default)]
        query: Option<String>,
    },
    Add {
        text: String,
    },
    /// Toggle.
    Pin {
        id: ClipId,
    },
    Promote {
        id: ClipId,
    },
    Commit {
        id: ClipId,
        #[serde(default)]
        paste: bool,
    },
    Clear {
        #[serde(default)]
        all: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClipId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl<T> Response<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            code: None,
            id: None,
            limit: None,
        }
    }

    pub fn failure(err: &CoreError) -> Self {
        let (id, limit) = match err {
            CoreError::NotFound(id) => (Some(*id), None),
            CoreError::PinLimitExceeded { limit } => (None, Some(*limit)),
            _ => (None, None),
        };
        Self {
            ok: false,
            data: None,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
            id,
            limit,
        }
    }

    /// Malformed request line; no core error behind it.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
            code: Some("bad_request".into()),
            id: None,
            limit: None,
        }
    }

    /// Rebuild the daemon's error kind on the client side.
    pub fn into_result(self) -> Result<Option<T>> {
        if self.ok {
            return Ok(self.data);
        }
        let msg = self.error.unwrap_or_else(|| "daemon error".into());
        Err(match (self.code.as_deref(), self.id, self.limit) {
            (Some("not_found"), Some(id), _) => CoreError::NotFound(id),
            (Some("pin_limit_exceeded"), _, Some(limit)) => CoreError::PinLimitExceeded { limit },
            (Some("permission_required"), _, _) => CoreError::PermissionRequired,
            (Some("sink"), _, _) => CoreError::Sink(msg),
            (Some("io"), _, _) => CoreError::Io(std::io::Error::other(msg)),
            (Some("config"), _, _) => CoreError::Config(msg),
            _ => CoreError::Decode(msg),
        })
    }
}

/// What a client sees of a clip. Image bytes never cross the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSummary {
    pub id: ClipId,
    pub kind: ClipKind,
    /// Unix seconds.
    pub created_at: i64,
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub preview: String,
    pub size: usize,
}

impl From<&Clip> for ClipSummary {
    fn from(c: &Clip) -> Self {
        Self {
            id: c.id,
            kind: c.kind,
            created_at: c.created_at.unix_timestamp(),
            pinned: c.pinned,
            text: c.as_text().map(str::to_owned),
            preview: c.preview(PREVIEW_CHARS),
            size: c.payload.len(),
        }
    }
}

impl Searchable for ClipSummary {
    fn clip_id(&self) -> ClipId {
        self.id
    }
    fn kind(&self) -> ClipKind {
        self.kind
    }
    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    /// Store version the items were read at.
    pub version: u64,
    pub items: Vec<ClipSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub id: ClipId,
    /// False when the text was already the newest clip.
    pub added: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinState {
    pub id: ClipId,
    pub pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleared {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub port: u16,
    pub started_at: i64,
    pub pid: u32,
}

impl DaemonInfo {
    pub fn current(port: u16) -> Self {
        Self {
            port,
            started_at: OffsetDateTime::now_utc().unix_timestamp(),
            pid: std::process::id(),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}
