//! clipstack-core: clip types, history store, retention, selection and commit flow

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod clipboard;
pub mod commit;
pub mod config;
pub mod error;
pub mod paste;
pub mod persist;
pub mod protocol;
pub mod retention;
pub mod selection;
pub mod store;
pub mod watch;

pub use commit::{EntryCommitter, PasteCommitter, PasteTicket};
pub use error::{CoreError, Result};
pub use retention::RetentionPolicy;
pub use selection::{Direction, Searchable, SelectionController, SelectionState};
pub use store::{HistoryOptions, HistoryStore, IngestOutcome};

/// Stable identity of a clip. Assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(Uuid);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ClipId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| CoreError::Decode(format!("invalid clip id {s:?}: {e}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Text,
    Image,
}

impl ClipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipKind::Text => "text",
            ClipKind::Image => "image",
        }
    }
}

impl FromStr for ClipKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(ClipKind::Text),
            "image" => Ok(ClipKind::Image),
            other => Err(CoreError::Decode(format!("unknown clip kind {other:?}"))),
        }
    }
}

/// One retained clipboard capture.
///
/// `PartialEq` compares every field. Content identity, which drives
/// deduplication, is [`Clip::same_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub id: ClipId,
    pub kind: ClipKind,
    pub payload: Arc<[u8]>,
    pub created_at: OffsetDateTime,
    pub pinned: bool,
}

impl Clip {
    pub fn new(kind: ClipKind, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: ClipId::new(),
            kind,
            payload: payload.into(),
            created_at: OffsetDateTime::now_utc(),
            pinned: false,
        }
    }

    pub fn text<S: AsRef<str>>(text: S) -> Self {
        Self::new(ClipKind::Text, text.as_ref().as_bytes())
    }

    pub fn image(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(ClipKind::Image, bytes)
    }

    pub fn with_created_at(mut self, at: OffsetDateTime) -> Self {
        self.created_at = at;
        self
    }

    /// Decoded text for text clips; `None` for images or invalid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            ClipKind::Text => std::str::from_utf8(&self.payload).ok(),
            ClipKind::Image => None,
        }
    }

    pub fn same_content(&self, kind: ClipKind, payload: &[u8]) -> bool {
        self.kind == kind && *self.payload == *payload
    }

    /// Single-line preview: trimmed, newlines folded, cut at `max_chars`.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.kind {
            ClipKind::Image => "Image".to_string(),
            ClipKind::Text => preview_text(&String::from_utf8_lossy(&self.payload), max_chars),
        }
    }
}

pub fn preview_text(text: &str, max_chars: usize) -> String {
    let flat = text.trim().replace(['\r', '\n', '\t'], " ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    } else {
        flat
    }
}

/// Text payloads must carry something besides whitespace.
pub fn is_blank(kind: ClipKind, payload: &[u8]) -> bool {
    match kind {
        ClipKind::Text => String::from_utf8_lossy(payload).trim().is_empty(),
        ClipKind::Image => payload.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_id_roundtrips_through_display() {
        let id = ClipId::new();
        let parsed: ClipId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ClipId>().is_err());
    }

    #[test]
    fn preview_folds_whitespace_and_truncates() {
        let c = Clip::text("  hello\nworld  ");
        assert_eq!(c.preview(60), "hello world");
        assert_eq!(Clip::text("abcdef").preview(3), "abc…");
        assert_eq!(Clip::image(vec![1u8, 2, 3]).preview(10), "Image");
    }

    #[test]
    fn blank_rules() {
        assert!(is_blank(ClipKind::Text, b"  \n\t"));
        assert!(!is_blank(ClipKind::Text, b" x "));
        assert!(is_blank(ClipKind::Image, b""));
        assert!(!is_blank(ClipKind::Image, b"\x89PNG"));
    }

    #[test]
    fn same_content_ignores_identity() {
        let a = Clip::text("same");
        let b = Clip::text("same");
        assert_ne!(a, b);
        assert!(a.same_content(b.kind, &b.payload));
        assert!(!a.same_content(ClipKind::Image, &b.payload));
    }
}
