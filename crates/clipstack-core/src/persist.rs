//! Persisted history schema and storage backends.
//!
//! Records are decoded one by one on load; a malformed record is logged
//! and dropped instead of failing the whole load.

use crate::{is_blank, Clip, ClipId, ClipKind, CoreError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;
use tracing::{debug, warn};

pub trait Persistence: Send + Sync {
    fn save(&self, clips: &[Clip]) -> Result<()>;
    /// Best-effort: never fails, returns whatever could be recovered.
    fn load(&self) -> Vec<Clip>;
}

/// On-disk shape of one clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRecord {
    pub id: ClipId,
    pub kind: ClipKind,
    /// Base64 of the raw payload bytes.
    pub payload: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub pinned: bool,
}

impl From<&Clip> for ClipRecord {
    fn from(c: &Clip) -> Self {
        Self {
            id: c.id,
            kind: c.kind,
            payload: STANDARD.encode(&c.payload),
            created_at: c.created_at,
            pinned: c.pinned,
        }
    }
}

impl TryFrom<ClipRecord> for Clip {
    type Error = CoreError;

    fn try_from(r: ClipRecord) -> Result<Self> {
        let payload = STANDARD
            .decode(r.payload.as_bytes())
            .map_err(|e| CoreError::Decode(format!("payload of {}: {e}", r.id)))?;
        if is_blank(r.kind, &payload) {
            return Err(CoreError::Decode(format!("empty payload for {}", r.id)));
        }
        Ok(Clip {
            id: r.id,
            kind: r.kind,
            payload: payload.into(),
            created_at: r.created_at,
            pinned: r.pinned,
        })
    }
}

pub fn encode_clips(clips: &[Clip]) -> Result<Vec<u8>> {
    let records: Vec<ClipRecord> = clips.iter().map(ClipRecord::from).collect();
    Ok(serde_json::to_vec_pretty(&records)?)
}

/// Decode a saved history, keeping every record that parses.
pub fn decode_clips(bytes: &[u8]) -> Vec<Clip> {
    let values: Vec<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "history file is not a record array; starting empty");
            return Vec::new();
        }
    };
    let total = values.len();
    let mut seen = HashSet::new();
    let clips: Vec<Clip> = values
        .into_iter()
        .enumerate()
        .filter_map(|(idx, v)| {
            let clip = serde_json::from_value::<ClipRecord>(v)
                .map_err(CoreError::from)
                .and_then(Clip::try_from);
            match clip {
                Ok(c) if seen.insert(c.id) => Some(c),
                Ok(c) => {
                    warn!(index = idx, id = %c.id, "dropping record with repeated id");
                    None
                }
                Err(e) => {
                    warn!(index = idx, error = %e, "dropping malformed history record");
                    None
                }
            }
        })
        .collect();
    debug!(total, kept = clips.len(), "decoded history");
    clips
}

/// JSON file written atomically through a sibling temp file.
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFile {
    fn save(&self, clips: &[Clip]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let bytes = encode_clips(clips)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Vec<Clip> {
        match std::fs::read(&self.path) {
            Ok(bytes) => decode_clips(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read history; starting empty");
                Vec::new()
            }
        }
    }
}

/// Keeps the encoded history in memory. Goes through the same schema as
/// the file backends.
#[derive(Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<Vec<u8>>>,
}

impl MemoryPersistence {
    pub fn with_clips(clips: &[Clip]) -> Self {
        Self {
            saved: Mutex::new(encode_clips(clips).ok()),
        }
    }

    pub fn raw(&self) -> Option<Vec<u8>> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Persistence for MemoryPersistence {
    fn save(&self, clips: &[Clip]) -> Result<()> {
        let bytes = encode_clips(clips)?;
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Vec<Clip> {
        self.raw().map(|b| decode_clips(&b)).unwrap_or_default()
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteFile;

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use include_dir::{include_dir, Dir};
    use rusqlite::{params, Connection};

    static MIGRATIONS: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

    fn db_err(e: rusqlite::Error) -> CoreError {
        CoreError::Io(std::io::Error::other(e))
    }

    /// SQLite-backed history; `position` carries the display order.
    pub struct SqliteFile {
        conn: Mutex<Connection>,
    }

    impl SqliteFile {
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let conn = Connection::open(path).map_err(db_err)?;
            let _ = conn.pragma_update(None, "journal_mode", "WAL");
            let _ = conn.busy_timeout(std::time::Duration::from_millis(5000));
            run_migrations(&conn)?;
            Ok(Self {
                conn: Mutex::new(conn),
            })
        }
    }

    fn parse_version_prefix(name: &str) -> Option<i64> {
        let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        let current: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .map_err(db_err)?;
        let mut files: Vec<_> = MIGRATIONS
            .files()
            .filter(|f| f.path().extension().map(|e| e == "sql").unwrap_or(false))
            .collect();
        files.sort_by_key(|f| f.path().to_path_buf());
        for file in files {
            let name = file
                .path()
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let ver = parse_version_prefix(&name).unwrap_or(0);
            if ver <= current {
                continue;
            }
            let sql = file
                .contents_utf8()
                .ok_or_else(|| CoreError::Decode(format!("invalid utf-8 in migration {name}")))?;
            let tx = conn.unchecked_transaction().map_err(db_err)?;
            tx.execute_batch(sql).map_err(db_err)?;
            tx.execute_batch(&format!("PRAGMA user_version = {ver}"))
                .map_err(db_err)?;
            tx.commit().map_err(db_err)?;
            debug!(version = ver, "applied history migration");
        }
        Ok(())
    }

    fn row_to_clip(row: &rusqlite::Row<'_>) -> Result<Clip> {
        let id: String = row.get(0).map_err(db_err)?;
        let kind: String = row.get(1).map_err(db_err)?;
        let payload: Vec<u8> = row.get(2).map_err(db_err)?;
        let created_at: String = row.get(3).map_err(db_err)?;
        let pinned: i64 = row.get(4).map_err(db_err)?;
        let kind: ClipKind = kind.parse()?;
        if is_blank(kind, &payload) {
            return Err(CoreError::Decode(format!("empty payload for {id}")));
        }
        let created_at = OffsetDateTime::parse(
            &created_at,
            &time::format_description::well_known::Rfc3339,
        )
        .map_err(|e| CoreError::Decode(format!("created_at of {id}: {e}")))?;
        Ok(Clip {
            id: id.parse()?,
            kind,
            payload: payload.into(),
            created_at,
            pinned: pinned != 0,
        })
    }

    impl Persistence for SqliteFile {
        fn save(&self, clips: &[Clip]) -> Result<()> {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            let tx = conn.unchecked_transaction().map_err(db_err)?;
            tx.execute("DELETE FROM clips", []).map_err(db_err)?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO clips(id, position, kind, payload, created_at, pinned)
                         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
                    )
                    .map_err(db_err)?;
                for (pos, c) in clips.iter().enumerate() {
                    let created = c
                        .created_at
                        .format(&time::format_description::well_known::Rfc3339)
                        .map_err(|e| CoreError::Decode(e.to_string()))?;
                    stmt.execute(params![
                        c.id.to_string(),
                        pos as i64,
                        c.kind.as_str(),
                        &c.payload[..],
                        created,
                        c.pinned as i64
                    ])
                    .map_err(db_err)?;
                }
            }
            tx.commit().map_err(db_err)?;
            Ok(())
        }

        fn load(&self) -> Vec<Clip> {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            let mut stmt = match conn.prepare(
                "SELECT id, kind, payload, created_at, pinned FROM clips ORDER BY position",
            ) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "cannot query history table; starting empty");
                    return Vec::new();
                }
            };
            let mut rows = match stmt.query([]) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "cannot read history table; starting empty");
                    return Vec::new();
                }
            };
            let mut out = Vec::new();
            let mut seen = HashSet::new();
            loop {
                match rows.next() {
                    Ok(Some(row)) => match row_to_clip(row) {
                        Ok(c) if seen.insert(c.id) => out.push(c),
                        Ok(c) => warn!(id = %c.id, "dropping row with repeated id"),
                        Err(e) => warn!(error = %e, "dropping malformed history row"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "history scan stopped early");
                        break;
                    }
                }
            }
            out
        }
    }
}
