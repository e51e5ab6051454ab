//! Where CLI commands are executed: the running daemon, or the store opened
//! in-process when no daemon answers.

use clipstack_core::clipboard::ClipboardSource;
use clipstack_core::config::{daemon_info_path, Settings};
use clipstack_core::paste::{CommandPaste, ToolPermission};
use clipstack_core::protocol::{
    AddOutcome, Cleared, ClipSummary, DaemonInfo, ListPage, PinState, Request, Response,
};
use clipstack_core::{
    ClipId, ClipKind, CoreError, EntryCommitter, HistoryStore, IngestOutcome, PasteCommitter,
    Result,
};
use serde::de::DeserializeOwned;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

pub trait Backend {
    fn list(&self, query: Option<&str>) -> Result<ListPage>;
    fn add(&self, text: &str) -> Result<AddOutcome>;
    fn toggle_pin(&self, id: ClipId) -> Result<bool>;
    fn clear(&self, all: bool) -> Result<usize>;
    /// Put the clip on the clipboard; with `paste`, also send the paste
    /// gesture or fail with `PermissionRequired`.
    fn commit(&self, id: ClipId, paste: bool) -> Result<()>;
}

/// Commits picker rows through a backend.
pub struct BackendCommitter<'a> {
    pub backend: &'a dyn Backend,
    pub paste: bool,
}

impl EntryCommitter<ClipSummary> for BackendCommitter<'_> {
    fn commit_entry(&self, item: &ClipSummary) -> Result<()> {
        self.backend.commit(item.id, self.paste)
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_millis(300);
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DaemonClient {
    addr: SocketAddr,
}

impl DaemonClient {
    /// Connect to the daemon advertised in `clipd.json` if it answers a health check.
    pub fn discover() -> Option<Self> {
        let info = DaemonInfo::read_from(&daemon_info_path())?;
        let client = Self {
            addr: SocketAddr::from(([127, 0, 0, 1], info.port)),
        };
        match client.request::<serde_json::Value>(&Request::Health) {
            Ok(_) => Some(client),
            Err(e) => {
                debug!(port = info.port, error = %e, "daemon not reachable");
                None
            }
        }
    }

    fn request<T: DeserializeOwned>(&self, req: &Request) -> Result<T> {
        let mut stream = TcpStream::connect_timeout(&self.addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        writeln!(stream, "{}", serde_json::to_string(req)?)?;
        stream.flush()?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let resp: Response<T> = serde_json::from_str(&line)?;
        resp.into_result()?
            .ok_or_else(|| CoreError::Decode("daemon sent no data".into()))
    }
}

impl Backend for DaemonClient {
    fn list(&self, query: Option<&str>) -> Result<ListPage> {
        self.request(&Request::List {
            query: query.map(str::to_owned),
        })
    }

    fn add(&self, text: &str) -> Result<AddOutcome> {
        self.request(&Request::Add {
            text: text.to_owned(),
        })
    }

    fn toggle_pin(&self, id: ClipId) -> Result<bool> {
        self.request::<PinState>(&Request::Pin { id })
            .map(|p| p.pinned)
    }

    fn clear(&self, all: bool) -> Result<usize> {
        self.request::<Cleared>(&Request::Clear { all })
            .map(|c| c.removed)
    }

    fn commit(&self, id: ClipId, paste: bool) -> Result<()> {
        self.request::<ClipSummary>(&Request::Commit { id, paste })
            .map(|_| ())
    }
}

/// The store opened in this process.
pub struct LocalBackend {
    store: Arc<HistoryStore>,
    committer: PasteCommitter,
}

impl LocalBackend {
    pub fn new(store: Arc<HistoryStore>, clipboard: Arc<dyn ClipboardSource>, settings: &Settings) -> Self {
        let paste = CommandPaste::new(settings.paste_command());
        let permission = ToolPermission::for_command(&paste);
        let committer = PasteCommitter::new(
            store.clone(),
            clipboard,
            Arc::new(permission),
            Arc::new(paste),
        )
        .with_settle(settings.paste_settle());
        Self { store, committer }
    }

    /// Open the configured store and sweep expired clips, as the daemon
    /// does at startup.
    pub fn open(settings: &Settings, clipboard: Arc<dyn ClipboardSource>) -> Result<Self> {
        let store = Arc::new(settings.open_store()?);
        store.apply_retention(OffsetDateTime::now_utc());
        Ok(Self::new(store, clipboard, settings))
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }
}

impl Backend for LocalBackend {
    fn list(&self, query: Option<&str>) -> Result<ListPage> {
        let version = self.store.version();
        let items = self
            .store
            .search(query.unwrap_or(""))
            .iter()
            .map(ClipSummary::from)
            .collect();
        Ok(ListPage { version, items })
    }

    fn add(&self, text: &str) -> Result<AddOutcome> {
        match self.store.record(ClipKind::Text, text.as_bytes()) {
            IngestOutcome::Added(id) => Ok(AddOutcome { id, added: true }),
            IngestOutcome::Duplicate => self
                .store
                .snapshot()
                .first()
                .map(|c| AddOutcome {
                    id: c.id,
                    added: false,
                })
                .ok_or_else(|| CoreError::Decode("history changed during add".into())),
            IngestOutcome::NoRoom => Err(CoreError::PinLimitExceeded {
                limit: self.store.options().max_items,
            }),
            _ => Err(CoreError::Decode("nothing to add: text is blank".into())),
        }
    }

    fn toggle_pin(&self, id: ClipId) -> Result<bool> {
        self.store.toggle_pin(id)
    }

    fn clear(&self, all: bool) -> Result<usize> {
        Ok(self.store.clear(!all))
    }

    fn commit(&self, id: ClipId, paste: bool) -> Result<()> {
        let clip = self.store.get(id).ok_or(CoreError::NotFound(id))?;
        if !paste {
            return self.committer.copy_only(&clip);
        }
        match self.committer.commit_checked(&clip) {
            // this process may exit right after; let the paste happen first
            Ok(ticket) => {
                ticket.wait();
                Ok(())
            }
            Err(CoreError::PermissionRequired) => {
                self.committer.request_permission();
                Err(CoreError::PermissionRequired)
            }
            Err(e) => Err(e),
        }
    }
}
