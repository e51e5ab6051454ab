//! Request dispatch for one daemon. Each connection runs on its own thread
//! and goes through the shared store, which serializes mutations.

use anyhow::Result;
use clipstack_core::protocol::{AddOutcome, Cleared, ClipSummary, ListPage, PinState, Request, Response};
use clipstack_core::{ClipId, ClipKind, CoreError, HistoryStore, IngestOutcome, PasteCommitter};
use serde::Serialize;
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub struct Daemon {
    store: Arc<HistoryStore>,
    committer: PasteCommitter,
}

fn reply<T: Serialize>(result: clipstack_core::Result<T>) -> Response<Value> {
    match result.and_then(|data| serde_json::to_value(data).map_err(CoreError::from)) {
        Ok(v) => Response::success(v),
        Err(e) => Response::failure(&e),
    }
}

impl Daemon {
    pub fn new(store: Arc<HistoryStore>, committer: PasteCommitter) -> Self {
        Self { store, committer }
    }

    pub fn handle(&self, req: Request) -> Response<Value> {
        debug!(?req, "request");
        match req {
            Request::Health => reply(Ok(serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "now": OffsetDateTime::now_utc().unix_timestamp(),
                "items": self.store.len(),
                "store_version": self.store.version(),
            }))),
            Request::List { query } => {
                let version = self.store.version();
                let items = self
                    .store
                    .search(query.as_deref().unwrap_or(""))
                    .iter()
                    .map(ClipSummary::from)
                    .collect();
                reply(Ok(ListPage { version, items }))
            }
            Request::Add { text } => reply(self.add(&text)),
            Request::Pin { id } => reply(
                self.store
                    .toggle_pin(id)
                    .map(|pinned| PinState { id, pinned }),
            ),
            Request::Promote { id } => reply(self.store.promote(id).map(|c| ClipSummary::from(&c))),
            Request::Commit { id, paste } => reply(self.commit(id, paste)),
            Request::Clear { all } => reply(Ok(Cleared {
                removed: self.store.clear(!all),
            })),
        }
    }

    fn add(&self, text: &str) -> clipstack_core::Result<AddOutcome> {
        match self.store.record(ClipKind::Text, text.as_bytes()) {
            IngestOutcome::Added(id) => Ok(AddOutcome { id, added: true }),
            IngestOutcome::Duplicate => {
                let head = self.store.snapshot().into_iter().next();
                head.map(|c| AddOutcome {
                    id: c.id,
                    added: false,
                })
                .ok_or_else(|| CoreError::Decode("history changed during add".into()))
            }
            IngestOutcome::NoRoom => Err(CoreError::PinLimitExceeded {
                limit: self.store.options().max_items,
            }),
            _ => Err(CoreError::Decode("nothing to add: text is blank".into())),
        }
    }

    fn commit(&self, id: ClipId, paste: bool) -> clipstack_core::Result<ClipSummary> {
        let clip = self.store.get(id).ok_or(CoreError::NotFound(id))?;
        if paste {
            match self.committer.commit_checked(&clip) {
                Ok(_ticket) => {}
                Err(CoreError::PermissionRequired) => {
                    self.committer.request_permission();
                    return Err(CoreError::PermissionRequired);
                }
                Err(e) => return Err(e),
            }
        } else {
            self.committer.copy_only(&clip)?;
        }
        info!(%id, paste, "committed clip");
        Ok(ClipSummary::from(&clip))
    }
}

pub fn handle_client(daemon: Arc<Daemon>, stream: TcpStream) -> Result<()> {
    let peer = stream.peer_addr()?;
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let resp = match serde_json::from_str::<Request>(&line) {
            Ok(req) => daemon.handle(req),
            Err(e) => {
                warn!(%peer, error = %e, "bad request");
                Response::bad_request(format!("bad request: {e}"))
            }
        };
        let s = serde_json::to_string(&resp)?;
        writeln!(writer, "{}", s)?;
        writer.flush()?;
    }
    debug!(%peer, "client disconnected");
    Ok(())
}
