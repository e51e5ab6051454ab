//! Commit flow: put a chosen clip back on the clipboard, promote it, and
//! optionally fire the paste gesture after a settle delay.

use crate::clipboard::ClipboardSource;
use crate::paste::{PasteSimulator, PermissionOracle};
use crate::store::HistoryStore;
use crate::{Clip, CoreError, Result};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MIN_SETTLE: Duration = Duration::from_millis(100);
pub const MAX_SETTLE: Duration = Duration::from_millis(200);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(150);

/// Seam between the selection controller and whatever performs a commit
/// (the local committer, or a client talking to the daemon).
pub trait EntryCommitter<T: ?Sized = Clip> {
    fn commit_entry(&self, item: &T) -> Result<()>;
}

/// Handle to a scheduled paste. Dropping it detaches the paste thread.
#[derive(Debug)]
pub struct PasteTicket {
    handle: Option<JoinHandle<()>>,
}

impl PasteTicket {
    fn none() -> Self {
        Self { handle: None }
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.is_some()
    }

    /// Block until the paste attempt has run.
    pub fn wait(self) {
        if let Some(h) = self.handle {
            if h.join().is_err() {
                warn!("paste thread panicked");
            }
        }
    }
}

pub struct PasteCommitter {
    store: Arc<HistoryStore>,
    sink: Arc<dyn ClipboardSource>,
    permission: Arc<dyn PermissionOracle>,
    paste: Arc<dyn PasteSimulator>,
    settle: Duration,
}

impl PasteCommitter {
    pub fn new(
        store: Arc<HistoryStore>,
        sink: Arc<dyn ClipboardSource>,
        permission: Arc<dyn PermissionOracle>,
        paste: Arc<dyn PasteSimulator>,
    ) -> Self {
        Self {
            store,
            sink,
            permission,
            paste,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Settle delay before the paste gesture, clamped to 100..=200 ms.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle.clamp(MIN_SETTLE, MAX_SETTLE);
        self
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn request_permission(&self) {
        self.permission.request_permission();
    }

    /// Write to the clipboard and promote, no paste.
    ///
    /// The echo marker is set before the write so the watcher cannot see
    /// the new content first. A failed write clears it and leaves history
    /// untouched.
    pub fn copy_only(&self, clip: &Clip) -> Result<()> {
        self.store
            .note_programmatic_write(clip.kind, clip.payload.clone());
        if let Err(e) = self.sink.write(clip.kind, &clip.payload) {
            self.store.cancel_programmatic_write();
            warn!(id = %clip.id, error = %e, "clipboard write failed");
            return Err(e);
        }
        self.store.add_or_promote(clip);
        debug!(id = %clip.id, "clip placed on clipboard");
        Ok(())
    }

    /// Commit with an explicit permission answer.
    ///
    /// Without permission the clipboard still holds the clip and
    /// `PermissionRequired` tells the caller to ask for a manual paste.
    pub fn commit(&self, clip: &Clip, permission_granted: bool) -> Result<PasteTicket> {
        self.copy_only(clip)?;
        if !permission_granted {
            info!(id = %clip.id, "paste permission missing; manual paste required");
            return Err(CoreError::PermissionRequired);
        }
        let paste = Arc::clone(&self.paste);
        let settle = self.settle;
        let handle = std::thread::Builder::new()
            .name("clipstack-paste".into())
            .spawn(move || {
                std::thread::sleep(settle);
                paste.simulate_paste();
            });
        match handle {
            Ok(h) => Ok(PasteTicket { handle: Some(h) }),
            Err(e) => {
                warn!(error = %e, "cannot schedule paste; clip stays on the clipboard");
                Ok(PasteTicket::none())
            }
        }
    }

    /// Commit, asking the permission oracle now.
    pub fn commit_checked(&self, clip: &Clip) -> Result<PasteTicket> {
        let granted = self.permission.is_granted();
        self.commit(clip, granted)
    }
}

impl EntryCommitter<Clip> for PasteCommitter {
    fn commit_entry(&self, item: &Clip) -> Result<()> {
        self.commit_checked(item).map(|_ticket| ())
    }
}
