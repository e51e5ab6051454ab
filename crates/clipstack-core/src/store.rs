//! History store: ordered, deduplicated, pin-aware clipboard history.
//!
//! Index 0 is the most recently added or used clip. Every mutation runs
//! under one mutex and is persisted before the lock is released, so a
//! saved snapshot is never older than the last applied mutation.

use crate::persist::{MemoryPersistence, Persistence};
use crate::retention::RetentionPolicy;
use crate::selection::filter_view;
use crate::{is_blank, Clip, ClipId, ClipKind, CoreError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryOptions {
    pub max_items: usize,
    pub max_pins: usize,
    pub retention: RetentionPolicy,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            max_items: 50,
            max_pins: 5,
            retention: RetentionPolicy::default(),
        }
    }
}

/// Result of an ingest attempt. Only `Added` changes the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Added(ClipId),
    /// Change counter already consumed.
    Unchanged,
    /// Whitespace-only text or an empty image.
    Empty,
    /// Our own clipboard write coming back.
    Echo,
    /// Identical to the current head.
    Duplicate,
    /// Every slot is held by a pinned clip, so the new one has no room.
    NoRoom,
}

#[derive(Default)]
struct State {
    entries: Vec<Clip>,
    last_change_count: Option<u64>,
    pending_echo: Option<(ClipKind, Arc<[u8]>)>,
    version: u64,
}

pub struct HistoryStore {
    state: Mutex<State>,
    persistence: Box<dyn Persistence>,
    options: HistoryOptions,
}

impl HistoryStore {
    /// Load persisted history and re-apply the dedup and capacity bounds.
    pub fn open(persistence: Box<dyn Persistence>, options: HistoryOptions) -> Self {
        let entries = persistence.load();
        let store = Self {
            state: Mutex::new(State {
                entries,
                ..State::default()
            }),
            persistence,
            options,
        };
        {
            let mut st = store.lock();
            let loaded = st.entries.len();
            let unpinned = unpin_beyond(&mut st.entries, options.max_pins);
            let collapsed = collapse_unpinned_duplicates(&mut st.entries);
            let evicted = evict_to_capacity(&mut st.entries, options.max_items);
            if unpinned + collapsed + evicted > 0 {
                info!(loaded, unpinned, collapsed, evicted, "normalized loaded history");
                store.commit_mutation(&mut st);
            }
        }
        store
    }

    pub fn in_memory(options: HistoryOptions) -> Self {
        Self::open(Box::new(MemoryPersistence::default()), options)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the version and checkpoint. Save failures are logged; the
    /// in-memory state stays authoritative.
    fn commit_mutation(&self, st: &mut State) {
        st.version += 1;
        if let Err(e) = self.persistence.save(&st.entries) {
            warn!(error = %e, "failed to persist history; keeping in-memory state");
        }
    }

    pub fn options(&self) -> &HistoryOptions {
        &self.options
    }

    /// Increases after every applied mutation.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Clip> {
        self.lock().entries.clone()
    }

    pub fn get(&self, id: ClipId) -> Option<Clip> {
        self.lock().entries.iter().find(|c| c.id == id).cloned()
    }

    pub fn pinned_count(&self) -> usize {
        self.lock().entries.iter().filter(|c| c.pinned).count()
    }

    /// Filtered view for `query`, in store order. Non-mutating.
    pub fn search(&self, query: &str) -> Vec<Clip> {
        filter_view(&self.lock().entries, query)
    }

    /// Mark a change counter as consumed without capturing its content.
    pub fn prime(&self, change_count: u64) {
        self.lock().last_change_count = Some(change_count);
    }

    /// Capture clipboard content reported under `change_count`.
    pub fn ingest(&self, kind: ClipKind, payload: &[u8], change_count: u64) -> IngestOutcome {
        let mut st = self.lock();
        if st.last_change_count == Some(change_count) {
            return IngestOutcome::Unchanged;
        }
        st.last_change_count = Some(change_count);
        if is_blank(kind, payload) {
            debug!(change_count, "skipping blank clipboard content");
            return IngestOutcome::Empty;
        }
        // single use: only the ingest right after our own write is checked
        if let Some((echo_kind, echo_payload)) = st.pending_echo.take() {
            if echo_kind == kind && *echo_payload == *payload {
                debug!(change_count, "suppressed echo of programmatic write");
                return IngestOutcome::Echo;
            }
        }
        self.insert_content(&mut st, kind, payload)
    }

    /// Add content directly, bypassing change-counter and echo checks.
    pub fn record(&self, kind: ClipKind, payload: &[u8]) -> IngestOutcome {
        if is_blank(kind, payload) {
            return IngestOutcome::Empty;
        }
        let mut st = self.lock();
        self.insert_content(&mut st, kind, payload)
    }

    fn insert_content(&self, st: &mut State, kind: ClipKind, payload: &[u8]) -> IngestOutcome {
        if st
            .entries
            .first()
            .map(|head| head.same_content(kind, payload))
            .unwrap_or(false)
        {
            return IngestOutcome::Duplicate;
        }
        // a new clip yields to pins; capacity eviction would drop it right away
        let pinned = st.entries.iter().filter(|c| c.pinned).count();
        if pinned >= self.options.max_items {
            warn!(pinned, max_items = self.options.max_items, "history is full of pinned clips");
            return IngestOutcome::NoRoom;
        }
        st.entries
            .retain(|c| c.pinned || !c.same_content(kind, payload));
        let clip = Clip::new(kind, payload);
        let id = clip.id;
        st.entries.insert(0, clip);
        let evicted = evict_to_capacity(&mut st.entries, self.options.max_items);
        debug!(%id, kind = kind.as_str(), bytes = payload.len(), evicted, "captured clip");
        self.commit_mutation(st);
        IngestOutcome::Added(id)
    }

    /// Remember a payload we are about to put on the clipboard so its echo
    /// is not captured as new history.
    pub fn note_programmatic_write(&self, kind: ClipKind, payload: Arc<[u8]>) {
        self.lock().pending_echo = Some((kind, payload));
    }

    /// Drop a pending echo, e.g. when the clipboard write failed.
    pub fn cancel_programmatic_write(&self) {
        self.lock().pending_echo = None;
    }

    pub fn has_pending_echo(&self) -> bool {
        self.lock().pending_echo.is_some()
    }

    /// Move the clip with `id` to the head.
    pub fn promote(&self, id: ClipId) -> Result<Clip> {
        let mut st = self.lock();
        let pos = st
            .entries
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoreError::NotFound(id))?;
        let clip = st.entries.remove(pos);
        st.entries.insert(0, clip.clone());
        self.commit_mutation(&mut st);
        Ok(clip)
    }

    /// Promote `clip` if it is still present; otherwise put it back at the
    /// head (unpinned), replacing any unpinned copy of the same content.
    pub fn add_or_promote(&self, clip: &Clip) {
        let mut st = self.lock();
        if let Some(pos) = st.entries.iter().position(|c| c.id == clip.id) {
            let existing = st.entries.remove(pos);
            st.entries.insert(0, existing);
        } else {
            st.entries
                .retain(|c| c.pinned || !c.same_content(clip.kind, &clip.payload));
            let mut restored = clip.clone();
            restored.pinned = false;
            st.entries.insert(0, restored);
            evict_to_capacity(&mut st.entries, self.options.max_items);
        }
        self.commit_mutation(&mut st);
    }

    /// Enforce `max_items`. Returns how many clips were removed.
    pub fn evict_to_capacity(&self) -> usize {
        let mut st = self.lock();
        let evicted = evict_to_capacity(&mut st.entries, self.options.max_items);
        if evicted > 0 {
            self.commit_mutation(&mut st);
        }
        evicted
    }

    /// Drop unpinned clips older than their kind's retention window.
    pub fn apply_retention(&self, now: OffsetDateTime) -> usize {
        let policy = self.options.retention;
        let mut st = self.lock();
        let before = st.entries.len();
        st.entries.retain(|c| !policy.should_evict(c, now));
        let removed = before - st.entries.len();
        if removed > 0 {
            info!(removed, "retention removed expired clips");
            self.commit_mutation(&mut st);
        }
        removed
    }

    /// Flip the pin flag. Returns the new state.
    pub fn toggle_pin(&self, id: ClipId) -> Result<bool> {
        let mut st = self.lock();
        let pinned_now = st.entries.iter().filter(|c| c.pinned).count();
        let pos = st
            .entries
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoreError::NotFound(id))?;
        if !st.entries[pos].pinned && pinned_now >= self.options.max_pins {
            return Err(CoreError::PinLimitExceeded {
                limit: self.options.max_pins,
            });
        }
        let pinned = !st.entries[pos].pinned;
        st.entries[pos].pinned = pinned;
        if !pinned {
            // an unpinned clip must not share content with another unpinned one
            collapse_unpinned_duplicates(&mut st.entries);
        }
        info!(%id, pinned, "toggled pin");
        self.commit_mutation(&mut st);
        Ok(pinned)
    }

    /// Remove unpinned clips, or everything when `keep_pinned` is false.
    pub fn clear(&self, keep_pinned: bool) -> usize {
        let mut st = self.lock();
        let before = st.entries.len();
        if keep_pinned {
            st.entries.retain(|c| c.pinned);
        } else {
            st.entries.clear();
        }
        let removed = before - st.entries.len();
        if removed > 0 {
            info!(removed, keep_pinned, "cleared history");
            self.commit_mutation(&mut st);
        }
        removed
    }
}

/// Unpin the oldest pins past `max_pins`.
fn unpin_beyond(entries: &mut [Clip], max_pins: usize) -> usize {
    let mut seen = 0;
    let mut unpinned = 0;
    for clip in entries.iter_mut().filter(|c| c.pinned) {
        seen += 1;
        if seen > max_pins {
            clip.pinned = false;
            unpinned += 1;
        }
    }
    unpinned
}

/// Keep only the most recent of unpinned clips sharing `(kind, payload)`.
fn collapse_unpinned_duplicates(entries: &mut Vec<Clip>) -> usize {
    let before = entries.len();
    let mut kept: Vec<(ClipKind, Arc<[u8]>)> = Vec::new();
    entries.retain(|c| {
        if c.pinned {
            return true;
        }
        if kept.iter().any(|(k, p)| c.same_content(*k, p)) {
            return false;
        }
        kept.push((c.kind, c.payload.clone()));
        true
    });
    before - entries.len()
}

/// Remove the lowest unpinned clip until within `max_items`; when only
/// pinned clips remain, the lowest clip goes regardless.
fn evict_to_capacity(entries: &mut Vec<Clip>, max_items: usize) -> usize {
    let mut evicted = 0;
    while entries.len() > max_items {
        match entries.iter().rposition(|c| !c.pinned) {
            Some(pos) => {
                entries.remove(pos);
            }
            None => {
                entries.pop();
            }
        }
        evicted += 1;
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn store(max_items: usize) -> HistoryStore {
        HistoryStore::in_memory(HistoryOptions {
            max_items,
            ..HistoryOptions::default()
        })
    }

    fn texts(s: &HistoryStore) -> Vec<String> {
        s.snapshot()
            .iter()
            .map(|c| c.as_text().unwrap_or("<image>").to_string())
            .collect()
    }

    #[test]
    fn same_change_count_is_ignored() {
        let s = store(10);
        assert_matches!(s.ingest(ClipKind::Text, b"a", 1), IngestOutcome::Added(_));
        assert_eq!(s.ingest(ClipKind::Text, b"b", 1), IngestOutcome::Unchanged);
        assert_eq!(texts(&s), vec!["a"]);
    }

    #[test]
    fn blank_text_is_skipped() {
        let s = store(10);
        assert_eq!(s.ingest(ClipKind::Text, b"  \n ", 1), IngestOutcome::Empty);
        assert!(s.is_empty());
        assert_eq!(s.version(), 0);
    }

    #[test]
    fn recopy_promotes_instead_of_duplicating() {
        let s = store(10);
        s.ingest(ClipKind::Text, b"a", 1);
        s.ingest(ClipKind::Text, b"b", 2);
        s.ingest(ClipKind::Text, b"c", 3);
        s.ingest(ClipKind::Text, b"a", 4);
        assert_eq!(texts(&s), vec!["a", "c", "b"]);
    }

    #[test]
    fn head_duplicate_keeps_identity() {
        let s = store(10);
        let IngestOutcome::Added(id) = s.ingest(ClipKind::Text, b"hello", 1) else {
            panic!("expected add");
        };
        let before = s.get(id).unwrap();
        assert_eq!(s.ingest(ClipKind::Text, b"hello", 2), IngestOutcome::Duplicate);
        let after = s.snapshot();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0], before);
    }

    #[test]
    fn text_and_image_with_same_bytes_are_distinct() {
        let s = store(10);
        s.ingest(ClipKind::Text, b"abc", 1);
        s.ingest(ClipKind::Image, b"abc", 2);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn pinned_duplicate_is_not_replaced() {
        let s = store(10);
        let IngestOutcome::Added(id) = s.ingest(ClipKind::Text, b"keep", 1) else {
            panic!("expected add");
        };
        s.toggle_pin(id).unwrap();
        s.ingest(ClipKind::Text, b"other", 2);
        s.ingest(ClipKind::Text, b"keep", 3);
        let snap = s.snapshot();
        assert_eq!(snap.len(), 3);
        assert!(!snap[0].pinned);
        assert!(snap.iter().any(|c| c.id == id && c.pinned));
    }

    #[test]
    fn eviction_prefers_oldest_unpinned() {
        let s = store(3);
        for (i, w) in ["a", "b", "c", "d"].iter().enumerate() {
            s.ingest(ClipKind::Text, w.as_bytes(), i as u64);
        }
        assert_eq!(texts(&s), vec!["d", "c", "b"]);
    }

    #[test]
    fn new_clip_yields_to_pins_at_capacity() {
        let s = HistoryStore::in_memory(HistoryOptions {
            max_items: 2,
            max_pins: 10,
            ..HistoryOptions::default()
        });
        for (i, w) in ["a", "b"].iter().enumerate() {
            if let IngestOutcome::Added(id) = s.ingest(ClipKind::Text, w.as_bytes(), i as u64) {
                s.toggle_pin(id).unwrap();
            }
        }
        let version = s.version();
        assert_eq!(s.ingest(ClipKind::Text, b"c", 9), IngestOutcome::NoRoom);
        assert_eq!(s.record(ClipKind::Text, b"d"), IngestOutcome::NoRoom);
        assert_eq!(texts(&s), vec!["b", "a"]);
        assert_eq!(s.version(), version);
    }

    #[test]
    fn all_pinned_overflow_drops_the_lowest() {
        let pinned: Vec<Clip> = ["a", "b", "c"]
            .iter()
            .map(|w| {
                let mut c = Clip::text(w);
                c.pinned = true;
                c
            })
            .collect();
        let s = HistoryStore::open(
            Box::new(MemoryPersistence::with_clips(&pinned)),
            HistoryOptions {
                max_items: 2,
                ..HistoryOptions::default()
            },
        );
        assert_eq!(texts(&s), vec!["a", "b"]);
        assert_eq!(s.evict_to_capacity(), 0);
    }

    #[test]
    fn pin_limit_leaves_state_untouched() {
        let s = store(20);
        let mut ids = Vec::new();
        for i in 0..6u64 {
            if let IngestOutcome::Added(id) = s.ingest(ClipKind::Text, format!("t{i}").as_bytes(), i) {
                ids.push(id);
            }
        }
        for id in &ids[..5] {
            assert!(s.toggle_pin(*id).unwrap());
        }
        let before = s.snapshot();
        let version = s.version();
        assert_matches!(
            s.toggle_pin(ids[5]),
            Err(CoreError::PinLimitExceeded { limit: 5 })
        );
        assert_eq!(s.snapshot(), before);
        assert_eq!(s.version(), version);
        // unpinning frees a slot
        assert!(!s.toggle_pin(ids[0]).unwrap());
        assert!(s.toggle_pin(ids[5]).unwrap());
    }

    #[test]
    fn toggle_unknown_id_is_not_found() {
        let s = store(5);
        let id = ClipId::new();
        assert_matches!(s.toggle_pin(id), Err(CoreError::NotFound(got)) if got == id);
        assert_matches!(s.promote(id), Err(CoreError::NotFound(_)));
    }

    #[test]
    fn unpinning_collapses_duplicate_content() {
        let s = store(10);
        let IngestOutcome::Added(old) = s.ingest(ClipKind::Text, b"dup", 1) else {
            panic!("expected add");
        };
        s.toggle_pin(old).unwrap();
        s.ingest(ClipKind::Text, b"x", 2);
        s.ingest(ClipKind::Text, b"dup", 3);
        assert_eq!(s.len(), 3);
        s.toggle_pin(old).unwrap();
        let snap = s.snapshot();
        assert_eq!(snap.iter().filter(|c| c.as_text() == Some("dup")).count(), 1);
        assert_eq!(snap[0].as_text(), Some("dup"));
    }

    #[test]
    fn promote_moves_without_new_identity() {
        let s = store(10);
        let IngestOutcome::Added(a) = s.ingest(ClipKind::Text, b"a", 1) else {
            panic!("expected add");
        };
        s.ingest(ClipKind::Text, b"b", 2);
        let moved = s.promote(a).unwrap();
        assert_eq!(moved.id, a);
        assert_eq!(s.snapshot()[0].id, a);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn add_or_promote_restores_evicted_clip() {
        let s = store(2);
        s.ingest(ClipKind::Text, b"a", 1);
        let held = s.snapshot()[0].clone();
        s.ingest(ClipKind::Text, b"b", 2);
        s.ingest(ClipKind::Text, b"c", 3);
        assert!(s.get(held.id).is_none());
        s.add_or_promote(&held);
        assert_eq!(s.snapshot()[0].id, held.id);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn retention_spares_pins_and_fresh_clips() {
        let s = store(10);
        s.ingest(ClipKind::Text, b"old text", 1);
        s.ingest(ClipKind::Image, b"\x89PNG", 2);
        let IngestOutcome::Added(pinned) = s.ingest(ClipKind::Text, b"pinned", 3) else {
            panic!("expected add");
        };
        s.toggle_pin(pinned).unwrap();
        let later = OffsetDateTime::now_utc() + time::Duration::hours(12);
        assert_eq!(s.apply_retention(later), 1);
        assert_eq!(texts(&s), vec!["pinned", "old text"]);
        let much_later = OffsetDateTime::now_utc() + time::Duration::days(30);
        assert_eq!(s.apply_retention(much_later), 1);
        assert_eq!(texts(&s), vec!["pinned"]);
    }

    #[test]
    fn clear_keeps_pins_unless_destructive() {
        let s = store(10);
        s.ingest(ClipKind::Text, b"a", 1);
        let IngestOutcome::Added(b) = s.ingest(ClipKind::Text, b"b", 2) else {
            panic!("expected add");
        };
        s.toggle_pin(b).unwrap();
        assert_eq!(s.clear(true), 1);
        assert_eq!(texts(&s), vec!["b"]);
        assert_eq!(s.clear(false), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn echo_is_suppressed_once() {
        let s = store(10);
        s.ingest(ClipKind::Text, b"a", 1);
        s.ingest(ClipKind::Text, b"b", 2);
        let a = s.snapshot()[1].clone();
        s.note_programmatic_write(a.kind, a.payload.clone());
        s.add_or_promote(&a);
        assert_eq!(s.ingest(ClipKind::Text, b"a", 3), IngestOutcome::Echo);
        assert!(!s.has_pending_echo());
        s.ingest(ClipKind::Text, b"b", 4);
        assert_matches!(s.ingest(ClipKind::Text, b"a", 5), IngestOutcome::Added(_));
        assert_eq!(texts(&s), vec!["a", "b"]);
    }

    #[test]
    fn echo_expires_when_other_content_arrives_first() {
        let s = store(10);
        s.note_programmatic_write(ClipKind::Text, Arc::from(&b"mine"[..]));
        s.ingest(ClipKind::Text, b"theirs", 1);
        assert!(!s.has_pending_echo());
        assert_matches!(s.ingest(ClipKind::Text, b"mine", 2), IngestOutcome::Added(_));
    }

    #[test]
    fn clearing_nothing_is_not_a_mutation() {
        let s = store(10);
        let IngestOutcome::Added(id) = s.ingest(ClipKind::Text, b"a", 1) else {
            panic!("expected add");
        };
        s.toggle_pin(id).unwrap();
        let version = s.version();
        assert_eq!(s.clear(true), 0);
        assert_eq!(s.version(), version);
        assert_eq!(s.len(), 1);
    }

    struct FailingPersistence;

    impl Persistence for FailingPersistence {
        fn save(&self, _clips: &[Clip]) -> Result<()> {
            Err(CoreError::Io(std::io::Error::other("disk full")))
        }

        fn load(&self) -> Vec<Clip> {
            Vec::new()
        }
    }

    #[test]
    fn save_failure_keeps_in_memory_mutations() {
        let s = HistoryStore::open(Box::new(FailingPersistence), HistoryOptions::default());
        let IngestOutcome::Added(id) = s.ingest(ClipKind::Text, b"a", 1) else {
            panic!("expected add");
        };
        assert_eq!(s.version(), 1);
        s.ingest(ClipKind::Text, b"b", 2);
        assert_eq!(texts(&s), vec!["b", "a"]);

        assert!(s.toggle_pin(id).unwrap());
        assert_eq!(s.version(), 3);
        assert!(s.get(id).unwrap().pinned);

        assert_eq!(s.clear(true), 1);
        assert_eq!(s.version(), 4);
        assert_eq!(texts(&s), vec!["a"]);
    }

    #[test]
    fn open_normalizes_hand_edited_history() {
        let mut loaded = vec![Clip::text("dup"), Clip::text("x"), Clip::text("dup")];
        for w in ["p1", "p2", "p3"] {
            let mut c = Clip::text(w);
            c.pinned = true;
            loaded.push(c);
        }
        let persistence = MemoryPersistence::with_clips(&loaded);
        let s = HistoryStore::open(
            Box::new(persistence),
            HistoryOptions {
                max_items: 10,
                max_pins: 2,
                ..HistoryOptions::default()
            },
        );
        let snap = s.snapshot();
        assert_eq!(texts(&s), vec!["dup", "x", "p1", "p2", "p3"]);
        assert_eq!(snap[0].id, loaded[0].id);
        assert_eq!(s.pinned_count(), 2);
        assert!(!snap[4].pinned);
        assert_eq!(s.version(), 1);
    }

    #[test]
    fn concurrent_mutations_keep_invariants() {
        let s = Arc::new(HistoryStore::in_memory(HistoryOptions {
            max_items: 8,
            max_pins: 3,
            ..HistoryOptions::default()
        }));
        let workers: Vec<_> = (0..4u64)
            .map(|t| {
                let s = s.clone();
                std::thread::spawn(move || {
                    for i in 0..200u64 {
                        let text = format!("clip {}", (t * 7 + i) % 12);
                        s.record(ClipKind::Text, text.as_bytes());
                        if i % 5 == 0 {
                            if let Some(head) = s.snapshot().first() {
                                let _ = s.toggle_pin(head.id);
                            }
                        }
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        let snap = s.snapshot();
        assert!(snap.len() <= 8);
        assert!(s.pinned_count() <= 3);
        let unpinned: Vec<&Clip> = snap.iter().filter(|c| !c.pinned).collect();
        for (i, a) in unpinned.iter().enumerate() {
            for b in &unpinned[i + 1..] {
                assert!(!a.same_content(b.kind, &b.payload));
            }
        }
    }

    #[test]
    fn version_tracks_mutations_only() {
        let s = store(10);
        assert_eq!(s.version(), 0);
        s.ingest(ClipKind::Text, b"a", 1);
        assert_eq!(s.version(), 1);
        s.ingest(ClipKind::Text, b"a", 2);
        s.search("a");
        assert_eq!(s.version(), 1);
    }
}
