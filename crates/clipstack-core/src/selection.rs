//! Picker selection state machine over a live-filtered view.
//!
//! The controller never owns history; it holds a snapshot of items handed
//! in by the caller and recomputes the filtered view from it. A query edit
//! resets the cursor to the first row; a refreshed snapshot clamps it.

use crate::commit::EntryCommitter;
use crate::{Clip, ClipId, ClipKind, CoreError, Result};

/// What the filter needs to know about a listed item.
pub trait Searchable {
    fn clip_id(&self) -> ClipId;
    fn kind(&self) -> ClipKind;
    fn text(&self) -> Option<&str>;
}

impl Searchable for Clip {
    fn clip_id(&self) -> ClipId {
        self.id
    }
    fn kind(&self) -> ClipKind {
        self.kind
    }
    fn text(&self) -> Option<&str> {
        self.as_text()
    }
}

const IMAGE_WORD: &str = "image";

/// Case-insensitive match: text clips by substring, image clips when the
/// query is a substring of the word "image". Empty query matches all.
pub fn matches_query<T: Searchable + ?Sized>(item: &T, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    match item.kind() {
        ClipKind::Text => item
            .text()
            .map(|t| t.to_lowercase().contains(&needle))
            .unwrap_or(false),
        ClipKind::Image => IMAGE_WORD.contains(&needle),
    }
}

/// Matching items in store order.
pub fn filter_view<T: Searchable + Clone>(items: &[T], query: &str) -> Vec<T> {
    items
        .iter()
        .filter(|it| matches_query(*it, query))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Filtering,
    Committing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

pub struct SelectionController<T> {
    items: Vec<T>,
    view: Vec<T>,
    query: String,
    cursor: usize,
    state: SelectionState,
}

impl<T: Searchable + Clone> SelectionController<T> {
    pub fn new(items: Vec<T>) -> Self {
        let view = items.clone();
        Self {
            items,
            view,
            query: String::new(),
            cursor: 0,
            state: SelectionState::Idle,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn view(&self) -> &[T] {
        &self.view
    }

    pub fn selected(&self) -> Option<&T> {
        self.view.get(self.cursor)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        if self.state == SelectionState::Committing {
            return;
        }
        self.query = query.into();
        self.state = SelectionState::Filtering;
        self.view = filter_view(&self.items, &self.query);
        self.cursor = 0;
    }

    pub fn push_char(&mut self, ch: char) {
        let mut q = self.query.clone();
        q.push(ch);
        self.set_query(q);
    }

    pub fn pop_char(&mut self) {
        let mut q = self.query.clone();
        if q.pop().is_some() {
            self.set_query(q);
        }
    }

    /// Cyclic: next from the last row wraps to 0, previous from 0 to the last.
    pub fn navigate(&mut self, direction: Direction) {
        let n = self.view.len();
        if n == 0 || self.state == SelectionState::Committing {
            return;
        }
        self.cursor = match direction {
            Direction::Next => (self.cursor + 1) % n,
            Direction::Previous => (self.cursor + n - 1) % n,
        };
    }

    /// Pointer selection (hover/click). Out-of-range rows are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.view.len() && self.state != SelectionState::Committing {
            self.cursor = index;
            true
        } else {
            false
        }
    }

    /// Replace the snapshot after the store changed. Keeps the query and
    /// clamps the cursor instead of resetting it.
    pub fn sync(&mut self, items: Vec<T>) {
        self.items = items;
        self.view = filter_view(&self.items, &self.query);
        self.cursor = self.cursor.min(self.view.len().saturating_sub(1));
    }

    /// Commit the highlighted row.
    ///
    /// `Ok(None)` when there is nothing to commit. On success, and on
    /// `PermissionRequired` (the clipboard already holds the entry), the
    /// controller moves to `Committing` and the caller should dismiss.
    /// Any other error leaves the state untouched so the user can retry.
    pub fn commit<C>(&mut self, committer: &C) -> Result<Option<ClipId>>
    where
        C: EntryCommitter<T> + ?Sized,
    {
        if self.state == SelectionState::Committing {
            return Ok(None);
        }
        let Some(item) = self.view.get(self.cursor) else {
            return Ok(None);
        };
        let id = item.clip_id();
        match committer.commit_entry(item) {
            Ok(()) => {
                self.state = SelectionState::Committing;
                Ok(Some(id))
            }
            Err(CoreError::PermissionRequired) => {
                self.state = SelectionState::Committing;
                Err(CoreError::PermissionRequired)
            }
            Err(e) => Err(e),
        }
    }

    /// Discard the session. History is untouched beyond what commit did.
    pub fn dismiss(self) -> SelectionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        committed: RefCell<Vec<ClipId>>,
        fail_with: RefCell<Option<CoreError>>,
    }

    impl EntryCommitter<Clip> for Recorder {
        fn commit_entry(&self, item: &Clip) -> Result<()> {
            if let Some(e) = self.fail_with.borrow_mut().take() {
                return Err(e);
            }
            self.committed.borrow_mut().push(item.id);
            Ok(())
        }
    }

    fn texts(words: &[&str]) -> Vec<Clip> {
        words.iter().map(Clip::text).collect()
    }

    #[test]
    fn empty_query_matches_everything_in_order() {
        let items = texts(&["a", "b", "c"]);
        let ctl = SelectionController::new(items.clone());
        assert_eq!(ctl.view(), &items[..]);
        assert_eq!(ctl.state(), SelectionState::Idle);
    }

    #[test]
    fn image_matches_only_substrings_of_the_word_image() {
        let img = Clip::image(vec![1u8, 2]);
        let txt = Clip::text("Image manipulation");
        assert!(matches_query(&img, "ima"));
        assert!(matches_query(&img, "IMAGE"));
        assert!(!matches_query(&img, "img"));
        assert!(matches_query(&txt, "image"));
        assert!(!matches_query(&txt, "img"));
    }

    #[test]
    fn query_edit_filters_and_resets_cursor() {
        let mut ctl = SelectionController::new(texts(&["apple", "banana", "apricot"]));
        ctl.navigate(Direction::Next);
        ctl.navigate(Direction::Next);
        assert_eq!(ctl.cursor(), 2);
        ctl.set_query("AP");
        assert_eq!(ctl.state(), SelectionState::Filtering);
        assert_eq!(ctl.cursor(), 0);
        let names: Vec<_> = ctl.view().iter().filter_map(|c| c.as_text()).collect();
        assert_eq!(names, vec!["apple", "apricot"]);
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut ctl = SelectionController::new(texts(&["a", "b", "c", "d"]));
        for _ in 0..4 {
            ctl.navigate(Direction::Next);
        }
        assert_eq!(ctl.cursor(), 0);
        ctl.navigate(Direction::Previous);
        assert_eq!(ctl.cursor(), 3);
    }

    #[test]
    fn navigation_on_empty_view_is_noop() {
        let mut ctl = SelectionController::new(texts(&["a"]));
        ctl.set_query("zzz");
        ctl.navigate(Direction::Next);
        ctl.navigate(Direction::Previous);
        assert_eq!(ctl.cursor(), 0);
        assert!(ctl.selected().is_none());
    }

    #[test]
    fn sync_clamps_instead_of_resetting() {
        let items = texts(&["a1", "a2", "a3", "a4"]);
        let mut ctl = SelectionController::new(items.clone());
        ctl.set_query("a");
        ctl.select(2);
        let mut grown = vec![Clip::text("a0")];
        grown.extend(items.iter().cloned());
        ctl.sync(grown);
        assert_eq!(ctl.cursor(), 2);
        ctl.sync(items[..2].to_vec());
        assert_eq!(ctl.cursor(), 1);
        ctl.sync(Vec::new());
        assert_eq!(ctl.cursor(), 0);
    }

    #[test]
    fn commit_invokes_committer_on_selected_row() {
        let items = texts(&["one", "two", "three"]);
        let mut ctl = SelectionController::new(items.clone());
        ctl.navigate(Direction::Next);
        let rec = Recorder::default();
        let id = ctl.commit(&rec).unwrap();
        assert_eq!(id, Some(items[1].id));
        assert_eq!(*rec.committed.borrow(), vec![items[1].id]);
        assert_eq!(ctl.state(), SelectionState::Committing);
        // a second commit is ignored once committing
        assert_eq!(ctl.commit(&rec).unwrap(), None);
    }

    #[test]
    fn commit_on_empty_view_does_nothing() {
        let mut ctl = SelectionController::new(Vec::<Clip>::new());
        let rec = Recorder::default();
        assert_eq!(ctl.commit(&rec).unwrap(), None);
        assert!(rec.committed.borrow().is_empty());
        assert_eq!(ctl.state(), SelectionState::Idle);
    }

    #[test]
    fn permission_required_still_finishes_commit() {
        let mut ctl = SelectionController::new(texts(&["x"]));
        let rec = Recorder::default();
        *rec.fail_with.borrow_mut() = Some(CoreError::PermissionRequired);
        assert_matches!(ctl.commit(&rec), Err(CoreError::PermissionRequired));
        assert_eq!(ctl.state(), SelectionState::Committing);
    }

    #[test]
    fn sink_failure_allows_retry() {
        let mut ctl = SelectionController::new(texts(&["x"]));
        ctl.set_query("x");
        let rec = Recorder::default();
        *rec.fail_with.borrow_mut() = Some(CoreError::Sink("busy".into()));
        assert_matches!(ctl.commit(&rec), Err(CoreError::Sink(_)));
        assert_eq!(ctl.state(), SelectionState::Filtering);
        assert!(ctl.commit(&rec).unwrap().is_some());
    }
}
