use crate::backend::{Backend, BackendCommitter};
use anyhow::Result;
use clipstack_core::protocol::ClipSummary;
use clipstack_core::{ClipId, CoreError, Direction, SelectionController};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

const REFRESH_EVERY: Duration = Duration::from_millis(1000);
const TOAST_FOR: Duration = Duration::from_millis(1500);
/// Layout used to map mouse rows when nothing is drawn.
const HEADLESS_AREA: Rect = Rect {
    x: 0,
    y: 0,
    width: 80,
    height: 24,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Dismissed,
    Committed(ClipId),
    /// On the clipboard, but the paste gesture could not be sent.
    PasteManually(ClipId),
}

pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>>;
}

pub struct RealEventSource;

impl EventSource for RealEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>> {
        if event::poll(timeout)? {
            Ok(Some(event::read()?))
        } else {
            Ok(None)
        }
    }
}

/// Restores the terminal even when the picker bails out with an error.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        Ok(Self {
            terminal: Terminal::new(CrosstermBackend::new(stdout))?,
        })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
    }
}

pub fn run_picker_default(backend: &dyn Backend, paste: bool) -> Result<PickOutcome> {
    let mut es = RealEventSource;
    run_picker_with(backend, &mut es, true, paste)
}

enum Action {
    Continue,
    Finish(PickOutcome),
}

struct Picker<'a> {
    backend: &'a dyn Backend,
    paste: bool,
    ctl: SelectionController<ClipSummary>,
    version: u64,
    list_state: ListState,
    list_area: Rect,
    toast: Option<(String, Instant)>,
    last_refresh: Instant,
}

pub fn run_picker_with(
    backend: &dyn Backend,
    es: &mut dyn EventSource,
    draw: bool,
    paste: bool,
) -> Result<PickOutcome> {
    let page = backend.list(None)?;
    let mut picker = Picker {
        backend,
        paste,
        ctl: SelectionController::new(page.items),
        version: page.version,
        list_state: ListState::default(),
        list_area: split(HEADLESS_AREA)[1],
        toast: None,
        last_refresh: Instant::now(),
    };
    let mut guard = if draw { Some(TerminalGuard::enter()?) } else { None };

    loop {
        if let Some(g) = guard.as_mut() {
            g.terminal.draw(|f| picker.render(f))?;
        }
        let Some(ev) = es.poll(Duration::from_millis(100))? else {
            // headless sessions end when input runs out
            if !draw {
                return Ok(PickOutcome::Dismissed);
            }
            picker.refresh_if_stale();
            continue;
        };
        let action = match ev {
            Event::Key(k) if k.kind == KeyEventKind::Press => picker.on_key(k),
            Event::Mouse(m) => {
                picker.on_mouse(m);
                Action::Continue
            }
            _ => Action::Continue,
        };
        if let Action::Finish(outcome) = action {
            drop(guard);
            picker.ctl.dismiss();
            return Ok(outcome);
        }
        picker.refresh_if_stale();
    }
}

fn split(area: Rect) -> [Rect; 3] {
    Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(area)
}

impl Picker<'_> {
    fn notify(&mut self, msg: impl Into<String>) {
        self.toast = Some((msg.into(), Instant::now() + TOAST_FOR));
    }

    fn refresh(&mut self) {
        match self.backend.list(None) {
            Ok(page) => {
                if page.version != self.version {
                    self.version = page.version;
                    self.ctl.sync(page.items);
                }
            }
            Err(e) => self.notify(format!("refresh failed: {e}")),
        }
        self.last_refresh = Instant::now();
    }

    fn refresh_if_stale(&mut self) {
        if self.last_refresh.elapsed() >= REFRESH_EVERY {
            self.refresh();
        }
    }

    fn on_key(&mut self, k: KeyEvent) -> Action {
        let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
        match k.code {
            KeyCode::Esc => return Action::Finish(PickOutcome::Dismissed),
            KeyCode::Char('c') if ctrl => return Action::Finish(PickOutcome::Dismissed),
            KeyCode::Char('p') if ctrl => self.ctl.navigate(Direction::Previous),
            KeyCode::Char('n') if ctrl => self.ctl.navigate(Direction::Next),
            KeyCode::Up => self.ctl.navigate(Direction::Previous),
            KeyCode::Down => self.ctl.navigate(Direction::Next),
            KeyCode::Char('t') if ctrl => self.toggle_pin(),
            KeyCode::Enter => return self.commit(),
            KeyCode::Backspace => self.ctl.pop_char(),
            KeyCode::Char(ch) if !ctrl => self.ctl.push_char(ch),
            _ => {}
        }
        Action::Continue
    }

    fn on_mouse(&mut self, m: MouseEvent) {
        match m.kind {
            MouseEventKind::ScrollDown => self.ctl.navigate(Direction::Next),
            MouseEventKind::ScrollUp => self.ctl.navigate(Direction::Previous),
            MouseEventKind::Down(MouseButton::Left) => {
                // first row sits inside the top border
                let top = self.list_area.y + 1;
                let bottom = self.list_area.y + self.list_area.height.saturating_sub(1);
                if m.row >= top && m.row < bottom {
                    let index = (m.row - top) as usize + self.list_state.offset();
                    self.ctl.select(index);
                }
            }
            _ => {}
        }
    }

    fn toggle_pin(&mut self) {
        let Some(id) = self.ctl.selected().map(|c| c.id) else {
            return;
        };
        match self.backend.toggle_pin(id) {
            Ok(true) => self.notify("Pinned"),
            Ok(false) => self.notify("Unpinned"),
            Err(e) => self.notify(e.to_string()),
        }
        self.refresh();
    }

    fn commit(&mut self) -> Action {
        let selected = self.ctl.selected().map(|c| c.id);
        let committer = BackendCommitter {
            backend: self.backend,
            paste: self.paste,
        };
        match self.ctl.commit(&committer) {
            Ok(Some(id)) => Action::Finish(PickOutcome::Committed(id)),
            Ok(None) => Action::Continue,
            Err(CoreError::PermissionRequired) => match selected {
                Some(id) => Action::Finish(PickOutcome::PasteManually(id)),
                None => Action::Continue,
            },
            Err(e) => {
                self.notify(e.to_string());
                Action::Continue
            }
        }
    }

    fn render(&mut self, f: &mut ratatui::Frame) {
        let [search, list_area, footer] = split(f.area());
        self.list_area = list_area;

        let query = Paragraph::new(self.ctl.query().to_string())
            .block(Block::default().borders(Borders::ALL).title("Search"));
        f.render_widget(query, search);

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let rows: Vec<ListItem> = self
            .ctl
            .view()
            .iter()
            .map(|c| {
                ListItem::new(Line::from(vec![
                    Span::raw(if c.pinned { "📌 " } else { "   " }),
                    Span::raw(c.preview.clone()),
                    Span::styled(
                        format!("  {}", rel_time(c.created_at, now)),
                        Style::default().add_modifier(Modifier::DIM),
                    ),
                ]))
            })
            .collect();
        let title = format!("History ({})", self.ctl.view().len());
        let list = List::new(rows)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        self.list_state.select(if self.ctl.view().is_empty() {
            None
        } else {
            Some(self.ctl.cursor())
        });
        f.render_stateful_widget(list, list_area, &mut self.list_state);

        let mut help = String::from("Enter copy | ↑/↓ ^P/^N move | ^T pin | Esc cancel");
        if let Some((msg, until)) = &self.toast {
            if Instant::now() <= *until {
                help.push_str(&format!("  | {msg}"));
            }
        }
        f.render_widget(
            Paragraph::new(help).style(Style::default().add_modifier(Modifier::DIM)),
            footer,
        );
    }
}

/// "just now", "5m ago", "3h ago", "2d ago", then a date.
pub fn rel_time(ts: i64, now: i64) -> String {
    let delta = now.saturating_sub(ts);
    if delta < 60 {
        return "just now".into();
    }
    let minutes = delta / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{}d ago", days);
    }
    let dt = OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let date = dt.date();
    format!("{}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use clipstack_core::clipboard::MemoryClipboard;
    use clipstack_core::config::Settings;
    use clipstack_core::{ClipKind, HistoryOptions, HistoryStore};
    use crossterm::event::KeyEventState;
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct FakeEvents {
        events: VecDeque<Event>,
    }

    impl EventSource for FakeEvents {
        fn poll(&mut self, _timeout: Duration) -> Result<Option<Event>> {
            Ok(self.events.pop_front())
        }
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn ctrl(ch: char) -> Event {
        Event::Key(KeyEvent {
            code: KeyCode::Char(ch),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mouse(kind: MouseEventKind, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 5,
            row,
            modifiers: KeyModifiers::empty(),
        })
    }

    fn typed(s: &str) -> impl Iterator<Item = Event> + '_ {
        s.chars().map(|c| key(KeyCode::Char(c)))
    }

    struct Rig {
        backend: LocalBackend,
        clipboard: Arc<MemoryClipboard>,
    }

    fn rig(words: &[&str]) -> Rig {
        let store = Arc::new(HistoryStore::in_memory(HistoryOptions::default()));
        for w in words {
            store.record(ClipKind::Text, w.as_bytes());
        }
        let clipboard = Arc::new(MemoryClipboard::new());
        let backend = LocalBackend::new(store, clipboard.clone(), &Settings::default());
        Rig { backend, clipboard }
    }

    fn run(r: &Rig, events: Vec<Event>, paste: bool) -> PickOutcome {
        let mut es = FakeEvents {
            events: events.into(),
        };
        run_picker_with(&r.backend, &mut es, false, paste).unwrap()
    }

    fn id_of(r: &Rig, text: &str) -> ClipId {
        r.backend
            .store()
            .snapshot()
            .iter()
            .find(|c| c.as_text() == Some(text))
            .map(|c| c.id)
            .unwrap()
    }

    #[test]
    fn typing_filters_and_enter_commits() {
        let r = rig(&["hello world", "second", "third"]);
        let mut ev: Vec<Event> = typed("hello").collect();
        ev.push(key(KeyCode::Enter));
        let out = run(&r, ev, false);
        assert_eq!(out, PickOutcome::Committed(id_of(&r, "hello world")));
        assert_eq!(
            r.clipboard.contents(),
            Some((ClipKind::Text, b"hello world".to_vec()))
        );
        assert_eq!(r.backend.store().snapshot()[0].as_text(), Some("hello world"));
    }

    #[test]
    fn navigation_wraps_around() {
        let r = rig(&["a", "b", "c"]);
        // newest first: c, b, a; Up from the top lands on "a"
        let out = run(&r, vec![key(KeyCode::Up), key(KeyCode::Enter)], false);
        assert_eq!(out, PickOutcome::Committed(id_of(&r, "a")));
        // "a" was promoted: a, c, b
        let out = run(&r, vec![ctrl('n'), ctrl('n'), ctrl('p'), key(KeyCode::Enter)], false);
        assert_eq!(out, PickOutcome::Committed(id_of(&r, "c")));
    }

    #[test]
    fn escape_dismisses_without_touching_history() {
        let r = rig(&["x", "y"]);
        let before = r.backend.store().snapshot();
        assert_eq!(run(&r, vec![key(KeyCode::Down), key(KeyCode::Esc)], false), PickOutcome::Dismissed);
        assert_eq!(run(&r, vec![ctrl('c')], false), PickOutcome::Dismissed);
        assert_eq!(r.backend.store().snapshot(), before);
        assert_eq!(r.clipboard.writes(), 0);
    }

    #[test]
    fn enter_on_empty_filter_keeps_running() {
        let r = rig(&["alpha"]);
        let mut ev: Vec<Event> = typed("zzz").collect();
        ev.push(key(KeyCode::Enter));
        assert_eq!(run(&r, ev, false), PickOutcome::Dismissed);
        assert_eq!(r.clipboard.writes(), 0);
    }

    #[test]
    fn ctrl_t_toggles_pin_of_highlighted_row() {
        let r = rig(&["keep me", "other"]);
        run(&r, vec![key(KeyCode::Down), ctrl('t'), key(KeyCode::Esc)], false);
        let snap = r.backend.store().snapshot();
        let kept = snap.iter().find(|c| c.as_text() == Some("keep me")).unwrap();
        assert!(kept.pinned);
    }

    #[test]
    fn wheel_and_click_select_rows() {
        let r = rig(&["one", "two", "three"]);
        let out = run(
            &r,
            vec![mouse(MouseEventKind::ScrollDown, 0), key(KeyCode::Enter)],
            false,
        );
        assert_eq!(out, PickOutcome::Committed(id_of(&r, "two")));

        // list block starts at row 3; its first row is at 4
        let r = rig(&["one", "two", "three"]);
        let out = run(
            &r,
            vec![mouse(MouseEventKind::Down(MouseButton::Left), 6), key(KeyCode::Enter)],
            false,
        );
        assert_eq!(out, PickOutcome::Committed(id_of(&r, "one")));
    }

    #[test]
    fn backspace_widens_filter() {
        let r = rig(&["cat", "car"]);
        let mut ev: Vec<Event> = typed("cat").collect();
        ev.push(key(KeyCode::Backspace));
        ev.push(key(KeyCode::Down));
        ev.push(key(KeyCode::Enter));
        assert_eq!(run(&r, ev, false), PickOutcome::Committed(id_of(&r, "cat")));
    }

    #[test]
    fn rel_time_buckets() {
        let now = 1_700_000_000;
        assert_eq!(rel_time(now - 5, now), "just now");
        assert_eq!(rel_time(now - 300, now), "5m ago");
        assert_eq!(rel_time(now - 3 * 3600, now), "3h ago");
        assert_eq!(rel_time(now - 2 * 86_400, now), "2d ago");
        assert_eq!(rel_time(0, now), "1970-01-01");
    }
}
