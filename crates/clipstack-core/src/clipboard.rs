//! Clipboard snapshot source: where captured content comes from and where
//! committed content goes back to.

use crate::{ClipKind, CoreError, Result};
use std::sync::{Mutex, PoisonError};

/// Current clipboard content plus the counter it was observed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSnapshot {
    pub kind: ClipKind,
    pub payload: Vec<u8>,
    pub change_count: u64,
}

pub trait ClipboardSource: Send + Sync {
    /// `None` when the clipboard is empty or holds nothing we capture.
    /// Sources may also answer `None` when nothing changed since the last poll.
    fn poll(&self) -> Option<ClipSnapshot>;
    /// Replace the clipboard content. Image payloads are PNG bytes.
    fn write(&self, kind: ClipKind, payload: &[u8]) -> Result<()>;
    /// Counter the next `poll` would report, without reading content.
    fn change_count(&self) -> u64;
}

#[derive(Default)]
struct MemoryState {
    current: Option<(ClipKind, Vec<u8>)>,
    count: u64,
    fail_writes: bool,
    writes: usize,
}

/// In-process clipboard. Every copy, external or ours, bumps the counter.
#[derive(Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate another application copying content.
    pub fn copy_external(&self, kind: ClipKind, payload: &[u8]) {
        let mut st = self.state();
        st.current = Some((kind, payload.to_vec()));
        st.count += 1;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn contents(&self) -> Option<(ClipKind, Vec<u8>)> {
        self.state().current.clone()
    }

    /// Number of successful writes through [`ClipboardSource::write`].
    pub fn writes(&self) -> usize {
        self.state().writes
    }
}

impl ClipboardSource for MemoryClipboard {
    fn poll(&self) -> Option<ClipSnapshot> {
        let st = self.state();
        st.current.as_ref().map(|(kind, payload)| ClipSnapshot {
            kind: *kind,
            payload: payload.clone(),
            change_count: st.count,
        })
    }

    fn write(&self, kind: ClipKind, payload: &[u8]) -> Result<()> {
        let mut st = self.state();
        if st.fail_writes {
            return Err(CoreError::Sink("clipboard unavailable".into()));
        }
        st.current = Some((kind, payload.to_vec()));
        st.count += 1;
        st.writes += 1;
        Ok(())
    }

    fn change_count(&self) -> u64 {
        self.state().count
    }
}

#[cfg(feature = "clipboard")]
pub use system::ArboardClipboard;

#[cfg(feature = "clipboard")]
mod system {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, ImageFormat};
    use std::borrow::Cow;
    use tracing::debug;

    type Raw = (ClipKind, Vec<u8>, Option<(u32, u32)>);

    /// Derived change counter for clipboards that do not expose one.
    #[derive(Default)]
    struct Seen {
        raw: Option<(ClipKind, Vec<u8>)>,
        count: u64,
        polled: Option<u64>,
    }

    impl Seen {
        /// Record the current content; the counter advances when it differs.
        fn observe(&mut self, key: Option<(ClipKind, Vec<u8>)>) -> u64 {
            if key != self.raw {
                self.raw = key;
                self.count += 1;
            }
            self.count
        }

        /// True the first time `count` is handed out by `poll`.
        fn fresh_for_poll(&mut self, count: u64) -> bool {
            if self.polled == Some(count) {
                return false;
            }
            self.polled = Some(count);
            true
        }
    }

    /// System clipboard through `arboard`.
    ///
    /// One handle is kept open for the lifetime of the value. On X11 and
    /// Wayland the process serves the clipboard content it wrote only while
    /// that handle lives, so a daemon keeps ownership as long as it runs.
    ///
    /// Processes that exit right after a write should use
    /// [`ArboardClipboard::short_lived`], which hands written content to
    /// `wl-copy`, `xclip` or `xsel` so it outlives the process.
    #[derive(Default)]
    pub struct ArboardClipboard {
        handle: Mutex<Option<arboard::Clipboard>>,
        seen: Mutex<Seen>,
        hand_off: bool,
    }

    impl ArboardClipboard {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn short_lived() -> Self {
            Self {
                hand_off: true,
                ..Self::default()
            }
        }

        fn with_handle<R>(
            &self,
            f: impl FnOnce(&mut arboard::Clipboard) -> std::result::Result<R, arboard::Error>,
        ) -> std::result::Result<R, arboard::Error> {
            let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
            let cb = match slot.take() {
                Some(cb) => cb,
                None => arboard::Clipboard::new()?,
            };
            let cb = slot.insert(cb);
            let out = f(cb);
            if let Err(arboard::Error::ClipboardNotSupported) = &out {
                // reopen on the next call
                *slot = None;
            }
            out
        }

        fn read_raw(&self) -> Option<Raw> {
            if let Ok(text) = self.with_handle(|cb| cb.get_text()) {
                return Some((ClipKind::Text, text.into_bytes(), None));
            }
            self.with_handle(|cb| cb.get_image())
                .ok()
                .map(|img| {
                    (
                        ClipKind::Image,
                        img.bytes.into_owned(),
                        Some((img.width as u32, img.height as u32)),
                    )
                })
        }

        fn seen(&self) -> std::sync::MutexGuard<'_, Seen> {
            self.seen.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn observe(&self) -> (Option<Raw>, u64) {
            let raw = self.read_raw();
            let key = raw.as_ref().map(|(k, b, _)| (*k, b.clone()));
            let count = self.seen().observe(key);
            (raw, count)
        }

        fn write_with_handle(&self, kind: ClipKind, payload: &[u8]) -> Result<()> {
            match kind {
                ClipKind::Text => {
                    let text = String::from_utf8_lossy(payload).into_owned();
                    self.with_handle(|cb| cb.set_text(text))
                        .map_err(|e| CoreError::Sink(e.to_string()))
                }
                ClipKind::Image => {
                    let img = image::load_from_memory_with_format(payload, ImageFormat::Png)
                        .map_err(|e| CoreError::Sink(format!("cannot decode image: {e}")))?
                        .to_rgba8();
                    let (width, height) = img.dimensions();
                    let data = arboard::ImageData {
                        width: width as usize,
                        height: height as usize,
                        bytes: Cow::Owned(img.into_raw()),
                    };
                    self.with_handle(|cb| cb.set_image(data))
                        .map_err(|e| CoreError::Sink(e.to_string()))
                }
            }
        }
    }

    fn encode_png(rgba: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(rgba, width, height, ExtendedColorType::Rgba8)
            .ok()?;
        Some(out)
    }

    #[cfg(target_os = "linux")]
    fn pipe_to(prog: &str, args: &[&str], input: &[u8]) -> bool {
        use std::io::Write as _;
        use std::process::{Command, Stdio};

        let mut child = match Command::new(prog)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(_) => return false,
        };
        if let Some(mut stdin) = child.stdin.take() {
            if stdin.write_all(input).is_err() {
                return false;
            }
        }
        child.wait().map(|s| s.success()).unwrap_or(false)
    }

    /// Give `payload` to a helper that keeps serving it after we exit.
    #[cfg(target_os = "linux")]
    fn hand_off(kind: ClipKind, payload: &[u8]) -> bool {
        let png: &[&str] = match kind {
            ClipKind::Text => &[],
            ClipKind::Image => &["-t", "image/png"],
        };
        if std::env::var_os("WAYLAND_DISPLAY").is_some() && pipe_to("wl-copy", png, payload) {
            debug!("clipboard handed to wl-copy");
            return true;
        }
        if std::env::var_os("DISPLAY").is_some() {
            let mut xclip = vec!["-selection", "clipboard"];
            xclip.extend_from_slice(png);
            if pipe_to("xclip", &xclip, payload) {
                debug!("clipboard handed to xclip");
                return true;
            }
            if kind == ClipKind::Text && pipe_to("xsel", &["-b", "-i"], payload) {
                debug!("clipboard handed to xsel");
                return true;
            }
        }
        false
    }

    #[cfg(not(target_os = "linux"))]
    fn hand_off(_kind: ClipKind, _payload: &[u8]) -> bool {
        false
    }

    impl ClipboardSource for ArboardClipboard {
        /// Also `None` when nothing changed since the previous poll, so an
        /// unchanged image is not re-encoded every tick.
        fn poll(&self) -> Option<ClipSnapshot> {
            let (raw, change_count) = self.observe();
            let (kind, bytes, dims) = raw?;
            if !self.seen().fresh_for_poll(change_count) {
                return None;
            }
            let payload = match (kind, dims) {
                (ClipKind::Image, Some((w, h))) => match encode_png(&bytes, w, h) {
                    Some(png) => png,
                    None => {
                        debug!(width = w, height = h, "could not encode clipboard image");
                        return None;
                    }
                },
                _ => bytes,
            };
            Some(ClipSnapshot {
                kind,
                payload,
                change_count,
            })
        }

        fn write(&self, kind: ClipKind, payload: &[u8]) -> Result<()> {
            if self.hand_off && hand_off(kind, payload) {
                return Ok(());
            }
            self.write_with_handle(kind, payload)
        }

        fn change_count(&self) -> u64 {
            self.observe().1
        }
    }

}
