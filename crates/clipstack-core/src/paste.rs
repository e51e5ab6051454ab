//! Paste gesture collaborators: a permission check and a keystroke injector.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

pub trait PermissionOracle: Send + Sync {
    /// Queried at every commit; never cached by callers.
    fn is_granted(&self) -> bool;
    /// Point the user at whatever grants the permission. Fire-and-forget.
    fn request_permission(&self);
}

pub trait PasteSimulator: Send + Sync {
    /// Emit the platform paste gesture. Best effort; failures are logged.
    fn simulate_paste(&self);
}

pub const DEFAULT_PASTE_COMMAND: [&str; 4] = ["xdotool", "key", "--clearmodifiers", "ctrl+v"];

pub fn default_paste_command() -> Vec<String> {
    DEFAULT_PASTE_COMMAND.iter().map(|s| s.to_string()).collect()
}

/// Spawns an external keystroke tool, e.g. `xdotool` or `wtype`.
#[derive(Debug, Clone)]
pub struct CommandPaste {
    argv: Vec<String>,
}

impl CommandPaste {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

impl Default for CommandPaste {
    fn default() -> Self {
        Self::new(default_paste_command())
    }
}

impl PasteSimulator for CommandPaste {
    fn simulate_paste(&self) {
        let Some((prog, args)) = self.argv.split_first() else {
            warn!("paste command is empty; nothing to run");
            return;
        };
        let status = Command::new(prog)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => debug!(program = %prog, "paste gesture sent"),
            Ok(s) => warn!(program = %prog, code = ?s.code(), "paste command failed"),
            Err(e) => warn!(program = %prog, error = %e, "cannot run paste command"),
        }
    }
}

/// Locate `program` on `PATH`. Paths with a separator are checked as-is.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

/// Granted when the paste tool can be found. Re-checked on every call so
/// installing the tool takes effect without a restart.
#[derive(Debug, Clone)]
pub struct ToolPermission {
    program: String,
}

impl ToolPermission {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn for_command(cmd: &CommandPaste) -> Self {
        Self::new(cmd.program().unwrap_or_default())
    }
}

impl PermissionOracle for ToolPermission {
    fn is_granted(&self) -> bool {
        !self.program.is_empty() && find_on_path(&self.program).is_some()
    }

    fn request_permission(&self) {
        warn!(
            program = %self.program,
            "auto-paste needs `{}` on PATH; install it (xdotool on X11, wtype on Wayland) or set [paste].command",
            self.program
        );
    }
}

/// Fixed answer; for tests and for disabling auto-paste.
#[derive(Debug, Clone, Copy)]
pub struct FixedPermission(pub bool);

impl PermissionOracle for FixedPermission {
    fn is_granted(&self) -> bool {
        self.0
    }

    fn request_permission(&self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPaste;

impl PasteSimulator for NoopPaste {
    fn simulate_paste(&self) {}
}
