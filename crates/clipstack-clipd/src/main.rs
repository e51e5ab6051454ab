use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use clipstack_core::clipboard::{ArboardClipboard, ClipboardSource, MemoryClipboard};
use clipstack_core::config::{daemon_info_path, load_settings};
use clipstack_core::paste::{CommandPaste, ToolPermission};
use clipstack_core::protocol::{DaemonInfo, Response};
use clipstack_core::watch::Watcher;
use clipstack_core::PasteCommitter;
use std::io::Write;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{error, info};

mod server;

use server::{handle_client, Daemon};

#[derive(Parser, Debug)]
#[command(name = "clipstackd", version, about = "clipstack clipboard history daemon")]
struct Cli {
    /// Settings file (defaults to $CLIPSTACK_CONFIG, then the config dir)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listening port on 127.0.0.1 (0 = auto)
    #[arg(long, default_value_t = 0)]
    port: u16,
    /// Clipboard poll interval in milliseconds (overrides settings)
    #[arg(long)]
    poll_ms: Option<u64>,
    /// Disable clipboard watcher (polling)
    #[arg(long, default_value_t = false)]
    no_watch: bool,
    /// Which clipboard to read and write
    #[arg(long, value_enum, default_value_t = ClipboardChoice::System)]
    clipboard: ClipboardChoice,
    /// Exit automatically after N milliseconds (for CI/testing)
    #[arg(long)]
    exit_after_ms: Option<u64>,
    /// Serve a one-shot Health response, then exit (binds to --port)
    #[arg(long, default_value_t = false)]
    health_once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClipboardChoice {
    System,
    /// In-process clipboard, for tests.
    Memory,
}

fn setup_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let settings = load_settings(cli.config.as_deref());
    let store = Arc::new(settings.open_store().context("opening history store")?);
    let clipboard: Arc<dyn ClipboardSource> = match cli.clipboard {
        ClipboardChoice::System => Arc::new(ArboardClipboard::new()),
        ClipboardChoice::Memory => Arc::new(MemoryClipboard::new()),
    };

    let listener = TcpListener::bind(("127.0.0.1", cli.port))
        .with_context(|| format!("binding 127.0.0.1:{}", cli.port))?;
    let port = listener.local_addr()?.port();
    DaemonInfo::current(port)
        .write_to(&daemon_info_path())
        .context("writing daemon info")?;

    if cli.health_once {
        if let Ok((mut stream, _addr)) = listener.accept() {
            let resp = Response::success(serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "now": OffsetDateTime::now_utc().unix_timestamp(),
            }));
            writeln!(stream, "{}", serde_json::to_string(&resp)?)?;
        }
        return Ok(());
    }
    if let Some(ms) = cli.exit_after_ms {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            std::process::exit(0);
        });
    }

    let stop = Arc::new(AtomicBool::new(false));
    if cli.no_watch {
        store.apply_retention(OffsetDateTime::now_utc());
    } else {
        let poll = cli
            .poll_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| settings.poll_interval());
        let watcher = Watcher::new(store.clone(), clipboard.clone())
            .with_poll_interval(poll)
            .with_retention_every(settings.retention_every()?);
        watcher.prime();
        watcher.spawn(stop.clone()).context("starting clipboard watcher")?;
    }

    let paste = CommandPaste::new(settings.paste_command());
    let permission = ToolPermission::for_command(&paste);
    let committer = PasteCommitter::new(store.clone(), clipboard, Arc::new(permission), Arc::new(paste))
        .with_settle(settings.paste_settle());
    let daemon = Arc::new(Daemon::new(store, committer));

    info!(port, "clipstackd listening on 127.0.0.1");
    for stream in listener.incoming() {
        match stream {
            Ok(s) => {
                let d = daemon.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(d, s) {
                        error!(error = %e, "client error");
                    }
                });
            }
            Err(e) => error!(error = %e, "accept error"),
        }
    }
    Ok(())
}
