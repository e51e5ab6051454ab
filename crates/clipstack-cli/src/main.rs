use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clipstack_core::clipboard::ArboardClipboard;
use clipstack_core::config::load_settings;
use clipstack_core::protocol::ClipSummary;
use clipstack_core::{ClipId, CoreError};
use std::path::PathBuf;
use std::sync::Arc;

mod backend;
mod picker;

use backend::{Backend, DaemonClient, LocalBackend};
use picker::PickOutcome;

const MANUAL_PASTE_HINT: &str = "Copied. Paste manually (Ctrl+V)";

#[derive(Parser)]
#[command(name = "clipstack", version, about = "clipstack clipboard history")]
struct Cli {
    /// Settings file (defaults to $CLIPSTACK_CONFIG, then the config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Use the store directly instead of the daemon
    #[arg(long, global = true, default_value_t = false)]
    local: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent entries, newest first
    List {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search entries by substring ("ima" also finds images)
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Add a new text entry (or read from STDIN if omitted)
    Add { text: Option<String> },
    /// Pin or unpin an entry
    Pin { id: String },
    /// Remove unpinned entries (all entries with --all)
    Clear {
        #[arg(long)]
        all: bool,
    },
    /// Copy an entry back to the clipboard
    Copy {
        id: String,
        /// Also send the paste keystroke
        #[arg(long)]
        paste: bool,
    },
    /// Interactive picker
    Pick {
        /// Paste into the focused window after choosing
        #[arg(long)]
        paste: bool,
    },
}

fn setup_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_backend(cli: &Cli) -> Result<Box<dyn Backend>> {
    if !cli.local {
        if let Some(client) = DaemonClient::discover() {
            return Ok(Box::new(client));
        }
    }
    let settings = load_settings(cli.config.as_deref());
    // the CLI exits right after a copy, so written content is handed off
    let local = LocalBackend::open(&settings, Arc::new(ArboardClipboard::short_lived()))
        .context("opening history store")?;
    Ok(Box::new(local))
}

fn parse_id(s: &str) -> Result<ClipId> {
    s.parse::<ClipId>().map_err(anyhow::Error::from)
}

fn print_items(items: &[ClipSummary], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for c in items {
            println!(
                "{}\t{}\t{}",
                c.id,
                if c.pinned { "*" } else { " " },
                c.preview
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();
    let backend = open_backend(&cli)?;

    match cli.command {
        Commands::List { json, limit } => {
            let mut items = backend.list(None)?.items;
            if let Some(n) = limit {
                items.truncate(n);
            }
            print_items(&items, json)?;
        }
        Commands::Search { query, json } => {
            print_items(&backend.list(Some(&query))?.items, json)?;
        }
        Commands::Add { text } => {
            let text = match text {
                Some(t) => t,
                None => {
                    use std::io::{self, Read};
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let out = backend.add(&text)?;
            if out.added {
                println!("added {}", out.id);
            } else {
                println!("exists {}", out.id);
            }
        }
        Commands::Pin { id } => {
            let id = parse_id(&id)?;
            if backend.toggle_pin(id)? {
                println!("pinned {}", id);
            } else {
                println!("unpinned {}", id);
            }
        }
        Commands::Clear { all } => {
            let removed = backend.clear(all)?;
            println!("cleared {}", removed);
        }
        Commands::Copy { id, paste } => {
            let id = parse_id(&id)?;
            match backend.commit(id, paste) {
                Ok(()) => println!("copied {}", id),
                Err(CoreError::PermissionRequired) => println!("{}", MANUAL_PASTE_HINT),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Pick { paste } => match picker::run_picker_default(backend.as_ref(), paste)? {
            PickOutcome::Committed(id) => println!("{}", id),
            PickOutcome::PasteManually(_) => println!("{}", MANUAL_PASTE_HINT),
            PickOutcome::Dismissed => {}
        },
    }

    Ok(())
}
