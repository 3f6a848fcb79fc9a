//! # Share Converter - Main Entry Point
//!
//! Questo è il punto di ingresso della CLI, che fa le veci del front end desktop.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (su stderr, stdout resta per il JSON)
//! - Caricamento della configurazione e `--init-config`
//! - Submission dei file e consumo degli eventi di stato
//! - Modalità interattiva: comandi da stdin (`pause`, `resume`, `cancel`, `add`, `quit`)
//! - Ctrl-C annulla tutti i job in corso
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (`RUST_LOG`, oppure INFO / DEBUG con `--verbose`)
//! 3. Carica la config (default se il file non esiste)
//! 4. Espande le directory con `--recursive` e sottomette il batch
//! 5. Inoltra gli eventi (JSON su stdout oppure progress bar) finché tutti i batch sono completi
//!
//! ## Esempio di utilizzo:
//! ```bash
//! share-converter ~/Videos/IMG_0001.MOV ~/Pictures/IMG_0002.HEIC
//! share-converter ~/Videos --recursive --json
//! share-converter --interactive --config ./share-converter.json
//! ```

use anyhow::Result;
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use share_converter::file_manager::FileManager;
use share_converter::progress::{BatchStats, ProgressManager};
use share_converter::{Config, JobManager, JsonMessage};

#[derive(Parser)]
#[command(name = "share-converter")]
#[command(about = "Convert videos to MP4 and HEIC photos to JPEG, ready to share")]
struct Args {
    /// Files to convert (directories with --recursive)
    paths: Vec<String>,

    /// Configuration file (JSON); defaults to the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,

    /// Emit one JSON event per line on stdout
    #[arg(long)]
    json: bool,

    /// Expand directories to every supported file below them
    #[arg(short, long)]
    recursive: bool,

    /// Read pause/resume/cancel/add/quit commands from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Interactive command read from stdin
#[derive(Debug, PartialEq)]
enum Command {
    Pause,
    Resume,
    Cancel(String),
    Add(Vec<String>),
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = split_words(line).into_iter();
        let verb = words.next().unwrap_or_default();
        let rest: Vec<String> = words.collect();

        match verb.to_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "quit" | "exit" => Ok(Self::Quit),
            "cancel" if rest.len() == 1 => Ok(Self::Cancel(rest[0].clone())),
            "add" if !rest.is_empty() => Ok(Self::Add(rest)),
            "cancel" => Err(anyhow::anyhow!("usage: cancel <path>")),
            "add" => Err(anyhow::anyhow!("usage: add <path>...")),
            other => Err(anyhow::anyhow!("unknown command: {}", other)),
        }
    }
}

/// Split on whitespace, keeping double-quoted runs together
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("share-converter").join("config.json"))
}

/// Expand directories when `recursive` is set; anything else is passed through
fn expand_paths(raw: &[String], recursive: bool) -> Vec<String> {
    let mut paths = Vec::new();
    for entry in raw {
        let path = FileManager::normalize_source(entry);
        if recursive && path.is_dir() {
            let found = FileManager::find_media_files(&path);
            info!("Found {} media files in {}", found.len(), path.display());
            paths.extend(found.into_iter().map(|p| p.to_string_lossy().into_owned()));
        } else {
            paths.push(entry.clone());
        }
    }
    paths
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config_path = args.config.clone().or_else(default_config_path);

    if args.init_config {
        let path = config_path
            .ok_or_else(|| anyhow::anyhow!("No configuration directory available, pass --config"))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Config::default().save_to_file(&path).await?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = match &config_path {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    config.validate()?;

    let paths = expand_paths(&args.paths, args.recursive);
    if paths.is_empty() && !args.interactive {
        return Err(anyhow::anyhow!("No files to convert"));
    }

    let (manager, mut events) = JobManager::new(config, Handle::current());
    let progress = if args.json {
        ProgressManager::hidden()
    } else {
        ProgressManager::new()
    };
    let mut stats = BatchStats::new();
    let mut pending_batches = HashSet::new();

    if !paths.is_empty() {
        pending_batches.insert(manager.submit(&paths));
    }

    let (command_tx, mut commands) = mpsc::unbounded_channel();
    if args.interactive {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        if command_tx.send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
        });
    } else {
        drop(command_tx);
    }

    let mut input_open = args.interactive;
    while input_open || !pending_batches.is_empty() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling all jobs");
                manager.shutdown();
                input_open = false;
            }
            command = commands.recv(), if input_open => match command {
                Some(Command::Pause) => manager.pause(),
                Some(Command::Resume) => manager.resume(),
                Some(Command::Cancel(path)) => {
                    if !manager.cancel(&path) {
                        warn!("Not in flight: {}", path);
                    }
                }
                Some(Command::Add(raw)) => {
                    let paths = expand_paths(&raw, args.recursive);
                    pending_batches.insert(manager.submit(&paths));
                }
                Some(Command::Quit) => {
                    manager.shutdown();
                    input_open = false;
                }
                None => input_open = false,
            },
            event = events.recv() => {
                let Some(event) = event else { break };
                stats.observe(&event);
                if args.json {
                    event.emit();
                } else if let Some(record) = event.status() {
                    progress.observe(record);
                }
                if let JsonMessage::BatchComplete { batch } = event {
                    pending_batches.remove(&batch);
                }
            }
        }
    }

    progress.finish(&stats.format_summary());
    if !args.json {
        info!("{}", stats.format_summary());
    }

    if stats.has_failures() {
        return Err(anyhow::anyhow!("{} conversions failed", stats.jobs_failed));
    }
    Ok(())
}
