//! filemover daemon
//!
//! Serves a sandboxed directory to remote peers and runs interactive file
//! selection sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::files::{DirectoryEntry, FileResponse, ListCursor, RemoteFileService};
use daemon::selection::{RootSink, SelectionSession, SendDispatcher};
use daemon::server::SessionServer;
use daemon::ui::BrowseApp;
use protocol::messages::FileRequest;
use protocol::OpenIntent;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// filemover - serve a directory and pick files to send.
#[derive(Parser, Debug)]
#[command(name = "filemover")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory to serve (overrides config and FILEMOVER_ROOT)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Comma separated files offered for selection
    #[arg(short = 'f', long = "files", global = true, value_name = "LIST")]
    pub files: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Accept remote sessions
    Serve {
        /// Address to listen on
        #[arg(long, short)]
        listen: Option<String>,
    },
    /// Select files on the local terminal
    Browse,
    /// List a directory under the root
    Ls {
        /// Path relative to the root
        #[arg(default_value = "/")]
        path: String,

        /// Index of the first entry to show
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Maximum number of entries to show
        #[arg(long, default_value = "100")]
        count: usize,
    },
    /// Describe one path under the root
    Stat {
        /// Path relative to the root
        path: String,
    },
    /// Print a file under the root
    Cat {
        /// Path relative to the root
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides, then flags
    config.apply_env_overrides();
    if let Some(root) = &cli.root {
        config.files.root = root.clone();
    }
    if let Some(files) = &cli.files {
        config.files.candidates = files.clone();
    }
    if let Commands::Serve {
        listen: Some(addr),
    } = &cli.command
    {
        config.server.listen_addr = addr.clone();
    }

    // Validate configuration
    config.validate()?;

    // Initialize tracing. The terminal UI owns the screen, so browse logs to a file.
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.daemon.log_level.to_lowercase()
    };
    let _log_guard = init_tracing(&level, matches!(cli.command, Commands::Browse), &config)?;

    let root = config.resolved_root()?;
    tracing::debug!(root = %root.display(), "Resolved root");

    match cli.command {
        Commands::Serve { .. } => serve(&config, root).await?,
        Commands::Browse => browse(&config, root).await?,
        Commands::Ls {
            path,
            offset,
            count,
        } => {
            let service = RemoteFileService::new(&root);
            let cursor = listing(&service, &FileRequest::list(path))?;
            let page = cursor.page(offset, count);
            for entry in page.entries {
                println!("{}", format_entry(entry));
            }
            if !page.end_of_list {
                println!(
                    "... {} more (use --offset {})",
                    remaining(&cursor, offset, count),
                    offset + page.entries.len() as u64
                );
            }
        }
        Commands::Stat { path } => {
            let service = RemoteFileService::new(&root);
            let cursor = listing(&service, &FileRequest::stat(path))?;
            for entry in cursor.entries() {
                println!("{}", format_entry(entry));
            }
        }
        Commands::Cat { path } => {
            let service = RemoteFileService::new(&root);
            let request = FileRequest::read(path, OpenIntent::read_only());
            match service.dispatch(&request)? {
                FileResponse::File(mut file) => {
                    let mut stdout = std::io::stdout().lock();
                    std::io::copy(&mut file, &mut stdout)
                        .with_context(|| format!("Failed to read {}", request.path))?;
                }
                FileResponse::Listing(_) => anyhow::bail!("{} did not open a file", request.path),
            }
        }
    }

    Ok(())
}

/// Set up the global subscriber.
///
/// With `to_file` the output goes to `filemover.log` in the data directory
/// and the returned guard must be held until exit.
fn init_tracing(
    level: &str,
    to_file: bool,
    config: &Config,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if !to_file {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let log_dir = &config.daemon.data_dir;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::never(log_dir, "filemover.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Run the session server until SIGINT or SIGTERM.
async fn serve(config: &Config, root: PathBuf) -> anyhow::Result<()> {
    ensure_dir(&root)?;

    let service = Arc::new(RemoteFileService::new(&root));
    let dispatcher = SendDispatcher::new(RootSink::new(&root));
    let server = SessionServer::bind(
        &config.server.listen_addr,
        service,
        config.candidate_files(),
        dispatcher,
        config.server.max_sessions,
    )
    .await?;

    tracing::info!(
        listen = %server.local_addr()?,
        root = %root.display(),
        candidates = config.candidate_files().len(),
        "filemover serving"
    );

    let shutdown = CancellationToken::new();
    let server_task = tokio::spawn(server.run(shutdown.clone()));

    wait_for_shutdown_signal().await?;
    tracing::info!("Received shutdown signal");
    shutdown.cancel();

    server_task.await??;
    Ok(())
}

/// Run one selection session on the local terminal.
async fn browse(config: &Config, root: PathBuf) -> anyhow::Result<()> {
    ensure_dir(&root)?;

    let dispatcher = SendDispatcher::new(RootSink::new(&root));
    let (session, input) = SelectionSession::open(&config.candidate_files(), &root, dispatcher)
        .with_context(|| format!("Failed to read {}", root.display()))?;

    let app = BrowseApp::new().context("Failed to set up terminal")?;
    let state = app.run(session, input).await?;

    if let Some(report) = state.report() {
        println!(
            "Sent {} of {} file(s), {} bytes",
            report.sent.len(),
            report.attempted(),
            report.total_bytes()
        );
        if !report.all_sent() {
            for failed in &report.failed {
                eprintln!("Failed to send {}: {}", failed.name, failed.error);
            }
            anyhow::bail!("{} file(s) could not be sent", report.failed.len());
        }
    }
    Ok(())
}

fn ensure_dir(root: &Path) -> anyhow::Result<()> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("Root directory not found: {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Root is not a directory: {}", root.display());
    }
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}

/// Format one entry as an `ls -l` style line.
fn format_entry(entry: &DirectoryEntry) -> String {
    let kind = if entry.is_dir { 'd' } else { '-' };
    format!(
        "{}{} {:>10} {}",
        kind,
        format_permissions(entry.permissions()),
        entry.size,
        entry.name
    )
}

fn format_permissions(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|(bit, c)| if mode & bit != 0 { *c } else { '-' })
        .collect()
}

/// Run a list or stat request through the same dispatch remote sessions use.
fn listing(service: &RemoteFileService, request: &FileRequest) -> anyhow::Result<ListCursor> {
    match service.dispatch(request)? {
        FileResponse::Listing(cursor) => Ok(cursor),
        FileResponse::File(_) => anyhow::bail!("{} did not produce a listing", request.method),
    }
}

fn remaining(cursor: &ListCursor, offset: u64, count: usize) -> u64 {
    (cursor.len() as u64).saturating_sub(offset.saturating_add(count as u64))
}
