//! Lingflow CLI - submit linguistic workflow jobs and follow their progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use lingflow_core::application::{
    AuthSession, JobSubmitter, ProcessingFlag, ProgressConsumer, SubmitRequest,
};
use lingflow_core::domain::{LogEntry, LogLevel, LogSink, StreamState, TransportMode};
use lingflow_core::port::time_provider::SystemTimeProvider;
use lingflow_core::port::{ActiveJobStore, ArchiveAssembler, CredentialStore, JobApi, SourceFile};
use lingflow_infra_fs::{watch_credentials, FileStateStore, SessionLog, ZipAssembler};
use lingflow_infra_http::{BrowserPrompt, CallbackListener, HttpJobApi};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const CREDENTIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "lingflow")]
#[command(about = "Lingflow workflow client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Remote service URL
    #[arg(long, env = "LINGFLOW_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// State file path (defaults to the user config directory)
    #[arg(long, env = "LINGFLOW_STATE_FILE")]
    state_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to remote storage via the browser
    Login {
        /// Seconds to wait for the browser handoff
        #[arg(long, default_value = "120")]
        timeout: u64,
    },

    /// Drop the stored credential
    Logout,

    /// Show connection and pending-job state
    Status,

    /// Submit a job and follow its progress
    Submit {
        /// Workflow action (e.g. transcribe, translate, gloss)
        #[arg(short, long)]
        action: String,

        /// Instruction variant for the action
        #[arg(short, long)]
        instruction: String,

        /// Target language code
        #[arg(short, long)]
        language: String,

        /// Remote directory to process (reference mode)
        #[arg(long, conflicts_with = "dir")]
        base_dir: Option<String>,

        /// Local directory to pack and upload (upload mode)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print the job id and exit without following the stream
        #[arg(long)]
        no_follow: bool,
    },

    /// Reattach to a pending job's progress stream
    Resume,

    /// Cancel the pending job
    Cancel,

    /// Print the stored session log
    Log {
        /// Empty the log instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

fn init_tracing() {
    let log_format = std::env::var("LINGFLOW_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("lingflow=warn"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

fn print_entry(entry: &LogEntry) {
    let line = match entry.level {
        LogLevel::Info => entry.message.normal(),
        LogLevel::Success => entry.message.green(),
        LogLevel::Error => entry.message.red().bold(),
        LogLevel::Warning => entry.message.yellow(),
    };
    println!("{}", line);
}

/// Mirror sink entries to the terminal and the durable session log
/// until every sender is gone.
fn spawn_printer(sink: &LogSink, log: SessionLog) -> JoinHandle<()> {
    let mut rx = sink.subscribe();
    tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            print_entry(&entry);
            if let Err(e) = log.append(&entry) {
                tracing::warn!(error = %e, "Failed to persist log entry");
            }
        }
    })
}

fn state_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.state_file {
        Some(path) => Ok(path.clone()),
        None => FileStateStore::default_path()
            .ok_or_else(|| anyhow!("Could not determine a config directory")),
    }
}

fn state_store(cli: &Cli) -> Result<Arc<FileStateStore>> {
    Ok(Arc::new(FileStateStore::new(state_path(cli)?)))
}

/// The session log lives next to the state file.
fn session_log(cli: &Cli) -> Result<SessionLog> {
    Ok(SessionLog::new(state_path(cli)?.with_file_name("session.log")))
}

fn collect_files(dir: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .context("Walked file outside the selected directory")?
            .to_string_lossy()
            .replace('\\', "/");
        let contents = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        files.push(SourceFile::new(relative, contents));
    }
    tracing::debug!(count = files.len(), dir = %dir.display(), "Collected upload set");
    Ok(files)
}

async fn run_login(cli: &Cli, sink: Arc<LogSink>, timeout_secs: u64) -> Result<()> {
    let store = state_store(cli)?;
    let mut session = AuthSession::new(store.clone(), sink);

    if session.restore().await? {
        println!("{}", "Already connected".green());
        return Ok(());
    }

    // Two redundant completion paths feed one channel: the loopback
    // callback listener and the credential-file watcher. Whichever
    // lands first wins; the session absorbs the duplicate.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = CallbackListener::bind(tx.clone()).await?;
    let watcher = watch_credentials(store.clone(), tx, CREDENTIAL_POLL_INTERVAL);

    let prompt = BrowserPrompt::new(&cli.api_url, &listener.redirect_uri());
    session.connect(&prompt)?;
    println!(
        "If the browser did not open, visit:\n  {}",
        prompt.auth_url().cyan()
    );

    let signal = tokio::time::timeout(Duration::from_secs(timeout_secs), rx.recv())
        .await
        .map_err(|_| anyhow!("Timed out waiting for the browser handoff"))?
        .ok_or_else(|| anyhow!("Handoff channel closed unexpectedly"))?;
    session.observe(signal).await?;

    watcher.abort();
    drop(listener);
    Ok(())
}

async fn run_status(cli: &Cli) -> Result<()> {
    let store = state_store(cli)?;
    println!("{}", "Lingflow Status".cyan().bold());
    println!();
    println!("  {} {}", "Service:".bold(), cli.api_url);
    println!("  {} {}", "State file:".bold(), store.path().display());

    match CredentialStore::get(store.as_ref()).await? {
        Some(_) => println!("  {} {}", "Storage:".bold(), "CONNECTED".green()),
        None => println!("  {} {}", "Storage:".bold(), "DISCONNECTED".yellow()),
    }
    match ActiveJobStore::get(store.as_ref()).await? {
        Some(job) => println!("  {} {} ({})", "Pending job:".bold(), job.id, job.mode),
        None => println!("  {} none", "Pending job:".bold()),
    }
    Ok(())
}

fn report_stream_end(state: StreamState) -> Result<()> {
    match state {
        StreamState::Done => Ok(()),
        StreamState::Failed => Err(anyhow!("Job failed")),
        StreamState::Cancelled => Ok(()),
        // EOF without a terminal sentinel: the job id is still
        // persisted, so a later `resume` reattaches.
        _ => {
            println!(
                "{}",
                "Stream ended before completion; run `lingflow resume` to reattach".yellow()
            );
            Ok(())
        }
    }
}

/// Follow the stream until a terminal sentinel, EOF, or Ctrl-C.
async fn follow(consumer: &mut ProgressConsumer) -> Result<()> {
    let outcome = tokio::select! {
        state = consumer.follow() => Some(state?),
        _ = tokio::signal::ctrl_c() => None,
    };
    match outcome {
        Some(state) => report_stream_end(state),
        None => {
            consumer.cancel().await?;
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_submit(
    cli: &Cli,
    sink: Arc<LogSink>,
    action: String,
    instruction: String,
    language: String,
    base_dir: Option<String>,
    dir: Option<PathBuf>,
    no_follow: bool,
) -> Result<()> {
    let (mode, files) = match (&base_dir, &dir) {
        (Some(_), None) => (TransportMode::Reference, Vec::new()),
        (None, Some(dir)) => (TransportMode::Upload, collect_files(dir)?),
        _ => anyhow::bail!("Pass exactly one of --base-dir or --dir"),
    };

    let store = state_store(cli)?;
    let api: Arc<dyn JobApi> = Arc::new(HttpJobApi::new(&cli.api_url)?);
    let assembler: Arc<dyn ArchiveAssembler> = Arc::new(ZipAssembler::new());
    let processing = ProcessingFlag::new();

    let submitter = JobSubmitter::new(
        api.clone(),
        store.clone(),
        assembler,
        sink.clone(),
        processing.clone(),
    );
    let request = SubmitRequest {
        mode,
        action,
        instruction,
        language,
        base_dir,
        files,
    };

    let Some(job_id) = submitter.submit(request).await else {
        anyhow::bail!("Job was not submitted");
    };
    println!("{}", format!("Job {} accepted", job_id).green().bold());

    if no_follow {
        return Ok(());
    }
    let mut consumer =
        ProgressConsumer::new(api, store, sink, processing, Arc::new(SystemTimeProvider));
    consumer.open(&job_id, mode).await?;
    follow(&mut consumer).await
}

async fn run_resume(cli: &Cli, sink: Arc<LogSink>) -> Result<()> {
    let store = state_store(cli)?;
    let api: Arc<dyn JobApi> = Arc::new(HttpJobApi::new(&cli.api_url)?);
    let mut consumer = ProgressConsumer::new(
        api,
        store,
        sink,
        ProcessingFlag::new(),
        Arc::new(SystemTimeProvider),
    );

    match consumer.resume_if_pending().await? {
        Some(job_id) => {
            println!("{}", format!("Resuming job {}", job_id).cyan());
            follow(&mut consumer).await
        }
        None => {
            println!("No pending job");
            Ok(())
        }
    }
}

async fn run_cancel(cli: &Cli, sink: Arc<LogSink>) -> Result<()> {
    let store = state_store(cli)?;
    let api: Arc<dyn JobApi> = Arc::new(HttpJobApi::new(&cli.api_url)?);
    let mut consumer = ProgressConsumer::new(
        api,
        store,
        sink,
        ProcessingFlag::new(),
        Arc::new(SystemTimeProvider),
    );

    if !consumer.cancel().await? {
        println!("No pending job");
    }
    Ok(())
}

async fn run(cli: &Cli, sink: Arc<LogSink>) -> Result<()> {
    match &cli.command {
        Commands::Login { timeout } => run_login(cli, sink, *timeout).await,
        Commands::Logout => {
            let store = state_store(cli)?;
            let mut session = AuthSession::new(store, sink);
            session.logout().await?;
            Ok(())
        }
        Commands::Status => run_status(cli).await,
        Commands::Submit {
            action,
            instruction,
            language,
            base_dir,
            dir,
            no_follow,
        } => {
            run_submit(
                cli,
                sink,
                action.clone(),
                instruction.clone(),
                language.clone(),
                base_dir.clone(),
                dir.clone(),
                *no_follow,
            )
            .await
        }
        Commands::Resume => run_resume(cli, sink).await,
        Commands::Cancel => run_cancel(cli, sink).await,
        Commands::Log { clear } => {
            let log = session_log(cli)?;
            if *clear {
                log.clear()?;
                sink.clear();
                println!("Log cleared");
            } else {
                for entry in log.read_all()? {
                    print_entry(&entry);
                }
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let sink = Arc::new(LogSink::new());
    let printer = spawn_printer(&sink, session_log(&cli)?);

    let result = run(&cli, sink.clone()).await;

    // Closing the last sink handle ends the printer's channel; waiting
    // on it flushes any entry still in flight.
    drop(sink);
    let _ = printer.await;
    result
}
