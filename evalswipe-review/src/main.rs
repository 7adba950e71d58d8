//! evalswipe - terminal trace review
//!
//! Starts or resumes a review session and reads reviewer commands from
//! stdin, one per line. Sessions are checkpointed to a SQLite store under the
//! root folder so an interrupted review can be resumed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evalswipe_common::config::{
    default_config_path, resolve_backend_url, resolve_reviewer_id, write_toml_config,
    LoggingConfig, RootFolderResolver, TomlConfig,
};
use evalswipe_common::{EventBus, ReviewEvent};
use evalswipe_review::backend::{BraintrustImportRequest, HttpBackend, InMemoryBackend, ReviewBackend};
use evalswipe_review::command::{Command, HELP};
use evalswipe_review::import::{parse_trace_file, upload_session_name, DEMO_SESSION_NAME};
use evalswipe_review::models::{SessionConfig, TraceSource};
use evalswipe_review::store::sqlite::STORE_FILE_NAME;
use evalswipe_review::store::SqliteStore;
use evalswipe_review::workflow::{FailStage, SubmitOutcome, UndoOutcome};
use evalswipe_review::{ReviewError, SessionManager, SessionView};

/// Command-line arguments for evalswipe
#[derive(Parser, Debug)]
#[command(name = "evalswipe")]
#[command(about = "Review LLM traces: pass, fail with open codes and axial tags, or defer")]
#[command(version)]
struct Args {
    /// Backend API base URL
    #[arg(long, env = "EVALSWIPE_BACKEND_URL")]
    backend_url: Option<String>,

    /// Folder holding the session checkpoint database
    #[arg(long, env = "EVALSWIPE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reviewer id recorded on annotations
    #[arg(long)]
    reviewer: Option<String>,

    /// Use an in-process backend instead of the HTTP API
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Start a session from a JSON file of traces
    Review {
        file: PathBuf,
        /// Ask the backend to shuffle trace order
        #[arg(long)]
        randomize: bool,
    },
    /// Start a demo session from a sample trace file
    Demo { file: PathBuf },
    /// Import traces from a Braintrust experiment
    Braintrust {
        #[arg(long)]
        project: String,
        #[arg(long)]
        experiment: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, env = "BRAINTRUST_API_KEY")]
        api_key: Option<String>,
    },
    /// Resume the checkpointed session
    Resume,
    /// Discard the checkpointed session
    Clear,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("evalswipe={0},evalswipe_review={0}", logging.level).into());

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut toml_config = TomlConfig::load_or_default(&config_path);
    init_tracing(&toml_config.logging)?;

    info!("Starting evalswipe {}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&toml_config)
        .resolve();
    let store_path = root_folder.join(STORE_FILE_NAME);
    let store = Arc::new(
        SqliteStore::open(&store_path)
            .await
            .context("Failed to open session store")?,
    );

    let reviewer_id = resolve_reviewer_id(args.reviewer.as_deref(), &toml_config);
    let offline_backend = args.offline.then(|| Arc::new(InMemoryBackend::new()));
    let backend: Arc<dyn ReviewBackend> = match &offline_backend {
        Some(backend) => {
            info!("Offline mode: annotations stay in this process");
            backend.clone()
        }
        None => {
            let url = resolve_backend_url(args.backend_url.as_deref(), &toml_config);
            info!("Backend: {}", url);
            Arc::new(HttpBackend::new(url).context("Failed to build HTTP client")?)
        }
    };

    let mut manager = SessionManager::new(backend, store, EventBus::default(), reviewer_id);
    let mut events = manager.events().subscribe();

    let view = match args.mode {
        Mode::Review { file, randomize } => {
            let traces = read_traces(&file).await?;
            let config = SessionConfig {
                randomize_order: randomize,
                ..SessionConfig::for_source(TraceSource::Upload)
            };
            manager
                .create_session(&upload_session_name(&file), traces, config)
                .await?
        }
        Mode::Demo { file } => {
            let traces = read_traces(&file).await?;
            manager
                .create_session(
                    DEMO_SESSION_NAME,
                    traces,
                    SessionConfig::for_source(TraceSource::Demo),
                )
                .await?
        }
        Mode::Braintrust {
            project,
            experiment,
            limit,
            api_key,
        } => {
            let api_key = api_key.or_else(|| toml_config.braintrust_api_key.clone());
            let request =
                BraintrustImportRequest::new(api_key.as_deref(), &project, &experiment, limit)?;
            manager.import_braintrust(&request).await?
        }
        Mode::Resume => match manager.restore_session().await {
            Some(view) => {
                if let (Some(backend), Some(session)) = (&offline_backend, manager.session()) {
                    backend
                        .seed(session.traces().as_slice(), session.tags().all())
                        .await;
                }
                view
            }
            None => {
                println!("No saved session to resume");
                return Ok(());
            }
        },
        Mode::Clear => {
            manager.clear_session().await?;
            println!("Session cleared");
            return Ok(());
        }
    };

    print_notices(&mut events);
    render_view(&manager, &view);
    run_review_loop(&mut manager, &mut events, &mut toml_config, &config_path).await
}

async fn read_traces(path: &Path) -> Result<Vec<evalswipe_review::models::Trace>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_trace_file(&raw)?)
}

async fn run_review_loop(
    manager: &mut SessionManager,
    events: &mut broadcast::Receiver<ReviewEvent>,
    toml_config: &mut TomlConfig,
    config_path: &Path,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type 'help' for commands.");

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        if let Err(e) = execute(manager, command, toml_config, config_path).await {
            match &e {
                ReviewError::Backend(_) => println!("Failed to save: {}", e),
                _ => println!("{}", e),
            }
            warn!(kind = e.kind(), error = %e, "Command failed");
        }
        print_notices(events);
    }

    info!("Review loop finished");
    Ok(())
}

async fn execute(
    manager: &mut SessionManager,
    command: Command,
    toml_config: &mut TomlConfig,
    config_path: &Path,
) -> Result<(), ReviewError> {
    match command {
        Command::Pass => {
            let view = manager.record_pass().await?;
            render_view(manager, &view);
        }
        Command::Defer => {
            let view = manager.record_defer().await?;
            render_view(manager, &view);
        }
        Command::Fail => {
            let draft = manager.begin_fail_flow()?;
            if !draft.open_code.is_empty() {
                println!("Current note: {}", draft.open_code);
            }
            if draft.stage == FailStage::AwaitingAxialTags {
                render_tags(manager);
                println!("Toggle tags with 't <id>', then 'apply'");
            } else {
                println!("Write an open code: 'now <note>' to tag it, 'later <note>' to skip tagging");
            }
        }
        Command::OpenCode { path, text } => match manager.submit_open_code(&text, path).await? {
            SubmitOutcome::AwaitingAxialTags => {
                render_tags(manager);
                println!("Toggle tags with 't <id>', then 'apply'");
            }
            SubmitOutcome::Recorded(_) => render_view(manager, &manager.view()),
        },
        Command::ToggleTag(tag_id) => {
            let selected = manager.toggle_axial_tag(&tag_id)?;
            println!("{} {}", if selected { "Selected" } else { "Unselected" }, tag_id);
        }
        Command::NewTag {
            name,
            description,
            color,
        } => {
            let tag = manager.create_tag(&name, &description, &color).await?;
            println!("Tag created: {} ({})", tag.name, tag.id);
        }
        Command::EditTag {
            id,
            name,
            description,
            color,
        } => {
            let tag = manager.update_tag(&id, &name, &description, &color).await?;
            println!("Tag updated: {} ({})", tag.name, tag.id);
        }
        Command::DeleteTag { id, untag_traces } => {
            let affected = manager.delete_tag(&id, untag_traces).await?;
            println!("Tag deleted; {} traces untagged", affected);
        }
        Command::MergeTags { source, target } => {
            let merge = manager.merge_tags(&source, &target).await?;
            println!(
                "Merged into {}; {} traces affected",
                merge.merged_tag.name, merge.traces_affected
            );
        }
        Command::ApplyTags => {
            let view = manager.commit_fail_with_tags().await?;
            render_view(manager, &view);
        }
        Command::Cancel => {
            if manager.cancel_fail_flow()? {
                println!("Fail cancelled");
            }
        }
        Command::Undo => match manager.undo().await? {
            UndoOutcome::Restored { .. } => {
                println!("Action undone");
                render_view(manager, &manager.view());
            }
            UndoOutcome::NothingToUndo => println!("Nothing to undo"),
        },
        Command::Next => {
            let view = manager.go_next().await?;
            render_view(manager, &view);
        }
        Command::Previous => {
            let view = manager.go_previous().await?;
            render_view(manager, &view);
        }
        Command::GoTo(index) => {
            let view = manager.go_to(index).await?;
            println!("Jumped to trace {}", index + 1);
            render_view(manager, &view);
        }
        Command::Tags => {
            manager.refresh_tags().await?;
            render_tags(manager);
        }
        Command::History { filter, sort } => {
            let entries = manager.history(filter, sort)?;
            if entries.is_empty() {
                println!("No traces match the selected filter.");
            }
            for entry in entries {
                println!("#{:<4} {:<20} {}", entry.index + 1, entry.trace_id, entry.status);
                println!("      Input: {}", entry.user_input);
                if let Some(note) = &entry.open_code {
                    println!("      Note: {}", note);
                }
                if !entry.tag_names.is_empty() {
                    println!("      Tags: {}", entry.tag_names.join(", "));
                }
            }
        }
        Command::Stats => {
            let stats = manager.history_stats()?;
            println!(
                "Total {}  Reviewed {}  Passed {}  Failed {}  Deferred {}  Unreviewed {}",
                stats.total,
                stats.reviewed,
                stats.passed,
                stats.failed,
                stats.deferred,
                stats.unreviewed
            );
        }
        Command::Export(path) => {
            let export = manager.export()?;
            let path = path.unwrap_or_else(|| PathBuf::from(export.file_name()));
            let json = export
                .to_pretty_json()
                .map_err(|e| ReviewError::Storage(e.into()))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| ReviewError::Storage(e.into()))?;
            println!("Session exported to {}", path.display());
        }
        Command::Reviewer(reviewer_id) => {
            manager.set_reviewer_id(reviewer_id.clone());
            toml_config.reviewer_id = Some(reviewer_id);
            match write_toml_config(toml_config, config_path) {
                Ok(()) => println!("Settings saved"),
                Err(e) => println!("Failed to save settings: {}", e),
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

/// Print whatever the manager published during the last command
fn print_notices(events: &mut broadcast::Receiver<ReviewEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(notice) = event.notice() {
                    println!("{}", notice);
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Dropped review events");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn render_view(manager: &SessionManager, view: &SessionView) {
    let progress = &view.progress;
    println!(
        "\n[{}/{} reviewed, {}%]  pass {}  fail {}  defer {}",
        progress.reviewed,
        progress.total,
        progress.percentage,
        progress.passed,
        progress.failed,
        progress.deferred
    );

    let Some(trace) = &view.current_trace else {
        if progress.total > 0 && progress.reviewed == progress.total {
            println!("All traces reviewed. Use 'history' or 'export'.");
        } else {
            println!("No more traces ahead. Use 'b', 'g <n>' or 'history' to revisit.");
        }
        return;
    };

    println!(
        "Trace {} of {}  ({})  {}",
        view.current_index + 1,
        progress.total,
        trace.id,
        trace.status().label()
    );
    if let Some(prompt) = &trace.system_prompt {
        println!("System: {}", prompt);
    }
    println!("User:   {}", trace.user_input);
    for step in &trace.intermediate_steps {
        println!("  [{}] {}", step.step_type, step.content);
    }
    println!("Agent:  {}", trace.agent_output);
    if let Some(note) = &trace.open_code {
        println!("Note:   {}", note);
    }
    if !trace.axial_tags.is_empty() {
        let names: Vec<&str> = match manager.session() {
            Some(session) => trace
                .axial_tags
                .iter()
                .map(|id| session.tags().display_name(id))
                .collect(),
            None => trace.axial_tags.iter().map(String::as_str).collect(),
        };
        println!("Tags:   {}", names.join(", "));
    }
}

fn render_tags(manager: &SessionManager) {
    let Some(session) = manager.session() else {
        return;
    };
    if session.tags().is_empty() {
        println!("No tags yet. Create your first tag with 'newtag'.");
        return;
    }
    let selected: &[String] = session
        .fail_draft()
        .map(|draft| draft.axial_tags.as_slice())
        .unwrap_or(&[]);
    for tag in session.tags().all() {
        let mark = if selected.contains(&tag.id) { "x" } else { " " };
        println!(
            "[{}] {:<14} {:<30} ({})  {}",
            mark, tag.id, tag.name, tag.usage_count, tag.description
        );
    }
}
