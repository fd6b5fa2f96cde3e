//! rpcf: find RPC contract methods in a Java codebase.
//!
//! This CLI provides access to rpcfinder functionality for:
//! - Fuzzy searching contract methods by name
//! - Listing every indexed contract method
//! - Remembering selected methods and recalling them first
//! - Watching the tree and keeping the index current

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpcfinder::highlight::highlight;
use rpcfinder::provider::JavaSourceProvider;
use rpcfinder::search::SearchHit;
use rpcfinder::{Config, FileChangeEvent, JsonHistoryStore, MethodRecord, ScanOutcome, Workspace};
use serde::Serialize;

/// Exit codes for the CLI
///
/// - 0: Success
/// - 1: Not found (valid query, no results)
/// - 2: Error (invalid input, missing file, etc.)
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const NOT_FOUND: u8 = 1;
    pub const ERROR: u8 = 2;
}

/// Markers placed around matched characters by `search --highlight`
const HIGHLIGHT_OPEN: &str = "[";
const HIGHLIGHT_CLOSE: &str = "]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Find RPC contract methods in a Java codebase
#[derive(Parser)]
#[command(name = "rpcf")]
#[command(author, version = env!("RPCF_VERSION"), about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Project root (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuzzy search contract methods by name
    Search {
        /// Characters of the method name, in order
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Mark matched characters in each method name
        #[arg(long)]
        highlight: bool,
    },

    /// List every indexed contract method
    List,

    /// Remember a method as selected
    Select {
        /// Qualified class name (e.g. "com.acme.user.UserServiceImpl")
        class: String,

        /// Method name
        method: String,
    },

    /// Show recently selected methods that still exist
    Recent {
        /// Also list every other method after the recent ones
        #[arg(long)]
        all: bool,
    },

    /// Index, then keep the index current until Ctrl+C
    Watch,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match run(cli.command, &cli.root, format, cli.quiet) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if format == OutputFormat::Json {
                let error_json = serde_json::json!({
                    "error": "CommandFailed",
                    "message": format!("{:#}", e),
                });
                eprintln!("{}", error_json);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn run(command: Commands, root: &Path, format: OutputFormat, quiet: bool) -> Result<u8> {
    match command {
        Commands::Search {
            query,
            limit,
            highlight,
        } => cmd_search(root, &query, limit, highlight, format, quiet),
        Commands::List => cmd_list(root, format, quiet),
        Commands::Select { class, method } => cmd_select(root, &class, &method, format, quiet),
        Commands::Recent { all } => cmd_recent(root, all, format, quiet),
        Commands::Watch => cmd_watch(root, format, quiet),
    }
}

/// Parse the tree under `root` and run the first scan.
fn open_workspace(root: &Path) -> Result<Workspace> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve root directory {}", root.display()))?;

    let config = Config::load(&root);
    let provider = Arc::new(JavaSourceProvider::new(&root, config.clone()));
    provider.load().context("Failed to read source files")?;

    let workspace = Workspace::new(&root, provider, config);
    match workspace.initialize() {
        Some(ScanOutcome::Completed { methods, .. }) => {
            tracing::debug!("Workspace {} ready with {} methods", root.display(), methods);
        }
        outcome => anyhow::bail!("Index did not become ready ({:?})", outcome),
    }
    Ok(workspace)
}

#[derive(Serialize)]
struct HitOutput<'a> {
    #[serde(flatten)]
    hit: &'a SearchHit,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlighted: Option<String>,
}

fn cmd_search(
    root: &Path,
    query: &str,
    limit: usize,
    with_highlight: bool,
    format: OutputFormat,
    quiet: bool,
) -> Result<u8> {
    let workspace = open_workspace(root)?;

    let mut hits = workspace.search_scored(query);
    hits.truncate(limit);

    let marked = |name: &str| with_highlight.then(|| highlight(name, query, HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE));

    if format == OutputFormat::Json {
        let output: Vec<_> = hits
            .iter()
            .map(|hit| HitOutput {
                hit,
                highlighted: marked(&hit.record.method_name),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !quiet {
        for hit in &hits {
            let name = marked(&hit.record.method_name).unwrap_or_else(|| hit.record.method_name.clone());
            println!(
                "{:<40} {:<50} {}:{} (score: {})",
                name,
                hit.record.class_name,
                relative(workspace.root(), &hit.record.file_path).display(),
                hit.record.text_offset,
                hit.score
            );
        }
    }

    if hits.is_empty() {
        Ok(exit_codes::NOT_FOUND)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}

fn cmd_list(root: &Path, format: OutputFormat, quiet: bool) -> Result<u8> {
    let workspace = open_workspace(root)?;

    let mut records = workspace.list_all();
    records.sort_by(|a, b| {
        a.class_name
            .cmp(&b.class_name)
            .then_with(|| a.text_offset.cmp(&b.text_offset))
    });

    print_records(workspace.root(), &records, format, quiet)?;
    Ok(exit_codes::SUCCESS)
}

fn cmd_select(root: &Path, class: &str, method: &str, format: OutputFormat, quiet: bool) -> Result<u8> {
    let workspace = open_workspace(root)?;

    let Some(record) = workspace.repository().find(class, method) else {
        if format == OutputFormat::Json {
            println!(
                "{}",
                serde_json::json!({
                    "error": "NotFound",
                    "message": format!("No contract method {}#{}", class, method),
                })
            );
        } else if !quiet {
            eprintln!("No contract method {}#{}", class, method);
        }
        return Ok(exit_codes::NOT_FOUND);
    };

    let store = JsonHistoryStore::for_root(workspace.root());
    let mut history = workspace
        .open_history(store)
        .context("Failed to load method history")?;
    history
        .select(&record)
        .context("Failed to save method history")?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else if !quiet {
        println!("Selected {}", record);
    }
    Ok(exit_codes::SUCCESS)
}

fn cmd_recent(root: &Path, all: bool, format: OutputFormat, quiet: bool) -> Result<u8> {
    let workspace = open_workspace(root)?;

    let store = JsonHistoryStore::for_root(workspace.root());
    let history = workspace
        .open_history(store)
        .context("Failed to load method history")?;
    let reconciled = workspace.recent(&history);

    if format == OutputFormat::Json {
        let output = if all {
            serde_json::to_value(&reconciled)?
        } else {
            serde_json::to_value(&reconciled.recent)?
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !quiet {
        print_records(workspace.root(), &reconciled.recent, format, quiet)?;
        if all {
            println!("{}", "-".repeat(40));
            print_records(workspace.root(), &reconciled.remaining, format, quiet)?;
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn cmd_watch(root: &Path, format: OutputFormat, quiet: bool) -> Result<u8> {
    let workspace = open_workspace(root)?;
    if !quiet && format == OutputFormat::Text {
        println!("Indexed {} contract methods", workspace.repository().len());
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)).context("Failed to install Ctrl+C handler")?;

    workspace.start().context("Failed to start indexing thread")?;
    let watcher = workspace.watcher().context("Failed to start watching")?;

    if !quiet && format == OutputFormat::Text {
        println!("Watching for changes... (Ctrl+C to stop)");
    }

    while running.load(Ordering::SeqCst) {
        let batch = watcher.wait_timeout(Duration::from_millis(500));
        if batch.is_empty() {
            continue;
        }
        if !quiet {
            report_changes(workspace.root(), &batch, format)?;
        }
        workspace.enqueue_changes(batch)?;
    }

    workspace.shutdown();
    Ok(exit_codes::SUCCESS)
}

fn report_changes(root: &Path, batch: &[FileChangeEvent], format: OutputFormat) -> Result<()> {
    for event in batch {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
            OutputFormat::Text => match &event.destination {
                Some(dest) => println!(
                    "{:?}: {} -> {}",
                    event.kind,
                    relative(root, &event.path).display(),
                    relative(root, dest).display()
                ),
                None => println!("{:?}: {}", event.kind, relative(root, &event.path).display()),
            },
        }
    }
    Ok(())
}

fn print_records(root: &Path, records: &[MethodRecord], format: OutputFormat, quiet: bool) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if !quiet {
        for record in records {
            println!(
                "{:<40} {:<50} {}:{}",
                record.method_name,
                record.class_name,
                relative(root, &record.file_path).display(),
                record.text_offset
            );
        }
    }
    Ok(())
}

fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
