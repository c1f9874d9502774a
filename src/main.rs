// Copyright 2026 Folio Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use folio::cli;
use folio::cli::read_cmd::ReadFormat;
use folio::config::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "folio",
    about = "folio — terminal reader for web-novel chapters",
    version,
    after_help = "Run 'folio <command> --help' for details on each command.\nRun 'folio' with no command to enter interactive mode."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file (default: ~/.folio/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (default: ~/.folio)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Series base URL the chapter slug is appended to
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog chapters, optionally filtered by title or slug
    List {
        /// Case-insensitive substring filter
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
        /// Only show chapters with a cached copy
        #[arg(long)]
        cached: bool,
    },
    /// Fetch a chapter and print it
    Read {
        /// Chapter slug or search term
        chapter: String,
        /// Refetch even if a cached copy exists
        #[arg(long)]
        fresh: bool,
        /// How to print the chapter
        #[arg(long, value_enum, default_value = "pretty")]
        format: ReadFormat,
    },
    /// Read the chapter after the last one read
    Next,
    /// Read the chapter before the last one read
    Prev,
    /// Prefetch chapters into the cache
    Fetch {
        /// Chapter slugs or search terms
        chapters: Vec<String>,
        /// Prefetch the whole catalog
        #[arg(long)]
        all: bool,
        /// Refetch even if cached copies exist
        #[arg(long)]
        fresh: bool,
        /// Parallel fetches (default from config)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Inspect or clear the chapter cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show configuration and stored-data summary
    Status,
    /// Check local files and probe the relays
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and on-disk size
    Stats,
    /// Clear cached chapters (one chapter, or everything)
    Clear {
        /// Chapter to drop (omit to clear all)
        chapter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("FOLIO_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("FOLIO_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("FOLIO_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("FOLIO_NO_COLOR", "1");
    }

    let default_directive = if cli.verbose {
        "folio=debug"
    } else {
        "folio=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_directive.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Completions must work without a config or home directory.
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "folio", &mut std::io::stdout());
        return Ok(());
    }

    let result = match load_settings(&cli) {
        Err(e) => Err(e),
        Ok(settings) => match cli.command {
            // No subcommand → launch interactive mode
            None => cli::repl::run(&settings).await,

            Some(Commands::List { ref search, cached }) => {
                cli::list_cmd::run(&settings, search.as_deref(), cached).await
            }
            Some(Commands::Read {
                ref chapter,
                fresh,
                format,
            }) => cli::read_cmd::run(&settings, chapter, fresh, format).await,
            Some(Commands::Next) => cli::read_cmd::run_relative(&settings, 1).await,
            Some(Commands::Prev) => cli::read_cmd::run_relative(&settings, -1).await,
            Some(Commands::Fetch {
                ref chapters,
                all,
                fresh,
                concurrency,
            }) => cli::fetch_cmd::run(&settings, chapters, all, fresh, concurrency).await,
            Some(Commands::Cache { ref action }) => match action {
                CacheAction::Stats => cli::cache_cmd::run_stats(&settings),
                CacheAction::Clear { chapter } => {
                    cli::cache_cmd::run_clear(&settings, chapter.as_deref()).await
                }
            },
            Some(Commands::Status) => cli::status_cmd::run(&settings).await,
            Some(Commands::Doctor) => cli::doctor::run(&settings).await,
            Some(Commands::Completions { .. }) => unreachable!("handled above"),
        },
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}

/// Load settings and overlay the command-line overrides.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    if let Some(base) = &cli.base_url {
        settings.base_url = base.clone();
    }
    settings.finalize()
}
