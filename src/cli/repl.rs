//! Interactive mode, entered when the binary runs with no subcommand.

use crate::cli::output::Styled;
use crate::config::Settings;
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub async fn run(settings: &Settings) -> Result<()> {
    let s = Styled::new();
    eprintln!(
        "{} v{} — chapter reader",
        s.bold("folio"),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("Type 'help' for commands, 'quit' to leave.");
    eprintln!();

    let mut editor = DefaultEditor::new()?;
    let history_path = settings.data_dir().ok().map(|d| d.join("history.txt"));
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("folio> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match dispatch(settings, line).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("  Error: {e:#}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
    Ok(())
}

/// Execute one REPL line. Returns true when the session should end.
async fn dispatch(settings: &Settings, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(false);
    };
    let rest: Vec<String> = parts.map(str::to_string).collect();

    match command {
        "quit" | "exit" | "q" => return Ok(true),
        "help" | "?" => print_help(),
        "list" | "ls" => {
            let query = rest.join(" ");
            let query = (!query.is_empty()).then_some(query);
            crate::cli::list_cmd::run(settings, query.as_deref(), false).await?;
        }
        "search" | "s" => {
            if rest.is_empty() {
                eprintln!("  Usage: search <query>");
            } else {
                crate::cli::list_cmd::run(settings, Some(&rest.join(" ")), false).await?;
            }
        }
        "open" | "o" | "read" | "r" => {
            if rest.is_empty() {
                eprintln!("  Usage: open <chapter>");
            } else {
                crate::cli::read_cmd::run(
                    settings,
                    &rest.join(" "),
                    false,
                    crate::cli::read_cmd::ReadFormat::Pretty,
                )
                .await?;
            }
        }
        "next" | "n" => crate::cli::read_cmd::run_relative(settings, 1).await?,
        "prev" | "p" => crate::cli::read_cmd::run_relative(settings, -1).await?,
        "fetch" => {
            if rest.is_empty() {
                eprintln!("  Usage: fetch <chapters...>");
            } else {
                crate::cli::fetch_cmd::run(settings, &rest, false, false, None).await?;
            }
        }
        "cache" => match rest.first().map(String::as_str) {
            None | Some("stats") => crate::cli::cache_cmd::run_stats(settings)?,
            Some("clear") => {
                crate::cli::cache_cmd::run_clear(settings, rest.get(1).map(String::as_str))
                    .await?
            }
            Some(other) => eprintln!("  Unknown cache action '{other}'. Try: stats, clear"),
        },
        "status" => crate::cli::status_cmd::run(settings).await?,
        "doctor" => crate::cli::doctor::run(settings).await?,
        other => eprintln!("  Unknown command '{other}'. Type 'help' for commands."),
    }
    Ok(false)
}

fn print_help() {
    println!("  list [query]        Browse the catalog, filtered by title or slug");
    println!("  search <query>      Same filter, query required");
    println!("  open <chapter>      Fetch and display a chapter ('read' works too)");
    println!("  next / prev         Move one chapter from the last one read");
    println!("  fetch <chapters>    Prefetch chapters into the cache");
    println!("  cache [stats]       Show cache figures");
    println!("  cache clear [ch]    Drop one cached chapter, or everything");
    println!("  status              Configuration and stored-data summary");
    println!("  doctor              Check files and probe the relays");
    println!("  quit                Leave");
}
