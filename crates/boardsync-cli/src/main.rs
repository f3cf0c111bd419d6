use anyhow::{Result, anyhow, bail};
use boardsync::{Status, SyncEngine, SyncEngineBuilder, TaskId, UndoOutcome, builder};
use clap::Parser;
use colored::{ColoredString, Colorize};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Interactive client for a boardsync task service.
#[derive(Parser)]
#[command(name = "boardsync", version, about)]
struct Cli {
    /// Base URL of the task service.
    #[arg(long, env = "BOARDSYNC_API_URL", default_value = builder::DEFAULT_BASE_URL)]
    url: String,
}

/// Setup tracing + log integration
fn setup_logging() {
    LogTracer::init().expect("Failed to set LogTracer");
    let fmt_layer = fmt::layer().with_target(true);
    let filter = EnvFilter::from_default_env();
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let args = Cli::parse();

    let engine = SyncEngineBuilder::new().base_url(&args.url).connect()?;
    println!(
        "connected to {}, type 'help' for commands",
        args.url.as_str().bold()
    );
    repl(engine).await
}

async fn repl(engine: SyncEngine) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("board> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match run_command(&engine, line).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("{} {e:#}", "error:".red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Runs one REPL command. Returns true when the session should end.
async fn run_command(engine: &SyncEngine, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();

    match command {
        "ls" | "list" => print_board(engine).await,
        "add" => {
            let status = parse_status(rest.first().copied().unwrap_or("not-started"))?;
            let task = engine.create_task(status).await;
            println!("{} {} in {}", "created".green(), task.id, status);
        }
        "title" => {
            let (prefix, title) = rest
                .split_first()
                .ok_or_else(|| anyhow!("usage: title <id> <new title>"))?;
            if title.is_empty() {
                bail!("usage: title <id> <new title>");
            }
            let id = resolve_id(engine, prefix).await?;
            engine.rename(&id, title.join(" ")).await;
            println!("{} {}", "retitled".green(), id);
        }
        "mv" => {
            let [prefix, status] = rest.as_slice() else {
                bail!("usage: mv <id> <status>");
            };
            let status = parse_status(status)?;
            let id = resolve_id(engine, prefix).await?;
            engine.move_to(&id, status).await;
            println!("{} {} to {}", "moved".green(), id, status);
        }
        "rm" => {
            let [prefix] = rest.as_slice() else {
                bail!("usage: rm <id>");
            };
            let id = resolve_id(engine, prefix).await?;
            engine.remove(&id).await;
            println!("{} {}", "removed".green(), id);
        }
        "undo" => report_outcome("undo", "undid", engine.undo().await),
        "redo" => report_outcome("redo", "redid", engine.redo().await),
        "help" => print_help(),
        "quit" | "exit" => return Ok(true),
        other => bail!("unknown command '{other}', try 'help'"),
    }
    Ok(false)
}

fn report_outcome(verb: &str, past: &str, outcome: UndoOutcome) {
    match outcome {
        UndoOutcome::Applied(id) => println!("{} {}", past.green(), id),
        UndoOutcome::RevealedFirst(id) => {
            println!("{} {id}, run the command again to apply", "revealed".yellow());
        }
        UndoOutcome::Nothing => println!("nothing to {verb}"),
    }
}

async fn print_board(engine: &SyncEngine) {
    for (status, tasks) in engine.listing().await {
        println!("{}", status_banner(status));
        if tasks.is_empty() {
            println!("  {}", "-".dimmed());
            continue;
        }
        for task in tasks {
            println!("  {}  {}", short_id(&task.id).dimmed(), task.title);
        }
    }
}

fn status_banner(status: Status) -> ColoredString {
    let label = status.as_str().to_uppercase();
    match status {
        Status::NotStarted => label.as_str().white(),
        Status::Planned => label.as_str().cyan(),
        Status::InProgress => label.as_str().yellow(),
        Status::Testing => label.as_str().magenta(),
        Status::Done => label.as_str().green(),
    }
}

fn short_id(id: &TaskId) -> &str {
    let raw = id.as_str();
    &raw[..raw.len().min(8)]
}

fn parse_status(raw: &str) -> Result<Status> {
    Status::parse(raw).ok_or_else(|| {
        anyhow!(
            "unknown status '{raw}', expected one of: {}",
            Status::ALL.map(|s| s.as_str()).join(", ")
        )
    })
}

fn print_help() {
    println!("  ls                   show the board");
    println!("  add [status]         create a task (default not-started)");
    println!("  title <id> <text>    retitle a task");
    println!("  mv <id> <status>     move a task to another column");
    println!("  rm <id>              delete a task");
    println!("  undo / redo          step through local edit history");
    println!("  quit                 leave");
}

/// Resolves a unique id prefix the way git resolves short hashes.
async fn resolve_id(engine: &SyncEngine, prefix: &str) -> Result<TaskId> {
    let snapshot = engine.snapshot().await;
    let mut matches = snapshot
        .keys()
        .filter(|id| id.as_str().starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id.clone()),
        (Some(_), Some(_)) => bail!("id prefix '{prefix}' is ambiguous"),
        (None, _) => bail!("no task matches id '{prefix}'"),
    }
}
