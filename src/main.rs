use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use std::path::PathBuf;
use todostore::{IntentQueue, NewTask, RequestState, RowEvent, Snapshot, StoreConfig, TaskQuery, TaskRow, TaskStore, TodoTask};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Local to-do list backed by a reactive SQLite task store")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Directory holding the task database (default: platform data dir)
    #[arg(short, long, env = "TODO_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Skip compacting the database on open
    #[arg(long)]
    no_compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List active tasks (favorites first) or completed tasks
    List {
        #[arg(short, long)]
        completed: bool,
        /// Print tasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change a task's title and description
    Edit {
        id: String,
        title: String,
        /// New description (keeps the current one if omitted)
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Mark a task completed
    Done { id: String },

    /// Mark a task active again
    Undone { id: String },

    /// Mark a task as favorite
    Fav { id: String },

    /// Remove the favorite mark
    Unfav { id: String },

    /// Delete a task permanently
    Rm { id: String },

    /// Interactive session driving rows by number: tap, check, icon
    Shell {
        /// Start on the completed list
        #[arg(short, long)]
        completed: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.store_path {
        Some(path) => StoreConfig::new(path),
        None => StoreConfig::default(),
    }
    .compact_on_open(!cli.no_compact);

    let store = TaskStore::open(config.clone())
        .with_context(|| format!("Failed to open task store at {}", config.path.display()))?;

    let result = run(&store, cli.command).await;
    finish(result, store.close())
}

/// A failed command keeps its own error; a close failure after it is only logged
fn finish(result: Result<()>, close: todostore::Result<()>) -> Result<()> {
    match result {
        Ok(()) => close.context("Failed to close task store"),
        Err(e) => {
            if let Err(close_err) = close {
                warn!(error = %close_err, "Failed to close task store");
            }
            Err(e)
        }
    }
}

async fn run(store: &TaskStore, command: Commands) -> Result<()> {
    match command {
        Commands::Add { title, description } => {
            require_title(&title)?;
            let task = store
                .add(NewTask::new(title).with_description(description))
                .await
                .context("Failed to add task")?;
            println!("Added {}", task.id);
        }
        Commands::List { completed, json } => {
            let query = query_for(completed);
            let tasks = store.list(query).await.context("Failed to list tasks")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                print_rows(&tasks, query);
            }
        }
        Commands::Edit { id, title, description } => {
            require_title(&title)?;
            let description = match description {
                Some(d) => d,
                None => {
                    let current = store
                        .get(&id)
                        .await?
                        .ok_or_else(|| eyre!("Task not found: {}", id))?;
                    current.description
                }
            };
            store
                .update(&id, &title, &description)
                .await
                .context("Failed to update task")?;
            println!("Updated {}", id);
        }
        Commands::Done { id } => {
            store.set_completed(&id, true).await.context("Failed to complete task")?;
        }
        Commands::Undone { id } => {
            store.set_completed(&id, false).await.context("Failed to reopen task")?;
        }
        Commands::Fav { id } => {
            store.set_favorite(&id, true).await.context("Failed to favorite task")?;
        }
        Commands::Unfav { id } => {
            store.set_favorite(&id, false).await.context("Failed to unfavorite task")?;
        }
        Commands::Rm { id } => {
            store.delete(&id).await.context("Failed to delete task")?;
            println!("Deleted {}", id);
        }
        Commands::Shell { completed } => shell(store, query_for(completed)).await?,
    }

    Ok(())
}

/// The store accepts any title; the CLI refuses blank ones
fn require_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(eyre!("Task title cannot be empty"));
    }
    Ok(())
}

fn query_for(completed: bool) -> TaskQuery {
    if completed { TaskQuery::Completed } else { TaskQuery::Active }
}

fn print_rows(tasks: &[TodoTask], query: TaskQuery) {
    if tasks.is_empty() {
        println!("{}", format!("No {} tasks", query).dimmed());
        return;
    }

    let show_active = query == TaskQuery::Active;
    for (i, task) in tasks.iter().enumerate() {
        println!(
            "{:>3}. {}  {}",
            i + 1,
            TaskRow::new(task, show_active).render(),
            task.id.dimmed()
        );
    }
}

const SHELL_HELP: &str = "commands: add <title> | tap <n> | check <n> | icon <n> | view active|completed | help | quit";

/// Line-oriented session over a live subscription
///
/// Row numbers refer to the most recently printed list. Row events go through
/// `TaskRow::intent`, so taps behave exactly like the on-screen row would.
async fn shell(store: &TaskStore, query: TaskQuery) -> Result<()> {
    let mut subscription = store.subscribe(query);
    let mut shown: Vec<TodoTask> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", SHELL_HELP.dimmed());

    loop {
        if subscription.has_changed()
            && let Some(snapshot) = subscription.next().await
        {
            if !print_snapshot(snapshot, subscription.query(), &mut shown) {
                break;
            }
        }

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let (cmd, arg) = match line.trim().split_once(' ') {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line.trim(), ""),
        };

        let outcome: Result<()> = match cmd {
            "" => Ok(()),
            "quit" | "exit" => break,
            "help" => {
                println!("{}", SHELL_HELP.dimmed());
                Ok(())
            }
            "add" => match require_title(arg) {
                Ok(()) => store.add(NewTask::new(arg)).await.map(|_| ()).map_err(Into::into),
                Err(e) => Err(e),
            },
            "view" => match arg {
                "active" => {
                    subscription = store.read_active();
                    Ok(())
                }
                "completed" => {
                    subscription = store.read_completed();
                    Ok(())
                }
                other => Err(eyre!("Unknown view: {}", other)),
            },
            "tap" => row_event(store, &shown, subscription.query(), arg, RowEvent::Tap).await,
            "check" => row_event(store, &shown, subscription.query(), arg, RowEvent::Checkbox).await,
            "icon" => row_event(store, &shown, subscription.query(), arg, RowEvent::Trailing).await,
            other => Err(eyre!("Unknown command: {}", other)),
        };

        if let Err(e) = outcome {
            println!("{}", format!("error: {:#}", e).red());
        }
    }

    Ok(())
}

/// Print one snapshot and remember its rows; returns false once the store is gone
fn print_snapshot(snapshot: Snapshot, query: TaskQuery, shown: &mut Vec<TodoTask>) -> bool {
    println!("{}", format!("-- {} tasks --", query).bold());
    match snapshot {
        RequestState::Success(tasks) => {
            print_rows(&tasks, query);
            *shown = tasks;
            true
        }
        RequestState::Error(msg) => {
            println!("{}", msg.red());
            shown.clear();
            false
        }
        RequestState::Loading => {
            println!("{}", "Loading...".dimmed());
            true
        }
    }
}

async fn row_event(store: &TaskStore, shown: &[TodoTask], query: TaskQuery, arg: &str, event: RowEvent) -> Result<()> {
    let index: usize = arg.parse().with_context(|| format!("Not a row number: {:?}", arg))?;
    let task = index
        .checked_sub(1)
        .and_then(|i| shown.get(i))
        .ok_or_else(|| eyre!("No row {}", index))?;

    let mut queue = IntentQueue::default();
    TaskRow::new(task, query == TaskQuery::Active).handle(event, &mut queue);

    for selected in queue.flush(store).await? {
        println!("{} {}", selected.title.bold(), selected.id.dimmed());
        if selected.has_description() {
            println!("  {}", selected.description);
        }
    }

    Ok(())
}
