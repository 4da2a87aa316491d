mod config;
mod render;
mod shell;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpTodoApi, SyncMode, TaskListSync};
use shared::domain::TaskId;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, Overrides};

#[derive(Parser, Debug)]
#[command(about = "Keep a to-do list in sync with a remote collection")]
struct Cli {
    /// Collection root, e.g. http://127.0.0.1:3000
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// `optimistic` or `synchronized`
    #[arg(long, global = true)]
    mode: Option<SyncMode>,
    /// Tasks to fetch on load; 0 fetches all
    #[arg(long, global = true)]
    limit: Option<u32>,
    #[arg(long, global = true)]
    user_id: Option<i64>,
    /// Settings file, defaults to ./tracker.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the list and exit
    List,
    /// Create a task
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
    /// Flip a task between open and done
    Toggle { id: TaskId },
    /// Remove a task
    Delete { id: TaskId },
    /// Interactive session (the default)
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?.apply(Overrides {
        base_url: cli.base_url,
        mode: cli.mode,
        limit: cli.limit,
        user_id: cli.user_id,
    });

    let api = match settings.timeout() {
        Some(timeout) => HttpTodoApi::with_timeout(&settings.base_url, timeout),
        None => HttpTodoApi::new(&settings.base_url),
    }
    .with_context(|| format!("cannot use base url '{}'", settings.base_url))?;
    info!(base_url = %api.base_url(), mode = %settings.mode, "tracker starting");

    let sync = Arc::new(TaskListSync::new(Arc::new(api), settings.sync_options()));

    let command = cli.command.unwrap_or(Command::Shell);
    if let Command::Shell = command {
        return shell::run(sync).await;
    }

    sync.load().await?;
    match command {
        Command::List | Command::Shell => {}
        Command::Add { title } => {
            let task = sync.create(&title.join(" ")).await?;
            println!("created {}", task.id);
        }
        Command::Toggle { id } => {
            let task = sync.toggle(&id).await?;
            let state = if task.completed { "done" } else { "open" };
            println!("{} is now {state}", task.id);
        }
        Command::Delete { id } => match sync.delete(&id).await? {
            Some(task) => println!("deleted {}", task.id),
            None => println!("no task {id}"),
        },
    }
    print!("{}", render::render(&sync.snapshot().await, sync.mode()));
    Ok(())
}
