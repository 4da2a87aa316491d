use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::domain::{normalize_title, UserId};
use storage::Storage;

const SAMPLE_TITLES: &[&str] = &[
    "Water the plants",
    "Renew library card",
    "Book dentist appointment",
    "Back up laptop",
    "Reply to landlord",
];

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/todos.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert tasks; sample titles are used when none are given
    Seed {
        #[arg(long)]
        user_id: Option<i64>,
        titles: Vec<String>,
    },
    /// Print every stored task
    List {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Delete every stored task
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed { user_id, titles } => {
            let titles: Vec<String> = if titles.is_empty() {
                SAMPLE_TITLES.iter().map(|t| t.to_string()).collect()
            } else {
                titles
            };
            for raw in titles {
                let Some(title) = normalize_title(&raw) else {
                    eprintln!("skipping blank title");
                    continue;
                };
                let task = storage
                    .insert_task(&title, false, user_id.map(UserId))
                    .await?;
                println!("created id={} title={:?}", task.id, task.title);
            }
        }
        Command::List { limit } => {
            for task in storage.list_tasks(limit).await? {
                let mark = if task.completed { 'x' } else { ' ' };
                println!("[{mark}] {:>4}  {}", task.id, task.title);
            }
        }
        Command::Clear => {
            let removed = storage.clear_tasks().await?;
            println!("removed {removed} tasks");
        }
    }

    Ok(())
}
