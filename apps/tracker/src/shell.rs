use std::{sync::Arc, time::Duration};

use anyhow::Result;
use client_core::TaskListSync;
use shared::domain::TaskId;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinSet,
    time::timeout,
};
use tracing::{debug, warn};

use crate::render::render;

/// How long `quit` waits for requests that are still in flight.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const HELP: &str = "\
commands:
  add <title>     create a task
  toggle <id>     flip a task between open and done
  delete <id>     remove a task
  reload          fetch the list again
  help            show this text
  quit            leave the shell
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Toggle(TaskId),
    Delete(TaskId),
    Reload,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" | "a" => ShellCommand::Add(rest.to_string()),
        "toggle" | "t" => ShellCommand::Toggle(required_id(verb, rest)?),
        "delete" | "d" | "rm" => ShellCommand::Delete(required_id(verb, rest)?),
        "reload" | "r" => ShellCommand::Reload,
        "help" | "?" => ShellCommand::Help,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

fn required_id(verb: &str, rest: &str) -> Result<TaskId, String> {
    if rest.is_empty() {
        return Err(format!("usage: {verb} <id>"));
    }
    rest.parse()
        .map_err(|_| format!("'{rest}' is not a task id"))
}

/// Interactive loop. Every intent runs on its own task so a slow request never
/// blocks input; the list is redrawn whenever the sync core publishes a change.
pub async fn run(sync: Arc<TaskListSync>) -> Result<()> {
    let mut events = sync.subscribe();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    let mut intents = JoinSet::new();

    spawn_intent(&mut intents, &sync, ShellCommand::Reload);
    draw(&sync, &mut stdout).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Some(ShellCommand::Quit)) => break,
                    Ok(Some(ShellCommand::Help)) => stdout.write_all(HELP.as_bytes()).await?,
                    Ok(Some(command)) => spawn_intent(&mut intents, &sync, command),
                    Ok(None) => draw(&sync, &mut stdout).await?,
                    Err(message) => {
                        stdout.write_all(format!("{message}\n").as_bytes()).await?;
                    }
                }
                stdout.flush().await?;
            }
            Some(_) = intents.join_next(), if !intents.is_empty() => {}
            event = events.recv() => match event {
                Ok(event) => {
                    debug!(?event, "list changed");
                    draw(&sync, &mut stdout).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "render fell behind list events");
                    draw(&sync, &mut stdout).await?;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    if !intents.is_empty() {
        let waiting = format!("waiting for {} pending request(s)…\n", intents.len());
        stdout.write_all(waiting.as_bytes()).await?;
        stdout.flush().await?;
    }
    let abandoned = drain_pending(&mut intents, SHUTDOWN_GRACE).await;
    if abandoned > 0 {
        let message = format!("gave up on {abandoned} request(s); their outcome is unknown\n");
        stdout.write_all(message.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Waits up to `grace` for the remaining intents, then aborts the rest.
/// Returns how many were aborted.
pub async fn drain_pending(intents: &mut JoinSet<()>, grace: Duration) -> usize {
    let finished = timeout(grace, async {
        while intents.join_next().await.is_some() {}
    })
    .await;
    if finished.is_ok() {
        return 0;
    }
    let abandoned = intents.len();
    warn!(abandoned, "aborting requests still in flight at shutdown");
    intents.abort_all();
    abandoned
}

fn spawn_intent(intents: &mut JoinSet<()>, sync: &Arc<TaskListSync>, command: ShellCommand) {
    let sync = Arc::clone(sync);
    intents.spawn(async move {
        let result = match command {
            ShellCommand::Add(title) => sync.create(&title).await.map(|_| ()),
            ShellCommand::Toggle(id) => sync.toggle(&id).await.map(|_| ()),
            ShellCommand::Delete(id) => sync.delete(&id).await.map(|_| ()),
            ShellCommand::Reload => sync.load().await.map(|_| ()),
            ShellCommand::Help | ShellCommand::Quit => Ok(()),
        };
        if let Err(err) = result {
            // already recorded on the list and published as an event
            debug!(error = %err, "shell intent failed");
        }
    });
}

async fn draw(sync: &TaskListSync, stdout: &mut io::Stdout) -> Result<()> {
    let frame = render(&sync.snapshot().await, sync.mode());
    stdout.write_all(frame.as_bytes()).await?;
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
