//! Countdown timers, optionally bound to a task
//!
//! The engine lives in `engine`; this module wires it to the terminal and
//! to the Todoist API for the `start` command.

mod engine;

pub use engine::{
    run_countdown, Annotator, NoAnnotation, TimerCallbacks, TimerOutcome, TimerSession,
};

use std::io::{stdout, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use tokio_util::sync::CancellationToken;

use crate::api::{self, TodoistClient};
use crate::notify;

/// Render countdown progress on a single terminal line.
struct ConsoleCallbacks {
    label: String,
}

impl TimerCallbacks for ConsoleCallbacks {
    fn on_start(&mut self, ends_at: DateTime<Local>) {
        println!("{} until {}", self.label, ends_at.format("%H:%M:%S"));
    }

    fn on_update(&mut self, remaining: Duration) {
        let _ = execute!(stdout(), MoveToColumn(0), Clear(ClearType::CurrentLine));
        print!("{} remaining", format_remaining(remaining));
        let _ = stdout().flush();
    }

    fn on_complete(&mut self) {
        let _ = execute!(stdout(), MoveToColumn(0), Clear(ClearType::CurrentLine));
    }

    fn on_error(&mut self, err: &anyhow::Error) {
        eprintln!("Warning: could not annotate the task: {:#}", err);
    }
}

fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}m {:02}s", secs / 60, secs % 60)
}

/// Run the `start` command.
pub async fn run(minutes: u32, name: Option<String>, task_id: Option<String>) -> Result<()> {
    // Ctrl-C cancels the countdown instead of killing the process mid-line.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (outcome, label) = match task_id {
        Some(task_id) => {
            let client = TodoistClient::new()?;
            let task = api::fetch_task(&client, &task_id)
                .await
                .with_context(|| format!("No task with id {}", task_id))?;
            let session = TimerSession {
                label: task.content,
                task_id: Some(task_id),
                minutes,
            };
            let mut callbacks = ConsoleCallbacks {
                label: session.label.clone(),
            };
            let outcome = run_countdown(&session, &mut callbacks, &client, &cancel).await;
            (outcome, session.label)
        }
        None => {
            let session = TimerSession {
                label: name.unwrap_or_else(|| "Anonymous timer".to_string()),
                task_id: None,
                minutes,
            };
            let mut callbacks = ConsoleCallbacks {
                label: session.label.clone(),
            };
            let outcome = run_countdown(&session, &mut callbacks, &NoAnnotation, &cancel).await;
            (outcome, session.label)
        }
    };

    match outcome {
        TimerOutcome::Completed => {
            notify::send_completion("Todoist Timer", &format!("Timer complete for: {label}"));
            println!("Time's up! Timer complete for: {label}");
        }
        TimerOutcome::Cancelled => {
            println!();
            println!("Timer cancelled.");
        }
    }

    Ok(())
}
