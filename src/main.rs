//! Todoist CLI - Lightweight Todoist client
//!
//! A terminal-based Todoist client with OAuth login and focus timers.

mod api;
mod auth;
mod certificate;
mod config;
mod models;
mod notify;
mod timer;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "todoist-cli")]
#[command(about = "Lightweight CLI client for Todoist", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Todoist
    Login {
        /// Force interactive login even if a cached token exists
        #[arg(short, long)]
        force: bool,
    },

    /// Log out and clear cached credentials
    Logout,

    /// Show current authentication status
    Status,

    /// List all active tasks
    List,

    /// List tasks due today or overdue
    Today,

    /// Show one task with its comments
    Show {
        /// Task ID (from `list` output)
        task_id: String,
    },

    /// Create a task
    Create {
        /// Task content
        content: String,

        /// Start a focus timer on the new task, in minutes
        #[arg(long, value_name = "MINUTES", value_parser = clap::value_parser!(u32).range(1..))]
        start: Option<u32>,
    },

    /// Complete one or more tasks
    Complete {
        /// Task IDs (from `list` output)
        #[arg(required = true)]
        task_ids: Vec<String>,
    },

    /// Add a comment to a task
    Comment {
        /// Task ID (from `list` output)
        task_id: String,

        /// Comment text
        text: String,
    },

    /// Start a focus timer
    Start {
        /// Duration in minutes
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        minutes: u32,

        /// Label for an unbound timer
        #[arg(short, long)]
        name: Option<String>,

        /// Task ID to bind the timer to
        #[arg(short, long)]
        task: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Login { force } => {
            tracing::info!("Starting authentication flow...");
            auth::login(force).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::List => {
            api::list_tasks().await?;
        }
        Commands::Today => {
            api::list_today().await?;
        }
        Commands::Show { task_id } => {
            api::show_task(&task_id).await?;
        }
        Commands::Create { content, start } => {
            let task = api::create_task(&content).await?;
            if let Some(minutes) = start {
                timer::run(minutes, None, Some(task.id)).await?;
            }
        }
        Commands::Complete { task_ids } => {
            api::complete_tasks(&task_ids).await?;
        }
        Commands::Comment { task_id, text } => {
            api::add_comment(&task_id, &text).await?;
        }
        Commands::Start {
            minutes,
            name,
            task,
        } => {
            timer::run(minutes, name, task).await?;
        }
    }

    Ok(())
}
