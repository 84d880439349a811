//! API client module for Todoist

pub mod client;
mod comments;
mod stats;
mod tasks;

use anyhow::Result;

pub use client::TodoistClient;
pub use stats::{completed_stats, ProductivityStats};
pub use tasks::{fetch_task, fetch_tasks};

use crate::models::Task;

/// List all active tasks
pub async fn list_tasks() -> Result<()> {
    tasks::list_tasks().await
}

/// List tasks due today or overdue
pub async fn list_today() -> Result<()> {
    tasks::list_today().await
}

/// Show one task with its comments
pub async fn show_task(task_id: &str) -> Result<()> {
    tasks::show_task(task_id).await
}

/// Create a task, printing and returning it
pub async fn create_task(content: &str) -> Result<Task> {
    tasks::create(content).await
}

/// Complete one or more tasks
pub async fn complete_tasks(task_ids: &[String]) -> Result<()> {
    tasks::complete(task_ids).await
}

/// Add a comment to a task
pub async fn add_comment(task_id: &str, content: &str) -> Result<()> {
    comments::comment(task_id, content).await
}
