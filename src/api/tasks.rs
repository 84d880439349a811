//! Task endpoints of the REST API

use anyhow::{Context, Result};
use chrono::Local;

use super::client::TodoistClient;
use crate::models::Task;

/// Fetch all active tasks.
pub async fn fetch_tasks(client: &TodoistClient) -> Result<Vec<Task>> {
    let resp = client.rest_get("/tasks").await?;
    let tasks: Vec<Task> = resp.json().await.context("Failed to parse task list")?;
    Ok(tasks)
}

/// Fetch a single task by id.
pub async fn fetch_task(client: &TodoistClient, task_id: &str) -> Result<Task> {
    let resp = client.rest_get(&format!("/tasks/{}", task_id)).await?;
    let task: Task = resp.json().await.context("Failed to parse task")?;
    Ok(task)
}

/// Create a task with the given content, returning the new task.
pub async fn create_task(client: &TodoistClient, content: &str) -> Result<Task> {
    let body = serde_json::json!({ "content": content });
    let resp = client.rest_post("/tasks", &body).await?;
    let task: Task = resp.json().await.context("Failed to parse created task")?;
    Ok(task)
}

/// Close (complete) a task.
pub async fn close_task(client: &TodoistClient, task_id: &str) -> Result<()> {
    client
        .rest_post_empty(&format!("/tasks/{}/close", task_id))
        .await?;
    Ok(())
}

/// List all active tasks.
pub async fn list_tasks() -> Result<()> {
    let client = TodoistClient::new()?;
    let tasks = fetch_tasks(&client).await?;
    print_tasks(&tasks);
    Ok(())
}

/// List tasks due today or overdue.
pub async fn list_today() -> Result<()> {
    let client = TodoistClient::new()?;
    let today = Local::now().date_naive();
    let tasks: Vec<Task> = fetch_tasks(&client)
        .await?
        .into_iter()
        .filter(|t| t.due.as_ref().is_some_and(|d| d.is_on_or_before(today)))
        .collect();
    if tasks.is_empty() {
        println!("Nothing due today.");
        return Ok(());
    }
    print_tasks(&tasks);
    Ok(())
}

/// Show one task with its comments.
pub async fn show_task(task_id: &str) -> Result<()> {
    let client = TodoistClient::new()?;
    let task = fetch_task(&client, task_id).await?;

    println!("[{}] {}", task.id, task.content);
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    if let Some(due) = &task.due {
        match &due.datetime {
            Some(dt) => println!("  due: {}", dt),
            None => println!("  due: {}", due.date),
        }
        if due.is_recurring {
            println!("  recurring: {}", due.string);
        }
    }
    if task.priority > 1 {
        println!("  priority: p{}", 5u8.saturating_sub(task.priority));
    }
    if !task.labels.is_empty() {
        println!("  labels: {}", task.labels.join(", "));
    }

    if task.comment_count > 0 {
        let comments = super::comments::fetch_comments(&client, task_id).await?;
        println!("  comments:");
        for comment in &comments {
            match &comment.posted_at {
                Some(ts) => println!("    {} {}", ts, comment.content),
                None => println!("    {}", comment.content),
            }
        }
    }

    Ok(())
}

/// Create a task from the command line.
pub async fn create(content: &str) -> Result<Task> {
    let client = TodoistClient::new()?;
    let task = create_task(&client, content).await?;
    println!("Created task [{}] {}", task.id, task.content);
    Ok(task)
}

/// Complete one or more tasks.
pub async fn complete(task_ids: &[String]) -> Result<()> {
    let client = TodoistClient::new()?;
    for task_id in task_ids {
        close_task(&client, task_id).await?;
        println!("Completed task {}", task_id);
    }
    Ok(())
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in tasks {
        // REST priority 4 is the UI's p1
        let priority = if task.priority > 1 {
            format!(" p{}", 5u8.saturating_sub(task.priority))
        } else {
            String::new()
        };
        let due = task
            .due
            .as_ref()
            .map(|d| format!("  (due {})", d.date))
            .unwrap_or_default();
        println!("[{}]{} {}{}", task.id, priority, task.content, due);
    }
}
