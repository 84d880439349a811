//! Comment endpoints of the REST API

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::client::TodoistClient;
use crate::models::Comment;
use crate::timer::Annotator;

/// Fetch all comments on a task.
pub async fn fetch_comments(client: &TodoistClient, task_id: &str) -> Result<Vec<Comment>> {
    let resp = client
        .rest_get(&format!("/comments?task_id={}", task_id))
        .await?;
    let comments: Vec<Comment> = resp.json().await.context("Failed to parse comments")?;
    Ok(comments)
}

/// Add a comment to a task.
pub async fn add_comment(client: &TodoistClient, task_id: &str, content: &str) -> Result<Comment> {
    let body = serde_json::json!({ "task_id": task_id, "content": content });
    let resp = client.rest_post("/comments", &body).await?;
    let comment: Comment = resp.json().await.context("Failed to parse comment")?;
    Ok(comment)
}

/// Add a comment from the command line.
pub async fn comment(task_id: &str, content: &str) -> Result<()> {
    let client = TodoistClient::new()?;
    add_comment(&client, task_id, content).await?;
    println!("Comment added to task {}", task_id);
    Ok(())
}

#[async_trait]
impl Annotator for TodoistClient {
    async fn append_note(&self, task_id: &str, text: &str) -> Result<()> {
        add_comment(self, task_id, text).await?;
        Ok(())
    }
}
