//! Comment-related models

use serde::{Deserialize, Serialize};

/// Comment attached to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub task_id: Option<String>,
    pub content: String,
    pub posted_at: Option<String>,
}
