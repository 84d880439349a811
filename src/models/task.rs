//! Task-related models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Due date attached to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Due {
    /// Due date in `YYYY-MM-DD` format
    pub date: String,
    /// Human-readable due string as entered by the user ("tomorrow", "every friday")
    #[serde(default)]
    pub string: String,
    /// Full timestamp for dues with a fixed time of day
    pub datetime: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Due {
    /// Whether this due date falls on or before `today`.
    pub fn is_on_or_before(&self, today: NaiveDate) -> bool {
        self.date
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(|d| d <= today)
            .unwrap_or(false)
    }
}

/// Task entity (REST v2 shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    pub due: Option<Due>,
    /// 1 (normal) to 4 (urgent)
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub comment_count: u32,
    pub project_id: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
}
