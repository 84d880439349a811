//! Productivity stats from the sync API

use anyhow::{Context, Result};
use serde::Deserialize;

use super::client::TodoistClient;

/// Subset of the completed/get_stats payload we read.
#[derive(Debug, Deserialize)]
pub struct ProductivityStats {
    #[serde(default)]
    pub karma: f64,
    #[serde(default)]
    pub completed_count: u64,
    #[serde(default)]
    days_items: Vec<DayItems>,
}

#[derive(Debug, Deserialize)]
struct DayItems {
    #[serde(default)]
    total_completed: u32,
}

impl ProductivityStats {
    /// Tasks completed today; the first days_items entry is today.
    pub fn completed_today(&self) -> u32 {
        self.days_items
            .first()
            .map(|d| d.total_completed)
            .unwrap_or(0)
    }
}

/// Fetch productivity stats. Doubles as a cheap token validity probe.
pub async fn completed_stats(client: &TodoistClient) -> Result<ProductivityStats> {
    let resp = client.sync_get("/completed/get_stats").await?;
    let stats: ProductivityStats = resp
        .json()
        .await
        .context("Failed to parse productivity stats")?;
    Ok(stats)
}
