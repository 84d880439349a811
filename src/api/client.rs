//! Authenticated HTTP client for the Todoist APIs
//!
//! Wraps reqwest::Client with bearer token injection.

use anyhow::{bail, Context, Result};

use crate::auth::TokenStore;
use crate::config::Config;

const REST_BASE: &str = "https://api.todoist.com/rest/v2";
const SYNC_BASE: &str = "https://api.todoist.com/sync/v9";

/// Authenticated client for the Todoist REST and sync APIs.
pub struct TodoistClient {
    http: reqwest::Client,
    config: Config,
}

impl TodoistClient {
    /// Load config and build the client.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        if config.get_access_token().is_none() {
            bail!("Not logged in. Run 'todoist-cli login'.");
        }
        Ok(Self {
            http: reqwest::Client::new(),
            config,
        })
    }

    fn token(&self) -> Result<String> {
        let token = self
            .config
            .get_access_token()
            .context("Not logged in. Run 'todoist-cli login'.")?;
        if token.is_expired() {
            bail!("Access token expired. Run 'todoist-cli login'.");
        }
        Ok(token.token)
    }

    /// GET request to the REST API.
    pub async fn rest_get(&self, path: &str) -> Result<reqwest::Response> {
        let token = self.token()?;
        let url = format!("{}{}", REST_BASE, path);
        tracing::debug!("REST GET {}", url);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("REST GET {} failed", url))?;

        check_response(resp, &url).await
    }

    /// POST request with a JSON body to the REST API.
    pub async fn rest_post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let token = self.token()?;
        let url = format!("{}{}", REST_BASE, path);
        tracing::debug!("REST POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("REST POST {} failed", url))?;

        check_response(resp, &url).await
    }

    /// POST request with no body to the REST API (task close).
    pub async fn rest_post_empty(&self, path: &str) -> Result<reqwest::Response> {
        let token = self.token()?;
        let url = format!("{}{}", REST_BASE, path);
        tracing::debug!("REST POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("REST POST {} failed", url))?;

        check_response(resp, &url).await
    }

    /// GET request to the sync API.
    pub async fn sync_get(&self, path: &str) -> Result<reqwest::Response> {
        let token = self.token()?;
        let url = format!("{}{}", SYNC_BASE, path);
        tracing::debug!("Sync GET {}", url);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("Sync GET {} failed", url))?;

        check_response(resp, &url).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        bail!(
            "401 Unauthorized for {}. Token may be invalid -- run 'todoist-cli login'.",
            url
        );
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("HTTP {} for {}: {}", status.as_u16(), url, body);
    }
    Ok(resp)
}
