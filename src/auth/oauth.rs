//! Login, logout and status commands built on the authorization-code flow

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use super::{run_authorization_flow, AuthConfig, AuthFlowError, SystemBrowser, TokenStore};
use crate::api::{self, TodoistClient};
use crate::config::Config;

/// Perform the browser-based OAuth2 login flow
pub async fn login(force: bool) -> Result<()> {
    let config = Config::load()?;

    if !force {
        if let Some(token) = config.get_access_token() {
            if !token.is_expired() {
                println!("Already logged in. Use --force to re-authenticate.");
                return Ok(());
            }
        }
    }

    let (client_id, client_secret) = config.oauth_credentials()?;
    let request = AuthConfig::todoist().auth_request(client_id, client_secret)?;

    // Ctrl-C aborts the pending flow and frees the callback port.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    println!("Opening your browser to authorize todoist-cli...");
    let tokens = match run_authorization_flow(
        &request,
        &SystemBrowser,
        |msg: &str| println!("{msg}"),
        &cancel,
    )
    .await
    {
        Ok(tokens) => tokens,
        Err(AuthFlowError::Cancelled) => {
            println!("Login cancelled.");
            return Ok(());
        }
        Err(e) => Err(e).context("Authorization flow failed")?,
    };

    let mut config = Config::load()?;
    config.set_access_token(tokens.access_token, tokens.expires_in);
    if let Some(refresh) = tokens.refresh_token {
        config.set_refresh_token(refresh);
    }
    config.save()?;

    println!("Login successful.");
    Ok(())
}

/// Clear stored credentials
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_tokens();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Display auth status, validating the stored token against the API
pub async fn status() -> Result<()> {
    let config = Config::load()?;

    let Some(token) = config.get_access_token() else {
        println!("Not logged in. Run 'todoist-cli login' to connect your account.");
        return Ok(());
    };

    if token.is_expired() {
        println!("Stored token has expired. Run 'todoist-cli login' to re-authenticate.");
        return Ok(());
    }

    let client = TodoistClient::new()?;
    match api::completed_stats(&client).await {
        Ok(stats) => {
            println!("Connected to Todoist.");
            println!("  karma:           {}", stats.karma);
            println!("  completed total: {}", stats.completed_count);
            println!("  completed today: {}", stats.completed_today());
        }
        Err(e) => {
            tracing::warn!("Token validation failed: {:#}", e);
            let mut config = Config::load()?;
            config.clear_tokens();
            config.save()?;
            println!("Stored token was rejected and has been cleared.");
            println!("Run 'todoist-cli login' to re-authenticate.");
        }
    }

    Ok(())
}
