//! Authentication module for Todoist
//!
//! Implements the OAuth2 authorization-code flow with a one-shot local
//! callback listener, plus persistent token storage.

use anyhow::Context;
use url::Url;

pub mod flow;
pub mod oauth;
pub mod tokens;

pub use flow::{
    run_authorization_flow, AuthFlowError, AuthRequest, AuthTokens, Browser, SystemBrowser,
};
pub use oauth::{login, logout, status};
pub use tokens::{StoredToken, TokenStore};

/// OAuth application endpoints for a provider.
pub struct AuthConfig {
    /// Authorization page the browser is sent to
    pub auth_url: &'static str,
    /// Token endpoint for the code exchange
    pub token_url: &'static str,
    /// Registered localhost redirect URL
    pub redirect_url: &'static str,
    /// Scopes requested at authorization
    pub scopes: &'static [&'static str],
    /// Ask the provider to re-prompt for consent
    pub include_prompt: bool,
    /// Carry a state nonce through the flow
    pub include_state: bool,
}

impl AuthConfig {
    /// Endpoints of the Todoist OAuth application
    pub fn todoist() -> Self {
        Self {
            auth_url: "https://todoist.com/oauth/authorize",
            token_url: "https://todoist.com/oauth/access_token",
            redirect_url: "http://localhost:3000",
            scopes: &["data:read_write"],
            include_prompt: true,
            include_state: true,
        }
    }

    /// Build a flow request from these endpoints and the given client credentials.
    pub fn auth_request(
        &self,
        client_id: String,
        client_secret: String,
    ) -> anyhow::Result<AuthRequest> {
        Ok(AuthRequest {
            redirect_url: Url::parse(self.redirect_url).context("invalid redirect URL")?,
            auth_url: Url::parse(self.auth_url).context("invalid authorization URL")?,
            token_url: Url::parse(self.token_url).context("invalid token URL")?,
            client_id,
            client_secret,
            scopes: self.scopes.iter().map(|s| s.to_string()).collect(),
            audience: None,
            include_state: self.include_state,
            include_prompt: self.include_prompt,
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::todoist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todoist_config_builds_valid_request() {
        let request = AuthConfig::todoist()
            .auth_request("id".to_string(), "secret".to_string())
            .unwrap();
        assert_eq!(request.validate().unwrap(), 3000);
        assert_eq!(request.scopes, vec!["data:read_write".to_string()]);
        assert!(request.include_state);
        assert!(request.include_prompt);
    }
}
