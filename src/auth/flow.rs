//! OAuth2 authorization-code flow over a one-shot local callback listener
//!
//! Binds a single-use HTTP(S) server on the redirect URL's port, sends the
//! user's browser to the provider's authorization page, captures the redirect
//! carrying the authorization code, and exchanges that code for tokens. The
//! listener accepts exactly one completing callback and is torn down on every
//! exit path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::certificate;

/// One authorization attempt against a provider.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Registered redirect URL; must point at localhost on a non-80 port
    pub redirect_url: Url,
    /// Provider authorization page; must be remote and carry no query yet
    pub auth_url: Url,
    /// Provider token endpoint for the code exchange
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: String,
    /// Requested scopes, joined space-separated into the `scope` parameter
    pub scopes: Vec<String>,
    pub audience: Option<String>,
    /// Send (and verify) a random `state` nonce
    pub include_state: bool,
    /// Send `prompt=consent`
    pub include_prompt: bool,
}

impl AuthRequest {
    /// Check the request invariants, returning the callback port.
    ///
    /// Runs before any listener or network action; a violation leaves no
    /// side effects behind.
    pub fn validate(&self) -> Result<u16, AuthFlowError> {
        // Effective port, so an explicit :80 and the http default are both caught.
        let port = self.redirect_url.port_or_known_default().ok_or_else(|| {
            AuthFlowError::InvalidRequest("redirect URL has no usable port".into())
        })?;
        if port == 80 {
            return Err(AuthFlowError::InvalidRequest(
                "port 80 is not supported, use a different port".into(),
            ));
        }
        if self.redirect_url.host_str() != Some("localhost") {
            return Err(AuthFlowError::InvalidRequest(
                "redirect URL must be localhost".into(),
            ));
        }
        if self.auth_url.host_str() == Some("localhost") {
            return Err(AuthFlowError::InvalidRequest(
                "authorization URL cannot be localhost".into(),
            ));
        }
        if self.auth_url.query_pairs().next().is_some() {
            return Err(AuthFlowError::InvalidRequest(
                "authorization URL cannot have query parameters".into(),
            ));
        }
        Ok(port)
    }
}

/// Parsed token endpoint response.
///
/// Todoist returns only `access_token` and `token_type`; the optional fields
/// cover providers that also issue refresh tokens and expiries.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

/// Failure modes of the authorization flow. No retries anywhere; every
/// failure is terminal for the attempt.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("invalid authorization request: {0}")]
    InvalidRequest(String),
    #[error("failed to bind callback listener on {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to prepare TLS for callback listener: {0}")]
    Tls(String),
    #[error("authorization code not found in callback")]
    AuthorizationDenied,
    #[error("state parameter in callback did not match")]
    StateMismatch,
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("authorization flow cancelled")]
    Cancelled,
}

/// Browser launcher seam. Launch failure is reported through the progress
/// sink and the flow keeps waiting; the user can navigate manually.
pub trait Browser {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the system default browser.
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

/// Query parameters captured from the winning callback request.
#[derive(Debug)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackQuery>>>>;

const CONFIRMATION_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>todoist-cli</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<p>You can close this window now.</p>
</body>
</html>"#;

const DENIED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>todoist-cli</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<p>Authorization code not found.</p>
</body>
</html>"#;

const COMPLETED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>todoist-cli</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<p>This authorization attempt has already completed.</p>
</body>
</html>"#;

/// Build the router serving the callback path.
///
/// The first request at the path resolves the flow; the sender is taken
/// under a lock so concurrent hits (browser prefetch, reloads) cannot
/// resolve it twice. Later hits get a static page.
fn callback_router(path: &str, tx: oneshot::Sender<CallbackQuery>) -> Router {
    let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));
    Router::new().route(
        path,
        get({
            let tx = tx.clone();
            move |Query(params): Query<HashMap<String, String>>| {
                let tx = tx.clone();
                async move {
                    let query = CallbackQuery {
                        code: params.get("code").cloned().filter(|c| !c.is_empty()),
                        state: params.get("state").cloned(),
                    };

                    match tx.lock().await.take() {
                        Some(sender) => {
                            let page = if query.code.is_some() {
                                CONFIRMATION_PAGE
                            } else {
                                DENIED_PAGE
                            };
                            let _ = sender.send(query);
                            Html(page)
                        }
                        None => Html(COMPLETED_PAGE),
                    }
                }
            }
        }),
    )
}

/// Compose the provider authorization URL.
///
/// Parameter order matters to some providers and is kept fixed: the
/// conditional parameters (`audience`, `state`, `prompt`) first, then
/// `client_id`, `scope`, `redirect_uri`, `response_type=code`.
pub fn build_authorization_url(request: &AuthRequest, state: Option<&str>) -> Url {
    let mut url = request.auth_url.clone();
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(audience) = &request.audience {
            pairs.append_pair("audience", audience);
        }
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
        if request.include_prompt {
            pairs.append_pair("prompt", "consent");
        }
        pairs.append_pair("client_id", &request.client_id);
        pairs.append_pair("scope", &request.scopes.join(" "));
        pairs.append_pair("redirect_uri", request.redirect_url.as_str());
        pairs.append_pair("response_type", "code");
    }
    url
}

/// Run the full authorization-code flow.
///
/// Validates the request, binds the one-shot callback listener (TLS when the
/// redirect URL is https), opens the browser at the composed authorization
/// URL and waits for the redirect, then exchanges the code at the token
/// endpoint. The listener port is released before this returns, on success
/// and failure alike. Cancelling `cancel` aborts a pending flow.
pub async fn run_authorization_flow<B, P>(
    request: &AuthRequest,
    browser: &B,
    progress: P,
    cancel: &CancellationToken,
) -> Result<AuthTokens, AuthFlowError>
where
    B: Browser + ?Sized,
    P: Fn(&str),
{
    let port = request.validate()?;

    let tls = if request.redirect_url.scheme() == "https" {
        let generated = certificate::generate("localhost", "Localhost", 365)
            .map_err(|e| AuthFlowError::Tls(format!("{e:#}")))?;
        // Idempotent; required once per process before any rustls config.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let config = RustlsConfig::from_pem(
            generated.cert_pem.into_bytes(),
            generated.key_pem.into_bytes(),
        )
        .await
        .map_err(|e| AuthFlowError::Tls(e.to_string()))?;
        Some(config)
    } else {
        None
    };

    // Bind synchronously so a busy port surfaces here, before the browser
    // opens. Connections arriving before the server task runs its accept
    // loop queue in the backlog, so the browser can never race the server.
    let addr = format!("127.0.0.1:{port}");
    let listener = std::net::TcpListener::bind(&addr).map_err(|e| AuthFlowError::Listen {
        addr: addr.clone(),
        source: e,
    })?;
    listener
        .set_nonblocking(true)
        .map_err(|e| AuthFlowError::Listen {
            addr: addr.clone(),
            source: e,
        })?;
    tracing::debug!("Callback listener bound on {}", addr);

    let (tx, rx) = oneshot::channel();
    let app = callback_router(request.redirect_url.path(), tx);

    let handle = Handle::new();
    let server = match tls {
        Some(config) => tokio::spawn(
            axum_server::from_tcp_rustls(listener, config)
                .handle(handle.clone())
                .serve(app.into_make_service()),
        ),
        None => tokio::spawn(
            axum_server::from_tcp(listener)
                .handle(handle.clone())
                .serve(app.into_make_service()),
        ),
    };

    let state = request
        .include_state
        .then(|| Uuid::new_v4().simple().to_string());
    let auth_url = build_authorization_url(request, state.as_deref());

    tracing::debug!("Authorization URL: {}", auth_url);
    if let Err(e) = browser.open(auth_url.as_str()) {
        progress(&format!(
            "Could not open a browser ({e}); visit {auth_url} to continue"
        ));
    }
    progress("Waiting for OAuth flow to complete...");

    let result = wait_for_callback(request, rx, state.as_deref(), &progress, cancel).await;

    // Single teardown point for every exit path.
    handle.graceful_shutdown(Some(Duration::from_secs(1)));
    let _ = server.await;

    result
}

async fn wait_for_callback<P: Fn(&str)>(
    request: &AuthRequest,
    rx: oneshot::Receiver<CallbackQuery>,
    expected_state: Option<&str>,
    progress: &P,
    cancel: &CancellationToken,
) -> Result<AuthTokens, AuthFlowError> {
    let callback = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AuthFlowError::Cancelled),
        res = rx => res.map_err(|_| AuthFlowError::Cancelled)?,
    };

    let code = match callback.code {
        Some(code) => code,
        None => {
            progress("Unable to retrieve authorization code...");
            return Err(AuthFlowError::AuthorizationDenied);
        }
    };

    if let Some(expected) = expected_state {
        if callback.state.as_deref() != Some(expected) {
            return Err(AuthFlowError::StateMismatch);
        }
    }

    match exchange_code(request, &code).await {
        Ok(tokens) => {
            progress("Successfully received token...");
            Ok(tokens)
        }
        Err(e) => {
            progress("Failed to retrieve token...");
            Err(e)
        }
    }
}

/// Exchange an authorization code for tokens at the token endpoint.
async fn exchange_code(request: &AuthRequest, code: &str) -> Result<AuthTokens, AuthFlowError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", request.client_id.as_str()),
        ("client_secret", request.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", request.redirect_url.as_str()),
    ];

    tracing::debug!("Exchanging authorization code at {}", request.token_url);
    let resp = reqwest::Client::new()
        .post(request.token_url.as_str())
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthFlowError::TokenExchange(format!("request failed: {e}")))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| AuthFlowError::TokenExchange(format!("failed to read response: {e}")))?;

    if !status.is_success() {
        return Err(AuthFlowError::TokenExchange(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| AuthFlowError::TokenExchange(format!("invalid token response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Form;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Json;

    fn request(redirect: &str, auth: &str, token: &str) -> AuthRequest {
        AuthRequest {
            redirect_url: Url::parse(redirect).unwrap(),
            auth_url: Url::parse(auth).unwrap(),
            token_url: Url::parse(token).unwrap(),
            client_id: "abc".to_string(),
            client_secret: "xyz".to_string(),
            scopes: vec!["read".to_string()],
            audience: None,
            include_state: false,
            include_prompt: false,
        }
    }

    /// Find a port that is currently free. Small race window, fine for tests.
    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    struct NoopBrowser;

    impl Browser for NoopBrowser {
        fn open(&self, _url: &str) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Plays the provider's part: reads `redirect_uri` (and optionally
    /// `state`) out of the authorization URL it is asked to open and drives
    /// the redirect back to the callback listener.
    struct RedirectingBrowser {
        extra_query: String,
        echo_state: bool,
        accept_invalid_certs: bool,
    }

    impl RedirectingBrowser {
        fn with_code(code: &str) -> Self {
            Self {
                extra_query: format!("code={code}"),
                echo_state: false,
                accept_invalid_certs: false,
            }
        }
    }

    impl Browser for RedirectingBrowser {
        fn open(&self, url: &str) -> std::io::Result<()> {
            let url = Url::parse(url).expect("authorization URL should parse");
            let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
            let redirect_uri = params.get("redirect_uri").expect("redirect_uri param");

            let mut callback = format!("{}?{}", redirect_uri, self.extra_query);
            if self.echo_state {
                if let Some(state) = params.get("state") {
                    callback.push_str(&format!("&state={state}"));
                }
            }

            let accept_invalid = self.accept_invalid_certs;
            tokio::spawn(async move {
                let client = reqwest::Client::builder()
                    .danger_accept_invalid_certs(accept_invalid)
                    .build()
                    .expect("client");
                let _ = client.get(&callback).send().await;
            });
            Ok(())
        }
    }

    /// Spin up a fake token endpoint, recording the form fields it receives.
    async fn start_token_endpoint(
        respond_ok: bool,
    ) -> (String, Arc<std::sync::Mutex<Vec<HashMap<String, String>>>>) {
        let requests: Arc<std::sync::Mutex<Vec<HashMap<String, String>>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().route(
            "/token",
            post({
                let requests = requests.clone();
                move |Form(fields): Form<HashMap<String, String>>| {
                    let requests = requests.clone();
                    async move {
                        requests.lock().unwrap().push(fields);
                        if respond_ok {
                            Json(serde_json::json!({
                                "access_token": "tok-123",
                                "refresh_token": "ref-456",
                                "expires_in": 3600,
                                "token_type": "Bearer"
                            }))
                            .into_response()
                        } else {
                            (
                                axum::http::StatusCode::BAD_REQUEST,
                                Json(serde_json::json!({"error": "invalid_grant"})),
                            )
                                .into_response()
                        }
                    }
                }
            }),
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}/token"), requests)
    }

    fn progress_recorder() -> (Arc<std::sync::Mutex<Vec<String>>>, impl Fn(&str)) {
        let messages: Arc<std::sync::Mutex<Vec<String>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = {
            let messages = messages.clone();
            move |msg: &str| messages.lock().unwrap().push(msg.to_string())
        };
        (messages, sink)
    }

    #[tokio::test]
    async fn test_rejects_redirect_on_port_80() {
        for redirect in ["http://localhost/", "http://localhost:80/", "https://localhost:80/"] {
            let req = request(redirect, "https://example.com/auth", "https://example.com/token");
            let err = run_authorization_flow(&req, &NoopBrowser, |_: &str| {}, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(
                matches!(err, AuthFlowError::InvalidRequest(_)),
                "{redirect} should be rejected, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_rejects_non_localhost_redirect() {
        let req = request(
            "http://127.0.0.1:3000/",
            "https://example.com/auth",
            "https://example.com/token",
        );
        let err = run_authorization_flow(&req, &NoopBrowser, |_: &str| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rejects_localhost_authorization_url() {
        let req = request(
            "http://localhost:3000/",
            "https://localhost/auth",
            "https://example.com/token",
        );
        let err = run_authorization_flow(&req, &NoopBrowser, |_: &str| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rejects_authorization_url_with_query() {
        // The callback port is deliberately held by another socket: failing
        // with InvalidRequest proves validation runs before any bind.
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let req = request(
            &format!("http://localhost:{port}/"),
            "https://example.com/auth?foo=bar",
            "https://example.com/token",
        );
        let err = run_authorization_flow(&req, &NoopBrowser, |_: &str| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::InvalidRequest(_)));
    }

    #[test]
    fn test_validate_allows_bare_query_separator() {
        // "?" with no pairs is not a query in the sense the invariant means.
        let req = request(
            "http://localhost:3000/",
            "https://example.com/auth?",
            "https://example.com/token",
        );
        assert_eq!(req.validate().unwrap(), 3000);
    }

    #[tokio::test]
    async fn test_listen_error_when_port_is_busy() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let req = request(
            &format!("http://localhost:{port}/"),
            "https://example.com/auth",
            "https://example.com/token",
        );
        let err = run_authorization_flow(&req, &NoopBrowser, |_: &str| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::Listen { .. }));
    }

    #[test]
    fn test_authorization_url_matches_expected_form() {
        let req = request(
            "http://localhost:3000/",
            "https://example.com/auth",
            "https://example.com/token",
        );
        let url = build_authorization_url(&req, None);
        assert_eq!(
            url.as_str(),
            "https://example.com/auth?client_id=abc&scope=read&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2F&response_type=code"
        );
    }

    #[test]
    fn test_authorization_url_optional_params_come_first() {
        let mut req = request(
            "http://localhost:3000/",
            "https://example.com/auth",
            "https://example.com/token",
        );
        req.audience = Some("aud-1".to_string());
        req.include_prompt = true;
        req.scopes = vec!["data:read_write".to_string()];
        let url = build_authorization_url(&req, Some("nonce-1"));
        assert_eq!(
            url.as_str(),
            "https://example.com/auth?audience=aud-1&state=nonce-1&prompt=consent&client_id=abc&scope=data%3Aread_write&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2F&response_type=code"
        );
    }

    #[test]
    fn test_authorization_url_joins_scopes_with_spaces() {
        let mut req = request(
            "http://localhost:3000/",
            "https://example.com/auth",
            "https://example.com/token",
        );
        req.scopes = vec!["read".to_string(), "write".to_string()];
        let url = build_authorization_url(&req, None);
        assert!(
            url.as_str().contains("scope=read+write"),
            "got {}",
            url.as_str()
        );
    }

    #[tokio::test]
    async fn test_flow_exchanges_code_for_token() {
        let (token_url, exchange_requests) = start_token_endpoint(true).await;
        let port = free_port();
        let redirect = format!("http://localhost:{port}/callback");
        let req = request(&redirect, "https://example.com/auth", &token_url);
        let browser = RedirectingBrowser::with_code("test-code");
        let (messages, progress) = progress_recorder();

        let tokens = run_authorization_flow(&req, &browser, progress, &CancellationToken::new())
            .await
            .expect("flow should succeed");

        assert_eq!(tokens.access_token, "tok-123");
        assert_eq!(tokens.refresh_token.as_deref(), Some("ref-456"));
        assert_eq!(tokens.expires_in, Some(3600));
        assert_eq!(tokens.token_type.as_deref(), Some("Bearer"));

        let seen = exchange_requests.lock().unwrap();
        assert_eq!(seen.len(), 1, "exactly one exchange request");
        assert_eq!(seen[0].get("code").map(String::as_str), Some("test-code"));
        assert_eq!(
            seen[0].get("redirect_uri").map(String::as_str),
            Some(redirect.as_str())
        );
        drop(seen);

        // The listener port is released once the flow returns.
        std::net::TcpListener::bind(("127.0.0.1", port))
            .expect("callback port should be free again");

        let messages = messages.lock().unwrap();
        assert!(messages.iter().any(|m| m == "Waiting for OAuth flow to complete..."));
        assert!(messages.iter().any(|m| m == "Successfully received token..."));
    }

    #[tokio::test]
    async fn test_flow_rejects_callback_without_code() {
        let port = free_port();
        let req = request(
            &format!("http://localhost:{port}/"),
            "https://example.com/auth",
            "https://example.com/token",
        );
        let browser = RedirectingBrowser {
            extra_query: String::new(),
            echo_state: false,
            accept_invalid_certs: false,
        };
        let (messages, progress) = progress_recorder();

        let err = run_authorization_flow(&req, &browser, progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFlowError::AuthorizationDenied));
        std::net::TcpListener::bind(("127.0.0.1", port))
            .expect("callback port should be free again");
        assert!(messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == "Unable to retrieve authorization code..."));
    }

    #[tokio::test]
    async fn test_flow_fails_when_exchange_fails() {
        let (token_url, _requests) = start_token_endpoint(false).await;
        let port = free_port();
        let req = request(
            &format!("http://localhost:{port}/callback"),
            "https://example.com/auth",
            &token_url,
        );
        let browser = RedirectingBrowser::with_code("bad-code");
        let (messages, progress) = progress_recorder();

        let err = run_authorization_flow(&req, &browser, progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFlowError::TokenExchange(_)));
        std::net::TcpListener::bind(("127.0.0.1", port))
            .expect("callback port should be free again");
        assert!(messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == "Failed to retrieve token..."));
    }

    #[tokio::test]
    async fn test_flow_verifies_state_nonce() {
        let port = free_port();
        let mut req = request(
            &format!("http://localhost:{port}/"),
            "https://example.com/auth",
            "https://example.com/token",
        );
        req.include_state = true;
        let browser = RedirectingBrowser {
            extra_query: "code=test-code&state=wrong".to_string(),
            echo_state: false,
            accept_invalid_certs: false,
        };

        let err = run_authorization_flow(&req, &browser, |_: &str| {}, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFlowError::StateMismatch));
    }

    #[tokio::test]
    async fn test_flow_accepts_echoed_state_nonce() {
        let (token_url, _requests) = start_token_endpoint(true).await;
        let port = free_port();
        let mut req = request(
            &format!("http://localhost:{port}/"),
            "https://example.com/auth",
            &token_url,
        );
        req.include_state = true;
        let browser = RedirectingBrowser {
            extra_query: "code=test-code".to_string(),
            echo_state: true,
            accept_invalid_certs: false,
        };

        let tokens = run_authorization_flow(&req, &browser, |_: &str| {}, &CancellationToken::new())
            .await
            .expect("flow with matching state should succeed");
        assert_eq!(tokens.access_token, "tok-123");
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_flow() {
        let port = free_port();
        let req = request(
            &format!("http://localhost:{port}/"),
            "https://example.com/auth",
            "https://example.com/token",
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_authorization_flow(&req, &NoopBrowser, |_: &str| {}, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFlowError::Cancelled));
        std::net::TcpListener::bind(("127.0.0.1", port))
            .expect("callback port should be free again");
    }

    #[tokio::test]
    async fn test_flow_serves_tls_when_redirect_is_https() {
        let (token_url, _requests) = start_token_endpoint(true).await;
        let port = free_port();
        let req = request(
            &format!("https://localhost:{port}/callback"),
            "https://example.com/auth",
            &token_url,
        );
        let browser = RedirectingBrowser {
            extra_query: "code=tls-code".to_string(),
            echo_state: false,
            accept_invalid_certs: true,
        };

        let tokens = run_authorization_flow(&req, &browser, |_: &str| {}, &CancellationToken::new())
            .await
            .expect("https flow should succeed");
        assert_eq!(tokens.access_token, "tok-123");
    }

    #[tokio::test]
    async fn test_first_callback_wins() {
        let (tx, rx) = oneshot::channel();
        let app = callback_router("/callback", tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = reqwest::Client::new();
        let first = client
            .get(format!("http://{addr}/callback?code=one"))
            .send()
            .await
            .unwrap();
        assert!(first.status().is_success());
        assert!(first
            .text()
            .await
            .unwrap()
            .contains("You can close this window now."));

        let second = client
            .get(format!("http://{addr}/callback?code=two"))
            .send()
            .await
            .unwrap();
        assert!(second.text().await.unwrap().contains("already completed"));

        let query = rx.await.unwrap();
        assert_eq!(query.code.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_callback_with_empty_code_counts_as_denied() {
        let port = free_port();
        let req = request(
            &format!("http://localhost:{port}/"),
            "https://example.com/auth",
            "https://example.com/token",
        );
        let browser = RedirectingBrowser {
            extra_query: "code=".to_string(),
            echo_state: false,
            accept_invalid_certs: false,
        };

        let err = run_authorization_flow(&req, &browser, |_: &str| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::AuthorizationDenied));
    }

    #[test]
    fn test_exchange_reports_unreachable_endpoint() {
        let port = free_port();
        let req = request(
            "http://localhost:3000/",
            "https://example.com/auth",
            &format!("http://127.0.0.1:{port}/token"),
        );
        let err = tokio_test::block_on(exchange_code(&req, "code")).unwrap_err();
        assert!(matches!(err, AuthFlowError::TokenExchange(_)));
    }
}
