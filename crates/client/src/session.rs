//! Tessera session client
//!
//! Every API call flows through [`SessionClient::send`]: request middleware
//! attaches the current access token, response middleware flags recoverable
//! 401s, and the refresh exchange swaps the refresh token for a new access
//! token before the original request is replayed exactly once. Concurrent
//! 401s join a single in-flight refresh instead of racing their own.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::{Client, ClientBuilder, Response};
use tracing::{debug, warn};

use crate::auth::{RefreshRequest, RefreshResponse};
use crate::config::{AuthRoutes, DEFAULT_LOGIN_REDIRECT, DEFAULT_TIMEOUT, SessionConfig};
use crate::credentials::{CredentialStore, MemoryCredentialStore, TokenKind};
use crate::error::ClientError;
use crate::middleware::{
    BearerAuth, RequestMiddleware, ResponseMiddleware, RetryOnUnauthorized, SendContext, Verdict,
};
use crate::navigator::{Navigator, NoopNavigator};
use crate::request::ApiRequest;

/// In-flight refresh exchange, cloneable so every waiter observes the same
/// outcome
type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshFailed>>>;

/// Why a refresh exchange failed
#[derive(Debug, Clone)]
enum RefreshFailed {
    /// No refresh token in the store, nothing to exchange
    MissingToken,
    /// The refresh endpoint rejected the exchange
    Rejected { status: u16 },
    /// The exchange never completed or returned an undecodable body
    Failed(String),
}

impl std::fmt::Display for RefreshFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingToken => write!(f, "no refresh token available"),
            Self::Rejected { status } => write!(f, "refresh rejected with status {status}"),
            Self::Failed(reason) => write!(f, "refresh failed: {reason}"),
        }
    }
}

impl From<RefreshFailed> for ClientError {
    fn from(failed: RefreshFailed) -> Self {
        Self::SessionExpired(failed.to_string())
    }
}

struct SessionInner {
    http: Client,
    config: SessionConfig,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    request_middleware: Vec<Arc<dyn RequestMiddleware>>,
    response_middleware: Vec<Arc<dyn ResponseMiddleware>>,
    /// The pending refresh, if any. The lock is only held to install or
    /// clone the shared future, never across an await point.
    refresh: Mutex<Option<SharedRefresh>>,
}

/// Authenticated client for the Tessera API.
///
/// Cloning is cheap: clones share the connection pool, the credential store
/// and the in-flight refresh state.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<SessionInner>,
}

impl SessionClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    /// Credential store backing this session
    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    pub(crate) fn auth_routes(&self) -> &AuthRoutes {
        &self.inner.config.routes
    }

    /// Dispatch a request through the session pipeline.
    ///
    /// Any terminal status is returned as a response, including a 401 that
    /// survived the refresh flow. Errors are transport failures plus
    /// [`ClientError::SessionExpired`] when a required refresh fails.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        let auth_endpoint = self.inner.config.routes.is_auth_endpoint(request.path());
        let mut attempt: u32 = 0;

        loop {
            let cx = SendContext {
                request: &request,
                attempt,
                auth_endpoint,
            };
            let sent_token = self.inner.store.get(TokenKind::Access);
            let response = self.dispatch(&cx).await?;

            match self.verdict(&cx, &response) {
                Verdict::RefreshAndRetry if attempt == 0 => {
                    debug!(path = cx.request.path(), "Access token rejected, refreshing");
                    self.recover_credentials(sent_token).await?;
                    attempt += 1;
                }
                // A logical request is replayed at most once; the replay's
                // response is final whatever any middleware votes.
                _ => return Ok(response),
            }
        }
    }

    /// Execute a request and decode a JSON response, mapping non-success
    /// statuses to errors
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Run one attempt: apply request middleware, hit the wire
    async fn dispatch(&self, cx: &SendContext<'_>) -> Result<Response, ClientError> {
        let mut headers = cx.request.headers().clone();
        for middleware in &self.inner.request_middleware {
            middleware.prepare(cx, &mut headers);
        }

        let url = format!("{}{}", self.inner.config.base_url, cx.request.path());
        let mut builder = self
            .inner
            .http
            .request(cx.request.method().clone(), url)
            .headers(headers);
        if let Some(body) = cx.request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(
            path = cx.request.path(),
            status = %response.status(),
            attempt = cx.attempt,
            "Response received"
        );
        Ok(response)
    }

    /// First verdict other than `Forward` wins
    fn verdict(&self, cx: &SendContext<'_>, response: &Response) -> Verdict {
        for middleware in &self.inner.response_middleware {
            let verdict = middleware.inspect(cx, response);
            if verdict != Verdict::Forward {
                return verdict;
            }
        }
        Verdict::Forward
    }

    /// Make sure the store holds a newer access token than the one that was
    /// just rejected, joining or starting the shared refresh as needed
    async fn recover_credentials(&self, sent_token: Option<String>) -> Result<(), ClientError> {
        // A refresh finished by another request may already have rotated
        // the token while this response was in flight. Replay with it.
        let current = self.inner.store.get(TokenKind::Access);
        if current.is_some() && current != sent_token {
            debug!("Token already rotated by a concurrent refresh");
            return Ok(());
        }

        self.shared_refresh().await?;
        Ok(())
    }

    /// Clone the pending refresh future, installing a new one if none is in
    /// flight. The first rejected request pays for the exchange; everyone
    /// else awaits the same outcome.
    fn shared_refresh(&self) -> SharedRefresh {
        let mut slot = self.inner.refresh.lock().expect("Failed to acquire refresh lock");
        if let Some(pending) = slot.as_ref() {
            return pending.clone();
        }

        let inner = Arc::clone(&self.inner);
        let pending: SharedRefresh = run_refresh(inner).boxed().shared();
        *slot = Some(pending.clone());
        pending
    }
}

/// One refresh exchange. On failure the forced-logout side effects run
/// here, inside the shared future, so they happen exactly once no matter
/// how many requests were waiting on the outcome.
async fn run_refresh(inner: Arc<SessionInner>) -> Result<String, RefreshFailed> {
    let result = exchange_refresh_token(&inner).await;

    match &result {
        Ok(_) => debug!("Access token refreshed"),
        Err(failed) => {
            warn!(%failed, "Refresh failed, ending session");
            inner.store.clear();
            inner.navigator.redirect_to(&inner.config.login_redirect);
        }
    }

    // Clear the slot so the next 401 starts a fresh exchange instead of
    // observing this one's outcome.
    *inner.refresh.lock().expect("Failed to acquire refresh lock") = None;

    result
}

/// POST the refresh token straight at the transport. The refresh call must
/// never re-enter the 401 pipeline.
async fn exchange_refresh_token(inner: &SessionInner) -> Result<String, RefreshFailed> {
    let Some(refresh_token) = inner.store.get(TokenKind::Refresh) else {
        return Err(RefreshFailed::MissingToken);
    };

    let url = format!("{}{}", inner.config.base_url, inner.config.routes.refresh);
    let response = inner
        .http
        .post(url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(|error| RefreshFailed::Failed(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefreshFailed::Rejected {
            status: status.as_u16(),
        });
    }

    let tokens: RefreshResponse = response
        .json()
        .await
        .map_err(|error| RefreshFailed::Failed(error.to_string()))?;

    // Only the access half rotates; the refresh token is reused as-is.
    inner
        .store
        .set(TokenKind::Access, tokens.access_token.clone());
    Ok(tokens.access_token)
}

/// Builder for [`SessionClient`]
pub struct SessionClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    routes: AuthRoutes,
    login_redirect: String,
    store: Option<Arc<dyn CredentialStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    request_middleware: Vec<Arc<dyn RequestMiddleware>>,
    response_middleware: Vec<Arc<dyn ResponseMiddleware>>,
}

impl Default for SessionClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            routes: AuthRoutes::default(),
            login_redirect: DEFAULT_LOGIN_REDIRECT.to_string(),
            store: None,
            navigator: None,
            request_middleware: Vec::new(),
            response_middleware: Vec::new(),
        }
    }
}

impl SessionClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Replace the authentication route set
    pub fn auth_routes(mut self, routes: AuthRoutes) -> Self {
        self.routes = routes;
        self
    }

    /// Set the path passed to the navigator on forced logout
    pub fn login_redirect(mut self, path: impl Into<String>) -> Self {
        self.login_redirect = path.into();
        self
    }

    /// Inject a credential store
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Inject a navigator for forced-logout redirects
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Append a request middleware, running after bearer attachment
    pub fn request_middleware(mut self, middleware: Arc<dyn RequestMiddleware>) -> Self {
        self.request_middleware.push(middleware);
        self
    }

    /// Append a response middleware, running after the 401 retry policy
    pub fn response_middleware(mut self, middleware: Arc<dyn ResponseMiddleware>) -> Self {
        self.response_middleware.push(middleware);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let base_url = url::Url::parse(&base_url)
            .map_err(|error| ClientError::Configuration(format!("invalid base_url: {error}")))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.as_str().trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new().timeout(self.timeout);
        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        } else {
            client_builder = client_builder
                .user_agent(concat!("tessera-client/", env!("CARGO_PKG_VERSION")));
        }
        let http = client_builder.build()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator));

        let mut request_middleware: Vec<Arc<dyn RequestMiddleware>> =
            vec![Arc::new(BearerAuth::new(Arc::clone(&store)))];
        request_middleware.extend(self.request_middleware);

        let mut response_middleware: Vec<Arc<dyn ResponseMiddleware>> =
            vec![Arc::new(RetryOnUnauthorized)];
        response_middleware.extend(self.response_middleware);

        Ok(SessionClient {
            inner: Arc::new(SessionInner {
                http,
                config: SessionConfig {
                    base_url,
                    routes: self.routes,
                    login_redirect: self.login_redirect,
                },
                store,
                navigator,
                request_middleware,
                response_middleware,
                refresh: Mutex::new(None),
            }),
        })
    }
}
