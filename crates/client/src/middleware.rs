//! Request/response pipeline for the session client
//!
//! The pipeline is two ordered lists composed by the session client:
//! request middleware shapes outgoing headers, response middleware votes on
//! what happens to a response. Keeping the stages as plain values makes the
//! order explicit and each stage testable on its own.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use tracing::warn;

use crate::credentials::{CredentialStore, TokenKind};
use crate::request::ApiRequest;

/// Context for a single attempt of a logical request
#[derive(Debug, Clone, Copy)]
pub struct SendContext<'a> {
    /// The descriptor being dispatched
    pub request: &'a ApiRequest,
    /// 0 for the original dispatch, 1 for the post-refresh replay
    pub attempt: u32,
    /// Whether the target path belongs to the authentication surface
    pub auth_endpoint: bool,
}

/// Shapes an outgoing request before dispatch
pub trait RequestMiddleware: Send + Sync {
    /// Adjust the headers that will be sent for this attempt
    fn prepare(&self, cx: &SendContext<'_>, headers: &mut HeaderMap);
}

/// What a response middleware wants done with a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the response to the caller as-is
    Forward,
    /// Refresh credentials and replay the request once
    RefreshAndRetry,
}

/// Inspects a response before it is handed back to the caller
pub trait ResponseMiddleware: Send + Sync {
    /// Vote on the response; the first verdict other than
    /// [`Verdict::Forward`] wins
    fn inspect(&self, cx: &SendContext<'_>, response: &Response) -> Verdict;
}

/// Attaches `Authorization: Bearer <access token>` from the credential
/// store.
///
/// The store is read at send time, not at descriptor build time, so a
/// replay automatically picks up a token rotated in between. Inserting into
/// the header map replaces any existing value, which keeps the request at
/// exactly one authorization header.
pub struct BearerAuth {
    store: Arc<dyn CredentialStore>,
}

impl BearerAuth {
    /// Middleware reading access tokens from `store`
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl RequestMiddleware for BearerAuth {
    fn prepare(&self, _cx: &SendContext<'_>, headers: &mut HeaderMap) {
        // No token is not an error: the request goes out unauthenticated
        // and the server gets to reject it.
        let Some(token) = self.store.get(TokenKind::Access) else {
            return;
        };
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Stored access token is not a valid header value"),
        }
    }
}

/// Flags the one recoverable failure: a first 401 from outside the
/// authentication surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryOnUnauthorized;

impl ResponseMiddleware for RetryOnUnauthorized {
    fn inspect(&self, cx: &SendContext<'_>, response: &Response) -> Verdict {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Verdict::Forward;
        }
        // A 401 from login/register/refresh judges the request body, not
        // the session; a 401 on the replay attempt is terminal.
        if cx.auth_endpoint || cx.attempt > 0 {
            return Verdict::Forward;
        }
        Verdict::RefreshAndRetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;

    fn response(status: u16) -> Response {
        http::Response::builder()
            .status(status)
            .body(String::new())
            .unwrap()
            .into()
    }

    fn context(request: &ApiRequest, attempt: u32, auth_endpoint: bool) -> SendContext<'_> {
        SendContext {
            request,
            attempt,
            auth_endpoint,
        }
    }

    #[test]
    fn bearer_auth_attaches_current_token() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(TokenKind::Access, "token-1".to_string());
        let middleware = BearerAuth::new(store);

        let request = ApiRequest::get("/contacts");
        let mut headers = HeaderMap::new();
        middleware.prepare(&context(&request, 0, false), &mut headers);

        assert_eq!(
            headers.get(AUTHORIZATION),
            Some(&HeaderValue::from_static("Bearer token-1"))
        );
    }

    #[test]
    fn bearer_auth_replaces_stale_header() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(TokenKind::Access, "token-2".to_string());
        let middleware = BearerAuth::new(store);

        let request = ApiRequest::get("/contacts");
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer token-1"));
        middleware.prepare(&context(&request, 1, false), &mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.get(AUTHORIZATION),
            Some(&HeaderValue::from_static("Bearer token-2"))
        );
    }

    #[test]
    fn bearer_auth_leaves_request_bare_without_token() {
        let store = Arc::new(MemoryCredentialStore::new());
        let middleware = BearerAuth::new(store);

        let request = ApiRequest::get("/contacts");
        let mut headers = HeaderMap::new();
        middleware.prepare(&context(&request, 0, false), &mut headers);

        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn first_unauthorized_outside_auth_surface_triggers_retry() {
        let request = ApiRequest::get("/contacts");
        let verdict =
            RetryOnUnauthorized.inspect(&context(&request, 0, false), &response(401));
        assert_eq!(verdict, Verdict::RefreshAndRetry);
    }

    #[test]
    fn unauthorized_on_auth_endpoint_is_forwarded() {
        let request = ApiRequest::post("/auth/login");
        let verdict = RetryOnUnauthorized.inspect(&context(&request, 0, true), &response(401));
        assert_eq!(verdict, Verdict::Forward);
    }

    #[test]
    fn unauthorized_replay_is_forwarded() {
        let request = ApiRequest::get("/contacts");
        let verdict =
            RetryOnUnauthorized.inspect(&context(&request, 1, false), &response(401));
        assert_eq!(verdict, Verdict::Forward);
    }

    #[test]
    fn other_statuses_are_forwarded() {
        let request = ApiRequest::get("/contacts");
        for status in [200, 204, 400, 403, 404, 500] {
            let verdict =
                RetryOnUnauthorized.inspect(&context(&request, 0, false), &response(status));
            assert_eq!(verdict, Verdict::Forward);
        }
    }
}
