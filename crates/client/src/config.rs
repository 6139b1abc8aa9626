//! Session client configuration

use std::time::Duration;

/// Default request timeout applied to the underlying HTTP client
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default path passed to the navigator on forced logout
pub(crate) const DEFAULT_LOGIN_REDIRECT: &str = "/login";

/// Paths making up the authentication surface.
///
/// A 401 from `login`, `register` or `refresh` is a verdict on the
/// credentials inside the request body, so it is returned to the caller
/// as-is instead of triggering the refresh flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRoutes {
    /// Credential login endpoint
    pub login: String,
    /// Account registration endpoint
    pub register: String,
    /// Token refresh endpoint
    pub refresh: String,
    /// Best-effort logout endpoint; not part of the no-refresh set
    pub logout: String,
}

impl Default for AuthRoutes {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
        }
    }
}

impl AuthRoutes {
    /// Whether `path` addresses login, register or refresh. Query strings
    /// are ignored; the match is on the path alone.
    pub(crate) fn is_auth_endpoint(&self, path: &str) -> bool {
        let path = strip_query(path);
        path == self.login || path == self.register || path == self.refresh
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(path, _)| path)
}

/// Resolved configuration held by a built session client
#[derive(Debug, Clone)]
pub(crate) struct SessionConfig {
    /// Base URL with any trailing slash removed
    pub base_url: String,
    pub routes: AuthRoutes,
    pub login_redirect: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routes_classify_the_auth_surface() {
        let routes = AuthRoutes::default();
        assert!(routes.is_auth_endpoint("/auth/login"));
        assert!(routes.is_auth_endpoint("/auth/register"));
        assert!(routes.is_auth_endpoint("/auth/refresh"));
    }

    #[test]
    fn logout_and_api_paths_are_not_auth_endpoints() {
        let routes = AuthRoutes::default();
        assert!(!routes.is_auth_endpoint("/auth/logout"));
        assert!(!routes.is_auth_endpoint("/contacts"));
        assert!(!routes.is_auth_endpoint("/auth/login/other"));
    }

    #[test]
    fn query_strings_do_not_defeat_classification() {
        let routes = AuthRoutes::default();
        assert!(routes.is_auth_endpoint("/auth/login?next=%2Fdashboard"));
        assert!(!routes.is_auth_endpoint("/contacts?page=2"));
    }

    #[test]
    fn custom_routes_replace_the_defaults() {
        let routes = AuthRoutes {
            login: "/v2/session".to_string(),
            register: "/v2/signup".to_string(),
            refresh: "/v2/session/refresh".to_string(),
            logout: "/v2/session/end".to_string(),
        };
        assert!(routes.is_auth_endpoint("/v2/session"));
        assert!(!routes.is_auth_endpoint("/auth/login"));
    }
}
