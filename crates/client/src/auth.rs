//! Authentication endpoints and credential lifecycle
//!
//! Login and registration exchange user credentials for the session token
//! pair. Logout tears the session down, best effort on the server side.
//! The refresh exchange itself lives in the session module because the 401
//! pipeline drives it.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credentials::TokenKind;
use crate::error::ClientError;
use crate::request::ApiRequest;
use crate::session::SessionClient;

/// Credential login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

/// Account registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Display name for the new account
    pub name: String,
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

/// Token pair returned by login and registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    /// Short-lived bearer token attached to every API call
    pub access_token: String,
    /// Longer-lived token exchanged for new access tokens
    pub refresh_token: String,
}

/// Body of the refresh exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh exchange response; the refresh token itself is not rotated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogoutRequest {
    refresh_token: String,
}

impl SessionClient {
    /// Log in with email and password, storing the returned token pair.
    ///
    /// A 401 here means the credentials were wrong, not that the session
    /// expired: login sits on the authentication surface, so no refresh is
    /// attempted and the failure surfaces as
    /// [`ClientError::AuthenticationFailed`].
    pub async fn login(&self, request: LoginRequest) -> Result<(), ClientError> {
        let path = self.auth_routes().login.clone();
        let tokens: SessionTokens = self.execute(ApiRequest::post(path).json(&request)?).await?;
        self.install_tokens(tokens);
        debug!("Session established");
        Ok(())
    }

    /// Register a new account, storing the returned token pair
    pub async fn register(&self, request: RegisterRequest) -> Result<(), ClientError> {
        let path = self.auth_routes().register.clone();
        let tokens: SessionTokens = self.execute(ApiRequest::post(path).json(&request)?).await?;
        self.install_tokens(tokens);
        debug!("Session established");
        Ok(())
    }

    /// End the session.
    ///
    /// Notifies the server so the refresh token can be revoked, then clears
    /// the local store. Endpoint failure never blocks the local teardown.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.credential_store().get(TokenKind::Refresh) {
            let path = self.auth_routes().logout.clone();
            match ApiRequest::post(path).json(&LogoutRequest { refresh_token }) {
                Ok(request) => {
                    if let Err(error) = self.send(request).await {
                        warn!(%error, "Logout endpoint unreachable, clearing local session anyway");
                    }
                }
                Err(error) => warn!(%error, "Failed to encode logout request"),
            }
        }

        self.credential_store().clear();
        debug!("Session cleared");
    }

    fn install_tokens(&self, tokens: SessionTokens) {
        let store = self.credential_store();
        store.set(TokenKind::Access, tokens.access_token);
        store.set(TokenKind::Refresh, tokens.refresh_token);
    }
}
