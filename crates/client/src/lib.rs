//! Tessera API client with an authenticated session layer
//!
//! Every request carries the current access token from the credential
//! store. A first 401 from outside the authentication surface triggers a
//! transparent token refresh and a single replay; an unrecoverable refresh
//! clears the stored credentials and sends the user back to the login
//! entry point.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod navigator;
pub mod request;
pub mod session;

pub use auth::{LoginRequest, RegisterRequest, SessionTokens};
pub use config::AuthRoutes;
pub use credentials::{CredentialStore, MemoryCredentialStore, TokenKind};
pub use error::ClientError;
pub use middleware::{
    BearerAuth, RequestMiddleware, ResponseMiddleware, RetryOnUnauthorized, SendContext, Verdict,
};
pub use navigator::{Navigator, NoopNavigator};
pub use request::ApiRequest;
pub use session::{SessionClient, SessionClientBuilder};
