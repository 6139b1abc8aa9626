//! Credential storage for the session layer
//!
//! Tokens are opaque bearer strings scoped to a single session: written on
//! login or registration, the access half replaced by each refresh, both
//! removed on logout or unrecoverable refresh failure.

use std::sync::RwLock;

/// Which of the two session tokens to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived bearer credential attached to every API call
    Access,
    /// Longer-lived credential exchanged for a fresh access token
    Refresh,
}

/// Single source of truth for the session's token pair.
///
/// The session client takes the store by injection, so applications can back
/// it with whatever storage they have and tests can substitute their own.
/// Implementations must make `get`, `set` and `clear` atomic with respect to
/// each other.
pub trait CredentialStore: Send + Sync {
    /// Read a token. Absent means no session (or none of this kind).
    fn get(&self, kind: TokenKind) -> Option<String>;

    /// Write a token, replacing any previous value of the same kind.
    fn set(&self, kind: TokenKind, value: String);

    /// Remove both tokens. Idempotent.
    fn clear(&self);
}

/// In-memory store covering the lifetime of the process. Nothing is
/// persisted; dropping the store destroys the credentials.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<TokenPair>,
}

#[derive(Debug, Default)]
struct TokenPair {
    access: Option<String>,
    refresh: Option<String>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, kind: TokenKind) -> Option<String> {
        let tokens = self.tokens.read().expect("Failed to acquire credential lock");
        match kind {
            TokenKind::Access => tokens.access.clone(),
            TokenKind::Refresh => tokens.refresh.clone(),
        }
    }

    fn set(&self, kind: TokenKind, value: String) {
        let mut tokens = self.tokens.write().expect("Failed to acquire credential lock");
        match kind {
            TokenKind::Access => tokens.access = Some(value),
            TokenKind::Refresh => tokens.refresh = Some(value),
        }
    }

    fn clear(&self) {
        let mut tokens = self.tokens.write().expect("Failed to acquire credential lock");
        *tokens = TokenPair::default();
    }
}
