//! Navigation hook for unrecoverable session failures

use tracing::warn;

/// Redirect primitive invoked when the session cannot be recovered.
///
/// The session client calls this at most once per forced logout, passing the
/// configured login entry point. Applications plug in whatever "go to the
/// login screen" means for them; the default implementation only logs.
pub trait Navigator: Send + Sync {
    /// Send the user to `path`
    fn redirect_to(&self, path: &str);
}

/// Default navigator: records the redirect in the log and nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to(&self, path: &str) {
        warn!(path, "Session ended with no navigator installed");
    }
}
