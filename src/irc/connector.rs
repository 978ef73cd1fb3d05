//! Opening sessions behind a trait so the orchestrator and catalog can be
//! driven by scripted servers in tests.

use async_trait::async_trait;

use super::{IrcError, IrcSession, NetworkTarget, SessionConfig};

/// Produces a registered, joined [`IrcSession`] for a network target.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Opens a session that is `Active` in `target.channel`.
    ///
    /// # Errors
    ///
    /// Any [`IrcError`] raised while connecting, registering or joining.
    async fn open(&self, target: &NetworkTarget) -> Result<IrcSession, IrcError>;
}

/// Connects over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    config: SessionConfig,
}

impl TcpConnector {
    /// Creates a connector that registers with `config`.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Identity and timeouts used for new sessions.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[async_trait]
impl SessionConnector for TcpConnector {
    async fn open(&self, target: &NetworkTarget) -> Result<IrcSession, IrcError> {
        IrcSession::connect(target, &self.config).await
    }
}
