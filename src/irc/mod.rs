//! IRC control connection.
//!
//! - [`IrcLineCodec`] frames CRLF lines on the socket
//! - [`IrcMessage`] parses and renders individual lines
//! - [`IrcSession`] drives registration, channel join, keep-alive and QUIT
//! - [`SessionConnector`] opens sessions for a [`NetworkTarget`]

mod casemap;
mod codec;
mod connector;
mod error;
mod message;
mod session;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use casemap::{irc_eq, irc_to_lower};
pub use codec::{IrcLineCodec, MAX_LINE_LENGTH, decode_line_bytes};
pub use connector::{SessionConnector, TcpConnector};
pub use error::IrcError;
pub use message::{IrcMessage, is_channel_name};
pub use session::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUIT_GRACE, DEFAULT_REGISTER_TIMEOUT, IrcSession,
    JoinEvent, RegistrationEvent, SessionConfig, SessionEvent, SessionState,
    alternate_nickname, join_event, random_nickname, registration_event,
};

/// Default IRC network for the release bots.
pub const DEFAULT_SERVER: &str = "irc.rizon.net";

/// Default IRC port.
pub const DEFAULT_PORT: u16 = 6670;

/// Default channel the release bots sit in.
pub const DEFAULT_CHANNEL: &str = "#subsplease";

/// A server endpoint plus the channel to join there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkTarget {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Channel to join.
    pub channel: String,
}

impl NetworkTarget {
    /// Creates a target.
    pub fn new(host: impl Into<String>, port: u16, channel: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            channel: channel.into(),
        }
    }
}

impl Default for NetworkTarget {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER, DEFAULT_PORT, DEFAULT_CHANNEL)
    }
}

impl fmt::Display for NetworkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.channel)
    }
}
