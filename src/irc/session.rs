//! A single IRC client connection: registration, channel join, messaging
//! and shutdown.
//!
//! The session spawns two background tasks on top of the transport. The
//! reader answers server `PING`s on its own, so the keep-alive obligation is
//! met even while the owner is busy streaming a DCC transfer, and forwards
//! everything else (except channel chatter) to [`IrcSession::next_message`].
//! The writer serializes outgoing messages. Both tasks are aborted when the
//! session is closed or dropped, which releases the socket on every path.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, trace, warn};

use super::casemap::irc_eq;
use super::codec::IrcLineCodec;
use super::message::is_channel_name;
use super::{IrcError, IrcMessage, NetworkTarget};

/// Default time allowed for the TCP connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for registration and for the channel join.
pub const DEFAULT_REGISTER_TIMEOUT: Duration = Duration::from_secs(60);

/// How long `close()` waits for the server to drop the link after QUIT.
pub const DEFAULT_QUIT_GRACE: Duration = Duration::from_secs(2);

const QUIT_MESSAGE: &str = "bye";

/// Lifecycle of an [`IrcSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet.
    Disconnected,
    /// Transport is up, nothing sent.
    Connecting,
    /// NICK/USER sent, waiting for the welcome numeric.
    Registering,
    /// JOIN sent, waiting for the server to confirm membership.
    Joined,
    /// In the channel; messages may be exchanged.
    Active,
    /// QUIT sent.
    Closing,
    /// Connection released.
    Closed,
}

impl SessionState {
    /// Lowercase name for logs and errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Registering => "registering",
            Self::Joined => "joined",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

/// Identity and timeouts used when opening a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Preferred nickname; one suffixed alternative is tried on collision.
    pub nickname: String,
    /// USER name.
    pub username: String,
    /// USER real name.
    pub realname: String,
    /// Bound for the TCP connect.
    pub connect_timeout: Duration,
    /// Bound for registration and, separately, for the channel join.
    pub register_timeout: Duration,
    /// Bound for the QUIT handshake.
    pub quit_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::with_nickname(random_nickname())
    }
}

impl SessionConfig {
    /// Default timeouts with the given nickname.
    #[must_use]
    pub fn with_nickname(nickname: impl Into<String>) -> Self {
        let nickname = nickname.into();
        Self {
            username: nickname.clone(),
            nickname,
            realname: "subsplease-dl".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            register_timeout: DEFAULT_REGISTER_TIMEOUT,
            quit_grace: DEFAULT_QUIT_GRACE,
        }
    }
}

/// Nine letters drawn from "anonymous".
#[must_use]
pub fn random_nickname() -> String {
    const POOL: &[u8] = b"anonymous";
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| char::from(POOL[rng.gen_range(0..POOL.len())]))
        .collect()
}

/// Nickname tried after the server rejects the first one.
#[must_use]
pub fn alternate_nickname(nickname: &str) -> String {
    format!("{nickname}_")
}

/// Result of waiting on [`IrcSession::next_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A line from the server.
    Message(IrcMessage),
    /// Nothing arrived within the wait bound.
    Timeout,
}

/// What a server line means while registering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// `001 RPL_WELCOME`.
    Welcome,
    /// The nickname was refused (in use, erroneous, collision).
    NicknameRejected {
        /// Numeric code.
        code: String,
        /// Server text.
        reason: String,
    },
    /// Registration cannot succeed (banned, bad password, ERROR).
    Fatal {
        /// Numeric code or command.
        code: String,
        /// Server text.
        reason: String,
    },
    /// Unrelated line.
    Pending,
}

/// Classifies a line received during registration.
#[must_use]
pub fn registration_event(message: &IrcMessage) -> RegistrationEvent {
    let reason = || message.trailing().unwrap_or_default().to_string();
    match message.numeric() {
        Some(1) => RegistrationEvent::Welcome,
        Some(431 | 432 | 433 | 436 | 437) => RegistrationEvent::NicknameRejected {
            code: message.command.clone(),
            reason: reason(),
        },
        Some(463 | 464 | 465) => RegistrationEvent::Fatal {
            code: message.command.clone(),
            reason: reason(),
        },
        None if message.command == "ERROR" => RegistrationEvent::Fatal {
            code: message.command.clone(),
            reason: reason(),
        },
        _ => RegistrationEvent::Pending,
    }
}

/// What a server line means while joining a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinEvent {
    /// Membership confirmed by JOIN echo, topic or end of names.
    Joined,
    /// The server refused the join.
    Rejected {
        /// Numeric code.
        code: String,
        /// Server text.
        reason: String,
    },
    /// Unrelated line.
    Pending,
}

/// Classifies a line received after sending JOIN.
#[must_use]
pub fn join_event(message: &IrcMessage, channel: &str, nickname: &str) -> JoinEvent {
    let names_channel = |index: usize| message.param(index).is_some_and(|c| irc_eq(c, channel));
    match message.numeric() {
        Some(332 | 366) if names_channel(1) => JoinEvent::Joined,
        Some(403 | 405 | 471 | 473 | 474 | 475 | 477 | 489) if names_channel(1) => {
            JoinEvent::Rejected {
                code: message.command.clone(),
                reason: message.trailing().unwrap_or_default().to_string(),
            }
        }
        None if message.command == "JOIN"
            && names_channel(0)
            && message.source_nick().is_some_and(|n| irc_eq(n, nickname)) =>
        {
            JoinEvent::Joined
        }
        _ => JoinEvent::Pending,
    }
}

/// An IRC client connection owned by exactly one task.
#[derive(Debug)]
pub struct IrcSession {
    state: SessionState,
    welcomed: bool,
    nickname: String,
    channel: Option<String>,
    config: SessionConfig,
    outgoing: Option<mpsc::UnboundedSender<IrcMessage>>,
    incoming: mpsc::UnboundedReceiver<IrcMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl IrcSession {
    /// Connects over TCP, registers and joins the target channel.
    ///
    /// # Errors
    ///
    /// [`IrcError::Connect`] when the server is unreachable, otherwise any
    /// error from [`register`](Self::register) or [`join`](Self::join).
    #[instrument(skip(target, config), fields(network = %target))]
    pub async fn connect(target: &NetworkTarget, config: &SessionConfig) -> Result<Self, IrcError> {
        let connect_error = |source| IrcError::Connect {
            host: target.host.clone(),
            port: target.port,
            source,
        };
        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await
        .map_err(|_| connect_error(std::io::ErrorKind::TimedOut.into()))?
        .map_err(connect_error)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle on IRC socket");
        }
        debug!("TCP connection established");

        let mut session = Self::start(stream, config.clone());
        session.register().await?;
        session.join(&target.channel).await?;
        Ok(session)
    }

    /// Wraps an already connected transport. Nothing is sent yet.
    pub fn start<T>(io: T, config: SessionConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, IrcLineCodec::new()),
            in_tx,
            out_tx.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, IrcLineCodec::new()),
            out_rx,
        ));

        Self {
            state: SessionState::Connecting,
            welcomed: false,
            nickname: config.nickname.clone(),
            channel: None,
            config,
            outgoing: Some(out_tx),
            incoming: in_rx,
            reader,
            writer,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Nickname currently held on the server.
    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Channel joined, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// False once the server dropped the link or the session was closed.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !matches!(self.state, SessionState::Closing | SessionState::Closed)
            && !self.reader.is_finished()
    }

    /// Sends NICK/USER and waits for the welcome numeric.
    ///
    /// A rejected nickname is retried once with [`alternate_nickname`].
    ///
    /// # Errors
    ///
    /// [`IrcError::RegistrationRejected`] when the server refuses us,
    /// [`IrcError::Timeout`] when no welcome arrives in time.
    #[instrument(skip(self), fields(nickname = %self.nickname))]
    pub async fn register(&mut self) -> Result<(), IrcError> {
        self.expect_state(SessionState::Connecting)?;
        self.state = SessionState::Registering;
        self.send(IrcMessage::nick(&self.nickname))?;
        self.send(IrcMessage::user(&self.config.username, &self.config.realname))?;

        let bound = self.config.register_timeout;
        let deadline = Instant::now() + bound;
        let mut retried = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let SessionEvent::Message(message) = self.next_message(remaining).await? else {
                return Err(IrcError::Timeout {
                    stage: "registration",
                    secs: bound.as_secs(),
                });
            };

            match registration_event(&message) {
                RegistrationEvent::Welcome => {
                    if let Some(assigned) = message.param(0) {
                        self.nickname = assigned.to_string();
                    }
                    self.welcomed = true;
                    info!(nickname = %self.nickname, "registered");
                    return Ok(());
                }
                RegistrationEvent::NicknameRejected { code, reason } if !retried => {
                    retried = true;
                    let alternate = alternate_nickname(&self.nickname);
                    warn!(
                        %code,
                        %reason,
                        rejected = %self.nickname,
                        %alternate,
                        "nickname rejected, retrying"
                    );
                    self.nickname = alternate;
                    self.send(IrcMessage::nick(&self.nickname))?;
                }
                RegistrationEvent::NicknameRejected { code, reason }
                | RegistrationEvent::Fatal { code, reason } => {
                    return Err(IrcError::RegistrationRejected {
                        nickname: self.nickname.clone(),
                        code,
                        reason,
                    });
                }
                RegistrationEvent::Pending => {}
            }
        }
    }

    /// Joins `channel` and waits until the server confirms membership.
    ///
    /// # Errors
    ///
    /// [`IrcError::JoinRejected`] or [`IrcError::Timeout`].
    #[instrument(skip(self))]
    pub async fn join(&mut self, channel: &str) -> Result<(), IrcError> {
        if !self.welcomed {
            return Err(IrcError::InvalidState {
                expected: "registered",
                actual: self.state.as_str(),
            });
        }
        self.state = SessionState::Joined;
        self.send(IrcMessage::join(channel))?;

        let bound = self.config.register_timeout;
        let deadline = Instant::now() + bound;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let SessionEvent::Message(message) = self.next_message(remaining).await? else {
                return Err(IrcError::Timeout {
                    stage: "channel join",
                    secs: bound.as_secs(),
                });
            };

            match join_event(&message, channel, &self.nickname) {
                JoinEvent::Joined => {
                    self.channel = Some(channel.to_string());
                    self.state = SessionState::Active;
                    info!(%channel, "joined channel");
                    return Ok(());
                }
                JoinEvent::Rejected { code, reason } => {
                    return Err(IrcError::JoinRejected {
                        channel: channel.to_string(),
                        code,
                        reason,
                    });
                }
                JoinEvent::Pending => {}
            }
        }
    }

    /// Sends `PRIVMSG target :text`.
    ///
    /// # Errors
    ///
    /// [`IrcError::InvalidState`] outside `Active`, [`IrcError::ConnectionClosed`]
    /// when the writer is gone.
    pub fn send_private_message(&mut self, target: &str, text: &str) -> Result<(), IrcError> {
        self.expect_state(SessionState::Active)?;
        self.send(IrcMessage::privmsg(target, text))
    }

    /// Sends `NOTICE target :text`.
    ///
    /// # Errors
    ///
    /// Same as [`send_private_message`](Self::send_private_message).
    pub fn send_notice(&mut self, target: &str, text: &str) -> Result<(), IrcError> {
        self.expect_state(SessionState::Active)?;
        self.send(IrcMessage::notice(target, text))
    }

    /// Waits up to `wait` for the next forwarded server line.
    ///
    /// # Errors
    ///
    /// [`IrcError::ConnectionClosed`] once the server has dropped the link.
    pub async fn next_message(&mut self, wait: Duration) -> Result<SessionEvent, IrcError> {
        match tokio::time::timeout(wait, self.incoming.recv()).await {
            Err(_) => Ok(SessionEvent::Timeout),
            Ok(Some(message)) => Ok(SessionEvent::Message(message)),
            Ok(None) => {
                if self.state != SessionState::Closed {
                    warn!(state = self.state.as_str(), "IRC connection lost");
                }
                self.state = SessionState::Closed;
                Err(IrcError::ConnectionClosed)
            }
        }
    }

    /// Sends QUIT, waits briefly for the server to close, then releases the
    /// connection regardless of how the handshake went.
    #[instrument(skip(self), fields(nickname = %self.nickname))]
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            self.abort_tasks();
            return;
        }
        self.state = SessionState::Closing;

        if let Some(outgoing) = self.outgoing.take()
            && outgoing.send(IrcMessage::quit(QUIT_MESSAGE)).is_ok()
        {
            let incoming = &mut self.incoming;
            let drained = tokio::time::timeout(self.config.quit_grace, async {
                while incoming.recv().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                debug!("server did not close the link after QUIT");
            }
        }

        self.abort_tasks();
        self.state = SessionState::Closed;
        debug!("IRC session closed");
    }

    fn send(&self, message: IrcMessage) -> Result<(), IrcError> {
        trace!(line = %message, ">>");
        self.outgoing
            .as_ref()
            .ok_or(IrcError::ConnectionClosed)?
            .send(message)
            .map_err(|_| IrcError::ConnectionClosed)
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), IrcError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(IrcError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    fn abort_tasks(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for IrcSession {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

async fn read_loop<R>(
    mut lines: FramedRead<R, IrcLineCodec>,
    incoming: mpsc::UnboundedSender<IrcMessage>,
    outgoing: mpsc::UnboundedSender<IrcMessage>,
) where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = lines.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "IRC read failed");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        trace!(%line, "<<");

        let message = match IrcMessage::parse(&line) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "skipping unparseable line");
                continue;
            }
        };

        if message.command == "PING" {
            let token = message.param(0).unwrap_or_default();
            if outgoing.send(IrcMessage::pong(token)).is_err() {
                break;
            }
            continue;
        }

        // Channel chatter is never needed and would pile up during long transfers.
        if message.is_chat() && message.param(0).is_some_and(is_channel_name) {
            continue;
        }

        if incoming.send(message).is_err() {
            break;
        }
    }
    debug!("IRC reader finished");
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, IrcLineCodec>,
    mut outgoing: mpsc::UnboundedReceiver<IrcMessage>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outgoing.recv().await {
        let is_quit = message.command == "QUIT";
        if let Err(e) = sink.send(message).await {
            warn!(error = %e, "IRC write failed");
            break;
        }
        if is_quit {
            break;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "closing IRC writer failed");
    }
}
