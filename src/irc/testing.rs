//! Scripted IRC server for unit tests.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};

use super::{IrcSession, SessionConfig};

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// The server side of an in-memory IRC connection.
pub(crate) struct FakeServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    pub(crate) fn new(io: DuplexStream) -> Self {
        let (read, writer) = tokio::io::split(io);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    /// Next line sent by the client.
    pub(crate) async fn recv(&mut self) -> String {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }

    pub(crate) async fn expect(&mut self, line: &str) {
        assert_eq!(self.recv().await, line);
    }

    pub(crate) async fn say(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }
}

pub(crate) fn test_config(nickname: &str) -> SessionConfig {
    let mut config = SessionConfig::with_nickname(nickname);
    config.register_timeout = WAIT;
    config.quit_grace = Duration::from_millis(200);
    config
}

/// A session still in `Connecting` and its scripted peer.
pub(crate) fn pair(nickname: &str) -> (IrcSession, FakeServer) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (
        IrcSession::start(client, test_config(nickname)),
        FakeServer::new(server),
    )
}

/// A session already registered and joined to `#subsplease`.
pub(crate) async fn active_pair(nickname: &str) -> (IrcSession, FakeServer) {
    let (mut session, mut server) = pair(nickname);
    let nick = nickname.to_string();
    let script = tokio::spawn(async move {
        server.expect(&format!("NICK {nick}")).await;
        server.recv().await;
        server.say(&format!(":srv 001 {nick} :Welcome")).await;
        server.expect("JOIN #subsplease").await;
        server
            .say(&format!(":srv 366 {nick} #subsplease :End of /NAMES list."))
            .await;
        server
    });
    session.register().await.unwrap();
    session.join("#subsplease").await.unwrap();
    (session, script.await.unwrap())
}
