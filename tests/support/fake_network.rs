//! A scripted IRC server hosting XDCC bots, for end-to-end tests.
//!
//! The server speaks just enough IRC for registration and join, answers
//! `XDCC SEND` with `DCC SEND` offers served from 127.0.0.1, and records
//! every line it receives so tests can assert on the client's traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use subsplease_core::NetworkTarget;
use subsplease_core::dcc::TransferLimits;
use subsplease_core::irc::{IrcMessage, SessionConfig};
use subsplease_core::orchestrator::RunSettings;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

/// 127.0.0.1 in the DCC integer notation.
const LOOPBACK_DCC: u32 = 2_130_706_433;

pub const CHANNEL: &str = "#subsplease";

/// How a bot answers a request for one pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Offer the pack and stream all of it.
    Serve,
    /// Announce a queue slot first, then offer the pack.
    QueueThenServe,
    /// Offer the pack but close the data connection after this many bytes.
    Truncate(usize),
    /// Refuse the pack.
    Deny,
    /// Never answer.
    Silent,
    /// Drop the whole IRC connection.
    DropSession,
}

#[derive(Debug, Clone)]
pub struct Pack {
    pub filename: String,
    pub payload: Vec<u8>,
    pub behavior: Behavior,
}

#[derive(Debug, Clone)]
pub struct FakeBot {
    pub name: String,
    pub packs: HashMap<String, Pack>,
    pub accept_resume: bool,
    pub one_transfer_per_user: bool,
}

impl FakeBot {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            packs: HashMap::new(),
            accept_resume: true,
            one_transfer_per_user: false,
        }
    }

    /// Adds pack `number` (or `list`).
    pub fn pack(
        mut self,
        number: &str,
        filename: &str,
        payload: &[u8],
        behavior: Behavior,
    ) -> Self {
        self.packs.insert(
            number.to_string(),
            Pack {
                filename: filename.to_string(),
                payload: payload.to_vec(),
                behavior,
            },
        );
        self
    }

    /// Serves `text` as the bot's pack list.
    pub fn with_list(self, text: &str) -> Self {
        let filename = format!("{}.txt", self.name.replace('|', "."));
        self.pack("list", &filename, text.as_bytes(), Behavior::Serve)
    }

    pub fn ignoring_resume(mut self) -> Self {
        self.accept_resume = false;
        self
    }

    /// Denies a new request while an earlier offer is open, like iroffer's
    /// per-user transfer limit. `XDCC CANCEL` frees the slot.
    pub fn one_transfer_per_user(mut self) -> Self {
        self.one_transfer_per_user = true;
        self
    }
}

#[derive(Default)]
struct Stats {
    lines: Mutex<Vec<String>>,
    irc_connections: AtomicUsize,
    data_connections: AtomicUsize,
}

/// A running fake network.
pub struct FakeNetwork {
    pub target: NetworkTarget,
    stats: Arc<Stats>,
}

impl FakeNetwork {
    /// Starts the server; it sends `PING :keepalive` after every join.
    pub async fn spawn(bots: Vec<FakeBot>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let bots: Arc<HashMap<String, FakeBot>> = Arc::new(
            bots.into_iter()
                .map(|bot| (bot.name.to_lowercase(), bot))
                .collect(),
        );
        let stats = Arc::new(Stats::default());

        let accept_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_stats.irc_connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_client(
                    stream,
                    Arc::clone(&bots),
                    Arc::clone(&accept_stats),
                ));
            }
        });

        Self {
            target: NetworkTarget::new("127.0.0.1", port, CHANNEL),
            stats,
        }
    }

    /// Every line received so far, across connections.
    pub fn lines(&self) -> Vec<String> {
        self.stats.lines.lock().unwrap().clone()
    }

    pub fn irc_connections(&self) -> usize {
        self.stats.irc_connections.load(Ordering::SeqCst)
    }

    pub fn data_connections(&self) -> usize {
        self.stats.data_connections.load(Ordering::SeqCst)
    }
}

/// A target where nothing listens.
pub async fn unreachable_target() -> NetworkTarget {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    NetworkTarget::new("127.0.0.1", port, CHANNEL)
}

pub fn session_config() -> SessionConfig {
    let mut config = SessionConfig::with_nickname("tester");
    config.connect_timeout = Duration::from_secs(5);
    config.register_timeout = Duration::from_secs(5);
    config.quit_grace = Duration::from_millis(200);
    config
}

pub fn run_settings() -> RunSettings {
    RunSettings {
        concurrency: 1,
        reply_timeout: Duration::from_secs(5),
        resume_timeout: Duration::from_millis(500),
        limits: TransferLimits {
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(5),
        },
    }
}

async fn say(writer: &mut OwnedWriteHalf, line: &str) {
    let _ = writer.write_all(format!("{line}\r\n").as_bytes()).await;
}

async fn serve_client(
    stream: TcpStream,
    bots: Arc<HashMap<String, FakeBot>>,
    stats: Arc<Stats>,
) {
    let (read, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut nick = String::from("*");
    let mut offsets: HashMap<u16, Arc<AtomicU64>> = HashMap::new();
    // Set while an offer of any bot is open for this client.
    let busy = Arc::new(AtomicBool::new(false));

    while let Ok(Some(line)) = lines.next_line().await {
        stats.lines.lock().unwrap().push(line.clone());
        let Ok(message) = IrcMessage::parse(&line) else {
            continue;
        };
        match message.command.as_str() {
            "NICK" => nick = message.param(0).unwrap_or("*").to_string(),
            "USER" => say(&mut writer, &format!(":fake.irc 001 {nick} :Welcome")).await,
            "JOIN" => {
                let channel = message.param(0).unwrap_or(CHANNEL);
                say(&mut writer, &format!(":{nick}!u@test JOIN {channel}")).await;
                say(
                    &mut writer,
                    &format!(":fake.irc 366 {nick} {channel} :End of /NAMES list."),
                )
                .await;
                say(&mut writer, "PING :keepalive").await;
            }
            "PRIVMSG" => {
                let (Some(target), Some(text)) = (message.param(0), message.param(1)) else {
                    continue;
                };
                let Some(bot) = bots.get(&target.to_lowercase()) else {
                    continue;
                };
                let from = format!(":{}!bot@fake", bot.name);

                if let Some(body) = text.strip_prefix('\x01').and_then(|t| t.strip_suffix('\x01')) {
                    if let Some(rest) = body.strip_prefix("DCC RESUME ")
                        && bot.accept_resume
                    {
                        let mut fields = rest.rsplitn(3, ' ');
                        let (Some(position), Some(port), Some(filename)) =
                            (fields.next(), fields.next(), fields.next())
                        else {
                            continue;
                        };
                        if let (Ok(position), Ok(port_number)) =
                            (position.parse::<u64>(), port.parse::<u16>())
                            && let Some(offset) = offsets.get(&port_number)
                        {
                            offset.store(position, Ordering::SeqCst);
                            let accept = format!("\x01DCC ACCEPT {filename} {port} {position}\x01");
                            say(&mut writer, &format!("{from} PRIVMSG {nick} :{accept}")).await;
                        }
                    }
                    continue;
                }

                if text == "XDCC CANCEL" {
                    busy.store(false, Ordering::SeqCst);
                    continue;
                }
                let Some(item) = text.strip_prefix("XDCC SEND ") else {
                    continue;
                };
                let Some(pack) = bot.packs.get(item.trim_start_matches('#')) else {
                    let notice = "** Invalid Pack Number, Try Again";
                    say(&mut writer, &format!("{from} NOTICE {nick} :{notice}")).await;
                    continue;
                };
                if bot.one_transfer_per_user && busy.load(Ordering::SeqCst) {
                    let notice = "** You can only have 1 transfer at a time, denied";
                    say(&mut writer, &format!("{from} NOTICE {nick} :{notice}")).await;
                    continue;
                }

                let limit = match pack.behavior {
                    Behavior::Deny => {
                        let notice =
                            format!("** You can only request packs while in {CHANNEL}, denied");
                        say(&mut writer, &format!("{from} NOTICE {nick} :{notice}")).await;
                        continue;
                    }
                    Behavior::Silent => continue,
                    Behavior::DropSession => break,
                    Behavior::QueueThenServe => {
                        let notice = format!(
                            "** All Slots Full, Added you to the main queue for pack {item} in position 1"
                        );
                        say(&mut writer, &format!("{from} NOTICE {nick} :{notice}")).await;
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        pack.payload.len()
                    }
                    Behavior::Truncate(bytes) => bytes.min(pack.payload.len()),
                    Behavior::Serve => pack.payload.len(),
                };

                let offset = Arc::new(AtomicU64::new(0));
                busy.store(true, Ordering::SeqCst);
                let port = serve_data(
                    Arc::new(pack.payload.clone()),
                    limit,
                    Arc::clone(&offset),
                    Arc::clone(&busy),
                    Arc::clone(&stats),
                )
                .await;
                offsets.insert(port, offset);
                say(
                    &mut writer,
                    &format!(
                        "{from} PRIVMSG {nick} :\x01DCC SEND \"{}\" {LOOPBACK_DCC} {port} {}\x01",
                        pack.filename,
                        pack.payload.len()
                    ),
                )
                .await;
            }
            "QUIT" => break,
            _ => {}
        }
    }
}

/// Listens for one DCC connection and streams `payload[offset..limit]`.
/// Clears `busy` once the transfer is over.
async fn serve_data(
    payload: Arc<Vec<u8>>,
    limit: usize,
    offset: Arc<AtomicU64>,
    busy: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        stats.data_connections.fetch_add(1, Ordering::SeqCst);
        let start = usize::try_from(offset.load(Ordering::SeqCst)).unwrap().min(limit);
        if socket.write_all(&payload[start..limit]).await.is_ok() {
            // Close only once the receiver holds everything we sent.
            let mut ack = [0u8; 4];
            while socket.read_exact(&mut ack).await.is_ok() {
                if u32::from_be_bytes(ack) as usize >= limit {
                    break;
                }
            }
        }
        busy.store(false, Ordering::SeqCst);
    });
    port
}
