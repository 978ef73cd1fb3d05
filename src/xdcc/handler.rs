//! Pack requests: `XDCC SEND <pack>` and the bot's private reply.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::ctcp::{
    DccAccept, DccCommand, DccOffer, ctcp_body, dcc_resume_body, encode_ctcp, parse_dcc,
};
use super::XdccError;
use crate::irc::{IrcMessage, IrcSession, SessionEvent, irc_eq, is_channel_name};

/// Phrases announcing that the request was queued. Checked first: iroffer
/// prefixes some of them with "You can only have 1 transfer at a time".
const QUEUE_MARKERS: &[&str] = &["added you to", "queue position", "in position"];

/// Phrases with which XDCC bots refuse a request.
const DENIAL_MARKERS: &[&str] = &[
    "invalid pack",
    "no such pack",
    "denied",
    "you already requested",
    "you can only",
    "is full",
    "not allowed",
];

/// What a forwarded line means to a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotReply {
    /// The bot offered a file.
    Offer(DccOffer),
    /// The bot confirmed a resume position.
    Accept(DccAccept),
    /// The request sits in the bot's queue.
    Queued(String),
    /// The bot refused the request.
    Denied(String),
    /// Any other text from the bot ("Sending you pack ...").
    Info(String),
    /// A CTCP query from anyone, which we answer.
    CtcpQuery {
        /// Sender nickname.
        from: String,
        /// CTCP body.
        body: String,
    },
    /// Not addressed to us by the bot.
    Unrelated,
}

/// Classifies one forwarded line with respect to `bot`.
///
/// # Errors
///
/// [`XdccError::InvalidDcc`] for a malformed DCC message from the bot and
/// [`XdccError::UnsupportedOffer`] for a passive DCC offer.
pub fn classify_reply(message: &IrcMessage, bot: &str) -> Result<BotReply, XdccError> {
    if !message.is_chat() || message.param(0).is_none_or(is_channel_name) {
        return Ok(BotReply::Unrelated);
    }
    let (Some(from), Some(text)) = (message.source_nick(), message.trailing()) else {
        return Ok(BotReply::Unrelated);
    };
    let from_bot = irc_eq(from, bot);

    if let Some(body) = ctcp_body(text) {
        let is_dcc = body
            .get(..4)
            .is_some_and(|head| head.eq_ignore_ascii_case("DCC "));
        if from_bot && is_dcc {
            return match parse_dcc(body)? {
                DccCommand::Send(offer) => Ok(BotReply::Offer(offer)),
                DccCommand::Accept(accept) => Ok(BotReply::Accept(accept)),
                DccCommand::PassiveSend { .. } => Err(XdccError::UnsupportedOffer {
                    bot: bot.to_string(),
                    reason: "passive DCC is not supported",
                }),
                DccCommand::Other(_) => Ok(BotReply::Unrelated),
            };
        }
        if message.command == "PRIVMSG" {
            return Ok(BotReply::CtcpQuery {
                from: from.to_string(),
                body: body.to_string(),
            });
        }
        return Ok(BotReply::Unrelated);
    }

    if !from_bot {
        return Ok(BotReply::Unrelated);
    }
    let plain = strip_formatting(text);
    let lowered = plain.to_lowercase();
    if QUEUE_MARKERS.iter().any(|m| lowered.contains(m)) {
        Ok(BotReply::Queued(plain))
    } else if DENIAL_MARKERS.iter().any(|m| lowered.contains(m)) {
        Ok(BotReply::Denied(plain))
    } else {
        Ok(BotReply::Info(plain))
    }
}

/// Removes mIRC bold, colour, reverse, italic, underline and reset codes.
#[must_use]
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\x02' | '\x0f' | '\x16' | '\x1d' | '\x1f' => {}
            '\x03' => {
                for _ in 0..2 {
                    if chars.next_if(char::is_ascii_digit).is_none() {
                        break;
                    }
                }
                if chars.peek() == Some(&',') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                        for _ in 0..2 {
                            if chars.next_if(char::is_ascii_digit).is_none() {
                                break;
                            }
                        }
                    }
                }
            }
            c => out.push(c),
        }
    }
    out.trim().to_string()
}

/// Asks `bot` for `pack` and waits for its DCC offer.
///
/// Queue notices keep the request pending; the whole exchange is bounded by
/// `timeout`.
///
/// # Errors
///
/// [`XdccError::Denied`], [`XdccError::NoResponse`], an offer error from
/// [`classify_reply`], or a session error.
#[instrument(skip(session, timeout), fields(nickname = %session.nickname()))]
pub async fn request_pack(
    session: &mut IrcSession,
    bot: &str,
    pack: u32,
    timeout: Duration,
) -> Result<DccOffer, XdccError> {
    request(session, bot, &pack.to_string(), timeout).await
}

/// Asks `bot` for its pack list, which arrives as an ordinary DCC offer.
///
/// # Errors
///
/// Same as [`request_pack`].
#[instrument(skip(session, timeout))]
pub async fn request_list(
    session: &mut IrcSession,
    bot: &str,
    timeout: Duration,
) -> Result<DccOffer, XdccError> {
    request(session, bot, "list", timeout).await
}

async fn request(
    session: &mut IrcSession,
    bot: &str,
    item: &str,
    timeout: Duration,
) -> Result<DccOffer, XdccError> {
    session.send_private_message(bot, &format!("XDCC SEND {item}"))?;
    debug!(%bot, %item, "XDCC request sent");

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let SessionEvent::Message(message) = session.next_message(remaining).await? else {
            return Err(XdccError::NoResponse {
                bot: bot.to_string(),
                pack: item.to_string(),
                secs: timeout.as_secs(),
            });
        };

        match classify_reply(&message, bot)? {
            BotReply::Offer(offer) => {
                info!(%bot, pack = %item, %offer, "received DCC offer");
                return Ok(offer);
            }
            BotReply::Denied(text) => {
                return Err(XdccError::Denied {
                    bot: bot.to_string(),
                    pack: item.to_string(),
                    message: text,
                });
            }
            BotReply::Queued(text) => info!(%bot, pack = %item, notice = %text, "queued by bot"),
            BotReply::Info(text) => debug!(%bot, notice = %text, "bot notice"),
            BotReply::CtcpQuery { from, body } => answer_ctcp_query(session, &from, &body)?,
            BotReply::Accept(_) | BotReply::Unrelated => {}
        }
    }
}

/// Asks `bot` to continue `offer` from `position` and waits for the
/// matching `DCC ACCEPT`.
///
/// Returns `false` when no confirmation arrives within `timeout` or the bot
/// refuses, in which case the caller restarts from zero.
///
/// # Errors
///
/// Session errors only.
#[instrument(skip(session, offer, timeout), fields(file = %offer.filename))]
pub async fn negotiate_resume(
    session: &mut IrcSession,
    bot: &str,
    offer: &DccOffer,
    position: u64,
    timeout: Duration,
) -> Result<bool, XdccError> {
    session.send_private_message(bot, &encode_ctcp(&dcc_resume_body(offer, position)))?;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let SessionEvent::Message(message) = session.next_message(remaining).await? else {
            warn!(%bot, position, "no DCC ACCEPT received");
            return Ok(false);
        };

        match classify_reply(&message, bot) {
            Ok(BotReply::Accept(accept))
                if accept.port == offer.port && accept.position == position =>
            {
                info!(%bot, position, "resume accepted");
                return Ok(true);
            }
            Ok(BotReply::Accept(accept)) => {
                debug!(
                    port = accept.port,
                    position = accept.position,
                    "ignoring DCC ACCEPT for another offer"
                );
            }
            Ok(BotReply::Denied(text)) => {
                warn!(%bot, notice = %text, "resume refused");
                return Ok(false);
            }
            Ok(BotReply::CtcpQuery { from, body }) => answer_ctcp_query(session, &from, &body)?,
            Ok(_) => {}
            Err(e) => debug!(error = %e, "ignoring bot message while waiting for ACCEPT"),
        }
    }
}

/// Drops whatever `bot` holds for us: the queued request and any pending
/// offer. Used after a request timed out so a late offer cannot be mistaken
/// for the reply to the next request.
///
/// # Errors
///
/// Session errors only.
pub fn cancel_request(session: &mut IrcSession, bot: &str) -> Result<(), XdccError> {
    session.send_private_message(bot, "XDCC REMOVE")?;
    session.send_private_message(bot, "XDCC CANCEL")?;
    debug!(%bot, "sent XDCC REMOVE/CANCEL");
    Ok(())
}

/// Replies to CTCP VERSION and PING; other queries are ignored.
fn answer_ctcp_query(session: &mut IrcSession, from: &str, body: &str) -> Result<(), XdccError> {
    let command = body.split_whitespace().next().unwrap_or_default();
    let reply = if command.eq_ignore_ascii_case("VERSION") {
        format!("VERSION subsplease-dl {}", env!("CARGO_PKG_VERSION"))
    } else if command.eq_ignore_ascii_case("PING") {
        body.to_string()
    } else {
        debug!(%from, query = %command, "ignoring CTCP query");
        return Ok(());
    };
    session.send_notice(from, &encode_ctcp(&reply))?;
    Ok(())
}
