//! CTCP framing and the DCC SEND / RESUME / ACCEPT control messages.
//!
//! A CTCP message is a PRIVMSG or NOTICE body wrapped in `\x01` bytes. DCC
//! arguments are whitespace separated; a filename containing spaces is
//! double-quoted.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use super::XdccError;

/// The CTCP delimiter byte.
pub const CTCP_DELIM: char = '\x01';

/// Extracts the body of a CTCP message, or `None` for plain text.
///
/// A missing closing delimiter is tolerated.
#[must_use]
pub fn ctcp_body(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(CTCP_DELIM)?;
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    (!inner.is_empty()).then_some(inner)
}

/// Wraps `body` in CTCP delimiters.
#[must_use]
pub fn encode_ctcp(body: &str) -> String {
    format!("{CTCP_DELIM}{body}{CTCP_DELIM}")
}

/// A file offer announced by `DCC SEND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccOffer {
    /// Address the peer listens on.
    pub address: IpAddr,
    /// Port the peer listens on.
    pub port: u16,
    /// Filename announced by the peer.
    pub filename: String,
    /// Total size in bytes.
    pub size: u64,
}

impl fmt::Display for DccOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes) from {}:{}",
            self.filename, self.size, self.address, self.port
        )
    }
}

/// A `DCC ACCEPT` confirming a resume position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccAccept {
    /// Filename echoed by the peer (often a placeholder).
    pub filename: String,
    /// Port of the original offer.
    pub port: u16,
    /// Confirmed byte offset.
    pub position: u64,
}

/// A parsed DCC control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DccCommand {
    /// `DCC SEND`
    Send(DccOffer),
    /// `DCC ACCEPT`
    Accept(DccAccept),
    /// `DCC SEND` with port 0: the peer wants us to listen (reverse DCC).
    PassiveSend {
        /// Filename announced by the peer.
        filename: String,
    },
    /// Any other DCC sub-command (CHAT, RESUME, ...).
    Other(String),
}

/// Parses a CTCP body starting with `DCC`.
///
/// # Errors
///
/// [`XdccError::InvalidDcc`] for bodies that are not DCC or have missing or
/// malformed fields.
pub fn parse_dcc(body: &str) -> Result<DccCommand, XdccError> {
    let args = split_dcc_args(body)?;
    let mut fields = args.iter().map(String::as_str);
    if !fields.next().is_some_and(|word| word.eq_ignore_ascii_case("DCC")) {
        return Err(XdccError::invalid(body, "not a DCC message"));
    }
    let Some(sub_command) = fields.next() else {
        return Err(XdccError::invalid(body, "missing DCC sub-command"));
    };

    match sub_command.to_ascii_uppercase().as_str() {
        "SEND" => {
            let (Some(filename), Some(address), Some(port)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(XdccError::invalid(body, "DCC SEND needs filename, address and port"));
            };
            let port = parse_port(body, port)?;
            if port == 0 {
                return Ok(DccCommand::PassiveSend {
                    filename: filename.to_string(),
                });
            }
            let address = decode_dcc_address(address)
                .ok_or_else(|| XdccError::invalid(body, "unrecognized address"))?;
            let size = fields
                .next()
                .ok_or_else(|| XdccError::invalid(body, "DCC SEND without file size"))?
                .parse::<u64>()
                .map_err(|_| XdccError::invalid(body, "file size is not a number"))?;
            Ok(DccCommand::Send(DccOffer {
                address,
                port,
                filename: filename.to_string(),
                size,
            }))
        }
        "ACCEPT" => {
            let (Some(filename), Some(port), Some(position)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(XdccError::invalid(
                    body,
                    "DCC ACCEPT needs filename, port and position",
                ));
            };
            Ok(DccCommand::Accept(DccAccept {
                filename: filename.to_string(),
                port: parse_port(body, port)?,
                position: position
                    .parse()
                    .map_err(|_| XdccError::invalid(body, "position is not a number"))?,
            }))
        }
        other => Ok(DccCommand::Other(other.to_string())),
    }
}

fn parse_port(body: &str, value: &str) -> Result<u16, XdccError> {
    value
        .parse()
        .map_err(|_| XdccError::invalid(body, "port is not a number"))
}

/// Decodes the address field of a DCC SEND.
///
/// Classic clients send IPv4 as a decimal 32-bit integer in network byte
/// order (`2130706433` is `127.0.0.1`); newer ones send a literal address.
/// This is the only place that knows about the integer form.
#[must_use]
pub fn decode_dcc_address(token: &str) -> Option<IpAddr> {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse::<u32>().ok().map(|n| IpAddr::V4(Ipv4Addr::from(n)));
    }
    token.parse().ok()
}

/// Body of the `DCC RESUME` we send to ask for `position` onwards.
#[must_use]
pub fn dcc_resume_body(offer: &DccOffer, position: u64) -> String {
    format!(
        "DCC RESUME {} {} {position}",
        quote_filename(&offer.filename),
        offer.port
    )
}

fn quote_filename(name: &str) -> String {
    if name.contains(char::is_whitespace) {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        name.to_string()
    }
}

/// Splits DCC arguments on whitespace, honouring double quotes and
/// backslash escapes inside them.
///
/// # Errors
///
/// [`XdccError::InvalidDcc`] for an unterminated quote.
pub fn split_dcc_args(body: &str) -> Result<Vec<String>, XdccError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => current.push(escaped),
                            None => return Err(XdccError::invalid(body, "unterminated quote")),
                        },
                        Some(c) => current.push(c),
                        None => return Err(XdccError::invalid(body, "unterminated quote")),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}
