//! IRC message model: `[:prefix] COMMAND param... [:trailing]`.
//!
//! IRCv3 message tags are accepted on input and discarded; nothing in this
//! tool needs them.

use std::fmt;
use std::str::FromStr;

use super::IrcError;

/// One parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// Source of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command word or three-digit numeric, uppercased.
    pub command: String,
    /// Parameters, with the trailing parameter last.
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Builds a message without a prefix.
    pub fn new<I, S>(command: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: None,
            command: command.to_ascii_uppercase(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// `NICK <nickname>`
    #[must_use]
    pub fn nick(nickname: &str) -> Self {
        Self::new("NICK", [nickname])
    }

    /// `USER <username> 0 * :<realname>`
    #[must_use]
    pub fn user(username: &str, realname: &str) -> Self {
        Self::new("USER", [username, "0", "*", realname])
    }

    /// `JOIN <channel>`
    #[must_use]
    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", [channel])
    }

    /// `PRIVMSG <target> :<text>`
    #[must_use]
    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", [target, text])
    }

    /// `NOTICE <target> :<text>`
    #[must_use]
    pub fn notice(target: &str, text: &str) -> Self {
        Self::new("NOTICE", [target, text])
    }

    /// `PONG :<token>`
    #[must_use]
    pub fn pong(token: &str) -> Self {
        Self::new("PONG", [token])
    }

    /// `QUIT :<reason>`
    #[must_use]
    pub fn quit(reason: &str) -> Self {
        Self::new("QUIT", [reason])
    }

    /// Parses a single line (trailing CR/LF allowed).
    ///
    /// # Errors
    ///
    /// Returns [`IrcError::Parse`] for empty lines or lines without a command.
    pub fn parse(line: &str) -> Result<Self, IrcError> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let mut rest = trimmed;

        if let Some(tagged) = rest.strip_prefix('@') {
            rest = tagged.split_once(' ').map_or("", |(_, after)| after);
        }
        rest = rest.trim_start_matches(' ');

        let prefix = match rest.strip_prefix(':') {
            Some(with_prefix) => {
                let (prefix, after) = with_prefix.split_once(' ').unwrap_or((with_prefix, ""));
                if prefix.is_empty() {
                    return Err(parse_error(trimmed, "empty prefix"));
                }
                rest = after.trim_start_matches(' ');
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(parse_error(trimmed, "missing command"));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, after) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = after;
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nickname part of the prefix (`nick` in `nick!user@host`).
    #[must_use]
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        (!nick.is_empty()).then_some(nick)
    }

    /// Numeric reply code, if the command is a three-digit numeric.
    #[must_use]
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Parameter at `index`, if present.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Last parameter (usually the human-readable text).
    #[must_use]
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Returns true for PRIVMSG and NOTICE.
    #[must_use]
    pub fn is_chat(&self) -> bool {
        matches!(self.command.as_str(), "PRIVMSG" | "NOTICE")
    }
}

fn parse_error(line: &str, reason: &'static str) -> IrcError {
    IrcError::Parse {
        line: line.to_string(),
        reason,
    }
}

/// Wire form without the CRLF terminator.
impl fmt::Display for IrcMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;

        let last = self.params.len().saturating_sub(1);
        for (index, param) in self.params.iter().enumerate() {
            let needs_colon = index == last
                && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for IrcMessage {
    type Err = IrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Returns true when `target` names a channel rather than a user.
#[must_use]
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_prefix_and_trailing() {
        let line = ":CR-HOLLAND|NEW!bot@subsplease PRIVMSG me :hello there\r\n";
        let msg = IrcMessage::parse(line).unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("CR-HOLLAND|NEW!bot@subsplease"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["me", "hello there"]);
        assert_eq!(msg.source_nick(), Some("CR-HOLLAND|NEW"));
    }

    #[test]
    fn test_parse_ping_without_prefix() {
        let msg = IrcMessage::parse("PING :irc.rizon.net").unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.trailing(), Some("irc.rizon.net"));
        assert!(msg.prefix.is_none());
    }

    #[test]
    fn test_parse_numeric_reply() {
        let msg = IrcMessage::parse(":server 001 nick :Welcome to Rizon").unwrap();
        assert_eq!(msg.numeric(), Some(1));
        assert_eq!(msg.param(0), Some("nick"));
    }

    #[test]
    fn test_parse_discards_tags() {
        let msg = IrcMessage::parse("@time=2024-01-01T00:00:00Z :n!u@h JOIN #subsplease").unwrap();
        assert_eq!(msg.command, "JOIN");
        assert_eq!(msg.params, vec!["#subsplease"]);
    }

    #[test]
    fn test_parse_rejects_empty_lines() {
        assert!(IrcMessage::parse("\r\n").is_err());
        assert!(IrcMessage::parse(": PRIVMSG x").is_err());
    }

    #[test]
    fn test_display_quotes_trailing_with_spaces() {
        let msg = IrcMessage::privmsg("CR-HOLLAND|NEW", "XDCC SEND 42");
        assert_eq!(msg.to_string(), "PRIVMSG CR-HOLLAND|NEW :XDCC SEND 42");
        assert_eq!(IrcMessage::nick("abc").to_string(), "NICK abc");
        assert_eq!(
            IrcMessage::user("abc", "abc").to_string(),
            "USER abc 0 * abc"
        );
    }

    #[test]
    fn test_display_then_parse_preserves_params() {
        let msg = IrcMessage::quit("");
        let reparsed = IrcMessage::parse(&msg.to_string()).unwrap();
        assert_eq!(reparsed.params, vec![String::new()]);
    }

    #[test]
    fn test_is_channel_name() {
        assert!(is_channel_name("#subsplease"));
        assert!(!is_channel_name("CR-HOLLAND|NEW"));
    }
}
