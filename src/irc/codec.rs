//! Line codec for the IRC control connection.
//!
//! Lines are terminated by LF (an optional preceding CR is stripped).
//! Bytes that are not valid UTF-8 are decoded as Latin-1, which is what most
//! XDCC bots use when announcing filenames.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{IrcError, IrcMessage};

/// Default maximum accepted line length in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Decodes raw lines and encodes [`IrcMessage`]s with CRLF terminators.
#[derive(Debug, Clone)]
pub struct IrcLineCodec {
    next_index: usize,
    max_len: usize,
}

impl Default for IrcLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl IrcLineCodec {
    /// Creates a codec with the default line limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LENGTH)
    }

    /// Creates a codec with a custom line limit.
    #[must_use]
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

/// Decodes bytes as UTF-8, falling back to Latin-1.
#[must_use]
pub fn decode_line_bytes(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

impl Decoder for IrcLineCodec {
    type Item = String;
    type Error = IrcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, IrcError> {
        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            self.next_index = src.len();
            if src.len() > self.max_len {
                return Err(IrcError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            return Ok(None);
        };

        let line = src.split_to(self.next_index + offset + 1);
        self.next_index = 0;
        if line.len() > self.max_len {
            return Err(IrcError::LineTooLong {
                actual: line.len(),
                limit: self.max_len,
            });
        }

        let mut end = line.len() - 1;
        if end > 0 && line[end - 1] == b'\r' {
            end -= 1;
        }
        Ok(Some(decode_line_bytes(&line[..end])))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, IrcError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        // A final unterminated line is dropped; IRC always terminates lines.
        src.clear();
        self.next_index = 0;
        Ok(None)
    }
}

impl Encoder<IrcMessage> for IrcLineCodec {
    type Error = IrcError;

    fn encode(&mut self, message: IrcMessage, dst: &mut BytesMut) -> Result<(), IrcError> {
        let line = message.to_string();
        if line.contains(['\r', '\n']) {
            return Err(IrcError::Parse {
                line,
                reason: "outgoing message contains a line break",
            });
        }
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
