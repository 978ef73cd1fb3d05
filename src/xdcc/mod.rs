//! XDCC pack requests on top of an [`IrcSession`](crate::irc::IrcSession).
//!
//! [`request_pack`] sends `XDCC SEND <pack>` and waits for the bot's
//! `DCC SEND` offer; [`negotiate_resume`] performs the `DCC RESUME` /
//! `DCC ACCEPT` exchange before a partial file is continued.

mod ctcp;
mod error;
mod handler;

pub use ctcp::{
    CTCP_DELIM, DccAccept, DccCommand, DccOffer, ctcp_body, dcc_resume_body, decode_dcc_address,
    encode_ctcp, parse_dcc, split_dcc_args,
};
pub use error::XdccError;
pub use handler::{
    BotReply, cancel_request, classify_reply, negotiate_resume, request_list, request_pack,
    strip_formatting,
};
