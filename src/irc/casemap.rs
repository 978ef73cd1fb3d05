//! RFC 1459 case mapping for nickname and channel comparison.
//!
//! Besides ASCII letters, `[]\~` fold onto `{}|^`, so `ARUTHA-BATCH|1080p`
//! and `arutha-batch\1080p` name the same bot.

/// Folds one character to IRC lowercase.
#[inline]
#[must_use]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => c.to_ascii_lowercase(),
        _ => c,
    }
}

/// Folds a string to IRC lowercase.
#[must_use]
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Case-insensitive IRC comparison.
#[must_use]
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .chars()
            .zip(b.chars())
            .all(|(ca, cb)| irc_lower_char(ca) == irc_lower_char(cb))
}
