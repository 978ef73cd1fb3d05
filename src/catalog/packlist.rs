//! XDCC pack list parsing.
//!
//! A list looks like
//!
//! ```text
//! ** 4 packs **  1 of 5 slots open ...
//! ** Bandwidth Usage ** ...
//! ** To request a file, type "/MSG BOT XDCC SEND x" **
//! Total Offered: ...
//! #1   142x [1.4G] [SubsPlease] No Game No Life - 01 (1080p) [A1B2C3D4].mkv
//! ...
//! Total Transferred: ...
//! ```
//!
//! The first four and the last two lines are header and footer.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::ReleaseOffer;
use crate::irc::NetworkTarget;

const HEADER_LINES: usize = 4;
const FOOTER_LINES: usize = 2;

#[allow(clippy::expect_used)]
static PACK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    // pack, downloads, size, unit, filename, group, title, episode, resolution
    Regex::new(
        r"^#(\d+)\s+(\d+)x\s+\[([\d. ]+)([A-Za-z])\]\s+(\[([^\]]+)\] (.+?)(?: - (.+?))? [\[(](\w+)[\])].*\.\w+)",
    )
    .expect("pack line regex is valid") // Static pattern, safe to panic
});

/// Parses a whole list, skipping header, footer and malformed lines.
#[must_use]
pub fn parse_pack_list(text: &str, bot: &str, network: &NetworkTarget) -> Vec<ReleaseOffer> {
    let lines: Vec<&str> = text.lines().collect();
    let end = lines.len().saturating_sub(FOOTER_LINES);
    lines
        .get(HEADER_LINES..end)
        .unwrap_or_default()
        .iter()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_pack_line(line, bot, network);
            if parsed.is_none() {
                warn!(%bot, line = %line.trim_end(), "skipping malformed pack list line");
            }
            parsed
        })
        .collect()
}

/// Parses one entry line.
#[must_use]
pub fn parse_pack_line(line: &str, bot: &str, network: &NetworkTarget) -> Option<ReleaseOffer> {
    let caps = PACK_LINE.captures(line.trim())?;
    let pack = caps[1].parse().ok()?;
    let downloads = caps[2].parse().ok()?;
    let size_bytes = parse_size(&caps[3], &caps[4])?;
    let episode_label = caps.get(8).map(|m| m.as_str().to_string());

    Some(ReleaseOffer {
        title: caps[7].to_string(),
        episode: episode_label.as_deref().and_then(episode_number),
        episode_label,
        resolution: caps[9].to_string(),
        group: caps[6].to_string(),
        bot: bot.to_string(),
        pack,
        filename: caps[5].to_string(),
        size_bytes,
        downloads,
        network: network.clone(),
    })
}

/// Converts `1.4` + `G` into bytes. Units are powers of 1024.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn parse_size(amount: &str, unit: &str) -> Option<u64> {
    let amount: f64 = amount.trim().parse().ok()?;
    let scale: u64 = match unit.to_ascii_uppercase().as_str() {
        "B" => 1,
        "K" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        _ => return None,
    };
    (amount >= 0.0).then(|| (amount * scale as f64) as u64)
}

/// Numeric episode of a label: `07` and `12v2` have one, batch ranges and
/// specials do not.
#[must_use]
pub fn episode_number(label: &str) -> Option<u32> {
    let split = label
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(label.len());
    let (digits, rest) = label.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let versioned = rest
        .strip_prefix(['v', 'V'])
        .is_some_and(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()));
    if !rest.is_empty() && !versioned {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn network() -> NetworkTarget {
        NetworkTarget::default()
    }

    #[test]
    fn test_parse_episode_line() {
        let offer = parse_pack_line(
            "#12   1423x [1.4G] [SubsPlease] No Game No Life - 04 (1080p) [A1B2C3D4].mkv",
            "ARUTHA-BATCH|1080p",
            &network(),
        )
        .unwrap();
        assert_eq!(offer.pack, 12);
        assert_eq!(offer.downloads, 1423);
        assert_eq!(offer.size_bytes, (1.4 * f64::from(1u32 << 30)) as u64);
        assert_eq!(offer.group, "SubsPlease");
        assert_eq!(offer.title, "No Game No Life");
        assert_eq!(offer.episode_label.as_deref(), Some("04"));
        assert_eq!(offer.episode, Some(4));
        assert_eq!(offer.resolution, "1080p");
        assert_eq!(
            offer.filename,
            "[SubsPlease] No Game No Life - 04 (1080p) [A1B2C3D4].mkv"
        );
    }

    #[test]
    fn test_parse_line_with_padded_size_and_square_resolution() {
        let offer = parse_pack_line(
            "#3  10x [ 350M] [SubsPlease] Frieren - 12v2 [720p] [FFFF0000].mkv",
            "CR-HOLLAND|NEW",
            &network(),
        )
        .unwrap();
        assert_eq!(offer.size_bytes, 350 << 20);
        assert_eq!(offer.episode, Some(12));
        assert_eq!(offer.resolution, "720p");
    }

    #[test]
    fn test_parse_batch_line_has_no_episode_number() {
        let offer = parse_pack_line(
            "#7 5x [15G] [SubsPlease] Kanojo, Okarishimasu (01-12) (1080p) [Batch].mkv",
            "ARUTHA-BATCH|1080p",
            &network(),
        )
        .unwrap();
        assert_eq!(offer.title, "Kanojo, Okarishimasu (01-12)");
        assert_eq!(offer.episode, None);
        assert_eq!(offer.episode_label, None);
    }

    #[test]
    fn test_parse_list_skips_header_footer_and_garbage() {
        let text = "\
** 3 packs **  1 of 5 slots open
** Bandwidth Usage ** Current: 0.0kB/s
** To request a file, type \"/MSG BOT XDCC SEND x\" **
Total Offered: 3.0 GB  Total Transferred: 9 TB
#1 1x [1.0G] [SubsPlease] Show - 01 (1080p) [AAAA].mkv
this line is not a pack
#2 1x [1.0G] [SubsPlease] Show - 02 (1080p) [BBBB].mkv
Total Transferred: 9 TB
** end **
";
        let offers = parse_pack_list(text, "bot", &network());
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[1].episode, Some(2));
        assert!(parse_pack_list("too\nshort", "bot", &network()).is_empty());
    }

    #[test]
    fn test_episode_number() {
        assert_eq!(episode_number("07"), Some(7));
        assert_eq!(episode_number("12v2"), Some(12));
        assert_eq!(episode_number("01-12"), None);
        assert_eq!(episode_number("12.5"), None);
        assert_eq!(episode_number("SP"), None);
        assert_eq!(episode_number("3v"), None);
    }
}
