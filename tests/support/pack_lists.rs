//! Pack list texts in the format the release bots publish.

/// Wraps entry lines in the usual four header and two footer lines.
pub fn pack_list(bot: &str, entries: &[&str]) -> String {
    let mut text = format!(
        "** {} packs **  2 of 10 slots open, Record: 1.2MB/s\n\
         ** Bandwidth Usage ** Current: 0.0kB/s, Record: 1.2MB/s\n\
         ** To request a file, type \"/msg {bot} xdcc send #x\" **\n\
         ** To request details, type \"/msg {bot} xdcc info #x\" **\n",
        entries.len()
    );
    for entry in entries {
        text.push_str(entry);
        text.push('\n');
    }
    text.push_str("Total Offered: 5.6 GB  Total Transferred: 41.20 GB\n");
    text.push_str("** End of list **\n");
    text
}

pub fn arutha_1080p() -> String {
    pack_list(
        "ARUTHA-BATCH|1080p",
        &[
            "#1   12x [ 1.3G] [SubsPlease] No Game No Life - 01 (1080p) [C0FFEE01].mkv",
            "#2   10x [ 1.3G] [SubsPlease] No Game No Life - 02 (1080p) [C0FFEE02].mkv",
            "#3    9x [ 1.3G] [SubsPlease] No Game No Life - 03 (1080p) [C0FFEE03].mkv",
            "#4    9x [ 1.3G] [SubsPlease] No Game No Life - 04 (1080p) [C0FFEE04].mkv",
            "#5   31x [ 1.4G] [SubsPlease] Sousou no Frieren - 01 (1080p) [DEADBEEF].mkv",
        ],
    )
}

pub fn cr_holland() -> String {
    pack_list(
        "CR-HOLLAND|NEW",
        &[
            "#101 44x [ 717M] [SubsPlease] No Game No Life - 01 (720p) [0BADF00D].mkv",
            "#102 51x [ 1.3G] [SubsPlease] No Game No Life - 01 (1080p) [C0FFEE01].mkv",
            "#103  3x [ 1.4G] [SubsPlease] Oshi no Ko - 05 (1080p) [ABCDEF12].mkv",
        ],
    )
}

/// The filename announced for NGNL `episode` in 1080p.
pub fn ngnl_filename(episode: u32) -> String {
    format!("[SubsPlease] No Game No Life - {episode:02} (1080p) [C0FFEE{episode:02}].mkv")
}
