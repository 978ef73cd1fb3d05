//! Progress bars for DCC transfers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use subsplease_core::TransferObserver;

const BAR_TEMPLATE: &str =
    "{msg:40!} [{bar:30}] {bytes}/{total_bytes} {binary_bytes_per_sec} eta {eta}";

/// One bar per destination under a shared [`MultiProgress`].
pub(crate) struct ProgressBars {
    multi: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
    style: ProgressStyle,
}

impl ProgressBars {
    /// Bars drawn on stderr.
    pub(crate) fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }

    fn bar(&self, destination: &Path) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(destination)
            .cloned()
    }
}

impl TransferObserver for ProgressBars {
    fn started(&self, destination: &Path, offset: u64, total: u64) {
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(self.style.clone());
        bar.set_position(offset);
        bar.set_message(
            destination
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(destination.to_path_buf(), bar);
    }

    fn advanced(&self, destination: &Path, received: u64, _total: u64) {
        if let Some(bar) = self.bar(destination) {
            bar.set_position(received);
        }
    }

    fn finished(&self, destination: &Path, complete: bool) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(destination);
        if let Some(bar) = bar {
            if complete {
                bar.finish();
            } else {
                bar.abandon();
            }
        }
    }
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_show_bars(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}
