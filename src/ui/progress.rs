//! Download progress display.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::fetch::Fetcher;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// A progress bar fed by the fetcher's byte callback.
///
/// The bar switches to a definite style once the first callback reports a
/// total from `Content-Length`; without one it stays a spinner with a byte
/// counter.
pub struct DownloadProgress {
    bar: ProgressBar,
    sized: bool,
}

impl DownloadProgress {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::no_length();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} {bytes}")
                .expect("valid template"),
        );
        bar.set_message(label.to_string());
        Self { bar, sized: false }
    }

    /// Feed one progress update.
    pub fn update(&mut self, received: u64, total: Option<u64>) {
        if let Some(total) = total {
            if !self.sized {
                self.bar.set_length(total);
                self.bar.set_style(
                    ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes}")
                        .expect("valid template"),
                );
                self.sized = true;
            }
        }
        self.bar.set_position(received);
    }

    /// Finish and clear the bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Fetch a remote file, rendering a progress bar while it streams.
pub fn fetch_with_progress(
    fetcher: &Fetcher,
    base: &str,
    remote: &str,
    local: &str,
    config: &EngineConfig,
) -> Result<PathBuf> {
    let mut bar = DownloadProgress::new(remote);
    let mut report = |received: u64, total: Option<u64>| bar.update(received, total);
    let result = fetcher.fetch(base, remote, local, config, Some(&mut report));
    bar.finish();
    result
}
