//! Count-style progress bars for per-identifier jobs.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Identifiers settled out of `total`, labelled with the job name.
pub fn make_count_progress(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {msg} {pos}/{len} ids [{bar:.cyan/blue}] {percent:>3}%  {per_sec}  eta: {eta_precise}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn maybe_count_progress(enabled: bool, total: u64, label: &str) -> Option<ProgressBar> {
    enabled.then(|| make_count_progress(total, label))
}
