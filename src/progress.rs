//! Progress reporting: a small wrapper over `indicatif` bars that can also be hidden.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BYTES_TEMPLATE: &str = "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
     {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}";
const COUNT_TEMPLATE: &str = "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
     it/s: {per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}";

fn styled(total: u64, template: &str, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    // Templates are constants; fall back to the default style rather than fail.
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Use `ProgressScope::bytes(..)` for input scanning and `ProgressScope::count(..)`
/// for fetch tasks. `enabled = false` yields a hidden bar with the same API.
pub struct ProgressScope {
    pb: ProgressBar,
}

impl ProgressScope {
    pub fn bytes(label: impl Into<String>, total_bytes: u64, enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }
        Self { pb: styled(total_bytes, BYTES_TEMPLATE, &label.into()) }
    }

    pub fn count(label: impl Into<String>, total: u64, enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }
        Self { pb: styled(total, COUNT_TEMPLATE, &label.into()) }
    }

    pub fn hidden() -> Self {
        Self { pb: ProgressBar::hidden() }
    }

    #[inline]
    pub fn inc(&self, delta: u64) {
        self.pb.inc(delta);
    }

    pub fn finish(&self, msg: impl Into<String>) {
        self.pb.finish_with_message(msg.into());
    }
}
