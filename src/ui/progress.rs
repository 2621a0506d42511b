//! Progress rendering.
//!
//! The bar is driven by the reporter task, which samples the shared
//! [`Monitor`] counters on a fixed interval. The worker never touches the
//! terminal.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::REPORT_INTERVAL_MS;
use crate::progress::Monitor;

pub struct Bar {
    bar: ProgressBar,
}

impl Bar {
    pub fn new(description: &str) -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .expect("valid template")
            .progress_chars("●○ ");

        bar.set_style(style);
        bar.set_message(description.to_string());

        Self { bar }
    }

    /// Pulls the current counters into the bar. Byte totals win; archive
    /// extraction falls back to entry counts.
    pub fn observe(&self, monitor: &Monitor) {
        let (done, total) = monitor.bytes();
        if total > 0 {
            self.bar.set_length(total);
            self.bar.set_position(done);
            return;
        }
        let (entries_done, entries_total) = monitor.entries();
        if entries_total > 0 {
            self.bar.set_length(entries_total);
            self.bar.set_position(entries_done);
        }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Drop for Bar {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }
}

/// Polls the monitor until the run reaches a terminal state. Sampling is
/// read-only and tolerates staleness; it never blocks the worker.
pub async fn report_loop(monitor: Arc<Monitor>, bar: Bar) {
    let mut interval = tokio::time::interval(Duration::from_millis(REPORT_INTERVAL_MS));
    loop {
        interval.tick().await;
        bar.observe(&monitor);
        if monitor.status().is_terminal() {
            break;
        }
    }
    bar.observe(&monitor);
    bar.finish("done");
}
