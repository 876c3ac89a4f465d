//! # Progress Module
//!
//! Barra di avanzamento `indicatif` per la modalità batch della CLI.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [==========>-----------------------------] 3/12 (25%) 2 active
//! ```
//!
//! La barra conta i job terminati: la CLI interroga lo scheduler e passa
//! il numero di job ancora attivi a `set_active`.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Job-count progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
    total: u64,
}

impl ProgressManager {
    pub fn new(total_jobs: u64) -> Self {
        let bar = ProgressBar::new(total_jobs);

        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar, total: total_jobs }
    }

    /// Hidden bar, for non-interactive runs
    pub fn hidden(total_jobs: u64) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            total: total_jobs,
        }
    }

    /// Update from the number of jobs still in flight
    pub fn set_active(&self, active: usize) {
        let done = self.total.saturating_sub(active as u64);
        self.bar.set_position(done);
        self.bar.set_message(format!("{} active", active));
    }

    /// Jobs finished so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
