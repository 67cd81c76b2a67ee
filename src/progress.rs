//! Progress counter for a mirror run.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

/// The bar currently drawn on the terminal, if any.
static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn set_active(bar: Option<ProgressBar>) {
    if let Ok(mut active) = ACTIVE_BAR.lock() {
        *active = bar;
    }
}

fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR.lock().ok().and_then(|active| active.clone())
}

/// Run `f` with the drawn progress bar (if any) cleared from the terminal,
/// redrawing it afterwards. Console log output goes through here.
pub fn suspend_active<F: FnOnce() -> R, R>(f: F) -> R {
    match active_bar() {
        Some(bar) => bar.suspend(f),
        None => f(),
    }
}

/// Counts processed files against a total fixed before the walk starts.
///
/// Every file entry that reaches a terminal state advances the counter once,
/// whether it was downloaded, exported, skipped or failed.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// A progress bar drawn on the terminal.
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40.green/white}] {pos}/{len} files ({elapsed_precise})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━╌"),
        );
        bar.set_message("Downloading Files");
        set_active(Some(bar.clone()));
        Self { bar }
    }

    /// A counter with nothing drawn.
    pub fn hidden(total: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total);
        Self { bar }
    }

    /// Record one more processed file.
    pub fn advance(&self) {
        self.bar.inc(1);
    }

    pub fn processed(&self) -> u64 {
        self.bar.position()
    }

    pub fn total(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    pub fn finish(&self) {
        self.bar.finish();
        set_active(None);
    }
}
