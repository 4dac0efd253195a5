//! Spinner shown while a bundle is being fetched

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner on stderr; hidden when stderr is not a terminal or output is verbose
pub struct ProgressDisplay {
    spinner: ProgressBar,
}

impl ProgressDisplay {
    pub fn new(message: impl Into<String>, visible: bool) -> Self {
        let spinner = if visible && console::Term::stderr().is_term() {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.into());
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    /// Replace the message next to the spinner
    pub fn update(&self, message: impl Into<String>) {
        self.spinner.set_message(message.into());
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    /// Abandon on error
    pub fn abandon(&self) {
        self.spinner.abandon();
    }
}

impl Drop for ProgressDisplay {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
