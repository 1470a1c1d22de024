//! Spinner for long-running network work

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A spinner that falls back to a single plain line outside a terminal
pub struct TaskSpinner {
    bar: Option<ProgressBar>,
}

impl TaskSpinner {
    /// Start a spinner with a message
    pub fn start(ctx: &UiContext, message: &str) -> Self {
        if !ctx.use_fancy_output() {
            println!("{} {}", style("...").dim(), message);
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}  {elapsed:.dim}")
        {
            bar.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    /// Clear the spinner; the caller prints the outcome
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
