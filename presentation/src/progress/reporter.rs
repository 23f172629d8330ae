//! Progress reporting for one-shot CLI runs

use crate::output::console::ConsoleFormatter;
use colored::Colorize;
use ensemble_domain::StreamEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a routed answer is being produced
pub struct AskSpinner {
    bar: Option<ProgressBar>,
}

impl AskSpinner {
    pub fn start(message: &str, quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.set_prefix("Ensemble");
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for AskSpinner {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Prints time-travel events as they arrive, with a snapshot progress bar
///
/// Heartbeats only update the bar message; everything else is printed above
/// the bar so it stays at the bottom of the terminal.
pub struct StreamReporter {
    bar: ProgressBar,
}

impl StreamReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(bar_style());
        bar.set_prefix("Snapshots");
        Self { bar }
    }

    pub fn on_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::Classification { num_snapshots, .. } => {
                self.print(event);
                if *num_snapshots == 0 {
                    return;
                }
                self.bar.set_length(*num_snapshots as u64);
                self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
            StreamEvent::Snapshot { index, .. } => {
                self.bar.set_position(*index as u64);
                self.print(event);
            }
            StreamEvent::Heartbeat { message } => {
                self.bar.set_message(message.clone());
            }
            _ if event.is_terminal() => {
                self.bar.finish_and_clear();
                self.print(event);
            }
            _ => self.print(event),
        }
    }

    fn print(&self, event: &StreamEvent) {
        let line = ConsoleFormatter::format_event(event);
        self.bar.suspend(|| println!("{}", line));
    }
}

impl Default for StreamReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamReporter {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon_with_message("interrupted".red().to_string());
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}
