//! Progress display for a running compilation job using indicatif
//!
//! The spinner shows the latest user log line; every line is also printed
//! above it so the full job history stays on screen.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::domain::models::{UserLogEntry, UserLogLevel};
use crate::services::UserLog;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a spinner for indeterminate operations
pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Spinner that mirrors a [`UserLog`] until finished
pub struct JobProgress {
    bar: ProgressBar,
    follower: JoinHandle<()>,
}

impl JobProgress {
    /// Start following `log`. A hidden bar is used when `visible` is false.
    pub fn follow(log: &UserLog, visible: bool) -> Self {
        let bar = if visible {
            create_spinner()
        } else {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        };

        let follower = tokio::spawn(mirror(log.subscribe(), bar.clone()));
        Self { bar, follower }
    }

    pub fn finish_success(self, message: impl Into<String>) {
        self.follower.abort();
        self.bar
            .finish_with_message(format!("{} {}", style("✓").green(), message.into()));
    }

    pub fn finish_error(self, message: impl Into<String>) {
        self.follower.abort();
        self.bar
            .abandon_with_message(format!("{} {}", style("✗").red(), message.into()));
    }
}

async fn mirror(mut rx: broadcast::Receiver<UserLogEntry>, bar: ProgressBar) {
    loop {
        match rx.recv().await {
            Ok(entry) => {
                bar.println(render_line(&entry));
                bar.set_message(entry.message);
            }
            Err(RecvError::Lagged(skipped)) => {
                bar.println(format!("... {skipped} log lines skipped"));
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn render_line(entry: &UserLogEntry) -> String {
    let time = entry.timestamp.format("%H:%M:%S");
    match entry.level {
        UserLogLevel::Info => format!("{} {}", style(time).dim(), entry.message),
        UserLogLevel::Success => format!("{} {}", style(time).dim(), style(&entry.message).green()),
        UserLogLevel::Error => format!("{} {}", style(time).dim(), style(&entry.message).red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_render_line_keeps_message() {
        console::set_colors_enabled(false);
        let entry = UserLogEntry {
            message: "[compile] processing (40%)".to_string(),
            level: UserLogLevel::Info,
            timestamp: Utc::now(),
        };
        assert!(render_line(&entry).ends_with("[compile] processing (40%)"));
    }

    #[tokio::test]
    async fn test_hidden_progress_follows_log() {
        let log = UserLog::new();
        let progress = JobProgress::follow(&log, false);

        log.info("Submitted request r1");
        for _ in 0..100 {
            if progress.bar.message() == "Submitted request r1" {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(progress.bar.message(), "Submitted request r1");
        progress.finish_success("done");
    }
}
