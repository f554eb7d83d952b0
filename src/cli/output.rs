//! Terminal output and status display

use crate::cli::args::VerbosityLevel;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Terminal printer shared by the console front-end
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    status: Mutex<Option<ProgressBar>>,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            status: Mutex::new(None),
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    fn status_bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Show `message` on the live status spinner
    pub fn set_status(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        let mut status = self.status_bar();
        let spinner = status.get_or_insert_with(|| {
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(style);
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        });
        spinner.set_message(message.to_string());
    }

    /// Whether a status spinner is currently shown
    pub fn has_status(&self) -> bool {
        self.status_bar().is_some()
    }

    /// Freeze the spinner on its last message so following output starts below it
    pub fn settle_status(&self) {
        if let Some(spinner) = self.status_bar().take() {
            spinner.finish();
        }
    }

    /// Remove the spinner without leaving a line behind
    pub fn clear_status(&self) {
        if let Some(spinner) = self.status_bar().take() {
            spinner.finish_and_clear();
        }
    }

    fn line(&self, text: String) {
        self.settle_status();
        println!("{}", text);
    }

    /// Print a message body as the bot would send it
    pub fn message(&self, text: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.line(text.to_string());
        }
    }

    /// Print numbered choices, one per line
    pub fn choices(&self, text: &str, labels: &[(usize, String)]) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }
        let mut out = text.trim_end().to_string();
        for (number, label) in labels {
            out.push_str(&format!("\n  {} {}", format!("#{}", number).cyan().bold(), label));
        }
        self.line(out);
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.line(format!("ℹ️  {}", message));
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.line(format!("✅ {}", message.green()));
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.settle_status();
            eprintln!("⚠️  {}", message.yellow());
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        self.settle_status();
        eprintln!("❌ {}", message.red());
    }

    /// Print debug message
    pub fn debug(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Verbose {
            self.line(format!("🐛 {}", message.dimmed()));
        }
    }

    /// Print the startup banner
    pub fn banner(&self, output_dir: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }
        println!("{} {}", "reelbot".bold(), env!("CARGO_PKG_VERSION"));
        println!("Paste a link, type #n to press a choice, or /help for commands.");
        println!("💾 Files are saved to: {}", output_dir);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_formatter_creation() {
        let formatter = OutputFormatter::new(VerbosityLevel::Normal);
        assert_eq!(formatter.verbosity(), VerbosityLevel::Normal);
        assert!(!formatter.has_status());
    }

    #[test]
    fn test_quiet_mode_never_shows_status() {
        let formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        formatter.set_status("📥 Downloading video...");
        assert!(!formatter.has_status());

        // These should not print anything in quiet mode
        formatter.info("test");
        formatter.success("test");
        formatter.warning("test");
        formatter.debug("test");
        formatter.choices("pick", &[(1, "one".to_string())]);

        // Error should always print
        formatter.error("test");
    }

    #[test]
    fn test_status_lifecycle() {
        let formatter = OutputFormatter::new(VerbosityLevel::Normal);
        formatter.set_status("🔍 Analyzing the link...");
        assert!(formatter.has_status());
        formatter.set_status("📥 Downloading video...");
        assert!(formatter.has_status());

        formatter.message("done");
        assert!(!formatter.has_status());

        formatter.set_status("again");
        formatter.clear_status();
        assert!(!formatter.has_status());
    }
}
