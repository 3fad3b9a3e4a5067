//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the deep-research CLI.

use crate::research::{ResearchOutcome, RunError};
use crate::state::RunWarning;
use crate::workflows::WorkflowStep;
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the one-line banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n  {} {}\n",
                "deep-research".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n  deep-research v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a step message (for multi-step operations)
    pub fn step(&self, step_num: usize, total: usize, message: &str) {
        if self.colored {
            println!(
                "  {} {}",
                format!("[{}/{}]", step_num, total).dimmed(),
                message.bright_white()
            );
        } else {
            println!("  [{}/{}] {}", step_num, total, message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }

    /// Print the executed path of a run
    pub fn steps(&self, steps: &[WorkflowStep]) {
        let total = steps.len();
        for step in steps {
            let mut line = format!("{} ({}, {}ms)", step.phase, step.condition, step.duration_ms);
            if let Some(error) = &step.error {
                line.push_str(&format!(" failed: {}", error));
            }
            self.step(step.step, total, &line);
        }
    }

    /// Print a warning attached to a run
    pub fn run_warning(&self, warning: &RunWarning) {
        self.warning(&warning.to_string());
    }

    /// Print a finished run: report, then warnings
    pub fn outcome(&self, outcome: &ResearchOutcome) {
        self.header("Research Report");
        println!();
        for line in outcome.report.lines() {
            println!("  {}", line);
        }

        if !outcome.warnings.is_empty() {
            self.header("Warnings");
            for warning in &outcome.warnings {
                self.run_warning(warning);
            }
        }

        self.newline();
        self.success(&format!(
            "Research complete in {:.1}s ({} steps, {} sources)",
            outcome.duration_ms as f64 / 1000.0,
            outcome.steps.len(),
            outcome.sources.len()
        ));
    }

    /// Print a failed run, including any partial report
    pub fn run_error(&self, err: &RunError) {
        self.error(&err.to_string());
        if let Some(report) = &err.partial_report {
            self.header("Partial Report");
            for line in report.lines() {
                println!("  {}", line);
            }
        }
        for warning in &err.warnings {
            self.run_warning(warning);
        }
        if let Some(run_id) = &err.run_id {
            self.kv("run", run_id);
        }
        self.kv("messages logged", &err.messages.len().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_new() {
        let output = Output::new();
        assert!(output.colored);
    }

    #[test]
    fn test_output_no_color() {
        let output = Output::no_color();
        assert!(!output.colored);
    }

    #[test]
    fn test_output_default() {
        let output = Output::default();
        assert!(output.colored);
    }
}
