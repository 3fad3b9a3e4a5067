//! CLI module for deep-research
//!
//! Provides command-line interface parsing for the deep-research binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// deep-research - multi-stage research agent
///
/// Plans a question into sub-questions, searches the web, checks citations,
/// reflects on coverage and writes a cited report.
#[derive(Parser, Debug)]
#[command(
    name = "deep-research",
    version,
    about = "Multi-stage research agent with cited reports",
    long_about = "Plans a research question into sub-questions, searches for each, validates\n\
                  the sources, loops until the evidence is sufficient (or the iteration cap is\n\
                  hit) and writes a report citing only validated sources.",
    after_help = "EXAMPLES:\n    \
                  deep-research run \"What is the capital of France?\"\n    \
                  deep-research run --max-iterations 1 --json \"history of Rust\"\n    \
                  deep-research config --validate\n    \
                  deep-research --config my.toml run \"...\""
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "research.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the report
    Run {
        /// The research question
        #[arg(num_args = 0.., trailing_var_arg = true)]
        query: Vec<String>,

        /// Re-plans allowed before synthesis is forced (overrides config)
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Per-step timeout in seconds (overrides config)
        #[arg(long)]
        step_timeout: Option<u64>,

        /// Fail instead of warning when the iteration cap is reached
        #[arg(long)]
        strict: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// Print the executed steps
        #[arg(long)]
        show_steps: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_joins_query_words() {
        let cli = Cli::parse_from(["deep-research", "run", "--max-iterations", "2", "what", "is", "rust"]);
        match cli.command {
            Commands::Run {
                query,
                max_iterations,
                json,
                ..
            } => {
                assert_eq!(query.join(" "), "what is rust");
                assert_eq!(max_iterations, Some(2));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("research.toml"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["deep-research", "config", "--validate", "--no-color", "-c", "x.toml"]);
        assert!(cli.no_color);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.command, Commands::Config { validate: true }));
    }
}
