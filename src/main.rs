//! deep-research CLI entry point
//!
//! - `deep-research run <QUERY>` - research a question and print the report
//! - `deep-research config` - show or validate the configuration

use anyhow::Context;
use deep_research::cli::output::Output;
use deep_research::cli::{Cli, Commands};
use deep_research::research::{ResearchCoordinator, RunOptions, EMPTY_QUERY_MESSAGE};
use deep_research::utils::logging::init_tracing;
use deep_research::utils::toml_config::{ProviderConfig, ResearchConfig};
use std::time::Duration;

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match run(cli, &output).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<i32> {
    let config = ResearchConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Run {
            query,
            max_iterations,
            step_timeout,
            strict,
            json,
            show_steps,
        } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                output.error(EMPTY_QUERY_MESSAGE);
                return Ok(2);
            }

            let mut options = RunOptions::from_config(&config.workflow);
            if let Some(n) = max_iterations {
                options = options.with_max_iterations(n);
            }
            if let Some(secs) = step_timeout {
                options = options.with_step_timeout(Duration::from_secs(secs));
            }
            if strict {
                options = options.strict(true);
            }

            run_research(&config, &query, options, json, show_steps, output).await
        }
        Commands::Config { validate } => show_config(&cli.config, &config, validate, output),
    }
}

async fn run_research(
    config: &ResearchConfig,
    query: &str,
    options: RunOptions,
    json: bool,
    show_steps: bool,
    output: &Output,
) -> anyhow::Result<i32> {
    let coordinator = ResearchCoordinator::from_config(config)
        .await
        .context("setting up the reasoning provider")?;

    if !json {
        output.banner();
        output.info(&format!("Researching: {}", query));
    }

    let handle = coordinator.spawn(query, options)?;
    let cancel = handle.cancellation_token();
    let wait = handle.wait();
    tokio::pin!(wait);

    let result = tokio::select! {
        result = &mut wait => result,
        _ = tokio::signal::ctrl_c() => {
            if !json {
                output.warning("Cancelling at the next step boundary...");
            }
            cancel.cancel();
            wait.await
        }
    };

    match result {
        Ok(outcome) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                if show_steps {
                    output.header("Steps");
                    output.steps(&outcome.steps);
                }
                output.outcome(&outcome);
            }
            Ok(0)
        }
        Err(err) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&err)?);
            } else {
                output.run_error(&err);
            }
            Ok(if err.is_cancelled() { 130 } else { 1 })
        }
    }
}

fn show_config(
    path: &std::path::Path,
    config: &ResearchConfig,
    validate: bool,
    output: &Output,
) -> anyhow::Result<i32> {
    if validate {
        let warnings = config.validate_with_warnings()?;
        output.success(&format!("Configuration is valid ({})", path.display()));
        for warning in &warnings {
            output.warning(&warning.to_string());
        }
        return Ok(0);
    }

    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv("log level", &config.logging.level);
    match &config.llm {
        ProviderConfig::Ollama { base_url, model } => {
            output.kv("provider", "ollama");
            output.kv("endpoint", base_url);
            output.kv("model", model);
        }
        ProviderConfig::OpenAI {
            api_base, model, ..
        } => {
            output.kv("provider", "openai");
            output.kv("endpoint", api_base);
            output.kv("model", model);
        }
    }

    output.header("Gateway");
    output.kv("timeout", &format!("{}s", config.gateway.timeout_secs));
    output.kv("retries", &config.gateway.max_retries.to_string());
    output.kv(
        "backoff",
        &format!(
            "{}ms..{}ms",
            config.gateway.initial_backoff_ms, config.gateway.max_backoff_ms
        ),
    );
    output.kv("concurrent calls", &config.gateway.max_concurrent_calls.to_string());

    output.header("Capabilities");
    let capabilities = deep_research::tools::registry_from_config(config);
    for definition in capabilities.definitions() {
        output.list_item(&format!("{} - {}", definition.name, definition.description));
    }

    output.header("Workflow");
    output.kv("max iterations", &config.workflow.max_iterations.to_string());
    output.kv("step timeout", &format!("{}s", config.workflow.step_timeout_secs));
    output.kv("run timeout", &format!("{}s", config.workflow.run_timeout_secs));
    output.kv("strict", &config.workflow.strict.to_string());

    output.hint("Run with --validate to check the file and list warnings");
    Ok(0)
}
