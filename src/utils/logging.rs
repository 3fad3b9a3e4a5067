use crate::utils::toml_config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level is used, and
/// `verbose` forces `debug` for this crate.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) {
    let fallback = if verbose {
        format!("{},deep_research=debug", config.level)
    } else {
        config.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    // try_init: a second call (tests, embedding) must not panic
    let _ = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
}
