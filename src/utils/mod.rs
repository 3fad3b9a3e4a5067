/// Tracing subscriber setup.
pub mod logging;
/// TOML configuration loading, validation and the shared config manager.
pub mod toml_config;
