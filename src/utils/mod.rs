/// Tracing subscriber setup.
pub mod logging;
/// TOML configuration, validation and the config manager.
pub mod toml_config;
