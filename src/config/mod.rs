pub mod app_config;
pub mod cli;

pub use app_config::{AppConfig, ConfigError};
pub use cli::{Cli, Command};
