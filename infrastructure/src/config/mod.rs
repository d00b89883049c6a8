//! Configuration file loading for council
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `COUNCIL_*` environment variables (`__` separates nested keys)
//! 2. `--config <path>` specified file
//! 3. Project root: `./council.toml` or `./.council.toml`
//! 4. Global: `$XDG_CONFIG_HOME/council/config.toml`
//! 5. Default values
//!
//! [`Workflow::from_config`] turns the merged [`FileConfig`] into steps and
//! policies backed by command workers.

mod file_config;
mod loader;
mod workflow;

pub use file_config::{
    ConfigIssue, FileConfig, FileLogConfig, FilePolicyConfig, FileRunConfig, FileStepConfig,
    FileSummarizerConfig, FileWorkerConfig, Severity,
};
pub use loader::{ConfigLoader, ConfigSources, ENV_PREFIX};
pub use workflow::{ConfigError, Workflow};
