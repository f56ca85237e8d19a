//! PMIG CLI - the `pmig` command
//!
//! - [`cli`]: argument definition and the parsed [`cli::Invocation`]
//! - [`config`]: `pmig.toml` loading
//! - [`logging`]: tracing subscriber installation
//! - [`commands`]: `migrate`, `run-all` and `plan`

#![warn(unreachable_pub)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use cli::{Action, Invocation};
pub use commands::{execute, ExitStatus};
pub use config::{ConfigError, LogFormat, MigrationConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
