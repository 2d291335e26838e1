//! CLI module
//!
//! Provides:
//! - Argument parsing (`translate`, `search`)
//! - Relative time expressions for `--from` / `--to`
//! - Command dispatch onto the query executor

pub mod args;
pub mod dispatch;

// Re-exports
pub use args::{parse_time, Cli, Command};
pub use dispatch::{run, ExitCode};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid time '{input}': {reason}")]
    InvalidTime { input: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;
pub const EXIT_PARTIAL: i32 = 3;
pub const EXIT_CANCELLED: i32 = 130;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
