//! CLI error types with miette diagnostics.
//!
//! Maps config and driver failures into user-facing errors with
//! actionable help text.

use std::path::PathBuf;

use aquadata_config::ConfigError;
use aquadata_core::DriverError;
use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const DEVICE: i32 = 4;
    pub const IO: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found: {}", path.display())]
    #[diagnostic(
        code(aquadata::no_config),
        help(
            "Pass an existing file with --config, or drop --config to use the\n\
             default location (see: aquadata config path)."
        )
    )]
    NoConfig { path: PathBuf },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(aquadata::validation),
        help("Fix the value in the config file or the matching AQUADATA_* variable.")
    )]
    Validation { field: String, reason: String },

    #[error("Could not load configuration")]
    #[diagnostic(
        code(aquadata::config),
        help("Run: aquadata config check")
    )]
    Config {
        #[source]
        source: ConfigError,
    },

    // ── Device ───────────────────────────────────────────────────────

    #[error("Could not determine the hardware id")]
    #[diagnostic(
        code(aquadata::hardware_id),
        help("Set device.hardware_id to 12 hex digits, e.g. 240ac4000001.")
    )]
    HardwareId {
        #[source]
        source: DriverError,
    },

    // ── Output ───────────────────────────────────────────────────────

    #[error("Failed to encode telemetry")]
    #[diagnostic(code(aquadata::encode))]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(aquadata::io))]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig { path },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config { source: other },
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::Validation { .. } | Self::Config { .. } => {
                exit_code::CONFIG
            }
            Self::HardwareId { .. } => exit_code::DEVICE,
            Self::Io(_) => exit_code::IO,
            Self::Encode(_) => exit_code::GENERAL,
        }
    }
}
