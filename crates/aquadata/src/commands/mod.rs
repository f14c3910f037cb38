//! Subcommand handlers.

pub mod config_cmd;
pub mod run;
pub mod simulate;

use aquadata_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the configuration and apply command-line overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut config = aquadata_config::load_config(global.config.as_deref())?;
    if let Some(mode) = global.mode {
        config.device.mode = mode.to_string();
    }
    Ok(config)
}
