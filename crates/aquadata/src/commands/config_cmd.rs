//! Config subcommand handlers.

use std::path::PathBuf;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

fn resolved_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(aquadata_config::config_path)
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", resolved_path(global).display());
        }

        ConfigCommand::Show => {
            let config = super::load(global)?;
            print!("{}", config.to_redacted_toml()?);
        }

        ConfigCommand::Check => {
            let config = super::load(global)?;
            let path = resolved_path(global);
            let source = if path.exists() {
                path.display().to_string()
            } else {
                "built-in defaults".into()
            };

            println!("Configuration OK ({source})");
            println!("  device     {} ({})", config.device.name, config.mode()?);
            println!("  broker     {}:{}", config.broker.host, config.broker.port);
            println!("  listen     {}", config.listen_addr()?);
            match config.wifi_credentials() {
                Some(creds) => println!("  wifi       {}", creds.ssid),
                None => println!("  wifi       not configured"),
            }
        }
    }
    Ok(())
}
