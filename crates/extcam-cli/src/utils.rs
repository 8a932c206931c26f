// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use clap::Args as ClapArgs;
use extcam::ProviderConfig;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Options shared by every subcommand that select the provider configuration.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Provider configuration file (JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the camera id offset
    #[arg(long, global = true, value_name = "N")]
    pub offset: Option<u32>,

    /// Override the camera device minor version (4, 5 or 6)
    #[arg(long, global = true, value_name = "N")]
    pub device_version_minor: Option<u32>,
}

impl ConfigArgs {
    /// Load the configuration file (or defaults) and apply command-line overrides.
    pub fn load(&self) -> Result<ProviderConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::InvalidArgs(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                ProviderConfig::from_file(path)?
            }
            None => ProviderConfig::default(),
        };

        if let Some(offset) = self.offset {
            config.camera_id_offset = offset;
        }
        if let Some(minor) = self.device_version_minor {
            config.device_version_minor = minor;
        }

        Ok(config.normalized()?)
    }
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
/// Check this flag periodically in your main loop to exit gracefully.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}
