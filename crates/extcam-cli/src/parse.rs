// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Logical device id validation.

use crate::error::CliError;
use crate::utils::ConfigArgs;
use clap::Args as ClapArgs;
use extcam::LogicalDeviceId;
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Logical device id, e.g. device@3.4/external/102
    name: String,
}

#[derive(Debug, Serialize)]
struct ParseOutput {
    id: LogicalDeviceId,
    version: String,
    number: u32,
    /// `None` when the number is below the configured offset
    node: Option<String>,
    /// Whether the id carries the configured device version
    current_version: bool,
}

pub fn execute(args: Args, config_args: &ConfigArgs, json: bool) -> Result<(), CliError> {
    log::debug!("Executing parse command: {:?}", args);

    let config = config_args.load()?;
    let id = LogicalDeviceId::parse(&args.name)?;
    let version = config.device_version();

    let output = ParseOutput {
        id,
        version: format!("{}.{}", id.major(), id.minor()),
        number: id.number(),
        node: id
            .node_path(&config)
            .map(|path| path.display().to_string()),
        current_version: id.major() == version.major() && id.minor() == version.minor(),
    };

    if json {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    } else {
        println!("Device:  {}", output.id);
        println!("Version: {}", output.version);
        println!("Number:  {}", output.number);
        match &output.node {
            Some(node) => println!("Node:    {}", node),
            None => println!(
                "Node:    none (number below offset {})",
                config.camera_id_offset
            ),
        }
        if !output.current_version {
            println!("Note:    provider is configured for version {}", version);
        }
    }

    Ok(())
}
