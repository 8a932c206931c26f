// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! One-shot classification of every device node.

use crate::error::CliError;
use crate::utils::ConfigArgs;
use clap::Args as ClapArgs;
use extcam::{Classification, Classifier, DeviceBackend, DeviceNode, LogicalDeviceId, V4l2Backend};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Show only nodes classified as external
    #[arg(long)]
    external: bool,
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    device_dir: String,
    version: String,
    offset: u32,
    devices: Vec<NodeInfo>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct NodeInfo {
    node: String,
    id: LogicalDeviceId,
    class: &'static str,
    /// Result of the capture probe; only run for external nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    capture: Option<bool>,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    total: usize,
    internal: usize,
    not_external: usize,
    external: usize,
    receivers: usize,
}

pub fn execute(args: Args, config_args: &ConfigArgs, json: bool) -> Result<(), CliError> {
    log::debug!("Executing scan command: {:?}", args);

    let config = config_args.load()?;
    let backend = V4l2Backend::new();
    let classifier = Classifier::new(&config);

    let names = backend.read_dir(&config.device_dir).map_err(|e| {
        CliError::DiscoveryFailed(format!("cannot open {}: {}", config.device_dir.display(), e))
    })?;

    let mut nodes: Vec<DeviceNode> = names
        .iter()
        .filter_map(|name| DeviceNode::from_config(&config, name))
        .collect();
    nodes.sort_by_key(|node| node.suffix());

    let mut summary = Summary::default();
    let mut devices = Vec::new();
    for node in nodes {
        let Some(id) = node.logical_id(&config) else {
            continue;
        };
        summary.total += 1;

        let (class, capture) = if config.is_internal(node.suffix()) {
            summary.internal += 1;
            ("internal", None)
        } else {
            match classifier.classify(&backend, &node) {
                Classification::NotExternal => {
                    summary.not_external += 1;
                    (Classification::NotExternal.name(), None)
                }
                class => {
                    if class == Classification::ExternalReceiver {
                        summary.receivers += 1;
                    } else {
                        summary.external += 1;
                    }
                    (class.name(), Some(classifier.probe_capture(&backend, &node)))
                }
            }
        };

        if args.external && capture.is_none() {
            continue;
        }
        devices.push(NodeInfo {
            node: node.path().display().to_string(),
            id,
            class,
            capture,
        });
    }

    let output = ScanOutput {
        device_dir: config.device_dir.display().to_string(),
        version: config.device_version().to_string(),
        offset: config.camera_id_offset,
        devices,
        summary,
    };

    if json {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn print_text_output(output: &ScanOutput) {
    println!(
        "Scanned {} (device version {}, id offset {})",
        output.device_dir, output.version, output.offset
    );
    println!();

    if output.devices.is_empty() {
        println!("  No matching device nodes");
    }
    for info in &output.devices {
        let capture = match info.capture {
            Some(true) => " [capture ok]",
            Some(false) => " [capture probe failed]",
            None => "",
        };
        println!(
            "  {:<16} {:<18} {}{}",
            info.node, info.class, info.id, capture
        );
    }

    println!();
    println!(
        "Summary: {} nodes, {} internal, {} not external, {} external, {} receivers",
        output.summary.total,
        output.summary.internal,
        output.summary.not_external,
        output.summary.external,
        output.summary.receivers
    );
}
