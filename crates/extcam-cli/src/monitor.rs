// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Live hotplug monitoring.

use crate::error::CliError;
use crate::utils::{install_signal_handler, ConfigArgs};
use clap::Args as ClapArgs;
use extcam::{
    Capability, DeviceBackend, DeviceFactory, DeviceVersion, Error, ExternalCameraProvider,
    LogicalDeviceId, OpenMode, PresenceState, ProviderConfig, StatusChange, V4l2Backend,
    VideoNode,
};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(short, long, value_name = "SECS")]
    duration: Option<u64>,
}

/// Stands in for the streaming device: a node counts as constructible when it
/// opens and answers the capability query.
struct ProbeFactory {
    backend: V4l2Backend,
}

impl DeviceFactory for ProbeFactory {
    type Device = Capability;

    fn create(
        &self,
        version: DeviceVersion,
        path: &Path,
        _config: &ProviderConfig,
    ) -> Result<Capability, Error> {
        let init_failed = |err: std::io::Error| Error::DeviceInit {
            path: path.to_path_buf(),
            reason: err.to_string(),
        };
        let mut node = self
            .backend
            .open(path, OpenMode::Blocking)
            .map_err(init_failed)?;
        let cap = node.query_capability().map_err(init_failed)?;
        log::debug!(
            "v{} device {}: driver {} card {}",
            version,
            path.display(),
            cap.driver,
            cap.card
        );
        Ok(cap)
    }
}

fn print_change(id: &LogicalDeviceId, state: PresenceState, json: bool) {
    if json {
        let change = StatusChange { id: *id, state };
        match serde_json::to_string(&change) {
            Ok(line) => println!("{}", line),
            Err(e) => log::error!("JSON serialization failed: {}", e),
        }
    } else {
        println!("{:<28} {}", id.to_string(), state);
    }
}

pub fn execute(args: Args, config_args: &ConfigArgs, json: bool) -> Result<(), CliError> {
    log::debug!("Executing monitor command: {:?}", args);

    let config = config_args.load()?;
    let term = install_signal_handler()?;
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let poll = config.poll_timeout();

    log::info!(
        "Monitoring {} for external cameras (Ctrl+C to stop)",
        config.device_dir.display()
    );
    let provider = ExternalCameraProvider::new(
        config,
        Arc::new(V4l2Backend::new()),
        Arc::new(ProbeFactory {
            backend: V4l2Backend::new(),
        }),
    )?;
    provider.attach_subscriber(Arc::new(move |id: &LogicalDeviceId, state: PresenceState| {
        print_change(id, state, json)
    }));

    while !term.load(Ordering::Relaxed) {
        if provider.worker_finished() {
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        thread::sleep(poll);
    }

    if term.load(Ordering::Relaxed) {
        log::info!("Received Ctrl+C, stopping");
    }
    provider.detach_subscriber();
    provider.shutdown()?;
    Ok(())
}
