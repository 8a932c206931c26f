// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! External Camera Discovery for Rust
//!
//! Discovers removable V4L2 capture devices (USB webcams, HDMI receivers)
//! attached to a Linux host, separates them from the fixed cameras a board
//! already exposes, and keeps a live registry of which ones are present.
//! Presence changes are pushed to a single subscriber as they happen.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use extcam::{ExternalCameraProvider, ProviderConfig, V4l2Backend};
//! # use extcam::{DeviceFactory, DeviceVersion, Error};
//! # use std::path::Path;
//! # struct Factory;
//! # impl DeviceFactory for Factory {
//! #     type Device = ();
//! #     fn create(&self, _: DeviceVersion, _: &Path, _: &ProviderConfig) -> Result<(), Error> {
//! #         Ok(())
//! #     }
//! # }
//!
//! let config = ProviderConfig::from_file("/etc/extcam.json")?;
//! let provider =
//!     ExternalCameraProvider::new(config, Arc::new(V4l2Backend::new()), Arc::new(Factory))?;
//!
//! provider.attach_subscriber(Arc::new(
//!     |id: &extcam::LogicalDeviceId, state: extcam::PresenceState| {
//!         println!("{} is now {}", id, state);
//!     },
//! ));
//! # Ok::<(), extcam::Error>(())
//! ```
//!
//! # Architecture
//!
//! | Component | Role |
//! |-----------|------|
//! | [`Classifier`] | Decides whether a `/dev/videoN` node is an external camera |
//! | [`PresenceRegistry`] | Logical id → presence map, notifies the subscriber |
//! | [`DiscoveryWorker`] | Single background thread: initial scan, then hotplug events |
//! | [`ExternalCameraProvider`] | Request-facing facade: attach subscriber, resolve ids |
//!
//! All kernel access goes through the [`DeviceBackend`] trait so the whole
//! pipeline can run against [`MockBackend`] without hardware.

use std::{error, fmt, io, path::PathBuf};

/// Error type for discovery and provider operations
#[derive(Debug)]
pub enum Error {
    /// I/O error from a device node, sysfs attribute or configuration file
    Io(io::Error),

    /// The filesystem watcher could not be created or registered
    Watch(notify::Error),

    /// Configuration file could not be parsed
    Json(serde_json::Error),

    /// Configuration parsed but is not usable
    Config(String),

    /// The device directory could not be opened; discovery is impossible
    DirectoryUnavailable { path: PathBuf, source: io::Error },

    /// A logical device name did not match `device@<major>.<minor>/external/<id>`
    InvalidDeviceName(String),

    /// A logical device name is well formed but the device is not present
    DeviceNotPresent(String),

    /// The device implementation failed to initialize
    DeviceInit { path: PathBuf, reason: String },

    /// The requested interface is not offered by external cameras
    NotSupported(&'static str),

    /// The discovery worker thread panicked
    WorkerPanicked,
}

/// Caller-facing outcome of a provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    IllegalArgument,
    InternalError,
    OperationNotSupported,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::IllegalArgument => write!(f, "ILLEGAL_ARGUMENT"),
            Status::InternalError => write!(f, "INTERNAL_ERROR"),
            Status::OperationNotSupported => write!(f, "OPERATION_NOT_SUPPORTED"),
        }
    }
}

impl Error {
    /// Map this error onto the status reported to provider callers.
    pub fn status(&self) -> Status {
        match self {
            Error::InvalidDeviceName(_) | Error::DeviceNotPresent(_) => Status::IllegalArgument,
            Error::NotSupported(_) => Status::OperationNotSupported,
            _ => Status::InternalError,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Watch(err) => write!(f, "filesystem watch error: {}", err),
            Error::Json(err) => write!(f, "configuration parse error: {}", err),
            Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
            Error::DirectoryUnavailable { path, source } => {
                write!(f, "cannot open {}: {}", path.display(), source)
            }
            Error::InvalidDeviceName(name) => write!(f, "invalid device name: {}", name),
            Error::DeviceNotPresent(name) => write!(f, "device not present: {}", name),
            Error::DeviceInit { path, reason } => {
                write!(f, "camera device {} init failed: {}", path.display(), reason)
            }
            Error::NotSupported(what) => write!(f, "operation not supported: {}", what),
            Error::WorkerPanicked => write!(f, "discovery worker panicked"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Watch(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::DirectoryUnavailable { source, .. } => Some(source),
            Error::Config(_)
            | Error::InvalidDeviceName(_)
            | Error::DeviceNotPresent(_)
            | Error::DeviceInit { .. }
            | Error::NotSupported(_)
            | Error::WorkerPanicked => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watch(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

/// The backend module abstracts kernel access (directory, device nodes, sysfs, watches).
pub mod backend;

/// The classifier module decides which device nodes are external cameras.
pub mod classifier;

/// The config module holds the immutable provider configuration.
pub mod config;

/// The device_id module maps device nodes to logical device ids.
pub mod device_id;

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// The provider module is the request-facing facade.
pub mod provider;

/// The registry module tracks device presence and notifies the subscriber.
pub mod registry;

/// The watch module turns directory change notifications into hotplug events.
pub mod watch;

/// The worker module runs the background discovery loop.
pub mod worker;

pub use backend::{
    Capability, DeviceBackend, MockBackend, MockNode, OpenMode, V4l2Backend, VideoNode,
};
pub use classifier::{Classification, Classifier};
pub use config::{ClassifierConfig, DeviceVersion, ProviderConfig};
pub use device_id::{DeviceNode, LogicalDeviceId};
pub use provider::{DeviceFactory, ExternalCameraProvider};
pub use registry::{ChannelSink, NotificationSink, PresenceRegistry, PresenceState, StatusChange};
pub use watch::{EventSource, WatchEvent, WatchKind};
pub use worker::{DiscoveryWorker, WorkerHandle, WorkerState};
