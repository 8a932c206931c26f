// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Provider configuration
//!
//! [`ProviderConfig`] is loaded once at startup and never mutated afterwards.
//! Every field has a default, so an empty JSON object is a valid file:
//!
//! ```json
//! {
//!     "camera_id_offset": 100,
//!     "internal_devices": [0, 1],
//!     "device_version_minor": 4
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Camera device interface version advertised in logical ids.
///
/// Several historical device implementations exist; exactly one is selected
/// at startup from [`ProviderConfig::device_version_minor`] and used for
/// every id and every device constructed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DeviceVersion {
    #[default]
    V3_4,
    V3_5,
    V3_6,
}

impl DeviceVersion {
    /// Resolve a configured minor version, or `None` if it is unsupported.
    pub fn try_from_minor(minor: u32) -> Option<Self> {
        match minor {
            4 => Some(DeviceVersion::V3_4),
            5 => Some(DeviceVersion::V3_5),
            6 => Some(DeviceVersion::V3_6),
            _ => None,
        }
    }

    /// Resolve a configured minor version, falling back to 3.4.
    pub fn from_minor(minor: u32) -> Self {
        Self::try_from_minor(minor).unwrap_or_else(|| {
            log::warn!(
                "Unknown minor camera device version {}, defaulting to 4",
                minor
            );
            DeviceVersion::V3_4
        })
    }

    pub fn major(&self) -> u32 {
        3
    }

    pub fn minor(&self) -> u32 {
        match self {
            DeviceVersion::V3_4 => 4,
            DeviceVersion::V3_5 => 5,
            DeviceVersion::V3_6 => 6,
        }
    }
}

impl fmt::Display for DeviceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Driver and sysfs name patterns used by the [`Classifier`](crate::Classifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// sysfs names of hardware codec nodes; never cameras.
    pub codec_name_prefixes: Vec<String>,
    /// Driver-name substring of USB video class devices.
    pub uvc_marker: String,
    /// Driver-name substring of generic capture drivers.
    pub capture_marker: String,
    /// sysfs name prefix identifying the HDMI receiver capture node.
    pub receiver_name_prefix: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            codec_name_prefixes: vec![
                "amphion-vpu-decoder".to_string(),
                "amphion-vpu-encoder".to_string(),
            ],
            uvc_marker: "uvc".to_string(),
            capture_marker: "cap".to_string(),
            receiver_name_prefix: "mxc_isi.6.capture".to_string(),
        }
    }
}

/// Immutable provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Added to a node's numeric suffix to form its logical id number.
    pub camera_id_offset: u32,
    /// Node suffixes belonging to internal cameras; never probed.
    pub internal_devices: BTreeSet<u32>,
    /// Minor version of the camera device interface (4, 5 or 6).
    pub device_version_minor: u32,
    /// Directory holding the device nodes.
    pub device_dir: PathBuf,
    /// Name prefix of capture device nodes.
    pub node_prefix: String,
    /// Name prefix of the auxiliary control nodes whose creation signals a receiver.
    pub aux_prefix: String,
    /// Root of the per-node sysfs metadata (`<root>/<node>/name`).
    pub sysfs_root: PathBuf,
    pub settle_delay_ms: u64,
    pub receiver_settle_delay_ms: u64,
    pub poll_timeout_ms: u64,
    pub classifier: ClassifierConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            camera_id_offset: 100,
            internal_devices: BTreeSet::new(),
            device_version_minor: 4,
            device_dir: PathBuf::from("/dev"),
            node_prefix: "video".to_string(),
            aux_prefix: "cec".to_string(),
            sysfs_root: PathBuf::from("/sys/class/video4linux"),
            settle_delay_ms: 100,
            receiver_settle_delay_ms: 800,
            poll_timeout_ms: 250,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        log::debug!("Loading provider configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse configuration from a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let config: ProviderConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make discovery match everything or nothing.
    pub fn validate(&self) -> Result<(), Error> {
        if self.node_prefix.is_empty() {
            return Err(Error::Config("node_prefix must not be empty".to_string()));
        }
        if self.aux_prefix.is_empty() {
            return Err(Error::Config("aux_prefix must not be empty".to_string()));
        }
        if self.node_prefix.starts_with(&self.aux_prefix)
            || self.aux_prefix.starts_with(&self.node_prefix)
        {
            return Err(Error::Config(format!(
                "node_prefix '{}' and aux_prefix '{}' overlap",
                self.node_prefix, self.aux_prefix
            )));
        }
        if self.poll_timeout_ms == 0 {
            return Err(Error::Config("poll_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// The device interface version selected for this process.
    pub fn device_version(&self) -> DeviceVersion {
        DeviceVersion::from_minor(self.device_version_minor)
    }

    /// Validate and pin an unsupported minor version to the fallback, so the
    /// version is resolved (and warned about) exactly once.
    pub fn normalized(mut self) -> Result<Self, Error> {
        self.validate()?;
        self.device_version_minor = self.device_version().minor();
        Ok(self)
    }

    pub fn is_internal(&self, suffix: u32) -> bool {
        self.internal_devices.contains(&suffix)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn receiver_settle_delay(&self) -> Duration {
        Duration::from_millis(self.receiver_settle_delay_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
