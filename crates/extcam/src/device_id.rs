// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Device nodes and logical device ids
//!
//! A device node such as `/dev/video5` is identified to subscribers by a
//! versioned logical id, `device@3.4/external/7`, where the trailing number
//! is the node suffix plus the configured camera id offset. The mapping is a
//! pure function of (suffix, offset, version).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{DeviceVersion, ProviderConfig};
use crate::Error;

const ID_PREFIX: &str = "device@";
const ID_EXTERNAL: &str = "external/";

/// Parse a canonical non-negative decimal: digits only, no sign, no leading zeros.
fn parse_decimal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// Logical identifier of an external camera, `device@<major>.<minor>/external/<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalDeviceId {
    major: u32,
    minor: u32,
    number: u32,
}

impl LogicalDeviceId {
    pub fn new(version: DeviceVersion, number: u32) -> Self {
        Self {
            major: version.major(),
            minor: version.minor(),
            number,
        }
    }

    /// Logical id of the node with numeric `suffix`, or `None` when the
    /// shifted number does not fit.
    pub fn for_node(suffix: u32, offset: u32, version: DeviceVersion) -> Option<Self> {
        Some(Self::new(version, suffix.checked_add(offset)?))
    }

    /// Parse a logical id; anything but an exact grammar match is rejected.
    pub fn parse(name: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidDeviceName(name.to_string());

        let rest = name.strip_prefix(ID_PREFIX).ok_or_else(invalid)?;
        let (version, rest) = rest.split_once('/').ok_or_else(invalid)?;
        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
        let number = rest.strip_prefix(ID_EXTERNAL).ok_or_else(invalid)?;

        Ok(Self {
            major: parse_decimal(major).ok_or_else(invalid)?,
            minor: parse_decimal(minor).ok_or_else(invalid)?,
            number: parse_decimal(number).ok_or_else(invalid)?,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// The offset-shifted camera number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The device node suffix this id was derived from, if `offset` allows one.
    pub fn node_suffix(&self, offset: u32) -> Option<u32> {
        self.number.checked_sub(offset)
    }

    /// The device node path this id refers to under `config`.
    pub fn node_path(&self, config: &ProviderConfig) -> Option<PathBuf> {
        let suffix = self.node_suffix(config.camera_id_offset)?;
        Some(
            config
                .device_dir
                .join(format!("{}{}", config.node_prefix, suffix)),
        )
    }
}

impl fmt::Display for LogicalDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}.{}/{}{}",
            ID_PREFIX, self.major, self.minor, ID_EXTERNAL, self.number
        )
    }
}

impl FromStr for LogicalDeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for LogicalDeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalDeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::parse(&name).map_err(de::Error::custom)
    }
}

/// A kernel device node matching the configured naming prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    name: String,
    path: PathBuf,
    suffix: u32,
}

impl DeviceNode {
    /// Match a directory entry name against `<prefix><decimal>`.
    pub fn parse(dir: &Path, name: &str, prefix: &str) -> Option<Self> {
        let suffix = parse_decimal(name.strip_prefix(prefix)?)?;
        Some(Self {
            name: name.to_string(),
            path: dir.join(name),
            suffix,
        })
    }

    /// Match an entry name using the prefix and directory from `config`.
    ///
    /// Nodes whose suffix has no logical id under the configured offset are
    /// rejected.
    pub fn from_config(config: &ProviderConfig, name: &str) -> Option<Self> {
        let node = Self::parse(&config.device_dir, name, &config.node_prefix)?;
        if node.suffix.checked_add(config.camera_id_offset).is_none() {
            log::warn!(
                "ignoring {}: no camera id with offset {}",
                node,
                config.camera_id_offset
            );
            return None;
        }
        Some(node)
    }

    /// Entry name, e.g. `video5`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full node path, e.g. `/dev/video5`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn suffix(&self) -> u32 {
        self.suffix
    }

    /// Path of the sysfs `name` attribute for this node.
    pub fn name_attribute(&self, sysfs_root: &Path) -> PathBuf {
        sysfs_root.join(&self.name).join("name")
    }

    pub fn logical_id(&self, config: &ProviderConfig) -> Option<LogicalDeviceId> {
        LogicalDeviceId::for_node(
            self.suffix,
            config.camera_id_offset,
            config.device_version(),
        )
    }
}

impl fmt::Display for DeviceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let id = LogicalDeviceId::for_node(5, 2, DeviceVersion::V3_4).unwrap();
        assert_eq!(id.to_string(), "device@3.4/external/7");
        let id = LogicalDeviceId::for_node(0, 100, DeviceVersion::V3_6).unwrap();
        assert_eq!(id.to_string(), "device@3.6/external/100");
    }

    #[test]
    fn test_for_node_overflow() {
        let v = DeviceVersion::V3_4;
        let top = LogicalDeviceId::for_node(u32::MAX - 100, 100, v).unwrap();
        assert_eq!(top.number(), u32::MAX);
        assert_eq!(LogicalDeviceId::for_node(u32::MAX - 50, 100, v), None);
        assert_eq!(LogicalDeviceId::for_node(u32::MAX, 100, v), None);
    }

    #[test]
    fn test_from_config_rejects_overflowing_suffix() {
        let config = ProviderConfig::default();
        let name = format!("video{}", u32::MAX - config.camera_id_offset);
        let node = DeviceNode::from_config(&config, &name).unwrap();
        assert_eq!(node.logical_id(&config).map(|id| id.number()), Some(u32::MAX));

        let name = format!("video{}", u32::MAX - 50);
        assert!(DeviceNode::from_config(&config, &name).is_none());
        assert!(DeviceNode::from_config(&config, "video4294967295").is_none());
    }

    #[test]
    fn test_parse_valid() {
        let id = LogicalDeviceId::parse("device@3.5/external/12").unwrap();
        assert_eq!(id.major(), 3);
        assert_eq!(id.minor(), 5);
        assert_eq!(id.number(), 12);
        assert_eq!(id.node_suffix(2), Some(10));
        assert_eq!(id.node_suffix(13), None);
    }

    #[test]
    fn test_parse_rejects_partial_matches() {
        for name in [
            "",
            "device@3.4/external/",
            "device@3.4/external/abc",
            "device@3.4/external/7x",
            "device@3.4/external/-7",
            "device@3.4/external/07",
            "device@3/external/7",
            "device@3.4/internal/7",
            "xdevice@3.4/external/7",
            "device@3.4/external/7/",
            "device@3.4.1/external/7",
            "device@a.b/external/7",
            "device@3.4/external/99999999999",
        ] {
            let err = LogicalDeviceId::parse(name).unwrap_err();
            assert!(
                matches!(err, Error::InvalidDeviceName(ref n) if n == name),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_str() {
        let id: LogicalDeviceId = "device@3.4/external/0".parse().unwrap();
        assert_eq!(id, LogicalDeviceId::new(DeviceVersion::V3_4, 0));
    }

    #[test]
    fn test_serde_as_string() {
        let id = LogicalDeviceId::for_node(5, 2, DeviceVersion::V3_4).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"device@3.4/external/7\"");
        let back: LogicalDeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<LogicalDeviceId>("\"device@3.4\"").is_err());
    }

    #[test]
    fn test_node_path() {
        let config = ProviderConfig {
            camera_id_offset: 2,
            ..Default::default()
        };
        let id = LogicalDeviceId::parse("device@3.4/external/7").unwrap();
        assert_eq!(id.node_path(&config), Some(PathBuf::from("/dev/video5")));
        let id = LogicalDeviceId::parse("device@3.4/external/1").unwrap();
        assert_eq!(id.node_path(&config), None);
    }

    #[test]
    fn test_device_node_parse() {
        let dir = Path::new("/dev");
        let node = DeviceNode::parse(dir, "video12", "video").unwrap();
        assert_eq!(node.suffix(), 12);
        assert_eq!(node.path(), Path::new("/dev/video12"));
        assert_eq!(
            node.name_attribute(Path::new("/sys/class/video4linux")),
            PathBuf::from("/sys/class/video4linux/video12/name")
        );

        assert!(DeviceNode::parse(dir, "video", "video").is_none());
        assert!(DeviceNode::parse(dir, "video-loop", "video").is_none());
        assert!(DeviceNode::parse(dir, "vide0", "video").is_none());
        assert!(DeviceNode::parse(dir, "cec0", "video").is_none());
        assert!(DeviceNode::parse(dir, "video01", "video").is_none());
    }
}
