// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! External device classification
//!
//! A board exposes many `/dev/video*` nodes: ISP channels, hardware codecs,
//! metadata nodes. Only two kinds are treated as external cameras:
//!
//! | Driver name contains | Extra condition | Result |
//! |----------------------|-----------------|--------|
//! | `uvc` | first capture format enumerates | [`Classification::External`] |
//! | `cap` | sysfs name starts with the receiver prefix | [`Classification::ExternalReceiver`] |
//!
//! Nodes whose sysfs name matches a hardware codec are rejected before the
//! driver is even looked at. Any I/O failure yields
//! [`Classification::NotExternal`] for that attempt only; nothing is retried.

use std::fmt;
use std::path::PathBuf;

use extcam_sys as sys;

use crate::backend::{DeviceBackend, OpenMode};
use crate::config::{ClassifierConfig, ProviderConfig};
use crate::device_id::DeviceNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    NotExternal,
    External,
    /// An HDMI receiver capture node; its readiness is signalled by a
    /// companion control node rather than its own creation.
    ExternalReceiver,
}

impl Classification {
    pub fn is_external(&self) -> bool {
        !matches!(self, Classification::NotExternal)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Classification::NotExternal => "not-external",
            Classification::External => "external",
            Classification::ExternalReceiver => "external-receiver",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decides whether a device node is a relevant external capture device.
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: ClassifierConfig,
    sysfs_root: PathBuf,
}

impl Classifier {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            patterns: config.classifier.clone(),
            sysfs_root: config.sysfs_root.clone(),
        }
    }

    /// Classify `node`. Blocks on device I/O.
    pub fn classify(&self, backend: &dyn DeviceBackend, node: &DeviceNode) -> Classification {
        let mut dev = match backend.open(node.path(), OpenMode::Probe) {
            Ok(dev) => dev,
            Err(err) => {
                log::error!("open dev path:{} failed: {}", node, err);
                return Classification::NotExternal;
            }
        };

        let cap = match dev.query_capability() {
            Ok(cap) => cap,
            Err(err) => {
                log::error!("QUERYCAP dev path:{} failed: {}", node, err);
                return Classification::NotExternal;
            }
        };

        let name_path = node.name_attribute(&self.sysfs_root);
        let name = match backend.read_attribute(&name_path) {
            Ok(name) => name,
            Err(err) => {
                log::error!("can't read video device name {}: {}", name_path.display(), err);
                return Classification::NotExternal;
            }
        };
        let name = name.trim_end();

        if self
            .patterns
            .codec_name_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
        {
            log::debug!("{} is hardware codec {}, skipping", node, name);
            return Classification::NotExternal;
        }

        if cap.driver.contains(self.patterns.uvc_marker.as_str()) {
            match dev.enum_format(sys::V4L2_BUF_TYPE_VIDEO_CAPTURE, 0) {
                Ok(fourcc) => {
                    log::debug!("{} ({}) is a UVC camera, first format {}", node, name, fourcc);
                    Classification::External
                }
                Err(_) => {
                    log::warn!(
                        "Although {} driver name has {}, it's a uvc meta device",
                        node,
                        self.patterns.uvc_marker
                    );
                    Classification::NotExternal
                }
            }
        } else if cap.driver.contains(self.patterns.capture_marker.as_str()) {
            if name.starts_with(self.patterns.receiver_name_prefix.as_str()) {
                log::debug!("{} ({}) is an HDMI receiver", node, name);
                Classification::ExternalReceiver
            } else {
                Classification::NotExternal
            }
        } else {
            log::trace!("{} driver {} is not external", node, cap.driver);
            Classification::NotExternal
        }
    }

    /// Check that `node` opens blocking and advertises video capture.
    pub fn probe_capture(&self, backend: &dyn DeviceBackend, node: &DeviceNode) -> bool {
        let mut dev = match backend.open(node.path(), OpenMode::Blocking) {
            Ok(dev) => dev,
            Err(err) => {
                log::error!("open v4l2 device {} failed: {}", node, err);
                return false;
            }
        };

        match dev.query_capability() {
            Ok(cap) if cap.is_capture() => true,
            Ok(_) => {
                log::warn!("device {} does not support VIDEO_CAPTURE", node);
                false
            }
            Err(err) => {
                log::error!("v4l2 QUERYCAP {} failed: {}", node, err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockNode};

    fn setup() -> (ProviderConfig, MockBackend, Classifier) {
        let config = ProviderConfig::default();
        let backend = MockBackend::for_config(&config);
        let classifier = Classifier::new(&config);
        (config, backend, classifier)
    }

    fn classify(name: &str, mock: MockNode) -> Classification {
        let (config, backend, classifier) = setup();
        backend.add_node(name, mock);
        let node = DeviceNode::from_config(&config, name).unwrap();
        classifier.classify(&backend, &node)
    }

    #[test]
    fn test_uvc_camera_is_external() {
        assert_eq!(
            classify("video2", MockNode::uvc_camera()),
            Classification::External
        );
    }

    #[test]
    fn test_uvc_metadata_node_is_not_external() {
        assert_eq!(
            classify("video3", MockNode::uvc_metadata()),
            Classification::NotExternal
        );
    }

    #[test]
    fn test_codec_rejected_even_with_uvc_driver() {
        let mock = MockNode::codec("amphion-vpu-decoder").with_driver("uvcvideo");
        assert_eq!(classify("video0", mock), Classification::NotExternal);
        let mock = MockNode::codec("amphion-vpu-encoder.1").with_driver("mxc-cap");
        assert_eq!(classify("video1", mock), Classification::NotExternal);
    }

    #[test]
    fn test_receiver() {
        assert_eq!(
            classify("video3", MockNode::capture("mxc_isi.6.capture")),
            Classification::ExternalReceiver
        );
        assert_eq!(
            classify("video4", MockNode::capture("mxc_isi.0.capture")),
            Classification::NotExternal
        );
    }

    #[test]
    fn test_unknown_driver() {
        let mock = MockNode::uvc_camera().with_driver("vivid");
        assert_eq!(classify("video7", mock), Classification::NotExternal);
    }

    #[test]
    fn test_io_failures_are_not_external() {
        assert_eq!(
            classify("video2", MockNode::uvc_camera().with_open_error()),
            Classification::NotExternal
        );
        assert_eq!(
            classify("video2", MockNode::uvc_camera().with_querycap_error()),
            Classification::NotExternal
        );
        assert_eq!(
            classify("video2", MockNode::uvc_camera().with_sysfs_name(None)),
            Classification::NotExternal
        );
    }

    #[test]
    fn test_probe_capture() {
        let (config, backend, classifier) = setup();
        backend.add_node("video2", MockNode::uvc_camera());
        backend.add_node("video3", MockNode::uvc_metadata());
        backend.add_node("video4", MockNode::capture("mxc_isi.6.capture"));

        let probe = |name: &str| {
            let node = DeviceNode::from_config(&config, name).unwrap();
            classifier.probe_capture(&backend, &node)
        };
        assert!(probe("video2"));
        assert!(!probe("video3"));
        assert!(probe("video4"));
        assert!(!probe("video5"));
    }

    #[test]
    fn test_classification_display() {
        assert_eq!(Classification::ExternalReceiver.to_string(), "external-receiver");
        assert!(Classification::External.is_external());
        assert!(!Classification::NotExternal.is_external());
    }
}
