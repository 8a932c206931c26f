// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Kernel access capability
//!
//! Discovery never touches the filesystem or issues ioctls directly. It goes
//! through a [`DeviceBackend`], which has two implementations:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`V4l2Backend`] | Real `/dev`, sysfs and V4L2 ioctls |
//! | [`MockBackend`] | Synthetic nodes and scripted hotplug events for tests |

mod mock;
mod v4l2;

use std::io;
use std::path::Path;

use extcam_sys as sys;

use crate::fourcc::FourCC;
use crate::watch::EventSource;
use crate::Error;

pub use mock::{MockBackend, MockNode};
pub use v4l2::V4l2Backend;

/// How a device node is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-write, non-blocking. Used for classification so a busy or
    /// half-initialized device cannot stall the worker.
    Probe,
    /// Read-write, blocking. Used for the capture-capability check.
    Blocking,
}

/// Result of `VIDIOC_QUERYCAP`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capability {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    pub capabilities: u32,
    pub device_caps: u32,
}

impl Capability {
    pub fn from_raw(raw: &sys::v4l2_capability) -> Self {
        Self {
            driver: sys::fixed_str(&raw.driver),
            card: sys::fixed_str(&raw.card),
            bus_info: sys::fixed_str(&raw.bus_info),
            capabilities: raw.capabilities,
            device_caps: raw.device_caps,
        }
    }

    /// Capabilities of this particular node.
    ///
    /// `device_caps` is only meaningful when the driver sets
    /// `V4L2_CAP_DEVICE_CAPS`; older drivers report everything in
    /// `capabilities`.
    pub fn node_caps(&self) -> u32 {
        if self.capabilities & sys::V4L2_CAP_DEVICE_CAPS != 0 {
            self.device_caps
        } else {
            self.capabilities
        }
    }

    /// Whether the node can capture video frames.
    pub fn is_capture(&self) -> bool {
        self.node_caps() & sys::V4L2_CAP_ANY_CAPTURE != 0
    }
}

/// An open device node.
pub trait VideoNode {
    fn query_capability(&mut self) -> io::Result<Capability>;

    /// Format `index` of queue `buf_type`; fails once the index runs past the end.
    fn enum_format(&mut self, buf_type: u32, index: u32) -> io::Result<FourCC>;
}

/// Injectable access to device nodes, their metadata and directory changes.
///
/// Every method may block and must only be called from the discovery worker
/// (or from one-shot tools that own their thread).
pub trait DeviceBackend: Send + Sync {
    /// Entry names of `dir`, in directory order.
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<String>>;

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn VideoNode>>;

    /// Read a one-line text attribute such as a sysfs `name` file.
    fn read_attribute(&self, path: &Path) -> io::Result<String>;

    /// Start watching `dir` for created and deleted entries.
    fn watch(&self, dir: &Path) -> Result<Box<dyn EventSource>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_caps_prefers_device_caps() {
        let cap = Capability {
            capabilities: sys::V4L2_CAP_DEVICE_CAPS
                | sys::V4L2_CAP_VIDEO_CAPTURE
                | sys::V4L2_CAP_META_CAPTURE,
            device_caps: sys::V4L2_CAP_META_CAPTURE,
            ..Default::default()
        };
        assert_eq!(cap.node_caps(), sys::V4L2_CAP_META_CAPTURE);
        assert!(!cap.is_capture());
    }

    #[test]
    fn test_node_caps_legacy_driver() {
        let cap = Capability {
            capabilities: sys::V4L2_CAP_VIDEO_CAPTURE_MPLANE,
            device_caps: 0,
            ..Default::default()
        };
        assert!(cap.is_capture());
    }

    #[test]
    fn test_from_raw() {
        let mut raw = sys::v4l2_capability::default();
        raw.driver[..8].copy_from_slice(b"uvcvideo");
        raw.card[..10].copy_from_slice(b"USB Camera");
        raw.capabilities = sys::V4L2_CAP_DEVICE_CAPS | sys::V4L2_CAP_VIDEO_CAPTURE;
        raw.device_caps = sys::V4L2_CAP_VIDEO_CAPTURE;

        let cap = Capability::from_raw(&raw);
        assert_eq!(cap.driver, "uvcvideo");
        assert_eq!(cap.card, "USB Camera");
        assert!(cap.is_capture());
    }
}
