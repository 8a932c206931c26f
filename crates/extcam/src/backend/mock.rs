// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Mock backend for testing without hardware.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use extcam_sys as sys;

use super::{Capability, DeviceBackend, OpenMode, VideoNode};
use crate::config::ProviderConfig;
use crate::fourcc::FourCC;
use crate::watch::{ChannelSource, EventSource, WatchEvent};
use crate::Error;

/// A synthetic device node.
///
/// # Example
///
/// ```
/// use extcam::MockNode;
///
/// let webcam = MockNode::uvc_camera();
/// let metadata = MockNode::uvc_metadata();
/// let broken = MockNode::uvc_camera().with_querycap_error();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    pub driver: String,
    pub card: String,
    /// Content of the sysfs `name` attribute; `None` makes the read fail.
    pub sysfs_name: Option<String>,
    pub device_caps: u32,
    pub formats: Vec<FourCC>,
    pub open_error: bool,
    pub querycap_error: bool,
}

impl MockNode {
    /// A USB webcam capture node.
    pub fn uvc_camera() -> Self {
        Self {
            driver: "uvcvideo".to_string(),
            card: "USB 2.0 Camera".to_string(),
            sysfs_name: Some("USB 2.0 Camera: USB Camera\n".to_string()),
            device_caps: sys::V4L2_CAP_VIDEO_CAPTURE,
            formats: vec![FourCC::from(b"YUYV"), FourCC::from(b"MJPG")],
            ..Default::default()
        }
    }

    /// The metadata node a UVC webcam exposes next to its capture node.
    pub fn uvc_metadata() -> Self {
        Self {
            device_caps: sys::V4L2_CAP_META_CAPTURE,
            formats: Vec::new(),
            ..Self::uvc_camera()
        }
    }

    /// A hardware codec node with the given sysfs name.
    pub fn codec(name: &str) -> Self {
        Self {
            driver: "amphion-vpu".to_string(),
            card: name.to_string(),
            sysfs_name: Some(format!("{}\n", name)),
            device_caps: sys::V4L2_CAP_VIDEO_M2M | sys::V4L2_CAP_VIDEO_CAPTURE,
            formats: vec![FourCC::from(b"NV12")],
            ..Default::default()
        }
    }

    /// A capture-driver node with the given sysfs name; an HDMI receiver
    /// when the name carries the receiver prefix.
    pub fn capture(name: &str) -> Self {
        Self {
            driver: "mxc-isi-cap".to_string(),
            card: name.to_string(),
            sysfs_name: Some(format!("{}\n", name)),
            device_caps: sys::V4L2_CAP_VIDEO_CAPTURE_MPLANE,
            formats: vec![FourCC::from(b"NV12")],
            ..Default::default()
        }
    }

    pub fn with_driver(mut self, driver: &str) -> Self {
        self.driver = driver.to_string();
        self
    }

    pub fn with_sysfs_name(mut self, name: Option<&str>) -> Self {
        self.sysfs_name = name.map(|n| format!("{}\n", n));
        self
    }

    pub fn with_device_caps(mut self, caps: u32) -> Self {
        self.device_caps = caps;
        self
    }

    pub fn with_open_error(mut self) -> Self {
        self.open_error = true;
        self
    }

    pub fn with_querycap_error(mut self) -> Self {
        self.querycap_error = true;
        self
    }
}

struct MockVideoNode {
    node: MockNode,
}

impl VideoNode for MockVideoNode {
    fn query_capability(&mut self) -> io::Result<Capability> {
        if self.node.querycap_error {
            return Err(io::Error::from_raw_os_error(sys::libc::EIO));
        }
        Ok(Capability {
            driver: self.node.driver.clone(),
            card: self.node.card.clone(),
            bus_info: "usb-mock".to_string(),
            capabilities: sys::V4L2_CAP_DEVICE_CAPS | self.node.device_caps,
            device_caps: self.node.device_caps,
        })
    }

    fn enum_format(&mut self, buf_type: u32, index: u32) -> io::Result<FourCC> {
        if buf_type != sys::V4L2_BUF_TYPE_VIDEO_CAPTURE
            || self.node.device_caps & sys::V4L2_CAP_VIDEO_CAPTURE == 0
        {
            return Err(io::Error::from_raw_os_error(sys::libc::EINVAL));
        }
        self.node
            .formats
            .get(index as usize)
            .copied()
            .ok_or_else(|| io::Error::from_raw_os_error(sys::libc::EINVAL))
    }
}

#[derive(Default)]
struct MockState {
    entries: Vec<String>,
    nodes: HashMap<PathBuf, MockNode>,
    opens: HashMap<PathBuf, usize>,
    events: Option<Receiver<WatchEvent>>,
    directory_error: bool,
    watch_error: bool,
}

/// Backend serving synthetic nodes from memory.
///
/// Entries are listed in insertion order. Hotplug is simulated by changing
/// the entry list and emitting a [`WatchEvent`] to the watch returned by
/// [`DeviceBackend::watch`].
///
/// # Example
///
/// ```
/// use extcam::{MockBackend, MockNode, ProviderConfig};
///
/// let backend = MockBackend::for_config(&ProviderConfig::default());
/// backend.add_node("video0", MockNode::uvc_camera());
/// backend.hotplug("video2", MockNode::uvc_camera());
/// backend.unplug("video2");
/// ```
pub struct MockBackend {
    dir: PathBuf,
    sysfs_root: PathBuf,
    events: Sender<WatchEvent>,
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new(dir: impl Into<PathBuf>, sysfs_root: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            dir: dir.into(),
            sysfs_root: sysfs_root.into(),
            events: tx,
            state: Mutex::new(MockState {
                events: Some(rx),
                ..Default::default()
            }),
        }
    }

    pub fn for_config(config: &ProviderConfig) -> Self {
        Self::new(&config.device_dir, &config.sysfs_root)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a directory entry without a backing node (e.g. `cec0`).
    pub fn add_entry(&self, name: &str) {
        let mut state = self.lock();
        if !state.entries.iter().any(|e| e == name) {
            state.entries.push(name.to_string());
        }
    }

    /// Add a device node present before discovery starts.
    pub fn add_node(&self, name: &str, node: MockNode) {
        self.add_entry(name);
        self.lock().nodes.insert(self.dir.join(name), node);
    }

    pub fn remove_entry(&self, name: &str) {
        let mut state = self.lock();
        state.entries.retain(|e| e != name);
        state.nodes.remove(&self.dir.join(name));
    }

    /// Queue a change record for the watcher.
    pub fn emit(&self, event: WatchEvent) {
        let _ = self.events.send(event);
    }

    /// Add a node and announce its creation.
    pub fn hotplug(&self, name: &str, node: MockNode) {
        self.add_node(name, node);
        self.emit(WatchEvent::created(name));
    }

    /// Add an entry without a node and announce its creation.
    pub fn hotplug_entry(&self, name: &str) {
        self.add_entry(name);
        self.emit(WatchEvent::created(name));
    }

    /// Remove an entry and announce its deletion.
    pub fn unplug(&self, name: &str) {
        self.remove_entry(name);
        self.emit(WatchEvent::deleted(name));
    }

    /// Make [`DeviceBackend::read_dir`] fail.
    pub fn set_directory_error(&self, fail: bool) {
        self.lock().directory_error = fail;
    }

    /// Make [`DeviceBackend::watch`] fail.
    pub fn set_watch_error(&self, fail: bool) {
        self.lock().watch_error = fail;
    }

    /// How many times the node called `name` has been opened.
    pub fn open_count(&self, name: &str) -> usize {
        self.lock()
            .opens
            .get(&self.dir.join(name))
            .copied()
            .unwrap_or(0)
    }
}

impl DeviceBackend for MockBackend {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let state = self.lock();
        if state.directory_error || dir != self.dir {
            return Err(io::Error::from_raw_os_error(sys::libc::ENOENT));
        }
        Ok(state.entries.clone())
    }

    fn open(&self, path: &Path, _mode: OpenMode) -> io::Result<Box<dyn VideoNode>> {
        let mut state = self.lock();
        *state.opens.entry(path.to_path_buf()).or_insert(0) += 1;
        match state.nodes.get(path) {
            Some(node) if node.open_error => Err(io::Error::from_raw_os_error(sys::libc::EBUSY)),
            Some(node) => Ok(Box::new(MockVideoNode { node: node.clone() })),
            None => Err(io::Error::from_raw_os_error(sys::libc::ENOENT)),
        }
    }

    fn read_attribute(&self, path: &Path) -> io::Result<String> {
        let state = self.lock();
        let node_name = path
            .strip_prefix(&self.sysfs_root)
            .ok()
            .and_then(|rest| rest.parent())
            .map(|name| self.dir.join(name));
        node_name
            .and_then(|node| state.nodes.get(&node))
            .and_then(|node| node.sysfs_name.clone())
            .ok_or_else(|| io::Error::from_raw_os_error(sys::libc::ENOENT))
    }

    fn watch(&self, dir: &Path) -> Result<Box<dyn EventSource>, Error> {
        let mut state = self.lock();
        if state.watch_error {
            return Err(Error::Watch(notify::Error::generic("inotify add watch failed")));
        }
        if dir != self.dir {
            return Err(Error::Watch(notify::Error::path_not_found()));
        }
        let rx = state
            .events
            .take()
            .ok_or_else(|| Error::Watch(notify::Error::generic("mock watch already taken")))?;
        Ok(Box::new(ChannelSource::new(rx)))
    }
}
