// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Background discovery
//!
//! Exactly one [`DiscoveryWorker`] runs per provider. It owns every blocking
//! operation: directory reads, device opens, ioctls, settle delays and the
//! watch wait. Its life is a small state machine:
//!
//! ```text
//! Uninitialized -> ScanningExisting -> Watching -> ... -> Stopped
//! ```
//!
//! A directory that cannot be read during the initial scan ends the worker
//! with [`Error::DirectoryUnavailable`]. Everything else is per device and
//! only suppresses that one registration attempt.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::{fmt, mem};

use crate::backend::DeviceBackend;
use crate::classifier::{Classification, Classifier};
use crate::config::{DeviceVersion, ProviderConfig};
use crate::device_id::{DeviceNode, LogicalDeviceId};
use crate::provider::DeviceFactory;
use crate::registry::PresenceRegistry;
use crate::watch::{EventSource, WatchEvent, WatchKind};
use crate::Error;

/// Name of the discovery thread.
pub const THREAD_NAME: &str = "extcam-hotplug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    Uninitialized = 0,
    ScanningExisting = 1,
    Watching = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Uninitialized,
            1 => WorkerState::ScanningExisting,
            2 => WorkerState::Watching,
            _ => WorkerState::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Uninitialized => "uninitialized",
            WorkerState::ScanningExisting => "scanning",
            WorkerState::Watching => "watching",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct Shared {
    state: AtomicU8,
    stop: AtomicBool,
}

impl Shared {
    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        log::debug!("discovery worker {}", state);
        self.state.store(state as u8, Ordering::Release);
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// The hotplug discovery loop.
pub struct DiscoveryWorker<F: DeviceFactory> {
    config: Arc<ProviderConfig>,
    version: DeviceVersion,
    backend: Arc<dyn DeviceBackend>,
    factory: Arc<F>,
    registry: Arc<PresenceRegistry>,
    classifier: Classifier,
    events: Option<Box<dyn EventSource>>,
    watch_failures: u32,
    /// Id of the receiver found after the last auxiliary CREATE.
    receiver: Option<LogicalDeviceId>,
    shared: Arc<Shared>,
}

impl<F: DeviceFactory> DiscoveryWorker<F> {
    pub fn new(
        config: Arc<ProviderConfig>,
        backend: Arc<dyn DeviceBackend>,
        factory: Arc<F>,
        registry: Arc<PresenceRegistry>,
    ) -> Self {
        Self {
            version: config.device_version(),
            classifier: Classifier::new(&config),
            config,
            backend,
            factory,
            registry,
            events: None,
            watch_failures: 0,
            receiver: None,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// The receiver id currently remembered, if any.
    pub fn receiver(&self) -> Option<LogicalDeviceId> {
        self.receiver
    }

    /// Start the worker on its own thread.
    pub fn spawn(mut self) -> Result<WorkerHandle, Error> {
        let shared = self.shared.clone();
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run())?;
        Ok(WorkerHandle {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Run the whole state machine on the calling thread until a stop is
    /// requested through a [`WorkerHandle`] or the initial scan fails.
    pub fn run(&mut self) -> Result<(), Error> {
        self.shared.set_state(WorkerState::ScanningExisting);
        // Registering first means nodes appearing mid-scan are not missed;
        // duplicates are absorbed by the registry.
        self.register_watch();

        if let Err(err) = self.scan_existing() {
            log::error!("{}! Exiting discovery", err);
            self.shared.set_state(WorkerState::Stopped);
            return Err(err);
        }

        self.shared.set_state(WorkerState::Watching);
        while !self.shared.stop_requested() {
            self.poll_once();
        }

        self.events = None;
        self.shared.set_state(WorkerState::Stopped);
        Ok(())
    }

    /// Enumerate the device directory and register every external node.
    ///
    /// Returns how many devices were recorded present.
    pub fn scan_existing(&mut self) -> Result<usize, Error> {
        let dir = &self.config.device_dir;
        let names = self
            .backend
            .read_dir(dir)
            .map_err(|source| Error::DirectoryUnavailable {
                path: dir.clone(),
                source,
            })?;

        let mut added = 0;
        for name in names {
            let Some(node) = self.candidate(&name) else {
                continue;
            };
            match self.classifier.classify(self.backend.as_ref(), &node) {
                Classification::NotExternal => {}
                Classification::External => {
                    if self.device_added(&node) {
                        added += 1;
                    }
                }
                Classification::ExternalReceiver => {
                    self.receiver = self.logical_id(&node);
                    if self.device_added(&node) {
                        added += 1;
                    }
                }
            }
        }
        log::info!("initial scan of {} found {} external cameras", dir.display(), added);
        Ok(added)
    }

    /// Try to start watching the device directory. Failures are logged and
    /// retried on the next poll.
    pub fn register_watch(&mut self) -> bool {
        let dir = &self.config.device_dir;
        match self.backend.watch(dir) {
            Ok(source) => {
                if self.watch_failures > 0 {
                    log::info!(
                        "watch on {} registered after {} failures",
                        dir.display(),
                        self.watch_failures
                    );
                }
                self.events = Some(source);
                self.watch_failures = 0;
                true
            }
            Err(err) => {
                if self.watch_failures == 0 {
                    log::error!("add watch on {} failed: {}, will retry", dir.display(), err);
                } else {
                    log::trace!("add watch on {} failed again: {}", dir.display(), err);
                }
                self.watch_failures = self.watch_failures.saturating_add(1);
                false
            }
        }
    }

    /// One iteration of the watch loop: wait up to the poll timeout and
    /// handle every change record received. Returns the number of records.
    pub fn poll_once(&mut self) -> usize {
        let timeout = self.config.poll_timeout();
        if self.events.is_none() {
            if !self.register_watch() {
                thread::sleep(timeout);
            }
            return 0;
        }

        let result = match self.events.as_mut() {
            Some(source) => source.wait(timeout),
            None => return 0,
        };
        let events = match result {
            Ok(events) => events,
            Err(err) => {
                log::error!("watch on {} lost: {}", self.config.device_dir.display(), err);
                self.events = None;
                return 0;
            }
        };

        let count = events.len();
        for event in &events {
            self.handle_event(event);
        }
        count
    }

    /// Apply one directory change record.
    pub fn handle_event(&mut self, event: &WatchEvent) {
        if let Some(node) = DeviceNode::from_config(&self.config, &event.name) {
            if self.config.is_internal(node.suffix()) {
                log::trace!("ignoring internal device {}", node);
                return;
            }
            match event.kind {
                WatchKind::Created => {
                    log::info!("{} created", node);
                    thread::sleep(self.config.settle_delay());
                    match self.classifier.classify(self.backend.as_ref(), &node) {
                        Classification::NotExternal => {}
                        Classification::External => {
                            self.device_added(&node);
                        }
                        Classification::ExternalReceiver => {
                            self.receiver = self.logical_id(&node);
                            self.device_added(&node);
                        }
                    }
                }
                WatchKind::Deleted => {
                    log::info!("{} deleted", node);
                    if self.receiver.is_some() && self.receiver == self.logical_id(&node) {
                        self.receiver = None;
                    }
                    self.device_removed(&node);
                }
            }
        } else if event.name.starts_with(self.config.aux_prefix.as_str()) {
            match event.kind {
                WatchKind::Created => {
                    log::info!("{} created, looking for receiver", event.name);
                    thread::sleep(self.config.receiver_settle_delay());
                    if let Some(node) = self.find_receiver() {
                        self.receiver = self.logical_id(&node);
                        self.device_added(&node);
                        log::info!("receiver {} added", node);
                    }
                }
                WatchKind::Deleted => match self.receiver.take() {
                    Some(id) => {
                        log::info!("{} deleted, removing receiver {}", event.name, id);
                        self.registry.record_absent(id);
                    }
                    None => log::warn!("{} deleted but no receiver is known", event.name),
                },
            }
        } else {
            log::trace!("ignoring {:?} {}", event.kind, event.name);
        }
    }

    /// The first node in directory order classified as a receiver.
    pub fn find_receiver(&self) -> Option<DeviceNode> {
        let dir = &self.config.device_dir;
        let names = match self.backend.read_dir(dir) {
            Ok(names) => names,
            Err(err) => {
                log::error!("cannot open {}: {}", dir.display(), err);
                return None;
            }
        };
        names
            .iter()
            .filter_map(|name| self.candidate(name))
            .find(|node| {
                self.classifier.classify(self.backend.as_ref(), node)
                    == Classification::ExternalReceiver
            })
    }

    /// Probe a positively classified node, trial-construct its device and
    /// record it present. Returns whether the registry changed.
    pub fn device_added(&self, node: &DeviceNode) -> bool {
        let Some(id) = self.logical_id(node) else {
            return false;
        };
        if !self.classifier.probe_capture(self.backend.as_ref(), node) {
            return false;
        }

        match self
            .factory
            .create(DeviceVersion::V3_4, node.path(), &self.config)
        {
            Ok(device) => mem::drop(device),
            Err(err) => {
                log::warn!("Attempt to init camera device {} failed: {}", node, err);
                return false;
            }
        }

        self.registry.record_present(id)
    }

    /// Record the node removed. Returns whether the registry changed.
    pub fn device_removed(&self, node: &DeviceNode) -> bool {
        self.logical_id(node)
            .map_or(false, |id| self.registry.record_absent(id))
    }

    /// A device node of the configured prefix that is not internal.
    fn candidate(&self, name: &str) -> Option<DeviceNode> {
        let node = DeviceNode::from_config(&self.config, name)?;
        if self.config.is_internal(node.suffix()) {
            log::trace!("skipping internal device {}", node);
            return None;
        }
        Some(node)
    }

    fn logical_id(&self, node: &DeviceNode) -> Option<LogicalDeviceId> {
        LogicalDeviceId::for_node(node.suffix(), self.config.camera_id_offset, self.version)
    }
}

/// Control handle of a spawned [`DiscoveryWorker`].
///
/// Dropping the handle stops and joins the worker.
pub struct WorkerHandle {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<Result<(), Error>>>>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Whether the worker thread has exited (or was already joined).
    pub fn is_finished(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, |thread| thread.is_finished())
    }

    /// Ask the worker to stop. It notices within one poll timeout, or after
    /// the settle delay it is currently sleeping through.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// Wait for the worker thread to exit and return its result.
    ///
    /// Blocks until the worker stops on its own or [`request_stop`] is
    /// called. Only the first call observes the worker's error.
    ///
    /// [`request_stop`]: WorkerHandle::request_stop
    pub fn join(&self) -> Result<(), Error> {
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match thread {
            Some(thread) => thread.join().map_err(|_| Error::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("state", &self.state())
            .field("stop_requested", &self.shared.stop_requested())
            .finish()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.request_stop();
        if let Err(err) = self.join() {
            log::debug!("discovery worker ended with: {}", err);
        }
    }
}
