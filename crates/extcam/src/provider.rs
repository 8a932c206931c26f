// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Request-facing provider facade
//!
//! [`ExternalCameraProvider`] owns the presence registry and the discovery
//! worker. Requests never block on device I/O: they only read the registry
//! and, for [`resolve`](ExternalCameraProvider::resolve), hand device
//! construction to the [`DeviceFactory`] collaborator.

use std::path::Path;
use std::sync::Arc;

use crate::backend::DeviceBackend;
use crate::config::{DeviceVersion, ProviderConfig};
use crate::device_id::LogicalDeviceId;
use crate::registry::{NotificationSink, PresenceRegistry, PresenceState};
use crate::worker::{DiscoveryWorker, WorkerHandle, WorkerState};
use crate::{Error, Status};

/// Builds the capture device object behind a logical id.
///
/// Streaming itself is outside this crate. The factory is called on the
/// discovery thread for a trial construction (always with
/// [`DeviceVersion::V3_4`], the result is dropped immediately) and on the
/// caller's thread from [`ExternalCameraProvider::resolve`] with the
/// configured version.
pub trait DeviceFactory: Send + Sync + 'static {
    type Device;

    /// Construct the device for `path`. Any error means initialization
    /// failed.
    fn create(
        &self,
        version: DeviceVersion,
        path: &Path,
        config: &ProviderConfig,
    ) -> Result<Self::Device, Error>;
}

pub struct ExternalCameraProvider<F: DeviceFactory> {
    config: Arc<ProviderConfig>,
    version: DeviceVersion,
    registry: Arc<PresenceRegistry>,
    factory: Arc<F>,
    worker: WorkerHandle,
}

impl<F: DeviceFactory> ExternalCameraProvider<F> {
    /// Validate `config`, resolve the device version and start discovery.
    ///
    /// Returns as soon as the worker thread is running; the initial scan
    /// happens in the background.
    pub fn new(
        config: ProviderConfig,
        backend: Arc<dyn DeviceBackend>,
        factory: Arc<F>,
    ) -> Result<Self, Error> {
        let config = Arc::new(config.normalized()?);
        let version = config.device_version();
        log::debug!("Preferred camera device version is {}", version);

        let registry = Arc::new(PresenceRegistry::new());
        let worker = DiscoveryWorker::new(
            config.clone(),
            backend,
            factory.clone(),
            registry.clone(),
        )
        .spawn()?;

        Ok(Self {
            config,
            version,
            registry,
            factory,
            worker,
        })
    }

    /// Install `sink` as the subscriber and replay every present device to
    /// it. Replaces any previous subscriber.
    pub fn attach_subscriber(&self, sink: Arc<dyn NotificationSink>) {
        self.registry.attach(sink);
    }

    /// Clear the subscriber. Returns whether one was attached.
    pub fn detach_subscriber(&self) -> bool {
        self.registry.detach()
    }

    /// Construct the device behind logical id `name`.
    ///
    /// Fails with [`Error::InvalidDeviceName`] if `name` does not parse,
    /// [`Error::DeviceNotPresent`] if it is not currently present, and
    /// passes construction errors through. Presence is never changed here.
    pub fn resolve(&self, name: &str) -> Result<F::Device, Error> {
        let id = LogicalDeviceId::parse(name)?;
        if !self.registry.is_present(&id) {
            return Err(Error::DeviceNotPresent(name.to_string()));
        }
        let path = id
            .node_path(&self.config)
            .ok_or_else(|| Error::InvalidDeviceName(name.to_string()))?;

        log::debug!("Constructing v{} external camera device {}", self.version, path.display());
        self.factory
            .create(self.version, &path, &self.config)
            .map_err(|err| {
                log::error!("camera device {} init failed: {}", path.display(), err);
                match err {
                    err @ Error::DeviceInit { .. } => err,
                    other => Error::DeviceInit {
                        path: path.clone(),
                        reason: other.to_string(),
                    },
                }
            })
    }

    /// Always empty: external cameras are only announced through status
    /// notifications.
    pub fn camera_id_list(&self) -> Vec<LogicalDeviceId> {
        Vec::new()
    }

    /// No external camera has a flash unit, but the torch API is accepted.
    pub fn is_set_torch_mode_supported(&self) -> bool {
        true
    }

    pub fn concurrent_camera_ids(&self) -> Vec<Vec<LogicalDeviceId>> {
        Vec::new()
    }

    pub fn is_concurrent_stream_combination_supported(&self, _ids: &[LogicalDeviceId]) -> bool {
        false
    }

    /// The pre-3.x device interface is not offered.
    pub fn legacy_device_interface(&self, _name: &str) -> Status {
        Error::NotSupported("legacy device interface").status()
    }

    pub fn device_version(&self) -> DeviceVersion {
        self.version
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn presence(&self, id: &LogicalDeviceId) -> Option<PresenceState> {
        self.registry.lookup(id)
    }

    /// Ids currently present, sorted.
    pub fn present_devices(&self) -> Vec<LogicalDeviceId> {
        self.registry
            .snapshot()
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Whether the worker thread has exited, normally or not.
    pub fn worker_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Stop discovery and wait for the worker. Returns the worker's error if
    /// it ended on its own with one.
    pub fn shutdown(&self) -> Result<(), Error> {
        self.worker.request_stop();
        self.worker.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockNode};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingFactory {
        calls: Mutex<Vec<(DeviceVersion, PathBuf)>>,
        fail: bool,
    }

    impl DeviceFactory for RecordingFactory {
        type Device = PathBuf;

        fn create(
            &self,
            version: DeviceVersion,
            path: &Path,
            _config: &ProviderConfig,
        ) -> Result<PathBuf, Error> {
            self.calls.lock().unwrap().push((version, path.to_path_buf()));
            if self.fail && version != DeviceVersion::V3_4 {
                return Err(Error::Config("no formats".into()));
            }
            Ok(path.to_path_buf())
        }
    }

    fn config() -> ProviderConfig {
        ProviderConfig {
            camera_id_offset: 2,
            device_version_minor: 5,
            settle_delay_ms: 0,
            receiver_settle_delay_ms: 0,
            poll_timeout_ms: 10,
            ..Default::default()
        }
    }

    fn wait_for(provider: &ExternalCameraProvider<RecordingFactory>, state: WorkerState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while provider.worker_state() != state && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(provider.worker_state(), state);
    }

    fn provider(
        fail: bool,
    ) -> (
        ExternalCameraProvider<RecordingFactory>,
        Arc<RecordingFactory>,
    ) {
        let config = config();
        let backend = Arc::new(MockBackend::for_config(&config));
        backend.add_node("video5", MockNode::uvc_camera());
        let factory = Arc::new(RecordingFactory {
            fail,
            ..Default::default()
        });
        let provider = ExternalCameraProvider::new(config, backend, factory.clone()).unwrap();
        wait_for(&provider, WorkerState::Watching);
        (provider, factory)
    }

    #[test]
    fn test_resolve_present_device() {
        let (provider, factory) = provider(false);
        assert_eq!(provider.device_version(), DeviceVersion::V3_5);

        let device = provider.resolve("device@3.5/external/7").unwrap();
        assert_eq!(device, PathBuf::from("/dev/video5"));

        let calls = factory.calls.lock().unwrap();
        assert_eq!(calls[0], (DeviceVersion::V3_4, PathBuf::from("/dev/video5")));
        assert_eq!(calls[1], (DeviceVersion::V3_5, PathBuf::from("/dev/video5")));
    }

    #[test]
    fn test_resolve_errors() {
        let (provider, _) = provider(false);

        let err = provider.resolve("device@3.5/external/x").unwrap_err();
        assert!(matches!(err, Error::InvalidDeviceName(_)));
        assert_eq!(err.status(), Status::IllegalArgument);

        let err = provider.resolve("device@3.5/external/8").unwrap_err();
        assert!(matches!(err, Error::DeviceNotPresent(_)));
        assert_eq!(err.status(), Status::IllegalArgument);

        // Present ids carry the configured version only.
        let err = provider.resolve("device@3.4/external/7").unwrap_err();
        assert!(matches!(err, Error::DeviceNotPresent(_)));
    }

    #[test]
    fn test_construction_failure_keeps_presence() {
        let (provider, _) = provider(true);
        let err = provider.resolve("device@3.5/external/7").unwrap_err();
        assert!(matches!(err, Error::DeviceInit { .. }));
        assert_eq!(err.status(), Status::InternalError);

        let id = LogicalDeviceId::parse("device@3.5/external/7").unwrap();
        assert_eq!(provider.presence(&id), Some(PresenceState::Present));
    }

    #[test]
    fn test_query_surface() {
        let (provider, _) = provider(false);
        assert!(provider.camera_id_list().is_empty());
        assert!(provider.is_set_torch_mode_supported());
        assert!(provider.concurrent_camera_ids().is_empty());
        assert!(!provider.is_concurrent_stream_combination_supported(&[]));
        assert_eq!(
            provider.legacy_device_interface("device@3.5/external/7"),
            Status::OperationNotSupported
        );
        assert_eq!(provider.present_devices().len(), 1);
    }

    #[test]
    fn test_shutdown() {
        let (provider, _) = provider(false);
        provider.shutdown().unwrap();
        assert_eq!(provider.worker_state(), WorkerState::Stopped);
        assert!(provider.worker_finished());
        // A second shutdown is a no-op.
        provider.shutdown().unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ProviderConfig {
            poll_timeout_ms: 0,
            ..Default::default()
        };
        let backend = Arc::new(MockBackend::for_config(&config));
        let result =
            ExternalCameraProvider::new(config, backend, Arc::new(RecordingFactory::default()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
