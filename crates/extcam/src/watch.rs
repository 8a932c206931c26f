// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Directory change notifications
//!
//! The discovery worker only needs to know that an entry of the device
//! directory was created or deleted. [`DirectoryWatcher`] gets that from a
//! non-recursive [`notify`] watcher; [`ChannelSource`] gets it from a plain
//! channel so tests can script hotplug sequences.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Created,
    Deleted,
}

/// One change record: the affected entry name and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub name: String,
    pub kind: WatchKind,
}

impl WatchEvent {
    pub fn created(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: WatchKind::Created,
        }
    }

    pub fn deleted(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: WatchKind::Deleted,
        }
    }
}

/// A source of directory change records with a bounded wait.
pub trait EventSource: Send {
    /// Wait up to `timeout` for changes. Returns every record queued by then,
    /// or an empty batch on timeout.
    fn wait(&mut self, timeout: Duration) -> Result<Vec<WatchEvent>, Error>;
}

/// Drain whatever else is already queued behind `first`.
fn drain<T, F>(rx: &Receiver<T>, first: T, mut convert: F) -> Vec<WatchEvent>
where
    F: FnMut(T, &mut Vec<WatchEvent>),
{
    let mut events = Vec::new();
    convert(first, &mut events);
    loop {
        match rx.try_recv() {
            Ok(item) => convert(item, &mut events),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    events
}

fn closed() -> Error {
    Error::Watch(notify::Error::generic("watch channel closed"))
}

/// Event source fed by an in-process channel.
pub struct ChannelSource {
    rx: Receiver<WatchEvent>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<WatchEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelSource {
    fn wait(&mut self, timeout: Duration) -> Result<Vec<WatchEvent>, Error> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => Ok(drain(&self.rx, first, |event, out| out.push(event))),
            Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => Err(closed()),
        }
    }
}

/// Watches one directory (non-recursively) for created and deleted entries.
pub struct DirectoryWatcher {
    dir: PathBuf,
    rx: Receiver<notify::Result<notify::Event>>,
    // Dropping the watcher removes the kernel watch.
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    pub fn new(dir: &Path) -> Result<Self, Error> {
        // notify reports absolute paths for a relative watch.
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            env::current_dir()?.join(dir)
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        log::debug!("watching {} for device nodes", dir.display());

        Ok(Self {
            dir,
            rx,
            _watcher: watcher,
        })
    }

    fn convert(dir: &Path, res: notify::Result<notify::Event>, out: &mut Vec<WatchEvent>) {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                log::warn!("watch error on {}: {}", dir.display(), err);
                return;
            }
        };

        let kind = match event.kind {
            EventKind::Create(_) => WatchKind::Created,
            EventKind::Remove(_) => WatchKind::Deleted,
            _ => return,
        };

        for path in &event.paths {
            if path.parent() != Some(dir) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                out.push(WatchEvent {
                    name: name.to_string(),
                    kind,
                });
            }
        }
    }
}

impl EventSource for DirectoryWatcher {
    fn wait(&mut self, timeout: Duration) -> Result<Vec<WatchEvent>, Error> {
        let dir = self.dir.as_path();
        match self.rx.recv_timeout(timeout) {
            Ok(first) => Ok(drain(&self.rx, first, |res, out| {
                Self::convert(dir, res, out)
            })),
            Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => Err(closed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_channel_source_batches() {
        let (tx, rx) = mpsc::channel();
        let mut source = ChannelSource::new(rx);

        assert!(source.wait(Duration::from_millis(1)).unwrap().is_empty());

        tx.send(WatchEvent::created("video2")).unwrap();
        tx.send(WatchEvent::deleted("video2")).unwrap();
        let events = source.wait(Duration::from_millis(10)).unwrap();
        assert_eq!(
            events,
            vec![WatchEvent::created("video2"), WatchEvent::deleted("video2")]
        );

        drop(tx);
        assert!(matches!(
            source.wait(Duration::from_millis(1)),
            Err(Error::Watch(_))
        ));
    }

    #[test]
    fn test_convert_filters_kinds_and_paths() {
        let dir = Path::new("/dev");
        let mut out = Vec::new();

        let create = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/dev/video4"));
        DirectoryWatcher::convert(dir, Ok(create), &mut out);

        let remove = notify::Event::new(EventKind::Remove(RemoveKind::Any))
            .add_path(PathBuf::from("/dev/cec0"));
        DirectoryWatcher::convert(dir, Ok(remove), &mut out);

        let modify = notify::Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/dev/video4"));
        DirectoryWatcher::convert(dir, Ok(modify), &mut out);

        let nested = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/dev/v4l/by-id/usb-cam"));
        DirectoryWatcher::convert(dir, Ok(nested), &mut out);

        DirectoryWatcher::convert(dir, Err(notify::Error::generic("overflow")), &mut out);

        assert_eq!(
            out,
            vec![WatchEvent::created("video4"), WatchEvent::deleted("cec0")]
        );
    }

    fn watch_dir(name: &str) -> PathBuf {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("target")
            .join("testdata")
            .join("extcam")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Collect batches until `count` records arrive or two seconds pass.
    fn collect(source: &mut DirectoryWatcher, count: usize) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        for _ in 0..20 {
            events.extend(source.wait(Duration::from_millis(100)).unwrap());
            if events.len() >= count {
                break;
            }
        }
        events
    }

    fn assert_create_delete(watched: &Path, on_disk: &Path) {
        let mut source = DirectoryWatcher::new(watched).unwrap();

        std::fs::write(on_disk.join("video7"), b"").unwrap();
        assert_eq!(collect(&mut source, 1), vec![WatchEvent::created("video7")]);

        std::fs::remove_file(on_disk.join("video7")).unwrap();
        assert_eq!(collect(&mut source, 1), vec![WatchEvent::deleted("video7")]);
    }

    #[test]
    fn test_watch_absolute_directory() {
        let dir = watch_dir("watch-absolute").canonicalize().unwrap();
        assert_create_delete(&dir, &dir);
    }

    #[test]
    fn test_watch_relative_directory() {
        let dir = watch_dir("watch-relative");
        // Unit tests run with the package directory as cwd.
        let relative = Path::new("../../target/testdata/extcam/watch-relative");
        assert!(relative.is_relative());
        assert_create_delete(relative, &dir);
    }
}
