// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use extcam_sys as sys;

use super::{Capability, DeviceBackend, OpenMode, VideoNode};
use crate::fourcc::FourCC;
use crate::watch::{DirectoryWatcher, EventSource};
use crate::Error;

/// Backend talking to the running kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        V4l2Backend
    }
}

struct V4l2Node {
    file: File,
}

impl VideoNode for V4l2Node {
    fn query_capability(&mut self) -> io::Result<Capability> {
        let raw = sys::query_capability(self.file.as_fd())?;
        Ok(Capability::from_raw(&raw))
    }

    fn enum_format(&mut self, buf_type: u32, index: u32) -> io::Result<FourCC> {
        let desc = sys::enum_format(self.file.as_fd(), buf_type, index)?;
        Ok(FourCC::from(desc.pixelformat))
    }
}

impl DeviceBackend for V4l2Backend {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            match entry {
                Ok(entry) => match entry.file_name().into_string() {
                    Ok(name) => names.push(name),
                    Err(raw) => log::trace!("skipping non UTF-8 entry {:?}", raw),
                },
                Err(err) => log::debug!("error reading entry of {}: {}", dir.display(), err),
            }
        }
        Ok(names)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn VideoNode>> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if mode == OpenMode::Probe {
            options.custom_flags(sys::libc::O_NONBLOCK);
        }
        let file = options.open(path)?;
        Ok(Box::new(V4l2Node { file }))
    }

    fn read_attribute(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn watch(&self, dir: &Path) -> Result<Box<dyn EventSource>, Error> {
        Ok(Box::new(DirectoryWatcher::new(dir)?))
    }
}
