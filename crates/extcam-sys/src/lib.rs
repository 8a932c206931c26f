// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Raw Video4Linux2 kernel ABI.
//!
//! Only the small slice of `linux/videodev2.h` needed to identify capture
//! devices is mirrored here: the `VIDIOC_QUERYCAP` and `VIDIOC_ENUM_FMT`
//! requests, their argument structures and the capability bits consulted by
//! the classifier. Layouts match the kernel UAPI headers byte for byte.

#![allow(non_camel_case_types)]

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};

pub use libc;

/// Device supports the single-planar video capture API.
pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
/// Device supports the single-planar video output API.
pub const V4L2_CAP_VIDEO_OUTPUT: u32 = 0x0000_0002;
/// Device supports the multi-planar video capture API.
pub const V4L2_CAP_VIDEO_CAPTURE_MPLANE: u32 = 0x0000_1000;
/// Device is a memory-to-memory device (codec, scaler).
pub const V4L2_CAP_VIDEO_M2M: u32 = 0x0000_8000;
/// Metadata capture node (e.g. UVC metadata).
pub const V4L2_CAP_META_CAPTURE: u32 = 0x0080_0000;
/// Driver fills `device_caps`; otherwise only `capabilities` is valid.
pub const V4L2_CAP_DEVICE_CAPS: u32 = 0x8000_0000;

/// Any of the capture bits that identify a camera-like node.
pub const V4L2_CAP_ANY_CAPTURE: u32 = V4L2_CAP_VIDEO_CAPTURE | V4L2_CAP_VIDEO_CAPTURE_MPLANE;

/// `enum v4l2_buf_type` value for single-planar capture queues.
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;

/// `struct v4l2_capability`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

/// `struct v4l2_fmtdesc`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_fmtdesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

// asm-generic/ioctl.h encoding
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
}

/// `_IOR('V', 0, struct v4l2_capability)`
pub const VIDIOC_QUERYCAP: u32 = ioc(
    IOC_READ,
    b'V',
    0,
    std::mem::size_of::<v4l2_capability>(),
);

/// `_IOWR('V', 2, struct v4l2_fmtdesc)`
pub const VIDIOC_ENUM_FMT: u32 = ioc(
    IOC_READ | IOC_WRITE,
    b'V',
    2,
    std::mem::size_of::<v4l2_fmtdesc>(),
);

/// Issue an ioctl, retrying while it is interrupted by a signal.
///
/// # Safety
///
/// `arg` must point to a live, properly sized argument structure for
/// `request`.
unsafe fn xioctl<T>(fd: BorrowedFd<'_>, request: u32, arg: *mut T) -> io::Result<()> {
    loop {
        // SAFETY: the caller guarantees `arg` matches `request`.
        let ret = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, arg) };
        if ret >= 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// `VIDIOC_QUERYCAP` on an open device node.
pub fn query_capability(fd: BorrowedFd<'_>) -> io::Result<v4l2_capability> {
    let mut cap = v4l2_capability::default();
    // SAFETY: `cap` is a valid v4l2_capability for the duration of the call.
    unsafe { xioctl(fd, VIDIOC_QUERYCAP, &mut cap as *mut v4l2_capability)? };
    Ok(cap)
}

/// `VIDIOC_ENUM_FMT` for the format at `index` on queue `buf_type`.
pub fn enum_format(fd: BorrowedFd<'_>, buf_type: u32, index: u32) -> io::Result<v4l2_fmtdesc> {
    let mut desc = v4l2_fmtdesc {
        index,
        type_: buf_type,
        ..Default::default()
    };
    // SAFETY: `desc` is a valid v4l2_fmtdesc for the duration of the call.
    unsafe { xioctl(fd, VIDIOC_ENUM_FMT, &mut desc as *mut v4l2_fmtdesc)? };
    Ok(desc)
}

/// Decode a NUL-padded fixed-size kernel string field.
pub fn fixed_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
