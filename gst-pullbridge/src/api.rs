// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Buffer primitives over the raw GStreamer C API.

use std::{mem::MaybeUninit, ptr, sync::Arc, time::Duration};

use gstreamer as gst;
use pullbridge::{MapMode, NativeBufferApi};

/// [`NativeBufferApi`] for `GstBuffer`.
///
/// Stateless; every pump and handle shares one instance through an `Arc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstBufferApi;

impl GstBufferApi {
    /// A shared instance.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

fn clock_time(value: gst::ffi::GstClockTime) -> Option<Duration> {
    (value != gst::ffi::GST_CLOCK_TIME_NONE).then(|| Duration::from_nanos(value))
}

// SAFETY
// Every method forwards to the matching GStreamer call, which is thread-safe
// for a live buffer. Mapped memory stays valid until `gst_buffer_unmap`.
unsafe impl NativeBufferApi for GstBufferApi {
    type Buffer = *mut gst::ffi::GstBuffer;
    type MapInfo = gst::ffi::GstMapInfo;

    unsafe fn buffer_ref(&self, buffer: Self::Buffer) {
        unsafe { gst::ffi::gst_mini_object_ref(buffer as *mut gst::ffi::GstMiniObject) };
    }

    unsafe fn buffer_unref(&self, buffer: Self::Buffer) {
        unsafe { gst::ffi::gst_mini_object_unref(buffer as *mut gst::ffi::GstMiniObject) };
    }

    unsafe fn buffer_size(&self, buffer: Self::Buffer) -> usize {
        unsafe { gst::ffi::gst_buffer_get_size(buffer) }
    }

    unsafe fn buffer_is_writable(&self, buffer: Self::Buffer) -> bool {
        unsafe {
            gst::ffi::gst_mini_object_is_writable(buffer as *const gst::ffi::GstMiniObject)
                != glib::ffi::GFALSE
        }
    }

    unsafe fn buffer_map(&self, buffer: Self::Buffer, mode: MapMode) -> Option<Self::MapInfo> {
        let flags = match mode {
            MapMode::Read => gst::ffi::GST_MAP_READ,
            MapMode::Write => gst::ffi::GST_MAP_WRITE,
        };
        let mut info = MaybeUninit::<gst::ffi::GstMapInfo>::zeroed();
        unsafe {
            if gst::ffi::gst_buffer_map(buffer, info.as_mut_ptr(), flags) == glib::ffi::GFALSE {
                return None;
            }
            Some(info.assume_init())
        }
    }

    unsafe fn buffer_unmap(&self, buffer: Self::Buffer, mut info: Self::MapInfo) {
        unsafe { gst::ffi::gst_buffer_unmap(buffer, &mut info) };
    }

    fn map_info_slice(info: &Self::MapInfo) -> (*mut u8, usize) {
        (info.data, info.size)
    }

    unsafe fn buffer_pts(&self, buffer: Self::Buffer) -> Option<Duration> {
        clock_time(unsafe { (*buffer).pts })
    }

    unsafe fn buffer_dts(&self, buffer: Self::Buffer) -> Option<Duration> {
        clock_time(unsafe { (*buffer).dts })
    }

    unsafe fn buffer_duration(&self, buffer: Self::Buffer) -> Option<Duration> {
        clock_time(unsafe { (*buffer).duration })
    }

    fn buffer_new(&self, size: usize) -> Option<Self::Buffer> {
        let buffer =
            unsafe { gst::ffi::gst_buffer_new_allocate(ptr::null_mut(), size, ptr::null_mut()) };
        (!buffer.is_null()).then_some(buffer)
    }
}
