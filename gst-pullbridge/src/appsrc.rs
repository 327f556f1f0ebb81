// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use glib::translate::from_glib_full;
use gstreamer as gst;
use gstreamer_app as gst_app;
use pullbridge::BufferHandle;
use tracing::trace;

use crate::{Error, Result, api::GstBufferApi};

/// Pushes [`BufferHandle`]s into an `appsrc`.
#[derive(Debug, Clone)]
pub struct AppSrcPusher {
    src: gst_app::AppSrc,
    api: Arc<GstBufferApi>,
}

impl AppSrcPusher {
    /// Wraps `src`.
    pub fn new(src: gst_app::AppSrc) -> Self {
        Self {
            src,
            api: GstBufferApi::shared(),
        }
    }

    /// The wrapped element.
    pub fn app_src(&self) -> &gst_app::AppSrc {
        &self.src
    }

    /// Allocates a writable buffer of `size` bytes to fill and push.
    pub fn allocate(&self, size: usize) -> Result<BufferHandle<GstBufferApi>> {
        Ok(BufferHandle::allocate(self.api.clone(), size)?)
    }

    /// Hands `buffer` to the app source, stamping `pts` if given.
    ///
    /// The handle's reference moves to GStreamer; nothing is released here.
    ///
    /// # Errors
    ///
    /// - [`Error::Core`] if the handle no longer owns a reference
    /// - [`Error::Flow`] if the app source refuses the buffer (for example
    ///   after end-of-stream or while flushing)
    pub fn push(&self, buffer: BufferHandle<GstBufferApi>, pts: Option<Duration>) -> Result<()> {
        let raw = buffer.into_raw()?;
        // Safety: `into_raw` gave us the handle's reference.
        let mut buffer: gst::Buffer = unsafe { from_glib_full(raw) };
        if let Some(pts) = pts {
            let pts = gst::ClockTime::try_from(pts)
                .map_err(|_| Error::Other(format!("Timestamp {pts:?} out of range")))?;
            buffer.make_mut().set_pts(pts);
        }
        trace!(size = buffer.size(), pts = ?buffer.pts(), "Pushing buffer");
        self.src.push_buffer(buffer).map_err(Error::Flow)?;
        Ok(())
    }

    /// Copies `bytes` into a fresh buffer and pushes it.
    pub fn push_bytes(&self, bytes: &[u8], pts: Option<Duration>) -> Result<()> {
        let mut buffer = self.allocate(bytes.len())?;
        buffer.with_mutable_bytes(|data| data.copy_from_slice(bytes))?;
        self.push(buffer, pts)
    }

    /// Signals that no more buffers will be pushed.
    pub fn end_of_stream(&self) -> Result<()> {
        self.src.end_of_stream().map_err(Error::Flow)?;
        Ok(())
    }
}
