// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, time::Duration};

use crate::{BufferHandle, FormatDescriptor, native::NativeBufferApi};

/// One unit of media pulled from a sink.
///
/// The event owns its buffer reference: the payload stays valid for as long
/// as the event (or the buffer taken out of it) is alive, independently of the
/// pump that produced it.
pub struct SampleEvent<A: NativeBufferApi> {
    buffer: BufferHandle<A>,
    pts: Option<Duration>,
    dts: Option<Duration>,
    duration: Option<Duration>,
    format: FormatDescriptor,
}

impl<A: NativeBufferApi> SampleEvent<A> {
    /// Builds an event from a handle, reading its timestamps.
    ///
    /// Audio streams carry no decode timestamp.
    pub fn new(buffer: BufferHandle<A>, format: FormatDescriptor) -> Self {
        let dts = if format.is_audio() { None } else { buffer.dts() };
        Self {
            pts: buffer.pts(),
            dts,
            duration: buffer.duration(),
            buffer,
            format,
        }
    }

    /// The payload.
    pub fn buffer(&self) -> &BufferHandle<A> {
        &self.buffer
    }

    /// The payload, mutably (for write mapping).
    pub fn buffer_mut(&mut self) -> &mut BufferHandle<A> {
        &mut self.buffer
    }

    /// Takes the payload out of the event.
    pub fn into_buffer(self) -> BufferHandle<A> {
        self.buffer
    }

    /// Presentation timestamp.
    pub fn pts(&self) -> Option<Duration> {
        self.pts
    }

    /// Decode timestamp. Always `None` for audio.
    pub fn dts(&self) -> Option<Duration> {
        self.dts
    }

    /// Duration of the sample.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// The stream format as known when the sample was pulled.
    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }
}

impl<A: NativeBufferApi> fmt::Debug for SampleEvent<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleEvent")
            .field("buffer", &self.buffer)
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field("duration", &self.duration)
            .field("format", &self.format)
            .finish()
    }
}
