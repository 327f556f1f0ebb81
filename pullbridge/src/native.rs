// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! The contract between the bridge and a wrapped native media framework.
//!
//! The bridge never talks to a media library directly. It consumes a small
//! set of primitives:
//!
//! - [`NativeBufferApi`]: reference counting, mapping and timestamp access for
//!   raw native buffers. These are raw-handle operations and therefore
//!   `unsafe`, in the same way a `-sys` function table is.
//! - [`SampleSource`]: a pull-style sink offering a bounded-timeout pull and an
//!   end-of-stream query.
//! - [`MessageSource`]: the framework's message bus, polled with a timeout.
//!
//! Implementations exist for GStreamer in the `gst-pullbridge` crate; tests use
//! counting mocks.

use std::{fmt, sync::Arc, time::Duration};

use crate::bus::BusMessage;

/// Access mode for mapping a buffer's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Map for reading.
    Read,
    /// Map for writing.
    Write,
}

impl fmt::Display for MapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapMode::Read => f.write_str("read"),
            MapMode::Write => f.write_str("write"),
        }
    }
}

/// Raw buffer primitives of a native media framework.
///
/// # Safety
///
/// Implementors must make every method sound to call with any `Buffer` value
/// that refers to a live native buffer (at least one outstanding reference).
/// A successful [`Self::buffer_map`] must return a `MapInfo` whose
/// [`Self::map_info_slice`] describes memory that stays valid and unaliased
/// (for write maps) until the matching [`Self::buffer_unmap`]. The table itself
/// must be usable from any thread.
pub unsafe trait NativeBufferApi: Send + Sync + 'static {
    /// Raw handle to a native buffer (usually a pointer).
    type Buffer: Copy + fmt::Debug;

    /// Native bookkeeping returned by a map call and consumed by unmap.
    type MapInfo;

    /// Adds one reference to `buffer`.
    ///
    /// # Safety
    ///
    /// `buffer` must be live.
    unsafe fn buffer_ref(&self, buffer: Self::Buffer);

    /// Drops one reference from `buffer`.
    ///
    /// # Safety
    ///
    /// The caller must own the reference being dropped.
    unsafe fn buffer_unref(&self, buffer: Self::Buffer);

    /// Returns the payload size of `buffer` in bytes.
    ///
    /// # Safety
    ///
    /// `buffer` must be live.
    unsafe fn buffer_size(&self, buffer: Self::Buffer) -> usize;

    /// Returns `true` if `buffer` may be mapped for writing.
    ///
    /// # Safety
    ///
    /// `buffer` must be live.
    unsafe fn buffer_is_writable(&self, buffer: Self::Buffer) -> bool;

    /// Maps `buffer` into process memory, returning `None` on failure.
    ///
    /// # Safety
    ///
    /// `buffer` must be live, and every successful map must be paired with
    /// exactly one [`Self::buffer_unmap`].
    unsafe fn buffer_map(&self, buffer: Self::Buffer, mode: MapMode) -> Option<Self::MapInfo>;

    /// Releases a mapping produced by [`Self::buffer_map`].
    ///
    /// # Safety
    ///
    /// `info` must come from a map call on the same `buffer`.
    unsafe fn buffer_unmap(&self, buffer: Self::Buffer, info: Self::MapInfo);

    /// Start address and length of a mapped region.
    fn map_info_slice(info: &Self::MapInfo) -> (*mut u8, usize);

    /// Presentation timestamp, `None` when the native value is invalid.
    ///
    /// # Safety
    ///
    /// `buffer` must be live.
    unsafe fn buffer_pts(&self, buffer: Self::Buffer) -> Option<Duration>;

    /// Decode timestamp, `None` when the native value is invalid.
    ///
    /// # Safety
    ///
    /// `buffer` must be live.
    unsafe fn buffer_dts(&self, buffer: Self::Buffer) -> Option<Duration>;

    /// Duration, `None` when the native value is invalid.
    ///
    /// # Safety
    ///
    /// `buffer` must be live.
    unsafe fn buffer_duration(&self, buffer: Self::Buffer) -> Option<Duration>;

    /// Allocates a new writable buffer holding one reference owned by the caller.
    fn buffer_new(&self, size: usize) -> Option<Self::Buffer>;
}

/// A pull-style native sink.
///
/// Only one pump talks to a source at a time; the trait therefore takes
/// `&mut self` for the pull and does not require `Sync`.
pub trait SampleSource: Send + 'static {
    /// Buffer primitives of the framework the samples come from.
    type Api: NativeBufferApi;

    /// An owned native sample. Dropping it releases the sample's reference.
    type Sample;

    /// Shared handle to the buffer primitives.
    fn api(&self) -> &Arc<Self::Api>;

    /// Pulls one sample, waiting at most `timeout`. `None` means nothing was
    /// ready (or the sink is at end-of-stream).
    fn try_pull_sample(&mut self, timeout: Duration) -> Option<Self::Sample>;

    /// Returns `true` once the sink has reached end-of-stream.
    ///
    /// Only consulted after [`Self::is_started`] has returned `true` at least
    /// once, so sinks that also report end-of-stream while stopped are safe.
    fn is_eos(&self) -> bool;

    /// Returns `true` once the sink is running and its end-of-stream state is
    /// meaningful. Sources without a startup phase keep the default.
    fn is_started(&self) -> bool {
        true
    }

    /// The sample's buffer, borrowed: it is only guaranteed to be live while
    /// `sample` is.
    fn sample_buffer(&self, sample: &Self::Sample) -> Option<<Self::Api as NativeBufferApi>::Buffer>;

    /// The sample's capability string, if the sample carries caps.
    fn sample_caps(&self, sample: &Self::Sample) -> Option<String>;
}

/// A native message bus polled with a timeout.
pub trait MessageSource: Send + 'static {
    /// Pops the next message, waiting at most `timeout`.
    fn timed_pop(&mut self, timeout: Duration) -> Option<BusMessage>;
}
