// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Owning handles around native buffers and scoped byte access.
//!
//! A [`BufferHandle`] holds one native reference and releases it exactly once.
//! Bytes are only reachable through closures ([`BufferHandle::with_bytes`] and
//! friends); the mapping is undone by a guard when the closure returns, returns
//! an error or unwinds.

use std::{fmt, marker::PhantomData, sync::Arc, time::Duration};

use tracing::trace;

use crate::{
    Error, Result,
    native::{MapMode, NativeBufferApi},
};

/// Owning handle around a native buffer reference.
///
/// The handle is move-only. A second owner of the same native buffer is only
/// created through [`Self::add_ref`], which takes an extra native reference.
///
/// # Thread Safety
///
/// `BufferHandle` is `Send` but not `Sync`: it can be handed from the pump
/// thread to the consumer, and is used by one owner at a time.
///
/// # Examples
///
/// ```ignore
/// let sum = event.buffer().with_bytes(|bytes| bytes.iter().map(|b| *b as u64).sum::<u64>())?;
/// ```
pub struct BufferHandle<A: NativeBufferApi> {
    api: Arc<A>,
    buffer: A::Buffer,
    reference: Reference,
}

/// What a handle knows about its native reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference {
    /// The handle owns one reference and will release it.
    Owned,
    /// Alias of a buffer kept alive by someone else; never released.
    Borrowed,
    /// The reference was released or handed back to the native side.
    Released,
}

// Safety: the native reference is owned exclusively by this handle, and the
// api table is `Send + Sync`. Native buffers may be unreffed from any thread.
unsafe impl<A: NativeBufferApi> Send for BufferHandle<A> {}

impl<A: NativeBufferApi> BufferHandle<A> {
    /// Wraps a native buffer.
    ///
    /// With `owns_reference`, a native reference is taken immediately so the
    /// handle stays valid after whatever produced `buffer` lets go of it.
    /// Without it, the handle is a borrowed alias that never releases; the
    /// caller must keep the buffer alive for as long as the handle exists.
    ///
    /// # Safety
    ///
    /// `buffer` must be live when this is called.
    pub unsafe fn acquire(api: Arc<A>, buffer: A::Buffer, owns_reference: bool) -> Self {
        if owns_reference {
            unsafe { api.buffer_ref(buffer) };
        }
        trace!(?buffer, owns_reference, "Acquired buffer handle");
        Self {
            api,
            buffer,
            reference: if owns_reference {
                Reference::Owned
            } else {
                Reference::Borrowed
            },
        }
    }

    /// Takes over a reference the caller already owns, without adding one.
    ///
    /// # Safety
    ///
    /// The caller must own one reference to `buffer` and give it up.
    pub unsafe fn adopt(api: Arc<A>, buffer: A::Buffer) -> Self {
        Self {
            api,
            buffer,
            reference: Reference::Owned,
        }
    }

    /// Allocates a fresh writable buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if the native allocation fails.
    pub fn allocate(api: Arc<A>, size: usize) -> Result<Self> {
        let buffer = api
            .buffer_new(size)
            .ok_or(Error::AllocationFailed { size })?;
        // Safety: `buffer_new` hands us the only reference.
        Ok(unsafe { Self::adopt(api, buffer) })
    }

    /// Creates a second owning handle on the same native buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if this handle no longer holds a reference.
    pub fn add_ref(&self) -> Result<Self> {
        self.ensure_live()?;
        // Safety: the buffer is live while the handle is not released.
        Ok(unsafe { Self::acquire(self.api.clone(), self.buffer, true) })
    }

    /// Returns `true` while this handle still owns a native reference.
    pub fn owns_reference(&self) -> bool {
        self.reference == Reference::Owned
    }

    /// Returns `true` once the native reference has been released.
    pub fn is_released(&self) -> bool {
        self.reference == Reference::Released
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(Error::Released)
        } else {
            Ok(())
        }
    }

    /// The raw native buffer.
    pub fn as_raw(&self) -> A::Buffer {
        self.buffer
    }

    /// Gives the native reference away without releasing it.
    ///
    /// Used to hand ownership to the native side (for example when pushing a
    /// buffer into a pipeline).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Released`] if there is no reference to give away.
    pub fn into_raw(mut self) -> Result<A::Buffer> {
        if self.reference != Reference::Owned {
            return Err(Error::Released);
        }
        self.reference = Reference::Released;
        Ok(self.buffer)
    }

    /// Payload size in bytes, as reported by the native buffer.
    ///
    /// A released handle reports zero.
    pub fn len(&self) -> usize {
        if self.is_released() {
            return 0;
        }
        unsafe { self.api.buffer_size(self.buffer) }
    }

    /// Returns `true` if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the buffer may be mapped for writing.
    pub fn is_writable(&self) -> bool {
        !self.is_released() && unsafe { self.api.buffer_is_writable(self.buffer) }
    }

    /// Presentation timestamp.
    pub fn pts(&self) -> Option<Duration> {
        self.ensure_live().ok()?;
        unsafe { self.api.buffer_pts(self.buffer) }
    }

    /// Decode timestamp.
    pub fn dts(&self) -> Option<Duration> {
        self.ensure_live().ok()?;
        unsafe { self.api.buffer_dts(self.buffer) }
    }

    /// Buffer duration.
    pub fn duration(&self) -> Option<Duration> {
        self.ensure_live().ok()?;
        unsafe { self.api.buffer_duration(self.buffer) }
    }

    /// Runs `f` with a read-only view of the buffer's bytes.
    ///
    /// The buffer is mapped before `f` runs and unmapped when it returns,
    /// including when it panics. The slice cannot escape the closure.
    ///
    /// # Errors
    ///
    /// - [`Error::MapFailed`] if the native map call fails; the handle remains
    ///   usable and mapping may be retried
    /// - [`Error::Released`] if the handle was released
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let view = MappedView::map(self, MapMode::Read)?;
        Ok(f(view.as_slice()))
    }

    /// Like [`Self::with_bytes`], for bodies that can fail.
    ///
    /// The mapping is released before the body's error is returned.
    pub fn try_with_bytes<R, E>(
        &self,
        f: impl FnOnce(&[u8]) -> core::result::Result<R, E>,
    ) -> core::result::Result<R, E>
    where
        E: From<Error>,
    {
        let view = MappedView::map(self, MapMode::Read)?;
        f(view.as_slice())
    }

    /// Runs `f` with a writable view of the buffer's bytes.
    ///
    /// Pulled buffers are normally shared with the pipeline and not writable;
    /// this is meant for buffers created with [`Self::allocate`] before they
    /// are pushed.
    ///
    /// # Errors
    ///
    /// - [`Error::NotWritable`] if the buffer is not writable
    /// - [`Error::MapFailed`] if the native map call fails
    pub fn with_mutable_bytes<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut view = MappedView::map_writable(self)?;
        Ok(f(view.as_mut_slice()))
    }

    /// Like [`Self::with_mutable_bytes`], for bodies that can fail.
    pub fn try_with_mutable_bytes<R, E>(
        &mut self,
        f: impl FnOnce(&mut [u8]) -> core::result::Result<R, E>,
    ) -> core::result::Result<R, E>
    where
        E: From<Error>,
    {
        let mut view = MappedView::map_writable(self)?;
        f(view.as_mut_slice())
    }

    /// Copies the payload into a `Vec`.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.with_bytes(<[u8]>::to_vec)
    }

    /// Releases the native reference now instead of on drop.
    ///
    /// Calling this more than once, or on a borrowed handle, does nothing.
    pub fn release(&mut self) {
        if self.reference != Reference::Owned {
            return;
        }
        self.reference = Reference::Released;
        trace!(buffer = ?self.buffer, "Releasing buffer handle");
        unsafe { self.api.buffer_unref(self.buffer) };
    }
}

impl<A: NativeBufferApi> Drop for BufferHandle<A> {
    /// Releases the native reference if this handle still owns it.
    fn drop(&mut self) {
        self.release();
    }
}

impl<A: NativeBufferApi> fmt::Debug for BufferHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("buffer", &self.buffer)
            .field("reference", &self.reference)
            .finish()
    }
}

/// A mapped region of a [`BufferHandle`], unmapped on drop.
///
/// Never handed out directly: the public API passes the slice into a closure.
struct MappedView<'a, A: NativeBufferApi> {
    api: &'a A,
    buffer: A::Buffer,
    info: Option<A::MapInfo>,
    data: *mut u8,
    len: usize,
    phantom: PhantomData<&'a mut [u8]>,
}

impl<'a, A: NativeBufferApi> MappedView<'a, A> {
    fn map(handle: &'a BufferHandle<A>, mode: MapMode) -> Result<Self> {
        handle.ensure_live()?;
        let info = unsafe { handle.api.buffer_map(handle.buffer, mode) }
            .ok_or(Error::MapFailed { mode })?;
        let (data, len) = A::map_info_slice(&info);
        Ok(Self {
            api: handle.api.as_ref(),
            buffer: handle.buffer,
            info: Some(info),
            data,
            len,
            phantom: PhantomData,
        })
    }

    fn map_writable(handle: &'a mut BufferHandle<A>) -> Result<Self> {
        handle.ensure_live()?;
        if !handle.is_writable() {
            return Err(Error::NotWritable);
        }
        Self::map(&*handle, MapMode::Write)
    }

    fn as_slice(&self) -> &[u8] {
        if self.len == 0 || self.data.is_null() {
            return &[];
        }
        // SAFETY
        // The region stays mapped until `self` is dropped, and `self` cannot
        // outlive the handle it was created from.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.len == 0 || self.data.is_null() {
            return &mut [];
        }
        // SAFETY
        // Only created through `map_writable`, which borrows the handle mutably.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.len) }
    }
}

impl<A: NativeBufferApi> Drop for MappedView<'_, A> {
    fn drop(&mut self) {
        if let Some(info) = self.info.take() {
            unsafe { self.api.buffer_unmap(self.buffer, info) };
        }
    }
}
