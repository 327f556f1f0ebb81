// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! The Sample Pump: drains a pull-style sink into an async stream.
//!
//! Each pump owns its sink on a dedicated thread. The thread loops on a
//! bounded pull; pulled samples become [`SampleEvent`]s that travel through a
//! bounded channel to the [`SampleStream`]. An empty pull is retried, after a
//! short sleep if it returned early, and the stream finishes when a started
//! sink reports end-of-stream or the consumer cancels.

pub(crate) mod worker;

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{Stream, stream::FusedStream};
use tracing::trace;
use uuid::Uuid;

use crate::{
    BufferHandle, FormatDescriptor, Result, SampleEvent,
    config::PumpConfig,
    format_cache::FormatCache,
    native::{NativeBufferApi, SampleSource},
};
use worker::{Producer, PumpStream, Pulled};

/// A sink paired with its configuration and format cache, ready to start.
///
/// Starting consumes the pump, so a sink can only ever be drained by one
/// worker.
pub struct SamplePump<S: SampleSource> {
    source: S,
    config: PumpConfig,
    cache: Arc<FormatCache>,
}

impl<S: SampleSource> SamplePump<S> {
    /// Creates a pump with an empty [`FormatCache`].
    pub fn new(source: S, config: PumpConfig) -> Self {
        Self {
            source,
            config,
            cache: Arc::new(FormatCache::new()),
        }
    }

    /// Uses `cache` instead of a fresh one, for example to share a custom
    /// parser or to pre-seed a known format.
    pub fn with_format_cache(mut self, cache: Arc<FormatCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The cache the pump will populate.
    pub fn format_cache(&self) -> &Arc<FormatCache> {
        &self.cache
    }

    /// Spawns the worker and returns the stream of events.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Config`] if the configuration does not validate
    /// - [`crate::Error::Spawn`] if the worker thread cannot be started
    pub fn start(self) -> Result<SampleStream<S::Api>> {
        self.config.validate()?;
        let format = self.cache.clone();
        let capacity = self.config.channel_capacity;
        let thread_name = self.config.thread_name.clone();
        let poll_interval = self.config.pull_timeout.min(worker::MIN_POLL_INTERVAL);
        let inner = worker::spawn(
            SampleProducer {
                source: self.source,
                cache: self.cache,
                config: self.config,
                started: false,
            },
            capacity,
            &thread_name,
            poll_interval,
        )?;
        Ok(SampleStream { inner, format })
    }
}

/// Starts draining `source` with `config`.
///
/// Shorthand for `SamplePump::new(source, config).start()`.
pub fn start<S: SampleSource>(source: S, config: PumpConfig) -> Result<SampleStream<S::Api>> {
    SamplePump::new(source, config).start()
}

struct SampleProducer<S: SampleSource> {
    source: S,
    cache: Arc<FormatCache>,
    config: PumpConfig,
    /// Latched once the source reports it has started.
    started: bool,
}

impl<S: SampleSource> SampleProducer<S> {
    /// End-of-stream only counts once the source has been seen running; a
    /// sink that was never started reports end-of-stream too.
    fn reached_eos(&mut self) -> bool {
        if !self.started && self.source.is_started() {
            self.started = true;
        }
        self.started && self.source.is_eos()
    }
}

impl<S: SampleSource> Producer for SampleProducer<S> {
    type Item = SampleEvent<S::Api>;

    fn pull(&mut self) -> Pulled<Self::Item> {
        let Some(sample) = self.source.try_pull_sample(self.config.pull_timeout) else {
            if self.reached_eos() {
                return Pulled::Finished;
            }
            return Pulled::Empty;
        };

        let Some(buffer) = self.source.sample_buffer(&sample) else {
            trace!("Pulled sample without a buffer");
            return Pulled::Empty;
        };

        if !self.cache.is_populated()
            && let Some(caps) = self.source.sample_caps(&sample)
        {
            self.cache.observe_caps(&caps);
        }

        let api = self.source.api().clone();
        // Safety: `sample` keeps the buffer alive for the rest of this call.
        let byte_len = unsafe { api.buffer_size(buffer) };
        if byte_len == 0 {
            trace!("Skipping empty sample");
            return Pulled::Empty;
        }

        self.cache.observe_buffer_size(byte_len, &self.config);

        // Safety: as above; the handle takes its own reference before the
        // sample is dropped.
        let handle = unsafe { BufferHandle::acquire(api, buffer, true) };
        drop(sample);

        Pulled::Item(SampleEvent::new(handle, self.cache.snapshot()))
    }
}

/// Single-consumer stream of [`SampleEvent`]s.
///
/// Finishes when the sink reports end-of-stream or after [`Self::cancel`].
/// Dropping the stream also stops the worker, without waiting for it.
///
/// # Examples
///
/// ```ignore
/// let mut stream = pump.start()?;
/// while let Some(event) = stream.next().await {
///     let len = event.buffer().with_bytes(|bytes| bytes.len())?;
///     println!("{:?} {len} bytes", event.pts());
/// }
/// ```
pub struct SampleStream<A: NativeBufferApi> {
    inner: PumpStream<SampleEvent<A>>,
    format: Arc<FormatCache>,
}

impl<A: NativeBufferApi> SampleStream<A> {
    /// The current (possibly still empty) stream format.
    pub fn format(&self) -> FormatDescriptor {
        self.format.snapshot()
    }

    /// The shared format cache.
    pub fn format_cache(&self) -> &Arc<FormatCache> {
        &self.format
    }

    /// Identifier of this pump in log output.
    pub fn id(&self) -> Uuid {
        self.inner.id()
    }

    /// Returns `true` once the stream was cancelled or dropped.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Stops the pump.
    ///
    /// Waits for an in-flight pull to return, so no native call is made once
    /// this returns. Events still buffered are dropped (releasing their
    /// buffers); events already handed out are unaffected. The stream then
    /// yields `None`.
    pub fn cancel(&mut self) {
        self.inner.cancel();
    }
}

impl<A: NativeBufferApi> Stream for SampleStream<A> {
    type Item = SampleEvent<A>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<A: NativeBufferApi> FusedStream for SampleStream<A> {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}
