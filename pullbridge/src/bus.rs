// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! The pipeline's message bus as a second stream.
//!
//! Sample streams never carry errors. Errors, warnings, state changes and
//! end-of-stream are reported by the native bus, which a [`MessagePump`]
//! drains on its own thread in the same way the sample pump drains a sink.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, stream::FusedStream};
use tracing::debug;
use uuid::Uuid;

use crate::{
    Result,
    config::MessagePumpConfig,
    native::MessageSource,
    pump::worker::{self, Producer, PumpStream, Pulled},
};

/// Pipeline state as reported by state-change messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// No pending state.
    VoidPending,
    /// Initial state; no resources allocated.
    Null,
    /// Resources allocated, not processing.
    Ready,
    /// Prerolled, clock stopped.
    Paused,
    /// Running.
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::VoidPending => "void-pending",
            PipelineState::Null => "null",
            PipelineState::Ready => "ready",
            PipelineState::Paused => "paused",
            PipelineState::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// A message popped from the native bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// The pipeline reached end-of-stream.
    Eos,
    /// An element reported an error.
    Error {
        /// Origin element, if known.
        source: Option<String>,
        /// Human readable message.
        message: String,
        /// Additional debug information.
        debug: Option<String>,
    },
    /// An element reported a warning.
    Warning {
        /// Origin element, if known.
        source: Option<String>,
        /// Human readable message.
        message: String,
        /// Additional debug information.
        debug: Option<String>,
    },
    /// An element reported something informational.
    Info {
        /// Origin element, if known.
        source: Option<String>,
        /// Human readable message.
        message: String,
        /// Additional debug information.
        debug: Option<String>,
    },
    /// An element changed state.
    StateChanged {
        /// Origin element, if known.
        source: Option<String>,
        /// Previous state.
        old: PipelineState,
        /// New state.
        current: PipelineState,
        /// State still being transitioned to.
        pending: PipelineState,
    },
    /// Any other message type, by name.
    Other {
        /// Native name of the message type.
        type_name: String,
    },
}

impl BusMessage {
    /// Returns `true` for [`BusMessage::Eos`].
    pub fn is_eos(&self) -> bool {
        matches!(self, BusMessage::Eos)
    }

    /// Returns `true` for [`BusMessage::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, BusMessage::Error { .. })
    }
}

/// A bus paired with its configuration, ready to start.
pub struct MessagePump<M: MessageSource> {
    source: M,
    config: MessagePumpConfig,
}

impl<M: MessageSource> MessagePump<M> {
    /// Creates a pump over `source`.
    pub fn new(source: M, config: MessagePumpConfig) -> Self {
        Self { source, config }
    }

    /// Spawns the worker and returns the stream of messages.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Config`] if the configuration does not validate
    /// - [`crate::Error::Spawn`] if the worker thread cannot be started
    pub fn start(self) -> Result<MessageStream> {
        self.config.validate()?;
        let capacity = self.config.channel_capacity;
        let thread_name = self.config.thread_name.clone();
        let poll_interval = self.config.pop_timeout.min(worker::MIN_POLL_INTERVAL);
        let inner = worker::spawn(
            MessageProducer {
                source: self.source,
                config: self.config,
            },
            capacity,
            &thread_name,
            poll_interval,
        )?;
        Ok(MessageStream { inner })
    }
}

struct MessageProducer<M: MessageSource> {
    source: M,
    config: MessagePumpConfig,
}

impl<M: MessageSource> Producer for MessageProducer<M> {
    type Item = BusMessage;

    fn pull(&mut self) -> Pulled<BusMessage> {
        match self.source.timed_pop(self.config.pop_timeout) {
            None => Pulled::Empty,
            Some(message) if message.is_eos() && self.config.stop_on_eos => Pulled::Last(message),
            Some(message) if message.is_error() && self.config.stop_on_error => {
                debug!(?message, "Stopping message pump on error");
                Pulled::Last(message)
            }
            Some(message) => Pulled::Item(message),
        }
    }
}

/// Single-consumer stream of [`BusMessage`]s.
pub struct MessageStream {
    inner: PumpStream<BusMessage>,
}

impl MessageStream {
    /// Identifier of this pump in log output.
    pub fn id(&self) -> Uuid {
        self.inner.id()
    }

    /// Stops the pump and waits for its worker to exit.
    pub fn cancel(&mut self) {
        self.inner.cancel();
    }
}

impl Stream for MessageStream {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<BusMessage>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl FusedStream for MessageStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}
