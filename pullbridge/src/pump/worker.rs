// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! The thread and channel shared by every pump.
//!
//! A [`Producer`] performs one bounded native poll per call. The worker owns
//! it on a dedicated thread and forwards what it produces into a bounded
//! channel; [`PumpStream`] is the receiving end.

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use futures::{
    SinkExt, Stream, StreamExt,
    channel::mpsc,
    executor::block_on,
    stream::FusedStream,
};
use tracing::{Span, debug, error, info_span, trace};
use uuid::Uuid;

use crate::Result;

/// Shortest time one empty poll cycle may take.
///
/// Sources that return early, such as a sink that has not started yet, are
/// polled at most this often. The interval is capped by the source's timeout.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Outcome of one poll of the native side.
pub(crate) enum Pulled<T> {
    /// Something to deliver; keep polling afterwards.
    Item(T),
    /// Something to deliver, after which the stream finishes.
    Last(T),
    /// Nothing ready yet.
    Empty,
    /// The native side will produce nothing more.
    Finished,
}

/// One bounded poll of a native source.
pub(crate) trait Producer: Send + 'static {
    type Item: Send + 'static;

    fn pull(&mut self) -> Pulled<Self::Item>;
}

/// Receiving end of a pump, owning the worker thread.
pub(crate) struct PumpStream<T> {
    id: Uuid,
    receiver: mpsc::Receiver<T>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    terminated: bool,
}

/// Starts `producer` on a new thread named `thread_name`.
///
/// An empty poll that returns sooner than `poll_interval` is followed by a
/// sleep for the rest of the interval.
pub(crate) fn spawn<P: Producer>(
    producer: P,
    capacity: usize,
    thread_name: &str,
    poll_interval: Duration,
) -> Result<PumpStream<P::Item>> {
    let id = Uuid::new_v4();
    // The channel holds `capacity` items plus one per sender.
    let (sender, receiver) = mpsc::channel(capacity.saturating_sub(1));
    let cancelled = Arc::new(AtomicBool::new(false));
    let span = info_span!("pump", %id);

    let worker = thread::Builder::new().name(thread_name.to_owned()).spawn({
        let cancelled = cancelled.clone();
        move || run(producer, sender, cancelled, poll_interval, span)
    })?;
    debug!(%id, thread_name, capacity, "Pump started");

    Ok(PumpStream {
        id,
        receiver,
        cancelled,
        worker: Some(worker),
        terminated: false,
    })
}

fn run<P: Producer>(
    mut producer: P,
    mut sender: mpsc::Sender<P::Item>,
    cancelled: Arc<AtomicBool>,
    poll_interval: Duration,
    span: Span,
) {
    let _guard = span.enter();
    let mut delivered = 0u64;

    loop {
        if cancelled.load(Ordering::Acquire) {
            debug!(delivered, "Pump cancelled");
            return;
        }

        let polled_at = Instant::now();
        let (item, last) = match producer.pull() {
            Pulled::Item(item) => (item, false),
            Pulled::Last(item) => (item, true),
            Pulled::Empty => {
                let elapsed = polled_at.elapsed();
                if elapsed < poll_interval {
                    thread::sleep(poll_interval - elapsed);
                } else {
                    thread::yield_now();
                }
                continue;
            }
            Pulled::Finished => {
                debug!(delivered, "Pump reached end of stream");
                return;
            }
        };

        // The consumer may have walked away while the pull was in flight.
        if cancelled.load(Ordering::Acquire) {
            debug!(delivered, "Pump cancelled, discarding pulled item");
            return;
        }

        if block_on(sender.send(item)).is_err() {
            debug!(delivered, "Pump consumer is gone");
            return;
        }
        delivered += 1;
        trace!(delivered, "Delivered item");

        if last {
            debug!(delivered, "Pump delivered its final item");
            return;
        }
    }
}

impl<T> PumpStream<T> {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Items still waiting in the channel are dropped. Once this returns the
    /// worker makes no further native calls.
    pub(crate) fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.receiver.close();
        self.drain();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(id = %self.id, "Pump worker panicked");
            }
            // Anything sent between the first drain and the worker exiting.
            self.drain();
        }
        self.terminated = true;
    }

    fn drain(&mut self) {
        while let Ok(Some(item)) = self.receiver.try_next() {
            drop(item);
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl<T> Stream for PumpStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        let polled = self.receiver.poll_next_unpin(cx);
        if let Poll::Ready(None) = polled {
            self.terminated = true;
        }
        polled
    }
}

impl<T> FusedStream for PumpStream<T> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<T> Drop for PumpStream<T> {
    /// Signals the worker to stop without waiting for it.
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancelled.store(true, Ordering::Release);
            self.receiver.close();
            trace!(id = %self.id, "Pump stream dropped");
        }
    }
}
