// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! # pullbridge
//!
//! Turns a pull-style native media sink into an async, cancellable stream of
//! samples, with exactly-once buffer release and scoped zero-copy byte access.
//!
//! ## Overview
//!
//! Media frameworks such as GStreamer hand samples out through a blocking
//! "pull with timeout" call. This crate runs that call on a dedicated thread
//! and republishes the results as a [`futures::Stream`]. It does not talk to a
//! framework itself: the framework is reached through the traits in
//! [`native`], implemented for GStreamer by the `gst-pullbridge` crate.
//!
//! ### Key Concepts
//!
//! - **Sample Pump**: owns a sink on a worker thread ([`SamplePump`],
//!   [`SampleStream`])
//! - **Sample Event**: one pulled buffer with timestamps and the stream format
//!   ([`SampleEvent`])
//! - **Format Cache**: the stream format, parsed once from the first caps
//!   string, with a size-based fallback for missing dimensions ([`FormatCache`])
//! - **Buffer Handle**: an owned native buffer reference, released exactly once
//!   ([`BufferHandle`])
//! - **Message Pump**: the pipeline's bus as a second stream ([`MessagePump`])
//!
//! ## Architecture
//!
//! ```text
//! native sink ──► pump thread ──► bounded channel ──► SampleStream ──► consumer
//!                     │                                   │
//!                     └──────────► FormatCache ◄──────────┘
//! ```
//!
//! ## Examples
//!
//! ```ignore
//! use futures::{StreamExt, executor::block_on};
//! use pullbridge::{PumpConfig, SamplePump};
//!
//! let mut stream = SamplePump::new(sink, PumpConfig::default()).start()?;
//! block_on(async {
//!     while let Some(event) = stream.next().await {
//!         let checksum = event
//!             .buffer()
//!             .with_bytes(|bytes| bytes.iter().fold(0u8, |acc, b| acc ^ b))?;
//!         println!("{:?} {:?} {checksum:#04x}", event.pts(), event.format());
//!     }
//!     Ok::<_, pullbridge::Error>(())
//! })?;
//! ```
//!
//! ## Thread Safety
//!
//! - [`SampleStream`] and [`SampleEvent`] are `Send`; each has a single owner
//! - [`FormatCache`] is `Send + Sync` and may be read from any thread
//! - Only one pump ever talks to a sink, because starting consumes the pump

mod buffer;
mod error;
mod format_cache;
mod sample;

pub mod bus;
pub mod caps;
pub mod config;
pub mod native;
pub mod pump;

pub use buffer::BufferHandle;
pub use bus::{BusMessage, MessagePump, MessageStream, PipelineState};
pub use caps::{
    AudioDescriptor, AudioFormat, CapsParser, DefaultCapsParser, FormatDescriptor, Fraction,
    VideoDescriptor, VideoFormat, parse_caps,
};
pub use config::{AspectRatio, MessagePumpConfig, PumpConfig};
pub use error::{Error, Result};
pub use format_cache::{FormatCache, infer_dimensions};
pub use native::{MapMode, MessageSource, NativeBufferApi, SampleSource};
pub use pump::{SamplePump, SampleStream, start};
pub use sample::SampleEvent;
