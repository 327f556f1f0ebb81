// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! # gst-pullbridge
//!
//! GStreamer backend for [`pullbridge`].
//!
//! ## Overview
//!
//! - [`GstBufferApi`]: `GstBuffer` reference counting and mapping through the
//!   raw C API
//! - [`AppSinkSource`]: an `appsink` as a sample source
//! - [`BusSource`]: a pipeline bus as a message source
//! - [`AppSrcPusher`]: pushes buffer handles into an `appsrc`
//! - [`Pipeline`]: launches a `gst-launch` description and hands out the above
//!
//! ## GStreamer Concepts
//!
//! - **appsink**: an element the application pulls samples from
//! - **appsrc**: an element the application pushes buffers into
//! - **Bus**: the per-pipeline queue of errors, warnings, state changes and
//!   end-of-stream
//!
//! Call [`init`] once before building pipelines; [`version`] reports the
//! library actually loaded.

mod api;
mod appsink;
mod appsrc;
mod bus;
mod error;
mod pipeline;

pub use api::GstBufferApi;
pub use appsink::AppSinkSource;
pub use appsrc::AppSrcPusher;
pub use bus::{BusSource, convert_message, gst_state, pipeline_state};
pub use error::{Error, Result};
pub use pipeline::Pipeline;

/// Sample event carrying a GStreamer buffer.
pub type GstSampleEvent = pullbridge::SampleEvent<GstBufferApi>;

/// Sample stream over an `appsink`.
pub type GstSampleStream = pullbridge::SampleStream<GstBufferApi>;

/// Initializes GStreamer. Safe to call more than once.
///
/// # Errors
///
/// Returns [`Error::Glib`] if GStreamer cannot be initialized.
pub fn init() -> Result<()> {
    gstreamer::init()?;
    Ok(())
}

/// Version of the GStreamer library in use, as `(major, minor, micro, nano)`.
pub fn version() -> (u32, u32, u32, u32) {
    gstreamer::version()
}

/// Human-readable version of the GStreamer library, e.g. `"GStreamer 1.24.2"`.
pub fn version_string() -> String {
    gstreamer::version_string().to_string()
}
