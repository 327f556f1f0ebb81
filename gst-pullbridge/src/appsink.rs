// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use pullbridge::SampleSource;

use crate::api::GstBufferApi;

/// An `appsink` as a pull source for a [`pullbridge::SamplePump`].
///
/// Not `Clone`: a sink is drained by one pump only.
#[derive(Debug)]
pub struct AppSinkSource {
    sink: gst_app::AppSink,
    api: Arc<GstBufferApi>,
}

impl AppSinkSource {
    /// Wraps `sink`.
    pub fn new(sink: gst_app::AppSink) -> Self {
        Self {
            sink,
            api: GstBufferApi::shared(),
        }
    }

    /// The wrapped element.
    pub fn app_sink(&self) -> &gst_app::AppSink {
        &self.sink
    }
}

impl SampleSource for AppSinkSource {
    type Api = GstBufferApi;
    type Sample = gst::Sample;

    fn api(&self) -> &Arc<GstBufferApi> {
        &self.api
    }

    fn try_pull_sample(&mut self, timeout: Duration) -> Option<gst::Sample> {
        let timeout = gst::ClockTime::try_from(timeout).unwrap_or(gst::ClockTime::MAX);
        self.sink.try_pull_sample(timeout)
    }

    fn is_eos(&self) -> bool {
        self.sink.is_eos()
    }

    // A stopped appsink reports end-of-stream, so it only counts once the
    // sink has reached PAUSED.
    fn is_started(&self) -> bool {
        matches!(
            self.sink.current_state(),
            gst::State::Paused | gst::State::Playing
        )
    }

    fn sample_buffer(&self, sample: &gst::Sample) -> Option<*mut gst::ffi::GstBuffer> {
        sample.buffer().map(|buffer| buffer.as_mut_ptr())
    }

    fn sample_caps(&self, sample: &gst::Sample) -> Option<String> {
        sample.caps().map(|caps| caps.to_string())
    }
}
