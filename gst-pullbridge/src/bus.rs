// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use pullbridge::{BusMessage, MessageSource, PipelineState};

/// A pipeline bus as a source for a [`pullbridge::MessagePump`].
#[derive(Debug, Clone)]
pub struct BusSource {
    bus: gst::Bus,
}

impl BusSource {
    /// Wraps `bus`.
    pub fn new(bus: gst::Bus) -> Self {
        Self { bus }
    }
}

impl MessageSource for BusSource {
    fn timed_pop(&mut self, timeout: Duration) -> Option<BusMessage> {
        let timeout = gst::ClockTime::try_from(timeout).unwrap_or(gst::ClockTime::MAX);
        self.bus.timed_pop(timeout).map(|message| convert_message(&message))
    }
}

/// Maps a GStreamer state to the bridge's state enum.
pub fn pipeline_state(state: gst::State) -> PipelineState {
    match state {
        gst::State::Null => PipelineState::Null,
        gst::State::Ready => PipelineState::Ready,
        gst::State::Paused => PipelineState::Paused,
        gst::State::Playing => PipelineState::Playing,
        _ => PipelineState::VoidPending,
    }
}

/// Maps the bridge's state enum to a GStreamer state.
pub fn gst_state(state: PipelineState) -> gst::State {
    match state {
        PipelineState::VoidPending => gst::State::VoidPending,
        PipelineState::Null => gst::State::Null,
        PipelineState::Ready => gst::State::Ready,
        PipelineState::Paused => gst::State::Paused,
        PipelineState::Playing => gst::State::Playing,
    }
}

/// Converts a bus message into a [`BusMessage`].
pub fn convert_message(message: &gst::Message) -> BusMessage {
    use gst::MessageView;

    let source = message.src().map(|src| src.name().to_string());
    match message.view() {
        MessageView::Eos(_) => BusMessage::Eos,
        MessageView::Error(error) => BusMessage::Error {
            source,
            message: error.error().to_string(),
            debug: error.debug().map(|debug| debug.to_string()),
        },
        MessageView::Warning(warning) => BusMessage::Warning {
            source,
            message: warning.error().to_string(),
            debug: warning.debug().map(|debug| debug.to_string()),
        },
        MessageView::Info(info) => BusMessage::Info {
            source,
            message: info.error().to_string(),
            debug: info.debug().map(|debug| debug.to_string()),
        },
        MessageView::StateChanged(changed) => BusMessage::StateChanged {
            source,
            old: pipeline_state(changed.old()),
            current: pipeline_state(changed.current()),
            pending: pipeline_state(changed.pending()),
        },
        _ => BusMessage::Other {
            type_name: message.type_().name().to_string(),
        },
    }
}
