// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! A launched pipeline and the streams attached to it.

use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use glib::translate::{ToGlibPtr, ToGlibPtrMut, from_glib};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use pullbridge::{
    MessagePump, MessagePumpConfig, MessageStream, PipelineState, PumpConfig, SampleStream,
};
use tracing::{debug, error};

use crate::{
    Error, Result,
    api::GstBufferApi,
    appsink::AppSinkSource,
    appsrc::AppSrcPusher,
    bus::{BusSource, gst_state, pipeline_state},
};

/// A pipeline built from a `gst-launch` description.
///
/// The pipeline is set to `Null` when dropped. Each `appsink` is handed out
/// once, so at most one pump drains it.
///
/// # Examples
///
/// ```no_run
/// use futures::{StreamExt, executor::block_on};
/// use gstpullbridge::Pipeline;
/// use pullbridge::PumpConfig;
///
/// # fn main() -> Result<(), gstpullbridge::Error> {
/// gstpullbridge::init()?;
/// let pipeline = Pipeline::launch(
///     "videotestsrc num-buffers=10 ! video/x-raw,format=BGRA ! appsink name=sink",
/// )?;
/// let mut frames = pipeline.sample_stream("sink", PumpConfig::default())?;
/// pipeline.play()?;
/// while let Some(frame) = block_on(frames.next()) {
///     println!("{:?} {} bytes", frame.pts(), frame.buffer().len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Pipeline {
    pipeline: gst::Pipeline,
    claimed_sinks: Mutex<HashSet<String>>,
}

impl Pipeline {
    /// Parses `description` and wraps the result.
    ///
    /// A description that yields a single element is placed in a new pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Glib`] if the description does not parse (unknown
    /// element, bad property, unlinkable pads).
    pub fn launch(description: &str) -> Result<Self> {
        let element = gst::parse::launch(description)?;
        let pipeline = match element.downcast::<gst::Pipeline>() {
            Ok(pipeline) => pipeline,
            Err(element) => {
                let pipeline = gst::Pipeline::new();
                pipeline.add(&element)?;
                pipeline
            }
        };
        debug!(description, name = %pipeline.name(), "Launched pipeline");
        Ok(Self {
            pipeline,
            claimed_sinks: Mutex::new(HashSet::new()),
        })
    }

    /// The wrapped GStreamer pipeline.
    pub fn pipeline(&self) -> &gst::Pipeline {
        &self.pipeline
    }

    /// Requests a state change.
    ///
    /// Asynchronous changes are reported as success; use [`Self::state`] to
    /// wait for completion.
    pub fn set_state(&self, state: PipelineState) -> Result<()> {
        let result = self.pipeline.set_state(gst_state(state))?;
        debug!(%state, ?result, "Pipeline state change requested");
        Ok(())
    }

    /// Sets the pipeline to `Playing`.
    pub fn play(&self) -> Result<()> {
        self.set_state(PipelineState::Playing)
    }

    /// Sets the pipeline to `Paused`.
    pub fn pause(&self) -> Result<()> {
        self.set_state(PipelineState::Paused)
    }

    /// Sets the pipeline to `Null`.
    pub fn stop(&self) -> Result<()> {
        self.set_state(PipelineState::Null)
    }

    /// Waits up to `timeout` (forever with `None`) for a pending state change
    /// and returns the current and pending states.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateChange`] if the last state change failed.
    pub fn state(&self, timeout: Option<Duration>) -> Result<(PipelineState, PipelineState)> {
        let timeout = timeout.and_then(|timeout| gst::ClockTime::try_from(timeout).ok());
        let (result, current, pending) = self.pipeline.state(timeout);
        result?;
        Ok((pipeline_state(current), pipeline_state(pending)))
    }

    fn element(&self, name: &str) -> Result<gst::Element> {
        self.pipeline
            .by_name(name)
            .ok_or_else(|| Error::ElementNotFound(name.to_owned()))
    }

    fn claimed_sinks(&self) -> MutexGuard<'_, HashSet<String>> {
        self.claimed_sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the `appsink` called `name` out of the pipeline for pulling.
    ///
    /// # Errors
    ///
    /// - [`Error::ElementNotFound`] if there is no such element
    /// - [`Error::WrongElementType`] if it is not an `appsink`
    /// - [`Error::SinkInUse`] if the sink was already handed out
    pub fn app_sink(&self, name: &str) -> Result<AppSinkSource> {
        let sink = self
            .element(name)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| Error::WrongElementType {
                name: name.to_owned(),
                expected: "appsink",
            })?;
        if !self.claimed_sinks().insert(name.to_owned()) {
            return Err(Error::SinkInUse(name.to_owned()));
        }
        Ok(AppSinkSource::new(sink))
    }

    /// Looks up the `appsrc` called `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::ElementNotFound`] if there is no such element
    /// - [`Error::WrongElementType`] if it is not an `appsrc`
    pub fn app_src(&self, name: &str) -> Result<AppSrcPusher> {
        let src = self
            .element(name)?
            .downcast::<gst_app::AppSrc>()
            .map_err(|_| Error::WrongElementType {
                name: name.to_owned(),
                expected: "appsrc",
            })?;
        Ok(AppSrcPusher::new(src))
    }

    /// Starts a sample pump on the `appsink` called `name`.
    ///
    /// The pump may be started before the pipeline plays; it waits for the
    /// sink to come up instead of finishing.
    ///
    /// # Errors
    ///
    /// As [`Self::app_sink`], plus [`Error::Core`] if the pump cannot start.
    pub fn sample_stream(
        &self,
        name: &str,
        config: PumpConfig,
    ) -> Result<SampleStream<GstBufferApi>> {
        Ok(pullbridge::start(self.app_sink(name)?, config)?)
    }

    /// Starts a message pump on the pipeline bus.
    pub fn messages(&self, config: MessagePumpConfig) -> Result<MessageStream> {
        let bus = self.pipeline.bus().ok_or(Error::NoBus)?;
        Ok(MessagePump::new(BusSource::new(bus), config).start()?)
    }

    fn param_spec(
        &self,
        target: &gst::Element,
        element: &str,
        property: &str,
    ) -> Result<glib::ParamSpec> {
        target
            .find_property(property)
            .ok_or_else(|| Error::PropertyNotFound {
                element: element.to_owned(),
                property: property.to_owned(),
            })
    }

    /// Sets `property` on the element called `element`.
    ///
    /// The value must have the property's exact type (`i32` for `gint`,
    /// `f64` for `gdouble` and so on) and lie within its range.
    ///
    /// # Errors
    ///
    /// - [`Error::ElementNotFound`] or [`Error::PropertyNotFound`] for unknown
    ///   names
    /// - [`Error::Property`] if the property is read-only or construct-only,
    ///   the value has the wrong type, or it is out of range
    pub fn set_property(
        &self,
        element: &str,
        property: &str,
        value: impl Into<glib::Value>,
    ) -> Result<()> {
        let target = self.element(element)?;
        let pspec = self.param_spec(&target, element, property)?;
        let refuse = |reason: String| Error::Property {
            element: element.to_owned(),
            property: property.to_owned(),
            reason,
        };

        let flags = pspec.flags();
        if !flags.contains(glib::ParamFlags::WRITABLE)
            || flags.contains(glib::ParamFlags::CONSTRUCT_ONLY)
        {
            return Err(refuse("not writable".to_owned()));
        }
        let mut value = value.into();
        if !value.type_().is_a(pspec.value_type()) {
            return Err(refuse(format!(
                "expected {}, got {}",
                pspec.value_type(),
                value.type_()
            )));
        }
        // Safety: both pointers are valid for the duration of the call.
        let clamped: bool = unsafe {
            from_glib(glib::gobject_ffi::g_param_value_validate(
                pspec.to_glib_none().0,
                value.to_glib_none_mut().0,
            ))
        };
        if clamped {
            return Err(refuse("value out of range".to_owned()));
        }

        target.set_property_from_value(property, &value);
        debug!(element, property, ?value, "Property set");
        Ok(())
    }

    /// Reads `property` from the element called `element`.
    ///
    /// # Errors
    ///
    /// - [`Error::ElementNotFound`] or [`Error::PropertyNotFound`] for unknown
    ///   names
    /// - [`Error::Property`] if the property is not readable or `V` is not its
    ///   type
    pub fn property<V>(&self, element: &str, property: &str) -> Result<V>
    where
        V: for<'a> glib::value::FromValue<'a> + 'static,
    {
        let target = self.element(element)?;
        let pspec = self.param_spec(&target, element, property)?;
        let refuse = |reason: String| Error::Property {
            element: element.to_owned(),
            property: property.to_owned(),
            reason,
        };

        if !pspec.flags().contains(glib::ParamFlags::READABLE) {
            return Err(refuse("not readable".to_owned()));
        }
        let value = target.property_value(property);
        value.get::<V>().map_err(|err| refuse(err.to_string()))
    }

    /// Current playback position, if the pipeline can answer.
    pub fn position(&self) -> Option<Duration> {
        self.pipeline
            .query_position::<gst::ClockTime>()
            .map(Duration::from)
    }

    /// Total duration, if known.
    pub fn duration(&self) -> Option<Duration> {
        self.pipeline
            .query_duration::<gst::ClockTime>()
            .map(Duration::from)
    }

    /// Seeks to `position`.
    ///
    /// `gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT` is the usual choice.
    pub fn seek(&self, position: Duration, flags: gst::SeekFlags) -> Result<()> {
        let position = gst::ClockTime::try_from(position)
            .map_err(|_| Error::Other(format!("Seek position {position:?} out of range")))?;
        self.pipeline.seek_simple(flags, position)?;
        debug!(%position, "Seek requested");
        Ok(())
    }
}

impl Drop for Pipeline {
    /// Shuts the pipeline down.
    fn drop(&mut self) {
        if let Err(err) = self.pipeline.set_state(gst::State::Null) {
            error!("Failed to stop pipeline on drop: {}", err);
        }
    }
}
