// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

use gstreamer as gst;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors from the GStreamer backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the framework-neutral bridge.
    #[error(transparent)]
    Core(#[from] pullbridge::Error),

    /// GStreamer could not be initialized or the pipeline description did not
    /// parse.
    #[error("GLib error: {0}")]
    Glib(#[from] glib::Error),

    /// A GStreamer call reported failure without further detail.
    #[error("GStreamer call failed: {0}")]
    Bool(#[from] glib::BoolError),

    /// The pipeline refused a state change.
    #[error("State change failed: {0}")]
    StateChange(#[from] gst::StateChangeError),

    /// No element with this name exists in the pipeline.
    #[error("No element named \"{0}\" in pipeline")]
    ElementNotFound(String),

    /// The named element exists but is of another type.
    #[error("Element \"{name}\" is not an {expected}")]
    WrongElementType {
        /// Element name.
        name: String,
        /// The type that was required.
        expected: &'static str,
    },

    /// The named `appsink` was already handed out.
    #[error("Sink \"{0}\" is already being drained")]
    SinkInUse(String),

    /// The element has no property of this name.
    #[error("Element \"{element}\" has no property \"{property}\"")]
    PropertyNotFound {
        /// Element name.
        element: String,
        /// Property name.
        property: String,
    },

    /// The property exists but cannot be accessed this way.
    #[error("Property \"{property}\" of \"{element}\": {reason}")]
    Property {
        /// Element name.
        element: String,
        /// Property name.
        property: String,
        /// Why the access was refused.
        reason: String,
    },

    /// The pipeline has no bus.
    #[error("Pipeline has no bus")]
    NoBus,

    /// An app source refused a buffer or end-of-stream.
    #[error("Data flow error: {0}")]
    Flow(gst::FlowError),

    /// A generic error for failures not covered by other variants.
    #[error("Other error: {0}")]
    Other(String),
}
