// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for bridge operations.
//!
//! Pulling from a sink never produces an error: an empty pull is retried and
//! end-of-stream finishes the stream. The errors below come from byte access
//! on a [`crate::BufferHandle`], from starting a pump, or from configuration.

use crate::native::MapMode;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when using the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The native map call for the buffer failed.
    ///
    /// The handle stays valid and mapping may be retried.
    #[error("Failed to map buffer for {mode}")]
    MapFailed {
        /// Access mode that was requested.
        mode: MapMode,
    },

    /// A write mapping was requested on a buffer that is not writable.
    #[error("Buffer is not writable")]
    NotWritable,

    /// The native side could not allocate a buffer of the requested size.
    #[error("Failed to allocate a buffer of {size} bytes")]
    AllocationFailed {
        /// Requested size in bytes.
        size: usize,
    },

    /// The handle's native reference has already been released.
    #[error("Buffer reference was already released")]
    Released,

    /// The pump worker thread could not be spawned.
    #[error("Failed to spawn pump worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A configuration document could not be parsed.
    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    /// A generic error for failures not covered by other variants.
    #[error("Other error: {0}")]
    Other(String),
}
