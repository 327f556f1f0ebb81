// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration for the sample and message pumps.
//!
//! Both configurations deserialize from JSON so applications can keep them
//! next to their pipeline descriptions:
//!
//! ```
//! use std::time::Duration;
//! use pullbridge::config::PumpConfig;
//!
//! # fn main() -> Result<(), pullbridge::Error> {
//! let config = PumpConfig::from_json_str(r#"{ "pull_timeout_ms": 40, "channel_capacity": 2 }"#)?;
//! assert_eq!(config.pull_timeout, Duration::from_millis(40));
//! assert_eq!(config.aspect_ratios.len(), 3);
//! # Ok(())
//! # }
//! ```

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default bound on a single native pull.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_millis(100);

/// Default number of events buffered between a pump and its consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Bits per pixel assumed by dimension inference when the format is unknown.
pub const DEFAULT_FALLBACK_BITS_PER_PIXEL: u32 = 32;

/// A width:height ratio tried by dimension inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Width term.
    pub width: u32,
    /// Height term.
    pub height: u32,
}

impl AspectRatio {
    /// 16:9.
    pub const WIDESCREEN: AspectRatio = AspectRatio::new(16, 9);
    /// 4:3.
    pub const STANDARD: AspectRatio = AspectRatio::new(4, 3);
    /// 1:1.
    pub const SQUARE: AspectRatio = AspectRatio::new(1, 1);

    /// Creates a ratio.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// The ratios tried when caps carry no dimensions, in order.
pub fn default_aspect_ratios() -> Vec<AspectRatio> {
    vec![
        AspectRatio::WIDESCREEN,
        AspectRatio::STANDARD,
        AspectRatio::SQUARE,
    ]
}

/// Configuration of a [`crate::SamplePump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Upper bound on each native pull. Trades CPU spin against how quickly
    /// end-of-stream and cancellation are noticed.
    #[serde(rename = "pull_timeout_ms", with = "millis")]
    pub pull_timeout: Duration,

    /// Number of events that may wait for the consumer before the pump blocks.
    pub channel_capacity: usize,

    /// Ratios tried, in order, when a video buffer arrives without dimensions.
    pub aspect_ratios: Vec<AspectRatio>,

    /// Bits per pixel used by inference when the pixel format is unknown.
    pub fallback_bits_per_pixel: u32,

    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            aspect_ratios: default_aspect_ratios(),
            fallback_bits_per_pixel: DEFAULT_FALLBACK_BITS_PER_PIXEL,
            thread_name: "pullbridge-pump".to_owned(),
        }
    }
}

impl PumpConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - [`Error::Config`] if a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the pull timeout.
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Sets the channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Replaces the inference ratio list.
    pub fn with_aspect_ratios(mut self, ratios: Vec<AspectRatio>) -> Self {
        self.aspect_ratios = ratios;
        self
    }

    /// Sets the inference fallback bits per pixel.
    pub fn with_fallback_bits_per_pixel(mut self, bits: u32) -> Self {
        self.fallback_bits_per_pixel = bits;
        self
    }

    /// Sets the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.pull_timeout.is_zero() {
            return Err(Error::Config("pull_timeout_ms must be non-zero".to_owned()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be non-zero".to_owned()));
        }
        if self.fallback_bits_per_pixel == 0 {
            return Err(Error::Config(
                "fallback_bits_per_pixel must be non-zero".to_owned(),
            ));
        }
        if let Some(ratio) = self
            .aspect_ratios
            .iter()
            .find(|ratio| ratio.width == 0 || ratio.height == 0)
        {
            return Err(Error::Config(format!(
                "aspect ratio {ratio} has a zero term"
            )));
        }
        Ok(())
    }
}

/// Configuration of a [`crate::MessagePump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePumpConfig {
    /// Upper bound on each bus pop.
    #[serde(rename = "pop_timeout_ms", with = "millis")]
    pub pop_timeout: Duration,

    /// Number of messages that may wait for the consumer.
    pub channel_capacity: usize,

    /// Finish the stream after delivering end-of-stream.
    pub stop_on_eos: bool,

    /// Finish the stream after delivering an error.
    pub stop_on_error: bool,

    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for MessagePumpConfig {
    fn default() -> Self {
        Self {
            pop_timeout: DEFAULT_PULL_TIMEOUT,
            channel_capacity: 16,
            stop_on_eos: true,
            stop_on_error: false,
            thread_name: "pullbridge-bus".to_owned(),
        }
    }
}

impl MessagePumpConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.pop_timeout.is_zero() {
            return Err(Error::Config("pop_timeout_ms must be non-zero".to_owned()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be non-zero".to_owned()));
        }
        Ok(())
    }
}

/// Serializes a [`Duration`] as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
