// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Capability string parsing.
//!
//! Native sinks describe their stream with a caps string such as
//! `video/x-raw, format=(string)BGRA, width=(int)320, height=(int)240`. This
//! module turns that text into a [`FormatDescriptor`]. Parsing never fails:
//! missing or unreadable fields keep their zero/unknown defaults.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A rational number, used for frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    /// Numerator.
    pub numer: i32,
    /// Denominator.
    pub denom: i32,
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

/// Pixel layout of a raw video stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VideoFormat {
    /// No format token was present.
    #[default]
    Unspecified,
    Bgra,
    Rgba,
    Argb,
    Abgr,
    Bgrx,
    Rgbx,
    Xrgb,
    Xbgr,
    Rgb,
    Bgr,
    Rgb16,
    Gray8,
    Gray16Le,
    I420,
    Yv12,
    Nv12,
    Nv21,
    Yuy2,
    Uyvy,
    Y444,
    V210,
    /// A token this crate does not special-case, kept verbatim.
    Unknown(String),
}

impl VideoFormat {
    /// Maps a caps `format` token to a variant.
    pub fn from_token(token: &str) -> Self {
        match token {
            "" => VideoFormat::Unspecified,
            "BGRA" => VideoFormat::Bgra,
            "RGBA" => VideoFormat::Rgba,
            "ARGB" => VideoFormat::Argb,
            "ABGR" => VideoFormat::Abgr,
            "BGRx" => VideoFormat::Bgrx,
            "RGBx" => VideoFormat::Rgbx,
            "xRGB" => VideoFormat::Xrgb,
            "xBGR" => VideoFormat::Xbgr,
            "RGB" => VideoFormat::Rgb,
            "BGR" => VideoFormat::Bgr,
            "RGB16" => VideoFormat::Rgb16,
            "GRAY8" => VideoFormat::Gray8,
            "GRAY16_LE" => VideoFormat::Gray16Le,
            "I420" => VideoFormat::I420,
            "YV12" => VideoFormat::Yv12,
            "NV12" => VideoFormat::Nv12,
            "NV21" => VideoFormat::Nv21,
            "YUY2" => VideoFormat::Yuy2,
            "UYVY" => VideoFormat::Uyvy,
            "Y444" => VideoFormat::Y444,
            "v210" => VideoFormat::V210,
            other => VideoFormat::Unknown(other.to_owned()),
        }
    }

    /// The caps token for this format.
    pub fn as_token(&self) -> &str {
        match self {
            VideoFormat::Unspecified => "",
            VideoFormat::Bgra => "BGRA",
            VideoFormat::Rgba => "RGBA",
            VideoFormat::Argb => "ARGB",
            VideoFormat::Abgr => "ABGR",
            VideoFormat::Bgrx => "BGRx",
            VideoFormat::Rgbx => "RGBx",
            VideoFormat::Xrgb => "xRGB",
            VideoFormat::Xbgr => "xBGR",
            VideoFormat::Rgb => "RGB",
            VideoFormat::Bgr => "BGR",
            VideoFormat::Rgb16 => "RGB16",
            VideoFormat::Gray8 => "GRAY8",
            VideoFormat::Gray16Le => "GRAY16_LE",
            VideoFormat::I420 => "I420",
            VideoFormat::Yv12 => "YV12",
            VideoFormat::Nv12 => "NV12",
            VideoFormat::Nv21 => "NV21",
            VideoFormat::Yuy2 => "YUY2",
            VideoFormat::Uyvy => "UYVY",
            VideoFormat::Y444 => "Y444",
            VideoFormat::V210 => "v210",
            VideoFormat::Unknown(token) => token,
        }
    }

    /// Average bits per pixel for tightly packed frames, if known.
    ///
    /// v210 is omitted: its rows are padded to 128-pixel groups, so the frame
    /// size is not a multiple of the pixel count.
    pub fn bits_per_pixel(&self) -> Option<u32> {
        match self {
            VideoFormat::Bgra
            | VideoFormat::Rgba
            | VideoFormat::Argb
            | VideoFormat::Abgr
            | VideoFormat::Bgrx
            | VideoFormat::Rgbx
            | VideoFormat::Xrgb
            | VideoFormat::Xbgr => Some(32),
            VideoFormat::Rgb | VideoFormat::Bgr | VideoFormat::Y444 => Some(24),
            VideoFormat::Rgb16
            | VideoFormat::Gray16Le
            | VideoFormat::Yuy2
            | VideoFormat::Uyvy => Some(16),
            VideoFormat::I420 | VideoFormat::Yv12 | VideoFormat::Nv12 | VideoFormat::Nv21 => {
                Some(12)
            }
            VideoFormat::Gray8 => Some(8),
            VideoFormat::V210 | VideoFormat::Unspecified | VideoFormat::Unknown(_) => None,
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoFormat::Unspecified => f.write_str("unspecified"),
            other => f.write_str(other.as_token()),
        }
    }
}

/// Sample layout of a raw audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AudioFormat {
    /// No format token was present.
    #[default]
    Unspecified,
    U8,
    S8,
    S16Le,
    S16Be,
    S24Le,
    S32Le,
    S32Be,
    F32Le,
    F32Be,
    F64Le,
    /// A token this crate does not special-case, kept verbatim.
    Unknown(String),
}

impl AudioFormat {
    /// Maps a caps `format` token to a variant.
    pub fn from_token(token: &str) -> Self {
        match token {
            "" => AudioFormat::Unspecified,
            "U8" => AudioFormat::U8,
            "S8" => AudioFormat::S8,
            "S16LE" => AudioFormat::S16Le,
            "S16BE" => AudioFormat::S16Be,
            "S24LE" => AudioFormat::S24Le,
            "S32LE" => AudioFormat::S32Le,
            "S32BE" => AudioFormat::S32Be,
            "F32LE" => AudioFormat::F32Le,
            "F32BE" => AudioFormat::F32Be,
            "F64LE" => AudioFormat::F64Le,
            other => AudioFormat::Unknown(other.to_owned()),
        }
    }

    /// The caps token for this format.
    pub fn as_token(&self) -> &str {
        match self {
            AudioFormat::Unspecified => "",
            AudioFormat::U8 => "U8",
            AudioFormat::S8 => "S8",
            AudioFormat::S16Le => "S16LE",
            AudioFormat::S16Be => "S16BE",
            AudioFormat::S24Le => "S24LE",
            AudioFormat::S32Le => "S32LE",
            AudioFormat::S32Be => "S32BE",
            AudioFormat::F32Le => "F32LE",
            AudioFormat::F32Be => "F32BE",
            AudioFormat::F64Le => "F64LE",
            AudioFormat::Unknown(token) => token,
        }
    }

    /// Bytes per sample of one channel, if known.
    pub fn bytes_per_sample(&self) -> Option<u32> {
        match self {
            AudioFormat::U8 | AudioFormat::S8 => Some(1),
            AudioFormat::S16Le | AudioFormat::S16Be => Some(2),
            AudioFormat::S24Le => Some(3),
            AudioFormat::S32Le | AudioFormat::S32Be | AudioFormat::F32Le | AudioFormat::F32Be => {
                Some(4)
            }
            AudioFormat::F64Le => Some(8),
            AudioFormat::Unspecified | AudioFormat::Unknown(_) => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFormat::Unspecified => f.write_str("unspecified"),
            other => f.write_str(other.as_token()),
        }
    }
}

/// Interpretation of a video stream's caps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoDescriptor {
    /// Frame width in pixels, zero while unknown.
    pub width: u32,
    /// Frame height in pixels, zero while unknown.
    pub height: u32,
    /// Pixel layout.
    pub format: VideoFormat,
    /// Frame rate, if the caps carried one.
    pub framerate: Option<Fraction>,
}

impl VideoDescriptor {
    /// Returns `true` once both dimensions are known.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Interpretation of an audio stream's caps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioDescriptor {
    /// Sample rate in Hz, zero while unknown.
    pub rate: u32,
    /// Channel count, zero while unknown.
    pub channels: u32,
    /// Sample layout.
    pub format: AudioFormat,
}

impl AudioDescriptor {
    /// Returns `true` once rate and channel count are known.
    pub fn has_layout(&self) -> bool {
        self.rate > 0 && self.channels > 0
    }

    /// Bytes per interleaved frame (one sample of every channel), if known.
    pub fn bytes_per_frame(&self) -> Option<u32> {
        self.format
            .bytes_per_sample()
            .map(|bytes| bytes * self.channels)
    }
}

/// Cached interpretation of a stream's caps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormatDescriptor {
    /// Nothing is known yet.
    #[default]
    Unknown,
    /// A video stream.
    Video(VideoDescriptor),
    /// An audio stream.
    Audio(AudioDescriptor),
}

impl FormatDescriptor {
    /// Returns `true` once the fields that matter for the stream kind are
    /// non-zero. A populated descriptor is not re-derived.
    pub fn is_populated(&self) -> bool {
        match self {
            FormatDescriptor::Unknown => false,
            FormatDescriptor::Video(video) => video.has_dimensions(),
            FormatDescriptor::Audio(audio) => audio.has_layout(),
        }
    }

    /// The video part, if this is a video stream.
    pub fn video(&self) -> Option<&VideoDescriptor> {
        match self {
            FormatDescriptor::Video(video) => Some(video),
            _ => None,
        }
    }

    /// The audio part, if this is an audio stream.
    pub fn audio(&self) -> Option<&AudioDescriptor> {
        match self {
            FormatDescriptor::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    /// Returns `true` for audio streams.
    pub fn is_audio(&self) -> bool {
        matches!(self, FormatDescriptor::Audio(_))
    }
}

/// Turns caps strings into descriptors.
///
/// The [`crate::FormatCache`] takes its parser as a trait object so the number
/// of parses can be observed.
pub trait CapsParser: Send + Sync {
    /// Parses `caps`. Must not fail; unknown input yields
    /// [`FormatDescriptor::Unknown`] or zeroed fields.
    fn parse(&self, caps: &str) -> FormatDescriptor;
}

/// The parser used unless another one is configured; calls [`parse_caps`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCapsParser;

impl CapsParser for DefaultCapsParser {
    fn parse(&self, caps: &str) -> FormatDescriptor {
        parse_caps(caps)
    }
}

/// Parses a caps string into a [`FormatDescriptor`].
///
/// Only the first structure is considered (`;` separates alternatives). The
/// media type decides between video and audio; without a recognisable media
/// type, the presence of `width`/`height` or `rate`/`channels` does.
///
/// # Examples
///
/// ```
/// use pullbridge::{FormatDescriptor, VideoFormat, parse_caps};
///
/// let desc = parse_caps("video/x-raw, format=(string)BGRA, width=(int)320, height=(int)240");
/// let FormatDescriptor::Video(video) = desc else { panic!("not video") };
/// assert_eq!((video.width, video.height), (320, 240));
/// assert_eq!(video.format, VideoFormat::Bgra);
/// ```
pub fn parse_caps(caps: &str) -> FormatDescriptor {
    let structure = split_top_level(caps, ';').into_iter().next().unwrap_or("");
    let mut fields = split_top_level(structure, ',');
    let media_type = if fields.first().is_some_and(|first| !first.contains('=')) {
        fields.remove(0).trim()
    } else {
        ""
    };

    let mut width = None;
    let mut height = None;
    let mut rate = None;
    let mut channels = None;
    let mut format = None;
    let mut framerate = None;

    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let value = strip_annotation(value);
        match key.trim() {
            "width" => width = parse_dimension(value),
            "height" => height = parse_dimension(value),
            "rate" => rate = parse_dimension(value),
            "channels" => channels = parse_dimension(value),
            "format" => format = Some(value),
            "framerate" => framerate = parse_fraction(value),
            _ => {}
        }
    }

    let is_video = media_type.starts_with("video/")
        || (!media_type.starts_with("audio/") && (width.is_some() || height.is_some()));
    let is_audio = media_type.starts_with("audio/")
        || (!is_video && (rate.is_some() || channels.is_some()));

    if is_video {
        FormatDescriptor::Video(VideoDescriptor {
            width: width.unwrap_or(0),
            height: height.unwrap_or(0),
            format: format.map(VideoFormat::from_token).unwrap_or_default(),
            framerate,
        })
    } else if is_audio {
        FormatDescriptor::Audio(AudioDescriptor {
            rate: rate.unwrap_or(0),
            channels: channels.unwrap_or(0),
            format: format.map(AudioFormat::from_token).unwrap_or_default(),
        })
    } else {
        debug!(caps, "No recognisable fields in caps");
        FormatDescriptor::Unknown
    }
}

/// Splits on `separator` outside of brackets and quotes.
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut escaped = false;
    let mut start = 0;

    for (index, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            '{' | '[' | '<' | '(' if !quoted => depth += 1,
            '}' | ']' | '>' | ')' if !quoted => depth = depth.saturating_sub(1),
            c if c == separator && !quoted && depth == 0 => {
                parts.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Strips a leading `(type)` annotation and surrounding quotes.
fn strip_annotation(value: &str) -> &str {
    let mut value = value.trim();
    if value.starts_with('(')
        && let Some(end) = value.find(')')
    {
        value = value[end + 1..].trim_start();
    }
    value.trim_matches('"')
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.parse().ok()
}

fn parse_fraction(value: &str) -> Option<Fraction> {
    let (numer, denom) = value.split_once('/')?;
    Some(Fraction {
        numer: numer.trim().parse().ok()?,
        denom: denom.trim().parse().ok()?,
    })
}
