// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Lazily populated format description shared by a pump and its observers.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::{
    FormatDescriptor, VideoDescriptor,
    caps::{CapsParser, DefaultCapsParser},
    config::{AspectRatio, PumpConfig},
};

/// The current [`FormatDescriptor`] of a stream, behind a mutex.
///
/// The pump writes it while the first samples arrive; anyone holding the
/// cache (usually through [`crate::SampleStream::format`]) can read it at any
/// time. Once the descriptor is populated the caps string is not parsed again.
pub struct FormatCache {
    descriptor: Mutex<FormatDescriptor>,
    parser: Box<dyn CapsParser>,
}

impl Default for FormatCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatCache {
    /// Creates an empty cache using [`DefaultCapsParser`].
    pub fn new() -> Self {
        Self::with_parser(Box::new(DefaultCapsParser))
    }

    /// Creates an empty cache with a custom parser.
    pub fn with_parser(parser: Box<dyn CapsParser>) -> Self {
        Self {
            descriptor: Mutex::new(FormatDescriptor::Unknown),
            parser,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormatDescriptor> {
        self.descriptor.lock().unwrap_or_else(|poisoned| {
            warn!("Format cache mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// A copy of the current descriptor (possibly still empty).
    pub fn snapshot(&self) -> FormatDescriptor {
        self.lock().clone()
    }

    /// Returns `true` once dimensions (or rate and channels) are known.
    pub fn is_populated(&self) -> bool {
        self.lock().is_populated()
    }

    /// Replaces the descriptor.
    pub fn store(&self, descriptor: FormatDescriptor) {
        *self.lock() = descriptor;
    }

    /// Parses `caps` unless the descriptor is already populated.
    ///
    /// Returns `true` if a parse happened. A parse result that knows less than
    /// the current descriptor (for example `Unknown` over a partial video
    /// descriptor) is discarded.
    pub fn observe_caps(&self, caps: &str) -> bool {
        if self.is_populated() {
            return false;
        }
        // Parse outside the lock; only the replace is serialized.
        let parsed = self.parser.parse(caps);
        let mut current = self.lock();
        if current.is_populated() {
            return true;
        }
        if parsed != FormatDescriptor::Unknown || *current == FormatDescriptor::Unknown {
            debug!(?parsed, "Format descriptor updated from caps");
            *current = parsed;
        }
        true
    }

    /// Infers missing video dimensions from a buffer size.
    ///
    /// Runs only for video (or not yet identified) streams whose dimensions
    /// are still zero. On success the inferred size is cached and returned.
    pub fn observe_buffer_size(&self, byte_len: usize, config: &PumpConfig) -> Option<(u32, u32)> {
        let mut current = self.lock();
        let video = match &*current {
            FormatDescriptor::Audio(_) => return None,
            FormatDescriptor::Video(video) if video.has_dimensions() => return None,
            FormatDescriptor::Video(video) => video.clone(),
            FormatDescriptor::Unknown => VideoDescriptor::default(),
        };
        let bits_per_pixel = video
            .format
            .bits_per_pixel()
            .unwrap_or(config.fallback_bits_per_pixel);
        let (width, height) = infer_dimensions(byte_len, bits_per_pixel, &config.aspect_ratios)?;
        debug!(byte_len, width, height, "Inferred frame dimensions from buffer size");
        *current = FormatDescriptor::Video(VideoDescriptor {
            width,
            height,
            ..video
        });
        Some((width, height))
    }
}

/// Guesses frame dimensions from a buffer size.
///
/// The pixel count is `byte_len * 8 / bits_per_pixel` and must be exact. For
/// each ratio `w:h` in order, the pixel count must equal `w*k × h*k` for some
/// integer `k`; the first ratio that fits gives `(w*k, h*k)`.
///
/// This is a heuristic: a buffer that happens to factor under an earlier ratio
/// is reported with that ratio, and sizes that fit none of the ratios yield
/// `None`. Row padding (stride) defeats it entirely.
pub fn infer_dimensions(
    byte_len: usize,
    bits_per_pixel: u32,
    ratios: &[AspectRatio],
) -> Option<(u32, u32)> {
    if byte_len == 0 || bits_per_pixel == 0 {
        return None;
    }
    let bits = (byte_len as u64).checked_mul(8)?;
    if bits % u64::from(bits_per_pixel) != 0 {
        return None;
    }
    let pixels = bits / u64::from(bits_per_pixel);

    ratios.iter().find_map(|ratio| {
        let area = u64::from(ratio.width) * u64::from(ratio.height);
        if area == 0 || pixels % area != 0 {
            return None;
        }
        let scale = exact_sqrt(pixels / area)?;
        let width = u32::try_from(u64::from(ratio.width) * scale).ok()?;
        let height = u32::try_from(u64::from(ratio.height) * scale).ok()?;
        Some((width, height))
    })
}

fn exact_sqrt(value: u64) -> Option<u64> {
    let mut root = (value as f64).sqrt() as u64;
    // Correct for floating point rounding on large inputs.
    while root.saturating_mul(root) > value {
        root -= 1;
    }
    while (root + 1).saturating_mul(root + 1) <= value {
        root += 1;
    }
    (root * root == value).then_some(root)
}
